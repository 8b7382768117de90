use crate::error::{Error, Result};
use async_stream::stream;
use faststr::FastStr;
use futures_util::{Stream, StreamExt};
use reqwest::RequestBuilder;
use reqwest_eventsource::{Error as EventSourceError, Event, RequestBuilderExt};
use tracing::debug;

#[derive(Debug)]
pub struct SseMessage {
    pub event: FastStr,
    pub data:  FastStr,
}

impl SseMessage {
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }

    /// Unnamed events arrive as `message`; anything else (`ping`, vendor
    /// keep-alives) carries no completion data.
    pub fn is_message(&self) -> bool {
        self.event.is_empty() || self.event == "message"
    }
}

/// Opens `builder` as an event source and yields its messages until the
/// upstream ends the stream or fails. Nothing is sent until the stream is
/// first polled, and the connection is never retried.
pub fn sse_stream(builder: RequestBuilder) -> impl Stream<Item = Result<SseMessage>> + Send {
    stream! {
        match builder.eventsource() {
            Err(err) => yield Err(Error::from(err)),
            Ok(mut es) => {
                while let Some(event) = es.next().await {
                    match event {
                        Ok(Event::Open) => {
                            debug!("upstream event-stream opened");
                        }
                        Ok(Event::Message(message)) => {
                            yield Ok(SseMessage {
                                event: message.event.into(),
                                data:  message.data.into(),
                            });
                        }
                        Err(EventSourceError::StreamEnded) => {
                            debug!("Stream End");
                            es.close();
                            break;
                        }
                        Err(err) => {
                            es.close();
                            yield Err(map_eventsource_error(err).await);
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn map_eventsource_error(err: EventSourceError) -> Error {
    match err {
        EventSourceError::InvalidStatusCode(status, res) => {
            let text = res.text().await.unwrap_or_default();
            Error::InvalidResponseData(text.into(), status.as_u16())
        }
        EventSourceError::InvalidContentType(header_value, res) => {
            let text = res.text().await.unwrap_or_default();
            Error::InvalidResponseEventStream(
                header_value.to_str().unwrap_or_default().to_owned().into(),
                text.into(),
            )
        }
        err => Error::ReqwestEventsourceError(err.into()),
    }
}
