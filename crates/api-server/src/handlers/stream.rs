use crate::AppState;
use crate::error::Result;
use crate::requests::StreamRequest;
use crate::tools::create_frame;
use async_stream::stream;
use common::stream::{RelayEvent, relay};
use futures_util::{Stream, StreamExt, pin_mut};
use reqwest::header::{CACHE_CONTROL, CONNECTION, HeaderValue};
use tokio::sync::mpsc::{Sender, channel};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use volo_http::{
    response::Response,
    server::{
        IntoResponse,
        extract::Json,
        response::sse::{Event, Sse},
        route::{Router, post},
    },
    utils::Extension,
};

/// Events buffered between the relay task and the response body.
const EVENT_CHANNEL_CAPACITY: usize = 32;

async fn stream_handler(
    Extension(state): Extension<AppState>,
    Json(req): Json<StreamRequest>,
) -> Response {
    info!(
        source = state.source.name(),
        prompt_len = req.prompt.len(),
        stream = req.stream,
        "recv stream request"
    );
    if !req.stream {
        debug!("client asked for a non-streaming reply, streaming anyway");
    }

    let upstream = state.source.stream_completion(&req.prompt);
    let events = relay(upstream, state.policy.clone());

    let (tx, rx) = channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(forward_events(events, tx));

    let mut resp = create_sse_response(ReceiverStream::new(rx)).into_response();
    let headers = resp.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    resp
}

/// Drives the relay until it finishes or the client goes away. Returning
/// drops `events`, and with it the upstream call.
pub(crate) async fn forward_events<S>(events: S, tx: Sender<RelayEvent>)
where
    S: Stream<Item = RelayEvent>,
{
    pin_mut!(events);
    loop {
        let event = tokio::select! {
            _ = tx.closed() => {
                info!("client disconnected, dropping upstream");
                return;
            }
            event = events.next() => event,
        };
        let Some(event) = event else {
            break;
        };
        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() {
            warn!("send event error: channel may closed");
            return;
        }
        if terminal {
            break;
        }
    }
}

fn create_sse_response<S>(input: S) -> Sse<impl Stream<Item = Result<Event>>>
where
    S: Stream<Item = RelayEvent> + Send + Sync + 'static,
{
    let stream = stream! {
        pin_mut!(input);
        while let Some(event) = input.next().await {
            let terminal = event.is_terminal();
            yield Ok(Event::new().data(create_frame(&event)));
            if terminal {
                break;
            }
        }
    };

    Sse::new(stream)
}

pub fn stream_router() -> Router {
    Router::new().route("/stream", post(stream_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::error::Error;
    use common::proxy::{CompletionSource, FragmentStream};
    use common::stream::RelayPolicy;
    use common::stream::policy::{FAST_START_TEXT, FILLER_TEXT};
    use faststr::FastStr;
    use futures_util::stream;
    use http_body_util::BodyExt;
    use reqwest::StatusCode;
    use reqwest::header::{CONTENT_TYPE, HeaderMap};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::{mpsc, oneshot};

    /// Replays a fixed script of fragments; `Err` entries become upstream
    /// failures.
    struct ScriptedSource {
        script: Vec<std::result::Result<&'static str, &'static str>>,
    }

    impl CompletionSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn stream_completion(&self, _prompt: &str) -> FragmentStream {
            let items: Vec<_> = self
                .script
                .iter()
                .map(|step| match step {
                    Ok(text) => Ok(FastStr::from_static_str(*text)),
                    Err(msg) => Err(Error::MsgError(FastStr::from_static_str(*msg))),
                })
                .collect();
            stream::iter(items).boxed()
        }
    }

    /// Replies with the words of the prompt, one fragment each.
    struct WordsSource;

    impl CompletionSource for WordsSource {
        fn name(&self) -> &str {
            "words"
        }

        fn stream_completion(&self, prompt: &str) -> FragmentStream {
            let words: Vec<FastStr> = prompt
                .split_whitespace()
                .map(|w| FastStr::from(format!("{w} ")))
                .collect();
            stream::iter(words)
                .then(|word| async move {
                    tokio::task::yield_now().await;
                    Ok::<_, Error>(word)
                })
                .boxed()
        }
    }

    fn state(script: Vec<std::result::Result<&'static str, &'static str>>, policy: RelayPolicy) -> AppState {
        AppState::new(Arc::new(ScriptedSource { script }), policy)
    }

    fn request(prompt: &str) -> StreamRequest {
        StreamRequest {
            prompt: prompt.to_owned().into(),
            stream: true,
        }
    }

    /// Splits an SSE body into its `data:` payloads.
    fn payloads(body: &str) -> Vec<String> {
        body.split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(|block| {
                block
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(|data| data.strip_prefix(' ').unwrap_or(data))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect()
    }

    fn content(payload: &str) -> Option<String> {
        let value: Value = serde_json::from_str(payload).ok()?;
        value["choices"][0]["delta"]["content"].as_str().map(str::to_owned)
    }

    async fn call(state: AppState, req: StreamRequest) -> (StatusCode, HeaderMap, Vec<String>) {
        let resp = stream_handler(Extension(state), Json(req)).await;
        let (parts, body) = resp.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        (parts.status, parts.headers, payloads(&body))
    }

    #[tokio::test]
    async fn streams_batched_content_then_done() {
        let script = vec![
            Ok("function "),
            Ok("bubbleSort(arr) {\n"),
            Ok("  for (let i = 0; i < arr.length; i++) {\n"),
            Ok("  }\n}\n"),
        ];
        let policy = RelayPolicy::default().with_fast_start(None);

        let (status, headers, payloads) = call(state(script, policy), request("sort an array")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(
            headers[CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[CONNECTION], "keep-alive");

        assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
        let texts: Vec<String> = payloads.iter().filter_map(|p| content(p)).collect();
        assert_eq!(texts.len(), 5);
        assert!(texts[0].starts_with("function bubbleSort(arr) {\n"));
        let model_text: String = texts.iter().filter(|t| t.as_str() != FILLER_TEXT).cloned().collect();
        assert_eq!(
            model_text,
            "function bubbleSort(arr) {\n  for (let i = 0; i < arr.length; i++) {\n  }\n}\n"
        );
    }

    #[tokio::test]
    async fn empty_upstream_yields_filler_floor() {
        let (_, _, payloads) = call(state(vec![], RelayPolicy::default()), request("")).await;

        assert_eq!(payloads.len(), 7);
        assert_eq!(content(&payloads[0]).as_deref(), Some(FAST_START_TEXT));
        for payload in &payloads[1..6] {
            assert_eq!(content(payload).as_deref(), Some(FILLER_TEXT));
        }
        assert_eq!(payloads[6], "[DONE]");
    }

    #[tokio::test]
    async fn upstream_error_is_reported_in_band() {
        let script = vec![Ok("const a = 1;\n"), Ok("const b = 2;\n"), Err("ConnectionError: reset")];
        let policy = RelayPolicy::every_fragment();

        let (status, _, payloads) = call(state(script, policy), request("x")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payloads.len(), 4);
        assert_eq!(content(&payloads[0]).as_deref(), Some("const a = 1;\n"));
        assert_eq!(content(&payloads[1]).as_deref(), Some("const b = 2;\n"));
        let error: Value = serde_json::from_str(&payloads[2]).unwrap();
        assert!(error["error"].as_str().unwrap().contains("reset"));
        assert_eq!(payloads[3], "[DONE]");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_requests_do_not_share_state() {
        let state = AppState::new(Arc::new(WordsSource), RelayPolicy::every_fragment());

        let ((_, _, first), (_, _, second)) = tokio::join!(
            call(state.clone(), request("let a = 1;")),
            call(state.clone(), request("const b")),
        );

        let texts = |payloads: &[String]| -> Vec<String> { payloads.iter().filter_map(|p| content(p)).collect() };
        let first_texts = texts(&first);
        let second_texts = texts(&second);

        assert_eq!(first_texts[..4].concat(), "let a = 1; ");
        assert_eq!(first_texts[4], FILLER_TEXT);
        assert_eq!(first_texts.len(), 5);

        assert_eq!(second_texts[..2].concat(), "const b ");
        assert!(second_texts[2..].iter().all(|t| t.as_str() == FILLER_TEXT));
        assert_eq!(second_texts.len(), 5);

        for payloads in [&first, &second] {
            assert_eq!(payloads.iter().filter(|p| p.as_str() == "[DONE]").count(), 1);
            assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));
        }
    }

    #[tokio::test]
    async fn disconnect_drops_the_upstream() {
        let (guard, released) = oneshot::channel::<()>();
        let upstream = stream::pending::<common::error::Result<FastStr>>().map(move |item| {
            let _held = &guard;
            item
        });
        let events = relay(upstream, RelayPolicy::default());
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(forward_events(events, tx));

        assert_eq!(rx.recv().await, Some(RelayEvent::Filler(FAST_START_TEXT.into())));
        drop(rx);

        task.await.unwrap();
        assert!(released.await.is_err());
    }

    #[tokio::test]
    async fn forwarding_stops_after_done() {
        let events = stream::iter(vec![RelayEvent::Done, RelayEvent::Delta("late".into())]);
        let (tx, rx) = mpsc::channel(4);

        forward_events(events, tx).await;

        let received: Vec<_> = ReceiverStream::new(rx).collect().await;
        assert_eq!(received, vec![RelayEvent::Done]);
    }
}
