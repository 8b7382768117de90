use crate::error::{Error, Result};
use crate::proxy::{CompletionSource, FragmentStream};
use crate::{
    RequestBuilder,
    data::{ChatCompletionsData, RequestData},
    messages::Message,
    stream::sse::sse_stream,
    text::build_prompt,
};

use faststr::FastStr;
use futures_util::{Stream, StreamExt, future::ready, stream};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OpenAIClientConfig {
    pub name:        FastStr,
    pub api_key:     Option<FastStr>,
    pub api_base:    FastStr,
    pub model:       FastStr,
    pub temperature: Option<f32>,
    pub wrap_prompt: bool,
}

/// Shared, read-only handle to an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    config: OpenAIClientConfig,
    http:   reqwest::Client,
}

impl OpenAIClient {
    pub fn new(config: OpenAIClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &OpenAIClientConfig {
        &self.config
    }

    pub fn openai_chat_completions_streaming(&self, data: ChatCompletionsData) -> FragmentStream {
        match prepare_chat_completions(&self.config, data) {
            Ok(request_data) => {
                openai_chat_completions_streaming(request_data.into_builder(&self.http)).boxed()
            }
            Err(err) => stream::once(ready(Err(err))).boxed(),
        }
    }
}

impl CompletionSource for OpenAIClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn stream_completion(&self, prompt: &str) -> FragmentStream {
        let content = build_prompt(prompt, self.config.wrap_prompt);
        let data = ChatCompletionsData::streaming(
            self.config.model.clone(),
            vec![Message::user(content)],
            self.config.temperature,
        );
        self.openai_chat_completions_streaming(data)
    }
}

fn prepare_chat_completions(
    config: &OpenAIClientConfig,
    data: ChatCompletionsData,
) -> Result<RequestData> {
    let url = config.api_base.trim_end_matches('/');
    let url = format!("{url}/chat/completions");
    let body = serde_json::to_value(data)?;

    let mut request_data = RequestData::new(url, body);
    if let Some(key) = &config.api_key {
        request_data.bearer_auth(key.clone());
    }
    Ok(request_data)
}

/// Extracts the content delta of one chunk. Chunks without text (role
/// announcements, finish markers) map to `None`.
fn parse_delta(data: &str) -> Result<Option<FastStr>> {
    let data: Value = serde_json::from_str(data)?;
    if let Some(err) = data.get("error").filter(|e| !e.is_null()) {
        let message = err["message"]
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        return Err(Error::Upstream(message.into()));
    }
    Ok(data["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_owned().into()))
}

pub fn openai_chat_completions_streaming(
    builder: RequestBuilder,
) -> impl Stream<Item = Result<FastStr>> + Send {
    sse_stream(builder)
        .take_while(|message| {
            let done = matches!(message, Ok(m) if m.is_done());
            if done {
                debug!("upstream sent [DONE]");
            }
            ready(!done)
        })
        .filter_map(|message| {
            ready(match message {
                Ok(message) if !message.is_message() => {
                    debug!(event = %message.event, "skip non-message event");
                    None
                }
                Ok(message) => parse_delta(&message.data).transpose(),
                Err(err) => Some(Err(err)),
            })
        })
        // nothing follows the first failure
        .scan(false, |failed, item| {
            if *failed {
                return ready(None);
            }
            *failed = item.is_err();
            ready(Some(item))
        })
}
