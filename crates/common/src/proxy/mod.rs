pub mod chat_openai;

use crate::error::Result;
use faststr::FastStr;
use futures_util::stream::BoxStream;

pub use chat_openai::{OpenAIClient, OpenAIClientConfig};

/// Token fragments of one completion, in upstream order. Failures to
/// establish the call surface as the first item.
pub type FragmentStream = BoxStream<'static, Result<FastStr>>;

/// Anything that turns a prompt into a lazily evaluated fragment stream.
/// Implementors are shared across requests and must not keep per-request
/// state.
pub trait CompletionSource: Send + Sync {
    fn name(&self) -> &str;

    fn stream_completion(&self, prompt: &str) -> FragmentStream;
}
