mod chat;
mod request;

pub use chat::ChatCompletionsData;
pub use request::RequestData;
