use crate::error::Result;
use common::stream::RelayEvent;
use faststr::FastStr;
use reqwest::Client as ReqwestClient;
use serde_json::json;
use std::time::Duration;

pub const DONE_FRAME: &str = "[DONE]";

/// Upstream client shared by every request. No total timeout is set here,
/// the relay policy bounds request duration.
#[inline]
pub fn build_http_client(connect_timeout: Duration) -> Result<ReqwestClient> {
    let client = ReqwestClient::builder()
        .connect_timeout(connect_timeout)
        .build()?;
    Ok(client)
}

#[inline]
pub fn create_text_frame(content: &str) -> FastStr {
    json!({ "choices": [{ "delta": { "content": content } }] })
        .to_string()
        .into()
}

#[inline]
pub fn create_error_frame(message: &str) -> FastStr {
    json!({ "error": message }).to_string().into()
}

/// Wire payload of one `data:` line. Filler and model output share a shape.
pub fn create_frame(event: &RelayEvent) -> FastStr {
    match event {
        RelayEvent::Error(message) => create_error_frame(message),
        RelayEvent::Done => FastStr::from_static_str(DONE_FRAME),
        content => create_text_frame(content.content().unwrap_or_default()),
    }
}
