use faststr::FastStr;
use reqwest_eventsource::CannotCloneRequestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    MsgError(FastStr),
    #[error("{0}")]
    CannotCloneRequestError(#[from] CannotCloneRequestError),
    #[error("Invalid response data: {0} status: {1}")]
    InvalidResponseData(FastStr, u16),
    #[error("Invalid response event-stream: content-type: {0}, data: {1}")]
    InvalidResponseEventStream(FastStr, FastStr),
    #[error("Reqwest eventsource error: {0}")]
    ReqwestEventsourceError(#[from] Box<reqwest_eventsource::Error>),
    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("upstream error: {0}")]
    Upstream(FastStr),
    #[error("upstream timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("invalid config {key}: {reason}")]
    Config { key: &'static str, reason: FastStr },
}

pub type Result<T> = std::result::Result<T, Error>;
