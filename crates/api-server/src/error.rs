use faststr::FastStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("faild to build client: {0}")]
    FailedToBuildClient(#[from] reqwest::Error),

    #[error("server stopped: {0}")]
    Server(FastStr),
}

pub type Result<T> = std::result::Result<T, Error>;
