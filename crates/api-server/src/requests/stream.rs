use faststr::FastStr;
use serde::{Deserialize, Serialize};

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRequest {
    pub prompt: FastStr,
    /// Advisory only, responses always stream.
    #[serde(default = "default_stream")]
    pub stream: bool,
}
