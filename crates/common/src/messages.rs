use faststr::FastStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub role:    MessageRole,
    pub content: FastStr,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<FastStr>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<FastStr>) -> Self {
        Self::new(MessageRole::User, content)
    }
}
