use crate::messages::Message;
use faststr::FastStr;
use serde::{Deserialize, Serialize};

/// Body of one upstream `/chat/completions` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionsData {
    #[serde(rename = "model")]
    pub model_name:  FastStr,
    pub messages:    Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream:      bool,
}

impl ChatCompletionsData {
    pub fn streaming(model_name: FastStr, messages: Vec<Message>, temperature: Option<f32>) -> Self {
        Self {
            model_name,
            messages,
            temperature,
            stream: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_body_shape() {
        let data = ChatCompletionsData::streaming(
            "gpt-4o-mini".into(),
            vec![Message::user("hi")],
            Some(0.7),
        );
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "user");
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn temperature_omitted_when_unset() {
        let data = ChatCompletionsData::streaming("m".into(), vec![], None);
        let value = serde_json::to_value(&data).unwrap();
        assert!(value.get("temperature").is_none());
    }
}
