use crate::RequestBuilder;
use faststr::FastStr;
use serde_json::Value;

/// A fully prepared upstream POST, detached from any particular client.
#[derive(Debug)]
pub struct RequestData {
    pub url:     FastStr,
    pub headers: Vec<(FastStr, FastStr)>,
    pub body:    Value,
}

impl RequestData {
    pub fn new<T>(url: T, body: Value) -> Self
    where
        T: Into<FastStr>,
    {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn bearer_auth<T>(&mut self, auth: T)
    where
        T: Into<FastStr>,
    {
        self.headers.push((
            "authorization".into(),
            format!("Bearer {}", auth.into()).into(),
        ));
    }

    pub fn into_builder(self, client: &reqwest::Client) -> RequestBuilder {
        let mut builder = client.post(self.url.as_str());
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        builder.json(&self.body)
    }
}
