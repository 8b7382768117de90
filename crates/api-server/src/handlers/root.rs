use faststr::FastStr;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::json;
use volo_http::{
    response::Response,
    server::{IntoResponse, Router, route::get},
};

async fn root_handler() -> Response {
    let body: FastStr = json!({ "message": "Streaming API running" }).to_string().into();
    let mut resp = (StatusCode::OK, body).into_response();
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

pub fn root_router() -> Router {
    Router::new().route("/", get(root_handler))
}
