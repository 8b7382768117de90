//! Permissive CORS: any origin, method and header, credentials allowed.
//! Browsers consume `/stream` directly, so preflights are answered here
//! without reaching the handlers.

use faststr::FastStr;
use reqwest::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, HeaderMap,
    HeaderValue, ORIGIN, VARY,
};
use reqwest::{Method, StatusCode};
use volo_http::{
    context::ServerContext,
    request::ServerRequest,
    response::Response,
    server::{IntoResponse, middleware::Next},
};

const ALLOW_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
const PREFLIGHT_MAX_AGE: &str = "600";

/// Router middleware, installed with `from_fn(cors)`.
pub async fn cors(cx: &mut ServerContext, req: ServerRequest, next: Next) -> Response {
    let origin = req.headers().get(ORIGIN).cloned();
    if req.method() == Method::OPTIONS && origin.is_some() {
        return preflight_response(req.headers());
    }

    let mut resp = next.run(cx, req).await.into_response();
    allow_origin(resp.headers_mut(), origin.as_ref());
    resp
}

/// With credentials allowed the wildcard cannot be sent back, so a present
/// `Origin` is echoed instead.
pub(crate) fn allow_origin(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    match origin {
        Some(origin) => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        None => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
    }
}

pub(crate) fn preflight_response(req_headers: &HeaderMap) -> Response {
    let mut resp = (StatusCode::OK, FastStr::from_static_str("OK")).into_response();
    let headers = resp.headers_mut();
    allow_origin(headers, req_headers.get(ORIGIN));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    if let Some(requested) = req_headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE));
    resp
}
