//! Outward SSE framing.

use axum::response::Response;
use serde_json::json;

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Format an OpenAI-style SSE frame (no event type, just data).
#[must_use]
pub fn openai_sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(8 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Format a named `error` event carrying `{"detail": ...}`.
#[must_use]
pub fn error_frame(detail: &str) -> String {
    let data = json!({ "detail": detail }).to_string();
    let mut out = String::with_capacity(24 + data.len());
    out.push_str("event: error\n");
    out.push_str("data: ");
    out.push_str(&data);
    out.push_str("\n\n");
    out
}

/// 200 response with the event-stream headers set.
#[must_use]
pub fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
