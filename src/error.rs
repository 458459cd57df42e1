use serde_json::json;

/// Error type shared by the request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Upstream stream decode error: {0}")]
    Decode(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    ServerError,
}

impl ProxyError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProxyError::InvalidModel(_) | ProxyError::InvalidRequest(_) => {
                ErrorCategory::InvalidRequest
            }
            ProxyError::Auth(_) => ErrorCategory::Authentication,
            // Upstream statuses are not forwarded: the client sees a proxy failure.
            ProxyError::Upstream { .. }
            | ProxyError::Transport(_)
            | ProxyError::Decode(_)
            | ProxyError::Internal(_) => ErrorCategory::ServerError,
        }
    }

    /// Whether the caller can fix the request and retry.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.category() != ErrorCategory::ServerError
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as (`status_code`, `{"detail": ...}` body).
#[must_use]
pub fn format_error(err: &ProxyError) -> (http::StatusCode, serde_json::Value) {
    let status = http_status_for_category(err.category());
    (status, json!({ "detail": err.to_string() }))
}

/// Convert a `ProxyError` into an axum response.
#[must_use]
pub fn into_axum_response(err: &ProxyError) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err);
    (status, axum::Json(body)).into_response()
}

impl axum::response::IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self)
    }
}
