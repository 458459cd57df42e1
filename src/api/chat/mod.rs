//! `POST /v1/chat/completions`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::error::{into_axum_response, ProxyError};
use crate::protocol::openai_chat::ChatCompletionRequest;
use crate::state::AppState;

pub(crate) mod flow;
pub(crate) mod io;

use self::flow::handler_inner;

pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Response {
    match handler_inner(state, headers, body).await {
        Ok(response) => response,
        Err(err) => into_axum_response(&err),
    }
}

pub(crate) fn parse_chat_request(body: &[u8]) -> Result<ChatCompletionRequest, ProxyError> {
    serde_json::from_slice(body)
        .map_err(|e| ProxyError::InvalidRequest(format!("Invalid chat completion request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_missing_messages() {
        let err = parse_chat_request(br#"{"model":"deepseek-v3"}"#).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_accepts_yuanbao_fields() {
        let req = parse_chat_request(
            br#"{"model":"deepseek-v3","messages":[],"stream":true,"chat_id":"c1",
                "agent_id":"a1","multimedia":[{"type":"image"}],"should_remove_conversation":true}"#,
        )
        .unwrap();
        assert!(req.stream);
        assert_eq!(req.chat_id.as_deref(), Some("c1"));
        assert_eq!(req.agent_id.as_deref(), Some("a1"));
        assert!(req.should_remove_conversation);
        assert!(req.multimedia.is_some());
    }
}
