use std::sync::Arc;

use axum::http::HeaderMap;

use crate::error::ProxyError;
use crate::state::AppState;

/// Use the caller's conversation when given, otherwise provision one.
pub(crate) async fn resolve_chat_id(
    state: &AppState,
    upstream_headers: &HeaderMap,
    requested: Option<&str>,
    agent_id: &str,
) -> Result<String, ProxyError> {
    if let Some(chat_id) = requested.filter(|id| !id.is_empty()) {
        return Ok(chat_id.to_string());
    }
    let chat_id = state
        .transport
        .create_conversation(&state.upstream, upstream_headers, agent_id)
        .await?;
    tracing::info!(chat_id = %chat_id, agent_id, "conversation created");
    Ok(chat_id)
}

/// Delete the upstream conversation in the background. Failures are only logged.
pub(crate) fn spawn_conversation_removal(
    state: Arc<AppState>,
    upstream_headers: HeaderMap,
    chat_id: String,
) {
    tokio::spawn(async move {
        match state
            .transport
            .remove_conversation(&state.upstream, &upstream_headers, &chat_id)
            .await
        {
            Ok(()) => tracing::info!(chat_id = %chat_id, "conversation removed"),
            Err(err) => {
                tracing::warn!(chat_id = %chat_id, error = %err, "failed to remove conversation");
            }
        }
    });
}
