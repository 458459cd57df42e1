use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "yuanbao-proxy is running",
        "config": {
            "upstream_base_url": config.upstream.base_url,
            "default_agent_id": config.upstream.agent_id,
            "models_count": state.models.len(),
            "client_keys_count": config.client_authentication.allowed_keys.len(),
            "fixed_upstream_token": config.upstream.hy_token.is_some(),
            "features": {
                "log_level": config.features.log_level,
                "strict_json_lines": config.features.strict_json_lines,
            }
        }
    }))
}
