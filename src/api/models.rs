use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::error::into_axum_response;
use crate::protocol::openai_chat::{ModelEntry, ModelList};
use crate::routing::ModelRegistry;
use crate::state::AppState;

const MODEL_CREATED_AT: u64 = 1_677_610_602;
const MODEL_OWNER: &str = "tencent";

/// Serialize the model table once; the response never changes at runtime.
#[must_use]
pub fn build_models_response_body(models: &ModelRegistry) -> Bytes {
    let list = ModelList {
        object: "list".to_string(),
        data: models
            .iter()
            .map(|model| ModelEntry {
                id: model.name.clone(),
                object: "model".to_string(),
                created: MODEL_CREATED_AT,
                owned_by: MODEL_OWNER.to_string(),
            })
            .collect(),
    };
    serde_json::to_vec(&list).map_or_else(
        |err| {
            tracing::error!("failed to serialize model list: {err}");
            Bytes::from_static(b"{\"object\":\"list\",\"data\":[]}")
        },
        Bytes::from,
    )
}

/// List the configured models in `OpenAI` format.
#[must_use]
pub fn handler(State(state): State<Arc<AppState>>, headers: &HeaderMap) -> Response {
    if let Err(err) = state.authenticate(headers) {
        return into_axum_response(&err);
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        )],
        Body::from(state.models_response_body()),
    )
        .into_response()
}
