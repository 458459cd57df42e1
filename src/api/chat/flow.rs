use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::observability::log_request_complete;
use crate::protocol::openai_chat::response_encoder::encode_chat_completion;
use crate::protocol::yuanbao::encoder::{build_chat_request, flatten_messages, ChatRequestParts};
use crate::state::AppState;
use crate::stream::sse::sse_ok_response;
use crate::stream::{
    aggregate_stream, decode_upstream_stream, encode_outward_stream, upstream_line_stream,
    DisconnectGuard,
};
use crate::util::unix_now_secs;

use super::io::{resolve_chat_id, spawn_conversation_removal};
use super::parse_chat_request;

/// Lifecycle of one chat completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Idle,
    Resolving,
    Streaming,
    Done,
    Failed,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Resolving => "resolving",
            Stage::Streaming => "streaming",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

/// Tracks the stage and conversation id so failures are logged with both.
struct ChatFlow {
    stage: Stage,
    chat_id: Option<String>,
}

impl ChatFlow {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            chat_id: None,
        }
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(
            chat_id = self.chat_id.as_deref().unwrap_or("-"),
            from = self.stage.as_str(),
            to = stage.as_str(),
            "chat flow stage"
        );
        self.stage = stage;
    }

    fn fail(&mut self, err: ProxyError) -> ProxyError {
        log_failure(self.chat_id.as_deref(), self.stage, &err);
        self.stage = Stage::Failed;
        err
    }
}

fn log_failure(chat_id: Option<&str>, stage: Stage, err: &ProxyError) {
    tracing::error!(
        chat_id = chat_id.unwrap_or("-"),
        stage = stage.as_str(),
        error = %err,
        "chat completion failed"
    );
}

pub(crate) async fn handler_inner(
    state: Arc<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ProxyError> {
    let start_time = Instant::now();
    let mut flow = ChatFlow::new();

    let hy_token = state.upstream_token(&headers).map_err(|e| flow.fail(e))?;
    let request = parse_chat_request(&body).map_err(|e| flow.fail(e))?;
    flow.chat_id.clone_from(&request.chat_id);
    flow.advance(Stage::Resolving);

    // Resolve the model first so an invalid name never provisions a conversation.
    let model = state
        .models
        .lookup(&request.model)
        .map_err(|e| flow.fail(e))?;
    let agent_id = request
        .agent_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(&state.config.upstream.agent_id);
    let upstream_headers = state
        .upstream
        .build_upstream_headers(hy_token, agent_id)
        .map_err(|e| flow.fail(e))?;

    let chat_id = resolve_chat_id(
        &state,
        &upstream_headers,
        request.chat_id.as_deref(),
        agent_id,
    )
    .await
    .map_err(|e| flow.fail(e))?;
    flow.chat_id = Some(chat_id.clone());

    let prompt = flatten_messages(&request.messages);
    let upstream_request = build_chat_request(ChatRequestParts {
        agent_id,
        prompt: &prompt,
        chat_model_id: &model.upstream_id,
        support_functions: &model.support_functions,
        multimedia: request.multimedia.as_ref(),
    });

    tracing::info!(
        chat_id = %chat_id,
        model = %request.model,
        upstream_model = %model.upstream_id,
        stream = request.stream,
        "forwarding chat completion"
    );

    let upstream_response = state
        .transport
        .open_chat_stream(&state.upstream, &upstream_headers, &chat_id, &upstream_request)
        .await
        .map_err(|e| flow.fail(e))?;
    flow.advance(Stage::Streaming);

    let items = decode_upstream_stream(
        upstream_line_stream(upstream_response.bytes_stream()),
        state.config.features.strict_json_lines,
    );
    let created = unix_now_secs();
    let removal = request.should_remove_conversation.then_some(upstream_headers);

    if request.stream {
        let finish_state = Arc::clone(&state);
        let finish_chat_id = chat_id.clone();
        let client_model = request.model.clone();
        let on_finish = move |outcome: Result<(), ProxyError>| match outcome {
            Ok(()) => {
                log_request_complete(&client_model, &finish_chat_id, true, None, start_time);
                if let Some(upstream_headers) = removal {
                    spawn_conversation_removal(finish_state, upstream_headers, finish_chat_id);
                }
            }
            Err(err) => log_failure(Some(finish_chat_id.as_str()), Stage::Streaming, &err),
        };

        let frames = encode_outward_stream(items, request.model, created, on_finish);
        let body = Body::from_stream(DisconnectGuard::new(frames, chat_id));
        return Ok(sse_ok_response(body));
    }

    let completion = aggregate_stream(items).await.map_err(|e| flow.fail(e))?;
    flow.advance(Stage::Done);
    log_request_complete(
        &request.model,
        &chat_id,
        false,
        completion.usage.as_ref(),
        start_time,
    );
    if let Some(upstream_headers) = removal {
        spawn_conversation_removal(Arc::clone(&state), upstream_headers, chat_id);
    }

    let response = encode_chat_completion(
        &completion,
        &state.next_completion_id(),
        &request.model,
        created,
    );
    Ok(axum::Json(response).into_response())
}
