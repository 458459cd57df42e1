use crate::error::ProxyError;
use crate::protocol::canonical::NormalizedChunk;

use super::{ChatCompletionChunk, ChunkChoice, ChunkDelta};

/// Build the outward delta chunk for one normalized chunk.
#[must_use]
pub fn build_stream_chunk(chunk: &NormalizedChunk, model: &str, created: u64) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: None,
        object: None,
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: None,
            delta: ChunkDelta {
                content: Some(chunk.content.clone()),
            },
            finish_reason: chunk.finish_reason.clone(),
        }],
    }
}

/// Serialize one normalized chunk as `OpenAI` delta-chunk JSON.
///
/// The output depends only on the arguments, so encoding the same chunk with
/// the same timestamp twice gives identical bytes.
///
/// # Errors
///
/// Returns `ProxyError::Internal` if serialization fails.
pub fn encode_stream_chunk(
    chunk: &NormalizedChunk,
    model: &str,
    created: u64,
) -> Result<String, ProxyError> {
    serde_json::to_string(&build_stream_chunk(chunk, model, created))
        .map_err(|e| ProxyError::Internal(format!("failed to encode stream chunk: {e}")))
}
