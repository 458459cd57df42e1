use serde::{Deserialize, Serialize};

/// Finish reason used when the upstream never reports one.
pub const DEFAULT_FINISH_REASON: &str = "stop";

/// One increment of upstream output, independent of upstream wire quirks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedChunk {
    pub content: String,
    /// Only set on the terminal chunk.
    pub finish_reason: Option<String>,
}

impl NormalizedChunk {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: None,
        }
    }

    #[must_use]
    pub fn terminal(finish_reason: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            finish_reason: Some(finish_reason.into()),
        }
    }
}

/// Item of the decoded upstream sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Chunk(NormalizedChunk),
    /// Terminal sentinel. Always last, at most once.
    Done,
}

/// Token usage as reported by upstream meta events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Result of folding a chunk sequence for a non-streaming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedCompletion {
    pub text: String,
    pub finish_reason: String,
    /// `None` when no meta event carried usage.
    pub usage: Option<Usage>,
}
