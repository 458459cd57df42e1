pub mod encoder;
pub mod stream;

use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat/{chat_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YuanbaoChatRequest {
    pub model: String,
    pub prompt: String,
    pub plugin: String,
    pub display_prompt: String,
    pub display_prompt_type: u32,
    pub options: ChatOptions,
    pub multimedia: Vec<serde_json::Value>,
    pub agent_id: String,
    pub support_hint: u32,
    pub version: String,
    pub chat_model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_functions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    pub image_intention: ImageIntention,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageIntention {
    pub need_intention_model: bool,
    pub backend_update_flag: u32,
    pub intention_status: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            image_intention: ImageIntention {
                need_intention_model: true,
                backend_update_flag: 2,
                intention_status: true,
            },
        }
    }
}

/// Body of `POST /api/user/agent/conversation/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCreateRequest<'a> {
    pub agent_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationCreateResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Body of `POST /api/user/agent/conversation/v1/clear`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationClearRequest<'a> {
    pub conversation_ids: [&'a str; 1],
}

/// One `data:` payload of the upstream event stream.
///
/// Field shapes vary between event kinds, so the loosely-typed fields stay
/// as raw JSON values and are interpreted by the stream decoder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamEvent {
    #[serde(default, rename = "stopReason")]
    pub stop_reason: Option<serde_json::Value>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    #[serde(default)]
    pub msg: Option<serde_json::Value>,
}

/// Object embedded as a JSON string inside a content field.
///
/// Any JSON object parses; fields with an unexpected shape read as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddedEnvelope {
    #[serde(default, rename = "type")]
    pub type_: Option<serde_json::Value>,
    #[serde(default)]
    pub msg: Option<serde_json::Value>,
    #[serde(default, rename = "tokenUsageInfo", deserialize_with = "lenient_usage")]
    pub token_usage_info: Option<TokenUsageInfo>,
}

impl EmbeddedEnvelope {
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.type_.as_ref().and_then(serde_json::Value::as_str)
    }
}

fn lenient_usage<'de, D>(deserializer: D) -> Result<Option<TokenUsageInfo>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(value @ serde_json::Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageInfo {
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub completion_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_tokens: Option<u64>,
}

// Counters occasionally arrive as floats or numeric strings; anything else is treated as absent.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl TokenUsageInfo {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
    }
}
