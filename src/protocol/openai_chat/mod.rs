pub mod response_encoder;
pub mod stream;

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// `OpenAI` Chat Completion request as accepted by this proxy.
///
/// Besides the standard fields it carries the Yuanbao conversation controls
/// (`chat_id`, `agent_id`, `multimedia`, `should_remove_conversation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multimedia: Option<serde_json::Value>,
    #[serde(default)]
    pub should_remove_conversation: bool,
}

/// A role-tagged chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(MessageContent::Text(content.to_string())),
        }
    }

    /// Plain-text view of the content. Non-text parts are dropped.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        match &self.content {
            None => Cow::Borrowed(""),
            Some(MessageContent::Text(text)) => Cow::Borrowed(text.as_str()),
            Some(MessageContent::Parts(parts)) => {
                let mut parts = parts.iter().filter_map(ContentPart::text);
                match (parts.next(), parts.next()) {
                    (None, _) => Cow::Borrowed(""),
                    (Some(only), None) => Cow::Borrowed(only),
                    (Some(first), Some(second)) => {
                        let mut out = String::with_capacity(first.len() + second.len());
                        out.push_str(first);
                        out.push_str(second);
                        for part in parts {
                            out.push_str(part);
                        }
                        Cow::Owned(out)
                    }
                }
            }
        }
    }
}

/// `content` is either a string or an array of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentPart {
    fn text(&self) -> Option<&str> {
        if self.type_ == "text" {
            self.text.as_deref()
        } else {
            None
        }
    }
}

/// A streamed chunk. Unset optional fields are omitted on the wire, except
/// `finish_reason` which is always written (`null` when absent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Non-streaming `chat.completion` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: CompletionUsage,
    pub system_fingerprint: Option<String>,
    pub service_tier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
    pub logprobs: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

/// Usage block. The detail fields are always serialized as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub prompt_tokens_details: Option<serde_json::Value>,
    pub completion_tokens_details: Option<serde_json::Value>,
}

/// `GET /v1/models` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"deepseek-v3","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert!(!req.stream);
        assert!(!req.should_remove_conversation);
        assert!(req.chat_id.is_none());
        assert!(req.agent_id.is_none());
        assert_eq!(req.messages[0].text(), "hi");
    }

    #[test]
    fn test_message_parts_keep_text_only() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"role":"user","content":[
                {"type":"text","text":"look "},
                {"type":"image_url","image_url":{"url":"https://x/y.png"}},
                {"type":"text","text":"here"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(msg.text(), "look here");
    }

    #[test]
    fn test_null_content_is_empty_text() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":null}"#).unwrap();
        assert_eq!(msg.text(), "");
    }
}
