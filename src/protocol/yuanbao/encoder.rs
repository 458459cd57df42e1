use crate::protocol::openai_chat::ChatMessage;

use super::{ChatOptions, YuanbaoChatRequest};

const PLUGIN_ADAPTIVE: &str = "Adaptive";
const PROTOCOL_VERSION: &str = "v2";

/// Flatten a chat transcript into the single prompt string Yuanbao expects.
///
/// When the transcript contains no `user` message, every line keeps its role
/// as `"{role}: {content}"`. As soon as one `user` message is present the
/// roles are dropped and only the contents are joined. Lines are joined with
/// `\n`; an empty transcript gives an empty prompt.
#[must_use]
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    let has_user = messages.iter().any(|m| m.role == "user");
    let mut prompt = String::new();
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            prompt.push('\n');
        }
        if !has_user {
            prompt.push_str(&message.role);
            prompt.push_str(": ");
        }
        prompt.push_str(&message.text());
    }
    prompt
}

/// Inputs for one upstream chat call.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequestParts<'a> {
    pub agent_id: &'a str,
    pub prompt: &'a str,
    pub chat_model_id: &'a str,
    pub support_functions: &'a [String],
    pub multimedia: Option<&'a serde_json::Value>,
}

/// Build the upstream chat request body.
///
/// `multimedia` may be a single object or an array; anything else (including
/// `null`) sends an empty list.
#[must_use]
pub fn build_chat_request(parts: ChatRequestParts<'_>) -> YuanbaoChatRequest {
    let multimedia = match parts.multimedia {
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(item @ serde_json::Value::Object(_)) => vec![item.clone()],
        _ => Vec::new(),
    };
    let support_functions = if parts.support_functions.is_empty() {
        None
    } else {
        Some(parts.support_functions.to_vec())
    };

    YuanbaoChatRequest {
        model: "gpt_175B_0404".to_string(),
        prompt: parts.prompt.to_string(),
        plugin: PLUGIN_ADAPTIVE.to_string(),
        display_prompt: parts.prompt.to_string(),
        display_prompt_type: 1,
        options: ChatOptions::default(),
        multimedia,
        agent_id: parts.agent_id.to_string(),
        support_hint: 1,
        version: PROTOCOL_VERSION.to_string(),
        chat_model_id: parts.chat_model_id.to_string(),
        support_functions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_drops_roles_when_user_present() {
        let messages = vec![
            ChatMessage::new("system", "be brief"),
            ChatMessage::new("user", "hello"),
            ChatMessage::new("assistant", "hi"),
        ];
        assert_eq!(flatten_messages(&messages), "be brief\nhello\nhi");
    }

    #[test]
    fn test_flatten_keeps_roles_without_user() {
        let messages = vec![
            ChatMessage::new("system", "be brief"),
            ChatMessage::new("assistant", "ok"),
        ];
        assert_eq!(
            flatten_messages(&messages),
            "system: be brief\nassistant: ok"
        );
    }

    #[test]
    fn test_flatten_empty() {
        assert_eq!(flatten_messages(&[]), "");
    }

    #[test]
    fn test_flatten_single_user_message() {
        let messages = vec![ChatMessage::new("user", "ping")];
        assert_eq!(flatten_messages(&messages), "ping");
    }

    #[test]
    fn test_build_chat_request_maps_model_and_functions() {
        let functions = vec!["supportInternetSearch".to_string()];
        let req = build_chat_request(ChatRequestParts {
            agent_id: "agent-1",
            prompt: "hello",
            chat_model_id: "deep_seek",
            support_functions: &functions,
            multimedia: None,
        });
        assert_eq!(req.chat_model_id, "deep_seek");
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.display_prompt, "hello");
        assert_eq!(req.agent_id, "agent-1");
        assert_eq!(req.support_functions, Some(functions));
        assert!(req.multimedia.is_empty());
    }

    #[test]
    fn test_build_chat_request_wraps_single_multimedia_object() {
        let media = serde_json::json!({"type": "image", "url": "https://x/y.png"});
        let req = build_chat_request(ChatRequestParts {
            agent_id: "a",
            prompt: "p",
            chat_model_id: "m",
            support_functions: &[],
            multimedia: Some(&media),
        });
        assert_eq!(req.multimedia, vec![media]);
        assert!(req.support_functions.is_none());
    }
}
