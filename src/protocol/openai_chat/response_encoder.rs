use crate::protocol::canonical::AggregatedCompletion;

use super::{AssistantMessage, ChatCompletionResponse, CompletionChoice, CompletionUsage};

/// Encode an aggregated completion into the `chat.completion` wire object.
///
/// Usage that was never reported upstream is written as explicit zeros.
#[must_use]
pub fn encode_chat_completion(
    completion: &AggregatedCompletion,
    id: &str,
    model: &str,
    created: u64,
) -> ChatCompletionResponse {
    let usage = completion.usage.unwrap_or_default();
    ChatCompletionResponse {
        id: id.to_string(),
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![CompletionChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: completion.text.clone(),
            },
            finish_reason: completion.finish_reason.clone(),
            logprobs: None,
        }],
        usage: CompletionUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            prompt_tokens_details: None,
            completion_tokens_details: None,
        },
        system_fingerprint: None,
        service_tier: None,
    }
}
