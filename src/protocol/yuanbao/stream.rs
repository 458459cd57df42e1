use serde_json::Value;

use crate::error::ProxyError;
use crate::protocol::canonical::{NormalizedChunk, Usage, DEFAULT_FINISH_REASON};

use super::{EmbeddedEnvelope, UpstreamEvent};

const DATA_PREFIX: &str = "data: ";
const DONE_PAYLOAD: &str = "[DONE]";

/// What a single upstream line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank line, non-`data:` line, keepalive or tolerated garbage.
    Skip,
    Chunk(NormalizedChunk),
    /// `[DONE]` was seen: the final chunk carrying the running finish reason.
    Terminal(NormalizedChunk),
}

/// Per-request state for decoding the Yuanbao event stream line by line.
#[derive(Debug)]
pub struct UpstreamLineDecoder {
    finish_reason: String,
    strict_json: bool,
    done: bool,
}

impl UpstreamLineDecoder {
    #[must_use]
    pub fn new(strict_json: bool) -> Self {
        Self {
            finish_reason: DEFAULT_FINISH_REASON.to_string(),
            strict_json,
            done: false,
        }
    }

    #[must_use]
    pub fn finish_reason(&self) -> &str {
        &self.finish_reason
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode one line (without its line terminator).
    ///
    /// Lines after `[DONE]` are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Decode` for a `{`-prefixed payload that is not
    /// valid JSON when strict mode is on.
    pub fn decode_line(&mut self, line: &str) -> Result<LineOutcome, ProxyError> {
        if self.done {
            return Ok(LineOutcome::Skip);
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(LineOutcome::Skip);
        };

        if payload == DONE_PAYLOAD {
            self.done = true;
            return Ok(LineOutcome::Terminal(NormalizedChunk::terminal(
                self.finish_reason.clone(),
            )));
        }
        if !payload.starts_with('{') {
            tracing::debug!("skipping non-JSON upstream payload: {payload}");
            return Ok(LineOutcome::Skip);
        }

        let event: UpstreamEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) if self.strict_json => {
                return Err(ProxyError::Decode(format!(
                    "malformed upstream event: {e}"
                )));
            }
            Err(e) => {
                tracing::warn!("skipping malformed upstream event: {e}");
                return Ok(LineOutcome::Skip);
            }
        };

        if let Some(reason) = event.stop_reason.as_ref().and_then(Value::as_str) {
            if !reason.is_empty() {
                reason.clone_into(&mut self.finish_reason);
            }
        }

        Ok(LineOutcome::Chunk(NormalizedChunk::text(extract_content(
            &event,
        ))))
    }
}

/// Content lookup order: `content.msg`, then string `content`, then
/// top-level `msg` when the former gave nothing.
fn extract_content(event: &UpstreamEvent) -> &str {
    let from_content = match &event.content {
        Some(Value::Object(map)) => map.get("msg").and_then(Value::as_str),
        Some(Value::String(text)) => Some(text.as_str()),
        _ => None,
    }
    .unwrap_or("");
    if !from_content.is_empty() {
        return from_content;
    }
    event.msg.as_ref().and_then(Value::as_str).unwrap_or("")
}

/// Interpretation of a chunk's content for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddedEvent<'a> {
    /// Token accounting; `None` when the counters were absent or empty.
    Meta(Option<Usage>),
    /// Text fragment carried inside an embedded object.
    Text(String),
    /// Embedded object with an unknown or missing `type`.
    Ignored,
    /// Plain text, or `{`-prefixed text that is not JSON.
    Literal(&'a str),
}

#[must_use]
pub fn classify_embedded(content: &str) -> EmbeddedEvent<'_> {
    if !content.starts_with('{') {
        return EmbeddedEvent::Literal(content);
    }
    let Ok(envelope) = serde_json::from_str::<EmbeddedEnvelope>(content) else {
        return EmbeddedEvent::Literal(content);
    };
    match envelope.kind() {
        Some("meta") => EmbeddedEvent::Meta(
            envelope
                .token_usage_info
                .filter(|info| !info.is_empty())
                .map(|info| Usage {
                    prompt_tokens: info.prompt_tokens.unwrap_or(0),
                    completion_tokens: info.completion_tokens.unwrap_or(0),
                    total_tokens: info.total_tokens.unwrap_or(0),
                }),
        ),
        Some("text") => EmbeddedEvent::Text(
            envelope
                .msg
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        ),
        other => {
            tracing::debug!("ignoring embedded event type {other:?}");
            EmbeddedEvent::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(outcome: LineOutcome) -> NormalizedChunk {
        match outcome {
            LineOutcome::Chunk(chunk) => chunk,
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn test_content_then_done() {
        let mut decoder = UpstreamLineDecoder::new(true);
        let first = chunk(decoder.decode_line(r#"data: {"content":"hi"}"#).unwrap());
        assert_eq!(first, NormalizedChunk::text("hi"));

        let last = decoder.decode_line("data: [DONE]").unwrap();
        assert_eq!(last, LineOutcome::Terminal(NormalizedChunk::terminal("stop")));
        assert!(decoder.is_done());
        assert_eq!(
            decoder.decode_line(r#"data: {"content":"late"}"#).unwrap(),
            LineOutcome::Skip
        );
    }

    #[test]
    fn test_content_fallback_order() {
        let mut decoder = UpstreamLineDecoder::new(true);
        let a = chunk(decoder.decode_line(r#"data: {"content":{"msg":"A"}}"#).unwrap());
        let b = chunk(decoder.decode_line(r#"data: {"content":"B"}"#).unwrap());
        let c = chunk(decoder.decode_line(r#"data: {"msg":"C"}"#).unwrap());
        assert_eq!(a.content, "A");
        assert_eq!(b.content, "B");
        assert_eq!(c.content, "C");
    }

    #[test]
    fn test_top_level_msg_used_when_content_empty() {
        let mut decoder = UpstreamLineDecoder::new(true);
        let out = chunk(
            decoder
                .decode_line(r#"data: {"content":"","msg":"fallback"}"#)
                .unwrap(),
        );
        assert_eq!(out.content, "fallback");

        let out = chunk(decoder.decode_line(r#"data: {"content":[1,2]}"#).unwrap());
        assert_eq!(out.content, "");
        assert!(out.finish_reason.is_none());
    }

    #[test]
    fn test_skips_non_data_and_keepalive_lines() {
        let mut decoder = UpstreamLineDecoder::new(true);
        for line in ["", "event: ping", ": comment", "data: ping", "data:{\"content\":\"x\"}"] {
            assert_eq!(decoder.decode_line(line).unwrap(), LineOutcome::Skip, "{line}");
        }
    }

    #[test]
    fn test_stop_reason_overwrites_running_reason() {
        let mut decoder = UpstreamLineDecoder::new(true);
        decoder
            .decode_line(r#"data: {"content":"x","stopReason":"length"}"#)
            .unwrap();
        decoder.decode_line(r#"data: {"stopReason":""}"#).unwrap();
        assert_eq!(decoder.finish_reason(), "length");
        assert_eq!(
            decoder.decode_line("data: [DONE]").unwrap(),
            LineOutcome::Terminal(NormalizedChunk::terminal("length"))
        );
    }

    #[test]
    fn test_malformed_json_strict_and_lenient() {
        let mut strict = UpstreamLineDecoder::new(true);
        let err = strict.decode_line("data: {not json").unwrap_err();
        assert!(matches!(err, ProxyError::Decode(_)));

        let mut lenient = UpstreamLineDecoder::new(false);
        assert_eq!(
            lenient.decode_line("data: {not json").unwrap(),
            LineOutcome::Skip
        );
    }

    #[test]
    fn test_classify_meta_and_text() {
        let meta = classify_embedded(
            r#"{"type":"meta","tokenUsageInfo":{"promptTokens":5,"completionTokens":2,"totalTokens":7}}"#,
        );
        assert_eq!(
            meta,
            EmbeddedEvent::Meta(Some(Usage {
                prompt_tokens: 5,
                completion_tokens: 2,
                total_tokens: 7,
            }))
        );
        assert_eq!(
            classify_embedded(r#"{"type":"meta","tokenUsageInfo":{}}"#),
            EmbeddedEvent::Meta(None)
        );
        assert_eq!(
            classify_embedded(r#"{"type":"text","msg":"hey"}"#),
            EmbeddedEvent::Text("hey".to_string())
        );
        assert_eq!(
            classify_embedded(r#"{"type":"text"}"#),
            EmbeddedEvent::Text(String::new())
        );
    }

    #[test]
    fn test_classify_ignored_and_literal() {
        assert_eq!(
            classify_embedded(r#"{"type":"search_result","docs":[]}"#),
            EmbeddedEvent::Ignored
        );
        assert_eq!(classify_embedded(r#"{"foo":1}"#), EmbeddedEvent::Ignored);
        assert_eq!(
            classify_embedded("{ not json"),
            EmbeddedEvent::Literal("{ not json")
        );
        assert_eq!(classify_embedded("plain"), EmbeddedEvent::Literal("plain"));
    }
}
