use futures_util::{Stream, StreamExt};

use crate::error::ProxyError;
use crate::protocol::canonical::{
    AggregatedCompletion, NormalizedChunk, StreamItem, Usage, DEFAULT_FINISH_REASON,
};
use crate::protocol::yuanbao::stream::{classify_embedded, EmbeddedEvent};

/// Folds normalized chunks into one completion.
#[derive(Debug)]
pub struct Aggregator {
    text: String,
    finish_reason: String,
    usage: Option<Usage>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            text: String::new(),
            finish_reason: DEFAULT_FINISH_REASON.to_string(),
            usage: None,
        }
    }

    pub fn push(&mut self, chunk: &NormalizedChunk) {
        match classify_embedded(&chunk.content) {
            EmbeddedEvent::Meta(Some(usage)) => self.usage = Some(usage),
            EmbeddedEvent::Meta(None) | EmbeddedEvent::Ignored => {}
            EmbeddedEvent::Text(fragment) => self.text.push_str(&fragment),
            EmbeddedEvent::Literal(text) => self.text.push_str(text),
        }
        if let Some(reason) = chunk.finish_reason.as_deref() {
            if !reason.is_empty() {
                reason.clone_into(&mut self.finish_reason);
            }
        }
    }

    #[must_use]
    pub fn finish(self) -> AggregatedCompletion {
        AggregatedCompletion {
            text: self.text,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

/// Drain a decoded chunk stream into a single completion.
///
/// Stops at the sentinel or at the end of the stream, whichever comes first.
///
/// # Errors
///
/// Returns the first error produced by the stream; nothing partial is kept.
pub async fn aggregate_stream<S>(stream: S) -> Result<AggregatedCompletion, ProxyError>
where
    S: Stream<Item = Result<StreamItem, ProxyError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut aggregator = Aggregator::new();
    while let Some(item) = stream.next().await {
        match item? {
            StreamItem::Chunk(chunk) => aggregator.push(&chunk),
            StreamItem::Done => break,
        }
    }
    Ok(aggregator.finish())
}
