use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use pin_project_lite::pin_project;

use crate::error::ProxyError;
use crate::protocol::canonical::StreamItem;
use crate::protocol::openai_chat::stream::encode_stream_chunk;

use super::sse::{error_frame, openai_sse_frame, DONE_FRAME};

/// How an outward stream ended. `Ok` means `[DONE]` was written.
pub type StreamOutcome = Result<(), ProxyError>;

enum Phase {
    Streaming,
    Finished,
}

/// Re-encode decoded chunks as SSE frames, one frame per chunk.
///
/// On success the last frame is `[DONE]`. On failure, or when the upstream
/// ends without a sentinel, an `event: error` frame is written instead and
/// the stream ends. `on_finish` runs exactly once with the outcome, unless
/// the client goes away first.
pub fn encode_outward_stream<S, F>(
    items: S,
    model: String,
    created: u64,
    on_finish: F,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<StreamItem, ProxyError>> + Send + 'static,
    F: FnOnce(StreamOutcome) + Send + 'static,
{
    futures_util::stream::unfold(
        (Box::pin(items), Some(on_finish), Phase::Streaming),
        move |(mut items, mut on_finish, phase)| {
            let model = model.clone();
            async move {
                if matches!(phase, Phase::Finished) {
                    return None;
                }

                let (frame, outcome) = match items.as_mut().next().await {
                    Some(Ok(StreamItem::Chunk(chunk))) => {
                        match encode_stream_chunk(&chunk, &model, created) {
                            Ok(json) => {
                                let frame = Bytes::from(openai_sse_frame(&json));
                                return Some((Ok(frame), (items, on_finish, Phase::Streaming)));
                            }
                            Err(e) => (Bytes::from(error_frame(&e.to_string())), Err(e)),
                        }
                    }
                    Some(Ok(StreamItem::Done)) => (Bytes::from_static(DONE_FRAME.as_bytes()), Ok(())),
                    Some(Err(e)) => (Bytes::from(error_frame(&e.to_string())), Err(e)),
                    None => {
                        let e = ProxyError::Transport(
                            "upstream stream ended before [DONE]".to_string(),
                        );
                        (Bytes::from(error_frame(&e.to_string())), Err(e))
                    }
                };

                if let Some(callback) = on_finish.take() {
                    callback(outcome);
                }
                Some((Ok(frame), (items, on_finish, Phase::Finished)))
            }
        },
    )
}

pin_project! {
    /// Logs when the client drops the response before the stream finished.
    ///
    /// Dropping this also drops the inner pipeline and with it the upstream
    /// response, which releases the upstream connection.
    pub struct DisconnectGuard<S> {
        #[pin]
        inner: S,
        chat_id: String,
        finished: bool,
    }

    impl<S> PinnedDrop for DisconnectGuard<S> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if !*this.finished {
                tracing::debug!(chat_id = %this.chat_id, "client disconnected before stream completed");
            }
        }
    }
}

impl<S> DisconnectGuard<S> {
    pub fn new(inner: S, chat_id: String) -> Self {
        Self {
            inner,
            chat_id,
            finished: false,
        }
    }
}

impl<S: Stream> Stream for DisconnectGuard<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let poll = this.inner.poll_next(cx);
        if let Poll::Ready(None) = poll {
            *this.finished = true;
        }
        poll
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
