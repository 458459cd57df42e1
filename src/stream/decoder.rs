use futures_util::{Stream, StreamExt};

use crate::error::ProxyError;
use crate::protocol::canonical::StreamItem;
use crate::protocol::yuanbao::stream::{LineOutcome, UpstreamLineDecoder};

enum Phase {
    Running,
    /// Terminal chunk was yielded; the sentinel is next.
    SentinelPending,
    Finished,
}

/// Turn upstream lines into normalized chunks.
///
/// The sequence ends right after [`StreamItem::Done`], after the first error,
/// or when the lines run out (in which case no sentinel is produced).
pub fn decode_upstream_stream<L>(
    lines: L,
    strict_json: bool,
) -> impl Stream<Item = Result<StreamItem, ProxyError>> + Send
where
    L: Stream<Item = Result<String, ProxyError>> + Send + 'static,
{
    futures_util::stream::unfold(
        (
            Box::pin(lines),
            UpstreamLineDecoder::new(strict_json),
            Phase::Running,
        ),
        |(mut lines, mut decoder, phase)| async move {
            match phase {
                Phase::Finished => return None,
                Phase::SentinelPending => {
                    return Some((Ok(StreamItem::Done), (lines, decoder, Phase::Finished)));
                }
                Phase::Running => {}
            }

            loop {
                let line = match lines.as_mut().next().await? {
                    Ok(line) => line,
                    Err(e) => return Some((Err(e), (lines, decoder, Phase::Finished))),
                };
                match decoder.decode_line(&line) {
                    Ok(LineOutcome::Skip) => {}
                    Ok(LineOutcome::Chunk(chunk)) => {
                        return Some((
                            Ok(StreamItem::Chunk(chunk)),
                            (lines, decoder, Phase::Running),
                        ));
                    }
                    Ok(LineOutcome::Terminal(chunk)) => {
                        return Some((
                            Ok(StreamItem::Chunk(chunk)),
                            (lines, decoder, Phase::SentinelPending),
                        ));
                    }
                    Err(e) => return Some((Err(e), (lines, decoder, Phase::Finished))),
                }
            }
        },
    )
}
