//! Upstream byte stream to text lines.
//!
//! Chunks from the HTTP body can end anywhere: inside a line, or inside a
//! multi-byte UTF-8 sequence. Incomplete tails are carried over to the next
//! chunk; the last unterminated line is flushed when the body ends.

use futures_util::{Stream, StreamExt};
use memchr::memchr2_iter;

use crate::error::ProxyError;

/// Incremental line splitter. Accepts `\n`, `\r\n` and bare `\r` terminators.
#[derive(Debug, Default)]
pub struct LineReader {
    buffer: String,
    read_offset: usize,
    utf8_tail: Vec<u8>,
    /// The previous chunk ended on `\r`; a leading `\n` belongs to it.
    skip_lf: bool,
}

impl LineReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and push every completed line into `out`.
    ///
    /// Invalid UTF-8 (as opposed to a sequence cut at the chunk end) is
    /// replaced with U+FFFD.
    pub fn feed_into(&mut self, bytes: &[u8], out: &mut Vec<String>) {
        if self.utf8_tail.is_empty() {
            self.push_bytes(bytes);
        } else {
            let mut joined = std::mem::take(&mut self.utf8_tail);
            joined.extend_from_slice(bytes);
            self.push_bytes(&joined);
        }
        self.split_lines(out);
    }

    /// Drain whatever is left once the body ended.
    pub fn finish_into(&mut self, out: &mut Vec<String>) {
        if !self.utf8_tail.is_empty() {
            let tail = std::mem::take(&mut self.utf8_tail);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let mut start = self.read_offset;
        if self.skip_lf && self.buffer.as_bytes().get(start) == Some(&b'\n') {
            start += 1;
        }
        let rest = &self.buffer[start..];
        if !rest.is_empty() {
            out.push(rest.to_string());
        }
        self.buffer.clear();
        self.read_offset = 0;
        self.skip_lf = false;
    }

    fn push_bytes(&mut self, mut bytes: &[u8]) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = bytes.split_at(e.valid_up_to());
                    // `valid` was just checked.
                    self.buffer
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        None => {
                            self.utf8_tail.extend_from_slice(rest);
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[len..];
                        }
                    }
                }
            }
        }
    }

    fn split_lines(&mut self, out: &mut Vec<String>) {
        let bytes = self.buffer.as_bytes();
        let mut scan_start = self.read_offset;
        if self.skip_lf && scan_start < bytes.len() {
            self.skip_lf = false;
            if bytes[scan_start] == b'\n' {
                scan_start += 1;
            }
        }

        let mut processed_up_to = scan_start;
        for rel_pos in memchr2_iter(b'\n', b'\r', &bytes[scan_start..]) {
            let line_end = scan_start + rel_pos;
            if line_end < processed_up_to {
                // `\n` of a `\r\n` pair already consumed.
                continue;
            }
            out.push(self.buffer[processed_up_to..line_end].to_string());
            processed_up_to = line_end + 1;
            if bytes[line_end] == b'\r' {
                match bytes.get(line_end + 1) {
                    Some(b'\n') => processed_up_to += 1,
                    None => self.skip_lf = true,
                    Some(_) => {}
                }
            }
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }
}

/// Split an HTTP body stream into lines.
///
/// A body read error is yielded once as `ProxyError::Transport` and ends the
/// stream.
pub fn upstream_line_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<String, ProxyError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    struct State<S> {
        stream: std::pin::Pin<Box<S>>,
        reader: LineReader,
        pending: std::collections::VecDeque<String>,
        scratch: Vec<String>,
        finished: bool,
    }

    let state = State {
        stream: Box::pin(byte_stream),
        reader: LineReader::new(),
        pending: std::collections::VecDeque::with_capacity(8),
        scratch: Vec::with_capacity(8),
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.pending.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }

            match state.stream.as_mut().next().await {
                Some(Ok(bytes)) => state.reader.feed_into(&bytes, &mut state.scratch),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((
                        Err(ProxyError::Transport(format!(
                            "failed to read upstream body: {e}"
                        ))),
                        state,
                    ));
                }
                None => {
                    state.finished = true;
                    state.reader.finish_into(&mut state.scratch);
                }
            }
            state.pending.extend(state.scratch.drain(..));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn feed_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut reader = LineReader::new();
        let mut out = Vec::new();
        for chunk in chunks {
            reader.feed_into(chunk, &mut out);
        }
        reader.finish_into(&mut out);
        out
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let lines = feed_all(&[b"data: {\"con", b"tent\":\"hi\"}\n\nda", b"ta: [DONE]\n"]);
        assert_eq!(lines, vec!["data: {\"content\":\"hi\"}", "", "data: [DONE]"]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let lines = feed_all(&[b"a\r\nb\r", b"\nc"]);
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_bare_cr_ends_a_line() {
        let lines = feed_all(&[b"data: {\"content\":\"a\"}\rdata: [DONE]\r"]);
        assert_eq!(lines, vec!["data: {\"content\":\"a\"}", "data: [DONE]"]);
    }

    #[test]
    fn test_bare_cr_blank_lines_and_split_pairs() {
        let lines = feed_all(&[b"a\r\rb\r", b"c\r", b"\n", b"\nd"]);
        assert_eq!(lines, vec!["a", "", "b", "c", "", "d"]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let text = "data: 你好\n".as_bytes();
        // Split inside the first CJK character (3 bytes).
        let lines = feed_all(&[&text[..7], &text[7..]]);
        assert_eq!(lines, vec!["data: 你好"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let lines = feed_all(&[b"a\xffb\n"]);
        assert_eq!(lines, vec!["a\u{fffd}b"]);
    }

    #[tokio::test]
    async fn test_stream_flushes_trailing_line() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"one\ntw")),
            Ok(Bytes::from_static(b"o")),
        ];
        let lines: Vec<String> = upstream_line_stream(futures_util::stream::iter(chunks))
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_stream_surfaces_body_error_once() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"one\n")),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from_static(b"never\n")),
        ];
        let items: Vec<Result<String, ProxyError>> =
            upstream_line_stream(futures_util::stream::iter(chunks))
                .collect()
                .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "one");
        assert!(matches!(items[1], Err(ProxyError::Transport(_))));
    }
}
