//! Incremental server-sent events decoder
//!
//! Bytes arrive in arbitrary chunks; lines are split on `\n` (a trailing
//! `\r` is stripped) and a blank line dispatches the accumulated message.
//!
//! ```text
//! : heartbeat           <- comment, counted and skipped
//! id: 7                 <- last event id
//! data: {"type":...}    <- data lines, joined with '\n'
//!                       <- blank line: dispatch
//! ```
//!
//! Each byte is scanned for a newline once, however the line is chunked.
//! Lines longer than the decoder's cap are dropped along with the message
//! they belong to.

use bytes::{Buf, BytesMut};

/// One dispatched message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseMessage {
    /// `event:` field, if any
    pub event: Option<String>,
    /// `id:` field, if any
    pub id: Option<String>,
    pub data: String,
}

/// Longest line kept by default (128 MiB)
///
/// Comfortably above a 64 MiB upload re-encoded as base64.
pub const DEFAULT_MAX_LINE: usize = 128 * 1024 * 1024;

/// Stateful line decoder
#[derive(Debug)]
pub struct SseDecoder {
    buf: BytesMut,
    /// Prefix of `buf` known to hold no newline
    scanned: usize,
    max_line: usize,
    /// Dropping bytes up to the end of an oversized line
    skipping: bool,
    /// Current message lost a line to the cap
    truncated: bool,
    event: Option<String>,
    id: Option<String>,
    data: String,
    has_data: bool,
    comments: u64,
    oversized: u64,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that drops lines longer than `max_line` bytes
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line: max_line.max(1),
            skipping: false,
            truncated: false,
            event: None,
            id: None,
            data: String::new(),
            has_data: false,
            comments: 0,
            oversized: 0,
        }
    }

    /// Append received bytes
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete message, or `None` until more bytes arrive
    pub fn next_message(&mut self) -> Option<SseMessage> {
        while let Some(line) = self.next_line() {
            if line.is_empty() {
                if let Some(message) = self.dispatch() {
                    return Some(message);
                }
                continue;
            }
            self.process_line(&line);
        }
        None
    }

    /// Comment lines seen so far (keep-alives)
    pub fn comments(&self) -> u64 {
        self.comments
    }

    /// Lines dropped for exceeding the length cap
    pub fn oversized(&self) -> u64 {
        self.oversized
    }

    /// Bytes buffered without a terminating newline
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Forget partial input, e.g. after the connection drops
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.skipping = false;
        self.truncated = false;
        self.event = None;
        self.id = None;
        self.data.clear();
        self.has_data = false;
    }

    fn next_line(&mut self) -> Option<String> {
        loop {
            let found = self.buf[self.scanned..].iter().position(|&b| b == b'\n');
            let Some(offset) = found else {
                self.scanned = self.buf.len();
                if self.skipping || self.scanned > self.max_line {
                    self.skip_line();
                }
                return None;
            };

            let end = self.scanned + offset;
            self.scanned = 0;
            let mut line = self.buf.split_to(end);
            self.buf.advance(1);

            if self.skipping {
                // Tail of an oversized line
                self.skipping = false;
                continue;
            }
            if line.len() > self.max_line {
                self.note_oversized(line.len());
                continue;
            }

            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }

    /// Discard the buffered head of a line that outgrew the cap
    fn skip_line(&mut self) {
        if !self.skipping {
            self.skipping = true;
            self.note_oversized(self.buf.len());
        }
        self.buf.clear();
        self.scanned = 0;
    }

    fn note_oversized(&mut self, len: usize) {
        self.oversized += 1;
        self.truncated = true;
        tracing::warn!(
            bytes = len,
            max_line = self.max_line,
            "Dropping oversized event line"
        );
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            self.comments += 1;
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_owned()),
            "id" if !value.contains('\0') => self.id = Some(value.to_owned()),
            // `retry` and unknown fields are ignored
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        let id = self.id.take();
        let truncated = std::mem::take(&mut self.truncated);
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        if truncated {
            self.data.clear();
            return None;
        }
        Some(SseMessage {
            event,
            id,
            data: std::mem::take(&mut self.data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut SseDecoder) -> Vec<SseMessage> {
        std::iter::from_fn(|| decoder.next_message()).collect()
    }

    #[test]
    fn test_single_message() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"id: 3\ndata: {\"a\":1}\n\n");

        let messages = drain(&mut decoder);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id.as_deref(), Some("3"));
        assert_eq!(messages[0].data, "{\"a\":1}");
        assert_eq!(messages[0].event, None);
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: hel");
        assert!(decoder.next_message().is_none());
        decoder.push(b"lo\n");
        assert!(decoder.next_message().is_none());
        decoder.push(b"\n");

        assert_eq!(decoder.next_message().unwrap().data, "hello");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"event: frame\r\ndata: one\r\ndata:two\r\n\r\n");

        let message = decoder.next_message().unwrap();
        assert_eq!(message.event.as_deref(), Some("frame"));
        assert_eq!(message.data, "one\ntwo");
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut decoder = SseDecoder::new();
        decoder.push(b":heartbeat\n\n: heartbeat\n\ndata: x\n\n");

        let messages = drain(&mut decoder);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, "x");
        assert_eq!(decoder.comments(), 2);
    }

    #[test]
    fn test_blank_line_without_data() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"event: ping\n\ndata: y\n\n");

        let message = decoder.next_message().unwrap();
        assert_eq!(message.event, None);
        assert_eq!(message.data, "y");
    }

    #[test]
    fn test_reset_drops_partial() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: partial\ndata: more");
        decoder.reset();
        decoder.push(b"data: fresh\n\n");

        assert_eq!(decoder.next_message().unwrap().data, "fresh");
    }

    #[test]
    fn test_large_event_in_small_chunks() {
        let size = 8 * 1024 * 1024;
        let mut body = b"data: ".to_vec();
        body.resize(body.len() + size, b'A');
        body.extend_from_slice(b"\n\n");

        let mut decoder = SseDecoder::new();
        let mut messages = Vec::new();
        for chunk in body.chunks(16 * 1024) {
            decoder.push(chunk);
            messages.extend(drain(&mut decoder));
            // Everything buffered has already been searched
            assert_eq!(decoder.scanned, decoder.pending());
        }

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data.len(), size);
        assert!(messages[0].data.bytes().all(|b| b == b'A'));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_oversized_line_dropped() {
        let mut decoder = SseDecoder::with_max_line(32);
        decoder.push(b"id: 1\ndata: ");
        for _ in 0..8 {
            decoder.push(&[b'x'; 16]);
            assert!(decoder.next_message().is_none());
            assert!(decoder.pending() <= 32);
        }
        decoder.push(b"\n\nid: 2\ndata: ok\n\n");

        let messages = drain(&mut decoder);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id.as_deref(), Some("2"));
        assert_eq!(messages[0].data, "ok");
        assert_eq!(decoder.oversized(), 1);
    }

    #[test]
    fn test_oversized_line_in_one_chunk() {
        let mut decoder = SseDecoder::with_max_line(8);
        decoder.push(b"data: 0123456789\n\ndata: ok\n\n");

        let messages = drain(&mut decoder);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, "ok");
        assert_eq!(decoder.oversized(), 1);
    }
}
