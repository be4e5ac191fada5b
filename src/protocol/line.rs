//! Newline-delimited text framing
//!
//! Frame format:
//! ```text
//! +----------------------+------+
//! | UTF-8 text (no '\n') | '\n' |
//! +----------------------+------+
//! ```
//!
//! A `\r` directly before the terminator is dropped on decode, so both
//! `\n` and `\r\n` terminated peers are accepted. Lines have no length limit.

use bytes::{BufMut, Bytes, BytesMut};

/// Line terminator on the wire
pub const LINE_TERMINATOR: u8 = b'\n';

/// Default initial buffer capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Accumulates raw input from one connection and cuts it into lines.
///
/// Between calls to [`LineFramer::feed`] the buffer holds at most one
/// partial line and never a terminator.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
}

impl LineFramer {
    /// Create a new line framer
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new line framer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Feed a chunk and return every line it completes, in arrival order.
    ///
    /// Input after the last terminator stays buffered for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = data;

        while let Some(pos) = rest.iter().position(|&b| b == LINE_TERMINATOR) {
            self.buffer.extend_from_slice(&rest[..pos]);
            lines.push(self.take_line());
            rest = &rest[pos + 1..];
        }

        self.buffer.extend_from_slice(rest);
        lines
    }

    fn take_line(&mut self) -> String {
        let mut line = self.buffer.split();
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        String::from_utf8_lossy(&line).into_owned()
    }

    /// Get the number of bytes waiting for a terminator
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode one line of text for the wire, appending the terminator
pub fn encode_line(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(LINE_TERMINATOR);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"hello\n"), vec!["hello"]);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_partial_line_across_feeds() {
        let mut framer = LineFramer::new();

        assert!(framer.feed(b"Bo").is_empty());
        assert_eq!(framer.buffered_len(), 2);
        assert!(framer.feed(b"").is_empty());

        assert_eq!(framer.feed(b"b\nhi"), vec!["Bob"]);
        assert_eq!(framer.feed(b" there\n"), vec!["hi there"]);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"one\ntwo\n\nthree\nfour");
        assert_eq!(lines, vec!["one", "two", "", "three"]);
        assert_eq!(framer.buffered_len(), 4);
    }

    #[test]
    fn test_crlf_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"Ann\r\nhi\r\n"), vec!["Ann", "hi"]);

        // '\r' split from its '\n' by a read boundary
        assert!(framer.feed(b"bye\r").is_empty());
        assert_eq!(framer.feed(b"\n"), vec!["bye"]);
    }

    #[test]
    fn test_only_trailing_cr_is_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"a\rb\r\r\n"), vec!["a\rb\r"]);
    }

    #[test]
    fn test_multibyte_split_across_feeds() {
        let mut framer = LineFramer::new();
        let text = "héllo ✓\n".as_bytes();
        // split inside the three-byte check mark
        let cut = text.len() - 3;
        assert!(framer.feed(&text[..cut]).is_empty());
        assert_eq!(framer.feed(&text[cut..]), vec!["héllo ✓"]);
    }

    #[test]
    fn test_any_chunking_matches_single_feed() {
        let input = b"Alice\r\nhello world\n\nlast line\r\npartial";

        let mut whole = LineFramer::new();
        let expected = whole.feed(input);

        for cut in 0..=input.len() {
            let mut framer = LineFramer::new();
            let mut lines = framer.feed(&input[..cut]);
            lines.extend(framer.feed(&input[cut..]));
            assert_eq!(lines, expected, "cut at {}", cut);
            assert_eq!(framer.buffered_len(), whole.buffered_len());
        }

        let mut bytewise = LineFramer::new();
        let lines: Vec<String> = input
            .iter()
            .flat_map(|b| bytewise.feed(std::slice::from_ref(b)))
            .collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_lines_rejoin_to_normalized_input() {
        let input = "Bob\r\nhi\nhow are you\r\n";
        let mut framer = LineFramer::new();
        let rebuilt: String = framer
            .feed(input.as_bytes())
            .iter()
            .map(|line| format!("{}\n", line))
            .collect();
        assert_eq!(rebuilt, input.replace("\r\n", "\n"));
    }

    #[test]
    fn test_clear_drops_partial() {
        let mut framer = LineFramer::new();
        framer.feed(b"garbage");
        framer.clear();
        assert_eq!(framer.feed(b"ok\n"), vec!["ok"]);
    }

    #[test]
    fn test_encode_line() {
        assert_eq!(&encode_line("Bob: hi")[..], b"Bob: hi\n");
        assert_eq!(&encode_line("")[..], b"\n");
    }
}
