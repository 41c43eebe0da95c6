//! Accumulation buffer with line-ending-insensitive literal matching.
//!
//! Remote CLIs terminate lines inconsistently and interleave command echo
//! with output, so all matching happens on a view of the accumulated text
//! with carriage returns and newlines removed. The raw bytes are kept for
//! logging and diagnostics.

use bytes::BytesMut;
use memchr::memmem;

/// Remove carriage returns and newlines from a response for matching.
pub fn strip_line_endings(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Buffer accumulating raw console output for one exchange.
///
/// Pure text state: appending mutates the buffer, everything else is a
/// read-only function of its contents. The buffer never touches the
/// transport.
#[derive(Debug, Default)]
pub struct LineBuffer {
    raw: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            raw: BytesMut::with_capacity(4096),
        }
    }

    /// Append a chunk of raw bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        self.raw.extend_from_slice(bytes);
    }

    /// The raw accumulated bytes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The accumulated text with CR/LF removed, recomputed per call.
    pub fn normalized(&self) -> String {
        strip_line_endings(&String::from_utf8_lossy(&self.raw))
    }

    /// Whether the normalized text ends with the literal.
    pub fn ends_with(&self, literal: &str) -> bool {
        self.normalized().ends_with(literal)
    }

    /// Whether the normalized text contains the literal anywhere.
    pub fn contains(&self, literal: &str) -> bool {
        memmem::find(self.normalized().as_bytes(), literal.as_bytes()).is_some()
    }

    /// Take the accumulated text (lossy UTF-8, line endings intact) and
    /// reset the buffer for the next exchange.
    pub fn take(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.raw).to_string();
        self.raw.clear();
        text
    }

    pub fn clear(&mut self) {
        self.raw.clear();
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_raw() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"Router");
        buffer.append(b"#");
        assert_eq!(buffer.raw(), b"Router#");
        assert_eq!(buffer.len(), 7);
    }

    #[test]
    fn test_normalized_strips_line_endings() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"show version\r\nIOS blah\r\nRouter#");
        assert_eq!(buffer.normalized(), "show versionIOS blahRouter#");
    }

    #[test]
    fn test_suffix_match_across_chunks() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"Router(con");
        assert!(!buffer.ends_with("(config)#"));
        buffer.append(b"fig)#");
        assert!(buffer.ends_with("(config)#"));
        assert!(buffer.ends_with("#"));
    }

    #[test]
    fn test_suffix_ignores_trailing_newline() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"Router#\r\n");
        assert!(buffer.ends_with("#"));
    }

    #[test]
    fn test_contains() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"Address or name of remote host []? ");
        assert!(buffer.contains("Address or name of remote host"));
        assert!(!buffer.contains("Source filename"));
    }

    #[test]
    fn test_matching_is_idempotent() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"some output\r\nRouter#");
        for _ in 0..3 {
            assert!(buffer.ends_with("#"));
            assert!(buffer.contains("output"));
        }
        assert_eq!(buffer.raw(), b"some output\r\nRouter#");
    }

    #[test]
    fn test_take_resets() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"Router#");
        assert_eq!(buffer.take(), "Router#");
        assert!(buffer.is_empty());
        assert!(!buffer.ends_with("#"));
    }
}
