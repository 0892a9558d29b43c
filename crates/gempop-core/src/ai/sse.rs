//! Incremental Server-Sent Events parser for `alt=sse` streaming bodies.
//!
//! Events are separated by a blank line; only `data:` lines are kept.

/// Buffers partial events across network chunk boundaries. Bytes are held
/// raw until an event completes so multi-byte characters split between
/// chunks decode intact.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the HTTP body. Returns the `data` payload of every
    /// event completed by this chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        // CRLF framing is common; normalise so the boundary search only sees \n
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();

        while let Some(boundary) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..boundary + 2).collect();
            if let Some(data) = data_payload(&String::from_utf8_lossy(&block)) {
                events.push(data);
            }
        }

        events
    }

    /// Flush an event left without a trailing blank line at end of body.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&String::from_utf8_lossy(&rest))
    }
}

/// Join the `data:` lines of one event block; other fields are ignored.
fn data_payload(block: &str) -> Option<String> {
    let data_lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|val| val.strip_prefix(' ').unwrap_or(val))
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_events() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: hello\n\ndata: world\n\n");
        assert_eq!(events, vec!["hello", "world"]);
    }

    #[test]
    fn test_crlf_framing() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: {\"a\":1}\r\n\r\ndata: {\"a\":2}\r\n\r\n");
        assert_eq!(events, vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: hel").is_empty());
        assert!(parser.feed(b"lo\r").is_empty());
        assert_eq!(parser.feed(b"\n\r\n"), vec!["hello"]);
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keepalive\n\nevent: message\nid: 7\ndata: x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let mut parser = SseParser::new();
        let bytes = "data: días\n\n".as_bytes();
        // split inside the two-byte 'í'
        let split = "data: d".len() + 1;
        assert!(parser.feed(&bytes[..split]).is_empty());
        assert_eq!(parser.feed(&bytes[split..]), vec!["días"]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: tail").is_empty());
        assert_eq!(parser.finish(), Some("tail".to_string()));
        assert_eq!(parser.finish(), None);
    }
}
