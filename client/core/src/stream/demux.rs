//! Record Demultiplexer
//!
//! Splits the reply body into JSON records. The backend writes one object
//! per event, usually newline-terminated, but chunk boundaries are
//! arbitrary and a chunk may hold several records or a fraction of one.
//!
//! # Framing
//!
//! ```text
//!   ...noise { "event": "RunStarted", "meta": { ... } } {"content":"Hel ...
//!            ^                                        ^ ^
//!            depth 1                          depth 0 | next record (partial,
//!                                                     | stays buffered)
//! ```
//!
//! The scanner counts `{` as +1 and `}` as -1 from the first `{` and cuts
//! the record when the count returns to zero. It is a character counter, not
//! a JSON validator: a balanced but malformed record is handed to the JSON
//! parser and rejected there. Braces inside string values are counted too,
//! so a value containing an unbalanced literal brace desynchronizes framing.
//!
//! Scanning works on bytes. `{` and `}` never occur inside a multi-byte
//! UTF-8 sequence, so every cut falls on a character boundary and a record
//! split across chunks mid-character is reassembled before decoding.

/// Minimum buffer capacity
const MIN_BUFFER_CAPACITY: usize = 4096;

const OPEN_BRACE: u8 = b'{';
const CLOSE_BRACE: u8 = b'}';

/// Buffers reply bytes and yields complete top-level `{...}` records
#[derive(Debug)]
pub struct StreamDemultiplexer {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
}

impl Default for StreamDemultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDemultiplexer {
    /// Create an empty demultiplexer
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn feed(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Append text to the buffer
    pub fn feed_str(&mut self, text: &str) {
        self.feed(text.as_bytes());
    }

    /// Cut the next complete record out of the buffer
    ///
    /// Returns `None` when the buffer holds no `{` or the first record is
    /// still unbalanced; the partial record stays buffered for the next
    /// [`feed`](Self::feed).
    pub fn next_record(&mut self) -> Option<String> {
        let unread = &self.buffer[self.read_pos..];
        let start = unread.iter().position(|&b| b == OPEN_BRACE)?;

        let mut depth: usize = 0;
        let mut end = None;
        for (offset, &byte) in unread[start..].iter().enumerate() {
            match byte {
                OPEN_BRACE => depth += 1,
                CLOSE_BRACE => depth = depth.saturating_sub(1),
                _ => {}
            }
            if depth == 0 {
                end = Some(start + offset);
                break;
            }
        }
        let end = end?;

        let record = String::from_utf8_lossy(&unread[start..=end]).into_owned();
        self.read_pos += end + 1;
        Some(record)
    }

    /// Cut every complete record currently buffered, in order
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.next_record()).collect()
    }

    /// Bytes not yet consumed by a record
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.read_pos..]
    }

    /// Whether the unconsumed bytes contain anything but whitespace
    #[must_use]
    pub fn has_leftover(&self) -> bool {
        self.pending().iter().any(|b| !b.is_ascii_whitespace())
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_split_across_feeds() {
        let mut demux = StreamDemultiplexer::new();

        demux.feed_str(r#"{"a":1}{"b":"#);
        assert_eq!(demux.drain(), vec![r#"{"a":1}"#.to_string()]);
        assert_eq!(demux.pending(), br#"{"b":"#);

        demux.feed_str("2}");
        assert_eq!(demux.drain(), vec![r#"{"b":2}"#.to_string()]);
        assert!(demux.pending().is_empty());
    }

    #[test]
    fn test_multiple_records_in_one_feed() {
        let mut demux = StreamDemultiplexer::new();
        demux.feed_str("{\"event\":\"RunStarted\"}\n{\"content\":\"Hi\"}\n{\"x\":{\"y\":1}}\n");

        let records = demux.drain();
        assert_eq!(
            records,
            vec![
                r#"{"event":"RunStarted"}"#.to_string(),
                r#"{"content":"Hi"}"#.to_string(),
                r#"{"x":{"y":1}}"#.to_string(),
            ]
        );
        assert!(!demux.has_leftover());
    }

    #[test]
    fn test_empty_feed_is_noop() {
        let mut demux = StreamDemultiplexer::new();
        demux.feed(&[]);
        assert!(demux.next_record().is_none());
        assert!(demux.pending().is_empty());
    }

    #[test]
    fn test_noise_before_record_is_dropped() {
        let mut demux = StreamDemultiplexer::new();
        demux.feed_str("data: {\"a\":1} trailing");

        assert_eq!(demux.next_record().as_deref(), Some(r#"{"a":1}"#));
        assert!(demux.next_record().is_none());
        assert!(demux.has_leftover());
    }

    #[test]
    fn test_balanced_but_malformed_record_is_emitted() {
        let mut demux = StreamDemultiplexer::new();
        demux.feed_str("{not json}{\"ok\":true}");

        let records = demux.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], "{not json}");
        assert!(serde_json::from_str::<serde_json::Value>(&records[0]).is_err());
        assert!(serde_json::from_str::<serde_json::Value>(&records[1]).is_ok());
    }

    #[test]
    fn test_multibyte_character_split_across_feeds() {
        let input = r#"{"content":"Olá, torcedor da FURIA 🐆"}"#.as_bytes();
        // Split inside the four-byte emoji
        let split = input.len() - 4;

        let mut demux = StreamDemultiplexer::new();
        demux.feed(&input[..split]);
        assert!(demux.next_record().is_none());
        demux.feed(&input[split..]);

        assert_eq!(
            demux.next_record().as_deref(),
            Some(r#"{"content":"Olá, torcedor da FURIA 🐆"}"#)
        );
    }

    #[test]
    fn test_chunking_invariance() {
        let input = "{\"event\":\"RunStarted\"}\n{\"content\":\"a{b}c\"}{\"n\":{\"m\":[1,2]}}\n{\"tail\":";
        let expected = {
            let mut demux = StreamDemultiplexer::new();
            demux.feed_str(input);
            demux.drain()
        };
        assert_eq!(expected.len(), 3);

        for split in 0..=input.len() {
            let mut demux = StreamDemultiplexer::new();
            let mut records = Vec::new();
            demux.feed(&input.as_bytes()[..split]);
            records.extend(demux.drain());
            demux.feed(&input.as_bytes()[split..]);
            records.extend(demux.drain());
            assert_eq!(records, expected, "split at byte {split}");
            assert_eq!(
                String::from_utf8_lossy(demux.pending()).trim_start(),
                "{\"tail\":"
            );
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = r#"{"a":{"b":{}}}{"c":"d"}"#;
        let mut demux = StreamDemultiplexer::new();
        let mut records = Vec::new();
        for byte in input.as_bytes() {
            demux.feed(std::slice::from_ref(byte));
            records.extend(demux.drain());
        }
        assert_eq!(records, vec![r#"{"a":{"b":{}}}"#, r#"{"c":"d"}"#]);
    }

    #[test]
    fn test_compaction_keeps_partial_record() {
        let mut demux = StreamDemultiplexer::new();
        let record = format!("{{\"content\":\"{}\"}}", "x".repeat(1000));
        for _ in 0..10 {
            demux.feed_str(&record);
            assert!(demux.next_record().is_some());
        }
        demux.feed_str("{\"partial\":");
        demux.feed_str("true}");
        assert_eq!(demux.next_record().as_deref(), Some("{\"partial\":true}"));
    }

    #[test]
    fn test_clear() {
        let mut demux = StreamDemultiplexer::new();
        demux.feed_str("{\"open\":");
        demux.clear();
        assert!(demux.pending().is_empty());
        demux.feed_str("{}");
        assert_eq!(demux.next_record().as_deref(), Some("{}"));
    }
}
