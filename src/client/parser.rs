//! Incremental parser for streamed JSON responses.
//!
//! Streaming commands (`add` progress, `refs`, `dag/import`, `log/tail`,
//! `pubsub/sub`) answer with a sequence of JSON values, either concatenated
//! or newline-delimited. Body chunks arrive with arbitrary boundaries, so a
//! value may be split across several chunks.
//!
//! # Parsing Flow
//!
//! 1. **Buffering**: append the incoming chunk to the pending buffer
//! 2. **Scanning**: walk only the new bytes, tracking nesting depth and string
//!    state, to find where each top-level value ends
//! 3. **Decoding**: deserialize each completed value from its own slice
//! 4. **Finished**: at end of input, a bare scalar is decoded and anything
//!    else left open is a truncated value
//!
//! Bytes are scanned once and released as soon as their value completes, so
//! a large value split into many chunks costs time linear in its size.
//!
//! # Examples
//!
//! ```
//! use ipfs_shell::client::JsonStreamParser;
//! use serde_json::Value;
//!
//! let mut parser = JsonStreamParser::<Value>::new();
//! assert!(parser.feed(br#"{"Hash":"Qm1"}{"Ha"#).unwrap().len() == 1);
//! let rest = parser.feed(br#"sh":"Qm2"}"#).unwrap();
//! assert_eq!(rest[0]["Hash"], "Qm2");
//! assert!(parser.finish().unwrap().is_empty());
//! ```

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

use crate::error::{Result, ShellError};

/// Parse state of a [`JsonStreamParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// No pending bytes; the next byte starts a new value.
    Idle,
    /// Part of a value is buffered and more input is needed.
    Partial,
    /// A malformed value was seen; the parser accepts no more input.
    Error,
    /// End of input was signalled.
    Finished,
}

/// Finds top-level value boundaries without decoding.
///
/// Offsets are relative to the parser buffer and survive across chunks.
#[derive(Debug, Default)]
struct Scanner {
    /// Next byte to inspect
    pos: usize,
    /// Start of the value being scanned
    start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// The open value is a bare number, literal or junk
    scalar: bool,
}

impl Scanner {
    /// Advance through `buf` and return the span of the next complete value.
    fn next_value(&mut self, buf: &[u8]) -> Option<(usize, usize)> {
        while self.pos < buf.len() {
            let i = self.pos;
            let b = buf[i];
            self.pos += 1;

            let Some(start) = self.start else {
                if b.is_ascii_whitespace() {
                    continue;
                }
                self.start = Some(i);
                match b {
                    b'{' | b'[' => self.depth = 1,
                    b'"' => self.in_string = true,
                    _ => self.scalar = true,
                }
                continue;
            };

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Some(self.close(start, i + 1));
                    }
                }
                continue;
            }

            if self.scalar {
                if b.is_ascii_whitespace() || matches!(b, b'{' | b'[' | b'"') {
                    // The delimiter may open the next value.
                    self.pos = i;
                    return Some(self.close(start, i));
                }
                continue;
            }

            match b {
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(self.close(start, i + 1));
                    }
                }
                b'"' => self.in_string = true,
                _ => {}
            }
        }
        None
    }

    fn close(&mut self, start: usize, end: usize) -> (usize, usize) {
        self.start = None;
        self.depth = 0;
        self.scalar = false;
        (start, end)
    }

    /// Bytes before this offset belong to no open value.
    fn settled(&self) -> usize {
        self.start.unwrap_or(self.pos)
    }

    fn rebase(&mut self, n: usize) {
        self.pos -= n;
        if let Some(start) = self.start.as_mut() {
            *start -= n;
        }
    }
}

/// Incremental decoder for a stream of JSON values of type `T`.
#[derive(Debug)]
pub struct JsonStreamParser<T> {
    /// Bytes of the value still open, if any
    buffer: BytesMut,
    scanner: Scanner,
    state: ParseState,
    /// Values decoded so far, for diagnostics
    decoded: usize,
    /// Error held back so values preceding it in the same chunk are delivered first
    pending_error: Option<ShellError>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonStreamParser<T> {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanner: Scanner::default(),
            state: ParseState::Idle,
            decoded: 0,
            pending_error: None,
            _marker: PhantomData,
        }
    }

    /// Feed a body chunk, returning every value it completes.
    ///
    /// A malformed value is reported on the call that reaches it, unless
    /// complete values precede it in the same chunk: those are returned first
    /// and the error is reported by the next call to `feed` or `finish`.
    /// A bare scalar such as `42` only completes at the next delimiter or at
    /// [`finish`](Self::finish).
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<T>> {
        match self.state {
            ParseState::Error => {
                return Err(self.take_error());
            }
            ParseState::Finished => {
                return Err(ShellError::decode("input after end of stream"));
            }
            _ => {}
        }

        self.buffer.extend_from_slice(data);
        let mut values = Vec::new();

        while let Some((start, end)) = self.scanner.next_value(&self.buffer) {
            match serde_json::from_slice::<T>(&self.buffer[start..end]) {
                Ok(value) => values.push(value),
                Err(e) => return self.fail(values, e),
            }
        }

        let settled = self.scanner.settled();
        self.buffer.advance(settled);
        self.scanner.rebase(settled);
        self.decoded += values.len();
        self.state = if self.scanner.start.is_some() {
            ParseState::Partial
        } else {
            ParseState::Idle
        };
        Ok(values)
    }

    /// Signal end of input, returning a trailing bare scalar if one was open.
    ///
    /// Fails when an object, array or string was left incomplete.
    pub fn finish(&mut self) -> Result<Vec<T>> {
        let state = self.state;
        self.state = ParseState::Finished;
        match state {
            ParseState::Partial if self.scanner.scalar => {
                let value = serde_json::from_slice::<T>(&self.buffer)?;
                self.buffer.clear();
                self.decoded += 1;
                Ok(vec![value])
            }
            ParseState::Partial => Err(ShellError::decode(format!(
                "stream ended inside a JSON value after {} complete values",
                self.decoded
            ))),
            ParseState::Error => Err(self.take_error()),
            ParseState::Idle | ParseState::Finished => Ok(Vec::new()),
        }
    }

    fn fail(&mut self, values: Vec<T>, e: serde_json::Error) -> Result<Vec<T>> {
        self.state = ParseState::Error;
        self.buffer.clear();
        if values.is_empty() {
            return Err(ShellError::Json(e));
        }
        self.decoded += values.len();
        self.pending_error = Some(ShellError::Json(e));
        Ok(values)
    }

    fn take_error(&mut self) -> ShellError {
        self.pending_error
            .take()
            .unwrap_or_else(|| ShellError::decode("parser already failed"))
    }

    /// Current parse state.
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Number of values decoded so far.
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// Bytes held for the value still open.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl<T: DeserializeOwned> Default for JsonStreamParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Obj {
        #[serde(rename = "Hash")]
        hash: String,
    }

    #[test]
    fn test_parser_creation() {
        let parser = JsonStreamParser::<Value>::new();
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn test_concatenated_values() {
        let mut parser = JsonStreamParser::<Obj>::new();
        let values = parser
            .feed(br#"{"Hash":"a"}{"Hash":"b"}{"Hash":"c"}"#)
            .unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[2].hash, "c");
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn test_newline_delimited_values() {
        let mut parser = JsonStreamParser::<Obj>::new();
        let values = parser.feed(b"{\"Hash\":\"a\"}\n{\"Hash\":\"b\"}\n").unwrap();
        assert_eq!(values.len(), 2);
        assert!(parser.finish().unwrap().is_empty());
    }

    #[test]
    fn test_value_split_across_chunks() {
        let mut parser = JsonStreamParser::<Obj>::new();
        assert!(parser.feed(br#"{"Ha"#).unwrap().is_empty());
        assert_eq!(parser.state(), ParseState::Partial);
        assert!(parser.feed(br#"sh":"#).unwrap().is_empty());
        let values = parser.feed(br#""x"}"#).unwrap();
        assert_eq!(values, vec![Obj { hash: "x".into() }]);
        assert_eq!(parser.decoded(), 1);
    }

    #[test]
    fn test_strings_hide_brackets_and_quotes() {
        let mut parser = JsonStreamParser::<Value>::new();
        let text = br#"{"k":"}\"{[","n":[1,{"m":"]"}]}"#;
        let mut values = Vec::new();
        for byte in text.chunks(1) {
            values.extend(parser.feed(byte).unwrap());
        }
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["k"], "}\"{[");
        assert_eq!(values[0]["n"][1]["m"], "]");
    }

    #[test]
    fn test_bare_scalars_complete_at_delimiter_or_end() {
        let mut parser = JsonStreamParser::<Value>::new();
        let values = parser.feed(b"1 \"two\"3\n4").unwrap();
        assert_eq!(values, vec![Value::from(1), Value::from("two"), Value::from(3)]);
        assert_eq!(parser.finish().unwrap(), vec![Value::from(4)]);
    }

    #[test]
    fn test_completed_values_release_their_bytes() {
        let mut parser = JsonStreamParser::<Value>::new();
        parser.feed(b"{\"a\":1}\n{\"b\"").unwrap();
        assert_eq!(parser.buffered(), 4);
        parser.feed(b":2}  ").unwrap();
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_large_value_in_small_chunks() {
        #[derive(Deserialize)]
        struct Link {
            #[serde(rename = "Hash")]
            hash: String,
            #[serde(rename = "Size")]
            size: u64,
        }
        #[derive(Deserialize)]
        struct Node {
            #[serde(rename = "Links")]
            links: Vec<Link>,
        }

        let links: Vec<String> = (0..60_000)
            .map(|i| format!(r#"{{"Hash":"Qm{i:044}","Size":{i}}}"#))
            .collect();
        let body = format!(r#"{{"Links":[{}]}}"#, links.join(","));
        assert!(body.len() > 1024 * 1024);

        let mut parser = JsonStreamParser::<Node>::new();
        let mut nodes = Vec::new();
        for chunk in body.as_bytes().chunks(8 * 1024) {
            nodes.extend(parser.feed(chunk).unwrap());
        }
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].links.len(), 60_000);
        assert_eq!(nodes[0].links[59_999].size, 59_999);
        assert!(nodes[0].links[0].hash.starts_with("Qm000"));
        assert_eq!(parser.buffered(), 0);
        assert!(parser.finish().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_tail_is_error() {
        let mut parser = JsonStreamParser::<Obj>::new();
        parser.feed(br#"{"Hash":"a"}{"Hash":"#).unwrap();
        assert!(parser.finish().is_err());
    }

    #[test]
    fn test_malformed_value_is_error() {
        let mut parser = JsonStreamParser::<Value>::new();
        assert!(parser.feed(b"not-json\n").is_err());
        assert_eq!(parser.state(), ParseState::Error);
        assert!(parser.feed(b"{}").is_err());
    }

    #[test]
    fn test_values_before_error_are_delivered() {
        let mut parser = JsonStreamParser::<Value>::new();
        let values = parser.feed(b"{\"a\":1}{\"b\":2} garbage").unwrap();
        assert_eq!(values.len(), 2);
        assert!(matches!(parser.finish(), Err(ShellError::Json(_))));
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let mut parser = JsonStreamParser::<Obj>::new();
        assert!(parser.feed(br#"{"Hash":5}"#).is_err());
    }

    #[test]
    fn test_empty_stream_finishes_cleanly() {
        let mut parser = JsonStreamParser::<Obj>::new();
        assert!(parser.feed(b"").unwrap().is_empty());
        assert!(parser.finish().unwrap().is_empty());
    }
}
