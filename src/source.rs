//! JSON document source.
//!
//! Reads whitespace-concatenated JSON documents one at a time. Every document
//! is an object or an array; a top-level scalar is malformed input. A
//! malformed document is reported with its absolute line, column and byte
//! offset; the caller decides whether to abort or to
//! [`DocumentSource::skip_to_boundary`] and keep reading.
use std::fmt;
use std::io::{self, BufRead, Read};
use serde::Deserialize;
use serde_json::Value;

// ------------------------------- Types ----------------------------------- //

/// Where documents come from.
pub trait DocumentSource {
    /// Next document, or `None` once the input is exhausted.
    ///
    /// `Err` is reserved for I/O failures of the underlying input.
    fn next_document(&mut self) -> io::Result<Option<Document>>;

    /// Discard the rest of the line the last malformed document stopped on.
    fn skip_to_boundary(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Parsed(Value),
    Malformed(ParseFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// 1-based line in the whole input.
    pub line: u64,
    /// Bytes into that line, through the offending byte; `0` when the
    /// offending byte was the line break itself.
    pub column: u64,
    /// Bytes consumed from the input, through the offending byte.
    pub offset: u64,
    pub message: String,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {}, pos {}: {}",
            self.line, self.column, self.offset, self.message
        )
    }
}

/// Streaming [`DocumentSource`] over any buffered reader.
pub struct JsonStream<R> {
    input: Tracked<R>,
    /// The last parse error stopped on a line break, so the next record
    /// boundary has already been reached.
    at_boundary: bool,
}

// ---------------------------- Implementation ----------------------------- //

impl<R: BufRead> JsonStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            input: Tracked {
                inner: reader,
                replay: Vec::new(),
                replay_pos: 0,
                taken: Vec::new(),
                line: 1,
                column: 0,
                offset: 0,
            },
            at_boundary: false,
        }
    }

    /// Consume whitespace and return the next byte without consuming it;
    /// `None` at end of input.
    fn skip_whitespace(&mut self) -> io::Result<Option<u8>> {
        loop {
            let buf = match self.input.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                return Ok(None);
            }
            let n = buf.iter().take_while(|b| is_json_whitespace(**b)).count();
            let next = buf.get(n).copied();
            let skipped = buf[..n].to_vec();
            self.input.consume(n);
            self.input.commit(&skipped);
            if next.is_some() {
                return Ok(next);
            }
        }
    }
}

impl<R: BufRead> DocumentSource for JsonStream<R> {
    fn next_document(&mut self) -> io::Result<Option<Document>> {
        self.at_boundary = false;
        let Some(first) = self.skip_whitespace()? else {
            return Ok(None);
        };
        if first != b'{' && first != b'[' {
            self.input.consume(1);
            self.input.commit(&[first]);
            let message = format!("expected `{{` or `[`, found `{}`", first.escape_ascii());
            return Ok(Some(Document::Malformed(self.input.failure(message))));
        }

        self.input.taken.clear();
        // no end-of-input check: the next document may follow immediately
        let result = Value::deserialize(&mut serde_json::Deserializer::from_reader(&mut self.input));
        let taken = std::mem::take(&mut self.input.taken);
        match result {
            Ok(value) => {
                self.input.commit(&taken);
                Ok(Some(Document::Parsed(value)))
            }
            Err(e) if e.is_io() => Err(io::Error::from(e)),
            Err(e) => {
                // serde_json may read past the offending byte while closing
                // the enclosing object or array; hand those bytes back
                let end = error_index(&taken, e.line(), e.column());
                self.input.commit(&taken[..end]);
                self.input.unread(&taken[end..]);
                self.at_boundary = e.line() > 1 && e.column() == 0;
                Ok(Some(Document::Malformed(self.input.failure(strip_position(&e)))))
            }
        }
    }

    fn skip_to_boundary(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.at_boundary) {
            return Ok(());
        }
        let mut discarded = Vec::new();
        self.input.read_until(b'\n', &mut discarded)?;
        self.input.commit(&discarded);
        Ok(())
    }
}

/// Reader that tracks line/column/offset of committed input and can hand
/// bytes back after a parse error.
struct Tracked<R> {
    inner: R,
    /// Bytes to serve again before reading `inner`.
    replay: Vec<u8>,
    replay_pos: usize,
    /// Bytes handed to the parser for the current document.
    taken: Vec<u8>,
    line: u64,
    column: u64,
    offset: u64,
}

impl<R> Tracked<R> {
    fn commit(&mut self, bytes: &[u8]) {
        self.offset += bytes.len() as u64;
        for &b in bytes {
            if b == b'\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut replay = bytes.to_vec();
        replay.extend_from_slice(&self.replay[self.replay_pos..]);
        self.replay = replay;
        self.replay_pos = 0;
    }

    fn failure(&self, message: String) -> ParseFailure {
        ParseFailure { line: self.line, column: self.column, offset: self.offset, message }
    }
}

impl<R: BufRead> Read for Tracked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        self.taken.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for Tracked<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.replay_pos < self.replay.len() {
            return Ok(&self.replay[self.replay_pos..]);
        }
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if self.replay_pos < self.replay.len() {
            self.replay_pos += amt;
            if self.replay_pos >= self.replay.len() {
                self.replay.clear();
                self.replay_pos = 0;
            }
        } else {
            self.inner.consume(amt);
        }
    }
}

/// JSON insignificant whitespace (RFC 8259): no form feed, no vertical tab.
fn is_json_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Index into `taken` just past the byte at the (1-based) `line`/`column`
/// serde_json reported, relative to the document start.
fn error_index(taken: &[u8], line: usize, column: usize) -> usize {
    let line_start = match line {
        0 => return taken.len(),
        1 => 0,
        _ => taken
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .nth(line - 2)
            .map_or(taken.len(), |(i, _)| i + 1),
    };
    (line_start + column).min(taken.len())
}

/// serde_json appends its own (document-relative) position; drop it.
fn strip_position(e: &serde_json::Error) -> String {
    let msg = e.to_string();
    match msg.rfind(" at line ") {
        Some(i) => msg[..i].to_string(),
        None => msg,
    }
}
