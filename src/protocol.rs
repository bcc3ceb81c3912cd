//! Controller test-mode wire format.
//!
//! A request is a short sequence of `\n`-terminated UTF-8 lines:
//!
//! ```text
//! quality
//! 1
//! doi:10.18739/A2W08WG3R,./docs/doi_10.18739_A2W08WG3R.xml,./docs/doi_10.18739_A2W08WG3R.sm,test.suite,urn:node:ARCTIC
//! Done
//! ```
//!
//! The controller stops reading the connection after `Done` but keeps
//! accepting new ones.

use crate::request::{
    RequestError, RequestKind, TestRecord, TestRequest, FIELD_SEPARATOR, RECORD_FIELDS,
};
use bytes::{BufMut, BytesMut};
use std::str;

/// Line that ends a request.
pub const DONE: &str = "Done";

/// Build the lines of a request, without terminators.
pub fn lines(request: &TestRequest) -> Vec<String> {
    let mut lines = Vec::with_capacity(request.test_count() + 3);
    lines.push(request.kind.as_str().to_string());
    lines.push(request.test_count().to_string());
    lines.extend(request.records.iter().map(TestRecord::csv_line));
    lines.push(DONE.to_string());
    lines
}

/// Encode a request into its wire form.
pub fn encode(request: &TestRequest) -> Result<BytesMut, RequestError> {
    request.validate()?;

    let lines = lines(request);
    let mut buf = BytesMut::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in &lines {
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');
    }
    Ok(buf)
}

/// Wire format errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A line is not valid UTF-8
    InvalidUtf8,
    /// First line is not a known request kind
    UnknownKind(String),
    /// Second line is not a record count
    InvalidCount(String),
    /// Record line does not have the expected fields
    InvalidRecord(String),
    /// Records were not followed by the terminator
    MissingDone(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidUtf8 => write!(f, "Invalid UTF-8 in request"),
            ParseError::UnknownKind(kind) => write!(f, "Unknown request kind: {}", kind),
            ParseError::InvalidCount(count) => write!(f, "Invalid test count: {}", count),
            ParseError::InvalidRecord(line) => {
                write!(f, "Expected {} fields in record: {}", RECORD_FIELDS, line)
            }
            ParseError::MissingDone(line) => write!(f, "Expected '{}', got: {}", DONE, line),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of parsing a request
#[derive(Debug)]
pub enum ParseResult {
    /// Complete request with bytes consumed
    Complete(TestRequest, usize),
    /// Need more data
    Incomplete,
    /// Malformed request
    Error(ParseError),
}

/// Parse one complete request from the start of the buffer.
pub fn parse(input: &[u8]) -> ParseResult {
    let mut pos = 0;

    macro_rules! next_line {
        () => {
            match next_line(input, pos) {
                Some(Ok((line, next))) => {
                    pos = next;
                    line
                }
                Some(Err(e)) => return ParseResult::Error(e),
                None => return ParseResult::Incomplete,
            }
        };
    }

    let kind_line = next_line!();
    let kind = match kind_line.parse::<RequestKind>() {
        Ok(kind) => kind,
        Err(kind) => return ParseResult::Error(ParseError::UnknownKind(kind)),
    };

    let count_line = next_line!();
    // A request always carries at least one record.
    let count: usize = match count_line.parse() {
        Ok(n) if n > 0 => n,
        _ => return ParseResult::Error(ParseError::InvalidCount(count_line.to_string())),
    };

    // Cap the preallocation; the count comes off the wire.
    let mut records = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let line = next_line!();
        match parse_record(line) {
            Some(record) => records.push(record),
            None => return ParseResult::Error(ParseError::InvalidRecord(line.to_string())),
        }
    }

    let done_line = next_line!();
    if done_line != DONE {
        return ParseResult::Error(ParseError::MissingDone(done_line.to_string()));
    }

    ParseResult::Complete(TestRequest::new(kind, records), pos)
}

fn parse_record(line: &str) -> Option<TestRecord> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != RECORD_FIELDS {
        return None;
    }

    Some(TestRecord {
        identifier: fields[0].to_string(),
        metadata_file: fields[1].to_string(),
        script_file: fields[2].to_string(),
        suite_id: fields[3].to_string(),
        node_id: fields[4].to_string(),
    })
}

/// Read the line starting at `start`, accepting `\n` or `\r\n`.
/// Returns the line and the offset just past its terminator.
fn next_line(buffer: &[u8], start: usize) -> Option<Result<(&str, usize), ParseError>> {
    let rest = buffer.get(start..)?;
    let end = rest.iter().position(|&b| b == b'\n')?;
    let raw = rest[..end].strip_suffix(b"\r").unwrap_or(&rest[..end]);

    Some(
        str::from_utf8(raw)
            .map(|line| (line, start + end + 1))
            .map_err(|_| ParseError::InvalidUtf8),
    )
}
