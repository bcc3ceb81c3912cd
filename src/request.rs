//! Assessment test request model.
//!
//! A request is a kind tag followed by one record per document to assess.
//! Each record carries the document identifier, the paths of the metadata
//! and system-metadata files for that document, the suite to run and the
//! originating node.

use std::fmt;
use std::str::FromStr;

/// Characters replaced with `_` when deriving file names from identifiers.
const FILE_NAME_UNSAFE: &[char] = &['/', '(', ')', '"', ':'];

/// Field separator used in the record line.
pub const FIELD_SEPARATOR: char = ',';

/// Number of fields in a record line.
pub const RECORD_FIELDS: usize = 5;

/// Kind of request sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    /// Run a quality suite against each document.
    #[default]
    Quality,
    /// Generate an aggregate graph.
    Graph,
}

impl RequestKind {
    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Quality => "quality",
            RequestKind::Graph => "graph",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("quality") {
            Ok(RequestKind::Quality)
        } else if s.eq_ignore_ascii_case("graph") {
            Ok(RequestKind::Graph)
        } else {
            Err(s.to_string())
        }
    }
}

/// Replace characters that are not safe in file names with `_`.
///
/// `doi:10.18739/A2W08WG3R` becomes `doi_10.18739_A2W08WG3R`.
pub fn sanitize(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if FILE_NAME_UNSAFE.contains(&c) { '_' } else { c })
        .collect()
}

/// One document to be assessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub identifier: String,
    pub metadata_file: String,
    pub script_file: String,
    pub suite_id: String,
    pub node_id: String,
}

impl TestRecord {
    /// Build a record whose file paths are derived from the identifier.
    pub fn for_document(identifier: &str, test_dir: &str, suite_id: &str, node_id: &str) -> Self {
        let file_id = sanitize(identifier);
        let test_dir = test_dir.trim_end_matches('/');

        TestRecord {
            identifier: identifier.to_string(),
            metadata_file: format!("{test_dir}/{file_id}.xml"),
            script_file: format!("{test_dir}/{file_id}.sm"),
            suite_id: suite_id.to_string(),
            node_id: node_id.to_string(),
        }
    }

    /// Fields in wire order.
    pub fn fields(&self) -> [(&'static str, &str); RECORD_FIELDS] {
        [
            ("identifier", self.identifier.as_str()),
            ("metadata_file", self.metadata_file.as_str()),
            ("script_file", self.script_file.as_str()),
            ("suite_id", self.suite_id.as_str()),
            ("node_id", self.node_id.as_str()),
        ]
    }

    /// Record as a comma-separated line, without terminator.
    pub fn csv_line(&self) -> String {
        let fields = self.fields();
        let mut line = String::with_capacity(fields.iter().map(|(_, v)| v.len() + 1).sum());
        for (i, (_, value)) in fields.iter().enumerate() {
            if i > 0 {
                line.push(FIELD_SEPARATOR);
            }
            line.push_str(value);
        }
        line
    }

    /// Check that every field can be carried in an unquoted record line.
    pub fn validate(&self) -> Result<(), RequestError> {
        for (field, value) in self.fields() {
            if value.contains([FIELD_SEPARATOR, '\r', '\n']) {
                return Err(RequestError::InvalidField {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A complete request: kind plus the records that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRequest {
    pub kind: RequestKind,
    pub records: Vec<TestRecord>,
}

impl TestRequest {
    pub fn new(kind: RequestKind, records: Vec<TestRecord>) -> Self {
        TestRequest { kind, records }
    }

    /// Number of records announced on the count line.
    pub fn test_count(&self) -> usize {
        self.records.len()
    }

    /// Reject requests that cannot be encoded.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.records.is_empty() {
            return Err(RequestError::Empty);
        }
        self.records.iter().try_for_each(TestRecord::validate)
    }
}

/// Request construction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No records to send
    Empty,
    /// A field contains a separator or line break
    InvalidField { field: &'static str, value: String },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Empty => write!(f, "Request has no test records"),
            RequestError::InvalidField { field, value } => {
                write!(f, "Field '{}' cannot contain ',' or line breaks: {:?}", field, value)
            }
        }
    }
}

impl std::error::Error for RequestError {}
