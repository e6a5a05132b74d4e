//! Error types for energy-feeds.

use thiserror::Error;

/// Result type alias using FeedError.
pub type FeedResult<T> = Result<T, FeedError>;

/// Primary error type for document parsing, extraction and table operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    // === Document Errors ===
    #[error("Malformed XML document: {0}")]
    Parse(String),

    #[error("Unexpected document schema: {0}")]
    Schema(String),

    #[error("Upstream error {code}: {message}")]
    Upstream { code: String, message: String },

    #[error("Document contains no time series")]
    NoData,

    // === Series Errors ===
    #[error("Series [{series}]: cannot read {field} from '{value}'")]
    DataFormat {
        series: String,
        field: String,
        value: String,
    },

    // === Time Errors ===
    #[error("Invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },

    #[error("Unknown time zone: {0}")]
    InvalidTimeZone(String),

    // === Table Errors ===
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Duplicate timestamp: {0}")]
    DuplicateTimestamp(String),

    #[error("Row at {timestamp} has {found} values, expected {expected}")]
    RowWidth {
        timestamp: String,
        expected: usize,
        found: usize,
    },
}

impl FeedError {
    /// Short, stable name of the error class, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Parse(_) => "parse",
            FeedError::Schema(_) => "schema",
            FeedError::Upstream { .. } => "upstream",
            FeedError::NoData => "no_data",
            FeedError::DataFormat { .. } => "data_format",
            FeedError::InvalidTimestamp { .. } | FeedError::InvalidTimeZone(_) => "time",
            FeedError::DuplicateColumn(_)
            | FeedError::DuplicateTimestamp(_)
            | FeedError::RowWidth { .. } => "table",
        }
    }

    /// Whether the caller should treat the error as "nothing to ingest" and carry on.
    pub fn is_no_data(&self) -> bool {
        matches!(self, FeedError::NoData)
    }
}
