//! Error types for the ingestion crate.

use feed_common::FeedError;
use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse label tables: {0}")]
    LabelParse(#[from] serde_yaml::Error),

    #[error("Query '{query}': {source}")]
    Document {
        query: String,
        #[source]
        source: FeedError,
    },
}

impl IngestionError {
    /// Attach the query identity to a document-level failure.
    pub fn for_query(query: impl Into<String>, source: FeedError) -> Self {
        IngestionError::Document {
            query: query.into(),
            source,
        }
    }

    /// The underlying feed error, if any.
    pub fn feed_error(&self) -> Option<&FeedError> {
        match self {
            IngestionError::Document { source, .. } => Some(source),
            _ => None,
        }
    }

    /// "No data for this query": callers log and carry on.
    pub fn is_no_data(&self) -> bool {
        self.feed_error().is_some_and(FeedError::is_no_data)
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
