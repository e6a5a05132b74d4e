//! Error types for the storage crate.

use feed_common::FeedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid table name: '{0}'")]
    InvalidName(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table '{table}' has no '{column}' column")]
    MissingKeyColumn { table: String, column: String },

    #[error("Invalid stored timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Invalid table contents: {0}")]
    Table(#[from] FeedError),
}

pub type StorageResult<T> = Result<T, StorageError>;
