//! Storage for energy-feeds services.
//!
//! Wide hourly tables are persisted to SQLite with full-table replacement,
//! read back, and audited for duplicate or missing timestamps.

pub mod error;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use sqlite::{ColumnNulls, SqliteStore, TableAudit, STORED_TIMESTAMP_FORMAT};
