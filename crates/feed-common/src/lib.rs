//! Common types and utilities shared across all energy-feeds crates.

pub mod error;
pub mod metadata;
pub mod table;
pub mod time;

pub use error::{FeedError, FeedResult};
pub use metadata::SeriesMetadata;
pub use table::{check_columns, WideTable, TIMESTAMP_COLUMN};
pub use time::{floor_to_hour, is_on_hour, parse_offset_datetime, parse_time_zone, to_local_naive};
