//! Energy feed ingester.
//!
//! Fetches market feed documents and weather observations, reconciles them
//! into hourly records, merges them into one wide table keyed by local time
//! and replaces that table in SQLite.

pub mod config;
pub mod config_loader;
pub mod ingest;
pub mod query;
pub mod sources;
pub mod weather;

pub use config::IngesterConfig;
pub use ingest::{print_urls, IngestionPipeline, QueryOutcome, RunSummary};
pub use query::{build_url, redacted_url, FeedQuery, Period};
pub use sources::{DirectorySource, DocumentSource, HttpSource};
pub use weather::{Location, WeatherClient};
