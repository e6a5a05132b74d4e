//! Market feed ingestion library.
//!
//! Turns raw feed documents into reconciled hourly records and merges
//! records from several sources into one wide table:
//!
//! - [`process_document`]: parse, extract and reconcile one document
//! - [`reconcile`]: 15/60-minute resolution reconciliation
//! - [`merge`]: relabelling, description and pivot across sources
//! - [`LabelTables`]: code to label lookups loaded from configuration

pub mod error;
pub mod labels;
pub mod merge;
pub mod pipeline;
pub mod reconcile;

pub use error::{IngestionError, Result};
pub use labels::LabelTables;
pub use merge::{describe, long_form, merge, LongEntry, MergeInput};
pub use pipeline::{process_document, ProcessedDocument};
pub use reconcile::{reconcile, Record, ResolutionOrigin};
