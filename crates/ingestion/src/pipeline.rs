//! Per-document pipeline: parse, extract, reconcile.

use tracing::{info, instrument, warn};

use feed_common::{FeedError, SeriesMetadata};
use feed_xml::{extract, Document, ValueField};

use crate::error::{IngestionError, Result};
use crate::reconcile::{reconcile, Record};

/// Reconciled output of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub value_field: ValueField,
    pub varying: Vec<String>,
    pub records: Vec<Record>,
    /// Series dropped for data format problems.
    pub rejected: Vec<FeedError>,
}

/// Run one document through the tree reader, the extractor and the reconciler.
///
/// Document-level failures come back as [`IngestionError::Document`] naming
/// `query`. Rejected series are logged and returned alongside the records.
#[instrument(skip(bytes, required, optional), fields(size = bytes.len()))]
pub fn process_document(
    query: &str,
    bytes: &[u8],
    required: &SeriesMetadata,
    optional: &SeriesMetadata,
) -> Result<ProcessedDocument> {
    let document = Document::parse(bytes).map_err(|e| IngestionError::for_query(query, e))?;
    let extraction =
        extract(&document, required, optional).map_err(|e| IngestionError::for_query(query, e))?;

    for rejection in &extraction.rejected {
        warn!(query = %query, error = %rejection, "Rejected series");
    }

    let keys = extraction.grouping_keys();
    let records = reconcile(&extraction.series, &keys);

    info!(
        query = %query,
        value_field = %extraction.value_field(),
        series = extraction.series.len(),
        rejected = extraction.rejected.len(),
        records = records.len(),
        "Processed document"
    );

    Ok(ProcessedDocument {
        value_field: extraction.schema.value_field,
        varying: extraction.schema.varying,
        records,
        rejected: extraction.rejected,
    })
}
