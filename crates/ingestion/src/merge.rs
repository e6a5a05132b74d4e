//! Cross-source merge into one wide hourly table.
//!
//! Each source's records are relabelled, described and reduced to long form
//! `(timestamp, description, value)`. All sources are then concatenated,
//! converted to naive local time in the target zone and pivoted on the
//! description. The merge is a pure function of its inputs.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::warn;

use feed_common::{to_local_naive, WideTable};

use crate::labels::LabelTables;
use crate::reconcile::{Record, ResolutionOrigin};

/// Separator between metadata values in a column description.
pub const DESCRIPTION_SEPARATOR: &str = " - ";

/// Description used when a record carries no metadata.
pub const DEFAULT_DESCRIPTION: &str = "Value";

/// One source to merge: its reconciled records and the labels that apply to them.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    pub records: &'a [Record],
    pub labels: &'a LabelTables,
}

impl<'a> MergeInput<'a> {
    pub fn new(records: &'a [Record], labels: &'a LabelTables) -> Self {
        Self { records, labels }
    }
}

/// One row of the long form.
#[derive(Debug, Clone, PartialEq)]
pub struct LongEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub description: String,
    pub value: f64,
}

/// Column description of a record.
///
/// Translated metadata values joined by [`DESCRIPTION_SEPARATOR`], with the
/// resolution origin appended when `include_origin` is set.
pub fn describe(record: &Record, labels: &LabelTables, include_origin: bool) -> String {
    let translated = labels.translate(&record.metadata);
    let mut parts: Vec<&str> = translated.iter().map(|(_, value)| value).collect();
    if include_origin {
        parts.push(record.origin.as_str());
    }
    if parts.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        parts.join(DESCRIPTION_SEPARATOR)
    }
}

/// Long form of one source. The origin is part of the description only
/// when the source mixes native and aggregated values.
pub fn long_form(input: &MergeInput<'_>) -> Vec<LongEntry> {
    let origins: BTreeSet<ResolutionOrigin> = input.records.iter().map(|r| r.origin).collect();
    let include_origin = origins.len() > 1;

    input
        .records
        .iter()
        .map(|record| LongEntry {
            timestamp: record.timestamp,
            description: describe(record, input.labels, include_origin),
            value: record.value,
        })
        .collect()
}

/// Merge several sources into one table keyed by local time in `zone`.
///
/// Columns are sorted by name and rows ascend by timestamp. When two values
/// land on the same cell the first one, in input order, is kept.
pub fn merge(inputs: &[MergeInput<'_>], zone: &Tz) -> WideTable {
    let entries = inputs.iter().flat_map(long_form).map(|entry| {
        (
            to_local_naive(&entry.timestamp, zone),
            entry.description,
            entry.value,
        )
    });

    let pivot = WideTable::pivot(entries);
    if pivot.collisions > 0 {
        warn!(
            collisions = pivot.collisions,
            zone = %zone,
            "Values collided on the same local hour and column, first value kept"
        );
    }
    pivot.table
}
