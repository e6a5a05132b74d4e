//! Resolution reconciliation.
//!
//! A document may report the same hour natively at 60-minute resolution and
//! again as four 15-minute samples. Quarter-hour samples are summed into
//! hourly buckets; when a native hourly value exists for the same
//! `(timestamp, grouping keys)` it wins and the aggregate is discarded.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use feed_common::{floor_to_hour, is_on_hour, SeriesMetadata};
use feed_xml::{Resolution, TimeSeries};

/// Where an hourly value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResolutionOrigin {
    Native60,
    AggregatedFrom15,
}

impl ResolutionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionOrigin::Native60 => "native-60",
            ResolutionOrigin::AggregatedFrom15 => "aggregated-from-15",
        }
    }
}

impl fmt::Display for ResolutionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reconciled hourly value.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// On the hour, source offset preserved.
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
    pub origin: ResolutionOrigin,
    /// Series metadata restricted to the grouping keys.
    pub metadata: SeriesMetadata,
}

type Key = (DateTime<FixedOffset>, SeriesMetadata);

/// Reduce a document's series to at most one hourly record per
/// `(timestamp, grouping keys)`.
///
/// Output is sorted by timestamp, then by grouping key values. Series at
/// resolutions other than 15 or 60 minutes are skipped.
pub fn reconcile(series: &[TimeSeries], grouping_keys: &[String]) -> Vec<Record> {
    let mut native: BTreeMap<Key, f64> = BTreeMap::new();
    let mut quarters: BTreeMap<Key, f64> = BTreeMap::new();
    let mut duplicates = 0usize;

    for ts in series {
        let metadata = ts.metadata.project(grouping_keys);
        match ts.resolution {
            Resolution::HOUR => {
                for (timestamp, value) in ts.samples() {
                    match native.entry((timestamp, metadata.clone())) {
                        Entry::Vacant(slot) => {
                            slot.insert(value);
                        }
                        Entry::Occupied(_) => duplicates += 1,
                    }
                }
            }
            Resolution::QUARTER_HOUR => {
                for (timestamp, value) in ts.samples() {
                    *quarters
                        .entry((floor_to_hour(&timestamp), metadata.clone()))
                        .or_insert(0.0) += value;
                }
            }
            other => {
                warn!(
                    resolution = %other,
                    series = %ts.metadata,
                    points = ts.points.len(),
                    "Skipping series with unsupported resolution"
                );
            }
        }
    }

    if duplicates > 0 {
        debug!(duplicates, "Dropped repeated native hourly values (first kept)");
    }

    let mut merged: BTreeMap<Key, (f64, ResolutionOrigin)> = native
        .into_iter()
        .map(|(key, value)| (key, (value, ResolutionOrigin::Native60)))
        .collect();

    let mut overridden = 0usize;
    for (key, value) in quarters {
        match merged.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert((value, ResolutionOrigin::AggregatedFrom15));
            }
            Entry::Occupied(_) => overridden += 1,
        }
    }
    if overridden > 0 {
        debug!(overridden, "Native hourly values replaced quarter-hour aggregates");
    }

    let total = merged.len();
    let records: Vec<Record> = merged
        .into_iter()
        .filter(|((timestamp, _), _)| is_on_hour(timestamp))
        .map(|((timestamp, metadata), (value, origin))| Record {
            timestamp,
            value,
            origin,
            metadata,
        })
        .collect();

    if records.len() < total {
        debug!(
            dropped = total - records.len(),
            "Dropped records not aligned to an hour boundary"
        );
    }

    records
}
