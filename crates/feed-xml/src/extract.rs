//! Series extraction.
//!
//! Extraction runs in two phases. [`sniff`] inspects the series nodes once to
//! learn the document's value field and which metadata tags tell sibling
//! series apart. The typed pass then reads every `Period` block into a
//! [`TimeSeries`] using that schema. A series that fails numeric coercion is
//! reported in [`Extraction::rejected`] and never aborts its siblings.

use std::fmt;

use chrono::{DateTime, Duration, FixedOffset};
use tracing::debug;

use feed_common::{parse_offset_datetime, FeedError, FeedResult, SeriesMetadata};

use crate::document::{Document, Node};

/// Child tags present on every series that never distinguish one series from another.
pub const STRUCTURAL_TAGS: [&str; 2] = ["mRID", "Period"];

const SERIES_PATH: &str = "//TimeSeries";
const START_PATH: &str = "timeInterval/start";

/// Name of the element holding each point's value (`quantity`, `price.amount`...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueField(String);

impl ValueField {
    /// Validate a discovered tag name.
    pub fn new(name: impl Into<String>) -> FeedResult<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(FeedError::Schema(format!("invalid value field name '{}'", name)));
        }
        Ok(ValueField(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sampling interval of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resolution {
    minutes: u32,
}

impl Resolution {
    pub const QUARTER_HOUR: Resolution = Resolution { minutes: 15 };
    pub const HOUR: Resolution = Resolution { minutes: 60 };

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes > 0).then_some(Resolution { minutes })
    }

    /// Parse a duration code by keeping its digits only (`PT15M` -> 15 minutes).
    pub fn parse(code: &str) -> Option<Self> {
        let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse().ok().and_then(Self::from_minutes)
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PT{}M", self.minutes)
    }
}

/// One sample as read from the document, before numeric coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPoint {
    pub position: u32,
    pub value: String,
}

/// One numeric sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub position: u32,
    pub value: f64,
}

/// One `Period` block of one series, with coerced values.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    /// Start of the period, offset preserved.
    pub start: DateTime<FixedOffset>,
    pub resolution: Resolution,
    /// Ordered by position.
    pub points: Vec<Point>,
    pub metadata: SeriesMetadata,
}

impl TimeSeries {
    /// Absolute timestamp of a 1-based position, `None` when it is out of range.
    pub fn timestamp_at(&self, position: u32) -> Option<DateTime<FixedOffset>> {
        let steps = i64::from(position.saturating_sub(1));
        let minutes = steps.checked_mul(i64::from(self.resolution.minutes))?;
        self.start.checked_add_signed(Duration::try_minutes(minutes)?)
    }

    /// `(timestamp, value)` pairs in position order.
    ///
    /// Extracted series only hold positions whose timestamp is in range.
    pub fn samples(&self) -> impl Iterator<Item = (DateTime<FixedOffset>, f64)> + '_ {
        self.points
            .iter()
            .filter_map(move |p| self.timestamp_at(p.position).map(|ts| (ts, p.value)))
    }
}

/// What the sniffing pass learned about a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSchema {
    pub value_field: ValueField,
    /// Tags whose value differs between at least two series, in first-seen order.
    pub varying: Vec<String>,
    pub series_count: usize,
}

/// Result of extracting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub schema: DocumentSchema,
    /// Caller parameters attached to every series: required, then optional.
    pub invariant: SeriesMetadata,
    pub series: Vec<TimeSeries>,
    /// Per-series failures. Each is a [`FeedError::DataFormat`].
    pub rejected: Vec<FeedError>,
}

impl Extraction {
    pub fn value_field(&self) -> &ValueField {
        &self.schema.value_field
    }

    pub fn varying_tags(&self) -> &[String] {
        &self.schema.varying
    }

    /// Varying tags followed by invariant fields, without repeats.
    pub fn grouping_keys(&self) -> Vec<String> {
        let mut keys = self.schema.varying.clone();
        for field in self.invariant.fields() {
            if !keys.iter().any(|k| k == field) {
                keys.push(field.to_string());
            }
        }
        keys
    }
}

/// Discover the value field and the varying tags of a set of series nodes.
pub fn sniff(series: &[Node<'_>]) -> FeedResult<DocumentSchema> {
    let first = series.first().ok_or(FeedError::NoData)?;
    let point = first
        .select_first("//Point")
        .ok_or_else(|| FeedError::Schema("first series has no Point".to_string()))?;
    let value_tag = point
        .children()
        .get(1)
        .map(|n| n.local_name().to_string())
        .ok_or_else(|| FeedError::Schema("first Point has no value element".to_string()))?;
    let value_field = ValueField::new(value_tag)?;

    let varying = if series.len() > 1 {
        varying_tags(series)
    } else {
        Vec::new()
    };

    Ok(DocumentSchema {
        value_field,
        varying,
        series_count: series.len(),
    })
}

fn varying_tags(series: &[Node<'_>]) -> Vec<String> {
    let mut candidates: Vec<&str> = Vec::new();
    for node in series {
        for child in node.children() {
            let name = child.local_name();
            if !STRUCTURAL_TAGS.contains(&name) && !candidates.contains(&name) {
                candidates.push(name);
            }
        }
    }

    candidates
        .into_iter()
        .filter(|tag| {
            let mut values = series.iter().map(|n| n.select_text(tag).unwrap_or_default());
            match values.next() {
                Some(first) => values.any(|v| v != first),
                None => false,
            }
        })
        .map(str::to_string)
        .collect()
}

/// Extract every series of a document.
///
/// Document-level failures (`Schema`, `Upstream`, `NoData`) are returned as
/// errors. An in-band upstream error takes priority over everything else.
pub fn extract(
    document: &Document,
    required: &SeriesMetadata,
    optional: &SeriesMetadata,
) -> FeedResult<Extraction> {
    if let Some(err) = document.upstream_error()? {
        return Err(err);
    }

    let nodes = document.select(SERIES_PATH)?;
    if nodes.is_empty() {
        return Err(FeedError::NoData);
    }

    let schema = sniff(&nodes)?;
    debug!(
        value_field = %schema.value_field,
        varying = ?schema.varying,
        series = schema.series_count,
        "Sniffed document schema"
    );

    let mut invariant = required.clone();
    invariant.extend(optional);

    let mut series = Vec::new();
    let mut rejected = Vec::new();
    for node in &nodes {
        let mut metadata = SeriesMetadata::new();
        for tag in &schema.varying {
            metadata.insert(tag.as_str(), node.select_text(tag).unwrap_or_default());
        }
        metadata.extend(&invariant);

        let periods = node.select("Period");
        if periods.is_empty() {
            rejected.push(data_format(&metadata, "Period", ""));
            continue;
        }
        for period in &periods {
            match read_period(period, &schema.value_field, &metadata) {
                Ok(ts) => series.push(ts),
                Err(e) => rejected.push(e),
            }
        }
    }

    Ok(Extraction {
        schema,
        invariant,
        series,
        rejected,
    })
}

fn read_period(
    period: &Node<'_>,
    value_field: &ValueField,
    metadata: &SeriesMetadata,
) -> FeedResult<TimeSeries> {
    let start_text = period.select_text(START_PATH).unwrap_or_default();
    let start = parse_offset_datetime(&start_text)
        .map_err(|_| data_format(metadata, START_PATH, &start_text))?;

    let resolution_text = period.select_text("resolution").unwrap_or_default();
    let resolution = Resolution::parse(&resolution_text)
        .ok_or_else(|| data_format(metadata, "resolution", &resolution_text))?;

    let raw = read_raw_points(period, value_field, metadata)?;
    let mut points = coerce_points(raw, value_field, metadata)?;
    points.sort_by_key(|p| p.position);

    let series = TimeSeries {
        start,
        resolution,
        points,
        metadata: metadata.clone(),
    };
    // Positions are sorted, so the last one is the furthest from the start.
    if let Some(last) = series.points.last() {
        if series.timestamp_at(last.position).is_none() {
            return Err(data_format(metadata, "position", &last.position.to_string()));
        }
    }
    Ok(series)
}

fn read_raw_points(
    period: &Node<'_>,
    value_field: &ValueField,
    metadata: &SeriesMetadata,
) -> FeedResult<Vec<RawPoint>> {
    period
        .select("Point")
        .iter()
        .map(|point| {
            let position_text = point.select_text("position").unwrap_or_default();
            let position = position_text
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| data_format(metadata, "position", &position_text))?;
            Ok(RawPoint {
                position,
                value: point.select_text(value_field.as_str()).unwrap_or_default(),
            })
        })
        .collect()
}

fn coerce_points(
    raw: Vec<RawPoint>,
    value_field: &ValueField,
    metadata: &SeriesMetadata,
) -> FeedResult<Vec<Point>> {
    raw.into_iter()
        .map(|p| {
            p.value
                .parse::<f64>()
                .map(|value| Point {
                    position: p.position,
                    value,
                })
                .map_err(|_| data_format(metadata, value_field.as_str(), &p.value))
        })
        .collect()
}

fn data_format(metadata: &SeriesMetadata, field: &str, value: &str) -> FeedError {
    FeedError::DataFormat {
        series: metadata.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    }
}
