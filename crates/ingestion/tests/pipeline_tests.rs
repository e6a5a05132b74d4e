//! End-to-end tests: document bytes to wide table.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use chrono_tz::Tz;
use feed_common::{parse_time_zone, FeedError, SeriesMetadata, TIMESTAMP_COLUMN};
use ingestion::{
    merge, process_document, IngestionError, LabelTables, MergeInput, ResolutionOrigin,
};
use test_utils::{
    acknowledgement, assert_approx_eq, params, require_test_file, time, FeedDocumentBuilder,
    SeriesFixture,
};

fn paris() -> Tz {
    parse_time_zone("Europe/Paris").unwrap()
}

fn local(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn solar_wind_document() -> Vec<u8> {
    FeedDocumentBuilder::generation()
        .series(
            SeriesFixture::new(time::PARIS_MIDNIGHT, 60)
                .tag("type", "solar")
                .values([1.0, 2.0]),
        )
        .series(
            SeriesFixture::new(time::PARIS_MIDNIGHT, 60)
                .tag("type", "wind")
                .values([3.0, 4.0]),
        )
        .build_bytes()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_solar_wind_scenario() {
    let empty = SeriesMetadata::new();
    let processed = process_document("generation", &solar_wind_document(), &empty, &empty).unwrap();

    assert_eq!(processed.varying, vec!["type".to_string()]);
    assert_eq!(processed.records.len(), 4);
    let tagged: Vec<(u32, &str)> = processed
        .records
        .iter()
        .map(|r| (r.timestamp.hour(), r.metadata.get("type").unwrap()))
        .collect();
    assert_eq!(tagged, vec![(0, "solar"), (0, "wind"), (1, "solar"), (1, "wind")]);

    let labels = LabelTables::new();
    let table = merge(&[MergeInput::new(&processed.records, &labels)], &paris());
    let mut header = vec![TIMESTAMP_COLUMN.to_string()];
    header.extend(table.columns().iter().cloned());
    assert_eq!(header, vec!["timestamp", "solar", "wind"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(&local(1, 0), "solar"), Some(1.0));
    assert_eq!(table.get(&local(1, 1), "wind"), Some(4.0));
}

#[test]
fn test_upstream_error_carries_query() {
    let empty = SeriesMetadata::new();
    let err = process_document("prices", acknowledgement("999", "No data").as_bytes(), &empty, &empty)
        .unwrap_err();
    match err {
        IngestionError::Document { query, source } => {
            assert_eq!(query, "prices");
            assert!(matches!(source, FeedError::Upstream { code, .. } if code == "999"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_no_data_is_recoverable() {
    let empty = SeriesMetadata::new();
    let err = process_document("load", &FeedDocumentBuilder::generation().build_bytes(), &empty, &empty)
        .unwrap_err();
    assert!(err.is_no_data());
}

#[test]
fn test_malformed_document_is_parse_error() {
    let empty = SeriesMetadata::new();
    let err = process_document("load", b"<GL_MarketDocument>", &empty, &empty).unwrap_err();
    assert!(matches!(err.feed_error(), Some(FeedError::Parse(_))));
}

// ============================================================================
// Reconciliation through the pipeline
// ============================================================================

#[test]
fn test_native_ten_beats_four_quarters_of_two() {
    let doc = FeedDocumentBuilder::generation()
        .series(SeriesFixture::new(time::PARIS_MIDNIGHT, 60).values([10.0]))
        .series(SeriesFixture::new(time::PARIS_MIDNIGHT, 15).values([2.0; 4]))
        .build_bytes();
    let required = SeriesMetadata::from_pairs(params::GENERATION_FORECAST);
    let processed = process_document("generation", &doc, &required, &SeriesMetadata::new()).unwrap();

    assert!(processed.varying.is_empty());
    assert_eq!(processed.records.len(), 1);
    assert_eq!(processed.records[0].value, 10.0);
    assert_eq!(processed.records[0].origin, ResolutionOrigin::Native60);
}

#[test]
fn test_four_quarters_make_four_v() {
    let v = 2.75;
    let doc = FeedDocumentBuilder::generation()
        .series(SeriesFixture::new(time::PARIS_MIDNIGHT, 15).values([v; 4]))
        .build_bytes();
    let empty = SeriesMetadata::new();
    let processed = process_document("generation", &doc, &empty, &empty).unwrap();

    assert_eq!(processed.records.len(), 1);
    assert_approx_eq!(processed.records[0].value, 4.0 * v, 1e-9);
    assert_eq!(processed.records[0].origin, ResolutionOrigin::AggregatedFrom15);
}

#[test]
fn test_rejected_series_do_not_block_siblings() {
    let doc = FeedDocumentBuilder::generation()
        .series(SeriesFixture::new(time::PARIS_MIDNIGHT, 60).tag("type", "solar").values([1.0]))
        .series(SeriesFixture::new(time::PARIS_MIDNIGHT, 60).tag("type", "wind").raw_values(&["-"]))
        .build_bytes();
    let empty = SeriesMetadata::new();
    let processed = process_document("generation", &doc, &empty, &empty).unwrap();
    assert_eq!(processed.records.len(), 1);
    assert_eq!(processed.rejected.len(), 1);
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn test_merge_is_idempotent() {
    let empty = SeriesMetadata::new();
    let processed = process_document("generation", &solar_wind_document(), &empty, &empty).unwrap();
    let labels = LabelTables::new();
    let inputs = [MergeInput::new(&processed.records, &labels)];

    let first = merge(&inputs, &paris());
    let second = merge(&inputs, &paris());
    assert_eq!(first, second);
    assert_eq!(format!("{:?}", first), format!("{:?}", second));
}

#[test]
fn test_sources_outer_join_with_nulls() {
    let empty = SeriesMetadata::new();
    let generation = process_document("generation", &solar_wind_document(), &empty, &empty).unwrap();
    let prices_doc = FeedDocumentBuilder::prices()
        .series(SeriesFixture::new("2024-01-01T01:00+01:00", 60).values([55.0, 60.0]))
        .build_bytes();
    let required = SeriesMetadata::from_pairs(params::DAY_AHEAD_PRICES);
    let prices = process_document("prices", &prices_doc, &required, &empty).unwrap();

    let mut labels = LabelTables::new();
    labels.insert("documentType", "A44", "Price Document");
    let table = merge(
        &[
            MergeInput::new(&generation.records, &labels),
            MergeInput::new(&prices.records, &labels),
        ],
        &paris(),
    );

    assert_eq!(table.columns(), &["Price Document", "solar", "wind"]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(&local(1, 0), "Price Document"), None);
    assert_eq!(table.get(&local(1, 2), "Price Document"), Some(60.0));
    assert_eq!(table.get(&local(1, 2), "solar"), None);
}

#[test]
fn test_sample_document_with_labels() {
    let path = require_test_file!("generation_forecast.xml");
    let bytes = std::fs::read(path).unwrap();
    let required = SeriesMetadata::from_pairs(params::GENERATION_FORECAST);
    let processed = process_document("generation", &bytes, &required, &SeriesMetadata::new()).unwrap();

    let mut labels = LabelTables::new();
    labels.insert("businessType", "A93", "Wind generation");
    labels.insert("businessType", "A94", "Solar generation");
    labels.insert("MktPSRType", "B16", "Solar");
    labels.insert("MktPSRType", "B18", "Wind Offshore");
    labels.insert("MktPSRType", "B19", "Wind Onshore");
    labels.insert("documentType", "A69", "Wind and solar forecast");
    labels.insert("processType", "A01", "Day ahead");

    let table = merge(&[MergeInput::new(&processed.records, &labels)], &paris());
    let offshore = "Wind generation - Wind Offshore - Wind and solar forecast - Day ahead - aggregated-from-15";
    assert!(table.column_index(offshore).is_some(), "columns: {:?}", table.columns());
    assert_eq!(table.len(), 4);
    assert_eq!(table.get(&local(1, 0), offshore), Some(1185.0));
    assert_eq!(table.get(&local(1, 3), offshore), Some(993.0));
}
