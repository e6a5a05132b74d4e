//! Full ingestion cycles against saved documents and an in-memory database.

use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use feed_common::WideTable;
use ingester::config_loader::parse_config;
use ingester::{DirectorySource, IngesterConfig, IngestionPipeline};
use storage::SqliteStore;
use test_utils::{acknowledgement, time, FeedDocumentBuilder, SeriesFixture};

const LABELS: &str = r#"
businessType:
  A93: Wind generation
  A94: Solar generation
MktPSRType:
  B16: Solar
  B19: Wind Onshore
documentType:
  A44: Price Document
  A69: Wind and solar forecast
processType:
  A01: Day ahead
"#;

fn config_yaml(join_tables: &[&str]) -> String {
    format!(
        r#"
feed:
  endpoint: https://web-api.tp.entsoe.eu/api
  token: test-token
  period_start: "{start}"
  period_end: "{end}"
  max_concurrent: 2
target_zone: Europe/Paris
database:
  path: unused.db
  table: energy_data
  join_tables: [{joins}]
labels_file: labels.yaml
queries:
  - name: generation
    required:
      documentType: A69
      processType: A01
    domains:
      in_Domain: 10YFR-RTE------C
  - name: prices
    required:
      documentType: A44
  - name: load
    required:
      documentType: A65
  - name: rejected
    required:
      documentType: A69
  - name: empty
    required:
      documentType: A69
aliases:
  Price Document: Energy prices
  Solar generation - Solar - Wind and solar forecast - Day ahead: Solar generation forecast
  Wind generation - Wind Onshore - Wind and solar forecast - Day ahead: Wind onshore generation forecast
"#,
        start = time::PERIOD_START,
        end = time::PERIOD_END,
        joins = join_tables.join(", ")
    )
}

fn local(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Writes the documents and labels; `load.xml` is deliberately absent.
fn write_inputs(dir: &Path) {
    let generation = FeedDocumentBuilder::generation()
        .series(
            SeriesFixture::new(time::PARIS_MIDNIGHT_UTC, 60)
                .tag("businessType", "A94")
                .tag("MktPSRType", "B16")
                .values([0.0, 12.0]),
        )
        .series(
            SeriesFixture::new(time::PARIS_MIDNIGHT_UTC, 60)
                .tag("businessType", "A93")
                .tag("MktPSRType", "B19")
                .values([4312.0, 4198.0]),
        )
        .build();
    let prices = FeedDocumentBuilder::prices()
        .series(SeriesFixture::new(time::PARIS_MIDNIGHT_UTC, 60).values([91.5, 88.25]))
        .build();

    std::fs::write(dir.join("generation.xml"), generation).unwrap();
    std::fs::write(dir.join("prices.xml"), prices).unwrap();
    std::fs::write(dir.join("rejected.xml"), acknowledgement("999", "No matching data found")).unwrap();
    std::fs::write(dir.join("empty.xml"), FeedDocumentBuilder::generation().build()).unwrap();
    std::fs::write(dir.join("labels.yaml"), LABELS).unwrap();
}

fn load_config(dir: &Path, join_tables: &[&str]) -> IngesterConfig {
    parse_config(&config_yaml(join_tables))
        .unwrap()
        .to_runtime(dir)
        .unwrap()
}

fn pipeline(dir: &Path, join_tables: &[&str], store: &SqliteStore) -> IngestionPipeline {
    let config = load_config(dir, join_tables);
    IngestionPipeline::new(config, Arc::new(DirectorySource::new(dir)), None, store.clone())
}

// ============================================================================
// Full cycle
// ============================================================================

#[tokio::test]
async fn test_run_once_merges_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let store = SqliteStore::open_memory().await.unwrap();

    let summary = pipeline(dir.path(), &[], &store).run_once().await.unwrap();

    assert_eq!(summary.processed, vec!["generation".to_string(), "prices".to_string()]);
    assert_eq!(summary.no_data, vec!["empty".to_string()]);
    let failed: Vec<&str> = summary.failed.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failed, vec!["load", "rejected"]);
    assert!(summary.failed[1].1.contains("999"));

    assert_eq!(
        summary.columns,
        vec![
            "Energy prices".to_string(),
            "Solar generation forecast".to_string(),
            "Wind onshore generation forecast".to_string(),
        ]
    );
    assert_eq!(summary.audit.rows, 2);
    assert!(summary.audit.is_clean());
    assert_eq!(summary.audit.first.as_deref(), Some("2024-01-01 00:00:00"));
    assert_eq!(summary.audit.last.as_deref(), Some("2024-01-01 01:00:00"));

    let stored = store.load_table("energy_data").await.unwrap();
    assert_eq!(stored.get(&local(1, 0), "Energy prices"), Some(91.5));
    assert_eq!(stored.get(&local(1, 1), "Solar generation forecast"), Some(12.0));
    assert_eq!(stored.get(&local(1, 1), "Wind onshore generation forecast"), Some(4198.0));
}

#[tokio::test]
async fn test_rerun_replaces_instead_of_appending() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let store = SqliteStore::open_memory().await.unwrap();
    let pipeline = pipeline(dir.path(), &[], &store);

    let first = pipeline.run_once().await.unwrap();
    let second = pipeline.run_once().await.unwrap();

    assert_eq!(first.audit, second.audit);
    assert_eq!(second.audit.rows, 2);
    assert_eq!(second.audit.duplicate_timestamps, 0);
}

// ============================================================================
// Joins and failures
// ============================================================================

#[tokio::test]
async fn test_existing_table_is_outer_joined() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let store = SqliteStore::open_memory().await.unwrap();

    let history = WideTable::from_rows(
        vec!["Paris temperature".to_string()],
        vec![
            (local(1, 0), vec![Some(3.5)]),
            (local(1, 5), vec![Some(2.0)]),
        ],
    )
    .unwrap();
    store.replace_table("weather_history", &history).await.unwrap();

    let summary = pipeline(dir.path(), &["weather_history", "missing_table"], &store)
        .run_once()
        .await
        .unwrap();

    assert_eq!(summary.columns.last().map(String::as_str), Some("Paris temperature"));
    assert_eq!(summary.audit.rows, 3);

    let stored = store.load_table("energy_data").await.unwrap();
    assert_eq!(stored.get(&local(1, 0), "Paris temperature"), Some(3.5));
    assert_eq!(stored.get(&local(1, 5), "Energy prices"), None);
    assert_eq!(stored.get(&local(1, 5), "Paris temperature"), Some(2.0));
}

#[tokio::test]
async fn test_nothing_to_merge_leaves_table_untouched() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("labels.yaml"), LABELS).unwrap();
    std::fs::write(dir.path().join("empty.xml"), FeedDocumentBuilder::generation().build()).unwrap();
    let store = SqliteStore::open_memory().await.unwrap();

    let result = pipeline(dir.path(), &[], &store).run_once().await;

    assert!(result.is_err());
    assert!(!store.table_exists("energy_data").await.unwrap());
}

#[test]
fn test_print_urls_redacts_token() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("labels.yaml"), LABELS).unwrap();
    let config = load_config(dir.path(), &[]);

    let urls = ingester::print_urls(&config).unwrap();

    assert_eq!(urls.len(), 5);
    assert!(urls[0].starts_with("generation: https://web-api.tp.entsoe.eu/api?documentType=A69&processType=A01&in_Domain=10YFR-RTE------C&periodStart=202312312300"));
    assert!(urls.iter().all(|url| !url.contains("test-token")));
}

// ============================================================================
// Shipped configuration
// ============================================================================

#[test]
fn test_shipped_config_loads() {
    std::env::set_var("ENTSOE_TOKEN", "shipped-config-token");
    let path = test_utils::workspace_root().join("config").join("ingester.yaml");

    let config = IngesterConfig::from_yaml(&path).unwrap();

    assert_eq!(config.queries.len(), 3);
    assert_eq!(config.feed.period.start_param(), "202312312300");
    assert_eq!(config.feed.period.end_param(), "202412312300");
    assert_eq!(config.labels.label("MktPSRType", "B18"), "Wind Offshore");
    let weather = config.weather.as_ref().unwrap();
    assert_eq!(weather.locations.len(), 5);
    assert_eq!(weather.locations[0].name, "Paris");
    assert_eq!(
        config.aliases.get("Price Document").map(String::as_str),
        Some("Energy prices")
    );
}
