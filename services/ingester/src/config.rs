//! Ingester runtime configuration.

use anyhow::Result;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ingestion::LabelTables;

use crate::query::{FeedQuery, Period};
use crate::weather::Location;

/// Top-level ingester configuration.
#[derive(Debug, Clone)]
pub struct IngesterConfig {
    /// Feed API access and request window
    pub feed: FeedSettings,

    /// Zone the merged table is keyed in
    pub target_zone: Tz,

    /// Output database and tables
    pub database: DatabaseSettings,

    /// Code to label translations applied to feed series
    pub labels: LabelTables,

    /// Feed queries, one document each
    pub queries: Vec<FeedQuery>,

    /// Hourly weather observations, when enabled
    pub weather: Option<WeatherSettings>,

    /// Column renames applied after the merge
    pub aliases: BTreeMap<String, String>,

    /// Polling interval in continuous mode
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub endpoint: String,
    pub token: String,
    pub period: Period,
    pub timeout: Duration,
    /// Number of concurrent document downloads
    pub max_concurrent: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    /// Table the merged result replaces
    pub table: String,
    /// Existing tables outer-joined into the result when present
    pub join_tables: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub endpoint: String,
    /// First day, `YYYY-MM-DD`
    pub start_date: String,
    /// Last day, `YYYY-MM-DD`, inclusive
    pub end_date: String,
    pub variables: Vec<String>,
    pub locations: Vec<Location>,
}

impl IngesterConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::config_loader::load_config(path)
    }
}
