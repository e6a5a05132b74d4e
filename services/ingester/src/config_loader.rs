//! Configuration loader for the ingester.
//!
//! Loads the YAML service configuration, substitutes environment variables
//! (`${VAR}` and `${VAR:-default}`), validates it and converts it into the
//! runtime [`IngesterConfig`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use feed_common::{parse_time_zone, SeriesMetadata};
use ingestion::LabelTables;

use crate::config::{DatabaseSettings, FeedSettings, IngesterConfig, WeatherSettings};
use crate::query::{FeedQuery, Period};
use crate::weather::Location;

// ============================================================================
// File Configuration (ingester.yaml)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub feed: FeedFileConfig,
    pub target_zone: String,
    pub database: DatabaseFileConfig,
    #[serde(default)]
    pub labels_file: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    pub queries: Vec<QueryFileConfig>,
    #[serde(default)]
    pub weather: Option<WeatherFileConfig>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedFileConfig {
    pub endpoint: String,
    pub token: String,
    pub period_start: String,
    pub period_end: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseFileConfig {
    pub path: String,
    pub table: String,
    #[serde(default)]
    pub join_tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFileConfig {
    pub name: String,
    pub required: SeriesMetadata,
    #[serde(default)]
    pub optional: SeriesMetadata,
    #[serde(default)]
    pub domains: SeriesMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherFileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub endpoint: String,
    pub start_date: String,
    pub end_date: String,
    pub variables: Vec<String>,
    pub locations: Vec<Location>,
}

fn default_poll_interval() -> u64 {
    86_400
}

fn default_timeout() -> u64 {
    120
}

fn default_max_concurrent() -> usize {
    3
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load, expand, validate and convert the service configuration.
///
/// A relative `labels_file` is resolved against the configuration file's directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<IngesterConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ingester config from {:?}", path))?;

    let file = parse_config(&content)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    file.to_runtime(base_dir)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<FileConfig> {
    let expanded = expand_env_vars(content)?;
    let config: FileConfig =
        serde_yaml::from_str(&expanded).with_context(|| "Failed to parse ingester config YAML")?;
    validate_config(&config)?;
    Ok(config)
}

impl FileConfig {
    /// Convert to runtime types. Loads the label tables file.
    pub fn to_runtime(&self, base_dir: &Path) -> Result<IngesterConfig> {
        let period = Period::parse(&self.feed.period_start, &self.feed.period_end)?;
        let target_zone = parse_time_zone(&self.target_zone)
            .with_context(|| format!("Invalid target_zone '{}'", self.target_zone))?;

        let labels = match &self.labels_file {
            Some(file) => {
                let labels_path = resolve_path(base_dir, file);
                LabelTables::load(&labels_path)
                    .with_context(|| format!("Failed to load label tables from {:?}", labels_path))?
            }
            None => LabelTables::new(),
        };

        let queries = self
            .queries
            .iter()
            .map(|q| FeedQuery {
                name: q.name.clone(),
                required: q.required.clone(),
                optional: q.optional.clone(),
                domains: q.domains.clone(),
            })
            .collect();

        let weather = self
            .weather
            .as_ref()
            .filter(|w| w.enabled)
            .map(|w| WeatherSettings {
                endpoint: w.endpoint.clone(),
                start_date: w.start_date.clone(),
                end_date: w.end_date.clone(),
                variables: w.variables.clone(),
                locations: w.locations.clone(),
            });

        Ok(IngesterConfig {
            feed: FeedSettings {
                endpoint: self.feed.endpoint.clone(),
                token: self.feed.token.clone(),
                period,
                timeout: Duration::from_secs(self.feed.timeout_secs),
                max_concurrent: self.feed.max_concurrent,
            },
            target_zone,
            database: DatabaseSettings {
                path: PathBuf::from(&self.database.path),
                table: self.database.table.clone(),
                join_tables: self.database.join_tables.clone(),
            },
            labels,
            queries,
            weather,
            aliases: self.aliases.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        })
    }
}

fn resolve_path(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve `VAR` or `VAR:-default`. An empty variable falls back to the default.
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_config(config: &FileConfig) -> Result<()> {
    anyhow::ensure!(!config.feed.endpoint.is_empty(), "Feed endpoint cannot be empty");
    anyhow::ensure!(!config.feed.token.is_empty(), "Feed security token cannot be empty");
    anyhow::ensure!(
        config.feed.max_concurrent > 0,
        "max_concurrent must be greater than 0"
    );
    anyhow::ensure!(
        !config.target_zone.trim().is_empty(),
        "target_zone is required (IANA name such as Europe/Paris)"
    );
    anyhow::ensure!(!config.database.path.is_empty(), "Database path cannot be empty");
    anyhow::ensure!(!config.database.table.is_empty(), "Output table name cannot be empty");
    anyhow::ensure!(
        !config.database.join_tables.contains(&config.database.table),
        "Output table '{}' cannot also be a join table",
        config.database.table
    );
    anyhow::ensure!(config.poll_interval_secs > 0, "poll_interval_secs must be greater than 0");

    let mut names = std::collections::HashSet::new();
    for query in &config.queries {
        anyhow::ensure!(!query.name.is_empty(), "Query name cannot be empty");
        anyhow::ensure!(
            names.insert(query.name.as_str()),
            "Duplicate query name: {}",
            query.name
        );
        anyhow::ensure!(
            !query.required.is_empty(),
            "Query '{}' has no required parameters",
            query.name
        );
    }

    if let Some(weather) = &config.weather {
        if weather.enabled {
            anyhow::ensure!(!weather.locations.is_empty(), "Weather needs at least one location");
            anyhow::ensure!(!weather.variables.is_empty(), "Weather needs at least one variable");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
feed:
  endpoint: https://web-api.tp.entsoe.eu/api
  token: abc
  period_start: "202312312300"
  period_end: "202401012300"
target_zone: Europe/Paris
database:
  path: data/feeds.db
  table: energy_data
queries:
  - name: prices
    required:
      documentType: A44
    domains:
      in_Domain: 10YFR-RTE------C
      out_Domain: 10YFR-RTE------C
"#;

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("FEEDS_TEST_VAR", "test_value");
        let result = expand_env_vars("prefix_${FEEDS_TEST_VAR}_suffix").unwrap();
        assert_eq!(result, "prefix_test_value_suffix");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("FEEDS_NONEXISTENT_VAR");
        let result = expand_env_vars("value_${FEEDS_NONEXISTENT_VAR:-default}_end").unwrap();
        assert_eq!(result, "value_default_end");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("FEEDS_REQUIRED_VAR");
        assert!(expand_env_vars("${FEEDS_REQUIRED_VAR}").is_err());
    }

    #[test]
    fn test_expand_env_vars_unclosed() {
        assert!(expand_env_vars("token: ${FEEDS_TOKEN").is_err());
    }

    #[test]
    fn test_parse_minimal_config_keeps_param_order() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.feed.max_concurrent, 3);
        assert_eq!(config.poll_interval_secs, 86_400);
        let domains: Vec<&str> = config.queries[0].domains.fields().collect();
        assert_eq!(domains, vec!["in_Domain", "out_Domain"]);
        assert!(config.weather.is_none());
    }

    #[test]
    fn test_runtime_conversion() {
        let config = parse_config(MINIMAL).unwrap().to_runtime(Path::new(".")).unwrap();
        assert_eq!(config.target_zone, chrono_tz::Europe::Paris);
        assert_eq!(config.queries[0].required.get("documentType"), Some("A44"));
        assert!(config.labels.is_empty());
        assert_eq!(config.feed.period.start_param(), "202312312300");
    }

    #[test]
    fn test_unknown_zone_rejected() {
        let text = MINIMAL.replace("Europe/Paris", "Europe/Atlantis");
        let err = parse_config(&text).unwrap().to_runtime(Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("target_zone"));
    }

    #[test]
    fn test_duplicate_query_names_rejected() {
        let text = format!(
            "{}  - name: prices\n    required:\n      documentType: A44\n",
            MINIMAL
        );
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn test_empty_token_rejected() {
        let text = MINIMAL.replace("token: abc", "token: \"\"");
        assert!(parse_config(&text).is_err());
    }
}
