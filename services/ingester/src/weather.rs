//! Hourly weather observations from the Open-Meteo archive API.
//!
//! Responses carry `hourly.time` plus one array per requested variable.
//! Each non-null value becomes a native hourly [`Record`] with metadata
//! `city`, `variable`, so weather flows through the same merge as the feeds.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

use feed_common::SeriesMetadata;
use ingestion::{Record, ResolutionOrigin};

use crate::config::WeatherSettings;

/// Archive timestamps, always GMT.
const ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// A named observation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveResponse {
    pub hourly: HourlyBlock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourlyBlock {
    pub time: Vec<String>,
    #[serde(flatten)]
    pub variables: BTreeMap<String, Vec<Option<f64>>>,
}

/// Archive request URL for one location.
pub fn archive_url(
    endpoint: &str,
    location: &Location,
    start_date: &str,
    end_date: &str,
    variables: &[String],
) -> Result<Url> {
    let params = [
        ("latitude", location.latitude.to_string()),
        ("longitude", location.longitude.to_string()),
        ("start_date", start_date.to_string()),
        ("end_date", end_date.to_string()),
        ("hourly", variables.join(",")),
        ("timezone", "GMT".to_string()),
    ];
    Url::parse_with_params(endpoint, &params)
        .with_context(|| format!("Invalid weather endpoint '{}'", endpoint))
}

/// Convert an archive response into hourly records.
///
/// Records come out variable by variable in `variables` order. Null values
/// are skipped. A requested variable missing from the response, or an array
/// whose length differs from `hourly.time`, is an error.
pub fn weather_records(city: &str, response: &ArchiveResponse, variables: &[String]) -> Result<Vec<Record>> {
    let hourly = &response.hourly;
    let times = hourly
        .time
        .iter()
        .map(|t| {
            NaiveDateTime::parse_from_str(t, ARCHIVE_TIME_FORMAT)
                .map(|naive| naive.and_utc().fixed_offset())
                .with_context(|| format!("Invalid weather timestamp '{}'", t))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::new();
    for variable in variables {
        let values = hourly
            .variables
            .get(variable)
            .ok_or_else(|| anyhow!("Weather response for {} has no '{}' series", city, variable))?;
        anyhow::ensure!(
            values.len() == times.len(),
            "Weather series '{}' for {} has {} values for {} timestamps",
            variable,
            city,
            values.len(),
            times.len()
        );

        let metadata = SeriesMetadata::from_pairs([("city", city), ("variable", variable.as_str())]);
        let mut nulls = 0usize;
        for (timestamp, value) in times.iter().zip(values) {
            match value {
                Some(value) => records.push(Record {
                    timestamp: *timestamp,
                    value: *value,
                    origin: ResolutionOrigin::Native60,
                    metadata: metadata.clone(),
                }),
                None => nulls += 1,
            }
        }
        if nulls > 0 {
            debug!(city = %city, variable = %variable, nulls, "Skipped null weather values");
        }
    }

    Ok(records)
}

/// Client for the archive API.
pub struct WeatherClient {
    client: Client,
    settings: WeatherSettings,
}

impl WeatherClient {
    pub fn new(settings: WeatherSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, settings })
    }

    pub fn locations(&self) -> &[Location] {
        &self.settings.locations
    }

    pub fn url_for(&self, location: &Location) -> Result<Url> {
        archive_url(
            &self.settings.endpoint,
            location,
            &self.settings.start_date,
            &self.settings.end_date,
            &self.settings.variables,
        )
    }

    /// Fetch and convert the observations of one location.
    #[instrument(skip(self, location), fields(city = %location.name))]
    pub async fn fetch_records(&self, location: &Location) -> Result<Vec<Record>> {
        let url = self.url_for(location)?;
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("Weather request failed for {}", location.name))?;
        let body: ArchiveResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid weather response for {}", location.name))?;

        let records = weather_records(&location.name, &body, &self.settings.variables)?;
        info!(city = %location.name, records = records.len(), "Fetched weather observations");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> Location {
        Location {
            name: "Paris".to_string(),
            latitude: 48.8566,
            longitude: 2.3522,
        }
    }

    fn variables() -> Vec<String> {
        vec!["temperature_2m".to_string(), "precipitation".to_string()]
    }

    #[test]
    fn test_archive_url() {
        let url = archive_url(
            "https://archive-api.open-meteo.com/v1/archive",
            &paris(),
            "2024-01-01",
            "2024-12-31",
            &variables(),
        )
        .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("latitude".to_string(), "48.8566".to_string()));
        assert_eq!(pairs[4], ("hourly".to_string(), "temperature_2m,precipitation".to_string()));
        assert_eq!(pairs[5], ("timezone".to_string(), "GMT".to_string()));
    }

    #[test]
    fn test_records_skip_nulls() {
        let body = r#"{
            "latitude": 48.86,
            "hourly_units": {"time": "iso8601"},
            "hourly": {
                "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
                "temperature_2m": [3.5, null],
                "precipitation": [0.0, 0.2]
            }
        }"#;
        let response: ArchiveResponse = serde_json::from_str(body).unwrap();
        let records = weather_records("Paris", &response, &variables()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(records[0].value, 3.5);
        assert_eq!(records[0].metadata.get("city"), Some("Paris"));
        assert_eq!(records[0].metadata.get("variable"), Some("temperature_2m"));
        assert_eq!(records[2].value, 0.2);
        assert!(records.iter().all(|r| r.origin == ResolutionOrigin::Native60));
    }

    #[test]
    fn test_missing_variable_is_error() {
        let body = r#"{"hourly": {"time": ["2024-01-01T00:00"], "temperature_2m": [1.0]}}"#;
        let response: ArchiveResponse = serde_json::from_str(body).unwrap();
        assert!(weather_records("Paris", &response, &variables()).is_err());
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let body = r#"{"hourly": {"time": ["2024-01-01T00:00"], "temperature_2m": [1.0, 2.0], "precipitation": [0.0]}}"#;
        let response: ArchiveResponse = serde_json::from_str(body).unwrap();
        assert!(weather_records("Paris", &response, &variables()).is_err());
    }
}
