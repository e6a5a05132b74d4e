//! Feed queries and request URL construction.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use reqwest::Url;

use feed_common::time::{parse_period, PERIOD_FORMAT};
use feed_common::SeriesMetadata;

/// Placeholder written in place of the security token when URLs are displayed.
pub const REDACTED: &str = "***";

/// One logical request against the feed API.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub name: String,
    /// Selection parameters that become invariant metadata of every series.
    pub required: SeriesMetadata,
    pub optional: SeriesMetadata,
    /// Area parameters. Sent with the request but not attached to series.
    pub domains: SeriesMetadata,
}

impl FeedQuery {
    /// Request parameters in order: required, optional, domains.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .chain(self.domains.iter())
    }
}

/// Requested time window, UTC, in `YYYYMMDDHHMM` form on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Period {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse_period(start).with_context(|| format!("Invalid period start '{}'", start))?;
        let end = parse_period(end).with_context(|| format!("Invalid period end '{}'", end))?;
        anyhow::ensure!(start < end, "Period start {} is not before end {}", start, end);
        Ok(Self { start, end })
    }

    pub fn start_param(&self) -> String {
        self.start.format(PERIOD_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(PERIOD_FORMAT).to_string()
    }
}

/// Full request URL: query parameters, then the period, then the token.
pub fn build_url(endpoint: &str, query: &FeedQuery, period: &Period, token: &str) -> Result<Url> {
    let start = period.start_param();
    let end = period.end_param();
    let params = query
        .params()
        .chain([
            ("periodStart", start.as_str()),
            ("periodEnd", end.as_str()),
            ("securityToken", token),
        ]);
    Url::parse_with_params(endpoint, params).with_context(|| format!("Invalid endpoint '{}'", endpoint))
}

/// URL safe to print or log.
pub fn redacted_url(endpoint: &str, query: &FeedQuery, period: &Period) -> Result<Url> {
    build_url(endpoint, query, period, REDACTED)
}
