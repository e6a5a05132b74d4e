//! Time handling utilities for feed timestamps.
//!
//! Feed documents carry offset-aware timestamps. Offsets are preserved until
//! the very last step, where [`to_local_naive`] converts into the configured
//! target zone and drops the offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Timelike};
use chrono_tz::Tz;

use crate::error::{FeedError, FeedResult};

/// Formats accepted for offset-aware timestamps after `Z` has been normalised.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%dT%H:%M%z"];

/// Format used by the upstream API for `periodStart` / `periodEnd`.
pub const PERIOD_FORMAT: &str = "%Y%m%d%H%M";

/// Parse an ISO 8601 timestamp with a UTC offset, keeping the offset.
///
/// Seconds are optional and a trailing `Z` means `+00:00`. Timestamps without
/// any offset are rejected: no zone is ever assumed here.
pub fn parse_offset_datetime(s: &str) -> FeedResult<DateTime<FixedOffset>> {
    let trimmed = s.trim();
    let normalised = match trimmed.strip_suffix('Z') {
        Some(head) => format!("{}+00:00", head),
        None => trimmed.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
        return Ok(dt);
    }

    let mut last_error = None;
    for format in OFFSET_FORMATS {
        match DateTime::parse_from_str(&normalised, format) {
            Ok(dt) => return Ok(dt),
            Err(e) => last_error = Some(e),
        }
    }

    Err(FeedError::InvalidTimestamp {
        value: s.to_string(),
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unrecognised format".to_string()),
    })
}

/// Convert an offset-aware timestamp to wall-clock time in `zone`, without offset.
///
/// During a DST fall-back two distinct instants map to the same local time.
pub fn to_local_naive(ts: &DateTime<FixedOffset>, zone: &Tz) -> NaiveDateTime {
    ts.with_timezone(zone).naive_local()
}

/// Look up an IANA time zone name such as `Europe/Paris`.
pub fn parse_time_zone(name: &str) -> FeedResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| FeedError::InvalidTimeZone(name.to_string()))
}

/// Truncate to the start of the hour, in the timestamp's own offset.
pub fn floor_to_hour(ts: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let into_hour = Duration::seconds(i64::from(ts.minute()) * 60 + i64::from(ts.second()))
        + Duration::nanoseconds(i64::from(ts.nanosecond()));
    *ts - into_hour
}

/// True when minutes, seconds and sub-seconds are all zero.
pub fn is_on_hour(ts: &DateTime<FixedOffset>) -> bool {
    ts.minute() == 0 && ts.second() == 0 && ts.nanosecond() == 0
}

/// Parse a `YYYYMMDDHHMM` period bound.
pub fn parse_period(s: &str) -> FeedResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), PERIOD_FORMAT).map_err(|e| FeedError::InvalidTimestamp {
        value: s.to_string(),
        message: e.to_string(),
    })
}
