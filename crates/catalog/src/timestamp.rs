//! Timestamp parsing.
//!
//! Upstream catalogs are inconsistent about date formats. Every accepted
//! form parses to a single canonical `DateTime<Utc>`; inputs without an
//! offset are taken as UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Offset-aware formats tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Naive formats, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Error returned when no accepted format matches
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized timestamp {0:?}")]
pub struct UnrecognizedTimestamp(pub String);

/// Parse a raw timestamp string into a UTC instant.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, UnrecognizedTimestamp> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(UnrecognizedTimestamp(raw.to_string()))
}

/// Start of a lookback window: `now - days`.
///
/// Windows reaching past the earliest representable instant start there.
pub fn lookback_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
