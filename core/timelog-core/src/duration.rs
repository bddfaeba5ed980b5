//! Elapsed-time arithmetic and timestamp parsing.
//!
//! Timestamps are local wall-clock values without an offset, the same
//! representation the data file stores.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, TimelogError};

/// Formats accepted for full timestamps, tried in order.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Signed elapsed minutes from `start` to `end`. No clamping.
pub fn duration_minutes(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 60_000_000.0,
        // Only reachable for spans of ~290k years
        None => delta.num_seconds() as f64 / 60.0,
    }
}

/// Parses both timestamps and returns the signed minutes between them.
pub fn duration_minutes_str(start: &str, end: &str) -> Result<f64> {
    Ok(duration_minutes(parse_timestamp(start)?, parse_timestamp(end)?))
}

/// Parses an ISO-8601 local timestamp (`T` or space separator, seconds optional).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| TimelogError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Parses an ISO calendar date (`YYYY-MM-DD`).
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        TimelogError::InvalidTimestamp {
            value: value.to_string(),
        }
    })
}
