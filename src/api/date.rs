//! `YYYY-MM-DD` date decoding for lifecycle API payloads.
//!
//! The service encodes every date as a zero-padded calendar date string.
//! Anything else (timestamps, single-digit months, trailing garbage) is a
//! decode error. Nullable date fields decode JSON `null` or a missing key
//! as `None`.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};

const LAYOUT: &str = "%Y-%m-%d";

/// Parse a strict `YYYY-MM-DD` string.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(format!("invalid date {raw:?}: expected YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(raw, LAYOUT).map_err(|e| format!("invalid date {raw:?}: {e}"))
}

/// Render a date back into the wire layout.
pub fn format_date(date: NaiveDate) -> String {
    date.format(LAYOUT).to_string()
}

/// Seconds since the Unix epoch at 00:00:00 UTC of `date`.
pub fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// `deserialize_with` helper for mandatory date fields.
pub fn required<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

/// `deserialize_with` helper for nullable date fields. Pair with
/// `#[serde(default)]` so a missing key is also `None`.
pub fn optional<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_date(&raw).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
