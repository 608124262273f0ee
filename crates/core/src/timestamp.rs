//! RFC3339 helpers shared by the storage formats
//!
//! Absent timestamps are carried as `None` in memory. On the wire they are
//! written as the zero instant `0001-01-01T00:00:00Z`, which reads back as
//! `None`.

use jiff::Timestamp;

/// Wire form of an absent timestamp
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

const RFC3339_SECONDS: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Drop the sub-second part of a timestamp, rounding toward the past.
pub fn truncate_to_second(ts: Timestamp) -> Timestamp {
    let mut secs = ts.as_second();
    if ts.subsec_nanosecond() < 0 {
        secs -= 1;
    }
    Timestamp::from_second(secs).unwrap_or(ts)
}

/// Format at RFC3339 second resolution, UTC.
pub fn format_rfc3339(ts: Timestamp) -> String {
    truncate_to_second(ts).strftime(RFC3339_SECONDS).to_string()
}

/// Format an optional timestamp, writing the zero instant for `None`.
pub fn format_optional(ts: Option<Timestamp>) -> String {
    match ts {
        Some(ts) => format_rfc3339(ts),
        None => ZERO_TIME.to_string(),
    }
}

/// Parse an RFC3339 string. The zero instant, an empty string and anything
/// unparseable all yield `None`.
pub fn parse_optional(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if value.is_empty() || value == ZERO_TIME {
        return None;
    }
    value.parse::<Timestamp>().ok()
}
