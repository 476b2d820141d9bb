//! Timestamp utilities

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Midnight UTC on the first day of the month containing `at`
pub fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

/// Fixed-width RFC 3339 form used for stored timestamps
///
/// Always millisecond precision with a `Z` suffix, so stored values
/// compare correctly as strings.
pub fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch
pub fn unix_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
