use chrono::{DateTime, Months, Utc};

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Add calendar months to a millisecond timestamp.
///
/// Day-of-month is clamped to the last day of the target month
/// (Jan 31 + 1 month = Feb 28/29). Out-of-range input saturates to `i64::MAX`.
pub fn add_months_millis(ts_millis: i64, months: u32) -> i64 {
    DateTime::<Utc>::from_timestamp_millis(ts_millis)
        .and_then(|dt| dt.checked_add_months(Months::new(months)))
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(i64::MAX)
}

/// Parse an RFC 3339 timestamp (Square's wire format) into milliseconds
pub fn parse_rfc3339_millis(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
