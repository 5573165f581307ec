//! Timestamp helpers shared by evidence, reports and export documents.

use chrono::{DateTime, SecondsFormat, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`.
///
/// ```
/// use raiflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso8601(&Utc::now())
}

/// Formats a timestamp the same way as [`iso_timestamp`].
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Formats a timestamp as RFC 3339 with millisecond precision and a `Z` suffix.
#[must_use]
pub fn format_rfc3339_millis(dt: &Timestamp) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds elapsed between two timestamps, clamped at zero.
#[must_use]
pub fn elapsed_ms(start: &Timestamp, end: &Timestamp) -> u64 {
    u64::try_from((*end - *start).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with("+00:00"));
    }

    #[test]
    fn test_format_iso8601_microseconds() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).single().unwrap();
        assert_eq!(format_iso8601(&dt), "2024-03-01T12:30:05.000000+00:00");
        assert_eq!(format_rfc3339_millis(&dt), "2024-03-01T12:30:05.000Z");
    }

    #[test]
    fn test_elapsed_ms_clamps_negative() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 2).single().unwrap();
        assert_eq!(elapsed_ms(&a, &b), 2000);
        assert_eq!(elapsed_ms(&b, &a), 0);
    }
}
