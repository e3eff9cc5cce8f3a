//! Canonical timestamp handling.
//!
//! Shard stores keep timestamps as ISO-8601 strings with one fixed rendering
//! so that lexicographic order equals chronological order; keyset cursors
//! depend on this.

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};

/// Standard UTC datetime type used across all Faultline crates.
pub type UtcDateTime = DateTime<Utc>;

/// Render a timestamp in the canonical stored form:
/// `YYYY-MM-DDTHH:MM:SS.ffffffZ` (UTC, fixed microsecond width).
pub fn format_ts(ts: UtcDateTime) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored or SDK-supplied ISO-8601 timestamp. Accepts an offset or a
/// trailing `Z`; naive datetimes are taken as UTC.
pub fn parse_ts(raw: &str) -> Option<UtcDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.to_utc());
    }
    raw.parse::<chrono::NaiveDateTime>()
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Truncate a timestamp to the containing UTC hour.
pub fn floor_hour(ts: UtcDateTime) -> UtcDateTime {
    ts.duration_trunc(TimeDelta::hours(1)).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 9, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let a = format_ts(early);
        let b = format_ts(late);
        assert!(a < b, "{a} should sort before {b}");
        assert!(a.ends_with('Z'));
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn parse_round_trips_canonical_form() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_ts(&format_ts(ts)), Some(ts));
    }

    #[test]
    fn parse_accepts_naive_datetimes() {
        let parsed = parse_ts("2024-01-15T14:30:00").unwrap();
        assert_eq!(format_ts(parsed), "2024-01-15T14:30:00.000000Z");
    }

    #[test]
    fn floor_hour_truncates_minutes_and_below() {
        let ts = Utc
            .with_ymd_and_hms(2024, 3, 1, 9, 42, 17)
            .unwrap()
            .checked_add_signed(TimeDelta::milliseconds(250))
            .unwrap();
        let floored = floor_hour(ts);
        assert_eq!(format_ts(floored), "2024-03-01T09:00:00.000000Z");
    }
}
