//! Time handling utilities for forecast data.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Fixed-width, zero-padded UTC rendering. Lexicographic order of the
/// output equals chronological order for years 0000..=9999.
pub const SORTABLE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Years rendered as exactly four digits. Outside this range chrono adds
/// a sign or extra digits and string order stops matching time order.
pub const SORTABLE_YEARS: RangeInclusive<i32> = 0..=9999;

/// True when `t` can go through [`format_sortable`] without breaking order.
pub fn is_sortable(t: &DateTime<Utc>) -> bool {
    SORTABLE_YEARS.contains(&t.year())
}

/// Drop any sub-second component.
pub fn truncate_to_second(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

/// Render a timestamp in the sortable ISO 8601 form.
///
/// Sub-second precision is not rendered; callers are expected to have
/// truncated already.
pub fn format_sortable(t: &DateTime<Utc>) -> String {
    t.format(SORTABLE_FORMAT).to_string()
}

/// Parse an ISO 8601 timestamp, assuming UTC when no offset is given.
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    // Try date only
    if let Ok(ndt) =
        NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
    {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// A time range for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Same range with both ends truncated to whole seconds.
    pub fn truncated(&self) -> Self {
        Self {
            start: truncate_to_second(self.start),
            end: truncate_to_second(self.end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Split into contiguous sub-ranges of at most `step`.
    ///
    /// Each sub-range ends where the next begins; the last one is cut
    /// short to land exactly on `end`. An empty range yields no windows.
    pub fn windows(&self, step: Duration) -> Vec<TimeRange> {
        if self.is_empty() || step <= Duration::zero() {
            return Vec::new();
        }

        let mut bounds = vec![self.start];
        while let Some(&last) = bounds.last() {
            let next = last + step;
            if next >= self.end {
                break;
            }
            bounds.push(next);
        }
        bounds.push(self.end);

        bounds
            .windows(2)
            .map(|pair| TimeRange::new(pair[0], pair[1]))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_format_is_fixed_width() {
        let t = Utc.with_ymd_and_hms(5, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(format_sortable(&t), "0005-02-03T04:05:06Z");
        assert_eq!(format_sortable(&at(0, 0, 0)), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_sortable_year_bounds() {
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 0, 0).unwrap();
        let beyond = Utc.with_ymd_and_hms(10000, 1, 1, 1, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap();

        assert!(is_sortable(&last));
        assert!(is_sortable(&Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap()));
        assert!(!is_sortable(&beyond));
        assert!(!is_sortable(&before));
        // The reason for the bound
        assert!(format_sortable(&beyond) < format_sortable(&last));
    }

    #[test]
    fn test_truncate_drops_subseconds() {
        let t = at(1, 2, 3) + Duration::milliseconds(999);
        let truncated = truncate_to_second(t);
        assert_eq!(truncated, at(1, 2, 3));
        assert_eq!(truncated.nanosecond(), 0);
    }

    #[test]
    fn test_parse_iso8601_variants() {
        assert_eq!(parse_iso8601("2024-01-01T01:02:03Z").unwrap(), at(1, 2, 3));
        assert_eq!(parse_iso8601("2024-01-01T01:02:03").unwrap(), at(1, 2, 3));
        assert_eq!(parse_iso8601("2024-01-01T01:02").unwrap(), at(1, 2, 0));
        assert_eq!(parse_iso8601("2024-01-01").unwrap(), at(0, 0, 0));
        assert_eq!(
            parse_iso8601("2024-01-01T03:00:00+02:00").unwrap(),
            at(1, 0, 0)
        );
        assert!(parse_iso8601("yesterday").is_err());
    }

    #[test]
    fn test_windows_hourly_with_short_tail() {
        let range = TimeRange::new(at(0, 0, 0), at(2, 30, 0));
        let windows = range.windows(Duration::hours(1));

        assert_eq!(
            windows,
            vec![
                TimeRange::new(at(0, 0, 0), at(1, 0, 0)),
                TimeRange::new(at(1, 0, 0), at(2, 0, 0)),
                TimeRange::new(at(2, 0, 0), at(2, 30, 0)),
            ]
        );
    }

    #[test]
    fn test_windows_exact_multiple() {
        let range = TimeRange::new(at(0, 0, 0), at(2, 0, 0));
        let windows = range.windows(Duration::hours(1));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].end, at(2, 0, 0));
    }

    #[test]
    fn test_windows_shorter_than_step() {
        let range = TimeRange::new(at(0, 0, 0), at(0, 10, 0));
        assert_eq!(range.windows(Duration::hours(1)), vec![range]);
    }

    #[test]
    fn test_windows_empty_range() {
        let t = at(5, 0, 0);
        assert!(TimeRange::new(t, t).windows(Duration::hours(1)).is_empty());
        assert!(TimeRange::new(t, at(4, 0, 0))
            .windows(Duration::hours(1))
            .is_empty());
    }
}
