//! Time ranges and report filters

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Half-open `[from, to)` interval, always normalized before use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive start
    pub from: DateTime<Utc>,
    /// Exclusive end
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Create a range without normalizing it
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Width of the range in fractional hours
    #[allow(clippy::cast_precision_loss)]
    pub fn hours(&self) -> f64 {
        (self.to - self.from).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Caller-supplied bounds, either side may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeRequest {
    /// Requested start
    pub from: Option<DateTime<Utc>>,
    /// Requested end
    pub to: Option<DateTime<Utc>>,
}

impl From<DateRange> for RangeRequest {
    fn from(range: DateRange) -> Self {
        Self {
            from: Some(range.from),
            to: Some(range.to),
        }
    }
}

/// Time-series bucket width
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// Calendar day
    #[default]
    Day,
    /// ISO week starting Monday
    Week,
    /// Calendar month
    Month,
}

impl GroupBy {
    /// Parse a query value; anything unrecognized means `Day`
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "week" => GroupBy::Week,
            "month" => GroupBy::Month,
            _ => GroupBy::Day,
        }
    }

    /// Start of the bucket containing `ts` (UTC)
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            GroupBy::Day => date,
            GroupBy::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            GroupBy::Month => date.with_day(1).unwrap_or(date),
        };
        start.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Filter as received from the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRequest {
    /// Requested range
    pub range: RangeRequest,
    /// Restrict to one contractor
    pub contractor_id: Option<Uuid>,
    /// Restrict to one driver
    pub driver_id: Option<Uuid>,
    /// Restrict to one polygon
    pub polygon_id: Option<Uuid>,
    /// Restrict to one camera
    pub camera_id: Option<Uuid>,
    /// Restrict to one violation status
    pub violation_type: Option<String>,
    /// Bucket width for series
    pub group_by: GroupBy,
}

/// Filter after range normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsFilter {
    /// Normalized range
    pub range: DateRange,
    /// Restrict to one contractor
    pub contractor_id: Option<Uuid>,
    /// Restrict to one driver
    pub driver_id: Option<Uuid>,
    /// Restrict to one polygon
    pub polygon_id: Option<Uuid>,
    /// Restrict to one camera
    pub camera_id: Option<Uuid>,
    /// Restrict to one violation status
    pub violation_type: Option<String>,
    /// Bucket width for series
    pub group_by: GroupBy,
}

impl AnalyticsFilter {
    /// Filter with only a range set
    pub fn for_range(range: DateRange) -> Self {
        Self {
            range,
            contractor_id: None,
            driver_id: None,
            polygon_id: None,
            camera_id: None,
            violation_type: None,
            group_by: GroupBy::Day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_group_by_parse_lenient() {
        assert_eq!(GroupBy::parse_lenient("WEEK"), GroupBy::Week);
        assert_eq!(GroupBy::parse_lenient(" month "), GroupBy::Month);
        assert_eq!(GroupBy::parse_lenient("day"), GroupBy::Day);
        assert_eq!(GroupBy::parse_lenient("hour"), GroupBy::Day);
        assert_eq!(GroupBy::parse_lenient(""), GroupBy::Day);
    }

    #[test]
    fn test_truncate_week_starts_monday() {
        // 2025-01-01 is a Wednesday
        assert_eq!(GroupBy::Week.truncate(at(2025, 1, 1, 8)), at(2024, 12, 30, 0));
        assert_eq!(GroupBy::Week.truncate(at(2025, 1, 6, 0)), at(2025, 1, 6, 0));
        assert_eq!(GroupBy::Week.truncate(at(2025, 1, 12, 23)), at(2025, 1, 6, 0));
    }

    #[test]
    fn test_truncate_day_and_month() {
        assert_eq!(GroupBy::Day.truncate(at(2025, 3, 14, 17)), at(2025, 3, 14, 0));
        assert_eq!(GroupBy::Month.truncate(at(2025, 3, 14, 17)), at(2025, 3, 1, 0));
    }

    #[test]
    fn test_range_hours() {
        let range = DateRange::new(at(2025, 1, 1, 0), at(2025, 1, 2, 12));
        assert!((range.hours() - 36.0).abs() < f64::EPSILON);
    }
}
