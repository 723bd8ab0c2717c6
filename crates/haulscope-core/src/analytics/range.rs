//! Range normalization

use chrono::{DateTime, Duration, Utc};

use crate::config::AnalyticsConfig;
use crate::models::{AnalyticsFilter, DateRange, FilterRequest, RangeRequest};

/// Bounds caller-supplied ranges to the configured default and maximum width.
///
/// Never fails: a missing end becomes "now", a missing start becomes
/// `end - default_days`, an inverted range shrinks to the last day before
/// `end`, and anything wider than `max_days` is cut from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeNormalizer {
    default_days: u32,
    max_days: u32,
}

impl RangeNormalizer {
    /// Create a normalizer
    pub fn new(default_days: u32, max_days: u32) -> Self {
        Self {
            default_days,
            max_days,
        }
    }

    /// Create a normalizer from the analytics settings
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.default_range_days, config.max_range_days)
    }

    /// Normalize against the current time
    pub fn normalize(&self, request: RangeRequest) -> DateRange {
        self.normalize_at(request, Utc::now())
    }

    /// Normalize with an explicit "now"
    pub fn normalize_at(&self, request: RangeRequest, now: DateTime<Utc>) -> DateRange {
        let to = request.to.unwrap_or(now);
        let mut from = request
            .from
            .unwrap_or_else(|| days_before(to, self.default_days));

        if to < from {
            from = days_before(to, 1);
        }

        let widest = days_before(to, self.max_days);
        if from < widest {
            from = widest;
        }

        DateRange { from, to }
    }

    /// Normalize the range of a filter and carry the rest over
    pub fn normalize_filter(&self, request: FilterRequest) -> AnalyticsFilter {
        self.normalize_filter_at(request, Utc::now())
    }

    /// [`RangeNormalizer::normalize_filter`] with an explicit "now"
    pub fn normalize_filter_at(&self, request: FilterRequest, now: DateTime<Utc>) -> AnalyticsFilter {
        AnalyticsFilter {
            range: self.normalize_at(request.range, now),
            contractor_id: request.contractor_id,
            driver_id: request.driver_id,
            polygon_id: request.polygon_id,
            camera_id: request.camera_id,
            violation_type: request.violation_type,
            group_by: request.group_by,
        }
    }
}

fn days_before(ts: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    ts.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
