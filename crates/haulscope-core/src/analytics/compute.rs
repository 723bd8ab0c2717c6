//! Derived-metric arithmetic shared by the aggregators.
//!
//! Every ratio that can divide by zero goes through [`ratio`], which returns
//! `0.0` for an empty denominator and for any non-finite result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{CleaningAreaActivity, DateRange, EntityMetric, GroupBy, SeriesPoint};

/// Replace NaN and infinities with zero
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// `numerator / denominator`, zero when the denominator is zero
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

/// Share of `count` in `total`
#[allow(clippy::cast_precision_loss)]
pub fn share(count: i64, total: i64) -> f64 {
    ratio(count as f64, total as f64)
}

/// Fill `share` of each metric relative to the sum over the slice
pub fn assign_shares(metrics: &mut [EntityMetric]) {
    let total: i64 = metrics.iter().map(|m| m.count).sum();
    for metric in metrics.iter_mut() {
        metric.share = share(metric.count, total);
    }
}

/// Fill `trip_heat` of each area relative to the busiest one
pub fn assign_heat(areas: &mut [CleaningAreaActivity]) {
    let busiest = areas.iter().map(|a| a.trips).max().unwrap_or(0);
    for area in areas.iter_mut() {
        area.trip_heat = share(area.trips, busiest);
    }
}

/// Hours between the last activity and the end of the range, never negative.
///
/// An entity without activity has been idle for the whole range.
#[allow(clippy::cast_precision_loss)]
pub fn idle_hours(range: &DateRange, last_activity: Option<DateTime<Utc>>) -> f64 {
    let hours = match last_activity {
        Some(last) => (range.to - last).num_milliseconds() as f64 / 3_600_000.0,
        None => range.hours(),
    };
    finite_or_zero(hours).max(0.0)
}

/// Mean gap between visits, spread over `trip_count - 1` intervals
#[allow(clippy::cast_precision_loss)]
pub fn average_interval_hours(
    first_entry: Option<DateTime<Utc>>,
    last_exit: Option<DateTime<Utc>>,
    trip_count: i64,
) -> f64 {
    match (first_entry, last_exit) {
        (Some(first), Some(last)) if trip_count > 1 && last > first => {
            let span = (last - first).num_milliseconds() as f64 / 3_600_000.0;
            ratio(span, (trip_count - 1) as f64)
        }
        _ => 0.0,
    }
}

/// Sort by count descending, then id ascending, and keep the first `limit`
pub fn top_n<T>(mut items: Vec<T>, limit: usize, key: impl Fn(&T) -> (i64, Uuid)) -> Vec<T> {
    items.sort_by(|a, b| {
        let (count_a, id_a) = key(a);
        let (count_b, id_b) = key(b);
        count_b.cmp(&count_a).then(id_a.cmp(&id_b))
    });
    items.truncate(limit);
    items
}

/// Rank entity metrics and compute shares over the kept set
pub fn rank_entities(metrics: Vec<EntityMetric>, limit: usize) -> Vec<EntityMetric> {
    let mut ranked = top_n(metrics, limit, |m| (m.count, m.id));
    assign_shares(&mut ranked);
    ranked
}

/// Daily totals read from a rollup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyTotal {
    /// Day bucket
    pub day: DateTime<Utc>,
    /// Rows that day
    pub count: i64,
    /// Summed value that day
    pub value: f64,
}

/// Fold daily totals into `group_by` buckets, ascending by bucket
pub fn fold_series(days: impl IntoIterator<Item = DailyTotal>, group_by: GroupBy) -> Vec<SeriesPoint> {
    let mut buckets: BTreeMap<DateTime<Utc>, (i64, f64)> = BTreeMap::new();
    for day in days {
        let entry = buckets.entry(group_by.truncate(day.day)).or_insert((0, 0.0));
        entry.0 += day.count;
        entry.1 += day.value;
    }
    buckets
        .into_iter()
        .map(|(bucket, (count, value))| SeriesPoint {
            bucket,
            count,
            value: finite_or_zero(value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn metric(count: i64) -> EntityMetric {
        EntityMetric {
            id: Uuid::new_v4(),
            name: "m".to_string(),
            count,
            volume: 0.0,
            share: 0.0,
        }
    }

    #[test]
    fn test_ratio_guards() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(ratio(0.0, 0.0), 0.0);
        assert_eq!(ratio(f64::INFINITY, 2.0), 0.0);
        assert_eq!(ratio(f64::NAN, 2.0), 0.0);
        assert!((ratio(1.0, 4.0) - 0.25).abs() < 1e-12);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_shares_of_empty_set() {
        let mut metrics: Vec<EntityMetric> = vec![];
        assign_shares(&mut metrics);
        assert!(metrics.is_empty());

        let mut zeros = vec![metric(0), metric(0)];
        assign_shares(&mut zeros);
        assert!(zeros.iter().all(|m| m.share == 0.0));
    }

    #[test]
    fn test_heat_is_relative_to_busiest() {
        let area = |trips| CleaningAreaActivity {
            cleaning_area_id: Uuid::new_v4(),
            trips,
            active_trips: 0,
            has_violations: false,
            trip_heat: 0.0,
        };
        let mut areas = vec![area(10), area(5), area(0)];
        assign_heat(&mut areas);
        let heat: Vec<f64> = areas.iter().map(|a| a.trip_heat).collect();
        assert_eq!(heat, vec![1.0, 0.5, 0.0]);

        let mut idle = vec![area(0)];
        assign_heat(&mut idle);
        assert_eq!(idle[0].trip_heat, 0.0);
    }

    #[test]
    fn test_idle_hours() {
        let range = DateRange::new(at(2025, 1, 1, 0), at(2025, 1, 2, 0));
        assert_eq!(idle_hours(&range, None), 24.0);
        assert_eq!(idle_hours(&range, Some(at(2025, 1, 1, 18))), 6.0);
        // activity recorded after the range end
        assert_eq!(idle_hours(&range, Some(at(2025, 1, 3, 0))), 0.0);
    }

    #[test]
    fn test_average_interval() {
        let first = Some(at(2025, 1, 1, 0));
        let last = Some(at(2025, 1, 1, 12));
        assert_eq!(average_interval_hours(first, last, 4), 4.0);
        assert_eq!(average_interval_hours(first, last, 1), 0.0);
        assert_eq!(average_interval_hours(None, last, 4), 0.0);
        assert_eq!(average_interval_hours(last, first, 4), 0.0);
    }

    #[test]
    fn test_top_n_breaks_ties_by_id() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let items = vec![(3, high), (7, Uuid::from_u128(9)), (3, low), (1, Uuid::from_u128(4))];

        let ranked = top_n(items, 3, |item| *item);

        assert_eq!(ranked, vec![(7, Uuid::from_u128(9)), (3, low), (3, high)]);
    }

    #[test]
    fn test_rank_entities_shares_cover_kept_set() {
        let ranked = rank_entities(vec![metric(6), metric(3), metric(1)], 2);
        assert_eq!(ranked.len(), 2);
        assert!((ranked[0].share - 6.0 / 9.0).abs() < 1e-12);
        assert!((ranked[1].share - 3.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_weekly_series_from_daily_totals() {
        // 180 trips spread over the first week of January, 210 over the second
        let mut days = Vec::new();
        for offset in 0..5 {
            days.push(DailyTotal {
                day: at(2025, 1, 1, 0) + Duration::days(offset),
                count: 36,
                value: 360.0,
            });
        }
        for offset in 0..7 {
            days.push(DailyTotal {
                day: at(2025, 1, 6, 0) + Duration::days(offset),
                count: 30,
                value: 300.0,
            });
        }

        let series = fold_series(days, GroupBy::Week);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].bucket, at(2024, 12, 30, 0));
        assert_eq!(series[0].count, 180);
        assert_eq!(series[1].bucket, at(2025, 1, 6, 0));
        assert_eq!(series[1].count, 210);
        assert!(series[0].bucket < series[1].bucket);
    }

    #[test]
    fn test_series_orders_unsorted_input() {
        let days = vec![
            DailyTotal {
                day: at(2025, 2, 3, 0),
                count: 1,
                value: 1.0,
            },
            DailyTotal {
                day: at(2025, 1, 3, 0),
                count: 2,
                value: 2.0,
            },
        ];
        let series = fold_series(days, GroupBy::Month);
        let buckets: Vec<_> = series.iter().map(|p| p.bucket).collect();
        assert_eq!(buckets, vec![at(2025, 1, 1, 0), at(2025, 2, 1, 0)]);
    }

    proptest! {
        #[test]
        fn shares_sum_to_one_over_partition(counts in proptest::collection::vec(0i64..10_000, 1..40)) {
            let mut metrics: Vec<EntityMetric> = counts.iter().map(|c| metric(*c)).collect();
            assign_shares(&mut metrics);
            let sum: f64 = metrics.iter().map(|m| m.share).sum();
            let total: i64 = counts.iter().sum();
            if total == 0 {
                prop_assert_eq!(sum, 0.0);
            } else {
                prop_assert!((sum - 1.0).abs() < 1e-9);
            }
        }

        #[test]
        fn truncated_shares_never_exceed_one(
            counts in proptest::collection::vec(0i64..10_000, 0..40),
            limit in 0usize..10,
        ) {
            let metrics: Vec<EntityMetric> = counts.iter().map(|c| metric(*c)).collect();
            let ranked = rank_entities(metrics, limit);
            let sum: f64 = ranked.iter().map(|m| m.share).sum();
            prop_assert!(ranked.len() <= limit);
            prop_assert!(sum <= 1.0 + 1e-9);
        }

        #[test]
        fn idle_hours_never_negative(
            start in 0i64..10_000_000,
            width in 0i64..10_000_000,
            last in proptest::option::of(-20_000_000i64..40_000_000),
        ) {
            let from = Utc.timestamp_opt(1_600_000_000 + start, 0).unwrap();
            let range = DateRange::new(from, from + Duration::seconds(width));
            let last = last.map(|offset| from + Duration::seconds(offset));
            prop_assert!(idle_hours(&range, last) >= 0.0);
        }
    }
}
