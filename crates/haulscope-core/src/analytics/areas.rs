//! Cleaning area summaries from the daily area rollup

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::compute::{average_interval_hours, finite_or_zero, idle_hours};
use super::predicate::{push_eq, push_range, push_scope, OwnerColumns};
use super::{Relation, Source};
use crate::error::Result;
use crate::models::{AnalyticsFilter, CleaningAreaAnalytics, DateRange, Scope};

#[derive(Debug, FromRow)]
struct AreaRow {
    cleaning_area_id: Uuid,
    name: Option<String>,
    description: Option<String>,
    trip_count: i64,
    volume_m3: f64,
    violation_count: i64,
    active_drivers: i64,
    active_vehicles: i64,
    first_entry: Option<DateTime<Utc>>,
    last_exit: Option<DateTime<Utc>>,
    geometry: Option<String>,
}

impl AreaRow {
    fn into_analytics(self, range: &DateRange) -> CleaningAreaAnalytics {
        CleaningAreaAnalytics {
            cleaning_area_id: self.cleaning_area_id,
            name: self
                .name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Cleaning area".to_string()),
            description: self.description,
            trip_count: self.trip_count,
            volume_m3: finite_or_zero(self.volume_m3),
            violation_count: self.violation_count,
            active_drivers: self.active_drivers,
            active_vehicles: self.active_vehicles,
            avg_interval_hours: average_interval_hours(self.first_entry, self.last_exit, self.trip_count),
            idle_hours: idle_hours(range, self.last_exit),
            last_trip_at: self.last_exit,
            geometry_geojson: self.geometry,
        }
    }
}

fn area_query(scope: &Scope, filter: &AnalyticsFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT mv.cleaning_area_id,
               ca.name,
               ca.description,
               COALESCE(SUM(mv.total_trips), 0)::BIGINT AS trip_count,
               COALESCE(SUM(mv.total_volume_m3), 0)::DOUBLE PRECISION AS volume_m3,
               COALESCE(SUM(mv.violation_count), 0)::BIGINT AS violation_count,
               COALESCE(SUM(mv.active_drivers), 0)::BIGINT AS active_drivers,
               COALESCE(SUM(mv.active_vehicles), 0)::BIGINT AS active_vehicles,
               MIN(mv.first_entry_at) AS first_entry,
               MAX(mv.last_exit_at) AS last_exit,
               ST_AsGeoJSON(ca.geometry)::TEXT AS geometry
        FROM mv_cleaning_area_daily mv
        LEFT JOIN cleaning_areas ca ON ca.id = mv.cleaning_area_id
        WHERE TRUE"#,
    );
    push_range(&mut qb, "mv.bucket", &filter.range);
    push_eq(&mut qb, "mv.contractor_id", filter.contractor_id);
    push_scope(&mut qb, scope, OwnerColumns::Rollup);
    qb.push(
        " GROUP BY mv.cleaning_area_id, ca.name, ca.description, ca.geometry
          ORDER BY trip_count DESC, mv.cleaning_area_id",
    );
    qb
}

/// Builds cleaning area summaries
#[derive(Clone)]
pub struct AreaAggregator {
    source: Source,
}

impl AreaAggregator {
    /// Create an aggregator over `source`
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    /// One summary per area with rollup rows in range
    pub async fn run(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<CleaningAreaAnalytics>> {
        if !scope.sees_operational_data()
            || !self
                .source
                .ready(&[Relation::CleaningAreaDaily, Relation::CleaningAreas])
                .await
        {
            return Ok(Vec::new());
        }

        let rows = area_query(scope, filter)
            .build_query_as::<AreaRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_analytics(&filter.range))
            .collect())
    }
}
