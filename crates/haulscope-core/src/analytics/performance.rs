//! Contractor, driver and vehicle performance tables

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::compute::{finite_or_zero, idle_hours};
use super::predicate::{push_range, push_scope, push_trip_filters, OwnerColumns};
use super::{sql_limit, Relation, Source};
use crate::error::Result;
use crate::models::{
    AnalyticsFilter, ContractorPerformance, DriverPerformance, PerformanceAnalytics, Scope,
    VehiclePerformance,
};

/// `non-OK trips / trips`, NULL-safe
pub(super) const VIOLATION_RATE: &str =
    "COALESCE(SUM(CASE WHEN tr.status <> 'OK' THEN 1 ELSE 0 END)::DOUBLE PRECISION / NULLIF(COUNT(*), 0), 0)";

/// Mean trip duration in minutes; open trips count as zero
pub(super) const AVG_DURATION_MINUTES: &str =
    "COALESCE(AVG(EXTRACT(EPOCH FROM (COALESCE(tr.exit_at, tr.entry_at) - tr.entry_at)) / 60), 0)::DOUBLE PRECISION";

/// Mean detected volume over body volume, vehicles with a body only
pub(super) const AVG_FILL_RATE: &str =
    "COALESCE(AVG(CASE WHEN v.body_volume_m3 > 0 THEN tr.detected_volume_entry / v.body_volume_m3 END), 0)::DOUBLE PRECISION";

#[derive(Debug, FromRow)]
struct ContractorRow {
    id: Uuid,
    name: String,
    trip_count: i64,
    avg_volume: f64,
    violation_rate: f64,
    active_drivers: i64,
}

#[derive(Debug, FromRow)]
struct DriverRow {
    id: Uuid,
    name: String,
    trip_count: i64,
    avg_volume: f64,
    violation_rate: f64,
    avg_duration: f64,
}

#[derive(Debug, FromRow)]
struct VehicleRow {
    id: Uuid,
    plate_number: String,
    trip_count: i64,
    avg_fill_rate: f64,
    violation_rate: f64,
    last_activity: Option<DateTime<Utc>>,
}

fn contractors_query(scope: &Scope, filter: &AnalyticsFilter, limit: usize) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT t.contractor_id AS id,
               COALESCE(org.name, 'Contractor') AS name,
               COUNT(*)::BIGINT AS trip_count,
               COALESCE(AVG(tr.detected_volume_entry), 0)::DOUBLE PRECISION AS avg_volume,
               "#,
    );
    qb.push(VIOLATION_RATE).push(
        r#" AS violation_rate,
               COUNT(DISTINCT tr.driver_id)::BIGINT AS active_drivers
        FROM trips tr
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        LEFT JOIN organizations org ON org.id = t.contractor_id
        WHERE t.contractor_id IS NOT NULL"#,
    );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY t.contractor_id, org.name ORDER BY trip_count DESC, id LIMIT ");
    qb.push_bind(sql_limit(limit));
    qb
}

fn drivers_query(scope: &Scope, filter: &AnalyticsFilter, limit: usize) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT tr.driver_id AS id,
               COALESCE(d.full_name, 'Driver') AS name,
               COUNT(*)::BIGINT AS trip_count,
               COALESCE(AVG(tr.detected_volume_entry), 0)::DOUBLE PRECISION AS avg_volume,
               "#,
    );
    qb.push(VIOLATION_RATE)
        .push(" AS violation_rate, ")
        .push(AVG_DURATION_MINUTES)
        .push(
            r#" AS avg_duration
        FROM trips tr
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        LEFT JOIN drivers d ON d.id = tr.driver_id
        WHERE tr.driver_id IS NOT NULL"#,
        );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY tr.driver_id, d.full_name ORDER BY trip_count DESC, id LIMIT ");
    qb.push_bind(sql_limit(limit));
    qb
}

fn vehicles_query(scope: &Scope, filter: &AnalyticsFilter, limit: usize) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT tr.vehicle_id AS id,
               COALESCE(v.plate_number, 'Vehicle') AS plate_number,
               COUNT(*)::BIGINT AS trip_count,
               "#,
    );
    qb.push(AVG_FILL_RATE)
        .push(" AS avg_fill_rate, ")
        .push(VIOLATION_RATE)
        .push(
            r#" AS violation_rate,
               MAX(COALESCE(tr.exit_at, tr.entry_at)) AS last_activity
        FROM trips tr
        LEFT JOIN vehicles v ON v.id = tr.vehicle_id
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        WHERE tr.vehicle_id IS NOT NULL"#,
        );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY tr.vehicle_id, v.plate_number ORDER BY trip_count DESC, id LIMIT ");
    qb.push_bind(sql_limit(limit));
    qb
}

/// Builds the ranked performance tables
#[derive(Clone)]
pub struct PerformanceAggregator {
    source: Source,
    limit: usize,
}

impl PerformanceAggregator {
    /// Create an aggregator; each table keeps `limit` rows
    pub fn new(source: Source, limit: usize) -> Self {
        Self { source, limit }
    }

    /// All three tables for `filter`
    pub async fn run(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<PerformanceAnalytics> {
        if !scope.sees_operational_data() {
            return Ok(PerformanceAnalytics::default());
        }

        let (contractors, drivers, vehicles) = tokio::try_join!(
            self.contractors(scope, filter),
            self.drivers(scope, filter),
            self.vehicles(scope, filter),
        )?;

        Ok(PerformanceAnalytics {
            contractors,
            drivers,
            vehicles,
        })
    }

    async fn contractors(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<ContractorPerformance>> {
        if !self
            .source
            .ready(&[Relation::Trips, Relation::Tickets, Relation::Organizations])
            .await
        {
            return Ok(Vec::new());
        }

        let rows = contractors_query(scope, filter, self.limit)
            .build_query_as::<ContractorRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ContractorPerformance {
                contractor_id: row.id,
                contractor_name: row.name,
                trip_count: row.trip_count,
                avg_volume: finite_or_zero(row.avg_volume),
                violation_rate: finite_or_zero(row.violation_rate),
                active_drivers: row.active_drivers,
            })
            .collect())
    }

    async fn drivers(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<DriverPerformance>> {
        if !self
            .source
            .ready(&[Relation::Trips, Relation::Tickets, Relation::Drivers])
            .await
        {
            return Ok(Vec::new());
        }

        let rows = drivers_query(scope, filter, self.limit)
            .build_query_as::<DriverRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| DriverPerformance {
                driver_id: row.id,
                driver_name: row.name,
                trip_count: row.trip_count,
                avg_volume: finite_or_zero(row.avg_volume),
                violation_rate: finite_or_zero(row.violation_rate),
                avg_duration: finite_or_zero(row.avg_duration),
            })
            .collect())
    }

    async fn vehicles(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<VehiclePerformance>> {
        if !self
            .source
            .ready(&[Relation::Trips, Relation::Tickets, Relation::Vehicles])
            .await
        {
            return Ok(Vec::new());
        }

        let rows = vehicles_query(scope, filter, self.limit)
            .build_query_as::<VehicleRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| VehiclePerformance {
                vehicle_id: row.id,
                plate_number: row.plate_number,
                trip_count: row.trip_count,
                avg_fill_rate: finite_or_zero(row.avg_fill_rate),
                violation_rate: finite_or_zero(row.violation_rate),
                idle_hours: idle_hours(&filter.range, row.last_activity),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateRange;
    use chrono::TimeZone;

    fn january() -> AnalyticsFilter {
        AnalyticsFilter::for_range(DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_performance_tables_filter_by_contractor() {
        let scope = Scope::Contractor {
            org_id: Uuid::from_u128(0xA),
        };
        let filter = january();
        let tables = [
            contractors_query(&scope, &filter, 10),
            drivers_query(&scope, &filter, 10),
            vehicles_query(&scope, &filter, 10),
        ];

        for qb in &tables {
            assert!(qb.sql().contains(" AND t.contractor_id = $3 GROUP BY"), "{}", qb.sql());
            assert!(qb.sql().ends_with("LIMIT $4"));
        }
    }

    #[test]
    fn test_explicit_contractor_filter_still_scoped() {
        let me = Uuid::from_u128(0xA);
        let mut filter = january();
        filter.contractor_id = Some(Uuid::from_u128(0xB));

        let qb = contractors_query(&Scope::Contractor { org_id: me }, &filter, 10);

        assert!(qb
            .sql()
            .contains(" AND t.contractor_id = $3 AND t.contractor_id = $4 GROUP BY"));
    }
}
