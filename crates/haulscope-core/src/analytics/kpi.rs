//! Per-driver and per-vehicle KPI tables

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::compute::{finite_or_zero, idle_hours};
use super::performance::{AVG_DURATION_MINUTES, AVG_FILL_RATE, VIOLATION_RATE};
use super::predicate::{push_range, push_scope, push_trip_filters, OwnerColumns};
use super::{Relation, Source};
use crate::error::Result;
use crate::models::{AnalyticsFilter, DriverKpi, Scope, VehicleKpi};

#[derive(Debug, FromRow)]
struct DriverKpiRow {
    id: Uuid,
    name: String,
    contractor_id: Option<Uuid>,
    contractor_name: Option<String>,
    trip_count: i64,
    avg_volume: f64,
    violation_rate: f64,
    avg_duration: f64,
    last_trip_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct VehicleKpiRow {
    id: Uuid,
    plate_number: String,
    contractor_id: Option<Uuid>,
    contractor_name: Option<String>,
    trip_count: i64,
    avg_fill_rate: f64,
    violation_rate: f64,
    last_trip_at: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
}

fn driver_kpi_query(scope: &Scope, filter: &AnalyticsFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT tr.driver_id AS id,
               COALESCE(d.full_name, 'Driver') AS name,
               t.contractor_id,
               org.name AS contractor_name,
               COUNT(*)::BIGINT AS trip_count,
               COALESCE(AVG(tr.detected_volume_entry), 0)::DOUBLE PRECISION AS avg_volume,
               "#,
    );
    qb.push(VIOLATION_RATE)
        .push(" AS violation_rate, ")
        .push(AVG_DURATION_MINUTES)
        .push(
            r#" AS avg_duration,
               MAX(tr.entry_at) AS last_trip_at
        FROM trips tr
        LEFT JOIN drivers d ON d.id = tr.driver_id
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        LEFT JOIN organizations org ON org.id = t.contractor_id
        WHERE tr.driver_id IS NOT NULL"#,
        );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(
        " GROUP BY tr.driver_id, d.full_name, t.contractor_id, org.name
          ORDER BY trip_count DESC, id",
    );
    qb
}

fn vehicle_kpi_query(scope: &Scope, filter: &AnalyticsFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT tr.vehicle_id AS id,
               COALESCE(v.plate_number, 'Vehicle') AS plate_number,
               t.contractor_id,
               org.name AS contractor_name,
               COUNT(*)::BIGINT AS trip_count,
               "#,
    );
    qb.push(AVG_FILL_RATE)
        .push(" AS avg_fill_rate, ")
        .push(VIOLATION_RATE)
        .push(
            r#" AS violation_rate,
               MAX(tr.entry_at) AS last_trip_at,
               MAX(COALESCE(tr.exit_at, tr.entry_at)) AS last_activity
        FROM trips tr
        LEFT JOIN vehicles v ON v.id = tr.vehicle_id
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        LEFT JOIN organizations org ON org.id = t.contractor_id
        WHERE tr.vehicle_id IS NOT NULL"#,
        );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(
        " GROUP BY tr.vehicle_id, v.plate_number, t.contractor_id, org.name
          ORDER BY trip_count DESC, id",
    );
    qb
}

/// Builds the driver and vehicle KPI tables.
///
/// Rows are grouped per contractor as well, so a driver who worked for two
/// contractors in the range appears twice.
#[derive(Clone)]
pub struct KpiAggregator {
    source: Source,
}

impl KpiAggregator {
    /// Create an aggregator over `source`
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    /// Driver KPIs, honoring the contractor and driver filters
    pub async fn drivers(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<DriverKpi>> {
        if !scope.sees_operational_data()
            || !self
                .source
                .ready(&[
                    Relation::Trips,
                    Relation::Drivers,
                    Relation::Tickets,
                    Relation::Organizations,
                ])
                .await
        {
            return Ok(Vec::new());
        }

        let rows = driver_kpi_query(scope, filter)
            .build_query_as::<DriverKpiRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| DriverKpi {
                driver_id: row.id,
                driver_name: row.name,
                contractor_id: row.contractor_id,
                contractor_name: row.contractor_name,
                trip_count: row.trip_count,
                avg_volume: finite_or_zero(row.avg_volume),
                violation_rate: finite_or_zero(row.violation_rate),
                avg_duration: finite_or_zero(row.avg_duration),
                last_trip_at: row.last_trip_at,
            })
            .collect())
    }

    /// Vehicle KPIs; idle hours run from the last exit to the range end
    pub async fn vehicles(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<VehicleKpi>> {
        if !scope.sees_operational_data()
            || !self
                .source
                .ready(&[
                    Relation::Trips,
                    Relation::Vehicles,
                    Relation::Tickets,
                    Relation::Organizations,
                ])
                .await
        {
            return Ok(Vec::new());
        }

        let rows = vehicle_kpi_query(scope, filter)
            .build_query_as::<VehicleKpiRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| VehicleKpi {
                vehicle_id: row.id,
                plate_number: row.plate_number,
                contractor_id: row.contractor_id,
                contractor_name: row.contractor_name,
                trip_count: row.trip_count,
                avg_fill_rate: finite_or_zero(row.avg_fill_rate),
                violation_rate: finite_or_zero(row.violation_rate),
                idle_hours: idle_hours(&filter.range, row.last_activity),
                last_trip_at: row.last_trip_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateRange;
    use chrono::TimeZone;

    #[test]
    fn test_kpi_tables_filter_by_contractor() {
        let scope = Scope::Contractor {
            org_id: Uuid::from_u128(0xA),
        };
        let filter = AnalyticsFilter::for_range(DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        ));

        for qb in [driver_kpi_query(&scope, &filter), vehicle_kpi_query(&scope, &filter)] {
            assert!(qb.sql().contains(" AND t.contractor_id = $3 GROUP BY"), "{}", qb.sql());
        }
    }

    #[test]
    fn test_regional_kpi_includes_child_contractors() {
        let scope = Scope::Regional {
            org_id: Uuid::from_u128(0xB),
            contractors: vec![Uuid::from_u128(1), Uuid::from_u128(2)],
        };
        let mut filter = AnalyticsFilter::for_range(DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        ));
        filter.driver_id = Some(Uuid::from_u128(7));

        let qb = driver_kpi_query(&scope, &filter);

        assert!(qb.sql().contains(
            " AND tr.driver_id = $3 AND (t.created_by_org_id = $4 OR t.contractor_id = ANY($5))"
        ));
    }
}
