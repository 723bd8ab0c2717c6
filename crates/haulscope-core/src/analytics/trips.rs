//! Trip volume, leader boards and single-trip lookups

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::compute::{finite_or_zero, fold_series, rank_entities, DailyTotal};
use super::predicate::{push_eq, push_range, push_scope, push_trip_filters, OwnerColumns};
use super::{sql_limit, EntityRow, Relation, Source};
use crate::error::{Error, Result};
use crate::models::{
    AnalyticsFilter, EntityMetric, Ownership, Scope, SeriesPoint, TripAnalytics, TripDetails,
    TripDurationStats, TripEvent, TripEventDetails, TripVolumeStats, ViolationRecord,
};

#[derive(Debug, FromRow)]
struct DailyRow {
    day: DateTime<Utc>,
    count: i64,
    volume: f64,
}

#[derive(Debug, FromRow)]
struct StatsRow {
    avg_minutes: f64,
    p90_minutes: f64,
    p95_minutes: f64,
    avg_volume: f64,
    max_volume: f64,
    min_volume: f64,
}

#[derive(Debug, FromRow)]
struct DetailsRow {
    trip_id: Uuid,
    ticket_id: Option<Uuid>,
    ticket_name: Option<String>,
    driver_id: Option<Uuid>,
    driver_name: Option<String>,
    vehicle_id: Option<Uuid>,
    vehicle_plate: Option<String>,
    contractor_id: Option<Uuid>,
    contractor_name: Option<String>,
    created_by_org_id: Option<Uuid>,
    cleaning_area_id: Option<Uuid>,
    polygon_id: Option<Uuid>,
    status: String,
    entry_at: DateTime<Utc>,
    exit_at: Option<DateTime<Utc>>,
    detected_volume_entry: Option<f64>,
    detected_volume_exit: Option<f64>,
    entry_lpr_event_id: Option<Uuid>,
    exit_lpr_event_id: Option<Uuid>,
    entry_volume_event_id: Option<Uuid>,
    exit_volume_event_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    camera_id: Uuid,
    photo_url: Option<String>,
    detected_at: DateTime<Utc>,
}

/// Sensor event tables a trip links to
#[derive(Debug, Clone, Copy)]
enum EventTable {
    Lpr,
    Volume,
}

impl EventTable {
    fn relation(self) -> Relation {
        match self {
            EventTable::Lpr => Relation::LprEvents,
            EventTable::Volume => Relation::VolumeEvents,
        }
    }

    fn query(self) -> &'static str {
        match self {
            EventTable::Lpr => "SELECT id, camera_id, photo_url, detected_at FROM lpr_events WHERE id = $1",
            EventTable::Volume => {
                "SELECT id, camera_id, photo_url, detected_at FROM volume_events WHERE id = $1"
            }
        }
    }
}

/// Violations implied by a trip status; `OK` has none
pub fn violations_from_status(
    status: &str,
    entry_at: DateTime<Utc>,
    exit_at: Option<DateTime<Utc>>,
) -> Vec<ViolationRecord> {
    if status.is_empty() || status == "OK" {
        return Vec::new();
    }
    vec![ViolationRecord {
        kind: status.to_string(),
        source: "trip".to_string(),
        at: exit_at.unwrap_or(entry_at),
        note: None,
    }]
}

fn series_query(scope: &Scope, filter: &AnalyticsFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT mv.bucket AS day,
               COALESCE(SUM(mv.total_trips), 0)::BIGINT AS count,
               COALESCE(SUM(mv.total_volume_m3), 0)::DOUBLE PRECISION AS volume
        FROM mv_trip_daily mv
        WHERE TRUE"#,
    );
    push_range(&mut qb, "mv.bucket", &filter.range);
    push_eq(&mut qb, "mv.contractor_id", filter.contractor_id);
    push_eq(&mut qb, "mv.driver_id", filter.driver_id);
    push_eq(&mut qb, "mv.polygon_id", filter.polygon_id);
    push_scope(&mut qb, scope, OwnerColumns::Rollup);
    qb.push(" GROUP BY mv.bucket ORDER BY mv.bucket");
    qb
}

fn top_drivers_query(scope: &Scope, filter: &AnalyticsFilter, limit: usize) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT tr.driver_id AS id,
               COALESCE(d.full_name, 'Driver') AS name,
               COUNT(*)::BIGINT AS count,
               COALESCE(SUM(tr.detected_volume_entry), 0)::DOUBLE PRECISION AS volume
        FROM trips tr
        LEFT JOIN drivers d ON d.id = tr.driver_id
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        WHERE tr.driver_id IS NOT NULL"#,
    );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY tr.driver_id, d.full_name ORDER BY count DESC, id LIMIT ");
    qb.push_bind(sql_limit(limit));
    qb
}

fn top_contractors_query(scope: &Scope, filter: &AnalyticsFilter, limit: usize) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT t.contractor_id AS id,
               COALESCE(org.name, 'Contractor') AS name,
               COUNT(*)::BIGINT AS count,
               COALESCE(SUM(tr.detected_volume_entry), 0)::DOUBLE PRECISION AS volume
        FROM trips tr
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        LEFT JOIN organizations org ON org.id = t.contractor_id
        WHERE t.contractor_id IS NOT NULL"#,
    );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY t.contractor_id, org.name ORDER BY count DESC, id LIMIT ");
    qb.push_bind(sql_limit(limit));
    qb
}

fn stats_query(scope: &Scope, filter: &AnalyticsFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT COALESCE(AVG(minutes), 0)::DOUBLE PRECISION AS avg_minutes,
               COALESCE(percentile_disc(0.90) WITHIN GROUP (ORDER BY minutes), 0)::DOUBLE PRECISION AS p90_minutes,
               COALESCE(percentile_disc(0.95) WITHIN GROUP (ORDER BY minutes), 0)::DOUBLE PRECISION AS p95_minutes,
               COALESCE(AVG(volume), 0)::DOUBLE PRECISION AS avg_volume,
               COALESCE(MAX(volume), 0)::DOUBLE PRECISION AS max_volume,
               COALESCE(MIN(volume), 0)::DOUBLE PRECISION AS min_volume
        FROM (
            SELECT EXTRACT(EPOCH FROM (COALESCE(tr.exit_at, tr.entry_at) - tr.entry_at)) / 60 AS minutes,
                   tr.detected_volume_entry AS volume
            FROM trips tr
            LEFT JOIN tickets t ON t.id = tr.ticket_id
            WHERE TRUE"#,
    );
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(") trip_stats");
    qb
}

/// Names are left NULL when the lookup relations are missing
fn details_query(scope: &Scope, trip_id: Uuid, with_names: bool) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT tr.id AS trip_id,
               tr.ticket_id,
               t.name AS ticket_name,
               tr.driver_id,"#,
    );
    if with_names {
        qb.push(
            r#"
               d.full_name AS driver_name,
               tr.vehicle_id,
               v.plate_number AS vehicle_plate,
               t.contractor_id,
               org.name AS contractor_name,"#,
        );
    } else {
        qb.push(
            r#"
               NULL::TEXT AS driver_name,
               tr.vehicle_id,
               NULL::TEXT AS vehicle_plate,
               t.contractor_id,
               NULL::TEXT AS contractor_name,"#,
        );
    }
    qb.push(
        r#"
               t.created_by_org_id,
               t.cleaning_area_id,
               tr.polygon_id,
               tr.status,
               tr.entry_at,
               tr.exit_at,
               tr.detected_volume_entry::DOUBLE PRECISION AS detected_volume_entry,
               tr.detected_volume_exit::DOUBLE PRECISION AS detected_volume_exit,
               tr.entry_lpr_event_id,
               tr.exit_lpr_event_id,
               tr.entry_volume_event_id,
               tr.exit_volume_event_id
        FROM trips tr
        LEFT JOIN tickets t ON t.id = tr.ticket_id"#,
    );
    if with_names {
        qb.push(
            r#"
        LEFT JOIN drivers d ON d.id = tr.driver_id
        LEFT JOIN vehicles v ON v.id = tr.vehicle_id
        LEFT JOIN organizations org ON org.id = t.contractor_id"#,
        );
    }
    qb.push(" WHERE tr.id = ");
    qb.push_bind(trip_id);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" LIMIT 1");
    qb
}

/// Builds the trip report and resolves trip details
#[derive(Clone)]
pub struct TripAggregator {
    source: Source,
    top_limit: usize,
}

impl TripAggregator {
    /// Create an aggregator; leader boards keep `top_limit` entries
    pub fn new(source: Source, top_limit: usize) -> Self {
        Self { source, top_limit }
    }

    /// Series, leader boards and distribution stats for `filter`
    pub async fn run(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<TripAnalytics> {
        if !scope.sees_operational_data() {
            return Ok(TripAnalytics::default());
        }

        let ((series, volume_series), top_drivers, top_contractors, (duration_stats, volume_stats)) = tokio::try_join!(
            self.series(scope, filter),
            self.top_drivers(scope, filter),
            self.top_contractors(scope, filter),
            self.stats(scope, filter),
        )?;

        Ok(TripAnalytics {
            series,
            volume_series,
            top_drivers,
            top_contractors,
            duration_stats,
            volume_stats,
        })
    }

    /// Trip count and volume series from the daily rollup
    #[allow(clippy::cast_precision_loss)]
    async fn series(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<(Vec<SeriesPoint>, Vec<SeriesPoint>)> {
        if !self.source.ready(&[Relation::TripDaily]).await {
            return Ok((Vec::new(), Vec::new()));
        }

        let days = series_query(scope, filter)
            .build_query_as::<DailyRow>()
            .fetch_all(self.source.pool())
            .await?;

        let counts = fold_series(
            days.iter().map(|d| DailyTotal {
                day: d.day,
                count: d.count,
                value: d.count as f64,
            }),
            filter.group_by,
        );
        let volumes = fold_series(
            days.iter().map(|d| DailyTotal {
                day: d.day,
                count: d.count,
                value: d.volume,
            }),
            filter.group_by,
        );
        Ok((counts, volumes))
    }

    async fn top_drivers(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<EntityMetric>> {
        if !self
            .source
            .ready(&[Relation::Trips, Relation::Drivers, Relation::Tickets])
            .await
        {
            return Ok(Vec::new());
        }

        let rows = top_drivers_query(scope, filter, self.top_limit)
            .build_query_as::<EntityRow>()
            .fetch_all(self.source.pool())
            .await?;
        Ok(rank_entities(rows.into_iter().map(EntityMetric::from).collect(), self.top_limit))
    }

    async fn top_contractors(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<EntityMetric>> {
        if !self
            .source
            .ready(&[Relation::Trips, Relation::Tickets, Relation::Organizations])
            .await
        {
            return Ok(Vec::new());
        }

        let rows = top_contractors_query(scope, filter, self.top_limit)
            .build_query_as::<EntityRow>()
            .fetch_all(self.source.pool())
            .await?;
        Ok(rank_entities(rows.into_iter().map(EntityMetric::from).collect(), self.top_limit))
    }

    /// Duration percentiles are discrete; volumes ignore trips without a reading
    async fn stats(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<(TripDurationStats, TripVolumeStats)> {
        if !self.source.ready(&[Relation::Trips, Relation::Tickets]).await {
            return Ok(Default::default());
        }

        let row = stats_query(scope, filter)
            .build_query_as::<StatsRow>()
            .fetch_one(self.source.pool())
            .await?;

        Ok((
            TripDurationStats {
                avg_minutes: finite_or_zero(row.avg_minutes),
                p90_minutes: finite_or_zero(row.p90_minutes),
                p95_minutes: finite_or_zero(row.p95_minutes),
            },
            TripVolumeStats {
                avg_volume: finite_or_zero(row.avg_volume),
                max_volume: finite_or_zero(row.max_volume),
                min_volume: finite_or_zero(row.min_volume),
            },
        ))
    }

    /// Look a trip up within `scope`.
    ///
    /// A trip outside the scope is reported exactly like a missing one.
    pub async fn details(&self, scope: &Scope, trip_id: Uuid) -> Result<TripDetails> {
        let not_found = || Error::not_found("trip", trip_id.to_string());

        if !scope.sees_operational_data() || !self.source.ready(&[Relation::Trips, Relation::Tickets]).await {
            return Err(not_found());
        }
        let with_names = self
            .source
            .ready(&[Relation::Drivers, Relation::Vehicles, Relation::Organizations])
            .await;

        let row = details_query(scope, trip_id, with_names)
            .build_query_as::<DetailsRow>()
            .fetch_optional(self.source.pool())
            .await?
            .ok_or_else(not_found)?;

        let owner = Ownership {
            created_by_org: row.created_by_org_id,
            contractor: row.contractor_id,
        };
        if !scope.admits(&owner) {
            return Err(not_found());
        }

        let (entry_lpr, exit_lpr, entry_volume, exit_volume) = tokio::try_join!(
            self.event(EventTable::Lpr, row.entry_lpr_event_id),
            self.event(EventTable::Lpr, row.exit_lpr_event_id),
            self.event(EventTable::Volume, row.entry_volume_event_id),
            self.event(EventTable::Volume, row.exit_volume_event_id),
        )?;

        Ok(TripDetails {
            violations: violations_from_status(&row.status, row.entry_at, row.exit_at),
            trip_id: row.trip_id,
            ticket_id: row.ticket_id,
            ticket_name: row.ticket_name,
            driver_id: row.driver_id,
            driver_name: row.driver_name,
            vehicle_id: row.vehicle_id,
            vehicle_plate: row.vehicle_plate,
            contractor_id: row.contractor_id,
            contractor_name: row.contractor_name,
            cleaning_area_id: row.cleaning_area_id,
            polygon_id: row.polygon_id,
            status: row.status,
            entry_at: row.entry_at,
            exit_at: row.exit_at,
            detected_volume_entry: row.detected_volume_entry,
            detected_volume_exit: row.detected_volume_exit,
            events: TripEventDetails {
                entry_lpr,
                exit_lpr,
                entry_volume,
                exit_volume,
            },
        })
    }

    async fn event(&self, table: EventTable, id: Option<Uuid>) -> Result<Option<TripEvent>> {
        let Some(id) = id else {
            return Ok(None);
        };
        if !self.source.ready(&[table.relation()]).await {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, EventRow>(table.query())
            .bind(id)
            .fetch_optional(self.source.pool())
            .await?;

        Ok(row.map(|row| TripEvent {
            event_id: row.id,
            camera_id: row.camera_id,
            photo_url: row.photo_url,
            captured_at: row.detected_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateRange;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ok_trip_has_no_violations() {
        let entry = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        assert!(violations_from_status("OK", entry, None).is_empty());
        assert!(violations_from_status("", entry, None).is_empty());
    }

    #[test]
    fn test_violation_uses_exit_time_when_present() {
        let entry = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let exit = Utc.with_ymd_and_hms(2025, 1, 1, 8, 40, 0).unwrap();

        let violations = violations_from_status("NO_VOLUME_EVENT", entry, Some(exit));

        assert_eq!(
            violations,
            vec![ViolationRecord {
                kind: "NO_VOLUME_EVENT".to_string(),
                source: "trip".to_string(),
                at: exit,
                note: None,
            }]
        );
        assert_eq!(violations_from_status("CAMERA_ERROR", entry, None)[0].at, entry);
    }

    fn january() -> AnalyticsFilter {
        AnalyticsFilter::for_range(DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_trip_queries_filter_by_contractor() {
        let scope = Scope::Contractor {
            org_id: Uuid::from_u128(0xA),
        };
        let filter = january();
        let live = [
            top_drivers_query(&scope, &filter, 5),
            top_contractors_query(&scope, &filter, 5),
            stats_query(&scope, &filter),
        ];

        for qb in &live {
            assert!(qb.sql().contains(" AND t.contractor_id = $3"), "{}", qb.sql());
        }
        assert!(series_query(&scope, &filter)
            .sql()
            .contains(" AND mv.contractor_id = $3 GROUP BY mv.bucket"));
    }

    #[test]
    fn test_trip_lookup_scoped() {
        let scope = Scope::Contractor {
            org_id: Uuid::from_u128(0xA),
        };

        for with_names in [true, false] {
            let qb = details_query(&scope, Uuid::nil(), with_names);
            assert!(qb.sql().ends_with(" WHERE tr.id = $1 AND t.contractor_id = $2 LIMIT 1"));
        }
        assert!(details_query(&Scope::Technical, Uuid::nil(), true)
            .sql()
            .contains(" AND FALSE"));
    }
}
