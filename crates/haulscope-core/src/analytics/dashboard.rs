//! Landing dashboard assembled from independent sub-queries

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::compute::{assign_heat, assign_shares};
use super::contracts::contract_progress;
use super::predicate::{push_range, push_scope, OwnerColumns};
use super::technical::{camera_load, camera_relations, push_camera_scope, push_error_counts};
use super::{EntityRow, Relation, Source};
use crate::error::Result;
use crate::models::{
    CleaningAreaActivity, DashboardContractors, DashboardMetrics, DashboardStats, DateRange,
    EntityMetric, MapAreaState, MapCameraState, MapPolygonState, MapSummary, Scope,
};

#[derive(Debug, Default, FromRow)]
struct TripCountsRow {
    active_trips: i64,
    completed_trips: i64,
    violations: i64,
}

#[derive(Debug, FromRow)]
struct AreaActivityRow {
    cleaning_area_id: Uuid,
    trips: i64,
    active_trips: i64,
    has_violations: bool,
}

#[derive(Debug, FromRow)]
struct IdleContractorRow {
    id: Uuid,
    name: String,
}

#[derive(Debug, FromRow)]
struct PolygonStateRow {
    id: Uuid,
    name: String,
    trip_count: i64,
    volume_m3: f64,
}

#[derive(Debug, FromRow)]
struct CameraStateRow {
    id: Uuid,
    name: String,
    events: i64,
    error_events: i64,
}

/// Open trips ignore the range; completed trips and violations respect it
fn trip_counts_query(scope: &Scope, range: &DateRange) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT COALESCE(SUM(CASE WHEN tr.exit_at IS NULL THEN 1 ELSE 0 END), 0)::BIGINT AS active_trips,
                COALESCE(SUM(CASE WHEN tr.exit_at IS NOT NULL",
    );
    push_range(&mut qb, "tr.entry_at", range);
    qb.push(
        " THEN 1 ELSE 0 END), 0)::BIGINT AS completed_trips,
                COALESCE(SUM(CASE WHEN tr.status <> 'OK'",
    );
    push_range(&mut qb, "tr.entry_at", range);
    qb.push(
        " THEN 1 ELSE 0 END), 0)::BIGINT AS violations
         FROM trips tr
         LEFT JOIN tickets t ON t.id = tr.ticket_id
         WHERE TRUE",
    );
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb
}

fn tickets_in_progress_query(scope: &Scope) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*)::BIGINT FROM tickets t WHERE t.status = 'IN_PROGRESS'",
    );
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb
}

fn area_activity_query(scope: &Scope, range: &DateRange) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT t.cleaning_area_id,
               COUNT(*)::BIGINT AS trips,
               COALESCE(SUM(CASE WHEN tr.exit_at IS NULL THEN 1 ELSE 0 END), 0)::BIGINT AS active_trips,
               COALESCE(BOOL_OR(tr.status <> 'OK'), FALSE) AS has_violations
        FROM trips tr
        JOIN tickets t ON t.id = tr.ticket_id
        WHERE t.cleaning_area_id IS NOT NULL"#,
    );
    push_range(&mut qb, "tr.entry_at", range);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY t.cleaning_area_id ORDER BY trips DESC, t.cleaning_area_id");
    qb
}

fn active_contractors_query(scope: &Scope, range: &DateRange) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT t.contractor_id AS id,
               COALESCE(org.name, 'Unknown') AS name,
               COUNT(*)::BIGINT AS count,
               COALESCE(SUM(tr.detected_volume_entry), 0)::DOUBLE PRECISION AS volume
        FROM trips tr
        JOIN tickets t ON t.id = tr.ticket_id
        LEFT JOIN organizations org ON org.id = t.contractor_id
        WHERE t.contractor_id IS NOT NULL"#,
    );
    push_range(&mut qb, "tr.entry_at", range);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY t.contractor_id, org.name ORDER BY count DESC, id");
    qb
}

/// Active contractors without trips, optionally limited to children of `parent`
fn idle_contractors_query(active: Vec<Uuid>, parent: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT org.id, org.name FROM organizations org
         WHERE org.type = 'CONTRACTOR' AND org.is_active AND NOT (org.id = ANY(",
    );
    qb.push_bind(active);
    qb.push("))");
    if let Some(parent) = parent {
        qb.push(" AND org.parent_org_id = ");
        qb.push_bind(parent);
    }
    qb.push(" ORDER BY org.name, org.id");
    qb
}

fn map_polygons_query(scope: &Scope, range: &DateRange) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT tr.polygon_id AS id,
               COALESCE(p.name, 'Polygon') AS name,
               COUNT(*)::BIGINT AS trip_count,
               COALESCE(SUM(tr.detected_volume_entry), 0)::DOUBLE PRECISION AS volume_m3
        FROM trips tr
        LEFT JOIN polygons p ON p.id = tr.polygon_id
        LEFT JOIN tickets t ON t.id = tr.ticket_id
        WHERE tr.polygon_id IS NOT NULL"#,
    );
    push_range(&mut qb, "tr.entry_at", range);
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY tr.polygon_id, p.name ORDER BY trip_count DESC, id");
    qb
}

fn map_cameras_query(scope: &Scope, range: &DateRange) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT c.id,
               COALESCE(c.name, 'Camera') AS name,
               COALESCE(ev.cnt, 0)::BIGINT AS events,
               COALESCE(er.cnt, 0)::BIGINT AS error_events
        FROM cameras c
        LEFT JOIN (SELECT camera_id, COUNT(*) AS cnt FROM lpr_events WHERE TRUE"#,
    );
    push_range(&mut qb, "detected_at", range);
    qb.push(" GROUP BY camera_id) ev ON ev.camera_id = c.id");
    push_error_counts(&mut qb, scope, range, "er");
    qb.push(" WHERE TRUE");
    push_camera_scope(&mut qb, scope, range);
    qb.push(" ORDER BY name, c.id");
    qb
}

/// Builds the dashboard
#[derive(Clone)]
pub struct DashboardAggregator {
    source: Source,
}

impl DashboardAggregator {
    /// Create an aggregator over `source`
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    /// Every dashboard section for `range`; contract status is evaluated at `now`.
    ///
    /// The technical scope only gets the city-wide camera section.
    pub async fn run(&self, scope: &Scope, range: &DateRange, now: DateTime<Utc>) -> Result<DashboardMetrics> {
        if !scope.sees_operational_data() {
            let mut metrics = DashboardMetrics::empty(*range);
            metrics.cameras = camera_load(&self.source, scope, range).await?;
            return Ok(metrics);
        }

        let (stats, areas, contractors, cameras, contracts, polygons, map_cameras) = tokio::try_join!(
            self.stats(scope, range),
            self.area_activity(scope, range),
            self.contractors(scope, range),
            camera_load(&self.source, scope, range),
            contract_progress(&self.source, scope, now),
            self.map_polygons(scope, range),
            self.map_cameras(scope, range),
        )?;

        let map = MapSummary {
            areas: areas.iter().map(MapAreaState::from).collect(),
            polygons,
            cameras: map_cameras,
        };

        Ok(DashboardMetrics {
            stats,
            areas,
            contractors,
            cameras,
            contracts,
            map,
            generated_for: *range,
        })
    }

    async fn stats(&self, scope: &Scope, range: &DateRange) -> Result<DashboardStats> {
        let (trips, tickets_in_progress) =
            tokio::try_join!(self.trip_counts(scope, range), self.tickets_in_progress(scope))?;

        Ok(DashboardStats {
            active_trips: trips.active_trips,
            completed_trips: trips.completed_trips,
            tickets_in_progress,
            violations: trips.violations,
        })
    }

    async fn trip_counts(&self, scope: &Scope, range: &DateRange) -> Result<TripCountsRow> {
        if !self.source.ready(&[Relation::Trips, Relation::Tickets]).await {
            return Ok(TripCountsRow::default());
        }

        Ok(trip_counts_query(scope, range)
            .build_query_as::<TripCountsRow>()
            .fetch_one(self.source.pool())
            .await?)
    }

    async fn tickets_in_progress(&self, scope: &Scope) -> Result<i64> {
        if !self.source.ready(&[Relation::Tickets]).await {
            return Ok(0);
        }

        Ok(tickets_in_progress_query(scope)
            .build_query_scalar::<i64>()
            .fetch_one(self.source.pool())
            .await?)
    }

    async fn area_activity(&self, scope: &Scope, range: &DateRange) -> Result<Vec<CleaningAreaActivity>> {
        if !self.source.ready(&[Relation::Trips, Relation::Tickets]).await {
            return Ok(Vec::new());
        }

        let rows = area_activity_query(scope, range)
            .build_query_as::<AreaActivityRow>()
            .fetch_all(self.source.pool())
            .await?;

        let mut areas: Vec<CleaningAreaActivity> = rows
            .into_iter()
            .map(|row| CleaningAreaActivity {
                cleaning_area_id: row.cleaning_area_id,
                trips: row.trips,
                active_trips: row.active_trips,
                has_violations: row.has_violations,
                trip_heat: 0.0,
            })
            .collect();
        assign_heat(&mut areas);
        Ok(areas)
    }

    async fn contractors(&self, scope: &Scope, range: &DateRange) -> Result<DashboardContractors> {
        if !self
            .source
            .ready(&[Relation::Trips, Relation::Tickets, Relation::Organizations])
            .await
        {
            return Ok(DashboardContractors::default());
        }

        let rows = active_contractors_query(scope, range)
            .build_query_as::<EntityRow>()
            .fetch_all(self.source.pool())
            .await?;
        let mut active: Vec<EntityMetric> = rows.into_iter().map(EntityMetric::from).collect();
        assign_shares(&mut active);

        let parent = match scope {
            Scope::City => None,
            Scope::Regional { org_id, .. } => Some(*org_id),
            Scope::Contractor { .. } | Scope::Technical => {
                return Ok(DashboardContractors {
                    active,
                    idle: Vec::new(),
                })
            }
        };

        let idle = idle_contractors_query(active.iter().map(|m| m.id).collect(), parent)
            .build_query_as::<IdleContractorRow>()
            .fetch_all(self.source.pool())
            .await?
            .into_iter()
            .map(|row| EntityMetric::idle(row.id, row.name))
            .collect();

        Ok(DashboardContractors { active, idle })
    }

    async fn map_polygons(&self, scope: &Scope, range: &DateRange) -> Result<Vec<MapPolygonState>> {
        if !self
            .source
            .ready(&[Relation::Trips, Relation::Tickets, Relation::Polygons])
            .await
        {
            return Ok(Vec::new());
        }

        let rows = map_polygons_query(scope, range)
            .build_query_as::<PolygonStateRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| MapPolygonState {
                id: row.id,
                name: row.name,
                trip_count: row.trip_count,
                volume_m3: row.volume_m3,
            })
            .collect())
    }

    async fn map_cameras(&self, scope: &Scope, range: &DateRange) -> Result<Vec<MapCameraState>> {
        let relations = camera_relations(scope, &[Relation::Cameras, Relation::LprEvents, Relation::Trips]);
        if !self.source.ready(&relations).await {
            return Ok(Vec::new());
        }

        let rows = map_cameras_query(scope, range)
            .build_query_as::<CameraStateRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| MapCameraState {
                id: row.id,
                name: row.name,
                events: row.events,
                error_events: row.error_events,
            })
            .collect())
    }
}
