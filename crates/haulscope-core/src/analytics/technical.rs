//! Camera network health.
//!
//! The technical report is always city-wide. [`camera_load`] is shared with
//! the dashboard, which restricts it to cameras that saw in-scope trips.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::compute::{ratio, share};
use super::predicate::{push_range, push_scope, OwnerColumns};
use super::{Relation, Source, CAMERA_ERROR_STATUSES};
use crate::error::Result;
use crate::models::{CameraLoadMetric, DateRange, PolygonLoadMetric, Scope, TechnicalAnalytics};

const CAMERA_LOAD_RELATIONS: [Relation; 5] = [
    Relation::Cameras,
    Relation::Polygons,
    Relation::Trips,
    Relation::LprEvents,
    Relation::VolumeEvents,
];

/// `relations` plus tickets when `scope` is narrowed through ticket ownership
pub(super) fn camera_relations(scope: &Scope, relations: &[Relation]) -> Vec<Relation> {
    let mut needed = relations.to_vec();
    match scope {
        Scope::City | Scope::Technical => {}
        Scope::Regional { .. } | Scope::Contractor { .. } => needed.push(Relation::Tickets),
    }
    needed
}

/// Append a `LEFT JOIN` of camera-side error trips per camera, aliased `alias`.
///
/// Regional and contractor scopes only count trips on tickets they own.
pub(super) fn push_error_counts(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: &Scope,
    range: &DateRange,
    alias: &'static str,
) {
    qb.push(" LEFT JOIN (SELECT tr.camera_id, COUNT(*) AS cnt FROM trips tr");
    let owned = match scope {
        Scope::City | Scope::Technical => false,
        Scope::Regional { .. } | Scope::Contractor { .. } => {
            qb.push(" JOIN tickets t ON t.id = tr.ticket_id");
            true
        }
    };
    qb.push(" WHERE tr.camera_id IS NOT NULL AND tr.status = ANY(");
    qb.push_bind(CAMERA_ERROR_STATUSES.map(String::from).to_vec());
    qb.push(")");
    push_range(qb, "tr.entry_at", range);
    if owned {
        push_scope(qb, scope, OwnerColumns::Tickets);
    }
    qb.push(" GROUP BY tr.camera_id) ")
        .push(alias)
        .push(" ON ")
        .push(alias)
        .push(".camera_id = c.id");
}

/// Restrict `cameras c` to cameras that recorded an in-scope trip in range
pub(super) fn push_camera_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, range: &DateRange) {
    match scope {
        Scope::City | Scope::Technical => {}
        Scope::Regional { .. } | Scope::Contractor { .. } => {
            qb.push(
                " AND c.id IN (SELECT DISTINCT tr.camera_id FROM trips tr
                   JOIN tickets t ON t.id = tr.ticket_id
                   WHERE tr.camera_id IS NOT NULL",
            );
            push_range(qb, "tr.entry_at", range);
            push_scope(qb, scope, OwnerColumns::Tickets);
            qb.push(")");
        }
    }
}

#[derive(Debug, FromRow)]
struct CameraLoadRow {
    camera_id: Uuid,
    camera_name: String,
    polygon_id: Option<Uuid>,
    polygon_name: Option<String>,
    lpr_events: i64,
    volume_events: i64,
    error_events: i64,
}

impl From<CameraLoadRow> for CameraLoadMetric {
    fn from(row: CameraLoadRow) -> Self {
        Self {
            camera_id: row.camera_id,
            camera_name: row.camera_name,
            polygon_id: row.polygon_id,
            polygon_name: row.polygon_name,
            lpr_events: row.lpr_events,
            volume_events: row.volume_events,
            error_events: row.error_events,
            error_rate: share(row.error_events, row.lpr_events + row.volume_events),
        }
    }
}

#[derive(Debug, FromRow)]
struct PolygonLoadRow {
    polygon_id: Uuid,
    polygon_name: String,
    trip_count: i64,
    volume_m3: f64,
    error_events: i64,
}

fn camera_load_query(scope: &Scope, range: &DateRange) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT c.id AS camera_id,
               COALESCE(c.name, 'Camera') AS camera_name,
               c.polygon_id AS polygon_id,
               p.name AS polygon_name,
               COALESCE(l.cnt, 0)::BIGINT AS lpr_events,
               COALESCE(v.cnt, 0)::BIGINT AS volume_events,
               COALESCE(e.cnt, 0)::BIGINT AS error_events
        FROM cameras c
        LEFT JOIN polygons p ON p.id = c.polygon_id
        LEFT JOIN (SELECT camera_id, COUNT(*) AS cnt FROM lpr_events WHERE TRUE"#,
    );
    push_range(&mut qb, "detected_at", range);
    qb.push(
        " GROUP BY camera_id) l ON l.camera_id = c.id
        LEFT JOIN (SELECT camera_id, COUNT(*) AS cnt FROM volume_events WHERE TRUE",
    );
    push_range(&mut qb, "detected_at", range);
    qb.push(" GROUP BY camera_id) v ON v.camera_id = c.id");
    push_error_counts(&mut qb, scope, range, "e");
    qb.push(" WHERE TRUE");
    push_camera_scope(&mut qb, scope, range);
    qb.push(" ORDER BY camera_name, c.id");
    qb
}

/// Event counts and camera-side error trips per camera.
///
/// City and technical scopes see every camera; regional and contractor
/// scopes see cameras that recorded at least one of their trips in range,
/// and only their own trips count towards `error_events`.
pub async fn camera_load(source: &Source, scope: &Scope, range: &DateRange) -> Result<Vec<CameraLoadMetric>> {
    if !source.ready(&camera_relations(scope, &CAMERA_LOAD_RELATIONS)).await {
        return Ok(Vec::new());
    }

    let rows = camera_load_query(scope, range)
        .build_query_as::<CameraLoadRow>()
        .fetch_all(source.pool())
        .await?;
    Ok(rows.into_iter().map(CameraLoadMetric::from).collect())
}

/// Builds the city-wide technical report
#[derive(Clone)]
pub struct TechnicalAggregator {
    source: Source,
}

impl TechnicalAggregator {
    /// Create an aggregator over `source`
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    /// Camera, polygon and event totals for `range`
    pub async fn run(&self, range: &DateRange) -> Result<TechnicalAnalytics> {
        if !self.source.ready(&[Relation::Cameras]).await {
            return Ok(TechnicalAnalytics::default());
        }

        let (cameras, polygons, last_event_at) = tokio::try_join!(
            camera_load(&self.source, &Scope::Technical, range),
            self.polygon_load(range),
            self.last_event(range),
        )?;

        Ok(summarize(cameras, polygons, last_event_at, range))
    }

    async fn polygon_load(&self, range: &DateRange) -> Result<Vec<PolygonLoadMetric>> {
        if !self.source.ready(&[Relation::Polygons, Relation::Trips]).await {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT p.id AS polygon_id,
                   COALESCE(p.name, 'Polygon') AS polygon_name,
                   COALESCE(d.trip_count, 0)::BIGINT AS trip_count,
                   COALESCE(d.volume_m3, 0)::DOUBLE PRECISION AS volume_m3,
                   COALESCE(d.errors, 0)::BIGINT AS error_events
            FROM polygons p
            LEFT JOIN (
                SELECT tr.polygon_id,
                       COUNT(*) AS trip_count,
                       SUM(tr.detected_volume_entry) AS volume_m3,
                       SUM(CASE WHEN tr.status <> 'OK' THEN 1 ELSE 0 END) AS errors
                FROM trips tr
                WHERE tr.polygon_id IS NOT NULL"#,
        );
        push_range(&mut qb, "tr.entry_at", range);
        qb.push(
            " GROUP BY tr.polygon_id
            ) d ON d.polygon_id = p.id
            ORDER BY trip_count DESC, p.id",
        );

        let rows = qb
            .build_query_as::<PolygonLoadRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| PolygonLoadMetric {
                polygon_id: row.polygon_id,
                polygon_name: row.polygon_name,
                trip_count: row.trip_count,
                volume_m3: row.volume_m3,
                error_events: row.error_events,
            })
            .collect())
    }

    async fn last_event(&self, range: &DateRange) -> Result<Option<DateTime<Utc>>> {
        if !self
            .source
            .ready(&[Relation::LprEvents, Relation::VolumeEvents])
            .await
        {
            return Ok(None);
        }

        let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT MAX(ts) FROM (
                SELECT detected_at AS ts FROM lpr_events WHERE detected_at >= $1 AND detected_at < $2
                UNION ALL
                SELECT detected_at AS ts FROM volume_events WHERE detected_at >= $1 AND detected_at < $2
            ) events
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(self.source.pool())
        .await?;

        Ok(last)
    }
}

/// Fold per-camera load into the network totals
#[allow(clippy::cast_precision_loss)]
fn summarize(
    cameras: Vec<CameraLoadMetric>,
    polygons: Vec<PolygonLoadMetric>,
    last_event_at: Option<DateTime<Utc>>,
    range: &DateRange,
) -> TechnicalAnalytics {
    let total_events: i64 = cameras.iter().map(|c| c.lpr_events + c.volume_events).sum();
    let error_events: i64 = cameras.iter().map(|c| c.error_events).sum();

    TechnicalAnalytics {
        error_rate: share(error_events, total_events),
        event_frequency: ratio(total_events as f64, range.hours()),
        cameras,
        polygons,
        last_event_at,
        total_events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::StaticAvailability;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn camera(lpr: i64, volume: i64, errors: i64) -> CameraLoadMetric {
        CameraLoadRow {
            camera_id: Uuid::new_v4(),
            camera_name: "Gate".to_string(),
            polygon_id: None,
            polygon_name: None,
            lpr_events: lpr,
            volume_events: volume,
            error_events: errors,
        }
        .into()
    }

    fn day() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_camera_error_rate() {
        assert_eq!(camera(30, 10, 4).error_rate, 0.1);
        assert_eq!(camera(0, 0, 3).error_rate, 0.0);
    }

    #[test]
    fn test_summarize_totals() {
        let report = summarize(vec![camera(30, 18, 6), camera(0, 0, 0)], vec![], None, &day());

        assert_eq!(report.total_events, 48);
        assert_eq!(report.error_rate, 0.125);
        assert_eq!(report.event_frequency, 2.0);
        assert_eq!(report.cameras.len(), 2);
    }

    #[test]
    fn test_summarize_empty_range() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let report = summarize(
            vec![camera(5, 5, 0)],
            vec![],
            None,
            &DateRange::new(instant, instant),
        );
        assert_eq!(report.event_frequency, 0.0);
        assert_eq!(report.error_rate, 0.0);
    }

    #[test]
    fn test_contractor_camera_errors_count_only_own_trips() {
        let qb = camera_load_query(&Scope::Contractor { org_id: Uuid::from_u128(0xA) }, &day());
        let sql = qb.sql();

        assert!(sql.contains(
            " FROM trips tr JOIN tickets t ON t.id = tr.ticket_id \
             WHERE tr.camera_id IS NOT NULL AND tr.status = ANY($5) \
             AND tr.entry_at >= $6 AND tr.entry_at < $7 AND t.contractor_id = $8 \
             GROUP BY tr.camera_id) e ON e.camera_id = c.id"
        ));
        assert!(sql.contains("c.id IN (SELECT DISTINCT tr.camera_id"));
        assert!(sql.ends_with(" AND t.contractor_id = $11) ORDER BY camera_name, c.id"));
    }

    #[test]
    fn test_regional_camera_errors_include_children() {
        let scope = Scope::Regional {
            org_id: Uuid::from_u128(0xB),
            contractors: vec![Uuid::from_u128(1)],
        };
        let qb = camera_load_query(&scope, &day());

        assert!(qb.sql().contains(
            " AND (t.created_by_org_id = $8 OR t.contractor_id = ANY($9)) GROUP BY tr.camera_id) e"
        ));
    }

    #[test]
    fn test_network_wide_camera_load() {
        for scope in [Scope::City, Scope::Technical] {
            let qb = camera_load_query(&scope, &day());
            assert!(!qb.sql().contains("tickets"), "{}", scope.as_str());
            assert!(!qb.sql().contains("FALSE"), "{}", scope.as_str());
        }
    }

    #[test]
    fn test_scoped_cameras_need_tickets() {
        let base = [Relation::Cameras, Relation::Trips];

        assert_eq!(camera_relations(&Scope::Technical, &base), base.to_vec());
        assert_eq!(camera_relations(&Scope::City, &base), base.to_vec());
        assert_eq!(
            camera_relations(&Scope::Contractor { org_id: Uuid::from_u128(0xA) }, &base),
            vec![Relation::Cameras, Relation::Trips, Relation::Tickets]
        );
    }

    #[tokio::test]
    async fn test_scoped_camera_load_empty_without_tickets() {
        let availability = StaticAvailability::with(CAMERA_LOAD_RELATIONS).shared();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://haulscope@127.0.0.1:1/haulscope")
            .unwrap();
        let source = Source::new(pool, availability);

        let cameras = camera_load(&source, &Scope::Contractor { org_id: Uuid::new_v4() }, &day())
            .await
            .unwrap();

        assert!(cameras.is_empty());
    }
}
