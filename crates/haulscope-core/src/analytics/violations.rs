//! Violation series, type breakdown and offender leader boards

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};

use super::compute::{fold_series, rank_entities, share, DailyTotal};
use super::predicate::{push_eq, push_range, push_scope, push_trip_filters, OwnerColumns};
use super::{sql_limit, EntityRow, Relation, Source};
use crate::error::Result;
use crate::models::{AnalyticsFilter, EntityMetric, Scope, SeriesPoint, ViolationAnalytics, ViolationBreakdown};

/// Entity a violation leader board is grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderDimension {
    /// Contractor of the trip's ticket
    ByContractor,
    /// Driver of the trip
    ByDriver,
    /// Camera that recorded the trip
    ByCamera,
}

impl LeaderDimension {
    /// Grouping column
    fn id_column(self) -> &'static str {
        match self {
            LeaderDimension::ByContractor => "t.contractor_id",
            LeaderDimension::ByDriver => "tr.driver_id",
            LeaderDimension::ByCamera => "tr.camera_id",
        }
    }

    /// Display-name projection, including the fallback label
    fn name_projection(self) -> &'static str {
        match self {
            LeaderDimension::ByContractor => "COALESCE(org.name, 'Contractor')",
            LeaderDimension::ByDriver => "COALESCE(d.full_name, 'Driver')",
            LeaderDimension::ByCamera => "COALESCE(c.name, 'Camera')",
        }
    }

    fn join(self) -> &'static str {
        match self {
            LeaderDimension::ByContractor => " LEFT JOIN organizations org ON org.id = t.contractor_id",
            LeaderDimension::ByDriver => " LEFT JOIN drivers d ON d.id = tr.driver_id",
            LeaderDimension::ByCamera => " LEFT JOIN cameras c ON c.id = tr.camera_id",
        }
    }

    fn relation(self) -> Relation {
        match self {
            LeaderDimension::ByContractor => Relation::Organizations,
            LeaderDimension::ByDriver => Relation::Drivers,
            LeaderDimension::ByCamera => Relation::Cameras,
        }
    }
}

#[derive(Debug, FromRow)]
struct DailyRow {
    day: DateTime<Utc>,
    count: i64,
}

#[derive(Debug, FromRow)]
struct BreakdownRow {
    kind: String,
    count: i64,
}

fn leaders_query<'a>(
    scope: &Scope,
    filter: &'a AnalyticsFilter,
    dimension: LeaderDimension,
    limit: usize,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
    qb.push(dimension.id_column())
        .push(" AS id, ")
        .push(dimension.name_projection())
        .push(
            " AS name, COUNT(*)::BIGINT AS count, 0::DOUBLE PRECISION AS volume
            FROM trips tr
            LEFT JOIN tickets t ON t.id = tr.ticket_id",
        )
        .push(dimension.join())
        .push(" WHERE tr.status <> 'OK' AND ")
        .push(dimension.id_column())
        .push(" IS NOT NULL");
    push_range(&mut qb, "tr.entry_at", &filter.range);
    push_trip_filters(&mut qb, filter);
    if let Some(kind) = &filter.violation_type {
        qb.push(" AND tr.status = ");
        qb.push_bind(kind.as_str());
    }
    push_scope(&mut qb, scope, OwnerColumns::Tickets);
    qb.push(" GROUP BY 1, 2 ORDER BY count DESC, id LIMIT ");
    qb.push_bind(sql_limit(limit));
    qb
}

/// Builds the violation report
#[derive(Clone)]
pub struct ViolationAggregator {
    source: Source,
    top_limit: usize,
}

impl ViolationAggregator {
    /// Create an aggregator; leader boards keep `top_limit` entries
    pub fn new(source: Source, top_limit: usize) -> Self {
        Self { source, top_limit }
    }

    /// Series, breakdown and the three leader boards
    pub async fn run(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<ViolationAnalytics> {
        if !scope.sees_operational_data() {
            return Ok(ViolationAnalytics::default());
        }

        let (series, breakdown, top_contractors, top_drivers, top_cameras) = tokio::try_join!(
            self.series(scope, filter),
            self.breakdown(scope, filter),
            self.leaders(scope, filter, LeaderDimension::ByContractor),
            self.leaders(scope, filter, LeaderDimension::ByDriver),
            self.leaders(scope, filter, LeaderDimension::ByCamera),
        )?;

        Ok(ViolationAnalytics {
            series,
            breakdown,
            top_contractors,
            top_drivers,
            top_cameras,
        })
    }

    fn rollup_query<'a>(select: &str, scope: &Scope, filter: &'a AnalyticsFilter) -> QueryBuilder<'a, Postgres> {
        let mut qb = QueryBuilder::<Postgres>::new(select);
        qb.push(" FROM mv_violation_daily mv WHERE TRUE");
        push_range(&mut qb, "mv.bucket", &filter.range);
        push_eq(&mut qb, "mv.contractor_id", filter.contractor_id);
        push_eq(&mut qb, "mv.driver_id", filter.driver_id);
        if let Some(kind) = &filter.violation_type {
            qb.push(" AND mv.violation_type = ");
            qb.push_bind(kind.as_str());
        }
        push_scope(&mut qb, scope, OwnerColumns::Rollup);
        qb
    }

    #[allow(clippy::cast_precision_loss)]
    async fn series(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<SeriesPoint>> {
        if !self.source.ready(&[Relation::ViolationDaily]).await {
            return Ok(Vec::new());
        }

        let mut qb = Self::rollup_query(
            "SELECT mv.bucket AS day, COALESCE(SUM(mv.violation_count), 0)::BIGINT AS count",
            scope,
            filter,
        );
        qb.push(" GROUP BY mv.bucket ORDER BY mv.bucket");

        let days = qb
            .build_query_as::<DailyRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(fold_series(
            days.into_iter().map(|d| DailyTotal {
                day: d.day,
                count: d.count,
                value: d.count as f64,
            }),
            filter.group_by,
        ))
    }

    async fn breakdown(&self, scope: &Scope, filter: &AnalyticsFilter) -> Result<Vec<ViolationBreakdown>> {
        if !self.source.ready(&[Relation::ViolationDaily]).await {
            return Ok(Vec::new());
        }

        let mut qb = Self::rollup_query(
            "SELECT COALESCE(mv.violation_type, 'UNKNOWN') AS kind, COALESCE(SUM(mv.violation_count), 0)::BIGINT AS count",
            scope,
            filter,
        );
        qb.push(" GROUP BY 1 ORDER BY count DESC, kind");

        let rows = qb
            .build_query_as::<BreakdownRow>()
            .fetch_all(self.source.pool())
            .await?;

        Ok(breakdown_shares(rows))
    }

    /// Offenders with the most non-OK trips along `dimension`
    pub async fn leaders(
        &self,
        scope: &Scope,
        filter: &AnalyticsFilter,
        dimension: LeaderDimension,
    ) -> Result<Vec<EntityMetric>> {
        if !scope.sees_operational_data()
            || !self
                .source
                .ready(&[Relation::Trips, Relation::Tickets, dimension.relation()])
                .await
        {
            return Ok(Vec::new());
        }

        let rows = leaders_query(scope, filter, dimension, self.top_limit)
            .build_query_as::<EntityRow>()
            .fetch_all(self.source.pool())
            .await?;
        Ok(rank_entities(rows.into_iter().map(EntityMetric::from).collect(), self.top_limit))
    }
}

fn breakdown_shares(rows: Vec<BreakdownRow>) -> Vec<ViolationBreakdown> {
    let total: i64 = rows.iter().map(|r| r.count).sum();
    rows.into_iter()
        .map(|row| ViolationBreakdown {
            share: share(row.count, total),
            kind: row.kind,
            count: row.count,
        })
        .collect()
}
