//! Scope-aware report aggregation.
//!
//! Each aggregator reads through a [`Source`], checks that the relations it
//! needs exist, and returns an empty result when they do not.

mod areas;
mod availability;
pub mod compute;
mod contracts;
mod dashboard;
mod kpi;
mod performance;
pub mod predicate;
mod range;
mod resolver;
mod technical;
mod trips;
mod violations;

use std::sync::Arc;

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::EntityMetric;

pub use areas::AreaAggregator;
pub use availability::{
    DataAvailability, MemoizedAvailability, Relation, RelationCatalog, StaticAvailability,
};
pub use contracts::{derive_subsets, ContractAggregator};
pub use dashboard::DashboardAggregator;
pub use kpi::KpiAggregator;
pub use performance::PerformanceAggregator;
pub use range::RangeNormalizer;
pub use resolver::{OrgDirectory, ScopeResolver};
pub use technical::TechnicalAggregator;
pub use trips::{violations_from_status, TripAggregator};
pub use violations::{LeaderDimension, ViolationAggregator};

/// Trip statuses raised by camera-side failures
pub const CAMERA_ERROR_STATUSES: [&str; 4] =
    ["NO_LPR_EVENT", "NO_VOLUME_EVENT", "CAMERA_ERROR", "MISMATCH_PLATE"];

/// Read access shared by every aggregator
#[derive(Clone)]
pub struct Source {
    pool: PgPool,
    availability: Arc<dyn DataAvailability>,
}

impl Source {
    /// Combine a pool with an availability port
    pub fn new(pool: PgPool, availability: Arc<dyn DataAvailability>) -> Self {
        Self { pool, availability }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether every relation in `relations` exists
    pub async fn ready(&self, relations: &[Relation]) -> bool {
        self.availability.all_exist(relations).await
    }
}

/// Grouped row shared by the leader-board queries
#[derive(Debug, FromRow)]
struct EntityRow {
    id: Uuid,
    name: String,
    count: i64,
    volume: f64,
}

impl From<EntityRow> for EntityMetric {
    fn from(row: EntityRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            count: row.count,
            volume: row.volume,
            share: 0.0,
        }
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
