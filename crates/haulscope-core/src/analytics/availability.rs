//! Relation availability.
//!
//! Rollups are created and refreshed by a separate job, so any of them may
//! be missing on a fresh deployment. Aggregators ask this port before they
//! query and answer with an empty result when something they need is absent.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::Result;

/// Logical relations the aggregators read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// `trips`
    Trips,
    /// `tickets`
    Tickets,
    /// `organizations`
    Organizations,
    /// `drivers`
    Drivers,
    /// `vehicles`
    Vehicles,
    /// `cameras`
    Cameras,
    /// Disposal polygons
    Polygons,
    /// Plate-recognition events
    LprEvents,
    /// Volume-scan events
    VolumeEvents,
    /// `contracts`
    Contracts,
    /// Booked cost and volume per contract
    ContractUsage,
    /// Cleaning areas, PostGIS geometry included
    CleaningAreas,
    /// Daily trip rollup
    TripDaily,
    /// Daily violation rollup
    ViolationDaily,
    /// Daily cleaning-area rollup
    CleaningAreaDaily,
}

impl Relation {
    /// Every relation
    pub const ALL: [Relation; 15] = [
        Relation::Trips,
        Relation::Tickets,
        Relation::Organizations,
        Relation::Drivers,
        Relation::Vehicles,
        Relation::Cameras,
        Relation::Polygons,
        Relation::LprEvents,
        Relation::VolumeEvents,
        Relation::Contracts,
        Relation::ContractUsage,
        Relation::CleaningAreas,
        Relation::TripDaily,
        Relation::ViolationDaily,
        Relation::CleaningAreaDaily,
    ];

    /// Name in the `public` schema
    pub fn table_name(self) -> &'static str {
        match self {
            Relation::Trips => "trips",
            Relation::Tickets => "tickets",
            Relation::Organizations => "organizations",
            Relation::Drivers => "drivers",
            Relation::Vehicles => "vehicles",
            Relation::Cameras => "cameras",
            Relation::Polygons => "polygons",
            Relation::LprEvents => "lpr_events",
            Relation::VolumeEvents => "volume_events",
            Relation::Contracts => "contracts",
            Relation::ContractUsage => "contract_usage",
            Relation::CleaningAreas => "cleaning_areas",
            Relation::TripDaily => "mv_trip_daily",
            Relation::ViolationDaily => "mv_violation_daily",
            Relation::CleaningAreaDaily => "mv_cleaning_area_daily",
        }
    }

    /// Precomputed rollup rather than a live table
    pub fn is_rollup(self) -> bool {
        matches!(
            self,
            Relation::TripDaily | Relation::ViolationDaily | Relation::CleaningAreaDaily
        )
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Answers whether a relation currently exists
#[async_trait]
pub trait DataAvailability: Send + Sync {
    /// Whether `relation` exists; lookup failures count as absent
    async fn exists(&self, relation: Relation) -> bool;

    /// Whether every relation in `relations` exists
    async fn all_exist(&self, relations: &[Relation]) -> bool {
        for relation in relations {
            if !self.exists(*relation).await {
                debug!(relation = %relation, "Required relation missing, degrading to empty result");
                return false;
            }
        }
        true
    }
}

/// Looks a relation up in the data store catalog
#[async_trait]
pub trait RelationCatalog: Send + Sync {
    /// Query the catalog for `name`
    async fn lookup(&self, name: &str) -> Result<bool>;
}

/// Caches catalog answers for the lifetime of the process
pub struct MemoizedAvailability<P> {
    catalog: P,
    cache: DashMap<Relation, bool>,
}

impl<P: RelationCatalog> MemoizedAvailability<P> {
    /// Wrap a catalog
    pub fn new(catalog: P) -> Self {
        Self {
            catalog,
            cache: DashMap::new(),
        }
    }

    /// Forget cached answers, e.g. after a deployment created new rollups
    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl<P: RelationCatalog> DataAvailability for MemoizedAvailability<P> {
    async fn exists(&self, relation: Relation) -> bool {
        if let Some(known) = self.cache.get(&relation) {
            return *known;
        }

        match self.catalog.lookup(relation.table_name()).await {
            Ok(exists) => {
                self.cache.insert(relation, exists);
                exists
            }
            Err(e) => {
                // not cached, the next request asks again
                warn!(relation = %relation, error = %e, "Relation lookup failed");
                false
            }
        }
    }
}

/// Fixed set of available relations; counts lookups
#[derive(Debug, Default)]
pub struct StaticAvailability {
    present: HashSet<Relation>,
    lookups: AtomicUsize,
}

impl StaticAvailability {
    /// Nothing exists
    pub fn none() -> Self {
        Self::default()
    }

    /// Everything exists
    pub fn all() -> Self {
        Self::with(Relation::ALL)
    }

    /// Exactly `relations` exist
    pub fn with(relations: impl IntoIterator<Item = Relation>) -> Self {
        Self {
            present: relations.into_iter().collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of `exists` calls so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Convenience for trait-object injection
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl DataAvailability for StaticAvailability {
    async fn exists(&self, relation: Relation) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.present.contains(&relation)
    }
}
