//! Database layer for Haulscope
//!
//! Read-only access to the operational PostgreSQL database.

mod postgres;

pub use postgres::{PgRelationCatalog, PgOrgDirectory, PostgresPool};

use std::sync::Arc;

use crate::analytics::{DataAvailability, MemoizedAvailability};
use crate::config::DatabaseConfig;
use crate::error::Result;

/// Pool plus the ports built on top of it
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub postgres: PostgresPool,
    /// Process-wide relation existence cache
    pub availability: Arc<MemoizedAvailability<PgRelationCatalog>>,
}

impl Database {
    /// Connect eagerly
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::from_pool(PostgresPool::new(config).await?))
    }

    /// Connect on first use
    pub fn lazy(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::from_pool(PostgresPool::lazy(config)?))
    }

    fn from_pool(postgres: PostgresPool) -> Self {
        let catalog = PgRelationCatalog::new(postgres.pool().clone());
        Self {
            availability: Arc::new(MemoizedAvailability::new(catalog)),
            postgres,
        }
    }

    /// Organization directory sharing this availability cache
    pub fn directory(&self) -> PgOrgDirectory {
        let availability: Arc<dyn DataAvailability> = self.availability.clone();
        PgOrgDirectory::new(self.postgres.pool().clone(), availability)
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.postgres.health_check().await
    }
}
