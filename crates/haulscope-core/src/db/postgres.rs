//! PostgreSQL connection, catalog lookup and organization directory

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::analytics::{DataAvailability, OrgDirectory, Relation, RelationCatalog};
use crate::config::DatabaseConfig;
use crate::error::Result;

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    fn options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
    }

    /// Connect and fill the pool up to `min_connections`
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::options(config).connect(&config.url).await?;
        Ok(Self { pool })
    }

    /// Create the pool without connecting; connections open on first use
    pub fn lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::options(config)
            .min_connections(0)
            .connect_lazy(&config.url)?;
        Ok(Self { pool })
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Looks relations up in `pg_catalog`, schema `public`
#[derive(Clone)]
pub struct PgRelationCatalog {
    pool: PgPool,
}

impl PgRelationCatalog {
    /// Query the catalog through `pool`
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationCatalog for PgRelationCatalog {
    async fn lookup(&self, name: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM pg_catalog.pg_class c
                JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                WHERE c.relname = $1
                  AND c.relkind IN ('r', 'm', 'v')
                  AND n.nspname = 'public'
            )
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

/// Organization hierarchy stored in `organizations`
#[derive(Clone)]
pub struct PgOrgDirectory {
    pool: PgPool,
    availability: Arc<dyn DataAvailability>,
}

impl PgOrgDirectory {
    /// Read through `pool`, skipping the query when the table is absent
    pub fn new(pool: PgPool, availability: Arc<dyn DataAvailability>) -> Self {
        Self { pool, availability }
    }
}

#[async_trait]
impl OrgDirectory for PgOrgDirectory {
    async fn child_contractors_of(&self, org_id: Uuid) -> Result<Vec<Uuid>> {
        if !self.availability.exists(Relation::Organizations).await {
            return Ok(Vec::new());
        }

        let children = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM organizations
            WHERE type = 'CONTRACTOR' AND is_active AND parent_org_id = $1
            ORDER BY id
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(children)
    }
}
