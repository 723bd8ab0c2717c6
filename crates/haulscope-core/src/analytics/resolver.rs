//! Principal to scope resolution

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Principal, Role, Scope};

/// Organization hierarchy lookups
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// Contractors whose parent organization is `org_id`
    async fn child_contractors_of(&self, org_id: Uuid) -> Result<Vec<Uuid>>;
}

/// Maps a principal's role and organization to a [`Scope`]
#[derive(Clone)]
pub struct ScopeResolver {
    directory: Arc<dyn OrgDirectory>,
}

impl ScopeResolver {
    /// Create a resolver backed by `directory`
    pub fn new(directory: Arc<dyn OrgDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve the scope of `principal`.
    ///
    /// Drivers, and regional or contractor accounts without an organization,
    /// fail with [`Error::ScopeUnsupported`]. Only regional authorities
    /// touch the directory.
    pub async fn resolve(&self, principal: &Principal) -> Result<Scope> {
        match principal.role {
            Role::CityAuthority => Ok(Scope::City),
            Role::TechnicalOperator => Ok(Scope::Technical),
            Role::Contractor => {
                let org_id = principal
                    .org_id
                    .ok_or(Error::ScopeUnsupported(principal.role))?;
                Ok(Scope::Contractor { org_id })
            }
            Role::RegionalAuthority => {
                let org_id = principal
                    .org_id
                    .ok_or(Error::ScopeUnsupported(principal.role))?;
                let contractors = match self.directory.child_contractors_of(org_id).await {
                    Ok(contractors) => contractors,
                    Err(e) => {
                        warn!(org_id = %org_id, error = %e, "Child contractor lookup failed, using own organization only");
                        Vec::new()
                    }
                };
                Ok(Scope::Regional {
                    org_id,
                    contractors,
                })
            }
            Role::Driver => Err(Error::ScopeUnsupported(principal.role)),
        }
    }
}
