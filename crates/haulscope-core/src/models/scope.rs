//! Data-visibility scopes

use serde::Serialize;
use uuid::Uuid;

/// What a principal is allowed to see.
///
/// Every aggregation site matches on this enum exhaustively, so adding a
/// variant forces each predicate to be revisited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scope {
    /// Everything, no predicate
    City,
    /// Tickets created by `org_id` plus work done by its child contractors
    Regional {
        /// Regional authority organization
        org_id: Uuid,
        /// Contractors parented by `org_id`; empty when none were resolved
        contractors: Vec<Uuid>,
    },
    /// Only the contractor's own work
    Contractor {
        /// Contractor organization
        org_id: Uuid,
    },
    /// Camera and sensor telemetry only
    Technical,
}

impl Scope {
    /// Short label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::City => "city",
            Scope::Regional { .. } => "regional",
            Scope::Contractor { .. } => "contractor",
            Scope::Technical => "technical",
        }
    }

    /// Whether trips, tickets, contracts and rollups are visible at all
    pub fn sees_operational_data(&self) -> bool {
        !matches!(self, Scope::Technical)
    }

    /// Organization the scope is anchored to, if any
    pub fn org_id(&self) -> Option<Uuid> {
        match self {
            Scope::Regional { org_id, .. } | Scope::Contractor { org_id } => Some(*org_id),
            Scope::City | Scope::Technical => None,
        }
    }

    /// In-memory form of the SQL scope predicate
    pub fn admits(&self, owner: &Ownership) -> bool {
        match self {
            Scope::City => true,
            Scope::Regional {
                org_id,
                contractors,
            } => {
                owner.created_by_org == Some(*org_id)
                    || owner
                        .contractor
                        .is_some_and(|contractor| contractors.contains(&contractor))
            }
            Scope::Contractor { org_id } => owner.contractor == Some(*org_id),
            Scope::Technical => false,
        }
    }
}

/// Ownership columns of an operational row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    /// Organization that created the ticket or contract
    pub created_by_org: Option<Uuid>,
    /// Contractor doing the work
    pub contractor: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_admits_unowned_rows() {
        assert!(Scope::City.admits(&Ownership::default()));
    }

    #[test]
    fn test_technical_admits_nothing() {
        let owner = Ownership {
            created_by_org: Some(Uuid::new_v4()),
            contractor: Some(Uuid::new_v4()),
        };
        assert!(!Scope::Technical.admits(&owner));
        assert!(!Scope::Technical.sees_operational_data());
    }

    #[test]
    fn test_regional_admits_own_tickets_and_children() {
        let region = Uuid::new_v4();
        let child = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let scope = Scope::Regional {
            org_id: region,
            contractors: vec![child],
        };

        assert!(scope.admits(&Ownership {
            created_by_org: Some(region),
            contractor: Some(stranger),
        }));
        assert!(scope.admits(&Ownership {
            created_by_org: None,
            contractor: Some(child),
        }));
        assert!(!scope.admits(&Ownership {
            created_by_org: Some(Uuid::new_v4()),
            contractor: Some(stranger),
        }));
    }

    #[test]
    fn test_contractor_ignores_creator() {
        let me = Uuid::new_v4();
        let scope = Scope::Contractor { org_id: me };

        assert!(!scope.admits(&Ownership {
            created_by_org: Some(me),
            contractor: None,
        }));
        assert!(scope.admits(&Ownership {
            created_by_org: None,
            contractor: Some(me),
        }));
    }
}
