//! Authenticated caller identity

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organizational role carried by an access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// City administration, sees everything
    #[serde(alias = "AKIMAT")]
    CityAuthority,
    /// District authority, sees its own tickets and its contractors
    #[serde(alias = "KGU")]
    RegionalAuthority,
    /// Hauling company
    #[serde(alias = "CONTRACTOR")]
    Contractor,
    /// Operator of the camera and sensor network
    #[serde(alias = "TOO")]
    TechnicalOperator,
    /// Individual driver
    #[serde(alias = "DRIVER")]
    Driver,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 5] = [
        Role::CityAuthority,
        Role::RegionalAuthority,
        Role::Contractor,
        Role::TechnicalOperator,
        Role::Driver,
    ];

    /// Stable lowercase name used in logs and metrics labels
    pub fn as_str(self) -> &'static str {
        match self {
            Role::CityAuthority => "city_authority",
            Role::RegionalAuthority => "regional_authority",
            Role::Contractor => "contractor",
            Role::TechnicalOperator => "technical_operator",
            Role::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity asserted by the token verifier, immutable for the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User id
    pub user_id: Uuid,
    /// Organization the user acts for
    pub org_id: Option<Uuid>,
    /// Role
    pub role: Role,
    /// Driver record, for driver accounts
    pub driver_id: Option<Uuid>,
}

impl Principal {
    /// Create a principal without a driver link
    pub fn new(user_id: Uuid, role: Role, org_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            org_id,
            role,
            driver_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_accepts_deployment_codes() {
        let roles: Vec<Role> =
            serde_json::from_str(r#"["AKIMAT","KGU","CONTRACTOR","TOO","DRIVER"]"#).unwrap();
        assert_eq!(roles, Role::ALL.to_vec());
    }

    #[test]
    fn test_role_serializes_descriptive_name() {
        let json = serde_json::to_string(&Role::TechnicalOperator).unwrap();
        assert_eq!(json, r#""technical_operator""#);
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::TechnicalOperator);
    }
}
