//! Report eligibility table

use std::fmt;

use crate::error::{Error, Result};
use crate::models::Role;

/// Reports served by [`super::AnalyticsService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Report {
    /// Dashboard overview
    Dashboard,
    /// Trip series and leaders
    Trips,
    /// Single trip drill-down
    TripDetails,
    /// Violation series and leaders
    Violations,
    /// Contractor, driver and vehicle performance
    Performance,
    /// Contract progress
    Contracts,
    /// Cleaning area summaries
    Areas,
    /// Driver KPI table
    Drivers,
    /// Vehicle KPI table
    Vehicles,
    /// Camera and sensor telemetry
    Technical,
}

const OPERATIONAL: &[Role] = &[
    Role::CityAuthority,
    Role::RegionalAuthority,
    Role::Contractor,
    Role::TechnicalOperator,
];

const FLEET: &[Role] = &[Role::CityAuthority, Role::RegionalAuthority, Role::Contractor];

const TELEMETRY: &[Role] = &[
    Role::CityAuthority,
    Role::RegionalAuthority,
    Role::TechnicalOperator,
];

impl Report {
    /// Every report
    pub const ALL: [Report; 10] = [
        Report::Dashboard,
        Report::Trips,
        Report::TripDetails,
        Report::Violations,
        Report::Performance,
        Report::Contracts,
        Report::Areas,
        Report::Drivers,
        Report::Vehicles,
        Report::Technical,
    ];

    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Report::Dashboard => "dashboard",
            Report::Trips => "trips",
            Report::TripDetails => "trip_details",
            Report::Violations => "violations",
            Report::Performance => "performance",
            Report::Contracts => "contracts",
            Report::Areas => "areas",
            Report::Drivers => "drivers",
            Report::Vehicles => "vehicles",
            Report::Technical => "technical",
        }
    }

    /// Roles allowed to request this report
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Report::Dashboard
            | Report::Trips
            | Report::TripDetails
            | Report::Violations
            | Report::Performance
            | Report::Contracts => OPERATIONAL,
            Report::Areas | Report::Drivers | Report::Vehicles => FLEET,
            Report::Technical => TELEMETRY,
        }
    }

    /// Whether `role` may request this report
    pub fn permits(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    /// Fails with [`Error::PermissionDenied`] unless `role` is allowed
    pub fn ensure_permits(self, role: Role) -> Result<()> {
        if self.permits(role) {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
