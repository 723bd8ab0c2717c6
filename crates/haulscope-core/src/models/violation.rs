//! Violation report

use serde::{Deserialize, Serialize};

use super::{EntityMetric, SeriesPoint};

/// Violations over time, by type, and by offender
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationAnalytics {
    /// Violations per bucket
    pub series: Vec<SeriesPoint>,
    /// Counts per violation code, largest first
    pub breakdown: Vec<ViolationBreakdown>,
    /// Contractors with the most flagged trips
    pub top_contractors: Vec<EntityMetric>,
    /// Drivers with the most flagged trips
    pub top_drivers: Vec<EntityMetric>,
    /// Cameras that flagged the most trips
    pub top_cameras: Vec<EntityMetric>,
}

/// Count and share of one violation code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationBreakdown {
    /// Violation code
    #[serde(rename = "type")]
    pub kind: String,
    /// Violations with this code
    pub count: i64,
    /// Fraction of all violations in the response
    pub share: f64,
}
