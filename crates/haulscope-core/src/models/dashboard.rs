//! Dashboard report

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CameraLoadMetric, ContractProgress, DateRange, EntityMetric};

/// Everything the landing dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    /// Headline counters
    pub stats: DashboardStats,
    /// Cleaning areas with trips
    pub areas: Vec<CleaningAreaActivity>,
    /// Active and idle contractors
    pub contractors: DashboardContractors,
    /// Camera load; scoped principals only see cameras that recorded their trips
    pub cameras: Vec<CameraLoadMetric>,
    /// Contract progress without the derived lists
    pub contracts: Vec<ContractProgress>,
    /// Map overlay layers
    pub map: MapSummary,
    /// Normalized range the numbers were computed for
    pub generated_for: DateRange,
}

impl DashboardMetrics {
    /// Dashboard with every section empty
    pub fn empty(range: DateRange) -> Self {
        Self {
            stats: DashboardStats::default(),
            areas: Vec::new(),
            contractors: DashboardContractors::default(),
            cameras: Vec::new(),
            contracts: Vec::new(),
            map: MapSummary::default(),
            generated_for: range,
        }
    }
}

/// Headline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Trips without an exit, regardless of range
    pub active_trips: i64,
    /// Closed trips that entered within the range
    pub completed_trips: i64,
    /// Tickets currently in progress
    pub tickets_in_progress: i64,
    /// Non-OK trips in range
    pub violations: i64,
}

/// Activity of a cleaning area within the range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningAreaActivity {
    /// Area identifier
    pub cleaning_area_id: Uuid,
    /// Trips in range
    pub trips: i64,
    /// Trips without an exit
    pub active_trips: i64,
    /// Any non-OK trip in range
    pub has_violations: bool,
    /// Trips relative to the busiest area in the same response
    pub trip_heat: f64,
}

/// Contractors with and without trips in the range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardContractors {
    /// Contractors with trips, by trip count
    pub active: Vec<EntityMetric>,
    /// Active organizations without trips
    pub idle: Vec<EntityMetric>,
}

/// Map overlay layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapSummary {
    /// Cleaning area states
    pub areas: Vec<MapAreaState>,
    /// Polygon states
    pub polygons: Vec<MapPolygonState>,
    /// Camera states
    pub cameras: Vec<MapCameraState>,
}

/// Map state of a cleaning area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapAreaState {
    /// Area identifier
    pub id: Uuid,
    /// At least one trip in range
    pub has_trips: bool,
    /// At least one open trip
    pub has_active_trips: bool,
    /// At least one non-OK trip
    pub has_violations: bool,
    /// Same as the area trip heat
    pub intensity: f64,
}

impl From<&CleaningAreaActivity> for MapAreaState {
    fn from(activity: &CleaningAreaActivity) -> Self {
        Self {
            id: activity.cleaning_area_id,
            has_trips: activity.trips > 0,
            has_active_trips: activity.active_trips > 0,
            has_violations: activity.has_violations,
            intensity: activity.trip_heat,
        }
    }
}

/// Map state of a disposal polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPolygonState {
    /// Polygon identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Trips in range
    pub trip_count: i64,
    /// Detected volume in range
    pub volume_m3: f64,
}

/// Map state of a camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapCameraState {
    /// Camera identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// LPR events in range
    pub events: i64,
    /// Visible trips flagged with a camera-side failure status
    pub error_events: i64,
}
