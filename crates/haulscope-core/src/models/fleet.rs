//! Performance, KPI and cleaning-area tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ranked contractor, driver and vehicle tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalytics {
    /// Contractors by trip count
    pub contractors: Vec<ContractorPerformance>,
    /// Drivers by trip count
    pub drivers: Vec<DriverPerformance>,
    /// Vehicles by trip count
    pub vehicles: Vec<VehiclePerformance>,
}

/// Performance row of one contractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorPerformance {
    /// Contractor organization
    pub contractor_id: Uuid,
    /// Display name
    pub contractor_name: String,
    /// Trips in range
    pub trip_count: i64,
    /// Mean detected volume, m3
    pub avg_volume: f64,
    /// Non-OK trips over all trips
    pub violation_rate: f64,
    /// Distinct drivers with at least one trip
    pub active_drivers: i64,
}

/// Performance row of one driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverPerformance {
    /// Driver identifier
    pub driver_id: Uuid,
    /// Full name
    pub driver_name: String,
    /// Trips in range
    pub trip_count: i64,
    /// Mean detected volume, m3
    pub avg_volume: f64,
    /// Non-OK trips over all trips
    pub violation_rate: f64,
    /// Mean trip duration in minutes
    #[serde(rename = "avg_duration_minutes")]
    pub avg_duration: f64,
}

/// Performance row of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePerformance {
    /// Vehicle identifier
    pub vehicle_id: Uuid,
    /// Licence plate
    pub plate_number: String,
    /// Trips in range
    pub trip_count: i64,
    /// Mean of detected volume over body volume
    pub avg_fill_rate: f64,
    /// Non-OK trips over all trips
    pub violation_rate: f64,
    /// Hours from the last activity to the end of the range
    pub idle_hours: f64,
}

/// Per-driver KPI row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverKpi {
    /// Driver identifier
    pub driver_id: Uuid,
    /// Full name
    pub driver_name: String,
    /// Contractor the trips were made for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_id: Option<Uuid>,
    /// Contractor display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_name: Option<String>,
    /// Trips in range
    pub trip_count: i64,
    /// Mean detected volume, m3
    pub avg_volume: f64,
    /// Non-OK trips over all trips
    pub violation_rate: f64,
    /// Mean trip duration in minutes
    #[serde(rename = "avg_duration_minutes")]
    pub avg_duration: f64,
    /// Latest entry in range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trip_at: Option<DateTime<Utc>>,
}

/// Per-vehicle KPI row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleKpi {
    /// Vehicle identifier
    pub vehicle_id: Uuid,
    /// Licence plate
    pub plate_number: String,
    /// Contractor the trips were made for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_id: Option<Uuid>,
    /// Contractor display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_name: Option<String>,
    /// Trips in range
    pub trip_count: i64,
    /// Mean of detected volume over body volume
    pub avg_fill_rate: f64,
    /// Non-OK trips over all trips
    pub violation_rate: f64,
    /// Hours from the last exit to the end of the range
    pub idle_hours: f64,
    /// Latest entry in range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trip_at: Option<DateTime<Utc>>,
}

/// Cleaning area summary built from the daily area rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningAreaAnalytics {
    /// Area identifier
    pub cleaning_area_id: Uuid,
    /// Area name, or a placeholder when unnamed
    pub name: String,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Trips in range
    pub trip_count: i64,
    /// Detected volume in range
    #[serde(rename = "total_volume_m3")]
    pub volume_m3: f64,
    /// Non-OK trips in range
    pub violation_count: i64,
    /// Sum of per-day distinct drivers
    pub active_drivers: i64,
    /// Sum of per-day distinct vehicles
    pub active_vehicles: i64,
    /// Mean hours between trips, first entry to last exit
    pub avg_interval_hours: f64,
    /// Hours from the last exit to the end of the range
    pub idle_hours: f64,
    /// Latest exit in range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trip_at: Option<DateTime<Utc>>,
    /// Area outline as GeoJSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_geojson: Option<String>,
}
