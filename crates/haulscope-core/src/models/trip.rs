//! Trip reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityMetric, SeriesPoint};

/// Trip volume over time plus leader boards and distribution stats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripAnalytics {
    /// Trips per bucket, `value` mirrors `count`
    pub series: Vec<SeriesPoint>,
    /// Detected volume per bucket
    pub volume_series: Vec<SeriesPoint>,
    /// Drivers ranked by trip count
    pub top_drivers: Vec<EntityMetric>,
    /// Contractors ranked by trip count
    pub top_contractors: Vec<EntityMetric>,
    /// Entry-to-exit durations
    pub duration_stats: TripDurationStats,
    /// Detected entry volumes
    pub volume_stats: TripVolumeStats,
}

/// Trip duration in minutes; percentiles are discrete, never interpolated
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TripDurationStats {
    /// Mean duration
    pub avg_minutes: f64,
    /// 90th percentile
    pub p90_minutes: f64,
    /// 95th percentile
    pub p95_minutes: f64,
}

/// Detected volume in m3 over trips that have a reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TripVolumeStats {
    /// Mean volume
    pub avg_volume: f64,
    /// Largest volume
    pub max_volume: f64,
    /// Smallest volume
    pub min_volume: f64,
}

/// A single trip with its ticket, crew and sensor evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripDetails {
    /// Trip identifier
    pub trip_id: Uuid,
    /// Ticket the trip was made for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<Uuid>,
    /// Ticket title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_name: Option<String>,
    /// Driver at the wheel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Uuid>,
    /// Driver full name, absent when drivers are unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    /// Vehicle used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Uuid>,
    /// Licence plate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    /// Contractor of the ticket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_id: Option<Uuid>,
    /// Contractor display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor_name: Option<String>,
    /// Cleaning area of the ticket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning_area_id: Option<Uuid>,
    /// Disposal polygon the trip entered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon_id: Option<Uuid>,
    /// `OK` or a violation code
    pub status: String,
    /// Polygon entry
    pub entry_at: DateTime<Utc>,
    /// Polygon exit; absent while the trip is open
    pub exit_at: Option<DateTime<Utc>>,
    /// Volume measured at entry, m3
    pub detected_volume_entry: Option<f64>,
    /// Volume measured at exit, m3
    pub detected_volume_exit: Option<f64>,
    /// Violations derived from `status`
    pub violations: Vec<ViolationRecord>,
    /// Linked sensor evidence
    pub events: TripEventDetails,
}

/// Sensor events linked to a trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripEventDetails {
    /// Plate read at entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_lpr: Option<TripEvent>,
    /// Plate read at exit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_lpr: Option<TripEvent>,
    /// Volume scan at entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_volume: Option<TripEvent>,
    /// Volume scan at exit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_volume: Option<TripEvent>,
}

/// One LPR or volume camera event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    /// Event identifier
    pub event_id: Uuid,
    /// Camera that captured it
    pub camera_id: Uuid,
    /// Snapshot location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}

/// A violation attached to a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Violation code
    #[serde(rename = "type")]
    pub kind: String,
    /// Where the violation was raised
    pub source: String,
    /// Exit time, or entry time for open trips
    pub at: DateTime<Utc>,
    /// Free-form operator note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
