//! Shared report building blocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A ranked entity with its share of the returned set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetric {
    /// Entity id
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Number of trips or violations
    pub count: i64,
    /// Detected volume in cubic meters
    pub volume: f64,
    /// `count / sum(count)` over the returned set
    pub share: f64,
}

impl EntityMetric {
    /// Entity with no activity
    pub fn idle(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            count: 0,
            volume: 0.0,
            share: 0.0,
        }
    }
}

/// One point of a time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Bucket start
    pub bucket: DateTime<Utc>,
    /// Rows in the bucket
    pub count: i64,
    /// Plotted value
    pub value: f64,
}

/// Event throughput and error rate of one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraLoadMetric {
    /// Camera identifier
    pub camera_id: Uuid,
    /// Display name
    pub camera_name: String,
    /// Polygon the camera watches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon_id: Option<Uuid>,
    /// Polygon display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon_name: Option<String>,
    /// Plate reads in range
    pub lpr_events: i64,
    /// Volume scans in range
    pub volume_events: i64,
    /// Trips flagged with a camera-side failure status
    pub error_events: i64,
    /// `error_events / (lpr_events + volume_events)`
    pub error_rate: f64,
}

/// Trip load of one disposal polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonLoadMetric {
    /// Polygon identifier
    pub polygon_id: Uuid,
    /// Display name
    pub polygon_name: String,
    /// Trips in range
    pub trip_count: i64,
    /// Detected volume in range
    pub volume_m3: f64,
    /// Non-OK trips in range
    pub error_events: i64,
}
