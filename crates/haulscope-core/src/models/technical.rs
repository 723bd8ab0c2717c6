//! Technical (camera network) report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CameraLoadMetric, PolygonLoadMetric};

/// City-wide health of the camera and sensor network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalytics {
    /// Load per camera
    pub cameras: Vec<CameraLoadMetric>,
    /// Load per polygon
    pub polygons: Vec<PolygonLoadMetric>,
    /// Error events over all LPR and volume events
    pub error_rate: f64,
    /// Most recent LPR or volume event in range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
    /// LPR plus volume events
    pub total_events: i64,
    /// Events per hour of the range
    #[serde(rename = "event_frequency_per_hour")]
    pub event_frequency: f64,
}
