//! API handlers for the analytics endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::response::Data;
use crate::auth::TokenVerifier;
use crate::db::PostgresPool;
use crate::error::{Error, Result};
use crate::models::{
    CleaningAreaAnalytics, ContractAnalytics, DashboardMetrics, DriverKpi, FilterRequest, GroupBy,
    PerformanceAnalytics, Principal, RangeRequest, TechnicalAnalytics, TripAnalytics, TripDetails,
    VehicleKpi, ViolationAnalytics,
};
use crate::service::AnalyticsService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Report orchestrator
    pub analytics: Arc<AnalyticsService>,
    /// Bearer token verifier
    pub verifier: Arc<dyn TokenVerifier>,
    /// Pool used by the health check
    pub postgres: PostgresPool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Whether the database answered
    pub database: bool,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.postgres.health_check().await.is_ok();

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

/// Query string shared by the report endpoints.
///
/// Every field is kept as raw text and parsed leniently: values that do not
/// parse are dropped instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// RFC3339 start
    pub from: Option<String>,
    /// RFC3339 end
    pub to: Option<String>,
    /// `day`, `week` or `month`
    pub group_by: Option<String>,
    /// Contractor filter
    pub contractor_id: Option<String>,
    /// Driver filter
    pub driver_id: Option<String>,
    /// Polygon filter
    pub polygon_id: Option<String>,
    /// Camera filter
    pub camera_id: Option<String>,
    /// Violation status filter
    pub violation_type: Option<String>,
}

impl AnalyticsQuery {
    /// Requested range
    pub fn range(&self) -> RangeRequest {
        RangeRequest {
            from: parse_time(self.from.as_deref()),
            to: parse_time(self.to.as_deref()),
        }
    }

    /// Requested filter
    pub fn filter(&self) -> FilterRequest {
        FilterRequest {
            range: self.range(),
            contractor_id: parse_id(self.contractor_id.as_deref()),
            driver_id: parse_id(self.driver_id.as_deref()),
            polygon_id: parse_id(self.polygon_id.as_deref()),
            camera_id: parse_id(self.camera_id.as_deref()),
            violation_type: self
                .violation_type
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            group_by: self
                .group_by
                .as_deref()
                .map(GroupBy::parse_lenient)
                .unwrap_or_default(),
        }
    }
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn parse_id(value: Option<&str>) -> Option<Uuid> {
    value.and_then(|raw| Uuid::parse_str(raw.trim()).ok())
}

/// Dashboard overview
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<DashboardMetrics>>> {
    let metrics = state.analytics.dashboard(&principal, query.range()).await?;
    Ok(Data::json(metrics))
}

/// Trip analytics
pub async fn trips(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<TripAnalytics>>> {
    let trips = state.analytics.trips(&principal, query.filter()).await?;
    Ok(Data::json(trips))
}

/// Single trip
pub async fn trip_details(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Data<TripDetails>>> {
    let trip_id = Uuid::parse_str(id.trim()).map_err(|_| Error::validation("invalid trip id"))?;
    let details = state.analytics.trip_details(&principal, trip_id).await?;
    Ok(Data::json(details))
}

/// Violation analytics
pub async fn violations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<ViolationAnalytics>>> {
    let violations = state.analytics.violations(&principal, query.filter()).await?;
    Ok(Data::json(violations))
}

/// Performance tables
pub async fn performance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<PerformanceAnalytics>>> {
    let performance = state.analytics.performance(&principal, query.filter()).await?;
    Ok(Data::json(performance))
}

/// Contract progress
pub async fn contracts(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Data<ContractAnalytics>>> {
    let contracts = state.analytics.contracts(&principal).await?;
    Ok(Data::json(contracts))
}

/// Cleaning areas
pub async fn areas(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<Vec<CleaningAreaAnalytics>>>> {
    let areas = state.analytics.areas(&principal, query.filter()).await?;
    Ok(Data::json(areas))
}

/// Driver KPIs
pub async fn drivers(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<Vec<DriverKpi>>>> {
    let drivers = state.analytics.drivers(&principal, query.filter()).await?;
    Ok(Data::json(drivers))
}

/// Vehicle KPIs
pub async fn vehicles(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<Vec<VehicleKpi>>>> {
    let vehicles = state.analytics.vehicles(&principal, query.filter()).await?;
    Ok(Data::json(vehicles))
}

/// Camera and sensor telemetry
pub async fn technical(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Data<TechnicalAnalytics>>> {
    let technical = state.analytics.technical(&principal, query.range()).await?;
    Ok(Data::json(technical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_parses_valid_values() {
        let contractor = Uuid::new_v4();
        let query = AnalyticsQuery {
            from: Some("2025-01-01T00:00:00Z".into()),
            to: Some("2025-01-31T23:59:59+00:00".into()),
            group_by: Some("WEEK".into()),
            contractor_id: Some(contractor.to_string()),
            violation_type: Some("MISMATCH_PLATE".into()),
            ..AnalyticsQuery::default()
        };

        let filter = query.filter();

        assert_eq!(filter.range.from, Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(filter.range.to, Some(Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap()));
        assert_eq!(filter.group_by, GroupBy::Week);
        assert_eq!(filter.contractor_id, Some(contractor));
        assert_eq!(filter.violation_type.as_deref(), Some("MISMATCH_PLATE"));
    }

    #[test]
    fn test_query_drops_unparsable_values() {
        let query = AnalyticsQuery {
            from: Some("yesterday".into()),
            to: Some("2025-13-01".into()),
            group_by: Some("fortnight".into()),
            driver_id: Some("not-a-uuid".into()),
            violation_type: Some("  ".into()),
            ..AnalyticsQuery::default()
        };

        let filter = query.filter();

        assert_eq!(filter.range, RangeRequest::default());
        assert_eq!(filter.group_by, GroupBy::Day);
        assert_eq!(filter.driver_id, None);
        assert_eq!(filter.violation_type, None);
    }
}
