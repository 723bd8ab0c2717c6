//! Report orchestration
//!
//! Every request goes through the same steps: the role is checked against
//! the eligibility table, the principal is resolved to a scope, the range is
//! normalized and only then does an aggregator touch the database.

mod policy;

pub use policy::Report;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analytics::{
    AreaAggregator, ContractAggregator, DashboardAggregator, KpiAggregator, OrgDirectory,
    PerformanceAggregator, RangeNormalizer, ScopeResolver, Source, TechnicalAggregator,
    TripAggregator, ViolationAggregator,
};
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::models::{
    CleaningAreaAnalytics, ContractAnalytics, DashboardMetrics, DriverKpi, FilterRequest,
    PerformanceAnalytics, Principal, RangeRequest, Scope, TechnicalAnalytics, TripAnalytics,
    TripDetails, VehicleKpi, ViolationAnalytics,
};

/// Entry point for every report
#[derive(Clone)]
pub struct AnalyticsService {
    resolver: ScopeResolver,
    normalizer: RangeNormalizer,
    dashboard: DashboardAggregator,
    trips: TripAggregator,
    violations: ViolationAggregator,
    performance: PerformanceAggregator,
    contracts: ContractAggregator,
    areas: AreaAggregator,
    kpi: KpiAggregator,
    technical: TechnicalAggregator,
}

impl AnalyticsService {
    /// Wire the aggregators over `source`
    pub fn new(source: Source, directory: Arc<dyn OrgDirectory>, config: &AnalyticsConfig) -> Self {
        let top = usize::try_from(config.top_limit).unwrap_or(usize::MAX);
        let performance = usize::try_from(config.performance_limit).unwrap_or(usize::MAX);

        Self {
            resolver: ScopeResolver::new(directory),
            normalizer: RangeNormalizer::from_config(config),
            dashboard: DashboardAggregator::new(source.clone()),
            trips: TripAggregator::new(source.clone(), top),
            violations: ViolationAggregator::new(source.clone(), top),
            performance: PerformanceAggregator::new(source.clone(), performance),
            contracts: ContractAggregator::new(source.clone(), top),
            areas: AreaAggregator::new(source.clone()),
            kpi: KpiAggregator::new(source.clone()),
            technical: TechnicalAggregator::new(source),
        }
    }

    /// Check eligibility, then resolve the scope.
    ///
    /// A role with no scope mapping is reported as [`Error::PermissionDenied`].
    pub async fn authorize(&self, report: Report, principal: &Principal) -> Result<Scope> {
        report.ensure_permits(principal.role)?;

        self.resolver.resolve(principal).await.map_err(|e| match e {
            Error::ScopeUnsupported(role) => {
                warn!(report = %report, role = %role, user_id = %principal.user_id, "Principal has no usable scope");
                Error::PermissionDenied
            }
            other => other,
        })
    }

    /// Dashboard overview
    pub async fn dashboard(&self, principal: &Principal, range: RangeRequest) -> Result<DashboardMetrics> {
        self.serve(Report::Dashboard, principal, |scope| async move {
            let range = self.normalizer.normalize(range);
            self.dashboard.run(&scope, &range, Utc::now()).await
        })
        .await
    }

    /// Trip series, leaders and statistics
    pub async fn trips(&self, principal: &Principal, filter: FilterRequest) -> Result<TripAnalytics> {
        self.serve(Report::Trips, principal, |scope| async move {
            let filter = self.normalizer.normalize_filter(filter);
            self.trips.run(&scope, &filter).await
        })
        .await
    }

    /// One trip, or [`Error::NotFound`] when it is outside the caller's scope
    pub async fn trip_details(&self, principal: &Principal, trip_id: Uuid) -> Result<TripDetails> {
        self.serve(Report::TripDetails, principal, |scope| async move {
            self.trips.details(&scope, trip_id).await
        })
        .await
    }

    /// Violation series, breakdown and leaders
    pub async fn violations(&self, principal: &Principal, filter: FilterRequest) -> Result<ViolationAnalytics> {
        self.serve(Report::Violations, principal, |scope| async move {
            let filter = self.normalizer.normalize_filter(filter);
            self.violations.run(&scope, &filter).await
        })
        .await
    }

    /// Contractor, driver and vehicle performance tables
    pub async fn performance(&self, principal: &Principal, filter: FilterRequest) -> Result<PerformanceAnalytics> {
        self.serve(Report::Performance, principal, |scope| async move {
            let filter = self.normalizer.normalize_filter(filter);
            self.performance.run(&scope, &filter).await
        })
        .await
    }

    /// Contract progress with the derived subsets
    pub async fn contracts(&self, principal: &Principal) -> Result<ContractAnalytics> {
        self.serve(Report::Contracts, principal, |scope| async move {
            self.contracts.run(&scope, Utc::now()).await
        })
        .await
    }

    /// Cleaning area summaries
    pub async fn areas(&self, principal: &Principal, filter: FilterRequest) -> Result<Vec<CleaningAreaAnalytics>> {
        self.serve(Report::Areas, principal, |scope| async move {
            let filter = self.normalizer.normalize_filter(filter);
            self.areas.run(&scope, &filter).await
        })
        .await
    }

    /// Driver KPI table
    pub async fn drivers(&self, principal: &Principal, filter: FilterRequest) -> Result<Vec<DriverKpi>> {
        self.serve(Report::Drivers, principal, |scope| async move {
            let filter = self.normalizer.normalize_filter(filter);
            self.kpi.drivers(&scope, &filter).await
        })
        .await
    }

    /// Vehicle KPI table
    pub async fn vehicles(&self, principal: &Principal, filter: FilterRequest) -> Result<Vec<VehicleKpi>> {
        self.serve(Report::Vehicles, principal, |scope| async move {
            let filter = self.normalizer.normalize_filter(filter);
            self.kpi.vehicles(&scope, &filter).await
        })
        .await
    }

    /// City-wide camera and sensor telemetry
    pub async fn technical(&self, principal: &Principal, range: RangeRequest) -> Result<TechnicalAnalytics> {
        self.serve(Report::Technical, principal, |_scope| async move {
            let range = self.normalizer.normalize(range);
            self.technical.run(&range).await
        })
        .await
    }

    async fn serve<T, F, Fut>(&self, report: Report, principal: &Principal, body: F) -> Result<T>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();

        let result = match self.authorize(report, principal).await {
            Ok(scope) => {
                debug!(report = %report, scope = scope.as_str(), "Running report");
                body(scope).await
            }
            Err(e) => Err(e),
        };

        let outcome = outcome_label(&result);
        let elapsed = started.elapsed();
        metrics::counter!("haulscope_reports_total", "report" => report.as_str(), "outcome" => outcome)
            .increment(1);
        metrics::histogram!("haulscope_report_duration_seconds", "report" => report.as_str())
            .record(elapsed.as_secs_f64());

        debug!(
            report = %report,
            outcome,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Report finished"
        );

        result
    }
}

fn outcome_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(Error::PermissionDenied) => "denied",
        Err(Error::NotFound { .. }) => "not_found",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&Ok::<_, Error>(())), "ok");
        assert_eq!(outcome_label::<()>(&Err(Error::PermissionDenied)), "denied");
        assert_eq!(outcome_label::<()>(&Err(Error::not_found("trip", "x"))), "not_found");
        assert_eq!(outcome_label::<()>(&Err(Error::internal("boom"))), "error");
    }
}
