//! Contract budget and volume progress

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::compute::ratio;
use super::predicate::{push_scope, OwnerColumns};
use super::{Relation, Source};
use crate::error::Result;
use crate::models::{ContractAnalytics, ContractProgress, ContractResult, ContractStatus, Scope};

#[derive(Debug, FromRow)]
struct ContractRow {
    contract_id: Uuid,
    name: String,
    contractor_id: Uuid,
    contractor_name: String,
    budget_total: f64,
    total_cost: f64,
    minimal_volume: f64,
    total_volume: f64,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
}

impl ContractRow {
    fn into_progress(self, now: DateTime<Utc>) -> ContractProgress {
        let status = ContractStatus::at(self.start_at, self.end_at, now);
        ContractProgress {
            contract_id: self.contract_id,
            name: self.name,
            contractor_id: self.contractor_id,
            contractor_name: self.contractor_name,
            budget_total: self.budget_total,
            total_cost: self.total_cost,
            budget_progress: ratio(self.total_cost, self.budget_total),
            minimal_volume: self.minimal_volume,
            total_volume: self.total_volume,
            volume_progress: ratio(self.total_volume, self.minimal_volume),
            status,
            result: ContractResult::evaluate(status, self.total_volume, self.minimal_volume),
            start_at: self.start_at,
            end_at: self.end_at,
        }
    }
}

fn progress_query(scope: &Scope) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT c.id AS contract_id,
               c.name,
               c.contractor_id,
               COALESCE(org.name, 'Contractor') AS contractor_name,
               COALESCE(c.budget_total, 0)::DOUBLE PRECISION AS budget_total,
               COALESCE(u.total_cost, 0)::DOUBLE PRECISION AS total_cost,
               COALESCE(c.minimal_volume_m3, 0)::DOUBLE PRECISION AS minimal_volume,
               COALESCE(u.total_volume_m3, 0)::DOUBLE PRECISION AS total_volume,
               c.start_at,
               c.end_at
        FROM contracts c
        LEFT JOIN contract_usage u ON u.contract_id = c.id
        LEFT JOIN organizations org ON org.id = c.contractor_id
        WHERE TRUE"#,
    );
    push_scope(&mut qb, scope, OwnerColumns::Contracts);
    qb.push(" ORDER BY c.start_at DESC, c.id");
    qb
}

/// Every visible contract with status and result evaluated at `now`.
///
/// Shared with the dashboard, which shows progress without the derived lists.
pub(super) async fn contract_progress(source: &Source, scope: &Scope, now: DateTime<Utc>) -> Result<Vec<ContractProgress>> {
    if !scope.sees_operational_data()
        || !source
            .ready(&[Relation::Contracts, Relation::Organizations, Relation::ContractUsage])
            .await
    {
        return Ok(Vec::new());
    }

    let rows = progress_query(scope)
        .build_query_as::<ContractRow>()
        .fetch_all(source.pool())
        .await?;

    Ok(rows.into_iter().map(|row| row.into_progress(now)).collect())
}

/// Reads contract progress within a scope
#[derive(Clone)]
pub struct ContractAggregator {
    source: Source,
    top_limit: usize,
}

impl ContractAggregator {
    /// Create an aggregator; derived subsets keep at most `top_limit` entries
    pub fn new(source: Source, top_limit: usize) -> Self {
        Self { source, top_limit }
    }

    /// Contract portfolio with its derived subsets
    pub async fn run(&self, scope: &Scope, now: DateTime<Utc>) -> Result<ContractAnalytics> {
        let summary = contract_progress(&self.source, scope, now).await?;
        Ok(derive_subsets(summary, self.top_limit))
    }
}

fn by_budget_desc(a: &ContractProgress, b: &ContractProgress) -> Ordering {
    b.budget_progress
        .total_cmp(&a.budget_progress)
        .then(a.contract_id.cmp(&b.contract_id))
}

/// Build the top-by-budget, at-risk and over-budget lists from `summary`
pub fn derive_subsets(summary: Vec<ContractProgress>, limit: usize) -> ContractAnalytics {
    let mut top_budget = summary.clone();
    top_budget.sort_by(by_budget_desc);
    top_budget.truncate(limit);

    let mut at_risk: Vec<_> = summary.iter().filter(|c| c.is_at_risk()).cloned().collect();
    at_risk.sort_by(|a, b| {
        a.volume_progress
            .total_cmp(&b.volume_progress)
            .then(a.contract_id.cmp(&b.contract_id))
    });
    at_risk.truncate(limit);

    let mut budget_issues: Vec<_> = summary.iter().filter(|c| c.is_over_budget()).cloned().collect();
    budget_issues.sort_by(by_budget_desc);
    budget_issues.truncate(limit);

    ContractAnalytics {
        summary,
        top_budget,
        at_risk,
        budget_issues,
    }
}
