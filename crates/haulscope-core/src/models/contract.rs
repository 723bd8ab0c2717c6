//! Contract progress and outcome

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where "now" falls relative to the contract window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    /// Window has not started
    Planned,
    /// Inside the window (both ends inclusive)
    Active,
    /// Window has ended
    Expired,
}

impl ContractStatus {
    /// Derive the status of a `[start, end]` window at `now`
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            ContractStatus::Planned
        } else if now > end {
            ContractStatus::Expired
        } else {
            ContractStatus::Active
        }
    }
}

/// Outcome of an expired contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractResult {
    /// Not decided yet
    None,
    /// Minimal volume reached
    Success,
    /// Minimal volume missed
    Fail,
}

impl ContractResult {
    /// Only expired contracts have an outcome
    pub fn evaluate(status: ContractStatus, total_volume: f64, minimal_volume: f64) -> Self {
        match status {
            ContractStatus::Planned | ContractStatus::Active => ContractResult::None,
            ContractStatus::Expired if total_volume >= minimal_volume => ContractResult::Success,
            ContractStatus::Expired => ContractResult::Fail,
        }
    }
}

/// Budget and volume progress of one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractProgress {
    /// Contract identifier
    pub contract_id: Uuid,
    /// Contract title
    pub name: String,
    /// Contractor doing the work
    pub contractor_id: Uuid,
    /// Contractor display name
    pub contractor_name: String,
    /// Agreed budget
    pub budget_total: f64,
    /// Cost booked so far
    pub total_cost: f64,
    /// `total_cost / budget_total`
    pub budget_progress: f64,
    /// Volume the contractor must deliver, m3
    #[serde(rename = "minimal_volume_m3")]
    pub minimal_volume: f64,
    /// Volume delivered so far, m3
    #[serde(rename = "total_volume_m3")]
    pub total_volume: f64,
    /// `total_volume / minimal_volume`
    pub volume_progress: f64,
    /// Window status at evaluation time
    #[serde(rename = "ui_status")]
    pub status: ContractStatus,
    /// Outcome once expired
    pub result: ContractResult,
    /// Window start, inclusive
    pub start_at: DateTime<Utc>,
    /// Window end, inclusive
    pub end_at: DateTime<Utc>,
}

impl ContractProgress {
    /// Expired without reaching the minimal volume
    pub fn is_at_risk(&self) -> bool {
        self.status == ContractStatus::Expired && self.result == ContractResult::Fail
    }

    /// Spent more than the budget
    pub fn is_over_budget(&self) -> bool {
        self.budget_progress > 1.0
    }
}

/// Contract portfolio with its derived subsets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractAnalytics {
    /// Every visible contract, newest first
    pub summary: Vec<ContractProgress>,
    /// Highest budget progress first
    pub top_budget: Vec<ContractProgress>,
    /// Expired contracts that missed their minimal volume
    pub at_risk: Vec<ContractProgress>,
    /// Contracts over budget
    pub budget_issues: Vec<ContractProgress>,
}
