//! # Haulscope
//!
//! Role-scoped analytics over municipal haulage operations.
//!
//! Haulscope reads trips, tickets, contracts and camera telemetry from the
//! operational PostgreSQL database and serves aggregated reports. Every report
//! is filtered by the caller's scope: the city sees everything, a regional
//! authority sees its own tickets and its contractors, a contractor sees only
//! its own work and the technical operator sees only camera telemetry.
//!
//! ## Architecture
//!
//! - **Analytics**: scope resolution, range normalization, relation
//!   availability and one aggregator per report
//! - **Service**: eligibility table and per-request orchestration
//! - **API**: REST endpoints under `/analytics` behind bearer tokens
//! - **DB**: connection pool, catalog lookup and organization directory
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API
//! DB_DSN=postgres://localhost/haul JWT_ACCESS_SECRET=dev haulscope serve
//!
//! # List the relations the reports can use
//! haulscope relations
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::analytics::{DataAvailability, OrgDirectory, Source};
    pub use crate::auth::{JwtVerifier, TokenVerifier};
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::service::{AnalyticsService, Report};
}
