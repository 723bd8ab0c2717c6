//! API routes

use axum::{middleware, routing::get, Router};

use super::auth::require_principal;
use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let analytics = Router::new()
        .route("/dashboard", get(handlers::dashboard))
        .route("/trips", get(handlers::trips))
        .route("/trips/:id", get(handlers::trip_details))
        .route("/violations", get(handlers::violations))
        .route("/performance", get(handlers::performance))
        .route("/contracts", get(handlers::contracts))
        .route("/areas", get(handlers::areas))
        .route("/drivers", get(handlers::drivers))
        .route("/vehicles", get(handlers::vehicles))
        .route("/technical", get(handlers::technical))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_principal));

    Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Reports
        .nest("/analytics", analytics)
        .with_state(state)
}
