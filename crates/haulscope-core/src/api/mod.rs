//! REST API implementation
//!
//! Read-only report endpoints under `/analytics`, all behind bearer token
//! authentication, plus an unauthenticated `/health`.

pub mod auth;
pub mod handlers;
pub mod response;
pub mod routes;

pub use handlers::AppState;
pub use response::Data;
pub use routes::create_router;

use std::future::Future;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};

/// HTTP API server
pub struct HttpServer {
    state: AppState,
    request_timeout: Duration,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            state,
            request_timeout,
        }
    }

    /// Router with tracing, deadline and CORS layers applied
    pub fn app(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Serve on `addr` until `shutdown` resolves, then drain in-flight requests
    pub async fn serve<F>(self, addr: &str, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.app();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("failed to bind {addr}: {e}")))?;

        info!(addr = %addr, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}
