//! # Trimline HTTP API Module
//!
//! This module serves one configurator session over HTTP using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /state` - Form fields, query string and navigation view
//! - `GET /controls` - Every control with its live state
//! - `POST /click` - Click a control by key
//! - `POST /nav` - Step or jump the page navigation
//! - `POST /viewer/ready` - The 3D viewer reports readiness
//! - `GET /lead` - Lead form payload
//!
//! ## Configuration (Environment Variables)
//!
//! - `TRIMLINE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `trimline::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    click_handler, controls_handler, health_handler, lead_handler, nav_handler, state_handler,
    viewer_ready_handler,
};
#[allow(unused_imports)]
pub use types::{
    ClickRequest, ClickResponse, ControlJson, ControlsResponse, HealthResponse, LeadResponse,
    NavRequest, NavResponse, StateResponse, ViewerReadyResponse,
};

use crate::viewer::ReadinessFlag;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use trimline_core::{Session, TrimlineError};

/// Maximum request body size (64 KB).
const MAX_BODY_SIZE: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the configurator session.
#[derive(Clone)]
pub struct AppState {
    /// The session; every cascade runs under one write lock.
    pub session: Arc<RwLock<Session>>,
    /// Set once the embedded viewer has loaded.
    pub viewer: ReadinessFlag,
    /// URL of the product page, used for the lead `link` field.
    pub page_url: String,
}

impl AppState {
    /// Create new app state with a session.
    #[must_use]
    pub fn new(session: Session, page_url: impl Into<String>) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            viewer: ReadinessFlag::new(),
            page_url: page_url.into(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `TRIMLINE_CORS_ORIGINS`:
/// - If "*": allows all origins
/// - If not set: defaults to localhost only
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("TRIMLINE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (TRIMLINE_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in TRIMLINE_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No TRIMLINE_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit.
pub fn create_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/state", get(handlers::state_handler))
        .route("/controls", get(handlers::controls_handler))
        .route("/click", post(handlers::click_handler))
        .route("/nav", post(handlers::nav_handler))
        .route("/viewer/ready", post(handlers::viewer_ready_handler))
        .route("/lead", get(handlers::lead_handler))
        .layer(middleware)
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), TrimlineError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TrimlineError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Trimline session server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| TrimlineError::IoError(format!("Server error: {}", e)))
}
