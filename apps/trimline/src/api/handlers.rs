//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        ClickRequest, ClickResponse, ControlsResponse, HealthResponse, LeadResponse, NavRequest,
        NavResponse, StateResponse, ViewerReadyResponse,
    },
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use trimline_core::{ControlKey, TrimlineError};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATE HANDLER
// =============================================================================

/// Get the current selection, form and query string.
pub async fn state_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let configurator = session.configurator();
    let outputs = configurator.outputs();

    let response = StateResponse {
        product_id: session.product_id().map(str::to_string),
        restored: session.is_restored(),
        technical_data: session.technical_data().map(str::to_string),
        form: outputs
            .form()
            .iter()
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect(),
        query: outputs.query().to_string(),
        snapshot: configurator.snapshot(),
        pager: session.pager_view(),
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// CONTROLS HANDLER
// =============================================================================

/// List every control with its live state.
pub async fn controls_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    (
        StatusCode::OK,
        Json(ControlsResponse::from_configurator(session.configurator())),
    )
}

// =============================================================================
// CLICK HANDLER
// =============================================================================

/// Click a control as the user. The whole cascade runs under one write lock.
pub async fn click_handler(
    State(state): State<AppState>,
    Json(request): Json<ClickRequest>,
) -> impl IntoResponse {
    if request.key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ClickResponse::error("Control key must not be empty")),
        );
    }

    let mut session = state.session.write().await;
    match session.click(&ControlKey::new(request.key)) {
        Ok(report) => {
            if report.refused() {
                tracing::debug!(control = ?report.origin, "Click refused on locked control");
            }
            (
                StatusCode::OK,
                Json(ClickResponse::success(session.configurator(), &report)),
            )
        }
        Err(e @ TrimlineError::UnknownControl(_)) => (
            StatusCode::NOT_FOUND,
            Json(ClickResponse::error(format!("Click failed: {}", e))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ClickResponse::error(format!("Click failed: {}", e))),
        ),
    }
}

// =============================================================================
// NAV HANDLER
// =============================================================================

/// Move the page navigation.
pub async fn nav_handler(
    State(state): State<AppState>,
    Json(request): Json<NavRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    match session.navigate(request) {
        Ok(moved) => (
            StatusCode::OK,
            Json(NavResponse::success(moved, session.pager_view())),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(NavResponse::error(format!("Navigation failed: {}", e))),
        ),
    }
}

// =============================================================================
// VIEWER HANDLER
// =============================================================================

/// The embedded viewer reports that it has loaded.
pub async fn viewer_ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let accepted = state.viewer.set_ready();
    if accepted {
        tracing::info!("Viewer readiness reported");
    }
    (StatusCode::OK, Json(ViewerReadyResponse { accepted }))
}

// =============================================================================
// LEAD HANDLER
// =============================================================================

/// The lead form payload for the current selection.
pub async fn lead_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.configurator().lead_payload(&state.page_url) {
        Ok(fields) => (StatusCode::OK, Json(LeadResponse::success(fields))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LeadResponse::error(format!("Lead payload failed: {}", e))),
        ),
    }
}
