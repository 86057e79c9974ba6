//! Integration tests for the Trimline HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use trimline::api::{
    AppState, ClickRequest, ClickResponse, ControlsResponse, HealthResponse, LeadResponse,
    NavResponse, StateResponse, ViewerReadyResponse, create_router,
};
use trimline_core::{ProductData, QueryString, Session, SessionOptions};

const PAGE_URL: &str = "https://boats.example.com/model";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn product() -> ProductData {
    serde_json::from_value(json!({
        "id": 7,
        "color-option-title": "Hull",
        "color-option-1-colors-1": [
            { "color-id": "white", "color-name": "White" },
            { "color-id": "navy", "color-name": "Navy" }
        ],
        "options": [
            { "title": "Radar", "button-id": "radar", "option-code": "R1" },
            {
                "title": "Sonar", "button-id": "sonar", "option-code": "S1",
                "activator-option": [{ "button-id": "radar" }]
            }
        ],
        "technical-data-2": "Length: 7.2 m"
    }))
    .unwrap()
}

fn create_state() -> AppState {
    let session = Session::from_product(
        &product(),
        QueryString::parse("id=7"),
        SessionOptions::default(),
    )
    .unwrap();
    AppState::new(session, PAGE_URL)
}

/// Create a test server with a fresh session.
fn create_test_server() -> TestServer {
    TestServer::new(create_router(create_state())).unwrap()
}

async fn click(server: &TestServer, key: &str) -> ClickResponse {
    let response = server
        .post("/click")
        .json(&ClickRequest {
            key: key.to_string(),
        })
        .await;
    response.assert_status_ok();
    response.json()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// STATE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_state_starts_empty() {
    let server = create_test_server();

    let response = server.get("/state").await;

    response.assert_status_ok();
    let state: StateResponse = response.json();
    assert_eq!(state.product_id.as_deref(), Some("7"));
    assert!(!state.restored);
    assert_eq!(state.technical_data.as_deref(), Some("Length: 7.2 m"));
    assert_eq!(state.query, "id=7");
    assert_eq!(state.form.get("tab-1-color-1").map(String::as_str), Some(""));
    assert!(state.snapshot.options.is_empty());
    assert_eq!(state.pager.current, 0);
    assert!(state.pager.prev_hidden);
}

// =============================================================================
// CONTROLS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_controls_report_gate_locks() {
    let server = create_test_server();

    let response = server.get("/controls").await;

    response.assert_status_ok();
    let controls: ControlsResponse = response.json();
    assert_eq!(controls.controls.len(), 4);
    let sonar = controls
        .controls
        .iter()
        .find(|c| c.key == "sonar")
        .unwrap();
    assert!(sonar.locked);
    assert!(!sonar.active);
    assert_eq!(sonar.code.as_deref(), Some("S1"));
}

// =============================================================================
// CLICK ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_click_updates_form_and_query() {
    let server = create_test_server();

    let result = click(&server, "white").await;
    assert!(result.success);
    assert!(!result.refused);
    assert_eq!(result.activated, vec!["white".to_string()]);
    assert_eq!(result.query.as_deref(), Some("id=7&tab-1-color-1=Hull%3A+White"));

    let result = click(&server, "navy").await;
    assert_eq!(result.released, vec!["white".to_string()]);

    let state: StateResponse = server.get("/state").await.json();
    assert_eq!(
        state.form.get("tab-1-color-1").map(String::as_str),
        Some("Hull: Navy")
    );
}

#[tokio::test]
async fn test_click_unlocks_gated_option() {
    let server = create_test_server();

    let refused = click(&server, "sonar").await;
    assert!(refused.success);
    assert!(refused.refused);
    assert!(refused.activated.is_empty());

    click(&server, "radar").await;
    let result = click(&server, "sonar").await;
    assert!(!result.refused);
    assert_eq!(result.query.as_deref(), Some("id=7&options=R1-S1"));
}

#[tokio::test]
async fn test_click_unknown_control() {
    let server = create_test_server();

    let response = server
        .post("/click")
        .json(&json!({ "key": "anchor" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let result: ClickResponse = response.json();
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_click_empty_key() {
    let server = create_test_server();

    let response = server
        .post("/click")
        .json(&json!({ "key": "" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// NAV ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_nav_steps_and_jumps() {
    let server = create_test_server();

    let response = server.post("/nav").json(&json!({ "action": "next" })).await;
    response.assert_status_ok();
    let nav: NavResponse = response.json();
    assert!(nav.moved);
    assert_eq!(nav.pager.as_ref().map(|p| p.current), Some(1));

    let response = server
        .post("/nav")
        .json(&json!({ "action": "jump", "page": 2 }))
        .await;
    let nav: NavResponse = response.json();
    let pager = nav.pager.unwrap();
    assert_eq!(pager.label, "Summary");
    assert!(pager.next_hidden);
    assert_eq!(pager.indicator, "3 of 3");
}

#[tokio::test]
async fn test_nav_jump_out_of_range() {
    let server = create_test_server();

    let response = server
        .post("/nav")
        .json(&json!({ "action": "jump", "page": 9 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let nav: NavResponse = response.json();
    assert!(!nav.success);
}

// =============================================================================
// VIEWER ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_viewer_ready_is_accepted_once() {
    let state = create_state();
    let flag = state.viewer.clone();
    let server = TestServer::new(create_router(state)).unwrap();

    let first: ViewerReadyResponse = server.post("/viewer/ready").await.json();
    let second: ViewerReadyResponse = server.post("/viewer/ready").await.json();

    assert!(first.accepted);
    assert!(!second.accepted);
    assert!(flag.is_ready());
}

// =============================================================================
// LEAD ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_lead_payload_carries_link() {
    let server = create_test_server();
    click(&server, "radar").await;

    let response = server.get("/lead").await;

    response.assert_status_ok();
    let lead: LeadResponse = response.json();
    assert!(lead.success);
    let field = |name: &str| {
        lead.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(field("option-1").as_deref(), Some("Radar (R1)"));
    assert_eq!(field("option-2").as_deref(), Some(""));
    assert_eq!(
        field("link").as_deref(),
        Some("https://boats.example.com/model?id=7&options=R1")
    );
    assert_eq!(field("screen").as_deref(), Some("placeholder"));
}
