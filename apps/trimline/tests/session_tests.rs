//! Integration tests for product loading, the session cache and the
//! viewer-gated initial-state replay.

#![allow(clippy::unwrap_used, clippy::panic)]

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::RwLock;
use trimline::cli::{CommandContext, build_session, load_product};
use trimline::config::{AppConfig, ViewerConfig};
use trimline::viewer::{ReadinessFlag, restore_when_ready};
use trimline_core::{ControlKey, RestoreSource, SessionCache, TrimlineError};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn product_json(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "color-option-title": "Hull",
        "color-option-1-colors-1": [
            { "color-id": "white", "color-name": "White" },
            { "color-id": "navy", "color-name": "Navy" }
        ],
        "options": [
            { "title": "Radar", "button-id": "radar", "option-code": "R1" }
        ],
        "initial-colors-and-options": [
            { "initial-colors": [{ "color-id": "navy" }], "initial-options": [{ "button-id": "radar" }] }
        ]
    })
}

fn write_product(dir: &TempDir, id: u64) -> PathBuf {
    let path = dir.path().join(format!("product-{}.json", id));
    std::fs::write(&path, serde_json::to_vec(&product_json(id)).unwrap()).unwrap();
    path
}

fn context(product: Option<PathBuf>, cache: Option<PathBuf>, query: &str) -> CommandContext {
    CommandContext {
        config: AppConfig::default(),
        product,
        cache,
        query: query.to_string(),
        json_mode: false,
        verbose: false,
    }
}

// =============================================================================
// PRODUCT LOADING
// =============================================================================

#[test]
fn test_load_without_cache_uses_preset_keys() {
    let dir = TempDir::new().unwrap();
    let ctx = context(Some(write_product(&dir, 7)), None, "");

    let loaded = load_product(&ctx).unwrap();

    assert_eq!(loaded.product.id.as_deref(), Some("7"));
    assert_eq!(
        loaded.initial_keys,
        vec![ControlKey::new("navy"), ControlKey::new("radar")]
    );
}

#[test]
fn test_missing_product_is_an_error() {
    let ctx = context(None, None, "id=7");
    assert!(matches!(
        load_product(&ctx),
        Err(TrimlineError::InvalidProduct(_))
    ));
}

#[test]
fn test_invalid_product_json_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let ctx = context(Some(path), None, "");
    assert!(matches!(
        load_product(&ctx),
        Err(TrimlineError::InvalidProduct(_))
    ));
}

#[test]
fn test_cached_product_is_served_without_file() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("cache.redb");

    let first = context(Some(write_product(&dir, 7)), Some(cache_path.clone()), "id=7");
    load_product(&first).unwrap();

    let second = context(None, Some(cache_path.clone()), "id=7");
    let loaded = load_product(&second).unwrap();
    assert_eq!(loaded.product.id.as_deref(), Some("7"));
    assert_eq!(loaded.initial_keys.len(), 2);

    let cache = SessionCache::open(&cache_path).unwrap();
    assert_eq!(cache.current_product().unwrap().as_deref(), Some("7"));
}

#[test]
fn test_switching_product_drops_cached_entries() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("cache.redb");

    load_product(&context(
        Some(write_product(&dir, 7)),
        Some(cache_path.clone()),
        "id=7",
    ))
    .unwrap();
    load_product(&context(
        Some(write_product(&dir, 8)),
        Some(cache_path.clone()),
        "id=8",
    ))
    .unwrap();

    let cache = SessionCache::open(&cache_path).unwrap();
    assert_eq!(cache.current_product().unwrap().as_deref(), Some("8"));
    assert!(cache.load_product("7").unwrap().is_none());
    assert!(cache.load_product("8").unwrap().is_some());
}

// =============================================================================
// VIEWER-GATED RESTORE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_restore_runs_after_viewer_ready() {
    let dir = TempDir::new().unwrap();
    let ctx = context(Some(write_product(&dir, 7)), None, "id=7");
    let (session, keys) = build_session(&ctx).unwrap();
    let session = Arc::new(RwLock::new(session));
    let flag = ReadinessFlag::new();
    flag.set_ready();

    let report = restore_when_ready(
        session.clone(),
        flag,
        ViewerConfig::default(),
        "https://boats.example.com/".to_string(),
        keys,
    )
    .await
    .unwrap();

    assert_eq!(report.source, RestoreSource::CachedKeys);
    let session = session.read().await;
    assert!(session.is_restored());
    let outputs = session.configurator().outputs();
    assert_eq!(outputs.form_value("tab-1-color-1"), Some("Hull: Navy"));
    assert_eq!(outputs.query().get("options"), Some("R1"));
}

#[tokio::test(start_paused = true)]
async fn test_restore_proceeds_after_timeout() {
    let dir = TempDir::new().unwrap();
    let ctx = context(Some(write_product(&dir, 7)), None, "id=7&options=R1");
    let (session, keys) = build_session(&ctx).unwrap();
    let session = Arc::new(RwLock::new(session));

    let started = tokio::time::Instant::now();
    let report = restore_when_ready(
        session.clone(),
        ReadinessFlag::new(),
        ViewerConfig::default(),
        "https://boats.webflow.io/".to_string(),
        keys,
    )
    .await
    .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(600 + 500));
    assert_eq!(report.source, RestoreSource::Query);
    let session = session.read().await;
    assert_eq!(
        session.configurator().outputs().form_value("tab-1-color-1"),
        Some("")
    );
}
