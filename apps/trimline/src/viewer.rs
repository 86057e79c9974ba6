//! # Viewer Readiness
//!
//! The embedded 3D viewer reports readiness through a boolean flag. The flag
//! is polled on a fixed interval and the poll is raced against a timeout;
//! exactly one of the two outcomes is produced. A timeout is not fatal: the
//! initial selection is replayed either way.

use crate::config::ViewerConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use trimline_core::{ControlKey, RestoreReport, Session};

/// How the readiness wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerSignal {
    Loaded,
    TimedOut,
}

/// Shared readiness flag, set by whoever hosts the viewer.
#[derive(Debug, Clone, Default)]
pub struct ReadinessFlag(Arc<AtomicBool>);

impl ReadinessFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the viewer as loaded. Returns `false` if it already was.
    pub fn set_ready(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Poll `flag` every `interval` until it is set or `timeout` elapses.
pub async fn wait_for_viewer(
    flag: &ReadinessFlag,
    interval: Duration,
    timeout: Duration,
) -> ViewerSignal {
    // The first probe comes one interval in, not immediately.
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = ticker.tick() => {
                if flag.is_ready() {
                    return ViewerSignal::Loaded;
                }
            }
            () = &mut deadline => return ViewerSignal::TimedOut,
        }
    }
}

/// Wait for the viewer, let it settle, then replay the initial selection.
///
/// Returns `None` when the session had already been restored.
pub async fn restore_when_ready(
    session: Arc<RwLock<Session>>,
    flag: ReadinessFlag,
    config: ViewerConfig,
    page_url: String,
    cached_keys: Vec<ControlKey>,
) -> Option<RestoreReport> {
    let timeout = config.timeout_for(&page_url);
    let signal = wait_for_viewer(&flag, config.poll_interval(), timeout).await;
    match signal {
        ViewerSignal::Loaded => tracing::info!("Viewer loaded"),
        ViewerSignal::TimedOut => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Viewer readiness timed out")
        }
    }

    tokio::time::sleep(config.settle()).await;

    let mut session = session.write().await;
    let report = session.apply_initial_state(&cached_keys)?;
    tracing::info!(
        source = ?report.source,
        cascades = report.cascades.len(),
        skipped = report.skipped.len(),
        refused = report.refused.len(),
        "Initial state applied"
    );
    for code in &report.unmatched {
        tracing::warn!(code = %code, "Initial selection entry matched no control");
    }
    Some(report)
}

// =============================================================================
// TESTS
// =============================================================================
