//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trimline_core::{
    CascadeReport, Configurator, ControlId, ControlKind, FieldChange, NavCommand, PagerView,
    SelectionSnapshot,
};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATE RESPONSE
// =============================================================================

/// The current selection as the page sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub product_id: Option<String>,
    pub restored: bool,
    pub technical_data: Option<String>,
    /// Hidden form fields.
    pub form: BTreeMap<String, String>,
    /// Encoded query string, without the leading `?`.
    pub query: String,
    pub snapshot: SelectionSnapshot,
    pub pager: PagerView,
}

// =============================================================================
// CONTROLS RESPONSE
// =============================================================================

/// One control and its live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlJson {
    pub key: String,
    pub kind: ControlKind,
    pub label: String,
    pub group: String,
    pub field: String,
    pub code: Option<String>,
    pub active: bool,
    pub locked: bool,
    pub marked_inactive: bool,
}

/// All controls in registry order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlsResponse {
    pub controls: Vec<ControlJson>,
}

impl ControlsResponse {
    #[must_use]
    pub fn from_configurator(configurator: &Configurator) -> Self {
        let registry = configurator.registry();
        let state = configurator.state();
        let controls = registry
            .controls()
            .map(|c| ControlJson {
                key: c.key.to_string(),
                kind: c.kind,
                label: c.label.clone(),
                group: registry.group_of(c.id).label.clone(),
                field: c.binding.field.to_string(),
                code: c.code.clone(),
                active: state.is_active(c.id),
                locked: state.is_locked(c.id),
                marked_inactive: state.is_marked_inactive(c.id),
            })
            .collect();
        Self { controls }
    }
}

// =============================================================================
// CLICK REQUEST/RESPONSE
// =============================================================================

/// Click a control by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickRequest {
    pub key: String,
}

/// Outcome of a click.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickResponse {
    pub success: bool,
    /// `true` when the control was locked and nothing changed.
    pub refused: bool,
    pub activated: Vec<String>,
    pub released: Vec<String>,
    pub field_changes: Vec<FieldChange>,
    pub query: Option<String>,
    pub error: Option<String>,
}

impl ClickResponse {
    pub fn success(configurator: &Configurator, report: &CascadeReport) -> Self {
        let registry = configurator.registry();
        let keys = |ids: Vec<ControlId>| -> Vec<String> {
            ids.into_iter()
                .map(|id| registry.control(id).key.to_string())
                .collect()
        };
        Self {
            success: true,
            refused: report.refused(),
            activated: keys(report.activated()),
            released: keys(report.released()),
            field_changes: report.field_changes.clone(),
            query: Some(configurator.outputs().query().to_string()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            refused: false,
            activated: Vec::new(),
            released: Vec::new(),
            field_changes: Vec::new(),
            query: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// NAV REQUEST/RESPONSE
// =============================================================================

/// Navigation request: `{"action": "next"}` or `{"action": "jump", "page": 2}`.
pub type NavRequest = NavCommand;

/// Navigation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavResponse {
    pub success: bool,
    pub moved: bool,
    pub pager: Option<PagerView>,
    pub error: Option<String>,
}

impl NavResponse {
    pub fn success(moved: bool, pager: PagerView) -> Self {
        Self {
            success: true,
            moved,
            pager: Some(pager),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            moved: false,
            pager: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// VIEWER RESPONSE
// =============================================================================

/// Acknowledges a viewer readiness signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerReadyResponse {
    /// `false` when the viewer had already reported readiness.
    pub accepted: bool,
}

// =============================================================================
// LEAD RESPONSE
// =============================================================================

/// Lead form payload, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadResponse {
    pub success: bool,
    pub fields: Vec<(String, String)>,
    pub error: Option<String>,
}

impl LeadResponse {
    pub fn success(fields: Vec<(String, String)>) -> Self {
        Self {
            success: true,
            fields,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: Vec::new(),
            error: Some(msg.into()),
        }
    }
}
