//! # Initial State
//!
//! One-shot replay of a previous selection through the engine.
//!
//! The selection comes from the page query string when it carries
//! configuration (more than one parameter, or any `options`/field
//! parameter), and from the cached initial keys otherwise. Each target is
//! clicked with `Trigger::Restore`, so locks are honored exactly as for a
//! user. Targets that are already active are skipped. Targets refused
//! because they are still locked are retried once after the pass, so the
//! order of gated options in a URL does not matter.

use crate::engine::{CascadeReport, Configurator, Trigger};
use crate::primitives::OPTIONS_PARAM;
use crate::registry::OptionRegistry;
use crate::sync::{QueryString, split_codes};
use crate::{ControlId, ControlKey};
use serde::{Deserialize, Serialize};

/// Where the replayed selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreSource {
    Query,
    CachedKeys,
}

/// Controls to click, in replay order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    pub source: RestoreSource,
    pub targets: Vec<ControlId>,
    /// Codes, field values or keys that matched no control.
    pub unmatched: Vec<String>,
}

impl RestorePlan {
    /// Plan the replay for a query string and the cached keys.
    #[must_use]
    pub fn new(registry: &OptionRegistry, query: &QueryString, cached_keys: &[ControlKey]) -> Self {
        if carries_configuration(registry, query) {
            Self::from_query(registry, query)
        } else {
            Self::from_keys(registry, cached_keys)
        }
    }

    fn from_query(registry: &OptionRegistry, query: &QueryString) -> Self {
        let mut targets = Vec::new();
        let mut unmatched = Vec::new();
        for (name, value) in query.params() {
            if name == OPTIONS_PARAM {
                for code in split_codes(value) {
                    match registry.find_by_code(&code) {
                        Some(id) => targets.push(id),
                        None => unmatched.push(code),
                    }
                }
            } else if let Some(id) = registry.find_by_field_value(name, value) {
                targets.push(id);
            } else if is_field(registry, name) {
                unmatched.push(format!("{}={}", name, value));
            }
        }
        Self {
            source: RestoreSource::Query,
            targets,
            unmatched,
        }
    }

    fn from_keys(registry: &OptionRegistry, keys: &[ControlKey]) -> Self {
        let mut targets = Vec::new();
        let mut unmatched = Vec::new();
        for key in keys {
            match registry.find_by_key(key) {
                Some(id) => targets.push(id),
                None => unmatched.push(key.to_string()),
            }
        }
        Self {
            source: RestoreSource::CachedKeys,
            targets,
            unmatched,
        }
    }
}

fn is_field(registry: &OptionRegistry, name: &str) -> bool {
    registry.fields().iter().any(|f| f.as_str() == name)
}

fn carries_configuration(registry: &OptionRegistry, query: &QueryString) -> bool {
    query.len() > 1
        || query
            .params()
            .iter()
            .any(|(name, _)| name == OPTIONS_PARAM || is_field(registry, name))
}

/// Outcome of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub source: RestoreSource,
    pub cascades: Vec<CascadeReport>,
    /// Targets that were already active.
    pub skipped: Vec<ControlId>,
    /// Targets still locked after the retry.
    pub refused: Vec<ControlId>,
    pub unmatched: Vec<String>,
}

/// Replay a plan through the engine.
#[must_use]
pub fn replay(configurator: &mut Configurator, plan: RestorePlan) -> RestoreReport {
    let mut report = RestoreReport {
        source: plan.source,
        cascades: Vec::new(),
        skipped: Vec::new(),
        refused: Vec::new(),
        unmatched: plan.unmatched,
    };

    let mut deferred = Vec::new();
    for target in plan.targets {
        match click_once(configurator, target) {
            Outcome::Clicked(cascade) => report.cascades.push(cascade),
            Outcome::AlreadyActive => report.skipped.push(target),
            Outcome::Locked => deferred.push(target),
        }
    }

    for target in deferred {
        match click_once(configurator, target) {
            Outcome::Clicked(cascade) => report.cascades.push(cascade),
            Outcome::AlreadyActive => report.skipped.push(target),
            Outcome::Locked => report.refused.push(target),
        }
    }

    report
}

enum Outcome {
    Clicked(CascadeReport),
    AlreadyActive,
    Locked,
}

fn click_once(configurator: &mut Configurator, target: ControlId) -> Outcome {
    if configurator.state().is_active(target) {
        return Outcome::AlreadyActive;
    }
    match configurator.click(target, Trigger::Restore) {
        Ok(cascade) if cascade.refused() => Outcome::Locked,
        Ok(cascade) => Outcome::Clicked(cascade),
        // Plans only hold ids from the same registry.
        Err(_) => Outcome::Locked,
    }
}

// =============================================================================
// TESTS
// =============================================================================
