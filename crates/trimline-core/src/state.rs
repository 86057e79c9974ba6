//! # Selection State
//!
//! Per-control state, kept apart from the registry.
//!
//! Each control carries:
//! - an explicit `Activation` (never encoded in its identity)
//! - a set of `LockReason`s; the control is locked iff the set is non-empty
//! - a mutual-exclusion marking count (visual only, never locks)
//! - the sequence number of its latest activation, which orders the
//!   `options` query aggregate
//!
//! Setting a control to the state it already has is a no-op that reports
//! `false`, so callers can tell real transitions from re-application.

use crate::registry::OptionRegistry;
use crate::{ControlId, GroupId, Relation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether a control is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Inactive,
    Active,
}

impl Activation {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Activation::Active)
    }
}

/// Why a control is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", content = "source", rename_all = "snake_case")]
pub enum LockReason {
    /// Waiting for an `activated_by` source.
    Gate,
    /// Locked by a `deactivates` edge of the given control.
    Deactivated(ControlId),
    /// Locked by a `color_filter` of the given control.
    Filtered(ControlId),
}

/// State of one control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    pub activation: Activation,
    pub locks: BTreeSet<LockReason>,
    /// Number of active options marking this control inactive-visual.
    pub marked: usize,
    /// Sequence number of the latest activation (0 = never).
    pub activated_at: u64,
}

impl ControlState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        !self.locks.is_empty()
    }

    #[must_use]
    pub fn is_marked_inactive(&self) -> bool {
        self.marked > 0
    }
}

/// State table for every control of a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    controls: Vec<ControlState>,
    sequence: u64,
}

impl SelectionState {
    /// Initial state for a registry: nothing active, gated options locked.
    #[must_use]
    pub fn initial(registry: &OptionRegistry) -> Self {
        let controls = registry
            .controls()
            .map(|control| {
                let mut state = ControlState::default();
                if control.has(Relation::ActivatedBy) {
                    state.locks.insert(LockReason::Gate);
                }
                state
            })
            .collect();
        Self {
            controls,
            sequence: 0,
        }
    }

    /// State of one control.
    ///
    /// Unknown ids read as the default (inactive, unlocked) state.
    #[must_use]
    pub fn get(&self, id: ControlId) -> ControlState {
        self.controls.get(id.0).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_active(&self, id: ControlId) -> bool {
        self.controls.get(id.0).is_some_and(ControlState::is_active)
    }

    #[must_use]
    pub fn is_locked(&self, id: ControlId) -> bool {
        self.controls.get(id.0).is_some_and(ControlState::is_locked)
    }

    #[must_use]
    pub fn is_marked_inactive(&self, id: ControlId) -> bool {
        self.controls
            .get(id.0)
            .is_some_and(ControlState::is_marked_inactive)
    }

    #[must_use]
    pub fn activated_at(&self, id: ControlId) -> u64 {
        self.controls.get(id.0).map_or(0, |s| s.activated_at)
    }

    /// Active member of a group, if any.
    #[must_use]
    pub fn active_in(&self, registry: &OptionRegistry, group: GroupId) -> Option<ControlId> {
        registry
            .groups()
            .get(group.0)?
            .members
            .iter()
            .copied()
            .find(|&m| self.is_active(m))
    }

    /// All active controls, in registry order.
    #[must_use]
    pub fn active(&self) -> Vec<ControlId> {
        self.controls
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_active())
            .map(|(i, _)| ControlId(i))
            .collect()
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Activate a control. Returns `false` if it was already active.
    pub fn activate(&mut self, id: ControlId) -> bool {
        self.sequence = self.sequence.saturating_add(1);
        let sequence = self.sequence;
        match self.controls.get_mut(id.0) {
            Some(state) if !state.is_active() => {
                state.activation = Activation::Active;
                state.activated_at = sequence;
                true
            }
            _ => false,
        }
    }

    /// Deactivate a control. Returns `false` if it was already inactive.
    pub fn deactivate(&mut self, id: ControlId) -> bool {
        match self.controls.get_mut(id.0) {
            Some(state) if state.is_active() => {
                state.activation = Activation::Inactive;
                true
            }
            _ => false,
        }
    }

    /// Add a lock reason. Returns `true` if the control was unlocked before.
    pub fn lock(&mut self, id: ControlId, reason: LockReason) -> bool {
        match self.controls.get_mut(id.0) {
            Some(state) => {
                let was_unlocked = state.locks.is_empty();
                state.locks.insert(reason);
                was_unlocked
            }
            None => false,
        }
    }

    /// Remove a lock reason. Returns `true` if the control became unlocked.
    pub fn unlock(&mut self, id: ControlId, reason: LockReason) -> bool {
        match self.controls.get_mut(id.0) {
            Some(state) => state.locks.remove(&reason) && state.locks.is_empty(),
            None => false,
        }
    }

    /// Remove every lock reason matching the predicate.
    ///
    /// Returns the controls that became unlocked.
    pub fn unlock_where<F>(&mut self, mut predicate: F) -> Vec<ControlId>
    where
        F: FnMut(ControlId, &LockReason) -> bool,
    {
        let mut released = Vec::new();
        for (index, state) in self.controls.iter_mut().enumerate() {
            let id = ControlId(index);
            let before = state.locks.len();
            state.locks.retain(|reason| !predicate(id, reason));
            if before > 0 && state.locks.is_empty() {
                released.push(id);
            }
        }
        released
    }

    /// Mark a control inactive-visual. Returns `true` on the first marking.
    pub fn mark(&mut self, id: ControlId) -> bool {
        match self.controls.get_mut(id.0) {
            Some(state) => {
                state.marked = state.marked.saturating_add(1);
                state.marked == 1
            }
            None => false,
        }
    }

    /// Drop one marking. Returns `true` when the last marking is removed.
    pub fn unmark(&mut self, id: ControlId) -> bool {
        match self.controls.get_mut(id.0) {
            Some(state) if state.marked > 0 => {
                state.marked -= 1;
                state.marked == 0
            }
            _ => false,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
