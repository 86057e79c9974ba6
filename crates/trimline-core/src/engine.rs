//! # Propagation Engine
//!
//! Click handling for the option graph.
//!
//! A click re-evaluates the same ordered rule list for the clicked control:
//! 1. exclusive-group replacement
//! 2. multiple-group toggle
//! 3. deactivation edges
//! 4. unlock on a deactivator's neighbor click
//! 5. related color and option edges, then `requires` between options
//! 6. mutual exclusion marking
//! 7. activation gating
//! 8. second-code switching
//! 9. color filter
//!
//! Rules that "click" another control re-enter the same evaluation
//! depth-first. Every cascade carries a guard: a control is clicked at most
//! once and its release reactions run at most once, so cyclic edges always
//! terminate. Controls released indirectly (replaced, locked, unlinked) run
//! the same release reactions as a control toggled off.
//!
//! Form fields and the query string are committed once, after the cascade.

use crate::registry::OptionRegistry;
use crate::state::{LockReason, SelectionState};
use crate::sync::{FieldChange, QueryString, SelectionSnapshot, SyncOutputs, fold};
use crate::{ControlId, ControlKey, ControlKind, Relation, TrimlineError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Which deactivation locks a neighbor click clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockScope {
    /// Only locks placed by deactivators in the clicked control's group.
    #[default]
    Scoped,
    /// Every deactivation lock in the session.
    Global,
}

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unlock_scope: UnlockScope,
}

// =============================================================================
// REPORTS
// =============================================================================

/// Where a click came from. Both sources refuse locked controls; only the
/// cascade itself may drive a locked control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    User,
    Restore,
}

/// One state change made during a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Activated { control: ControlId },
    Released { control: ControlId },
    Locked { control: ControlId, reason: LockReason },
    Unlocked { control: ControlId },
    Marked { control: ControlId },
    Unmarked { control: ControlId },
    SecondCodeSwitched { control: ControlId, second: bool },
    SkippedByGuard { control: ControlId },
    RefusedLocked { control: ControlId },
}

impl Effect {
    /// The control the effect applies to.
    #[must_use]
    pub fn control(&self) -> ControlId {
        match self {
            Effect::Activated { control }
            | Effect::Released { control }
            | Effect::Locked { control, .. }
            | Effect::Unlocked { control }
            | Effect::Marked { control }
            | Effect::Unmarked { control }
            | Effect::SecondCodeSwitched { control, .. }
            | Effect::SkippedByGuard { control }
            | Effect::RefusedLocked { control } => *control,
        }
    }
}

/// Outcome of one click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub origin: ControlId,
    pub trigger: Trigger,
    pub effects: Vec<Effect>,
    pub field_changes: Vec<FieldChange>,
}

impl CascadeReport {
    /// Whether the click was refused because the control is locked.
    #[must_use]
    pub fn refused(&self) -> bool {
        matches!(self.effects.as_slice(), [Effect::RefusedLocked { .. }])
    }

    /// Controls activated during the cascade, in order.
    #[must_use]
    pub fn activated(&self) -> Vec<ControlId> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Activated { control } => Some(*control),
                _ => None,
            })
            .collect()
    }

    /// Controls released during the cascade, in order.
    #[must_use]
    pub fn released(&self) -> Vec<ControlId> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Released { control } => Some(*control),
                _ => None,
            })
            .collect()
    }

    /// Every control the cascade touched.
    #[must_use]
    pub fn affected(&self) -> BTreeSet<ControlId> {
        self.effects
            .iter()
            .filter(|e| !matches!(e, Effect::SkippedByGuard { .. }))
            .map(Effect::control)
            .collect()
    }
}

// =============================================================================
// CASCADE
// =============================================================================

/// One cascade in flight.
struct Propagation<'a> {
    registry: &'a OptionRegistry,
    state: &'a mut SelectionState,
    scope: UnlockScope,
    clicked: BTreeSet<ControlId>,
    released: BTreeSet<ControlId>,
    effects: Vec<Effect>,
}

impl<'a> Propagation<'a> {
    fn new(registry: &'a OptionRegistry, state: &'a mut SelectionState, scope: UnlockScope) -> Self {
        Self {
            registry,
            state,
            scope,
            clicked: BTreeSet::new(),
            released: BTreeSet::new(),
            effects: Vec::new(),
        }
    }

    fn click(&mut self, id: ControlId) {
        if !self.clicked.insert(id) {
            self.effects.push(Effect::SkippedByGuard { control: id });
            return;
        }

        let registry = self.registry;
        let group = registry.group_of(id);
        let activated = if group.is_exclusive() {
            if self.state.is_active(id) {
                self.unlock_on_neighbor_click(id);
                return;
            }
            // Rule 1; release reactions may have clicked another member
            while let Some(previous) = self.state.active_in(registry, group.id) {
                self.release(previous);
            }
            self.activate(id)
        } else if self.state.is_active(id) {
            // Rule 2, toggle off
            self.release(id);
            false
        } else {
            // Rule 2, toggle on
            self.activate(id)
        };

        if activated {
            self.apply_deactivation_edges(id);
        }
        self.unlock_on_neighbor_click(id);
        if activated {
            self.react_activated(id);
        }
    }

    fn activate(&mut self, id: ControlId) -> bool {
        let changed = self.state.activate(id);
        if changed {
            self.effects.push(Effect::Activated { control: id });
        }
        changed
    }

    /// Release a control and run its release reactions once per cascade.
    fn release(&mut self, id: ControlId) {
        if !self.state.deactivate(id) {
            return;
        }
        self.effects.push(Effect::Released { control: id });
        if self.released.insert(id) {
            self.react_released(id);
        }
    }

    /// Turn a control off through the cascade when possible, directly
    /// otherwise.
    fn force_off(&mut self, id: ControlId) {
        if !self.state.is_active(id) {
            return;
        }
        if self.clicked.contains(&id) || self.registry.group_of(id).is_exclusive() {
            self.release(id);
        } else {
            self.click(id);
        }
    }

    fn lock(&mut self, id: ControlId, reason: LockReason) {
        if self.state.lock(id, reason) {
            self.effects.push(Effect::Locked {
                control: id,
                reason,
            });
        }
    }

    fn unlock(&mut self, id: ControlId, reason: LockReason) {
        if self.state.unlock(id, reason) {
            self.effects.push(Effect::Unlocked { control: id });
        }
    }

    // =========================================================================
    // RULES 3 AND 4
    // =========================================================================

    fn apply_deactivation_edges(&mut self, source: ControlId) {
        let registry = self.registry;
        for &target in registry.control(source).edges(Relation::Deactivates) {
            self.lock(target, LockReason::Deactivated(source));
            if self.state.is_active(target) {
                self.release(target);
                let replacement = registry
                    .siblings(target)
                    .find(|&s| !self.state.is_locked(s));
                if let Some(replacement) = replacement {
                    self.click(replacement);
                }
            }
        }
    }

    fn unlock_on_neighbor_click(&mut self, id: ControlId) {
        let registry = self.registry;
        let control = registry.control(id);
        if control.kind != ControlKind::Color || control.has(Relation::Deactivates) {
            return;
        }
        let deactivators: BTreeSet<ControlId> = registry
            .siblings(id)
            .filter(|&s| registry.control(s).has(Relation::Deactivates))
            .collect();
        if deactivators.is_empty() {
            return;
        }

        let scope = self.scope;
        let unlocked = self.state.unlock_where(|_, reason| match (scope, reason) {
            (UnlockScope::Global, LockReason::Deactivated(_)) => true,
            (UnlockScope::Scoped, LockReason::Deactivated(source)) => deactivators.contains(source),
            _ => false,
        });
        self.effects
            .extend(unlocked.into_iter().map(|control| Effect::Unlocked { control }));
    }

    // =========================================================================
    // RULES 5 - 9
    // =========================================================================

    fn react_activated(&mut self, id: ControlId) {
        let rules: [fn(&mut Self, ControlId); 6] = [
            Self::follow_related_on,
            Self::follow_requirements_on,
            Self::mark_peers,
            Self::open_gates,
            |p, id| p.switch_second_codes(id, true),
            Self::apply_color_filter,
        ];
        for rule in rules {
            // An earlier rule may have released the control again.
            if !self.state.is_active(id) {
                return;
            }
            rule(self, id);
        }
    }

    fn react_released(&mut self, id: ControlId) {
        let rules: [fn(&mut Self, ControlId); 6] = [
            Self::follow_related_off,
            Self::follow_requirements_off,
            Self::unmark_peers,
            Self::close_gates,
            |p, id| p.switch_second_codes(id, false),
            Self::lift_color_filter,
        ];
        for rule in rules {
            if self.state.is_active(id) {
                return;
            }
            rule(self, id);
        }
    }

    /// Rule 5: a color clicks its inactive options; an option whose colors
    /// are all inactive clicks the first one.
    fn follow_related_on(&mut self, id: ControlId) {
        let control = self.registry.control(id);
        for &option in control.edges(Relation::RelatedOptions) {
            if !self.state.is_active(option) {
                self.click(option);
            }
        }
        let colors = control.edges(Relation::RelatedTo);
        if let Some(&first) = colors.first()
            && colors.iter().all(|&c| !self.state.is_active(c))
        {
            self.click(first);
        }
    }

    /// Rule 5: a released option releases its active colors.
    fn follow_related_off(&mut self, id: ControlId) {
        for &color in self.registry.control(id).edges(Relation::RelatedTo) {
            self.release(color);
        }
    }

    fn follow_requirements_on(&mut self, id: ControlId) {
        for &required in self.registry.control(id).edges(Relation::Requires) {
            if !self.state.is_active(required) {
                self.click(required);
            }
        }
    }

    /// Dependents go with their requirement; a requirement goes once no
    /// dependent is left.
    fn follow_requirements_off(&mut self, id: ControlId) {
        let registry = self.registry;
        let control = registry.control(id);
        for &dependent in control.edges(Relation::RequiredBy) {
            self.force_off(dependent);
        }
        for &required in control.edges(Relation::Requires) {
            let orphaned = registry
                .control(required)
                .edges(Relation::RequiredBy)
                .iter()
                .all(|&d| !self.state.is_active(d));
            if orphaned {
                self.force_off(required);
            }
        }
    }

    fn mark_peers(&mut self, id: ControlId) {
        for &peer in self.registry.control(id).edges(Relation::MutuallyExclusiveWith) {
            self.force_off(peer);
            if self.state.mark(peer) {
                self.effects.push(Effect::Marked { control: peer });
            }
        }
    }

    fn unmark_peers(&mut self, id: ControlId) {
        for &peer in self.registry.control(id).edges(Relation::MutuallyExclusiveWith) {
            if self.state.unmark(peer) {
                self.effects.push(Effect::Unmarked { control: peer });
            }
        }
    }

    fn open_gates(&mut self, id: ControlId) {
        for &dependent in self.registry.control(id).edges(Relation::Activates) {
            self.unlock(dependent, LockReason::Gate);
        }
    }

    /// Rule 7: dependents with no other active activator are turned off and
    /// locked again.
    fn close_gates(&mut self, id: ControlId) {
        let registry = self.registry;
        for &dependent in registry.control(id).edges(Relation::Activates) {
            let still_open = registry
                .control(dependent)
                .edges(Relation::ActivatedBy)
                .iter()
                .any(|&a| a != id && self.state.is_active(a));
            if !still_open {
                self.force_off(dependent);
                self.lock(dependent, LockReason::Gate);
            }
        }
    }

    fn apply_color_filter(&mut self, id: ControlId) {
        let registry = self.registry;
        for &target in registry.control(id).edges(Relation::ColorFilter) {
            if !self.state.is_active(target) {
                self.click(target);
            }
            for sibling in registry.siblings(target) {
                self.lock(sibling, LockReason::Filtered(id));
            }
        }
    }

    /// Rule 9: siblings are unlocked; the forced colors keep their state.
    fn lift_color_filter(&mut self, id: ControlId) {
        let registry = self.registry;
        for &target in registry.control(id).edges(Relation::ColorFilter) {
            for sibling in registry.siblings(target) {
                self.unlock(sibling, LockReason::Filtered(id));
            }
        }
    }

    /// Report dependents whose written value flips with this source.
    fn switch_second_codes(&mut self, source: ControlId, second: bool) {
        let registry = self.registry;
        for &dependent in registry.control(source).edges(Relation::SecondCodeDependents) {
            let target = registry.control(dependent);
            if target.binding.second_value.is_none() || !self.state.is_active(dependent) {
                continue;
            }
            let other_source_active = target
                .edges(Relation::SecondCodeActivatedBy)
                .iter()
                .any(|&s| s != source && self.state.is_active(s));
            if !other_source_active {
                self.effects.push(Effect::SecondCodeSwitched {
                    control: dependent,
                    second,
                });
            }
        }
    }
}

// =============================================================================
// CONFIGURATOR
// =============================================================================

/// The registry, its state table and the synced outputs of one page.
#[derive(Debug, Clone)]
pub struct Configurator {
    registry: OptionRegistry,
    state: SelectionState,
    outputs: SyncOutputs,
    config: EngineConfig,
}

impl Configurator {
    /// Create a configurator with nothing selected.
    ///
    /// `query` is the page's query string; it is not rewritten until the
    /// first cascade.
    #[must_use]
    pub fn new(registry: OptionRegistry, query: QueryString, config: EngineConfig) -> Self {
        let state = SelectionState::initial(&registry);
        let outputs = SyncOutputs::new(&registry, query);
        Self {
            registry,
            state,
            outputs,
            config,
        }
    }

    /// Click a control.
    pub fn click(&mut self, id: ControlId, trigger: Trigger) -> Result<CascadeReport, TrimlineError> {
        if self.registry.get(id).is_none() {
            return Err(TrimlineError::UnknownControl(ControlKey::new(format!(
                "#{}",
                id.0
            ))));
        }

        if self.state.is_locked(id) {
            return Ok(CascadeReport {
                origin: id,
                trigger,
                effects: vec![Effect::RefusedLocked { control: id }],
                field_changes: Vec::new(),
            });
        }

        let mut propagation =
            Propagation::new(&self.registry, &mut self.state, self.config.unlock_scope);
        propagation.click(id);
        let effects = propagation.effects;

        let field_changes = self.outputs.commit(&self.registry, &self.state);
        Ok(CascadeReport {
            origin: id,
            trigger,
            effects,
            field_changes,
        })
    }

    /// Click a control by key.
    pub fn click_key(
        &mut self,
        key: &ControlKey,
        trigger: Trigger,
    ) -> Result<CascadeReport, TrimlineError> {
        let id = self.registry.require(key)?;
        self.click(id, trigger)
    }

    #[must_use]
    pub fn registry(&self) -> &OptionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    #[must_use]
    pub fn outputs(&self) -> &SyncOutputs {
        &self.outputs
    }

    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Expected outputs for the current state.
    #[must_use]
    pub fn snapshot(&self) -> SelectionSnapshot {
        fold(&self.registry, &self.state)
    }

    /// Whether form and query equal the fold of the current state.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.outputs.is_consistent(&self.registry, &self.state)
    }

    /// Lead submission fields for the current page URL.
    pub fn lead_payload(&self, page_url: &str) -> Result<Vec<(String, String)>, TrimlineError> {
        let link = self.outputs.query().apply_to(page_url)?;
        Ok(self.outputs.lead_payload(&self.registry, &link))
    }
}

// =============================================================================
// TESTS
// =============================================================================
