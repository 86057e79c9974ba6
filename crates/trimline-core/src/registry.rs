//! # Option Registry
//!
//! The resolved control graph.
//!
//! The registry is built once from a `Layout`. Relationship keys are resolved
//! to `ControlId`s at construction time and inverse edges are derived, so the
//! propagation engine never searches by key while a cascade runs. After
//! construction the registry is immutable; control state lives in
//! `SelectionState`.
//!
//! Edges that cannot be resolved (unknown key, wrong control kind, self
//! reference) are dropped and recorded in `unresolved()`.

use crate::layout::{Layout, PageKind};
use crate::{
    ControlId, ControlKey, ControlKind, FieldBinding, FieldName, GroupId, GroupMode, PageId,
    Relation, TrimlineError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RESOLVED STRUCTURES
// =============================================================================

/// A resolved control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub id: ControlId,
    pub key: ControlKey,
    pub kind: ControlKind,
    pub label: String,
    pub group: GroupId,
    pub binding: FieldBinding,
    pub code: Option<String>,
    edges: BTreeMap<Relation, Vec<ControlId>>,
}

impl Control {
    /// Targets of a relation, in declaration order.
    #[must_use]
    pub fn edges(&self, relation: Relation) -> &[ControlId] {
        self.edges.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the control declares or receives the relation.
    #[must_use]
    pub fn has(&self, relation: Relation) -> bool {
        !self.edges(relation).is_empty()
    }

    /// Every non-empty relation with its targets, in relation order.
    pub fn all_edges(&self) -> impl Iterator<Item = (Relation, &[ControlId])> {
        self.edges
            .iter()
            .filter(|(_, targets)| !targets.is_empty())
            .map(|(relation, targets)| (*relation, targets.as_slice()))
    }
}

/// A resolved control group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlGroup {
    pub id: GroupId,
    pub mode: GroupMode,
    pub page: PageId,
    pub label: String,
    pub members: Vec<ControlId>,
}

impl ControlGroup {
    /// Whether at most one member may be active.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.mode == GroupMode::Exclusive
    }
}

/// A resolved navigation page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: PageId,
    pub label: String,
    pub kind: PageKind,
    pub groups: Vec<GroupId>,
}

/// Why an edge was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    UnknownKey,
    WrongKind,
    SelfReference,
}

/// An edge dropped during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedEdge {
    pub source: ControlKey,
    pub relation: Relation,
    pub target: ControlKey,
    pub reason: UnresolvedReason,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// The option registry.
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    controls: Vec<Control>,
    groups: Vec<ControlGroup>,
    pages: Vec<Page>,
    /// First control declared with a key wins, like a document lookup.
    key_index: BTreeMap<ControlKey, ControlId>,
    code_index: BTreeMap<String, ControlId>,
    fields: Vec<FieldName>,
    unresolved: Vec<UnresolvedEdge>,
}

/// Target kind a forward relation accepts, `None` for any kind.
fn accepted_kind(relation: Relation) -> Option<ControlKind> {
    match relation {
        Relation::Deactivates | Relation::ColorFilter => Some(ControlKind::Color),
        Relation::RelatedOptions | Relation::Requires | Relation::SecondCodeActivatedBy => {
            Some(ControlKind::Option)
        }
        _ => None,
    }
}

/// Inverse relation derived from a forward one.
fn inverse_of(relation: Relation) -> Option<Relation> {
    match relation {
        Relation::RelatedOptions => Some(Relation::RelatedTo),
        Relation::ActivatedBy => Some(Relation::Activates),
        Relation::SecondCodeActivatedBy => Some(Relation::SecondCodeDependents),
        Relation::Requires => Some(Relation::RequiredBy),
        _ => None,
    }
}

impl OptionRegistry {
    /// Build the registry from a layout.
    ///
    /// Fails only when the layout itself is inconsistent (a group pointing at
    /// a missing page or control). Bad relationship keys never fail.
    pub fn build(layout: &Layout) -> Result<Self, TrimlineError> {
        let mut registry = Self::default();

        for (index, page) in layout.pages.iter().enumerate() {
            registry.pages.push(Page {
                id: PageId(index),
                label: page.label.clone(),
                kind: page.kind,
                groups: page.groups.clone(),
            });
        }

        let mut group_of = vec![None; layout.controls.len()];
        for (index, group) in layout.groups.iter().enumerate() {
            if group.page.0 >= registry.pages.len() {
                return Err(TrimlineError::InvalidProduct(format!(
                    "group {} points at missing page {}",
                    index, group.page.0
                )));
            }
            for member in &group.members {
                let slot = group_of.get_mut(member.0).ok_or_else(|| {
                    TrimlineError::InvalidProduct(format!(
                        "group {} lists missing control {}",
                        index, member.0
                    ))
                })?;
                *slot = Some(GroupId(index));
            }
            registry.groups.push(ControlGroup {
                id: GroupId(index),
                mode: group.mode,
                page: group.page,
                label: group.label.clone(),
                members: group.members.clone(),
            });
        }

        let mut seen_fields = BTreeSet::new();
        for (index, spec) in layout.controls.iter().enumerate() {
            let id = ControlId(index);
            let group = group_of[index].ok_or_else(|| {
                TrimlineError::InvalidProduct(format!("control '{}' has no group", spec.key))
            })?;
            registry.key_index.entry(spec.key.clone()).or_insert(id);
            if let Some(code) = spec.code.as_ref().filter(|c| !c.is_empty()) {
                registry.code_index.entry(code.clone()).or_insert(id);
            }
            if seen_fields.insert(spec.binding.field.clone()) {
                registry.fields.push(spec.binding.field.clone());
            }
            registry.controls.push(Control {
                id,
                key: spec.key.clone(),
                kind: spec.kind,
                label: spec.label.clone(),
                group,
                binding: spec.binding.clone(),
                code: spec.code.clone(),
                edges: BTreeMap::new(),
            });
        }

        registry.resolve_edges(layout);
        Ok(registry)
    }

    fn resolve_edges(&mut self, layout: &Layout) {
        let mut resolved: Vec<BTreeMap<Relation, Vec<ControlId>>> =
            vec![BTreeMap::new(); self.controls.len()];

        for (index, spec) in layout.controls.iter().enumerate() {
            let source = ControlId(index);
            for (&relation, keys) in &spec.edges {
                for key in keys {
                    let reason = match self.key_index.get(key) {
                        None => Some(UnresolvedReason::UnknownKey),
                        Some(&target) if target == source => Some(UnresolvedReason::SelfReference),
                        Some(&target) => match accepted_kind(relation) {
                            Some(kind) if self.controls[target.0].kind != kind => {
                                Some(UnresolvedReason::WrongKind)
                            }
                            _ => {
                                push_unique(resolved[index].entry(relation).or_default(), target);
                                if let Some(inverse) = inverse_of(relation) {
                                    push_unique(
                                        resolved[target.0].entry(inverse).or_default(),
                                        source,
                                    );
                                }
                                None
                            }
                        },
                    };
                    if let Some(reason) = reason {
                        self.unresolved.push(UnresolvedEdge {
                            source: spec.key.clone(),
                            relation,
                            target: key.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        for (control, edges) in self.controls.iter_mut().zip(resolved) {
            control.edges = edges;
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Find a control by key.
    #[must_use]
    pub fn find_by_key(&self, key: &ControlKey) -> Option<ControlId> {
        self.key_index.get(key).copied()
    }

    /// Find an option by its code.
    #[must_use]
    pub fn find_by_code(&self, code: &str) -> Option<ControlId> {
        self.code_index.get(code).copied()
    }

    /// Find the control whose primary value is written to `field`.
    #[must_use]
    pub fn find_by_field_value(&self, field: &str, value: &str) -> Option<ControlId> {
        self.controls
            .iter()
            .find(|c| c.binding.field.as_str() == field && c.binding.value == value)
            .map(|c| c.id)
    }

    /// Resolve a key or fail with `UnknownControl`.
    pub fn require(&self, key: &ControlKey) -> Result<ControlId, TrimlineError> {
        self.find_by_key(key)
            .ok_or_else(|| TrimlineError::UnknownControl(key.clone()))
    }

    /// All controls carrying the relation, in registry order.
    #[must_use]
    pub fn all_with_relation(&self, relation: Relation) -> Vec<ControlId> {
        self.controls
            .iter()
            .filter(|c| c.has(relation))
            .map(|c| c.id)
            .collect()
    }

    /// Access a control. Ids handed out by this registry are always valid.
    #[must_use]
    pub fn control(&self, id: ControlId) -> &Control {
        &self.controls[id.0]
    }

    /// Access a control by id, checking bounds.
    #[must_use]
    pub fn get(&self, id: ControlId) -> Option<&Control> {
        self.controls.get(id.0)
    }

    /// The group a control belongs to.
    #[must_use]
    pub fn group_of(&self, id: ControlId) -> &ControlGroup {
        &self.groups[self.control(id).group.0]
    }

    /// Other members of a control's group, in group order.
    pub fn siblings(&self, id: ControlId) -> impl Iterator<Item = ControlId> + '_ {
        self.group_of(id)
            .members
            .iter()
            .copied()
            .filter(move |&m| m != id)
    }

    /// All controls in registry order.
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    /// All groups in registry order.
    #[must_use]
    pub fn groups(&self) -> &[ControlGroup] {
        &self.groups
    }

    /// All pages in navigation order.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Every form field, in layout order.
    #[must_use]
    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }

    /// Edges dropped during resolution.
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedEdge] {
        &self.unresolved
    }

    /// Number of controls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Whether the registry has no controls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

fn push_unique(list: &mut Vec<ControlId>, id: ControlId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ControlSpec;

    fn sample_layout() -> Layout {
        let mut layout = Layout::new();
        let colors = layout.add_page("Hull", PageKind::Colors);
        let equipment = layout.add_page("Equipment - 1", PageKind::Equipment);
        let hull = layout
            .add_group(colors, GroupMode::Exclusive, "Hull")
            .expect("group");
        let options = layout
            .add_group(equipment, GroupMode::Multiple, "Equipment - 1")
            .expect("group");

        layout
            .add_control(
                hull,
                ControlSpec::color("white", "tab-1-color-1", "Hull: White")
                    .with_edge(Relation::RelatedOptions, ["radar"])
                    .with_edge(Relation::Deactivates, ["radar", "ghost"]),
            )
            .expect("control");
        layout
            .add_control(
                hull,
                ControlSpec::color("navy", "tab-1-color-1", "Hull: Navy")
                    .with_edge(Relation::Deactivates, ["navy"]),
            )
            .expect("control");
        layout
            .add_control(
                options,
                ControlSpec::option("radar", "option-1", "Radar", "R1")
                    .with_edge(Relation::ActivatedBy, ["white"]),
            )
            .expect("control");
        layout
    }

    #[test]
    fn keys_codes_and_fields_are_indexed() {
        let registry = OptionRegistry::build(&sample_layout()).expect("build");

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find_by_key(&"navy".into()), Some(ControlId(1)));
        assert_eq!(registry.find_by_code("R1"), Some(ControlId(2)));
        assert_eq!(
            registry.find_by_field_value("tab-1-color-1", "Hull: Navy"),
            Some(ControlId(1))
        );
        let fields: Vec<&str> = registry.fields().iter().map(FieldName::as_str).collect();
        assert_eq!(fields, vec!["tab-1-color-1", "option-1"]);
    }

    #[test]
    fn inverse_edges_are_derived() {
        let registry = OptionRegistry::build(&sample_layout()).expect("build");
        let radar = registry.control(ControlId(2));
        let white = registry.control(ControlId(0));

        assert_eq!(radar.edges(Relation::RelatedTo), &[ControlId(0)]);
        assert_eq!(white.edges(Relation::Activates), &[ControlId(2)]);
        assert_eq!(
            registry.all_with_relation(Relation::ActivatedBy),
            vec![ControlId(2)]
        );
    }

    #[test]
    fn bad_edges_are_recorded_not_fatal() {
        let registry = OptionRegistry::build(&sample_layout()).expect("build");
        let reasons: Vec<_> = registry
            .unresolved()
            .iter()
            .map(|u| (u.target.as_str().to_string(), u.reason))
            .collect();

        assert!(reasons.contains(&("radar".to_string(), UnresolvedReason::WrongKind)));
        assert!(reasons.contains(&("ghost".to_string(), UnresolvedReason::UnknownKey)));
        assert!(reasons.contains(&("navy".to_string(), UnresolvedReason::SelfReference)));
        assert!(registry.control(ControlId(0)).edges(Relation::Deactivates).is_empty());
    }

    #[test]
    fn siblings_exclude_self() {
        let registry = OptionRegistry::build(&sample_layout()).expect("build");
        let siblings: Vec<_> = registry.siblings(ControlId(0)).collect();
        assert_eq!(siblings, vec![ControlId(1)]);
        assert!(registry.group_of(ControlId(0)).is_exclusive());
    }

    #[test]
    fn require_reports_unknown_key() {
        let registry = OptionRegistry::build(&sample_layout()).expect("build");
        let result = registry.require(&"missing".into());
        assert!(matches!(result, Err(TrimlineError::UnknownControl(_))));
    }
}
