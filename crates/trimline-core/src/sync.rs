//! # Sync Outputs
//!
//! Projections of the selection state onto the hidden lead form and the
//! page query string.
//!
//! After each cascade `SyncOutputs::commit` rewrites both outputs from the
//! state table, so they always equal the fold of the active controls'
//! field bindings:
//! - every active control's field holds its current value (the second value
//!   while a second-code source is active); every other field is empty
//! - each exclusive group's field is a query parameter while the group has
//!   an active member, and is removed otherwise
//! - active option codes form the `options` aggregate, in activation order
//!
//! Parameters that are not configuration fields (such as `id`) are kept in
//! place. The query string is replaced wholesale; there is no history.

use crate::primitives::{
    LINK_FIELD, OPTIONS_PARAM, OPTIONS_SEPARATOR, SCREEN_FIELD, SCREEN_PLACEHOLDER,
};
use crate::registry::OptionRegistry;
use crate::state::SelectionState;
use crate::{ControlId, FieldName, Relation, TrimlineError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use url::Url;
use url::form_urlencoded;

// =============================================================================
// QUERY STRING
// =============================================================================

/// Ordered, form-urlencoded query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryString {
    params: Vec<(String, String)>,
}

impl QueryString {
    /// Create an empty query string.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string, with or without the leading `?`.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let trimmed = query.strip_prefix('?').unwrap_or(query);
        Self {
            params: form_urlencoded::parse(trimmed.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// Take the query string of a full page URL.
    pub fn from_url(page_url: &str) -> Result<Self, TrimlineError> {
        let url = Url::parse(page_url).map_err(|e| TrimlineError::InvalidQuery(e.to_string()))?;
        Ok(Self::parse(url.query().unwrap_or_default()))
    }

    /// First value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a parameter: the first occurrence is replaced in place, later
    /// duplicates are removed, a missing parameter is appended.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.params.iter().position(|(k, _)| k == name) {
            Some(first) => {
                self.params[first].1 = value.to_string();
                let mut index = 0usize;
                self.params.retain(|(k, _)| {
                    let keep = k != name || index == first;
                    index += 1;
                    keep
                });
            }
            None => self.params.push((name.to_string(), value.to_string())),
        }
    }

    /// Remove every occurrence of a parameter.
    pub fn delete(&mut self, name: &str) {
        self.params.retain(|(k, _)| k != name);
    }

    /// Parameters in order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Codes listed in the `options` aggregate.
    #[must_use]
    pub fn option_codes(&self) -> Vec<String> {
        self.get(OPTIONS_PARAM)
            .map(split_codes)
            .unwrap_or_default()
    }

    /// Replace the query of a page URL with this query string, dropping any
    /// fragment.
    pub fn apply_to(&self, page_url: &str) -> Result<String, TrimlineError> {
        let mut url =
            Url::parse(page_url).map_err(|e| TrimlineError::InvalidQuery(e.to_string()))?;
        url.set_fragment(None);
        if self.params.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&self.to_string()));
        }
        Ok(url.into())
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        f.write_str(&encoded)
    }
}

/// Split an `options` aggregate into codes, skipping empty segments.
#[must_use]
pub fn split_codes(aggregate: &str) -> Vec<String> {
    aggregate
        .split(OPTIONS_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// A change to one form field during a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: FieldName,
    pub before: String,
    pub after: String,
}

/// The derived field → value mapping and the configuration parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    /// Every form field, empty when no active control writes it.
    pub form: BTreeMap<FieldName, String>,
    /// Exclusive-group parameters (`None` = removed).
    pub exclusive: BTreeMap<FieldName, Option<String>>,
    /// Codes of the `options` aggregate, in activation order.
    pub options: Vec<String>,
}

impl SelectionSnapshot {
    /// Same as [`fold`].
    #[must_use]
    pub fn fold(registry: &OptionRegistry, state: &SelectionState) -> Self {
        fold(registry, state)
    }
}

/// Whether any second-code source of a control is active.
fn second_code_active(registry: &OptionRegistry, state: &SelectionState, id: ControlId) -> bool {
    registry
        .control(id)
        .edges(Relation::SecondCodeActivatedBy)
        .iter()
        .any(|&source| state.is_active(source))
}

/// Value a control currently writes into its field.
#[must_use]
pub fn current_value(registry: &OptionRegistry, state: &SelectionState, id: ControlId) -> String {
    registry
        .control(id)
        .binding
        .value_for(second_code_active(registry, state, id))
        .to_string()
}

/// Fold the active controls' field bindings into a snapshot.
#[must_use]
pub fn fold(registry: &OptionRegistry, state: &SelectionState) -> SelectionSnapshot {
    let mut snapshot = SelectionSnapshot {
        form: registry
            .fields()
            .iter()
            .map(|f| (f.clone(), String::new()))
            .collect(),
        ..SelectionSnapshot::default()
    };

    let mut active_options = Vec::new();
    for group in registry.groups() {
        if group.is_exclusive() {
            let Some(&first) = group.members.first() else {
                continue;
            };
            let field = registry.control(first).binding.field.clone();
            let value = state
                .active_in(registry, group.id)
                .map(|id| current_value(registry, state, id));
            snapshot.exclusive.insert(field, value);
        } else {
            active_options.extend(group.members.iter().copied().filter(|&m| state.is_active(m)));
        }
    }

    for id in state.active() {
        let field = registry.control(id).binding.field.clone();
        snapshot.form.insert(field, current_value(registry, state, id));
    }

    active_options.sort_by_key(|&id| state.activated_at(id));
    let mut seen = BTreeSet::new();
    snapshot.options = active_options
        .into_iter()
        .filter_map(|id| registry.control(id).code.clone())
        .filter(|code| !code.is_empty() && seen.insert(code.clone()))
        .collect();

    snapshot
}

// =============================================================================
// SYNC OUTPUTS
// =============================================================================

/// The hidden form and the query string of one configurator page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutputs {
    form: BTreeMap<FieldName, String>,
    query: QueryString,
}

impl SyncOutputs {
    /// Empty form fields for every registry field and the page's query.
    #[must_use]
    pub fn new(registry: &OptionRegistry, query: QueryString) -> Self {
        Self {
            form: registry
                .fields()
                .iter()
                .map(|f| (f.clone(), String::new()))
                .collect(),
            query,
        }
    }

    /// Rewrite form and query from the state table.
    ///
    /// Returns the form fields whose value changed.
    pub fn commit(&mut self, registry: &OptionRegistry, state: &SelectionState) -> Vec<FieldChange> {
        let expected = fold(registry, state);

        let mut changes = Vec::new();
        for (field, after) in &expected.form {
            let before = self.form.insert(field.clone(), after.clone()).unwrap_or_default();
            if &before != after {
                changes.push(FieldChange {
                    field: field.clone(),
                    before,
                    after: after.clone(),
                });
            }
        }

        for (field, value) in &expected.exclusive {
            match value {
                Some(value) => self.query.set(field.as_str(), value),
                None => self.query.delete(field.as_str()),
            }
        }

        if expected.options.is_empty() {
            self.query.delete(OPTIONS_PARAM);
        } else {
            let joined = expected.options.join(&OPTIONS_SEPARATOR.to_string());
            self.query.set(OPTIONS_PARAM, &joined);
        }

        changes
    }

    /// Whether the outputs equal the fold of the given state.
    #[must_use]
    pub fn is_consistent(&self, registry: &OptionRegistry, state: &SelectionState) -> bool {
        let expected = fold(registry, state);
        let exclusive_ok = expected
            .exclusive
            .iter()
            .all(|(field, value)| self.query.get(field.as_str()) == value.as_deref());
        exclusive_ok && self.form == expected.form && self.query.option_codes() == expected.options
    }

    /// Current value of a form field.
    #[must_use]
    pub fn form_value(&self, field: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(f, _)| f.as_str() == field)
            .map(|(_, v)| v.as_str())
    }

    /// All form fields.
    #[must_use]
    pub fn form(&self) -> &BTreeMap<FieldName, String> {
        &self.form
    }

    /// The current query string.
    #[must_use]
    pub fn query(&self) -> &QueryString {
        &self.query
    }

    /// Fields submitted with a lead: the configuration fields in layout
    /// order, then the page link and the screenshot placeholder.
    #[must_use]
    pub fn lead_payload(&self, registry: &OptionRegistry, page_url: &str) -> Vec<(String, String)> {
        let mut payload: Vec<(String, String)> = registry
            .fields()
            .iter()
            .map(|f| {
                (
                    f.as_str().to_string(),
                    self.form.get(f).cloned().unwrap_or_default(),
                )
            })
            .collect();
        payload.push((LINK_FIELD.to_string(), page_url.to_string()));
        payload.push((SCREEN_FIELD.to_string(), SCREEN_PLACEHOLDER.to_string()));
        payload
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ControlSpec, Layout, PageKind};
    use crate::GroupMode;

    fn registry() -> OptionRegistry {
        let mut layout = Layout::new();
        let page = layout.add_page("Hull", PageKind::Colors);
        let hull = layout
            .add_group(page, GroupMode::Exclusive, "Hull")
            .expect("group");
        let options = layout
            .add_group(page, GroupMode::Multiple, "Equipment - 1")
            .expect("group");
        layout
            .add_control(hull, ControlSpec::color("white", "tab-1-color-1", "Hull: White"))
            .expect("control");
        layout
            .add_control(options, ControlSpec::option("radar", "option-1", "Radar", "R1"))
            .expect("control");
        layout
            .add_control(
                options,
                ControlSpec::option("sonar", "option-2", "Sonar", "S1")
                    .with_second_code("S2")
                    .with_edge(Relation::SecondCodeActivatedBy, ["radar"]),
            )
            .expect("control");
        OptionRegistry::build(&layout).expect("build")
    }

    #[test]
    fn query_set_replaces_in_place() {
        let mut q = QueryString::parse("?id=7&a=1&b=2&a=3");
        q.set("a", "x");
        assert_eq!(q.to_string(), "id=7&a=x&b=2");
        q.set("c", "y z");
        assert_eq!(q.to_string(), "id=7&a=x&b=2&c=y+z");
        q.delete("b");
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn query_applies_to_page_url() {
        let q = QueryString::parse("id=7&options=R1-S1");
        let url = q
            .apply_to("https://boats.example/configure?old=1#top")
            .expect("apply");
        assert_eq!(url, "https://boats.example/configure?id=7&options=R1-S1");
        assert_eq!(q.option_codes(), vec!["R1", "S1"]);
    }

    #[test]
    fn commit_writes_form_and_query() {
        let registry = registry();
        let mut state = SelectionState::initial(&registry);
        let mut outputs = SyncOutputs::new(&registry, QueryString::parse("id=7"));

        state.activate(ControlId(0));
        state.activate(ControlId(2));
        let changes = outputs.commit(&registry, &state);

        assert_eq!(changes.len(), 2);
        assert_eq!(outputs.form_value("tab-1-color-1"), Some("Hull: White"));
        assert_eq!(outputs.form_value("option-2"), Some("Sonar (S1)"));
        assert_eq!(outputs.query().get("id"), Some("7"));
        assert_eq!(outputs.query().get("tab-1-color-1"), Some("Hull: White"));
        assert_eq!(outputs.query().get("options"), Some("S1"));
        assert!(outputs.is_consistent(&registry, &state));
    }

    #[test]
    fn second_code_source_switches_value() {
        let registry = registry();
        let mut state = SelectionState::initial(&registry);
        let mut outputs = SyncOutputs::new(&registry, QueryString::new());

        state.activate(ControlId(2));
        state.activate(ControlId(1));
        outputs.commit(&registry, &state);

        assert_eq!(outputs.form_value("option-2"), Some("Sonar (S2)"));
        assert_eq!(outputs.query().get("options"), Some("S1-R1"));
    }

    #[test]
    fn released_controls_clear_fields_and_params() {
        let registry = registry();
        let mut state = SelectionState::initial(&registry);
        let mut outputs = SyncOutputs::new(&registry, QueryString::new());

        state.activate(ControlId(0));
        state.activate(ControlId(1));
        outputs.commit(&registry, &state);
        state.deactivate(ControlId(0));
        state.deactivate(ControlId(1));
        outputs.commit(&registry, &state);

        assert_eq!(outputs.form_value("tab-1-color-1"), Some(""));
        assert!(outputs.query().is_empty());
    }

    #[test]
    fn stale_outputs_are_detected() {
        let registry = registry();
        let mut state = SelectionState::initial(&registry);
        let outputs = SyncOutputs::new(&registry, QueryString::new());
        state.activate(ControlId(1));
        assert!(!outputs.is_consistent(&registry, &state));
    }

    #[test]
    fn lead_payload_appends_link_and_screen() {
        let registry = registry();
        let outputs = SyncOutputs::new(&registry, QueryString::new());
        let payload = outputs.lead_payload(&registry, "https://boats.example/?id=7");

        let names: Vec<&str> = payload.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["tab-1-color-1", "option-1", "option-2", "link", "screen"]
        );
        assert_eq!(payload[4].1, "placeholder");
    }
}
