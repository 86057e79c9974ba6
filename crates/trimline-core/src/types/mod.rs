//! # Core Type Definitions
//!
//! This module contains all core types for the Trimline configurator engine:
//! - Control and group identifiers (`ControlKey`, `ControlId`, `GroupId`, `PageId`)
//! - Control classification (`ControlKind`, `GroupMode`, `Relation`)
//! - Field bindings (`FieldName`, `FieldBinding`)
//! - Error types (`TrimlineError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so that registries, state tables and
//! snapshots can be kept in `BTreeMap`/`BTreeSet` and iterate in a stable
//! order across runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable key of a control, taken from the product data
/// (`button-id` for options, `color-id` for colors).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlKey(pub String);

impl ControlKey {
    /// Create a new key from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ControlKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Dense index of a control inside the registry.
///
/// Indices are assigned in layout order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControlId(pub usize);

/// Dense index of a control group inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub usize);

/// Index of a navigation page (one option item in the pager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub usize);

/// Name of a hidden form field (and of the matching query parameter for
/// exclusive groups).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldName(pub String);

impl FieldName {
    /// Create a new field name from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the field name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// What a control represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// A color swatch.
    Color,
    /// An equipment option.
    Option,
}

/// Selection cardinality of a control group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    /// At most one active member; activating one releases the previous one.
    Exclusive,
    /// Independent toggles.
    Multiple,
}

/// Relationship kinds carried by controls.
///
/// Forward kinds come from the product data; inverse kinds are derived when
/// the registry is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Color locks the listed colors when activated.
    Deactivates,
    /// Color replays activation of the listed options.
    RelatedOptions,
    /// Option points back at the colors listing it in `RelatedOptions`.
    RelatedTo,
    /// Option disables the listed options while active.
    MutuallyExclusiveWith,
    /// Option stays locked until one of the listed controls is active.
    ActivatedBy,
    /// Control unlocks the listed options (inverse of `ActivatedBy`).
    Activates,
    /// Option writes its second value while the listed control is active.
    SecondCodeActivatedBy,
    /// Control switches the value of the listed options (inverse of
    /// `SecondCodeActivatedBy`).
    SecondCodeDependents,
    /// Option forces the listed colors and locks their group siblings.
    ColorFilter,
    /// Option replays activation of the listed options.
    Requires,
    /// Option is required by the listed options (inverse of `Requires`).
    RequiredBy,
}

impl Relation {
    /// All relation kinds, forward kinds first.
    pub const ALL: [Relation; 11] = [
        Relation::Deactivates,
        Relation::RelatedOptions,
        Relation::MutuallyExclusiveWith,
        Relation::ActivatedBy,
        Relation::SecondCodeActivatedBy,
        Relation::ColorFilter,
        Relation::Requires,
        Relation::RelatedTo,
        Relation::Activates,
        Relation::SecondCodeDependents,
        Relation::RequiredBy,
    ];

    /// Stable snake_case name, as used in JSON and the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Relation::Deactivates => "deactivates",
            Relation::RelatedOptions => "related_options",
            Relation::RelatedTo => "related_to",
            Relation::MutuallyExclusiveWith => "mutually_exclusive_with",
            Relation::ActivatedBy => "activated_by",
            Relation::Activates => "activates",
            Relation::SecondCodeActivatedBy => "second_code_activated_by",
            Relation::SecondCodeDependents => "second_code_dependents",
            Relation::ColorFilter => "color_filter",
            Relation::Requires => "requires",
            Relation::RequiredBy => "required_by",
        }
    }

    /// Parse a relation from its snake_case name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// FIELD BINDING
// =============================================================================

/// The form field a control writes while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBinding {
    /// Hidden form field name.
    pub field: FieldName,
    /// Value written while active.
    pub value: String,
    /// Value written instead while a second-code source is active.
    pub second_value: Option<String>,
}

impl FieldBinding {
    /// Create a binding without a second value.
    #[must_use]
    pub fn new(field: FieldName, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            second_value: None,
        }
    }

    /// Pick the value to write, honoring the second value when requested.
    #[must_use]
    pub fn value_for(&self, second: bool) -> &str {
        match (&self.second_value, second) {
            (Some(v), true) => v,
            _ => &self.value,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Trimline engine.
///
/// Unknown relationship targets are NOT errors: they are dropped when the
/// registry is built and listed in `OptionRegistry::unresolved()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrimlineError {
    /// A control key referenced from outside the registry does not exist.
    #[error("Unknown control: {0}")]
    UnknownControl(ControlKey),

    /// The product data is structurally unusable.
    #[error("Invalid product data: {0}")]
    InvalidProduct(String),

    /// A query string could not be parsed.
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    /// A navigation target is out of range.
    #[error("Page out of range: {0} (page count {1})")]
    PageOutOfRange(usize, usize),

    /// No navigation page carries the given label.
    #[error("Unknown page: {0}")]
    UnknownPage(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// The session cache failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_names_round_trip() {
        for relation in Relation::ALL {
            assert_eq!(Relation::from_name(relation.name()), Some(relation));
        }
        assert_eq!(Relation::from_name("siblings"), None);
    }

    #[test]
    fn binding_prefers_second_value_only_when_present() {
        let mut binding = FieldBinding::new(FieldName::new("option-1"), "Radar (R1)");
        assert_eq!(binding.value_for(true), "Radar (R1)");

        binding.second_value = Some("Radar (R2)".to_string());
        assert_eq!(binding.value_for(true), "Radar (R2)");
        assert_eq!(binding.value_for(false), "Radar (R1)");
    }

    #[test]
    fn control_keys_convert_from_owned_and_borrowed() {
        let owned: ControlKey = format!("radar-{}", 1).into();
        let borrowed: ControlKey = "radar-1".into();
        assert_eq!(owned, borrowed);
        assert_eq!(owned.as_str(), "radar-1");
    }

    #[test]
    fn control_ids_order_by_index() {
        let mut ids = vec![ControlId(3), ControlId(1), ControlId(2)];
        ids.sort();
        assert_eq!(ids, vec![ControlId(1), ControlId(2), ControlId(3)]);
    }
}
