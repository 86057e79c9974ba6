//! # Layout
//!
//! Derives pages, control groups and controls from product data.
//!
//! This is the metadata half of rendering: it decides which controls exist,
//! which group and page each one belongs to, which form field it writes and
//! which relationship keys it declares. Nothing here touches presentation.
//!
//! Layout rules:
//! - each color tab with content is one page; each non-empty color subgroup
//!   is one exclusive group writing `tab-<tab>-color-<sub>`
//! - options are split into equipment pages (`options-count-tab-N` or the
//!   default size); each page is one multiple group, each option writes
//!   `option-<n>`
//! - a trailing summary page closes the sequence

use crate::primitives::{EQUIPMENT_PAGE_PREFIX, MAX_CONTROLS};
use crate::product::{ProductData, keys_of};
use crate::{
    ControlId, ControlKey, ControlKind, FieldBinding, FieldName, GroupId, GroupMode, PageId,
    Relation, TrimlineError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SPECS
// =============================================================================

/// What a navigation page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Colors,
    Equipment,
    Summary,
}

/// A navigation page before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpec {
    pub label: String,
    pub kind: PageKind,
    pub groups: Vec<GroupId>,
}

/// A control group before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub page: PageId,
    pub mode: GroupMode,
    pub label: String,
    pub members: Vec<ControlId>,
}

/// A control before its relationship keys are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSpec {
    pub key: ControlKey,
    pub kind: ControlKind,
    pub label: String,
    pub binding: FieldBinding,
    /// Option code used in the `options` query aggregate.
    pub code: Option<String>,
    /// Forward relationship keys, as declared by the product data.
    pub edges: BTreeMap<Relation, Vec<ControlKey>>,
}

impl ControlSpec {
    /// A color swatch writing `value` into `field`.
    #[must_use]
    pub fn color(key: impl Into<String>, field: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            key: ControlKey::new(key),
            kind: ControlKind::Color,
            label: value.clone(),
            binding: FieldBinding::new(FieldName::new(field), value),
            code: None,
            edges: BTreeMap::new(),
        }
    }

    /// An equipment option writing `"<title> (<code>)"` into `field`.
    #[must_use]
    pub fn option(key: impl Into<String>, field: &str, title: &str, code: &str) -> Self {
        Self {
            key: ControlKey::new(key),
            kind: ControlKind::Option,
            label: title.to_string(),
            binding: FieldBinding::new(FieldName::new(field), format!("{} ({})", title, code)),
            code: Some(code.to_string()),
            edges: BTreeMap::new(),
        }
    }

    /// Give the option a second code, written while a second-code source is
    /// active.
    #[must_use]
    pub fn with_second_code(mut self, code: &str) -> Self {
        self.binding.second_value = Some(format!("{} ({})", self.label, code));
        self
    }

    /// Declare a forward relationship. Empty key lists are ignored.
    #[must_use]
    pub fn with_edge<I, K>(mut self, relation: Relation, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ControlKey>,
    {
        let keys: Vec<ControlKey> = keys.into_iter().map(Into::into).collect();
        if !keys.is_empty() {
            self.edges.entry(relation).or_default().extend(keys);
        }
        self
    }
}

// =============================================================================
// LAYOUT
// =============================================================================

/// The unresolved structure a registry is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub pages: Vec<PageSpec>,
    pub groups: Vec<GroupSpec>,
    pub controls: Vec<ControlSpec>,
}

impl Layout {
    /// Create an empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page.
    pub fn add_page(&mut self, label: impl Into<String>, kind: PageKind) -> PageId {
        let id = PageId(self.pages.len());
        self.pages.push(PageSpec {
            label: label.into(),
            kind,
            groups: Vec::new(),
        });
        id
    }

    /// Append a group to an existing page.
    pub fn add_group(
        &mut self,
        page: PageId,
        mode: GroupMode,
        label: impl Into<String>,
    ) -> Result<GroupId, TrimlineError> {
        let id = GroupId(self.groups.len());
        let page_spec = self
            .pages
            .get_mut(page.0)
            .ok_or_else(|| TrimlineError::InvalidProduct(format!("no page {}", page.0)))?;
        page_spec.groups.push(id);
        self.groups.push(GroupSpec {
            page,
            mode,
            label: label.into(),
            members: Vec::new(),
        });
        Ok(id)
    }

    /// Append a control to an existing group.
    pub fn add_control(
        &mut self,
        group: GroupId,
        spec: ControlSpec,
    ) -> Result<ControlId, TrimlineError> {
        if self.controls.len() >= MAX_CONTROLS {
            return Err(TrimlineError::InvalidProduct(format!(
                "control count exceeds maximum {}",
                MAX_CONTROLS
            )));
        }
        let id = ControlId(self.controls.len());
        let group_spec = self
            .groups
            .get_mut(group.0)
            .ok_or_else(|| TrimlineError::InvalidProduct(format!("no group {}", group.0)))?;
        group_spec.members.push(id);
        self.controls.push(spec);
        Ok(id)
    }

    /// Group index of a control.
    #[must_use]
    pub fn group_of(&self, control: ControlId) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|g| g.members.contains(&control))
            .map(GroupId)
    }

    /// Derive the layout of a product.
    pub fn from_product(
        product: &ProductData,
        default_page_size: usize,
    ) -> Result<Self, TrimlineError> {
        let mut layout = Self::new();
        layout.add_color_pages(product)?;
        layout.add_equipment_pages(product, default_page_size.max(1))?;
        layout.add_page("Summary", PageKind::Summary);
        Ok(layout)
    }

    fn add_color_pages(&mut self, product: &ProductData) -> Result<(), TrimlineError> {
        for tab in product.color_tabs() {
            if !tab.has_content() {
                continue;
            }
            let page = self.add_page(tab.title.clone().unwrap_or_default(), PageKind::Colors);

            for subgroup in &tab.subgroups {
                if subgroup.colors.is_empty() {
                    continue;
                }
                let group_name = tab.group_name(subgroup);
                let field = format!("tab-{}-color-{}", tab.index, subgroup.index);
                let group = self.add_group(page, GroupMode::Exclusive, group_name.clone())?;

                for (position, color) in subgroup.colors.iter().enumerate() {
                    let key = color
                        .color_id
                        .clone()
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| format!("{}-{}", field, position + 1));
                    let name = color
                        .color_name
                        .clone()
                        .unwrap_or_else(|| key.clone());
                    let spec = ControlSpec::color(key, &field, format!("{}: {}", group_name, name))
                        .with_edge(Relation::Deactivates, keys_of(&color.deactivate_colors))
                        .with_edge(Relation::RelatedOptions, keys_of(&color.related_options));
                    self.add_control(group, spec)?;
                }
            }
        }
        Ok(())
    }

    fn add_equipment_pages(
        &mut self,
        product: &ProductData,
        default_page_size: usize,
    ) -> Result<(), TrimlineError> {
        let mut current: Option<GroupId> = None;
        let mut page_count = 0usize;
        let mut filled = 0usize;

        for (index, option) in product.options.iter().enumerate() {
            let group = match current {
                Some(group) => group,
                None => {
                    let label = format!("{}{}", EQUIPMENT_PAGE_PREFIX, page_count + 1);
                    let page = self.add_page(label.clone(), PageKind::Equipment);
                    let group = self.add_group(page, GroupMode::Multiple, label)?;
                    current = Some(group);
                    group
                }
            };

            let field = format!("option-{}", index + 1);
            let key = option
                .button_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| field.clone());
            let title = option.title.clone().unwrap_or_default();
            let code = option.option_code.clone().unwrap_or_default();

            let mut spec = ControlSpec::option(key, &field, &title, &code)
                .with_edge(Relation::ColorFilter, keys_of(&option.filter_colors))
                .with_edge(
                    Relation::MutuallyExclusiveWith,
                    keys_of(&option.mutual_exclusion_option),
                )
                .with_edge(Relation::ActivatedBy, keys_of(&option.activator_option))
                .with_edge(
                    Relation::SecondCodeActivatedBy,
                    keys_of(&option.second_code_activator),
                )
                .with_edge(Relation::Requires, keys_of(&option.related));
            if let Some(second) = option.option_code_second.as_deref().filter(|s| !s.is_empty()) {
                spec = spec.with_second_code(second);
            }
            self.add_control(group, spec)?;

            filled += 1;
            if filled == product.options_page_size(page_count, default_page_size) {
                filled = 0;
                page_count += 1;
                current = None;
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
