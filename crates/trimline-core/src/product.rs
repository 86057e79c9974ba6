//! # Product Data Model
//!
//! Typed view of the product-data object served by the backend.
//!
//! The object uses kebab-case keys. Color tabs are addressed by numbered keys
//! (`color-option-2-colors-1`, ...), so they are read from the flattened
//! remainder of the object instead of fixed fields. Every field is optional:
//! a missing or malformed entry only removes the feature it describes.

use crate::primitives::{COLOR_SUBGROUPS_PER_TAB, COLOR_TAB_COUNT};
use crate::{ControlKey, TrimlineError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Treat `null` like a missing list.
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Product ids arrive as strings or numbers depending on the CMS entry.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Repr>::deserialize(deserializer)?.map(|repr| match repr {
        Repr::Text(s) => s,
        Repr::Number(n) => n.to_string(),
    }))
}

// =============================================================================
// ENTRIES
// =============================================================================

/// Reference to another control by key.
///
/// Color edges carry `color-id`, option edges carry `button-id`; entries
/// without either are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeyRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_id: Option<String>,
}

impl KeyRef {
    /// Reference a color.
    #[must_use]
    pub fn color(id: impl Into<String>) -> Self {
        Self {
            color_id: Some(id.into()),
            button_id: None,
        }
    }

    /// Reference an option.
    #[must_use]
    pub fn option(id: impl Into<String>) -> Self {
        Self {
            color_id: None,
            button_id: Some(id.into()),
        }
    }

    /// The referenced key, if any.
    #[must_use]
    pub fn key(&self) -> Option<ControlKey> {
        self.color_id
            .as_deref()
            .or(self.button_id.as_deref())
            .filter(|s| !s.is_empty())
            .map(ControlKey::new)
    }
}

/// Collect the non-empty keys of a reference list.
#[must_use]
pub fn keys_of(refs: &[KeyRef]) -> Vec<ControlKey> {
    refs.iter().filter_map(KeyRef::key).collect()
}

/// An uploaded image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub url: Option<String>,
}

/// One color swatch of a color subgroup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ColorEntry {
    #[serde(default)]
    pub color_id: Option<String>,
    #[serde(default)]
    pub color_name: Option<String>,
    #[serde(default)]
    pub color_image: Option<ImageRef>,
    #[serde(default, rename = "color-1")]
    pub color_1: Option<String>,
    #[serde(default, rename = "color-2")]
    pub color_2: Option<String>,
    #[serde(default)]
    pub colors_divider: Option<bool>,
    #[serde(default)]
    pub text_on_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub deactivate_colors: Vec<KeyRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub related_options: Vec<KeyRef>,
}

/// One equipment option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OptionEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub button_id: Option<String>,
    #[serde(default)]
    pub option_code: Option<String>,
    #[serde(default)]
    pub option_code_second: Option<String>,
    #[serde(default, rename = "image-2d")]
    pub image_2d: Option<ImageRef>,
    #[serde(default, rename = "has-3d")]
    pub has_3d: Option<bool>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub filter_colors: Vec<KeyRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub mutual_exclusion_option: Vec<KeyRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub activator_option: Vec<KeyRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub second_code_activator: Vec<KeyRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub related: Vec<KeyRef>,
}

/// A preset selection applied when the page opens without a configuration
/// in its URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InitialSelection {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub initial_colors: Vec<KeyRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub initial_options: Vec<KeyRef>,
}

/// A header navigation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub text: String,
    pub link: String,
}

// =============================================================================
// COLOR TABS
// =============================================================================

/// A color subgroup: one exclusive group of swatches under a subtitle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorSubgroup {
    /// 1-based subgroup index inside the tab.
    pub index: usize,
    pub subtitle: Option<String>,
    pub colors: Vec<ColorEntry>,
}

/// A color tab: one navigation page with up to two subgroups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTab {
    /// 1-based tab index.
    pub index: usize,
    pub title: Option<String>,
    pub subgroups: Vec<ColorSubgroup>,
}

impl ColorTab {
    /// Whether the tab renders anything at all.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.title.is_some()
            || self
                .subgroups
                .iter()
                .any(|s| s.subtitle.is_some() || !s.colors.is_empty())
    }

    /// Group name used as the prefix of field values.
    ///
    /// The first subgroup falls back to the bare title; later subgroups
    /// without a subtitle get an empty prefix.
    #[must_use]
    pub fn group_name(&self, subgroup: &ColorSubgroup) -> String {
        let title = self.title.as_deref().unwrap_or_default();
        match &subgroup.subtitle {
            Some(sub) => format!(
                "{}{}{}",
                title,
                crate::primitives::GROUP_TITLE_SEPARATOR,
                sub
            ),
            None if subgroup.index == 1 => title.to_string(),
            None => String::new(),
        }
    }
}

// =============================================================================
// PRODUCT DATA
// =============================================================================

/// The product-data object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProductData {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub options: Vec<OptionEntry>,
    #[serde(default, rename = "options-count-tab-1")]
    pub options_count_tab_1: Option<usize>,
    #[serde(default, rename = "options-count-tab-2")]
    pub options_count_tab_2: Option<usize>,
    #[serde(default, rename = "options-count-tab-3")]
    pub options_count_tab_3: Option<usize>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub initial_colors_and_options: Vec<InitialSelection>,
    #[serde(default, rename = "technical-data-2")]
    pub technical_data: Option<String>,
    #[serde(default)]
    pub all_models_text: Option<String>,
    #[serde(default)]
    pub all_models_link: Option<String>,
    #[serde(default)]
    pub dealers_text: Option<String>,
    #[serde(default)]
    pub dealers_link: Option<String>,
    #[serde(default)]
    pub model_details_text: Option<String>,
    #[serde(default)]
    pub model_details_link: Option<String>,
    /// Everything else, including the numbered color-tab keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProductData {
    /// Parse product data from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TrimlineError> {
        serde_json::from_slice(bytes).map_err(|e| TrimlineError::InvalidProduct(e.to_string()))
    }

    /// Serialize product data back to JSON bytes (for the session cache).
    pub fn to_vec(&self) -> Result<Vec<u8>, TrimlineError> {
        serde_json::to_vec(self).map_err(|e| TrimlineError::SerializationError(e.to_string()))
    }

    fn extra_str(&self, key: &str) -> Option<String> {
        self.extra
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }

    fn extra_colors(&self, key: &str) -> Vec<ColorEntry> {
        self.extra
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value::<Option<Vec<ColorEntry>>>(v).ok())
            .flatten()
            .unwrap_or_default()
    }

    /// The color tabs, in order, including empty ones.
    #[must_use]
    pub fn color_tabs(&self) -> Vec<ColorTab> {
        (1..=COLOR_TAB_COUNT)
            .map(|tab| {
                let title = if tab == 1 {
                    self.extra_str("color-option-title")
                        .or_else(|| self.extra_str("color-option-1-title"))
                } else {
                    self.extra_str(&format!("color-option-{}-title", tab))
                };
                let subgroups = (1..=COLOR_SUBGROUPS_PER_TAB)
                    .map(|sub| ColorSubgroup {
                        index: sub,
                        subtitle: self.extra_str(&format!("color-option-{}-subtitle-{}", tab, sub)),
                        colors: self.extra_colors(&format!("color-option-{}-colors-{}", tab, sub)),
                    })
                    .collect();
                ColorTab {
                    index: tab,
                    title,
                    subgroups,
                }
            })
            .collect()
    }

    /// Page size override for the given 0-based equipment page.
    ///
    /// A zero count counts as absent.
    #[must_use]
    pub fn options_page_size(&self, page: usize, default_size: usize) -> usize {
        let count = match page {
            0 => self.options_count_tab_1,
            1 => self.options_count_tab_2,
            2 => self.options_count_tab_3,
            _ => None,
        };
        count.filter(|&c| c > 0).unwrap_or(default_size)
    }

    /// Control keys of the preset selection, colors before options per entry.
    #[must_use]
    pub fn initial_keys(&self) -> Vec<ControlKey> {
        self.initial_colors_and_options
            .iter()
            .flat_map(|entry| {
                keys_of(&entry.initial_colors)
                    .into_iter()
                    .chain(keys_of(&entry.initial_options))
            })
            .collect()
    }

    /// Header navigation links whose text and target are both present.
    #[must_use]
    pub fn nav_links(&self) -> Vec<NavLink> {
        [
            (&self.all_models_text, &self.all_models_link),
            (&self.dealers_text, &self.dealers_link),
            (&self.model_details_text, &self.model_details_link),
        ]
        .into_iter()
        .filter_map(|(text, link)| match (text, link) {
            (Some(text), Some(link)) if !text.is_empty() && !link.is_empty() => Some(NavLink {
                text: text.clone(),
                link: link.clone(),
            }),
            _ => None,
        })
        .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
