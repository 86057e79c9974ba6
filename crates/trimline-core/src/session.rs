//! # Session Module
//!
//! One configurator page: the engine, the navigation view and the one-shot
//! initial-state replay.
//!
//! The session is built once from product data and lives for the whole
//! page. Nothing here blocks; the caller decides when the viewer is ready
//! and then calls `apply_initial_state` exactly once.

use crate::engine::{CascadeReport, Configurator, EngineConfig, Trigger};
use crate::layout::Layout;
use crate::navigation::{Direction, Pager, PagerView};
use crate::primitives::DEFAULT_PAGE_SIZE;
use crate::product::{NavLink, ProductData};
use crate::registry::OptionRegistry;
use crate::restore::{RestorePlan, RestoreReport, replay};
use crate::sync::QueryString;
use crate::{ControlKey, TrimlineError};
use serde::{Deserialize, Serialize};

/// Settings for building a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub engine: EngineConfig,
    /// Options per equipment page when the product sets no count.
    pub default_page_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "page", rename_all = "lowercase")]
pub enum NavCommand {
    Prev,
    Next,
    Jump(usize),
}

/// A configurator session.
#[derive(Debug, Clone)]
pub struct Session {
    product_id: Option<String>,
    configurator: Configurator,
    pager: Pager,
    preset_keys: Vec<ControlKey>,
    nav_links: Vec<NavLink>,
    technical_data: Option<String>,
    restored: bool,
}

impl Session {
    /// Build a session from product data and the page query string.
    pub fn from_product(
        product: &ProductData,
        query: QueryString,
        options: SessionOptions,
    ) -> Result<Self, TrimlineError> {
        let layout = Layout::from_product(product, options.default_page_size)?;
        let registry = OptionRegistry::build(&layout)?;
        let mut session = Self::new(registry, query, options.engine);
        session.product_id = product.id.clone();
        session.preset_keys = product.initial_keys();
        session.nav_links = product.nav_links();
        session.technical_data = product
            .technical_data
            .clone()
            .filter(|text| !text.trim().is_empty());
        Ok(session)
    }

    /// Build a session over an existing registry.
    #[must_use]
    pub fn new(registry: OptionRegistry, query: QueryString, engine: EngineConfig) -> Self {
        let pager = Pager::new(registry.pages());
        Self {
            product_id: None,
            configurator: Configurator::new(registry, query, engine),
            pager,
            preset_keys: Vec::new(),
            nav_links: Vec::new(),
            technical_data: None,
            restored: false,
        }
    }

    /// Click a control as the user.
    pub fn click(&mut self, key: &ControlKey) -> Result<CascadeReport, TrimlineError> {
        self.configurator.click_key(key, Trigger::User)
    }

    /// Move the navigation. Returns `false` when nothing changed.
    pub fn navigate(&mut self, command: NavCommand) -> Result<bool, TrimlineError> {
        match command {
            NavCommand::Prev => Ok(self.pager.step(Direction::Prev)),
            NavCommand::Next => Ok(self.pager.step(Direction::Next)),
            NavCommand::Jump(index) => self.pager.jump(index),
        }
    }

    /// Jump to the page with the given label.
    pub fn navigate_to_label(&mut self, label: &str) -> Result<bool, TrimlineError> {
        self.pager.jump_to_label(label)
    }

    /// Replay the initial selection once.
    ///
    /// Returns `None` if the session was already restored.
    pub fn apply_initial_state(&mut self, cached_keys: &[ControlKey]) -> Option<RestoreReport> {
        if self.restored {
            return None;
        }
        self.restored = true;
        let query = self.configurator.outputs().query().clone();
        let plan = RestorePlan::new(self.configurator.registry(), &query, cached_keys);
        Some(replay(&mut self.configurator, plan))
    }

    #[must_use]
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    #[must_use]
    pub fn product_id(&self) -> Option<&str> {
        self.product_id.as_deref()
    }

    /// Control keys of the product's preset selection.
    #[must_use]
    pub fn preset_keys(&self) -> &[ControlKey] {
        &self.preset_keys
    }

    #[must_use]
    pub fn nav_links(&self) -> &[NavLink] {
        &self.nav_links
    }

    /// Technical data text shown next to the configurator.
    #[must_use]
    pub fn technical_data(&self) -> Option<&str> {
        self.technical_data.as_deref()
    }

    #[must_use]
    pub fn configurator(&self) -> &Configurator {
        &self.configurator
    }

    #[must_use]
    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    #[must_use]
    pub fn pager_view(&self) -> PagerView {
        self.pager.view()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::RestoreSource;

    fn product() -> ProductData {
        let json = serde_json::json!({
            "id": 7,
            "color-option-title": "Hull",
            "color-option-1-colors-1": [
                { "color-id": "white", "color-name": "White" },
                { "color-id": "navy", "color-name": "Navy" }
            ],
            "options": [
                { "title": "Radar", "button-id": "radar", "option-code": "R1" },
                { "title": "Sonar", "button-id": "sonar", "option-code": "S1" }
            ],
            "initial-colors-and-options": [
                { "initial-colors": [{ "color-id": "navy" }] }
            ],
            "technical-data-2": "Length: 7.2 m"
        });
        serde_json::from_value(json).expect("product")
    }

    #[test]
    fn session_builds_pages_and_presets() {
        let session = Session::from_product(&product(), QueryString::new(), SessionOptions::default())
            .expect("session");

        assert_eq!(session.product_id(), Some("7"));
        assert_eq!(session.preset_keys(), &[ControlKey::new("navy")]);
        assert_eq!(session.technical_data(), Some("Length: 7.2 m"));
        let labels: Vec<&str> = session
            .pager()
            .entries()
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Hull", "Equipment - 1", "Summary"]);
    }

    #[test]
    fn navigation_by_label() {
        let mut session = Session::from_product(&product(), QueryString::new(), SessionOptions::default())
            .expect("session");

        assert_eq!(session.navigate_to_label("Equipment - 1"), Ok(true));
        assert_eq!(session.pager_view().current, 1);
        assert!(matches!(
            session.navigate_to_label("Engines"),
            Err(TrimlineError::UnknownPage(_))
        ));
        assert_eq!(session.pager_view().current, 1);
    }

    #[test]
    fn initial_state_applies_once() {
        let mut session =
            Session::from_product(&product(), QueryString::parse("id=7"), SessionOptions::default())
                .expect("session");
        let keys = session.preset_keys().to_vec();

        let report = session.apply_initial_state(&keys).expect("first replay");
        assert_eq!(report.source, RestoreSource::CachedKeys);
        assert_eq!(
            session.configurator().outputs().form_value("tab-1-color-1"),
            Some("Hull: Navy")
        );
        assert!(session.apply_initial_state(&keys).is_none());
    }

    #[test]
    fn navigation_commands_drive_the_pager() {
        let mut session = Session::from_product(&product(), QueryString::new(), SessionOptions::default())
            .expect("session");
        assert_eq!(session.navigate(NavCommand::Prev), Ok(false));
        assert_eq!(session.navigate(NavCommand::Next), Ok(true));
        assert_eq!(session.navigate(NavCommand::Jump(2)), Ok(true));
        assert!(session.pager_view().next_hidden);
        assert!(session.navigate(NavCommand::Jump(5)).is_err());
    }
}
