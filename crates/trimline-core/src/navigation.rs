//! # Navigation
//!
//! Page-by-page navigation over the configurator pages.
//!
//! The pager only tracks which page is current; it owns no option state.
//! Prev is hidden on the first page, next on the last. Moving past either
//! end and jumping to the current page are no-ops.

use crate::layout::PageKind;
use crate::registry::Page;
use crate::{PageId, TrimlineError};
use serde::{Deserialize, Serialize};

/// Direction of a prev/next move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Prev,
    Next,
}

/// One navigation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    pub id: PageId,
    pub label: String,
    pub kind: PageKind,
}

/// What the navigation shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerView {
    pub current: usize,
    pub total: usize,
    pub label: String,
    pub prev_hidden: bool,
    pub next_hidden: bool,
    /// "N of M", 1-based.
    pub indicator: String,
}

/// Current page over an ordered page list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    entries: Vec<NavEntry>,
    current: usize,
}

impl Pager {
    /// Build a pager from registry pages, starting on the first one.
    #[must_use]
    pub fn new(pages: &[Page]) -> Self {
        Self {
            entries: pages
                .iter()
                .map(|p| NavEntry {
                    id: p.id,
                    label: p.label.clone(),
                    kind: p.kind,
                })
                .collect(),
            current: 0,
        }
    }

    /// Move one page. Returns `false` at either end.
    pub fn step(&mut self, direction: Direction) -> bool {
        let target = match direction {
            Direction::Prev => self.current.checked_sub(1),
            Direction::Next => Some(self.current + 1).filter(|&i| i < self.entries.len()),
        };
        match target {
            Some(index) => {
                self.current = index;
                true
            }
            None => false,
        }
    }

    /// Jump to a page by index. Returns `false` if it is already current.
    pub fn jump(&mut self, index: usize) -> Result<bool, TrimlineError> {
        if index >= self.entries.len() {
            return Err(TrimlineError::PageOutOfRange(index, self.entries.len()));
        }
        if index == self.current {
            return Ok(false);
        }
        self.current = index;
        Ok(true)
    }

    /// Jump to the page with the given label.
    pub fn jump_to_label(&mut self, label: &str) -> Result<bool, TrimlineError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.label == label)
            .ok_or_else(|| TrimlineError::UnknownPage(label.to_string()))?;
        self.jump(index)
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[NavEntry] {
        &self.entries
    }

    #[must_use]
    pub fn prev_hidden(&self) -> bool {
        self.current == 0
    }

    #[must_use]
    pub fn next_hidden(&self) -> bool {
        self.current + 1 >= self.entries.len()
    }

    /// Snapshot of the indicators.
    #[must_use]
    pub fn view(&self) -> PagerView {
        PagerView {
            current: self.current,
            total: self.total(),
            label: self
                .entries
                .get(self.current)
                .map(|e| e.label.clone())
                .unwrap_or_default(),
            prev_hidden: self.prev_hidden(),
            next_hidden: self.next_hidden(),
            indicator: format!("{} of {}", self.current + 1, self.total()),
        }
    }
}
