//! # trimline-core
//!
//! The deterministic option engine for Trimline - THE LOGIC.
//!
//! This crate turns boat product data into a graph of clickable controls
//! (colors and equipment options) and decides, for every click, which
//! controls activate, release, lock or unlock. The resulting selection is
//! mirrored into the hidden lead form and the page query string.
//!
//! ## Pipeline
//!
//! `ProductData` → `Layout` → `OptionRegistry` → `Configurator`
//! (`SelectionState` + propagation + `SyncOutputs`) → `Session`
//! (navigation + initial-state replay).
//!
//! ## Architectural Constraints
//!
//! - The relationship graph is resolved once; nothing searches by key while
//!   a cascade runs
//! - State is an explicit table, never encoded in identifiers
//! - Every cascade is guarded and terminates on cyclic edges
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod engine;
pub mod layout;
pub mod navigation;
pub mod primitives;
pub mod product;
pub mod registry;
pub mod restore;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ControlId, ControlKey, ControlKind, FieldBinding, FieldName, GroupId, GroupMode, PageId,
    Relation, TrimlineError,
};

// =============================================================================
// RE-EXPORTS: Product Model
// =============================================================================

pub use layout::{ControlSpec, Layout, PageKind};
pub use product::{ColorEntry, KeyRef, NavLink, OptionEntry, ProductData};
pub use registry::{Control, ControlGroup, OptionRegistry, Page, UnresolvedEdge, UnresolvedReason};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use engine::{CascadeReport, Configurator, Effect, EngineConfig, Trigger, UnlockScope};
pub use state::{Activation, ControlState, LockReason, SelectionState};
pub use sync::{FieldChange, QueryString, SelectionSnapshot, SyncOutputs, fold};

// =============================================================================
// RE-EXPORTS: Session
// =============================================================================

pub use navigation::{Direction, NavEntry, Pager, PagerView};
pub use restore::{RestorePlan, RestoreReport, RestoreSource, replay};
pub use session::{NavCommand, Session, SessionOptions};
pub use storage::SessionCache;
