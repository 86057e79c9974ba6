//! # Storage
//!
//! Persistent state that outlives one configurator session.

mod session_cache;

pub use session_cache::SessionCache;
