//! # Trimline
//!
//! The application layer around `trimline-core`: configuration, the CLI,
//! the session server and viewer readiness polling.

pub mod api;
pub mod cli;
pub mod config;
pub mod viewer;
