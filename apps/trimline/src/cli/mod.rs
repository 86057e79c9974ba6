//! # Trimline CLI Module
//!
//! This module implements the CLI interface for Trimline.
//!
//! ## Available Commands
//!
//! - `inspect` - Show pages, groups, controls and unresolved edges
//! - `click` - Click controls in order and show the resulting selection
//! - `restore` - Replay the initial selection from a query or the cache
//! - `nav` - Drive the page navigation
//! - `cache` - Show the session cache
//! - `server` - Serve a configurator session over HTTP

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trimline_core::TrimlineError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trimline - boat configurator engine
///
/// Loads product data, resolves the option graph and runs click cascades
/// against it.
#[derive(Parser, Debug)]
#[command(name = "trimline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the product data JSON
    #[arg(short = 'p', long, global = true)]
    pub product: Option<PathBuf>,

    /// Path to the session cache database
    #[arg(short = 'C', long, global = true)]
    pub cache: Option<PathBuf>,

    /// Page query string (e.g. "id=42&options=C1-C2")
    #[arg(short = 'Q', long, global = true, default_value = "")]
    pub query: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved control graph
    Inspect,

    /// Click controls in order
    Click {
        /// Control keys to click (color-id or button-id)
        #[arg(required = true)]
        keys: Vec<String>,

        /// Replay the initial selection before clicking
        #[arg(short, long)]
        restore: bool,
    },

    /// Replay the initial selection
    Restore,

    /// Drive the page navigation
    Nav {
        /// Steps to take, in order (prev, next)
        #[arg(value_parser = ["prev", "next"])]
        steps: Vec<String>,

        /// Jump to a page index first
        #[arg(short, long, conflicts_with = "page")]
        jump: Option<usize>,

        /// Jump to a page by its label first
        #[arg(long)]
        page: Option<String>,
    },

    /// Show the session cache
    Cache,

    /// Start the session server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// URL of the product page
        #[arg(short = 'u', long, default_value = "http://localhost/")]
        page_url: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TrimlineError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let ctx = CommandContext {
        config,
        product: cli.product,
        cache: cli.cache,
        query: cli.query,
        json_mode: cli.json_mode,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Inspect) | None => cmd_inspect(&ctx),
        Some(Commands::Click { keys, restore }) => cmd_click(&ctx, &keys, restore),
        Some(Commands::Restore) => cmd_restore(&ctx),
        Some(Commands::Nav { steps, jump, page }) => cmd_nav(&ctx, &steps, jump, page.as_deref()),
        Some(Commands::Cache) => cmd_cache(&ctx),
        Some(Commands::Server {
            host,
            port,
            page_url,
        }) => cmd_server(&ctx, host, port, page_url).await,
    }
}
