//! # Trimline - Boat Configurator
//!
//! The main binary for the Trimline option engine.
//!
//! This application provides:
//! - CLI interface for inspecting products and replaying clicks
//! - HTTP session server (axum-based)
//! - Viewer readiness polling before the initial selection is replayed
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/trimline (THE BINARY)               │
//! │                                                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐  │
//! │  │    CLI      │   │  HTTP API   │   │    Viewer     │  │
//! │  │   (clap)    │   │   (axum)    │   │ (tokio timer) │  │
//! │  └──────┬──────┘   └──────┬──────┘   └───────┬───────┘  │
//! │         └─────────────────┼──────────────────┘          │
//! │                           ▼                             │
//! │                  ┌────────────────┐                     │
//! │                  │ trimline-core  │                     │
//! │                  │  (THE LOGIC)   │                     │
//! │                  └────────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Show the resolved control graph
//! trimline -p product.json inspect
//!
//! # Click controls and show the cascades
//! trimline -p product.json -Q "id=42" click white radar
//!
//! # Serve a session
//! trimline -p product.json -C cache.redb server --port 8080
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trimline::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // TRIMLINE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TRIMLINE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trimline=info,trimline_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Trimline startup banner.
fn print_banner() {
    println!(
        r#"
  ▀█▀ █▀█ █ █▀▄▀█ █   █ █▄ █ █▀▀
   █  █▀▄ █ █ ▀ █ █▄▄ █ █ ▀█ ██▄

  Boat configurator v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
