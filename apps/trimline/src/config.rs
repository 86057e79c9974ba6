//! # Configuration
//!
//! Optional `trimline.toml` file. Every section and key has a default, so an
//! empty or missing file yields a working configuration.
//!
//! ```toml
//! [engine]
//! unlock_scope = "scoped"
//!
//! [layout]
//! default_page_size = 9
//!
//! [viewer]
//! poll_interval_ms = 2000
//! timeout_ms = 30000
//! staging_timeout_ms = 600
//! settle_ms = 500
//! staging_hosts = ["webflow.io"]
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use trimline_core::{EngineConfig, SessionOptions, TrimlineError, primitives::DEFAULT_PAGE_SIZE};

/// Maximum config file size (64 KB).
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// `[layout]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub default_page_size: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// `[viewer]` section: readiness polling of the embedded 3D viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
    /// Timeout used when the page is served from a staging host.
    pub staging_timeout_ms: u64,
    /// Delay between the readiness signal and the initial-state replay.
    pub settle_ms: u64,
    pub staging_hosts: Vec<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            timeout_ms: 30_000,
            staging_timeout_ms: 600,
            settle_ms: 500,
            staging_hosts: vec!["webflow.io".to_string()],
        }
    }
}

impl ViewerConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Whether a page URL is served from one of the staging hosts.
    #[must_use]
    pub fn is_staging(&self, page_url: &str) -> bool {
        let Ok(url) = url::Url::parse(page_url) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        self.staging_hosts
            .iter()
            .any(|staging| host == staging || host.ends_with(&format!(".{}", staging)))
    }

    /// Readiness timeout for a page URL.
    #[must_use]
    pub fn timeout_for(&self, page_url: &str) -> Duration {
        if self.is_staging(page_url) {
            Duration::from_millis(self.staging_timeout_ms)
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub layout: LayoutConfig,
    pub viewer: ViewerConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, TrimlineError> {
        toml::from_str(text)
            .map_err(|e| TrimlineError::DeserializationError(format!("Invalid config: {}", e)))
    }

    /// Load the config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, TrimlineError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            TrimlineError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(TrimlineError::IoError(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            TrimlineError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Session settings derived from `[engine]` and `[layout]`.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            engine: self.engine,
            default_page_size: self.layout.default_page_size,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
