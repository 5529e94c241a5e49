//! Configuration loading
//!
//! TOML configuration with graceful degradation: a missing config file never
//! prevents startup; defaults are used and a warning is logged. A malformed
//! file is a hard error so typos are not silently ignored.
//!
//! Resolution priority:
//! 1. Explicit path passed by the caller
//! 2. `QPROC_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/qproc/config.toml`)
//! 4. Compiled defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default backend request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

/// Backend gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the backend API (e.g. `https://example.org`)
    pub base_url: String,
    /// Token sent as `Authorization: Token <value>` when present
    pub api_token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "qproc_store=debug")
    pub level: String,
    /// Optional log file path; stderr when absent
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Load configuration following the resolution priority order
    ///
    /// Missing files degrade to defaults; a present but malformed file is an
    /// error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load_file(path);
        }

        if let Ok(env_path) = std::env::var("QPROC_CONFIG") {
            return Self::load_file(Path::new(&env_path));
        }

        let default_path = Self::default_path();
        match &default_path {
            Some(path) if path.exists() => Self::load_file(path),
            _ => {
                warn!(
                    path = ?default_path,
                    "No config file found, using compiled defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Parse one TOML file
    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Platform default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("qproc").join("config.toml"))
    }
}
