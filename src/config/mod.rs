//! Configuration module for pcrlink
//!
//! Settings are read from a TOML file. Every table and key is optional; what
//! is missing falls back to the defaults in [`settings`].
//!
//! # Config Location
//!
//! The file is looked up in the platform configuration directory:
//! - **Linux**: `~/.config/pcrlink/config.toml`
//! - **macOS**: `~/Library/Application Support/pcrlink/config.toml`
//! - **Windows**: `%APPDATA%\pcrlink\config.toml`
//!
//! The `--config <path>` flag reads another file instead.
//!
//! # Example
//!
//! ```toml
//! [device]
//! mount_path = "/run/media/lab/OPENPCR"
//!
//! [compiler]
//! description_policy = "pass_through"
//!
//! [log]
//! fields = ["time", "block_temp", "lid_temp"]
//! include_header = true
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{PcrError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the platform config directory
pub const APP_DIR: &str = "pcrlink";

/// Config file name
pub const CONFIG_FILE: &str = "config.toml";

// ==================== Config Location ====================

/// Default config file path, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub compiler: CompilerConfig,
    pub status: StatusConfig,
    pub monitor: MonitorConfig,
    pub log: LogConfig,
    pub upload: UploadSettings,
}

impl AppConfig {
    /// Create a configuration with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PcrError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PcrError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load configuration from `path`.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an
    /// error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PcrError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Write configuration to `path`, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                PcrError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, self.to_toml()?)
            .map_err(|e| PcrError::Config(format!("Failed to write config: {}", e)))
    }

    /// Replace the device mount point
    pub fn with_mount_path(mut self, mount_path: impl Into<PathBuf>) -> Self {
        self.device.mount_path = mount_path.into();
        self
    }
}

// ==================== Tests ====================
