//! Configuration sections
//!
//! Each struct maps to one TOML table of the configuration file. Every field
//! has a default, so a partial file (or none at all) is always valid.
//!
//! # Main Types
//!
//! - [`DeviceConfig`] - Where the device is mounted and what its files are called
//! - [`CompilerConfig`] - Wire compiler options
//! - [`StatusConfig`] - Status file schema and read coherency requirements
//! - [`MonitorConfig`] - Live monitor polling
//! - [`LogConfig`] - CSV logging columns and cadence
//! - [`UploadSettings`] - Acknowledged upload timing

use crate::device::StatusSchema;
use crate::program::DescriptionPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default mount point of the device volume
pub const DEFAULT_MOUNT_PATH: &str = "/media/OPENPCR";

/// Default command file name
pub const DEFAULT_CONTROL_FILE: &str = "CONTROL.TXT";

/// Default status file name
pub const DEFAULT_STATUS_FILE: &str = "STATUS.TXT";

// ==================== Device ====================

/// Device volume location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub mount_path: PathBuf,
    pub control_file: String,
    pub status_file: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mount_path: PathBuf::from(DEFAULT_MOUNT_PATH),
            control_file: DEFAULT_CONTROL_FILE.to_string(),
            status_file: DEFAULT_STATUS_FILE.to_string(),
        }
    }
}

impl DeviceConfig {
    /// Full path of the command file
    pub fn control_path(&self) -> PathBuf {
        self.mount_path.join(&self.control_file)
    }

    /// Full path of the status file
    pub fn status_path(&self) -> PathBuf {
        self.mount_path.join(&self.status_file)
    }
}

// ==================== Compiler ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// How step descriptions containing wire delimiters are handled
    pub description_policy: DescriptionPolicy,
}

// ==================== Status ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Status file key for each record field
    #[serde(flatten)]
    pub schema: StatusSchema,

    /// Refuse to read status on platforms that cannot bypass the page cache
    pub require_cache_invalidation: bool,
}

// ==================== Monitor ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ==================== Log ====================

/// CSV logging options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Seconds between rows
    pub interval_secs: u64,

    /// Column names, see [`crate::session::LogField`]
    pub fields: Vec<String>,

    /// Write a header row before the first record
    pub include_header: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            fields: ["time", "elapsed", "cycle", "block_temp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            include_header: false,
        }
    }
}

impl LogConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ==================== Upload ====================

/// Timing of the acknowledged upload handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Tag uploads with a nonce and wait for the device to echo it
    pub verify: bool,

    /// Pause after sending before the first status poll
    pub settle_ms: u64,

    /// Give up if the status stays unreadable this long
    pub ack_timeout_ms: u64,

    /// Delay between status polls while waiting
    pub ack_retry_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            verify: true,
            settle_ms: 2000,
            ack_timeout_ms: 5000,
            ack_retry_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_paths() {
        let device = DeviceConfig::default();
        assert_eq!(
            device.control_path(),
            PathBuf::from("/media/OPENPCR/CONTROL.TXT")
        );
        assert_eq!(
            device.status_path(),
            PathBuf::from("/media/OPENPCR/STATUS.TXT")
        );
    }

    #[test]
    fn test_log_defaults() {
        let log = LogConfig::default();
        assert_eq!(log.fields, vec!["time", "elapsed", "cycle", "block_temp"]);
        assert_eq!(log.interval(), Duration::from_secs(1));
        assert!(!log.include_header);
    }

    #[test]
    fn test_status_schema_is_flattened() {
        let status: StatusConfig =
            toml::from_str("state = \"state\"\nrequire_cache_invalidation = true\n").unwrap();
        assert_eq!(status.schema.state, "state");
        assert_eq!(status.schema.block_temp, "b");
        assert!(status.require_cache_invalidation);
    }
}
