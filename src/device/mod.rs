//! Device access over its mass-storage volume
//!
//! The thermal cycler mounts as a small volume holding two files:
//!
//! - a write-only command file, driven by [`ControlChannel`]
//! - a read-only status file, read by [`StatusChannel`]
//!
//! The two channels touch disjoint files and are not transactionally
//! linked: a status read straight after a send may still show the state from
//! before the command until the firmware catches up. [`Device::upload`]
//! bridges that gap by waiting for the firmware to echo a program nonce.
//!
//! # Example
//!
//! ```ignore
//! use pcrlink::config::AppConfig;
//! use pcrlink::device::Device;
//!
//! let config = AppConfig::load_or_default();
//! let device = Device::open(&config.device, config.status.schema.clone())?;
//! let status = device.read_status()?;
//! println!("{} at {:?}C", status.state, status.block_temp);
//! ```

pub mod cache;
pub mod control;
pub mod record;
pub mod status;

pub use cache::{select_invalidator, CacheInvalidator, NoopInvalidator};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use cache::FadviseInvalidator;
pub use control::ControlChannel;
pub use record::{parse_status, split_fields, RunState, StatusRecord, StatusSchema};
pub use status::StatusChannel;

use crate::config::{DeviceConfig, UploadSettings};
use crate::error::{PcrError, Result};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Nonce values wrap back to 1 once the current one reaches this
pub const NONCE_WRAP: u32 = 100;

/// A mounted device with its two channels
#[derive(Debug)]
pub struct Device {
    mount_path: PathBuf,
    control: ControlChannel,
    status: StatusChannel,
}

impl Device {
    /// Open the device described by `config`.
    ///
    /// Fails with [`PcrError::DeviceNotReady`] when the mount point or its
    /// status file is missing.
    pub fn open(config: &DeviceConfig, schema: StatusSchema) -> Result<Self> {
        let device = Self::from_parts(
            config.mount_path.clone(),
            ControlChannel::new(config.control_path()),
            StatusChannel::new(config.status_path(), schema),
        );
        if !device.is_ready() {
            return Err(PcrError::DeviceNotReady(device.mount_path.clone()));
        }
        tracing::info!("Device ready at {:?}", device.mount_path);
        if !device.status.cache_invalidation_supported() {
            tracing::warn!("Status reads may be stale: page-cache invalidation unavailable");
        }
        Ok(device)
    }

    /// Assemble a device from explicit channels
    pub fn from_parts(mount_path: PathBuf, control: ControlChannel, status: StatusChannel) -> Self {
        Self {
            mount_path,
            control,
            status,
        }
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// Whether the mount point and status file are present
    pub fn is_ready(&self) -> bool {
        self.mount_path.is_dir() && self.status.path().is_file()
    }

    pub fn control(&self) -> &ControlChannel {
        &self.control
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn read_status(&self) -> Result<StatusRecord> {
        self.status.read_status()
    }

    pub fn send(&self, command: &str) -> Result<()> {
        self.control.send(command)
    }

    pub fn stop(&self) -> Result<()> {
        self.control.stop()
    }

    /// Send a command and wait for the firmware to acknowledge it.
    ///
    /// Tags the command with the next program nonce, sends it, then polls the
    /// status file until it can be decoded and checks the nonce it reports.
    /// Only malformed status reads (the firmware rewriting the file) are
    /// retried; I/O errors return immediately.
    ///
    /// Returns the acknowledged nonce, or `None` when `settings.verify` is off
    /// and the command was sent untouched.
    pub fn upload(&self, command: &str, settings: &UploadSettings) -> Result<Option<u32>> {
        if !settings.verify {
            self.send(command)?;
            return Ok(None);
        }

        let current = match self.read_status() {
            Ok(record) => record.nonce,
            Err(PcrError::StatusFormat(reason)) => {
                tracing::warn!("Could not read current program nonce: {}", reason);
                None
            }
            Err(e) => return Err(e),
        };
        let nonce = next_nonce(current);
        self.send(&with_nonce(command, nonce))?;

        tracing::info!("Waiting for device to acknowledge program nonce {}", nonce);
        thread::sleep(Duration::from_millis(settings.settle_ms));

        let deadline = Instant::now() + Duration::from_millis(settings.ack_timeout_ms);
        let retry = Duration::from_millis(settings.ack_retry_ms);
        loop {
            match self.read_status() {
                Ok(record) if record.nonce == Some(nonce) => {
                    tracing::info!("Program acknowledged (nonce {})", nonce);
                    return Ok(Some(nonce));
                }
                Ok(record) => {
                    return Err(PcrError::NotAcknowledged {
                        expected: nonce,
                        reported: record.nonce,
                    });
                }
                Err(PcrError::StatusFormat(reason)) => {
                    tracing::debug!("Device still rewriting status: {}", reason);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(PcrError::Timeout(format!(
                    "device did not report a readable status within {} ms of upload",
                    settings.ack_timeout_ms
                )));
            }
            thread::sleep(retry);
        }
    }
}

/// Next program nonce after `current`
pub fn next_nonce(current: Option<u32>) -> u32 {
    match current {
        Some(n) if n < NONCE_WRAP => n + 1,
        _ => 1,
    }
}

/// Set the `d=<nonce>` field of a command, keeping every other field in order
pub fn with_nonce(command: &str, nonce: u32) -> String {
    let mut fields: Vec<String> = command
        .split('&')
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    let tag = format!("d={}", nonce);
    match fields.iter_mut().find(|f| f.split('=').next() == Some("d")) {
        Some(field) => *field = tag,
        None => fields.push(tag),
    }
    fields.join("&")
}
