//! Mock construction helpers
//!
//! A temporary directory stands in for the mounted device volume, and a
//! background thread plays the firmware by echoing uploaded nonces.

use pcrlink::config::{DeviceConfig, UploadSettings};
use pcrlink::device::{Device, StatusSchema};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

/// A device volume in a temporary directory
pub struct TestDevice {
    dir: TempDir,
    pub config: DeviceConfig,
}

impl TestDevice {
    /// Create a volume with an empty command file and the given status
    pub fn new(status: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp device dir");
        let config = DeviceConfig {
            mount_path: dir.path().to_path_buf(),
            ..DeviceConfig::default()
        };
        std::fs::write(config.control_path(), b"").expect("create command file");
        std::fs::write(config.status_path(), status).expect("create status file");
        Self { dir, config }
    }

    pub fn mount_path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn write_status(&self, status: &str) {
        std::fs::write(self.config.status_path(), status).expect("write status");
    }

    pub fn control_contents(&self) -> String {
        std::fs::read_to_string(self.config.control_path()).expect("read command file")
    }

    pub fn open(&self) -> Device {
        Device::open(&self.config, StatusSchema::default()).expect("open test device")
    }

    /// Start a firmware stand-in on this volume
    pub fn firmware(&self, behavior: FirmwareBehavior) -> SimulatedFirmware {
        SimulatedFirmware::start(self.config.clone(), behavior)
    }
}

/// How the simulated firmware reacts to an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareBehavior {
    /// Report the uploaded nonce straight away
    Acknowledge,
    /// Leave an unreadable status for a while, then acknowledge
    SlowAcknowledge { garbled_for: Duration },
    /// Report a different nonce than the one uploaded
    Reject,
}

/// Background thread echoing `d=` nonces from the command file into the status file
pub struct SimulatedFirmware {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedFirmware {
    fn start(config: DeviceConfig, behavior: FirmwareBehavior) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            let mut last_seen = String::new();
            while flag.load(Ordering::SeqCst) {
                let command = std::fs::read_to_string(config.control_path()).unwrap_or_default();
                if command != last_seen {
                    if let Some(nonce) = nonce_of(&command) {
                        respond(&config, behavior, nonce);
                    }
                    last_seen = command;
                }
                thread::sleep(Duration::from_millis(5));
            }
        });
        Self {
            running,
            handle: Some(handle),
        }
    }
}

impl Drop for SimulatedFirmware {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn nonce_of(command: &str) -> Option<u32> {
    command
        .split('&')
        .find_map(|field| field.strip_prefix("d="))
        .and_then(|v| v.parse().ok())
}

fn respond(config: &DeviceConfig, behavior: FirmwareBehavior, nonce: u32) {
    let status = |d: u32| format!("s=running&b=25.0&l=30&c=1&d={}", d);
    match behavior {
        FirmwareBehavior::Acknowledge => {
            let _ = std::fs::write(config.status_path(), status(nonce));
        }
        FirmwareBehavior::SlowAcknowledge { garbled_for } => {
            let _ = std::fs::write(config.status_path(), b"\0\0\0\0");
            thread::sleep(garbled_for);
            let _ = std::fs::write(config.status_path(), status(nonce));
        }
        FirmwareBehavior::Reject => {
            let _ = std::fs::write(config.status_path(), status(nonce + 7));
        }
    }
}

/// Upload timing shrunk for tests
pub fn fast_upload() -> UploadSettings {
    UploadSettings {
        verify: true,
        settle_ms: 200,
        ack_timeout_ms: 2000,
        ack_retry_ms: 10,
    }
}
