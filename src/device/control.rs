//! Control channel
//!
//! Overwrites the device's command file with a command string and syncs it
//! to the medium before returning, so unplugging the device right after a
//! send never loses the command.

use crate::error::{PcrError, Result};
use crate::program::STOP_COMMAND;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write-only link to the device command file
#[derive(Debug, Clone)]
pub struct ControlChannel {
    path: PathBuf,
}

impl ControlChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the command file contents with `command` and sync.
    ///
    /// The file must already exist; it is never created, so a send against
    /// an unmounted mount point fails instead of writing to the host disk.
    pub fn send(&self, command: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| PcrError::device_io("open", &self.path, e))?;

        file.write_all(command.as_bytes())
            .map_err(|e| PcrError::device_io("write", &self.path, e))?;
        file.sync_all()
            .map_err(|e| PcrError::device_io("sync", &self.path, e))?;

        tracing::info!("Sent {} byte command to {:?}", command.len(), self.path);
        tracing::debug!("Command: {}", command);
        Ok(())
    }

    /// Send the fixed stop command
    pub fn stop(&self) -> Result<()> {
        self.send(STOP_COMMAND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CONTROL.TXT");
        std::fs::write(&path, "a much longer previous command string").unwrap();

        let channel = ControlChannel::new(&path);
        channel.send("s=ACGTC&c=start").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "s=ACGTC&c=start");
    }

    #[test]
    fn test_stop_sends_reserved_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CONTROL.TXT");
        std::fs::write(&path, "").unwrap();

        ControlChannel::new(&path).stop().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), STOP_COMMAND);
    }

    #[test]
    fn test_missing_command_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CONTROL.TXT");

        let err = ControlChannel::new(&path).send("s=ACGTC&c=stop").unwrap_err();
        assert!(err.is_device_io());
        assert!(!path.exists());
    }
}
