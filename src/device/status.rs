//! Status channel
//!
//! Reads the device's status file wholesale on every call, after asking the
//! kernel to forget any cached pages for it. The file is reopened per read so
//! no descriptor-level state survives between polls.

use super::cache::{select_invalidator, CacheInvalidator};
use super::record::{parse_status, StatusRecord, StatusSchema};
use crate::error::{PcrError, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read-only link to the device status file
#[derive(Debug)]
pub struct StatusChannel {
    path: PathBuf,
    schema: StatusSchema,
    invalidator: Box<dyn CacheInvalidator>,
}

impl StatusChannel {
    /// Create a channel using the platform's invalidation strategy
    pub fn new(path: impl Into<PathBuf>, schema: StatusSchema) -> Self {
        Self::with_invalidator(path, schema, select_invalidator())
    }

    /// Create a channel with an explicit invalidation strategy
    pub fn with_invalidator(
        path: impl Into<PathBuf>,
        schema: StatusSchema,
        invalidator: Box<dyn CacheInvalidator>,
    ) -> Self {
        let path = path.into();
        tracing::debug!(
            "Status channel on {:?} (cache invalidation: {})",
            path,
            invalidator.name()
        );
        Self {
            path,
            schema,
            invalidator,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &StatusSchema {
        &self.schema
    }

    /// Whether consecutive reads observe fresh device content.
    ///
    /// When false, reads after the first may keep returning the last known
    /// value. This is a platform limitation, not an error.
    pub fn cache_invalidation_supported(&self) -> bool {
        self.invalidator.is_supported()
    }

    /// Fail with [`PcrError::UnsupportedPlatform`] if reads may be stale
    pub fn require_coherent_reads(&self) -> Result<()> {
        if self.cache_invalidation_supported() {
            Ok(())
        } else {
            Err(PcrError::UnsupportedPlatform(
                "this platform cannot invalidate the page cache for the status file".to_string(),
            ))
        }
    }

    /// Read the raw status bytes, bypassing stale cached pages
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        let mut file =
            File::open(&self.path).map_err(|e| PcrError::device_io("open", &self.path, e))?;
        self.invalidator
            .invalidate(&file)
            .map_err(|e| PcrError::device_io("invalidate cached pages of", &self.path, e))?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .map_err(|e| PcrError::device_io("read", &self.path, e))?;
        Ok(raw)
    }

    /// Read and decode a fresh status record
    pub fn read_status(&self) -> Result<StatusRecord> {
        let raw = self.read_raw()?;
        parse_status(&raw, &self.schema)
    }
}
