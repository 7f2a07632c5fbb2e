//! Error handling for pcrlink
//!
//! This module defines the error taxonomy shared by the program compiler and
//! the device channels, plus a Result alias for use throughout the crate.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A malformed program text or a program the wire format cannot express.
///
/// `line` is the 1-based line of the program text when the problem comes
/// from the parser. Errors raised while compiling an already-built
/// [`Program`](crate::program::Program) carry no line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    pub line: Option<usize>,
    pub reason: String,
}

impl FormatError {
    /// Create an error pointing at a line of the program text
    pub fn at_line(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            reason: reason.into(),
        }
    }

    /// Create an error that is not tied to a source line
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            line: None,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for FormatError {}

/// Main error type for pcrlink operations
#[derive(Error, Debug)]
pub enum PcrError {
    /// Malformed program text
    #[error("Program format error: {0}")]
    Format(#[from] FormatError),

    /// Malformed or incomplete status payload
    #[error("Status format error: {0}")]
    StatusFormat(String),

    /// Open/read/write/sync failure against the mounted volume
    #[error("Device I/O error while trying to {op} {}: {source}", path.display())]
    DeviceIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A platform capability was required but is not available
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The mount point or its status file is missing
    #[error("Device not ready at {}", .0.display())]
    DeviceNotReady(PathBuf),

    /// The device reported a different program identifier than the one sent
    #[error("Device did not acknowledge program: sent nonce {expected}, device reports {reported:?}")]
    NotAcknowledged { expected: u32, reported: Option<u32> },

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PcrError>,
    },
}

impl PcrError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PcrError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a device I/O error for `path`
    pub fn device_io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PcrError::DeviceIo {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether the root cause is an I/O failure against the device volume.
    ///
    /// Callers use this to decide whether retrying on a delay is worthwhile.
    pub fn is_device_io(&self) -> bool {
        match self {
            PcrError::DeviceIo { .. } | PcrError::DeviceNotReady(_) => true,
            PcrError::WithContext { source, .. } => source.is_device_io(),
            _ => false,
        }
    }
}

/// Result type alias for pcrlink operations
pub type Result<T> = std::result::Result<T, PcrError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, FormatError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PcrError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| PcrError::from(e).with_context(f()))
    }
}
