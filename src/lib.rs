//! # pcrlink: host-side control for file-driven thermal cyclers
//!
//! The cycler shows up as a small mounted volume. Writing a command string to
//! its control file starts or stops a run; the firmware continuously rewrites
//! a status file describing what it is doing.
//!
//! ## Architecture
//!
//! - **Program**: hand-authored cycling programs are parsed into a tree of
//!   steps and repeat blocks, then compiled to the firmware's wire string
//! - **Device**: the control channel writes and syncs commands; the status
//!   channel reads fresh status past the host page cache
//! - **Session**: consumers of status records (poll loop, text display, CSV log)
//!
//! ## Configuration
//!
//! Settings live in `config.toml` under the platform config directory, in a
//! `pcrlink` subdirectory:
//!
//! - **Linux**: `~/.config/pcrlink/`
//! - **macOS**: `~/Library/Application Support/pcrlink/`
//! - **Windows**: `%APPDATA%\pcrlink\`
//!
//! ## Example
//!
//! ```ignore
//! use pcrlink::{config::AppConfig, device::Device, program};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load_or_default();
//!     let device = Device::open(&config.device, config.status.schema.clone())?;
//!
//!     let text = std::fs::read_to_string("pcr.txt")?;
//!     let program = program::parse_program(&text)?;
//!     let command = program::WireCompiler::new(config.compiler.description_policy)
//!         .compile(&program)?;
//!     device.upload(&command, &config.upload)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod program;
pub mod session;

// Re-export commonly used types
pub use config::AppConfig;
pub use device::{ControlChannel, Device, RunState, StatusChannel, StatusRecord};
pub use error::{FormatError, PcrError, Result};
pub use program::{parse_program, Program, WireCompiler};
