//! Status consumers
//!
//! Everything that turns a stream of status records into something a person
//! or a file can use: the poll loop, the text renderer and the CSV logger.

pub mod csv_log;
pub mod display;
pub mod monitor;

pub use csv_log::{log_finished, CsvLogger, LogField};
pub use display::{render_monitor, render_status};
pub use monitor::{Monitor, MonitorSummary, StopReason};
