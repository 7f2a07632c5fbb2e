//! Status poll loop
//!
//! Blocks on a status read, hands the record to a callback, sleeps until the
//! next tick and repeats. The loop runs while a shared `running` flag stays
//! set. The flag is checked before every read and throughout every sleep,
//! never in the middle of a read.
//!
//! # Error handling
//!
//! A malformed status payload usually means the firmware was caught
//! mid-rewrite; it is logged and the loop moves on to the next tick. Device
//! I/O errors end the loop and are returned to the caller unchanged.

use crate::device::{StatusChannel, StatusRecord};
use crate::error::{PcrError, Result};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep between cancellation checks
pub const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// Why a monitor run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The `running` flag was cleared
    Cancelled,
    /// The callback returned [`ControlFlow::Break`]
    Finished,
}

/// Counters for a finished monitor run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    pub polls: u64,
    pub records: u64,
    pub malformed: u64,
    pub reason: StopReason,
}

/// Periodic status poller
#[derive(Debug)]
pub struct Monitor<'a> {
    channel: &'a StatusChannel,
    interval: Duration,
}

impl<'a> Monitor<'a> {
    /// Create a monitor polling `channel` every `interval`
    pub fn new(channel: &'a StatusChannel, interval: Duration) -> Self {
        Self { channel, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until `running` is cleared or `on_record` breaks
    pub fn run<F>(&self, running: &AtomicBool, mut on_record: F) -> Result<MonitorSummary>
    where
        F: FnMut(&StatusRecord) -> ControlFlow<()>,
    {
        tracing::info!(
            "Monitor started on {:?} every {:?}",
            self.channel.path(),
            self.interval
        );

        let mut polls = 0;
        let mut records = 0;
        let mut malformed = 0;

        let reason = loop {
            if !running.load(Ordering::SeqCst) {
                break StopReason::Cancelled;
            }

            let tick = Instant::now();
            polls += 1;
            match self.channel.read_status() {
                Ok(record) => {
                    records += 1;
                    if on_record(&record).is_break() {
                        break StopReason::Finished;
                    }
                }
                Err(PcrError::StatusFormat(reason)) => {
                    malformed += 1;
                    tracing::warn!("Skipping unreadable status: {}", reason);
                }
                Err(e) => {
                    tracing::info!("Monitor stopped after {} polls: {}", polls, e);
                    return Err(e);
                }
            }

            if !self.sleep_until(tick + self.interval, running) {
                break StopReason::Cancelled;
            }
        };

        tracing::info!("Monitor stopped after {} polls ({:?})", polls, reason);
        Ok(MonitorSummary {
            polls,
            records,
            malformed,
            reason,
        })
    }

    /// Sleep until `deadline` in short slices; false if cancelled meanwhile
    fn sleep_until(&self, deadline: Instant, running: &AtomicBool) -> bool {
        loop {
            if !running.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_CHECK_SLICE));
        }
    }
}
