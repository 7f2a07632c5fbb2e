//! Status record decoding
//!
//! The device reports its state as a short text of `key=value` pairs joined
//! by `&` (some firmware revisions write one `key:value` pair per line
//! instead). The payload may be followed by NUL padding up to the file size.
//! Every read produces a fresh [`StatusRecord`]; nothing is carried over
//! between reads.
//!
//! Which key holds which field is described by a [`StatusSchema`] so that
//! firmware variants can be supported from configuration. Only the run-state
//! key is mandatory.

use crate::error::{PcrError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Device run state as reported in the status file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Complete,
    Stopped,
    Inactive,
    LidWait,
    Other(String),
}

impl RunState {
    /// Decode a run state, ignoring case
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => RunState::Running,
            "complete" => RunState::Complete,
            "stopped" => RunState::Stopped,
            "inactive" => RunState::Inactive,
            "lidwait" => RunState::LidWait,
            _ => RunState::Other(value.trim().to_string()),
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Complete => write!(f, "complete"),
            RunState::Stopped => write!(f, "stopped"),
            RunState::Inactive => write!(f, "inactive"),
            RunState::LidWait => write!(f, "lidwait"),
            RunState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Status file keys for each record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSchema {
    /// Run state (mandatory)
    pub state: String,
    /// What the device is doing right now (heating, cooling, holding)
    pub job: String,
    pub block_temp: String,
    pub lid_temp: String,
    /// Seconds since the program started
    pub elapsed: String,
    /// Seconds until the program finishes
    pub remaining: String,
    /// Name of the current step
    pub step: String,
    /// Current cycle number
    pub cycle: String,
    /// Name of the loaded program
    pub program: String,
    /// Program identifier echoed back after an upload
    pub nonce: String,
}

impl Default for StatusSchema {
    fn default() -> Self {
        Self {
            state: "s".into(),
            job: "t".into(),
            block_temp: "b".into(),
            lid_temp: "l".into(),
            elapsed: "e".into(),
            remaining: "r".into(),
            step: "p".into(),
            cycle: "c".into(),
            program: "n".into(),
            nonce: "d".into(),
        }
    }
}

/// Point-in-time snapshot of what the device reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub state: RunState,
    pub job: Option<String>,
    pub block_temp: Option<f64>,
    pub lid_temp: Option<f64>,
    pub elapsed_secs: Option<u64>,
    pub remaining_secs: Option<u64>,
    pub current_step: Option<String>,
    pub cycle: Option<u32>,
    pub program: Option<String>,
    pub nonce: Option<u32>,
    /// Fields the schema does not name, kept verbatim
    pub extra: BTreeMap<String, String>,
}

impl StatusRecord {
    /// Whether a program is still in progress
    pub fn is_active(&self) -> bool {
        !matches!(
            self.state,
            RunState::Complete | RunState::Stopped | RunState::Inactive
        )
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_secs.map(Duration::from_secs)
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_secs.map(Duration::from_secs)
    }

    /// Remaining time as `H:MM:SS`
    pub fn time_left(&self) -> String {
        let secs = self.remaining_secs.unwrap_or(0);
        format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }

    /// Look up any field by its status-file key, including unnamed ones
    pub fn raw_field(&self, schema: &StatusSchema, key: &str) -> Option<String> {
        let named: Option<String> = if key == schema.state {
            Some(self.state.to_string())
        } else if key == schema.job {
            self.job.clone()
        } else if key == schema.block_temp {
            self.block_temp.map(|v| v.to_string())
        } else if key == schema.lid_temp {
            self.lid_temp.map(|v| v.to_string())
        } else if key == schema.elapsed {
            self.elapsed_secs.map(|v| v.to_string())
        } else if key == schema.remaining {
            self.remaining_secs.map(|v| v.to_string())
        } else if key == schema.step {
            self.current_step.clone()
        } else if key == schema.cycle {
            self.cycle.map(|v| v.to_string())
        } else if key == schema.program {
            self.program.clone()
        } else if key == schema.nonce {
            self.nonce.map(|v| v.to_string())
        } else {
            None
        };
        named.or_else(|| self.extra.get(key).cloned())
    }
}

/// Split raw status bytes into ordered `(key, value)` pairs.
///
/// Stops at the first NUL. Pairs are separated by `&` or line breaks; key and
/// value by the first `=` or `:`. Fragments without a separator are skipped.
pub fn split_fields(raw: &[u8]) -> Vec<(String, String)> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let text = String::from_utf8_lossy(&raw[..end]);

    text.split(['&', '\n', '\r'])
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .filter_map(|field| {
            let at = field.find(['=', ':'])?;
            let (key, value) = (&field[..at], &field[at + 1..]);
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Decode raw status bytes into a record
pub fn parse_status(raw: &[u8], schema: &StatusSchema) -> Result<StatusRecord> {
    let mut fields: BTreeMap<String, String> = split_fields(raw).into_iter().collect();

    let state = fields
        .remove(schema.state.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            PcrError::StatusFormat(format!("missing run state field `{}`", schema.state))
        })?;

    let mut take_text = |key: &str| fields.remove(key).filter(|v| !v.is_empty());
    let job = take_text(schema.job.as_str());
    let current_step = take_text(schema.step.as_str());
    let program = take_text(schema.program.as_str());
    let block_temp = take_text(schema.block_temp.as_str());
    let lid_temp = take_text(schema.lid_temp.as_str());
    let elapsed = take_text(schema.elapsed.as_str());
    let remaining = take_text(schema.remaining.as_str());
    let cycle = take_text(schema.cycle.as_str());
    let nonce = take_text(schema.nonce.as_str());

    Ok(StatusRecord {
        state: RunState::parse(&state),
        job,
        block_temp: parse_number(&schema.block_temp, block_temp)?,
        lid_temp: parse_number(&schema.lid_temp, lid_temp)?,
        elapsed_secs: parse_number(&schema.elapsed, elapsed)?,
        remaining_secs: parse_number(&schema.remaining, remaining)?,
        current_step,
        cycle: parse_number(&schema.cycle, cycle)?,
        program,
        nonce: parse_number(&schema.nonce, nonce)?,
        extra: fields,
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(v) => v.parse::<T>().map(Some).map_err(|_| {
            PcrError::StatusFormat(format!("field `{}` has non-numeric value `{}`", key, v))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING: &[u8] =
        b"d=12&s=running&l=100&b=94.5&t=holding&e=620&r=3800&p=Denature&c=7&n=Canonical PCR&o=5\0\0\0\0";

    #[test]
    fn test_parse_running_status() {
        let record = parse_status(RUNNING, &StatusSchema::default()).unwrap();
        assert_eq!(record.state, RunState::Running);
        assert!(record.is_active());
        assert_eq!(record.block_temp, Some(94.5));
        assert_eq!(record.lid_temp, Some(100.0));
        assert_eq!(record.elapsed_secs, Some(620));
        assert_eq!(record.remaining_secs, Some(3800));
        assert_eq!(record.cycle, Some(7));
        assert_eq!(record.nonce, Some(12));
        assert_eq!(record.current_step.as_deref(), Some("Denature"));
        assert_eq!(record.program.as_deref(), Some("Canonical PCR"));
        assert_eq!(record.job.as_deref(), Some("holding"));
        assert_eq!(record.extra.get("o").map(String::as_str), Some("5"));
        assert_eq!(record.time_left(), "1:03:20");
    }

    #[test]
    fn test_line_oriented_layout() {
        let raw = b"s: complete\nb: 4.0\n\nunknown: yes\n";
        let record = parse_status(raw, &StatusSchema::default()).unwrap();
        assert_eq!(record.state, RunState::Complete);
        assert!(!record.is_active());
        assert_eq!(record.block_temp, Some(4.0));
        assert_eq!(record.cycle, None);
    }

    #[test]
    fn test_missing_state_is_error() {
        let err = parse_status(b"b=20.0&l=30", &StatusSchema::default()).unwrap_err();
        assert!(matches!(err, PcrError::StatusFormat(_)));
        let err = parse_status(b"\0\0\0", &StatusSchema::default()).unwrap_err();
        assert!(matches!(err, PcrError::StatusFormat(_)));
    }

    #[test]
    fn test_bad_number_is_error() {
        let err = parse_status(b"s=running&b=hot", &StatusSchema::default()).unwrap_err();
        assert!(err.to_string().contains("`b`"));
    }

    #[test]
    fn test_custom_schema() {
        let schema = StatusSchema {
            state: "state".into(),
            block_temp: "block".into(),
            ..StatusSchema::default()
        };
        let record = parse_status(b"state:Running\nblock:55.5\n", &schema).unwrap();
        assert_eq!(record.state, RunState::Running);
        assert_eq!(record.block_temp, Some(55.5));
        assert_eq!(record.raw_field(&schema, "block").as_deref(), Some("55.5"));
    }

    #[test]
    fn test_run_state_is_case_insensitive() {
        assert_eq!(RunState::parse("Complete"), RunState::Complete);
        assert_eq!(RunState::parse("LIDWAIT"), RunState::LidWait);
        assert_eq!(RunState::parse("warming"), RunState::Other("warming".into()));
    }

    #[test]
    fn test_stopped_and_inactive_are_not_active() {
        let schema = StatusSchema::default();
        assert!(!parse_status(b"s=stopped", &schema).unwrap().is_active());
        assert!(!parse_status(b"s=inactive", &schema).unwrap().is_active());
        assert!(parse_status(b"s=lidwait", &schema).unwrap().is_active());
    }
}
