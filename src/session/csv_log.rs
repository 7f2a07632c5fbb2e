//! CSV status logging
//!
//! One line per status record: the configured columns joined by `", "`.
//! Missing values are written as empty cells so every line keeps the same
//! column count.

use crate::device::{RunState, StatusRecord, StatusSchema};
use chrono::{Local, NaiveTime};
use std::io::{self, Write};

/// Column separator
pub const SEPARATOR: &str = ", ";

/// A logged column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogField {
    /// Host wall-clock time of the read, `HH:MM:SS`
    Time,
    Elapsed,
    Remaining,
    TimeLeft,
    Cycle,
    BlockTemp,
    LidTemp,
    State,
    Job,
    Step,
    Program,
    Nonce,
    /// Any other status-file key, looked up verbatim
    Raw(String),
}

impl LogField {
    /// Map a column name from configuration to a field
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "time" | "currenttime" => LogField::Time,
            "elapsed" | "elapsedsecs" => LogField::Elapsed,
            "remaining" => LogField::Remaining,
            "time_left" | "timeleft" => LogField::TimeLeft,
            "cycle" => LogField::Cycle,
            "block_temp" | "blocktemp" => LogField::BlockTemp,
            "lid_temp" | "lidtemp" => LogField::LidTemp,
            "state" => LogField::State,
            "job" => LogField::Job,
            "step" | "currentstep" => LogField::Step,
            "program" => LogField::Program,
            "nonce" => LogField::Nonce,
            other => LogField::Raw(other.to_string()),
        }
    }

    /// Column name used in the header row
    pub fn name(&self) -> &str {
        match self {
            LogField::Time => "time",
            LogField::Elapsed => "elapsed",
            LogField::Remaining => "remaining",
            LogField::TimeLeft => "time_left",
            LogField::Cycle => "cycle",
            LogField::BlockTemp => "block_temp",
            LogField::LidTemp => "lid_temp",
            LogField::State => "state",
            LogField::Job => "job",
            LogField::Step => "step",
            LogField::Program => "program",
            LogField::Nonce => "nonce",
            LogField::Raw(key) => key,
        }
    }

    fn value(&self, record: &StatusRecord, schema: &StatusSchema, time: NaiveTime) -> String {
        fn opt<T: ToString>(v: Option<T>) -> String {
            v.map(|v| v.to_string()).unwrap_or_default()
        }

        match self {
            LogField::Time => time.format("%H:%M:%S").to_string(),
            LogField::Elapsed => opt(record.elapsed_secs),
            LogField::Remaining => opt(record.remaining_secs),
            LogField::TimeLeft => record.time_left(),
            LogField::Cycle => opt(record.cycle),
            LogField::BlockTemp => opt(record.block_temp),
            LogField::LidTemp => opt(record.lid_temp),
            LogField::State => record.state.to_string(),
            LogField::Job => opt(record.job.as_deref()),
            LogField::Step => opt(record.current_step.as_deref()),
            LogField::Program => opt(record.program.as_deref()),
            LogField::Nonce => opt(record.nonce),
            LogField::Raw(key) => opt(record.raw_field(schema, key)),
        }
    }
}

/// Whether a log session should end after seeing `record`
pub fn log_finished(record: &StatusRecord) -> bool {
    matches!(record.state, RunState::Complete | RunState::Inactive)
}

/// Writes status records as CSV lines
pub struct CsvLogger<W: Write> {
    writer: W,
    fields: Vec<LogField>,
    schema: StatusSchema,
    include_header: bool,
    header_written: bool,
    rows_written: u64,
}

impl<W: Write> CsvLogger<W> {
    /// Create a logger writing `fields` to `writer`
    pub fn new(writer: W, fields: Vec<LogField>, schema: StatusSchema) -> Self {
        Self {
            writer,
            fields,
            schema,
            include_header: false,
            header_written: false,
            rows_written: 0,
        }
    }

    /// Create a logger from configured column names
    pub fn from_names<S: AsRef<str>>(writer: W, names: &[S], schema: StatusSchema) -> Self {
        let fields = names.iter().map(|n| LogField::from_name(n.as_ref())).collect();
        Self::new(writer, fields, schema)
    }

    /// Emit a header row before the first record
    pub fn with_header(mut self, include_header: bool) -> Self {
        self.include_header = include_header;
        self
    }

    pub fn fields(&self) -> &[LogField] {
        &self.fields
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Format one record as a line, without a trailing newline
    pub fn format_line(&self, record: &StatusRecord, time: NaiveTime) -> String {
        self.fields
            .iter()
            .map(|f| f.value(record, &self.schema, time))
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }

    /// Write a record stamped with the current local time
    pub fn write_record(&mut self, record: &StatusRecord) -> io::Result<()> {
        self.write_record_at(record, Local::now().time())
    }

    /// Write a record stamped with `time`
    pub fn write_record_at(&mut self, record: &StatusRecord, time: NaiveTime) -> io::Result<()> {
        if self.include_header && !self.header_written {
            let header = self
                .fields
                .iter()
                .map(LogField::name)
                .collect::<Vec<_>>()
                .join(SEPARATOR);
            writeln!(self.writer, "{}", header)?;
            self.header_written = true;
        }

        let line = self.format_line(record, time);
        writeln!(self.writer, "{}", line)?;
        // Flush per row so `tail -f` and pipes see progress
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}
