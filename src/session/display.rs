//! Human-readable status rendering

use crate::device::{RunState, StatusRecord};

/// Render a one-shot status summary.
///
/// Finished and idle devices get a single line; anything else gets the full
/// program/step/temperature breakdown.
pub fn render_status(record: &StatusRecord) -> String {
    match record.state {
        RunState::Complete => "Program complete.".to_string(),
        RunState::Stopped | RunState::Inactive => "System idle. No program running.".to_string(),
        _ => render_details(record),
    }
}

/// Render the live monitor screen
pub fn render_monitor(record: &StatusRecord) -> String {
    let body = if record.is_active() {
        render_details(record)
    } else {
        "Run finished.".to_string()
    };
    format!(
        "pcrlink monitor\n\n{}\n\n(Press any key to exit monitor mode)",
        body
    )
}

fn render_details(record: &StatusRecord) -> String {
    let mut lines = vec![
        format!("Current Program: {}", text_or_unknown(&record.program)),
        format!(
            "Step '{}' of cycle {}",
            text_or_unknown(&record.current_step),
            record
                .cycle
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".to_string())
        ),
        format!(
            "Currently: {}",
            record.job.as_deref().unwrap_or(&record.state.to_string())
        ),
        format!(
            "Block: {}, Lid: {}",
            temperature(record.block_temp),
            temperature(record.lid_temp)
        ),
        format!("Remaining Time: {}", record.time_left()),
    ];
    if let RunState::Other(state) = &record.state {
        lines.insert(0, format!("State: {}", state));
    }
    lines.join("\n")
}

fn text_or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("?")
}

fn temperature(value: Option<f64>) -> String {
    match value {
        Some(t) => format!("{:.1}°C", t),
        None => "?".to_string(),
    }
}
