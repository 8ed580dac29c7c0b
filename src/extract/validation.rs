//! Ingestion-time validation rules for raw watch events.

use crate::error::PipelineError;
use crate::models::WatchEvent;
use crate::transform::clean::parse_watch_date;

pub const REQUIRED_COLUMNS: [&str; 4] = [
    "user_id",
    "show_name",
    "watch_duration_minutes",
    "watch_date",
];

pub const MIN_WATCH_DURATION_MINUTES: f64 = 0.0;
pub const MAX_WATCH_DURATION_MINUTES: f64 = 1440.0;

/// Check every row against the ingestion rules. The first violation wins.
///
/// Null show names and durations pass; cleaning fills them.
pub fn validate_events(events: &[WatchEvent]) -> Result<(), PipelineError> {
    for (row, event) in events.iter().enumerate() {
        validate_event(row, event)?;
    }
    Ok(())
}

pub fn validate_event(row: usize, event: &WatchEvent) -> Result<(), PipelineError> {
    if event.user_id.trim().is_empty() {
        return Err(PipelineError::schema(format!(
            "column 'user_id' contains values shorter than minimum length at row {row}"
        )));
    }

    if matches!(event.show_name.as_deref(), Some("")) {
        return Err(PipelineError::schema(format!(
            "column 'show_name' contains values shorter than minimum length at row {row}"
        )));
    }

    if let Some(duration) = event.watch_duration_minutes.filter(|d| !d.is_nan()) {
        if duration < MIN_WATCH_DURATION_MINUTES {
            return Err(PipelineError::schema(format!(
                "column 'watch_duration_minutes' contains values below minimum at row {row}"
            )));
        }
        if duration > MAX_WATCH_DURATION_MINUTES {
            return Err(PipelineError::schema(format!(
                "column 'watch_duration_minutes' contains values above maximum at row {row}"
            )));
        }
    }

    if let Err(reason) = parse_watch_date(&event.watch_date) {
        return Err(PipelineError::schema(format!(
            "column 'watch_date' contains invalid datetime values at row {row}: {reason}"
        )));
    }

    Ok(())
}
