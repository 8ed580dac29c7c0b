use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::PipelineError;
use crate::models::WatchEvent;

pub const UNKNOWN_SHOW: &str = "Unknown";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// A deduplicated, null-filled event with a coerced timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedEvent {
    pub event_id: Option<String>,
    pub user_id: String,
    pub show_name: String,
    pub watch_duration_minutes: f64,
    pub watch_date: DateTime<Utc>,
}

/// Every column of a raw row, in a hashable form.
#[derive(Hash, PartialEq, Eq)]
struct RowKey<'a> {
    event_id: Option<&'a str>,
    user_id: &'a str,
    show_name: Option<&'a str>,
    duration_bits: Option<u64>,
    watch_date: &'a str,
}

impl<'a> RowKey<'a> {
    fn of(event: &'a WatchEvent) -> Self {
        Self {
            event_id: event.event_id.as_deref(),
            user_id: &event.user_id,
            show_name: event.show_name.as_deref(),
            duration_bits: present_duration(event.watch_duration_minutes)
                .map(|d| if d == 0.0 { 0.0_f64.to_bits() } else { d.to_bits() }),
            watch_date: &event.watch_date,
        }
    }
}

/// NaN counts as a missing duration.
fn present_duration(value: Option<f64>) -> Option<f64> {
    value.filter(|d| !d.is_nan())
}

/// Clean a batch of raw events. Never touches the caller's slice.
pub fn clean_events(events: &[WatchEvent]) -> Result<Vec<CleanedEvent>, PipelineError> {
    if let Some(row) = events.iter().position(|e| e.user_id.trim().is_empty()) {
        return Err(PipelineError::schema(format!(
            "required field 'user_id' is empty at row {row}"
        )));
    }

    drop_duplicates(events)
        .into_iter()
        .map(|(row, event)| clean_event(row, event))
        .collect()
}

/// Drop exact duplicate rows, keeping the first occurrence and input order.
fn drop_duplicates(events: &[WatchEvent]) -> Vec<(usize, &WatchEvent)> {
    let mut seen = HashSet::with_capacity(events.len());
    events
        .iter()
        .enumerate()
        .filter(|(_, event)| seen.insert(RowKey::of(event)))
        .collect()
}

fn clean_event(row: usize, event: &WatchEvent) -> Result<CleanedEvent, PipelineError> {
    let watch_date =
        parse_watch_date(&event.watch_date).map_err(|reason| PipelineError::Parse {
            row,
            field: "watch_date",
            value: event.watch_date.clone(),
            reason,
        })?;

    let show_name = event.show_name.as_deref().unwrap_or(UNKNOWN_SHOW);

    Ok(CleanedEvent {
        event_id: event.event_id.clone(),
        user_id: event.user_id.clone(),
        show_name: title_case(show_name.trim()),
        watch_duration_minutes: present_duration(event.watch_duration_minutes).unwrap_or(0.0),
        watch_date,
    })
}

/// Parse a timestamp. Naive values are taken as UTC; offset values are converted to UTC.
pub fn parse_watch_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("empty timestamp".to_string());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err("unrecognized timestamp format".to_string())
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;

    for ch in value.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }

    out
}
