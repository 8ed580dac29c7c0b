pub mod validation;

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{Reader, StringRecord};
use serde_json::Value;

use crate::error::PipelineError;
use crate::models::{StreamEvent, WatchEvent};

use validation::{validate_event, validate_events, REQUIRED_COLUMNS};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const NA_VALUES: [&str; 3] = ["", "NA", "null"];

/// Reads raw watch events from a CSV file.
pub struct CsvExtractor {
    path: PathBuf,
    batch_size: usize,
}

/// Positions of the known columns in the CSV header.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    user_id: usize,
    show_name: usize,
    watch_duration_minutes: usize,
    watch_date: usize,
    event_id: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, PipelineError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let mut positions = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = find(column).ok_or_else(|| {
                PipelineError::schema(format!("required column '{column}' not found"))
            })?;
        }
        let [user_id, show_name, watch_duration_minutes, watch_date] = positions;

        Ok(Self {
            user_id,
            show_name,
            watch_duration_minutes,
            watch_date,
            event_id: find("event_id"),
        })
    }
}

fn not_na(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !NA_VALUES.contains(v))
}

fn parse_record(
    row: usize,
    record: &StringRecord,
    columns: &ColumnIndex,
) -> Result<WatchEvent, PipelineError> {
    let user_id = not_na(record.get(columns.user_id))
        .ok_or_else(|| PipelineError::schema(format!("missing 'user_id' at row {row}")))?;
    let watch_date = not_na(record.get(columns.watch_date))
        .ok_or_else(|| PipelineError::schema(format!("missing 'watch_date' at row {row}")))?;

    let watch_duration_minutes = not_na(record.get(columns.watch_duration_minutes))
        .map(|raw| {
            raw.trim().parse::<f64>().map_err(|_| {
                PipelineError::schema(format!(
                    "column 'watch_duration_minutes' must be numeric, got '{raw}' at row {row}"
                ))
            })
        })
        .transpose()?;

    Ok(WatchEvent {
        event_id: columns
            .event_id
            .and_then(|idx| not_na(record.get(idx)))
            .map(str::to_string),
        user_id: user_id.to_string(),
        show_name: not_na(record.get(columns.show_name)).map(str::to_string),
        watch_duration_minutes,
        watch_date: watch_date.to_string(),
    })
}

impl CsvExtractor {
    pub fn new(path: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            path: path.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<(Reader<File>, ColumnIndex), PipelineError> {
        let mut reader = Reader::from_path(&self.path)?;
        let columns = ColumnIndex::from_headers(reader.headers()?)?;
        Ok((reader, columns))
    }

    /// Read and validate the whole file.
    pub fn read_csv(&self) -> Result<Vec<WatchEvent>, PipelineError> {
        log_info!("Reading data from {}", self.path.display());

        let result = self.open().and_then(|(mut reader, columns)| {
            let mut events = Vec::new();
            for (row, record) in reader.records().enumerate() {
                events.push(parse_record(row, &record?, &columns)?);
            }
            validate_events(&events)?;
            Ok(events)
        });

        match &result {
            Ok(events) => log_info!("Successfully loaded {} records", events.len()),
            Err(err) => log_error!(
                "Pipeline error in extract ({}) for {}: {err}",
                err.kind(),
                self.path.display()
            ),
        }

        result
    }

    /// Read the file in validated chunks of `batch_size` rows.
    pub fn read_csv_in_batches(&self) -> Result<CsvBatches, PipelineError> {
        log_info!(
            "Reading data in batches of {} from {}",
            self.batch_size,
            self.path.display()
        );
        let (reader, columns) = self.open()?;
        Ok(CsvBatches {
            records: reader.into_records(),
            columns,
            batch_size: self.batch_size,
            next_row: 0,
            finished: false,
        })
    }
}

/// Iterator over validated CSV chunks. Stops after the first error.
pub struct CsvBatches {
    records: csv::StringRecordsIntoIter<File>,
    columns: ColumnIndex,
    batch_size: usize,
    next_row: usize,
    finished: bool,
}

impl CsvBatches {
    fn next_batch(&mut self) -> Result<Vec<WatchEvent>, PipelineError> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            let Some(record) = self.records.next() else {
                self.finished = true;
                break;
            };
            let event = parse_record(self.next_row, &record?, &self.columns)?;
            validate_event(self.next_row, &event)?;
            batch.push(event);
            self.next_row += 1;
        }

        Ok(batch)
    }
}

impl Iterator for CsvBatches {
    type Item = Result<Vec<WatchEvent>, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_batch() {
            Ok(batch) if batch.is_empty() => None,
            Ok(batch) => Some(Ok(batch)),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Parse and validate a single JSON watch event.
pub fn event_from_json(value: &Value) -> Result<WatchEvent, PipelineError> {
    let event: StreamEvent = serde_json::from_value(value.clone())?;
    let event = event.to_watch_event();
    validate_event(0, &event)?;
    Ok(event)
}

/// Parse either one JSON event object or an array of them.
pub fn events_from_json(value: &Value) -> Result<Vec<WatchEvent>, PipelineError> {
    match value {
        Value::Array(items) => {
            let events = items
                .iter()
                .map(|item| {
                    serde_json::from_value::<StreamEvent>(item.clone())
                        .map(|event| event.to_watch_event())
                })
                .collect::<Result<Vec<_>, _>>()?;
            validate_events(&events)?;
            Ok(events)
        }
        single => Ok(vec![event_from_json(single)?]),
    }
}
