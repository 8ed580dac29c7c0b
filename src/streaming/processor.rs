use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;

use crate::db::Database;
use crate::extract::validation::validate_events;
use crate::models::{ErrorEvent, ProcessedEvent, StreamEvent, WatchEvent};
use crate::transform::DataTransformer;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Turns buffered stream events into enriched records and publishes them.
///
/// Each window is transformed on its own, so per-user aggregates cover only the
/// events in that window.
pub struct StreamingProcessor {
    transformer: Arc<DataTransformer>,
    warehouse: Option<Database>,
    output_tx: mpsc::Sender<ProcessedEvent>,
    error_tx: mpsc::Sender<ErrorEvent>,
}

impl StreamingProcessor {
    pub fn new(
        transformer: DataTransformer,
        output_tx: mpsc::Sender<ProcessedEvent>,
        error_tx: mpsc::Sender<ErrorEvent>,
    ) -> Self {
        Self {
            transformer: Arc::new(transformer),
            warehouse: None,
            output_tx,
            error_tx,
        }
    }

    pub fn with_warehouse(mut self, warehouse: Database) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    pub async fn process_event(&self, event: StreamEvent) -> Result<Vec<ProcessedEvent>> {
        self.process_batch(vec![event]).await
    }

    /// Validate, transform, optionally load, then publish every processed record.
    pub async fn process_batch(&self, events: Vec<StreamEvent>) -> Result<Vec<ProcessedEvent>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let watch_events: Vec<WatchEvent> = events.iter().map(StreamEvent::to_watch_event).collect();
        validate_events(&watch_events).context("stream batch failed validation")?;

        let transformer = Arc::clone(&self.transformer);
        let records = tokio::task::spawn_blocking(move || transformer.transform_batch(&watch_events))
            .await
            .context("transform worker join failed")??;

        if let Some(warehouse) = &self.warehouse {
            let summary = warehouse
                .load_enriched(&records)
                .await
                .context("failed to load stream batch into warehouse")?;
            log_info!("Loaded {} stream facts into warehouse", summary.facts);
        }

        let processed_at = Utc::now();
        let processed: Vec<ProcessedEvent> = records
            .into_iter()
            .map(|record| ProcessedEvent { record, processed_at })
            .collect();

        for event in &processed {
            if self.output_tx.send(event.clone()).await.is_err() {
                log_warn!("output channel closed; dropping processed events");
                break;
            }
        }

        log_info!("Processed batch of {} events", processed.len());
        Ok(processed)
    }

    /// Process one window, reporting a failure on the error channel instead of
    /// returning it. Returns the number of records published.
    pub async fn flush(&self, events: Vec<StreamEvent>) -> Option<usize> {
        let originals = events
            .iter()
            .map(|event| serde_json::to_value(event).unwrap_or(serde_json::Value::Null))
            .collect::<Vec<_>>();

        match self.process_batch(events).await {
            Ok(processed) => Some(processed.len()),
            Err(err) => {
                log_error!("Error processing batch: {err:#}");
                let error_event = ErrorEvent {
                    error: format!("{err:#}"),
                    original_events: originals,
                    timestamp: Utc::now(),
                };
                if self.error_tx.send(error_event).await.is_err() {
                    log_warn!("error channel closed; dropping error event");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformConfig;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn processor() -> (
        StreamingProcessor,
        mpsc::Receiver<ProcessedEvent>,
        mpsc::Receiver<ErrorEvent>,
    ) {
        let (output_tx, output_rx) = mpsc::channel(64);
        let (error_tx, error_rx) = mpsc::channel(8);
        let processor = StreamingProcessor::new(
            DataTransformer::new(TransformConfig::default()),
            output_tx,
            error_tx,
        );
        (processor, output_rx, error_rx)
    }

    fn event(user: &str, minutes: f64) -> StreamEvent {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 21, 0, 0).unwrap();
        StreamEvent::new(user, "the crown", minutes, at)
    }

    #[tokio::test]
    async fn publishes_enriched_records() {
        let (processor, mut output_rx, _error_rx) = processor();

        let processed = processor
            .process_batch(vec![event("u1", 130.0), event("u1", 20.0)])
            .await
            .unwrap();

        assert_eq!(processed.len(), 2);
        let first = output_rx.recv().await.unwrap();
        assert_eq!(first.record.show_name, "The Crown");
        assert_eq!(first.record.total_sessions, 2);
        assert!(first.record.is_weekend);
        assert!(first.record.is_primetime);
        assert!(first.record.event_id.is_some());
    }

    #[tokio::test]
    async fn single_event_is_its_own_batch() {
        let (processor, _output_rx, _error_rx) = processor();
        let processed = processor.process_event(event("u1", 90.0)).await.unwrap();
        assert_eq!(processed[0].record.total_sessions, 1);
        assert_eq!(processed[0].record.completion_rate, 1.5);
    }

    #[tokio::test]
    async fn failed_window_goes_to_error_channel() {
        let (processor, _output_rx, mut error_rx) = processor();

        let published = processor
            .flush(vec![event("u1", 30.0), event("u2", 5000.0)])
            .await;
        assert!(published.is_none());

        let error = error_rx.recv().await.unwrap();
        assert_eq!(error.original_events.len(), 2);
        assert!(error.error.contains("watch_duration_minutes"));
        assert_eq!(error.original_events[1]["user_id"], "u2");
    }

    #[tokio::test]
    async fn loads_into_warehouse_when_configured() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("stream.sqlite3")).unwrap();
        let (processor, _output_rx, _error_rx) = processor();
        let processor = processor.with_warehouse(db.clone());

        processor.flush(vec![event("u1", 30.0), event("u2", 45.0)]).await;

        assert_eq!(db.count_watch_facts().await.unwrap(), 2);
    }
}
