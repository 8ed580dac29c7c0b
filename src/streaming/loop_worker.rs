use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::StreamEvent;

use super::buffer::EventBuffer;
use super::processor::StreamingProcessor;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub events_received: usize,
    pub batches_processed: usize,
    pub records_published: usize,
    pub failed_batches: usize,
}

impl StreamStats {
    fn record_flush(&mut self, outcome: Option<usize>) {
        match outcome {
            Some(published) => {
                self.batches_processed += 1;
                self.records_published += published;
            }
            None => self.failed_batches += 1,
        }
    }
}

async fn flush(processor: &StreamingProcessor, buffer: &mut EventBuffer, stats: &mut StreamStats) {
    if buffer.is_empty() {
        return;
    }
    let window = buffer.take();
    log_debug!("flushing window of {} events", window.len());
    stats.record_flush(processor.flush(window).await);
}

/// Buffer incoming events and flush a window when it fills up or ages out.
///
/// Cancellation or a closed input channel flushes whatever is buffered, then exits.
pub async fn streaming_loop(
    processor: StreamingProcessor,
    mut events_rx: mpsc::Receiver<StreamEvent>,
    mut buffer: EventBuffer,
    cancel_token: CancellationToken,
) -> StreamStats {
    let check_every = buffer
        .timeout()
        .clamp(MIN_CHECK_INTERVAL, MAX_CHECK_INTERVAL);
    let mut ticker = tokio::time::interval(check_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut stats = StreamStats::default();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("streaming loop shutting down");
                flush(&processor, &mut buffer, &mut stats).await;
                break;
            }
            maybe_event = events_rx.recv() => match maybe_event {
                Some(event) => {
                    stats.events_received += 1;
                    if buffer.push(event) {
                        flush(&processor, &mut buffer, &mut stats).await;
                    }
                }
                None => {
                    log_info!("input channel closed; draining buffer");
                    flush(&processor, &mut buffer, &mut stats).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if buffer.is_due(Instant::now()) {
                    flush(&processor, &mut buffer, &mut stats).await;
                }
            }
        }
    }

    log_info!(
        "streaming loop processed {} events in {} batches ({} failed)",
        stats.events_received,
        stats.batches_processed,
        stats.failed_batches
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorEvent, ProcessedEvent};
    use crate::transform::{DataTransformer, TransformConfig};
    use chrono::Utc;

    struct Harness {
        events_tx: mpsc::Sender<StreamEvent>,
        output_rx: mpsc::Receiver<ProcessedEvent>,
        error_rx: mpsc::Receiver<ErrorEvent>,
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<StreamStats>,
    }

    fn spawn(buffer: EventBuffer) -> Harness {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (output_tx, output_rx) = mpsc::channel(256);
        let (error_tx, error_rx) = mpsc::channel(16);
        let processor = StreamingProcessor::new(
            DataTransformer::new(TransformConfig::default()),
            output_tx,
            error_tx,
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(streaming_loop(processor, events_rx, buffer, cancel.clone()));
        Harness {
            events_tx,
            output_rx,
            error_rx,
            cancel,
            handle,
        }
    }

    fn event(user: &str, minutes: f64) -> StreamEvent {
        StreamEvent::new(user, "Dark", minutes, Utc::now())
    }

    #[tokio::test]
    async fn flushes_when_window_fills() {
        let mut h = spawn(EventBuffer::new(2, Duration::from_secs(3600)));

        h.events_tx.send(event("u1", 30.0)).await.unwrap();
        h.events_tx.send(event("u1", 40.0)).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), h.output_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.record.total_sessions, 2);

        h.cancel.cancel();
        let stats = h.handle.await.unwrap();
        assert_eq!(stats.batches_processed, 1);
        assert_eq!(stats.records_published, 2);
    }

    #[tokio::test]
    async fn flushes_when_window_ages_out() {
        let mut h = spawn(EventBuffer::new(100, Duration::from_millis(50)));

        h.events_tx.send(event("u1", 30.0)).await.unwrap();

        let processed = tokio::time::timeout(Duration::from_secs(5), h.output_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(processed.record.user_id, "u1");

        drop(h.events_tx);
        let stats = h.handle.await.unwrap();
        assert_eq!(stats.events_received, 1);
        assert_eq!(stats.batches_processed, 1);
    }

    #[tokio::test]
    async fn drains_buffer_on_cancel() {
        let mut h = spawn(EventBuffer::new(100, Duration::from_secs(3600)));

        for minutes in [10.0, 20.0, 30.0] {
            h.events_tx.send(event("u1", minutes)).await.unwrap();
        }
        // Let the loop pick the events up before cancelling.
        while h.events_tx.capacity() < 64 {
            tokio::task::yield_now().await;
        }
        h.cancel.cancel();

        let stats = h.handle.await.unwrap();
        assert_eq!(stats.events_received, 3);
        assert_eq!(stats.records_published, 3);

        let mut received = 0;
        while h.output_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }

    #[tokio::test]
    async fn failed_window_does_not_stop_the_loop() {
        let mut h = spawn(EventBuffer::new(1, Duration::from_secs(3600)));

        h.events_tx.send(event("u1", 9000.0)).await.unwrap();
        h.events_tx.send(event("u2", 30.0)).await.unwrap();
        drop(h.events_tx);

        let stats = h.handle.await.unwrap();
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.batches_processed, 1);

        let error = h.error_rx.recv().await.unwrap();
        assert_eq!(error.original_events.len(), 1);
        assert_eq!(h.output_rx.recv().await.unwrap().record.user_id, "u2");
    }
}
