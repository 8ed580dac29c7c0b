use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::StreamEvent;

use super::buffer::EventBuffer;
use super::loop_worker::{streaming_loop, StreamStats};
use super::processor::StreamingProcessor;

pub struct StreamingController {
    handle: Option<JoinHandle<StreamStats>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for StreamingController {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the streaming loop and hand back the sender that feeds it.
    pub fn start(
        &mut self,
        processor: StreamingProcessor,
        buffer: EventBuffer,
        channel_capacity: usize,
    ) -> Result<mpsc::Sender<StreamEvent>> {
        if self.handle.is_some() {
            bail!("streaming already active");
        }

        let cancel_token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(channel_capacity.max(1));

        let handle = tokio::spawn(streaming_loop(
            processor,
            events_rx,
            buffer,
            cancel_token.clone(),
        ));
        info!("Streaming processor started");

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(events_tx)
    }

    /// Wait for the loop to finish on its own, which happens once every input
    /// sender is dropped.
    pub async fn join(&mut self) -> Result<StreamStats> {
        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => handle.await.context("streaming loop task failed to join"),
            None => Ok(StreamStats::default()),
        }
    }

    /// Cancel the loop, let it flush what is buffered, and wait for it.
    pub async fn stop(&mut self) -> Result<StreamStats> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => {
                let stats = handle.await.context("streaming loop task failed to join")?;
                info!("Streaming processor stopped");
                Ok(stats)
            }
            None => Ok(StreamStats::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{DataTransformer, TransformConfig};
    use chrono::Utc;
    use tokio::time::Duration;

    fn processor() -> (StreamingProcessor, mpsc::Receiver<crate::models::ProcessedEvent>) {
        let (output_tx, output_rx) = mpsc::channel(64);
        let (error_tx, _error_rx) = mpsc::channel(8);
        (
            StreamingProcessor::new(
                DataTransformer::new(TransformConfig::default()),
                output_tx,
                error_tx,
            ),
            output_rx,
        )
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut controller = StreamingController::new();
        let (first, _rx1) = processor();
        let (second, _rx2) = processor();

        let _events = controller
            .start(first, EventBuffer::new(10, Duration::from_secs(60)), 16)
            .unwrap();
        assert!(controller.is_running());
        assert!(controller
            .start(second, EventBuffer::default(), 16)
            .is_err());

        controller.stop().await.unwrap();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn closing_input_flushes_pending_events() {
        let mut controller = StreamingController::new();
        let (processor, mut output_rx) = processor();

        let events = controller
            .start(processor, EventBuffer::new(10, Duration::from_secs(60)), 16)
            .unwrap();
        events
            .send(StreamEvent::new("u1", "Dark", 30.0, Utc::now()))
            .await
            .unwrap();
        drop(events);

        let stats = controller.join().await.unwrap();
        assert_eq!(stats.records_published, 1);
        assert_eq!(output_rx.recv().await.unwrap().record.user_id, "u1");
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut controller = StreamingController::new();
        assert_eq!(controller.stop().await.unwrap(), StreamStats::default());
    }
}
