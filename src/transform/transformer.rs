use crate::error::PipelineError;
use crate::models::{EnrichedWatchRecord, WatchEvent};

use super::aggregate::{BatchAggregator, UserAggregator};
use super::clean::clean_events;
use super::config::TransformConfig;
use super::features::engineer_features;
use super::scoring::{clamp_completion_rates, compute_metrics};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Runs cleaning, feature engineering and metric calculation over one batch.
///
/// Every call is independent: per-user aggregates only see the rows passed in.
pub struct DataTransformer<A: UserAggregator = BatchAggregator> {
    config: TransformConfig,
    aggregator: A,
}

impl DataTransformer<BatchAggregator> {
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            aggregator: BatchAggregator,
        }
    }
}

impl Default for DataTransformer<BatchAggregator> {
    fn default() -> Self {
        Self::new(TransformConfig::default())
    }
}

impl<A: UserAggregator> DataTransformer<A> {
    pub fn with_aggregator(config: TransformConfig, aggregator: A) -> Self {
        Self { config, aggregator }
    }

    /// Transform a full table of raw events.
    pub fn transform(&self, events: &[WatchEvent]) -> Result<Vec<EnrichedWatchRecord>, PipelineError> {
        log_info!("Starting data transformation of {} records", events.len());

        match self.run_stages(events) {
            Ok(records) => {
                log_info!("Successfully transformed {} records", records.len());
                Ok(records)
            }
            Err(err) => {
                log_error!("Pipeline error in transform ({}): {err}", err.kind());
                Err(err)
            }
        }
    }

    /// Transform one chunk or buffered window. Same semantics as `transform`.
    pub fn transform_batch(&self, batch: &[WatchEvent]) -> Result<Vec<EnrichedWatchRecord>, PipelineError> {
        self.transform(batch)
    }

    fn run_stages(&self, events: &[WatchEvent]) -> Result<Vec<EnrichedWatchRecord>, PipelineError> {
        let cleaned = clean_events(events)?;
        log_debug!("cleaning kept {} of {} rows", cleaned.len(), events.len());

        let rows = engineer_features(cleaned, &self.config, &self.aggregator);
        let mut records = compute_metrics(rows, &self.config);

        if self.config.clamp_completion_rate {
            clamp_completion_rates(&mut records);
        }

        Ok(records)
    }
}
