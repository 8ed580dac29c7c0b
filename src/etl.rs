use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::db::{Database, LoadSummary};
use crate::extract::CsvExtractor;
use crate::load::DatasetWriter;
use crate::models::{EnrichedWatchRecord, WatchEvent};
use crate::transform::DataTransformer;
use crate::utils::StepTimer;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Totals for one ETL run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EtlSummary {
    pub batches: usize,
    pub input_rows: usize,
    pub output_rows: usize,
    pub files_written: usize,
    pub warehouse: Option<LoadSummary>,
    pub duration_secs: f64,
}

/// Extract, transform and load a CSV watch log.
///
/// In batch mode every chunk is transformed on its own, so per-user aggregates are
/// scoped to the chunk, not the whole file.
pub struct EtlPipeline {
    extractor: CsvExtractor,
    transformer: Arc<DataTransformer>,
    writer: DatasetWriter,
    warehouse: Option<Database>,
    batch_mode: bool,
}

impl EtlPipeline {
    pub fn new(extractor: CsvExtractor, transformer: DataTransformer, writer: DatasetWriter) -> Self {
        Self {
            extractor,
            transformer: Arc::new(transformer),
            writer,
            warehouse: None,
            batch_mode: false,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            CsvExtractor::new(&config.raw_data_path, config.batch_size),
            DataTransformer::new(config.transform_config()),
            DatasetWriter::by_month_and_day(&config.processed_data_path),
        )
    }

    pub fn with_warehouse(mut self, warehouse: Database) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    pub fn batch_mode(mut self, enabled: bool) -> Self {
        self.batch_mode = enabled;
        self
    }

    pub async fn run(&self) -> Result<EtlSummary> {
        let timer = StepTimer::start("ETL pipeline");

        let result = if self.batch_mode {
            self.run_batches().await
        } else {
            self.run_full().await
        };

        match result {
            Ok(mut summary) => {
                summary.duration_secs = timer.finish();
                log_info!(
                    "ETL pipeline completed: {} input rows, {} output rows in {} batch(es)",
                    summary.input_rows,
                    summary.output_rows,
                    summary.batches
                );
                Ok(summary)
            }
            Err(err) => {
                log_error!("ETL pipeline failed: {err:#}");
                Err(err)
            }
        }
    }

    async fn run_full(&self) -> Result<EtlSummary> {
        let extract = StepTimer::start("extract");
        let events = self.extractor.read_csv().context("extract failed")?;
        extract.finish();

        let mut summary = EtlSummary::default();
        self.process_chunk(events, &mut summary).await?;
        Ok(summary)
    }

    async fn run_batches(&self) -> Result<EtlSummary> {
        let mut summary = EtlSummary::default();
        let batches = self
            .extractor
            .read_csv_in_batches()
            .context("failed to open input for batch read")?;

        for batch in batches {
            let events = batch.context("extract failed")?;
            log_info!("Processing batch {} ({} rows)", summary.batches + 1, events.len());
            self.process_chunk(events, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn process_chunk(&self, events: Vec<WatchEvent>, summary: &mut EtlSummary) -> Result<()> {
        let input_rows = events.len();

        let transform = StepTimer::start("transform");
        let transformer = Arc::clone(&self.transformer);
        let records = tokio::task::spawn_blocking(move || transformer.transform_batch(&events))
            .await
            .context("transform worker join failed")?
            .context("transform failed")?;
        transform.finish();

        let load = StepTimer::start("load");
        let files = self.writer.write(&records).context("dataset write failed")?;
        let loaded = self.load_warehouse(&records).await?;
        load.finish();

        summary.batches += 1;
        summary.input_rows += input_rows;
        summary.output_rows += records.len();
        summary.files_written += files.len();
        if let Some(loaded) = loaded {
            let total = summary.warehouse.get_or_insert_with(LoadSummary::default);
            total.facts += loaded.facts;
            total.users += loaded.users;
            total.shows += loaded.shows;
        }
        Ok(())
    }

    async fn load_warehouse(&self, records: &[EnrichedWatchRecord]) -> Result<Option<LoadSummary>> {
        match &self.warehouse {
            Some(warehouse) => {
                let loaded = warehouse
                    .load_enriched(records)
                    .await
                    .context("warehouse load failed")?;
                Ok(Some(loaded))
            }
            None => Ok(None),
        }
    }
}
