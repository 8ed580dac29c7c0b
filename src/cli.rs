use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::db::Database;
use crate::etl::EtlPipeline;
use crate::generate::{SampleDataGenerator, DEFAULT_NUM_RECORDS};
use crate::streaming::{EventBuffer, StreamingController, StreamingProcessor};
use crate::transform::DataTransformer;
use crate::utils::init_logging;

const STREAM_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "watchflow", version, about = "Watch-session ETL and streaming pipeline", long_about = None)]
pub struct Cli {
    /// JSON settings file; defaults apply when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a synthetic watch log CSV
    Generate {
        #[arg(long, default_value_t = DEFAULT_NUM_RECORDS)]
        records: usize,
        /// Defaults to the configured raw data path
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run the batch ETL over a CSV watch log
    Etl {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Transform the input in chunks of `batch_size` rows
        #[arg(long)]
        batch: bool,
        /// Also load the results into the SQLite warehouse
        #[arg(long)]
        warehouse: bool,
    },

    /// Feed generated events through the streaming processor
    Stream {
        #[arg(long, default_value_t = 250)]
        events: usize,
        #[arg(long)]
        warehouse: bool,
    },

    /// Print warehouse analytics as JSON
    Report {
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        show: Option<String>,
    },
}

impl Cli {
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        let config = PipelineConfig::load(cli.config.as_deref())?;
        init_logging(&config.log_level, config.log_file.as_deref())?;

        let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
        runtime.block_on(cli.command.execute(config))
    }
}

impl Commands {
    async fn execute(self, config: PipelineConfig) -> Result<()> {
        match self {
            Commands::Generate {
                records,
                output,
                seed,
            } => {
                let path = output.unwrap_or(config.raw_data_path);
                let mut generator = match seed {
                    Some(seed) => SampleDataGenerator::with_seed(records, seed),
                    None => SampleDataGenerator::new(records),
                };
                let written = generator
                    .write_csv(&path)
                    .with_context(|| format!("failed to write sample data to {}", path.display()))?;
                println!("Generated {written} sample records at {}", path.display());
            }
            Commands::Etl {
                input,
                output,
                batch,
                warehouse,
            } => {
                let config = PipelineConfig {
                    raw_data_path: input.unwrap_or(config.raw_data_path),
                    processed_data_path: output.unwrap_or(config.processed_data_path),
                    ..config
                };

                let mut etl = EtlPipeline::from_config(&config).batch_mode(batch);
                if warehouse {
                    etl = etl.with_warehouse(Database::new(config.database_path.clone())?);
                }

                let summary = etl.run().await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Commands::Stream { events, warehouse } => {
                run_stream_demo(&config, events, warehouse).await?;
            }
            Commands::Report { days, user, show } => {
                let db = Database::new(config.database_path.clone())?;
                let summary = db.analytics_summary(days, user.clone(), show.clone()).await?;
                let user = match user {
                    Some(user_id) => db.user_analytics(&user_id, days).await?,
                    None => None,
                };
                let show = match show {
                    Some(show_name) => db.show_analytics(&show_name, days).await?,
                    None => None,
                };

                let report = json!({
                    "days": days,
                    "summary": summary,
                    "user": user,
                    "show": show,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Ok(())
    }
}

async fn run_stream_demo(config: &PipelineConfig, count: usize, warehouse: bool) -> Result<()> {
    let (output_tx, mut output_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let (error_tx, mut error_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

    let mut processor = StreamingProcessor::new(
        DataTransformer::new(config.transform_config()),
        output_tx,
        error_tx,
    );
    if warehouse {
        processor = processor.with_warehouse(Database::new(config.database_path.clone())?);
    }

    let consumer = tokio::spawn(async move {
        let mut published = 0usize;
        while let Some(event) = output_rx.recv().await {
            log::debug!(
                "processed {} {} engagement={:.3}",
                event.record.user_id,
                event.record.show_name,
                event.record.engagement_score
            );
            published += 1;
        }
        published
    });
    let errors = tokio::spawn(async move {
        let mut failed = Vec::new();
        while let Some(error) = error_rx.recv().await {
            failed.push(error);
        }
        failed
    });

    let mut controller = StreamingController::new();
    let buffer = EventBuffer::new(config.stream_batch_size, config.stream_batch_timeout());
    let events_tx = controller.start(processor, buffer, STREAM_CHANNEL_CAPACITY)?;

    for event in SampleDataGenerator::new(0).sample_stream_events(count) {
        events_tx
            .send(event)
            .await
            .context("streaming loop stopped accepting events")?;
    }
    drop(events_tx);

    let stats = controller.join().await?;
    let published = consumer.await.context("output consumer failed")?;
    let failed = errors.await.context("error consumer failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "stats": stats,
            "published": published,
            "errors": failed,
        }))?
    );
    Ok(())
}
