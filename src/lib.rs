//! Watch-session feature engineering for batch ETL and streaming pipelines.
//!
//! [`DataTransformer`] is the shared core: it cleans raw watch events, derives
//! per-session and per-user features, and scores engagement. The ETL runner and
//! the streaming processor both call it, one batch at a time.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod etl;
pub mod extract;
pub mod generate;
pub mod load;
pub mod models;
pub mod streaming;
pub mod transform;
pub mod utils;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use models::{EnrichedWatchRecord, WatchEvent};
pub use transform::{DataTransformer, TransformConfig};

/// Entry point for the `watchflow` binary.
pub fn run() {
    if let Err(err) = cli::Cli::run() {
        log::error!("watchflow failed: {err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
