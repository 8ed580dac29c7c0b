use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transform::TransformConfig;

pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Pipeline settings, read from an optional JSON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_data_path: PathBuf,
    pub processed_data_path: PathBuf,
    pub database_path: PathBuf,
    pub binge_watch_threshold_minutes: f64,
    /// Carried for downstream reporting; the scoring formulas do not read it.
    pub completion_rate_threshold: f64,
    pub clamp_completion_rate: bool,
    pub batch_size: usize,
    pub stream_batch_size: usize,
    pub stream_batch_timeout_secs: u64,
    pub log_level: String,
    /// Log lines are also appended here when set. `null` logs to stderr only.
    pub log_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_data_path: PathBuf::from("data/raw/watch_logs.csv"),
            processed_data_path: PathBuf::from("data/processed/watch_data"),
            database_path: PathBuf::from("data/warehouse.sqlite3"),
            binge_watch_threshold_minutes: 120.0,
            completion_rate_threshold: 0.8,
            clamp_completion_rate: false,
            batch_size: 10_000,
            stream_batch_size: 100,
            stream_batch_timeout_secs: 30,
            log_level: "info".into(),
            log_file: Some(PathBuf::from("logs/pipeline.log")),
        }
    }
}

impl PipelineConfig {
    /// Load from `path` when given and present, then apply `LOG_LEVEL`.
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };

        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                config.log_level = level.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            binge_threshold_minutes: self.binge_watch_threshold_minutes,
            completion_rate_threshold: self.completion_rate_threshold,
            clamp_completion_rate: self.clamp_completion_rate,
            ..TransformConfig::default()
        }
    }

    pub fn stream_batch_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_batch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::load(Some(&dir.path().join("absent.json"))).unwrap();
        let expected = PipelineConfig {
            log_level: config.log_level.clone(),
            ..PipelineConfig::default()
        };
        assert_eq!(config, expected);
        assert_eq!(config.batch_size, 10_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"binge_watch_threshold_minutes": 90, "clamp_completion_rate": true}"#)
            .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.binge_watch_threshold_minutes, 90.0);
        assert_eq!(config.stream_batch_size, 100);

        let transform = config.transform_config();
        assert_eq!(transform.binge_threshold_minutes, 90.0);
        assert!(transform.clamp_completion_rate);
        assert_eq!(transform.weight_watch_time, 0.40);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(PipelineConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn serialized_settings_load_back_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig {
            batch_size: 500,
            stream_batch_timeout_secs: 5,
            log_file: None,
            ..PipelineConfig::default()
        };

        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.stream_batch_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn log_file_defaults_on_and_can_be_disabled() {
        assert_eq!(
            PipelineConfig::default().log_file.as_deref(),
            Some(Path::new("logs/pipeline.log"))
        );

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"log_file": null}"#).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap().log_file, None);
    }
}
