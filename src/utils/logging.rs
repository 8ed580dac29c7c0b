//! Logging setup plus conditional logging macros that check a module-level
//! `ENABLE_LOGS` flag.
//!
//! Usage:
//! ```ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("This will log if ENABLE_LOGS is true");
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use env_logger::Target;
use log::LevelFilter;

/// Copies every log line to stderr and an append-mode log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Initialize env_logger at `level`, writing to stderr and, when given, `log_file`.
/// `RUST_LOG` still wins when set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(filter)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if let Some(path) = log_file {
        let file = open_log_file(path)?;
        builder.target(Target::Pipe(Box::new(TeeWriter { file })));
    }

    let _ = builder.try_init();
    Ok(())
}

/// Logs the start and completion of a named pipeline step.
pub struct StepTimer {
    step: String,
    started: Instant,
}

impl StepTimer {
    pub fn start(step: impl Into<String>) -> Self {
        let step = step.into();
        log::info!("Starting {step}");
        Self {
            step,
            started: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Log completion and return the elapsed seconds.
    pub fn finish(self) -> f64 {
        let secs = self.elapsed_secs();
        log::info!("Completed {} in {:.2} seconds", self.step, secs);
        secs
    }
}

/// Macro for conditional info logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Macro for conditional debug logging.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Macro for conditional warn logging.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Macro for conditional error logging.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn init_logging_tolerates_repeat_calls_and_bad_levels() {
        init_logging("debug", None).unwrap();
        init_logging("not-a-level", None).unwrap();
    }

    #[test]
    fn log_file_is_created_with_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("pipeline.log");

        init_logging("info", Some(&path)).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn tee_writer_appends_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.log");
        fs::write(&path, "earlier\n").unwrap();

        let mut tee = TeeWriter {
            file: open_log_file(&path).unwrap(),
        };
        tee.write_all(b"later\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn step_timer_reports_non_negative_duration() {
        let timer = StepTimer::start("unit-test");
        assert!(timer.finish() >= 0.0);
    }
}
