//! Synthetic watch logs for demos and tests.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::PipelineError;
use crate::models::{StreamEvent, WatchEvent};

pub const SHOW_CATALOGUE: [&str; 12] = [
    "Stranger Things",
    "The Crown",
    "Breaking Bad",
    "Friends",
    "The Office",
    "Black Mirror",
    "House of Cards",
    "Mindhunter",
    "Dark",
    "The Witcher",
    "Ozark",
    "Narcos",
];

pub const DEFAULT_NUM_RECORDS: usize = 1000;
const NUM_USERS: u32 = 100;
const SPAN_DAYS: i64 = 30;
const CSV_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SampleDataGenerator {
    num_records: usize,
    start_date: DateTime<Utc>,
    rng: StdRng,
}

impl SampleDataGenerator {
    pub fn new(num_records: usize) -> Self {
        Self::from_rng(num_records, StdRng::from_entropy())
    }

    /// Seeded generator; the same seed and start date produce the same rows.
    pub fn with_seed(num_records: usize, seed: u64) -> Self {
        Self::from_rng(num_records, StdRng::seed_from_u64(seed))
    }

    fn from_rng(num_records: usize, rng: StdRng) -> Self {
        Self {
            num_records,
            start_date: Utc::now() - Duration::days(SPAN_DAYS),
            rng,
        }
    }

    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = start_date;
        self
    }

    fn user_id(&mut self) -> String {
        format!("user_{:04}", self.rng.gen_range(1..=NUM_USERS))
    }

    fn show_name(&mut self) -> &'static str {
        SHOW_CATALOGUE.choose(&mut self.rng).copied().unwrap_or("Dark")
    }

    pub fn generate(&mut self) -> Vec<WatchEvent> {
        (0..self.num_records)
            .map(|_| {
                let user_id = self.user_id();
                let show_name = self.show_name();
                let minutes: u32 = self.rng.gen_range(15..180);
                let offset = Duration::days(self.rng.gen_range(0..=SPAN_DAYS))
                    + Duration::hours(self.rng.gen_range(0..=23))
                    + Duration::minutes(self.rng.gen_range(0..=59));
                let watch_date = (self.start_date + offset).format(CSV_DATE_FORMAT).to_string();

                WatchEvent::new(user_id, show_name, f64::from(minutes), watch_date)
            })
            .collect()
    }

    /// Write a fresh sample to `path` as a four-column CSV. Returns the row count.
    pub fn write_csv(&mut self, path: &Path) -> Result<usize, PipelineError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let events = self.generate();
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["user_id", "show_name", "watch_duration_minutes", "watch_date"])?;
        for event in &events {
            let minutes = event.watch_duration_minutes.unwrap_or_default();
            writer.write_record([
                event.user_id.as_str(),
                event.show_name.as_deref().unwrap_or_default(),
                &format!("{minutes}"),
                event.watch_date.as_str(),
            ])?;
        }
        writer.flush()?;

        Ok(events.len())
    }

    /// Live-looking events stamped with the current time.
    pub fn sample_stream_events(&mut self, count: usize) -> Vec<StreamEvent> {
        (0..count)
            .map(|_| {
                let user_id = self.user_id();
                let show_name = self.show_name();
                let minutes: u32 = self.rng.gen_range(20..120);
                StreamEvent::new(user_id, show_name, f64::from(minutes), Utc::now())
            })
            .collect()
    }
}
