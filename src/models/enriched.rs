//! Enriched watch record produced by every transform call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedWatchRecord {
    pub event_id: Option<String>,
    pub user_id: String,
    pub show_name: String,
    pub watch_duration_minutes: f64,
    pub watch_date: DateTime<Utc>,

    pub watch_hour: u32,
    pub watch_day: String,
    pub watch_month: String,
    pub is_binge_session: bool,

    /// Per-user aggregates over the batch this record was transformed in.
    pub total_watch_time: f64,
    pub avg_watch_time: f64,
    pub total_sessions: u64,
    pub binge_sessions: u64,

    pub completion_rate: f64,
    pub is_binge_watcher: bool,
    pub engagement_score: f64,
    pub is_weekend: bool,
    pub is_primetime: bool,
}

impl EnrichedWatchRecord {
    pub fn binge_ratio(&self) -> f64 {
        if self.total_sessions == 0 {
            0.0
        } else {
            self.binge_sessions as f64 / self.total_sessions as f64
        }
    }
}
