use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rows written by one warehouse load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub facts: usize,
    pub users: usize,
    pub shows: usize,
}

impl LoadSummary {
    pub fn is_empty(&self) -> bool {
        self.facts == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDim {
    pub user_id: String,
    pub total_watch_time: f64,
    pub avg_watch_time: f64,
    pub total_sessions: u64,
    pub binge_sessions: u64,
    pub is_binge_watcher: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowDim {
    pub show_id: String,
    pub show_name: String,
    pub total_watch_time: f64,
    pub total_views: u64,
    pub avg_completion_rate: f64,
    pub updated_at: DateTime<Utc>,
}
