//! Streaming event envelopes: what arrives on the input channel, and what is
//! published on the output and error channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EnrichedWatchRecord, WatchEvent};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_event_type() -> String {
    "watch_session".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default = "new_id")]
    pub event_id: String,
    pub user_id: String,
    pub show_name: String,
    pub watch_duration_minutes: f64,
    pub watch_date: DateTime<Utc>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default = "new_id")]
    pub session_id: String,
}

impl StreamEvent {
    pub fn new(
        user_id: impl Into<String>,
        show_name: impl Into<String>,
        watch_duration_minutes: f64,
        watch_date: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: new_id(),
            user_id: user_id.into(),
            show_name: show_name.into(),
            watch_duration_minutes,
            watch_date,
            event_type: default_event_type(),
            session_id: new_id(),
        }
    }

    pub fn to_watch_event(&self) -> WatchEvent {
        WatchEvent {
            event_id: Some(self.event_id.clone()),
            user_id: self.user_id.clone(),
            show_name: Some(self.show_name.clone()),
            watch_duration_minutes: Some(self.watch_duration_minutes),
            watch_date: self.watch_date.to_rfc3339(),
        }
    }
}

/// An enriched record as published on the output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    #[serde(flatten)]
    pub record: EnrichedWatchRecord,
    pub processed_at: DateTime<Utc>,
}

/// Published on the error channel when a buffered window fails to transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error: String,
    pub original_events: Vec<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}
