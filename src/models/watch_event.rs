//! Raw watch-event data model, as handed to the transform core.

use serde::{Deserialize, Serialize};

/// A single raw watch event row.
///
/// `show_name` and `watch_duration_minutes` may be null; cleaning fills them.
/// `watch_date` stays as text until cleaning coerces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    pub user_id: String,
    pub show_name: Option<String>,
    pub watch_duration_minutes: Option<f64>,
    pub watch_date: String,
}

impl WatchEvent {
    pub fn new(
        user_id: impl Into<String>,
        show_name: impl Into<String>,
        watch_duration_minutes: f64,
        watch_date: impl Into<String>,
    ) -> Self {
        Self {
            event_id: None,
            user_id: user_id.into(),
            show_name: Some(show_name.into()),
            watch_duration_minutes: Some(watch_duration_minutes),
            watch_date: watch_date.into(),
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }
}
