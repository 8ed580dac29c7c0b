use chrono::{DateTime, Timelike, Utc};

use super::aggregate::{UserAggregator, UserStats};
use super::clean::CleanedEvent;
use super::config::TransformConfig;

/// A cleaned event plus its per-row temporal and session attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFeatures {
    pub event_id: Option<String>,
    pub user_id: String,
    pub show_name: String,
    pub watch_duration_minutes: f64,
    pub watch_date: DateTime<Utc>,
    pub watch_hour: u32,
    pub watch_day: String,
    pub watch_month: String,
    pub is_binge_session: bool,
}

/// Session features with the user's rollup joined on.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub session: SessionFeatures,
    pub stats: UserStats,
}

pub fn session_features(event: CleanedEvent, config: &TransformConfig) -> SessionFeatures {
    let is_binge_session = event.watch_duration_minutes >= config.binge_threshold_minutes;

    SessionFeatures {
        watch_hour: event.watch_date.hour(),
        watch_day: event.watch_date.format("%A").to_string(),
        watch_month: event.watch_date.format("%B").to_string(),
        is_binge_session,
        event_id: event.event_id,
        user_id: event.user_id,
        show_name: event.show_name,
        watch_duration_minutes: event.watch_duration_minutes,
        watch_date: event.watch_date,
    }
}

/// Derive row features, aggregate per user, and left-join the rollups back.
pub fn engineer_features<A: UserAggregator + ?Sized>(
    cleaned: Vec<CleanedEvent>,
    config: &TransformConfig,
    aggregator: &A,
) -> Vec<FeatureRow> {
    let sessions: Vec<SessionFeatures> = cleaned
        .into_iter()
        .map(|event| session_features(event, config))
        .collect();

    let user_stats = aggregator.aggregate(&sessions);

    sessions
        .into_iter()
        .map(|session| {
            let stats = user_stats
                .get(&session.user_id)
                .cloned()
                .unwrap_or_default();
            FeatureRow { session, stats }
        })
        .collect()
}
