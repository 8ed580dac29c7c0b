use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowActivity {
    pub show_name: String,
    pub sessions: u64,
    pub total_hours: f64,
    pub avg_engagement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerActivity {
    pub user_id: String,
    pub sessions: u64,
    pub total_hours: f64,
    pub avg_engagement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub user_id: String,
    pub show_name: String,
    pub watch_duration_minutes: f64,
    pub engagement_score: f64,
    pub watch_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_sessions: u64,
    pub total_hours: f64,
    pub avg_engagement: f64,
    pub binge_sessions: u64,
    pub unique_users: u64,
    pub top_shows: Vec<ShowActivity>,
    pub recent_activity: Vec<RecentActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnalytics {
    pub user_id: String,
    pub total_sessions: u64,
    pub total_hours: f64,
    pub avg_engagement: f64,
    pub binge_sessions: u64,
    pub avg_completion_rate: f64,
    pub favorite_shows: Vec<ShowActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowAnalytics {
    pub show_name: String,
    pub total_sessions: u64,
    pub unique_viewers: u64,
    pub total_hours: f64,
    pub avg_engagement: f64,
    pub avg_completion_rate: f64,
    pub binge_sessions: u64,
    pub top_viewers: Vec<ViewerActivity>,
}
