use std::collections::HashMap;

use super::features::SessionFeatures;

/// Per-user rollup joined back onto every row of that user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub total_watch_time: f64,
    pub avg_watch_time: f64,
    pub total_sessions: u64,
    pub binge_sessions: u64,
}

impl UserStats {
    /// Share of binge sessions; 0 when the user has no sessions.
    pub fn binge_ratio(&self) -> f64 {
        if self.total_sessions == 0 {
            0.0
        } else {
            self.binge_sessions as f64 / self.total_sessions as f64
        }
    }
}

/// Produces the per-user statistics the metric stage scores against.
///
/// The scope of the statistics is up to the implementation. `BatchAggregator`
/// only looks at the rows it is handed, so results depend on batch composition.
/// A running or global accumulator keyed by `user_id` can be swapped in through
/// `DataTransformer::with_aggregator` without touching cleaning or scoring.
pub trait UserAggregator: Send + Sync {
    fn aggregate(&self, sessions: &[SessionFeatures]) -> HashMap<String, UserStats>;
}

/// Groups the rows of the current call by `user_id`. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchAggregator;

impl UserAggregator for BatchAggregator {
    fn aggregate(&self, sessions: &[SessionFeatures]) -> HashMap<String, UserStats> {
        let mut stats: HashMap<String, UserStats> = HashMap::new();

        for session in sessions {
            let entry = stats.entry(session.user_id.clone()).or_default();
            entry.total_watch_time += session.watch_duration_minutes;
            entry.total_sessions += 1;
            if session.is_binge_session {
                entry.binge_sessions += 1;
            }
        }

        for entry in stats.values_mut() {
            entry.avg_watch_time = entry.total_watch_time / entry.total_sessions as f64;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session(user: &str, minutes: f64, binge: bool) -> SessionFeatures {
        SessionFeatures {
            event_id: None,
            user_id: user.to_string(),
            show_name: "Dark".to_string(),
            watch_duration_minutes: minutes,
            watch_date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            watch_hour: 10,
            watch_day: "Friday".to_string(),
            watch_month: "March".to_string(),
            is_binge_session: binge,
        }
    }

    #[test]
    fn groups_by_user_within_the_batch() {
        let sessions = vec![
            session("u1", 45.0, false),
            session("u2", 130.0, true),
            session("u1", 150.0, true),
        ];

        let stats = BatchAggregator.aggregate(&sessions);

        let u1 = &stats["u1"];
        assert_eq!(u1.total_watch_time, 195.0);
        assert_eq!(u1.avg_watch_time, 97.5);
        assert_eq!(u1.total_sessions, 2);
        assert_eq!(u1.binge_sessions, 1);

        let u2 = &stats["u2"];
        assert_eq!(u2.total_sessions, 1);
        assert_eq!(u2.binge_ratio(), 1.0);
    }

    #[test]
    fn zero_binge_sessions_gives_zero_ratio() {
        let stats = BatchAggregator.aggregate(&[session("u1", 10.0, false)]);
        assert_eq!(stats["u1"].binge_ratio(), 0.0);
        assert_eq!(UserStats::default().binge_ratio(), 0.0);
    }

    #[test]
    fn empty_batch_has_no_users() {
        assert!(BatchAggregator.aggregate(&[]).is_empty());
    }
}
