use crate::models::EnrichedWatchRecord;

use super::config::{TransformConfig, ASSUMED_SHOW_LENGTH_MINUTES, BINGE_WATCHER_RATIO};
use super::features::FeatureRow;

const WEEKEND_DAYS: [&str; 2] = ["Saturday", "Sunday"];
const PRIMETIME_START_HOUR: u32 = 19;
const PRIMETIME_END_HOUR: u32 = 23;

/// Score every row. Normalization uses the maximum `total_watch_time` in `rows`.
pub fn compute_metrics(rows: Vec<FeatureRow>, config: &TransformConfig) -> Vec<EnrichedWatchRecord> {
    let max_total_watch_time = rows
        .iter()
        .map(|row| row.stats.total_watch_time)
        .fold(0.0_f64, f64::max);

    rows.into_iter()
        .map(|row| score_row(row, max_total_watch_time, config))
        .collect()
}

fn score_row(row: FeatureRow, max_total_watch_time: f64, config: &TransformConfig) -> EnrichedWatchRecord {
    let FeatureRow { session, stats } = row;

    let completion_rate = completion_rate(session.watch_duration_minutes);
    let binge_ratio = stats.binge_ratio();
    let engagement_score = engagement_score(
        normalized_watch_time(stats.total_watch_time, max_total_watch_time),
        binge_ratio,
        completion_rate,
        config,
    );

    EnrichedWatchRecord {
        is_weekend: is_weekend(&session.watch_day),
        is_primetime: is_primetime(session.watch_hour),
        event_id: session.event_id,
        user_id: session.user_id,
        show_name: session.show_name,
        watch_duration_minutes: session.watch_duration_minutes,
        watch_date: session.watch_date,
        watch_hour: session.watch_hour,
        watch_day: session.watch_day,
        watch_month: session.watch_month,
        is_binge_session: session.is_binge_session,
        total_watch_time: stats.total_watch_time,
        avg_watch_time: stats.avg_watch_time,
        total_sessions: stats.total_sessions,
        binge_sessions: stats.binge_sessions,
        completion_rate,
        is_binge_watcher: binge_ratio > BINGE_WATCHER_RATIO,
        engagement_score,
    }
}

/// Duration over a fixed one-hour show length. Not clamped.
pub fn completion_rate(watch_duration_minutes: f64) -> f64 {
    watch_duration_minutes / ASSUMED_SHOW_LENGTH_MINUTES
}

/// `total / max`, or 0 when the batch maximum is 0.
pub fn normalized_watch_time(total_watch_time: f64, max_total_watch_time: f64) -> f64 {
    if max_total_watch_time > 0.0 {
        total_watch_time / max_total_watch_time
    } else {
        0.0
    }
}

pub fn engagement_score(
    normalized_watch_time: f64,
    binge_ratio: f64,
    completion_rate: f64,
    config: &TransformConfig,
) -> f64 {
    config.weight_watch_time * normalized_watch_time
        + config.weight_binge_ratio * binge_ratio
        + config.weight_completion * completion_rate
}

pub fn is_weekend(watch_day: &str) -> bool {
    WEEKEND_DAYS.contains(&watch_day)
}

pub fn is_primetime(watch_hour: u32) -> bool {
    (PRIMETIME_START_HOUR..=PRIMETIME_END_HOUR).contains(&watch_hour)
}

/// Clamp completion rates into [0, 1]. Engagement scores are left as computed.
pub fn clamp_completion_rates(records: &mut [EnrichedWatchRecord]) {
    for record in records {
        record.completion_rate = record.completion_rate.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::aggregate::UserStats;
    use crate::transform::features::SessionFeatures;
    use chrono::{TimeZone, Utc};

    fn row(user: &str, minutes: f64, stats: UserStats) -> FeatureRow {
        FeatureRow {
            session: SessionFeatures {
                event_id: None,
                user_id: user.to_string(),
                show_name: "Ozark".to_string(),
                watch_duration_minutes: minutes,
                watch_date: Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap(),
                watch_hour: 20,
                watch_day: "Monday".to_string(),
                watch_month: "March".to_string(),
                is_binge_session: minutes >= 120.0,
            },
            stats,
        }
    }

    fn stats(total: f64, sessions: u64, binge: u64) -> UserStats {
        UserStats {
            total_watch_time: total,
            avg_watch_time: total / sessions as f64,
            total_sessions: sessions,
            binge_sessions: binge,
        }
    }

    #[test]
    fn completion_rate_is_unclamped() {
        assert_eq!(completion_rate(90.0), 1.5);
        assert_eq!(completion_rate(30.0), 0.5);
    }

    #[test]
    fn binge_watcher_requires_strictly_more_than_half() {
        let records = compute_metrics(
            vec![row("u1", 130.0, stats(400.0, 4, 2)), row("u2", 130.0, stats(390.0, 3, 2))],
            &TransformConfig::default(),
        );
        assert!(!records[0].is_binge_watcher);
        assert!(records[1].is_binge_watcher);
    }

    #[test]
    fn engagement_score_uses_weighted_terms() {
        let records = compute_metrics(
            vec![row("u1", 60.0, stats(100.0, 2, 1)), row("u2", 30.0, stats(200.0, 1, 0))],
            &TransformConfig::default(),
        );

        // 0.4 * 0.5 + 0.3 * 0.5 + 0.3 * 1.0
        assert!((records[0].engagement_score - 0.65).abs() < 1e-9);
        // 0.4 * 1.0 + 0.3 * 0.0 + 0.3 * 0.5
        assert!((records[1].engagement_score - 0.55).abs() < 1e-9);
    }

    #[test]
    fn zero_max_watch_time_falls_back_to_zero() {
        assert_eq!(normalized_watch_time(0.0, 0.0), 0.0);

        let records = compute_metrics(
            vec![row("u1", 0.0, stats(0.0, 1, 0)), row("u2", 0.0, stats(0.0, 2, 0))],
            &TransformConfig::default(),
        );
        for record in records {
            assert!(record.engagement_score.is_finite());
            assert_eq!(record.engagement_score, 0.0);
        }
    }

    #[test]
    fn weekend_and_primetime_flags() {
        assert!(is_weekend("Saturday"));
        assert!(is_weekend("Sunday"));
        assert!(!is_weekend("Friday"));

        assert!(!is_primetime(18));
        assert!(is_primetime(19));
        assert!(is_primetime(23));
        assert!(!is_primetime(0));
    }

    #[test]
    fn clamping_only_touches_completion_rate() {
        let mut records = compute_metrics(
            vec![row("u1", 150.0, stats(150.0, 1, 1))],
            &TransformConfig::default(),
        );
        let score = records[0].engagement_score;

        clamp_completion_rates(&mut records);

        assert_eq!(records[0].completion_rate, 1.0);
        assert_eq!(records[0].engagement_score, score);
    }
}
