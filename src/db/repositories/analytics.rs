use anyhow::Result;
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, to_u64},
    models::{
        AnalyticsSummary, RecentActivity, ShowActivity, ShowAnalytics, UserAnalytics,
        ViewerActivity,
    },
};

const TOP_LIMIT: i64 = 10;
const RECENT_LIMIT: i64 = 20;

/// Start of the window: midnight UTC `days` days before today, clamped to the
/// earliest representable date.
fn window_start(days: u32) -> String {
    let today = Utc::now().date_naive();
    let start = today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    format_datetime(&start.and_time(NaiveTime::MIN).and_utc())
}

fn row_to_show_activity(row: &Row) -> Result<ShowActivity> {
    Ok(ShowActivity {
        show_name: row.get(0)?,
        sessions: to_u64(row.get(1)?, "sessions")?,
        total_hours: row.get(2)?,
        avg_engagement: row.get(3)?,
    })
}

fn top_shows(
    conn: &Connection,
    since: &str,
    user_id: Option<&str>,
    show_name: Option<&str>,
) -> Result<Vec<ShowActivity>> {
    let mut stmt = conn.prepare(
        "SELECT show_name, COUNT(*) AS sessions, SUM(watch_duration_minutes) / 60.0, AVG(engagement_score)
         FROM watch_facts
         WHERE watch_date >= ?1 AND (?2 IS NULL OR user_id = ?2) AND (?3 IS NULL OR show_name = ?3)
         GROUP BY show_name
         ORDER BY sessions DESC, show_name ASC
         LIMIT ?4",
    )?;

    let mut rows = stmt.query(params![since, user_id, show_name, TOP_LIMIT])?;
    let mut shows = Vec::new();
    while let Some(row) = rows.next()? {
        shows.push(row_to_show_activity(row)?);
    }
    Ok(shows)
}

impl Database {
    /// Totals over the last `days` days, optionally narrowed to one user and/or show.
    /// Returns `None` when nothing matches.
    pub async fn analytics_summary(
        &self,
        days: u32,
        user_id: Option<String>,
        show_name: Option<String>,
    ) -> Result<Option<AnalyticsSummary>> {
        let since = window_start(days);
        self.execute(move |conn| {
            let (total_sessions, total_hours, avg_engagement, binge_sessions, unique_users) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(watch_duration_minutes), 0) / 60.0,
                            COALESCE(AVG(engagement_score), 0), COALESCE(SUM(is_binge_session), 0),
                            COUNT(DISTINCT user_id)
                     FROM watch_facts
                     WHERE watch_date >= ?1 AND (?2 IS NULL OR user_id = ?2) AND (?3 IS NULL OR show_name = ?3)",
                    params![since, user_id, show_name],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )?;

            if total_sessions == 0 {
                return Ok(None);
            }

            let top_shows = top_shows(conn, &since, user_id.as_deref(), show_name.as_deref())?;

            let mut stmt = conn.prepare(
                "SELECT user_id, show_name, watch_duration_minutes, engagement_score, watch_date
                 FROM watch_facts
                 WHERE watch_date >= ?1 AND (?2 IS NULL OR user_id = ?2) AND (?3 IS NULL OR show_name = ?3)
                 ORDER BY watch_date DESC
                 LIMIT ?4",
            )?;
            let mut rows = stmt.query(params![since, user_id, show_name, RECENT_LIMIT])?;
            let mut recent_activity = Vec::new();
            while let Some(row) = rows.next()? {
                let watch_date: String = row.get(4)?;
                recent_activity.push(RecentActivity {
                    user_id: row.get(0)?,
                    show_name: row.get(1)?,
                    watch_duration_minutes: row.get(2)?,
                    engagement_score: row.get(3)?,
                    watch_date: parse_datetime(&watch_date, "watch_date")?,
                });
            }

            Ok(Some(AnalyticsSummary {
                total_sessions: to_u64(total_sessions, "total_sessions")?,
                total_hours,
                avg_engagement,
                binge_sessions: to_u64(binge_sessions, "binge_sessions")?,
                unique_users: to_u64(unique_users, "unique_users")?,
                top_shows,
                recent_activity,
            }))
        })
        .await
    }

    pub async fn user_analytics(&self, user_id: &str, days: u32) -> Result<Option<UserAnalytics>> {
        let user_id = user_id.to_string();
        let since = window_start(days);
        self.execute(move |conn| {
            let (total_sessions, total_hours, avg_engagement, binge_sessions, avg_completion_rate) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(watch_duration_minutes), 0) / 60.0,
                            COALESCE(AVG(engagement_score), 0), COALESCE(SUM(is_binge_session), 0),
                            COALESCE(AVG(completion_rate), 0)
                     FROM watch_facts
                     WHERE user_id = ?1 AND watch_date >= ?2",
                    params![user_id, since],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, f64>(4)?,
                        ))
                    },
                )?;

            if total_sessions == 0 {
                return Ok(None);
            }

            let favorite_shows = top_shows(conn, &since, Some(&user_id), None)?;

            Ok(Some(UserAnalytics {
                user_id,
                total_sessions: to_u64(total_sessions, "total_sessions")?,
                total_hours,
                avg_engagement,
                binge_sessions: to_u64(binge_sessions, "binge_sessions")?,
                avg_completion_rate,
                favorite_shows,
            }))
        })
        .await
    }

    pub async fn show_analytics(&self, show_name: &str, days: u32) -> Result<Option<ShowAnalytics>> {
        let show_name = show_name.to_string();
        let since = window_start(days);
        self.execute(move |conn| {
            let (total_sessions, unique_viewers, total_hours, avg_engagement, avg_completion_rate, binge_sessions) = conn
                .query_row(
                    "SELECT COUNT(*), COUNT(DISTINCT user_id), COALESCE(SUM(watch_duration_minutes), 0) / 60.0,
                            COALESCE(AVG(engagement_score), 0), COALESCE(AVG(completion_rate), 0),
                            COALESCE(SUM(is_binge_session), 0)
                     FROM watch_facts
                     WHERE show_name = ?1 AND watch_date >= ?2",
                    params![show_name, since],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, f64>(3)?,
                            row.get::<_, f64>(4)?,
                            row.get::<_, i64>(5)?,
                        ))
                    },
                )?;

            if total_sessions == 0 {
                return Ok(None);
            }

            let mut stmt = conn.prepare(
                "SELECT user_id, COUNT(*) AS sessions, SUM(watch_duration_minutes) / 60.0, AVG(engagement_score)
                 FROM watch_facts
                 WHERE show_name = ?1 AND watch_date >= ?2
                 GROUP BY user_id
                 ORDER BY sessions DESC, user_id ASC
                 LIMIT ?3",
            )?;
            let mut rows = stmt.query(params![show_name, since, TOP_LIMIT])?;
            let mut top_viewers = Vec::new();
            while let Some(row) = rows.next()? {
                top_viewers.push(ViewerActivity {
                    user_id: row.get(0)?,
                    sessions: to_u64(row.get(1)?, "sessions")?,
                    total_hours: row.get(2)?,
                    avg_engagement: row.get(3)?,
                });
            }

            Ok(Some(ShowAnalytics {
                show_name,
                total_sessions: to_u64(total_sessions, "total_sessions")?,
                unique_viewers: to_u64(unique_viewers, "unique_viewers")?,
                total_hours,
                avg_engagement,
                avg_completion_rate,
                binge_sessions: to_u64(binge_sessions, "binge_sessions")?,
                top_viewers,
            }))
        })
        .await
    }
}
