use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, show_id_for, to_i64, to_u64},
    models::{LoadSummary, ShowDim, UserDim},
};
use crate::models::EnrichedWatchRecord;

/// Per-show totals for one load, merged into `show_dim` afterwards.
#[derive(Default)]
struct ShowBatch {
    total_watch_time: f64,
    views: u64,
    completion_sum: f64,
}

fn row_to_user_dim(row: &Row) -> Result<UserDim> {
    let total_sessions: i64 = row.get("total_sessions")?;
    let binge_sessions: i64 = row.get("binge_sessions")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(UserDim {
        user_id: row.get("user_id")?,
        total_watch_time: row.get("total_watch_time")?,
        avg_watch_time: row.get("avg_watch_time")?,
        total_sessions: to_u64(total_sessions, "total_sessions")?,
        binge_sessions: to_u64(binge_sessions, "binge_sessions")?,
        is_binge_watcher: row.get("is_binge_watcher")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn row_to_show_dim(row: &Row) -> Result<ShowDim> {
    let total_views: i64 = row.get("total_views")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(ShowDim {
        show_id: row.get("show_id")?,
        show_name: row.get("show_name")?,
        total_watch_time: row.get("total_watch_time")?,
        total_views: to_u64(total_views, "total_views")?,
        avg_completion_rate: row.get("avg_completion_rate")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Load one transformed batch: facts, user aggregates and show totals, atomically.
    ///
    /// `user_dim` holds the aggregates of the latest batch a user appeared in.
    /// `show_dim` accumulates across loads.
    pub async fn load_enriched(&self, records: &[EnrichedWatchRecord]) -> Result<LoadSummary> {
        if records.is_empty() {
            return Ok(LoadSummary::default());
        }

        let records = records.to_vec();
        self.execute(move |conn| {
            let loaded_at = format_datetime(&Utc::now());
            let tx = conn
                .transaction()
                .context("failed to open warehouse load transaction")?;

            let mut shows: BTreeMap<&str, ShowBatch> = BTreeMap::new();
            let mut seen_users = HashSet::new();

            {
                let mut insert_fact = tx.prepare(
                    "INSERT INTO watch_facts (watch_id, event_id, user_id, show_id, show_name, watch_date, watch_hour, watch_day, watch_month, watch_duration_minutes, completion_rate, is_binge_session, engagement_score, is_weekend, is_primetime, loaded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                )?;
                let mut upsert_user = tx.prepare(
                    "INSERT INTO user_dim (user_id, total_watch_time, avg_watch_time, total_sessions, binge_sessions, is_binge_watcher, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                     ON CONFLICT(user_id) DO UPDATE SET
                         total_watch_time = excluded.total_watch_time,
                         avg_watch_time = excluded.avg_watch_time,
                         total_sessions = excluded.total_sessions,
                         binge_sessions = excluded.binge_sessions,
                         is_binge_watcher = excluded.is_binge_watcher,
                         updated_at = excluded.updated_at",
                )?;

                for record in &records {
                    insert_fact
                        .execute(params![
                            Uuid::new_v4().to_string(),
                            record.event_id,
                            record.user_id,
                            show_id_for(&record.show_name),
                            record.show_name,
                            format_datetime(&record.watch_date),
                            record.watch_hour,
                            record.watch_day,
                            record.watch_month,
                            record.watch_duration_minutes,
                            record.completion_rate,
                            record.is_binge_session,
                            record.engagement_score,
                            record.is_weekend,
                            record.is_primetime,
                            loaded_at,
                        ])
                        .context("failed to insert watch fact")?;

                    if seen_users.insert(record.user_id.as_str()) {
                        upsert_user
                            .execute(params![
                                record.user_id,
                                record.total_watch_time,
                                record.avg_watch_time,
                                to_i64(record.total_sessions)?,
                                to_i64(record.binge_sessions)?,
                                record.is_binge_watcher,
                                loaded_at,
                            ])
                            .context("failed to upsert user dimension")?;
                    }

                    let show = shows.entry(record.show_name.as_str()).or_default();
                    show.total_watch_time += record.watch_duration_minutes;
                    show.views += 1;
                    show.completion_sum += record.completion_rate;
                }

                let mut upsert_show = tx.prepare(
                    "INSERT INTO show_dim (show_id, show_name, total_watch_time, total_views, avg_completion_rate, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     ON CONFLICT(show_id) DO UPDATE SET
                         avg_completion_rate = (show_dim.avg_completion_rate * show_dim.total_views
                             + excluded.avg_completion_rate * excluded.total_views)
                             / (show_dim.total_views + excluded.total_views),
                         total_watch_time = show_dim.total_watch_time + excluded.total_watch_time,
                         total_views = show_dim.total_views + excluded.total_views,
                         updated_at = excluded.updated_at",
                )?;

                for (show_name, batch) in &shows {
                    upsert_show
                        .execute(params![
                            show_id_for(show_name),
                            show_name,
                            batch.total_watch_time,
                            to_i64(batch.views)?,
                            batch.completion_sum / batch.views as f64,
                            loaded_at,
                        ])
                        .context("failed to upsert show dimension")?;
                }
            }

            let summary = LoadSummary {
                facts: records.len(),
                users: seen_users.len(),
                shows: shows.len(),
            };
            tx.commit().context("failed to commit warehouse load")?;
            Ok(summary)
        })
        .await
    }

    pub async fn count_watch_facts(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM watch_facts", [], |row| row.get(0))?;
            to_u64(count, "count")
        })
        .await
    }

    pub async fn get_user_dim(&self, user_id: &str) -> Result<Option<UserDim>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, total_watch_time, avg_watch_time, total_sessions, binge_sessions, is_binge_watcher, updated_at
                 FROM user_dim
                 WHERE user_id = ?1",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let user = match rows.next()? {
                Some(row) => Some(row_to_user_dim(row)?),
                None => None,
            };
            Ok(user)
        })
        .await
    }

    pub async fn get_show_dim(&self, show_name: &str) -> Result<Option<ShowDim>> {
        let show_id = show_id_for(show_name);
        self.execute(move |conn| {
            let show = conn
                .query_row(
                    "SELECT show_id, show_name, total_watch_time, total_views, avg_completion_rate, updated_at
                     FROM show_dim
                     WHERE show_id = ?1",
                    params![show_id],
                    |row| Ok(row_to_show_dim(row)),
                )
                .optional()?
                .transpose()?;
            Ok(show)
        })
        .await
    }
}
