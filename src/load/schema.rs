//! Arrow schema for enriched records and the row/column conversions.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMillisecondArray,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;

use crate::error::PipelineError;
use crate::models::EnrichedWatchRecord;

const UTC: &str = "UTC";

pub fn dataset_schema() -> SchemaRef {
    let utf8 = |name: &str| Field::new(name, DataType::Utf8, false);
    let float = |name: &str| Field::new(name, DataType::Float64, false);
    let flag = |name: &str| Field::new(name, DataType::Boolean, false);
    let count = |name: &str| Field::new(name, DataType::UInt64, false);

    Arc::new(Schema::new(vec![
        Field::new("event_id", DataType::Utf8, true),
        utf8("user_id"),
        utf8("show_name"),
        float("watch_duration_minutes"),
        Field::new(
            "watch_date",
            DataType::Timestamp(TimeUnit::Millisecond, Some(UTC.into())),
            false,
        ),
        Field::new("watch_hour", DataType::UInt32, false),
        utf8("watch_day"),
        utf8("watch_month"),
        flag("is_binge_session"),
        float("total_watch_time"),
        float("avg_watch_time"),
        count("total_sessions"),
        count("binge_sessions"),
        float("completion_rate"),
        flag("is_binge_watcher"),
        float("engagement_score"),
        flag("is_weekend"),
        flag("is_primetime"),
    ]))
}

/// Columnar copy of `rows`, in [`dataset_schema`] order.
pub fn to_record_batch(
    schema: &SchemaRef,
    rows: &[&EnrichedWatchRecord],
) -> Result<RecordBatch, PipelineError> {
    let strings = |get: fn(&EnrichedWatchRecord) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| get(r))))
    };
    let floats = |get: fn(&EnrichedWatchRecord) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| get(r))))
    };
    let flags = |get: fn(&EnrichedWatchRecord) -> bool| -> ArrayRef {
        Arc::new(BooleanArray::from(rows.iter().map(|r| get(r)).collect::<Vec<_>>()))
    };
    let counts = |get: fn(&EnrichedWatchRecord) -> u64| -> ArrayRef {
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| get(r))))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.event_id.as_deref()))),
        strings(|r| r.user_id.as_str()),
        strings(|r| r.show_name.as_str()),
        floats(|r| r.watch_duration_minutes),
        Arc::new(
            TimestampMillisecondArray::from_iter_values(
                rows.iter().map(|r| r.watch_date.timestamp_millis()),
            )
            .with_timezone(UTC),
        ),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.watch_hour))),
        strings(|r| r.watch_day.as_str()),
        strings(|r| r.watch_month.as_str()),
        flags(|r| r.is_binge_session),
        floats(|r| r.total_watch_time),
        floats(|r| r.avg_watch_time),
        counts(|r| r.total_sessions),
        counts(|r| r.binge_sessions),
        floats(|r| r.completion_rate),
        flags(|r| r.is_binge_watcher),
        floats(|r| r.engagement_score),
        flags(|r| r.is_weekend),
        flags(|r| r.is_primetime),
    ];

    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, PipelineError> {
    batch
        .column_by_name(name)
        .and_then(|array| array.as_any().downcast_ref::<T>())
        .ok_or_else(|| PipelineError::schema(format!("dataset column '{name}' is missing or mistyped")))
}

pub fn records_from_batch(batch: &RecordBatch) -> Result<Vec<EnrichedWatchRecord>, PipelineError> {
    let event_id = column::<StringArray>(batch, "event_id")?;
    let user_id = column::<StringArray>(batch, "user_id")?;
    let show_name = column::<StringArray>(batch, "show_name")?;
    let duration = column::<Float64Array>(batch, "watch_duration_minutes")?;
    let watch_date = column::<TimestampMillisecondArray>(batch, "watch_date")?;
    let watch_hour = column::<UInt32Array>(batch, "watch_hour")?;
    let watch_day = column::<StringArray>(batch, "watch_day")?;
    let watch_month = column::<StringArray>(batch, "watch_month")?;
    let is_binge_session = column::<BooleanArray>(batch, "is_binge_session")?;
    let total_watch_time = column::<Float64Array>(batch, "total_watch_time")?;
    let avg_watch_time = column::<Float64Array>(batch, "avg_watch_time")?;
    let total_sessions = column::<UInt64Array>(batch, "total_sessions")?;
    let binge_sessions = column::<UInt64Array>(batch, "binge_sessions")?;
    let completion_rate = column::<Float64Array>(batch, "completion_rate")?;
    let is_binge_watcher = column::<BooleanArray>(batch, "is_binge_watcher")?;
    let engagement_score = column::<Float64Array>(batch, "engagement_score")?;
    let is_weekend = column::<BooleanArray>(batch, "is_weekend")?;
    let is_primetime = column::<BooleanArray>(batch, "is_primetime")?;

    (0..batch.num_rows())
        .map(|i| -> Result<EnrichedWatchRecord, PipelineError> {
            let millis = watch_date.value(i);
            let watch_date = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                PipelineError::schema(format!("watch_date {millis} out of range at row {i}"))
            })?;

            Ok(EnrichedWatchRecord {
                event_id: (!event_id.is_null(i)).then(|| event_id.value(i).to_string()),
                user_id: user_id.value(i).to_string(),
                show_name: show_name.value(i).to_string(),
                watch_duration_minutes: duration.value(i),
                watch_date,
                watch_hour: watch_hour.value(i),
                watch_day: watch_day.value(i).to_string(),
                watch_month: watch_month.value(i).to_string(),
                is_binge_session: is_binge_session.value(i),
                total_watch_time: total_watch_time.value(i),
                avg_watch_time: avg_watch_time.value(i),
                total_sessions: total_sessions.value(i),
                binge_sessions: binge_sessions.value(i),
                completion_rate: completion_rate.value(i),
                is_binge_watcher: is_binge_watcher.value(i),
                engagement_score: engagement_score.value(i),
                is_weekend: is_weekend.value(i),
                is_primetime: is_primetime.value(i),
            })
        })
        .collect()
}
