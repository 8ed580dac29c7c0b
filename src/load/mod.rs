//! Partitioned Parquet dataset output.
//!
//! Layout: `<output_dir>/watch_month=<m>/watch_day=<d>/part-<uuid>.parquet`, snappy
//! compressed, timestamps stored as UTC milliseconds. Each `write` adds new part
//! files, so repeated calls append to the dataset.

mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::EnrichedWatchRecord;

use schema::{dataset_schema, records_from_batch, to_record_batch};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const PART_FILE_EXTENSION: &str = "parquet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionColumn {
    WatchMonth,
    WatchDay,
}

impl PartitionColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionColumn::WatchMonth => "watch_month",
            PartitionColumn::WatchDay => "watch_day",
        }
    }

    fn value<'a>(&self, record: &'a EnrichedWatchRecord) -> &'a str {
        match self {
            PartitionColumn::WatchMonth => &record.watch_month,
            PartitionColumn::WatchDay => &record.watch_day,
        }
    }
}

/// One column of the stored schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetMetadata {
    pub num_rows: i64,
    pub num_row_groups: usize,
    pub file_count: usize,
    /// Partition directories relative to the dataset root, sorted.
    pub partitions: Vec<String>,
    /// Schema of the first part file; empty for an empty dataset.
    pub schema: Vec<ColumnInfo>,
}

pub struct DatasetWriter {
    output_dir: PathBuf,
    partition_columns: Vec<PartitionColumn>,
    max_row_group_size: Option<usize>,
}

impl DatasetWriter {
    pub fn new(output_dir: impl Into<PathBuf>, partition_columns: Vec<PartitionColumn>) -> Self {
        Self {
            output_dir: output_dir.into(),
            partition_columns,
            max_row_group_size: None,
        }
    }

    /// Month then day, the layout the ETL runner uses.
    pub fn by_month_and_day(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            output_dir,
            vec![PartitionColumn::WatchMonth, PartitionColumn::WatchDay],
        )
    }

    /// Cap rows per row group. The parquet default applies otherwise.
    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = Some(rows.max(1));
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn partition_dir(&self, record: &EnrichedWatchRecord) -> PathBuf {
        self.partition_columns
            .iter()
            .fold(PathBuf::new(), |dir, column| {
                dir.join(format!("{}={}", column.as_str(), column.value(record)))
            })
    }

    fn writer_properties(&self) -> WriterProperties {
        let mut builder = WriterProperties::builder().set_compression(Compression::SNAPPY);
        if let Some(rows) = self.max_row_group_size {
            builder = builder.set_max_row_group_size(rows);
        }
        builder.build()
    }

    /// Write one part file per partition touched by `records`. Returns the files written.
    pub fn write(&self, records: &[EnrichedWatchRecord]) -> Result<Vec<PathBuf>, PipelineError> {
        log_info!(
            "Saving {} records to {}",
            records.len(),
            self.output_dir.display()
        );

        let mut partitions: BTreeMap<PathBuf, Vec<&EnrichedWatchRecord>> = BTreeMap::new();
        for record in records {
            partitions
                .entry(self.partition_dir(record))
                .or_default()
                .push(record);
        }

        let schema = dataset_schema();
        let mut written = Vec::with_capacity(partitions.len());
        for (relative, rows) in partitions {
            let dir = self.output_dir.join(relative);
            fs::create_dir_all(&dir)?;

            let path = dir.join(format!("part-{}.{PART_FILE_EXTENSION}", Uuid::new_v4()));
            let batch = to_record_batch(&schema, &rows)?;
            let mut writer = ArrowWriter::try_new(
                File::create(&path)?,
                schema.clone(),
                Some(self.writer_properties()),
            )?;
            writer.write(&batch)?;
            writer.close()?;

            log_debug!("wrote {} rows to {}", rows.len(), path.display());
            written.push(path);
        }

        log_info!("Successfully saved {} records to Parquet", records.len());
        Ok(written)
    }

    /// Read every part file back. Files are visited in path order.
    pub fn read_dataset(&self) -> Result<Vec<EnrichedWatchRecord>, PipelineError> {
        log_info!("Reading data from {}", self.output_dir.display());

        let mut records = Vec::new();
        for path in part_files(&self.output_dir)? {
            let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
            for batch in reader {
                records.extend(records_from_batch(&batch?)?);
            }
        }

        log_info!("Successfully loaded {} records from Parquet", records.len());
        Ok(records)
    }

    /// Row and row-group counts from the footers, without decoding any pages.
    pub fn dataset_metadata(&self) -> Result<DatasetMetadata, PipelineError> {
        let files = part_files(&self.output_dir)?;

        let mut metadata = DatasetMetadata {
            file_count: files.len(),
            ..DatasetMetadata::default()
        };
        let mut partitions = BTreeSet::new();

        for path in &files {
            let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
            metadata.num_rows += builder.metadata().file_metadata().num_rows();
            metadata.num_row_groups += builder.metadata().num_row_groups();

            if metadata.schema.is_empty() {
                metadata.schema = builder
                    .schema()
                    .fields()
                    .iter()
                    .map(|field| ColumnInfo {
                        name: field.name().clone(),
                        data_type: field.data_type().to_string(),
                        nullable: field.is_nullable(),
                    })
                    .collect();
            }

            if let Some(relative) = path
                .parent()
                .and_then(|parent| parent.strip_prefix(&self.output_dir).ok())
                .filter(|relative| !relative.as_os_str().is_empty())
            {
                partitions.insert(relative.to_string_lossy().replace('\\', "/"));
            }
        }

        metadata.partitions = partitions.into_iter().collect();
        Ok(metadata)
    }
}

/// All `part-*.parquet` files under `root`, sorted. A missing root is an empty dataset.
fn part_files(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_part_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_part_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with("part-") && path.extension().is_some_and(|ext| ext == PART_FILE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WatchEvent;
    use crate::transform::{DataTransformer, TransformConfig};
    use tempfile::TempDir;

    fn records() -> Vec<EnrichedWatchRecord> {
        let events = vec![
            WatchEvent::new("u1", "Dark", 45.0, "2024-03-04 20:00:00"),
            WatchEvent::new("u1", "Dark", 130.0, "2024-03-05 21:00:00"),
            WatchEvent::new("u2", "Ozark", 30.0, "2024-04-06 09:15:00"),
        ]
        .into_iter()
        .map(|e| {
            let id = format!("evt-{}", e.watch_date);
            e.with_event_id(id)
        })
        .collect::<Vec<_>>();

        DataTransformer::new(TransformConfig::default())
            .transform(&events)
            .unwrap()
    }

    #[test]
    fn writes_one_file_per_partition() {
        let dir = TempDir::new().unwrap();
        let writer = DatasetWriter::by_month_and_day(dir.path());

        let files = writer.write(&records()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.extension().unwrap() == "parquet"));

        let metadata = writer.dataset_metadata().unwrap();
        assert_eq!(metadata.num_rows, 3);
        assert_eq!(metadata.file_count, 3);
        assert_eq!(metadata.num_row_groups, 3);
        assert_eq!(
            metadata.partitions,
            vec![
                "watch_month=April/watch_day=Saturday",
                "watch_month=March/watch_day=Monday",
                "watch_month=March/watch_day=Tuesday",
            ]
        );
    }

    #[test]
    fn read_back_matches_written_rows() {
        let dir = TempDir::new().unwrap();
        let writer = DatasetWriter::new(dir.path(), vec![PartitionColumn::WatchMonth]);
        let original = records();

        writer.write(&original).unwrap();
        let mut read = writer.read_dataset().unwrap();
        read.sort_by(|a, b| a.watch_date.cmp(&b.watch_date));

        assert_eq!(read, original);
    }

    #[test]
    fn metadata_reports_schema_and_row_groups() {
        let dir = TempDir::new().unwrap();
        let writer = DatasetWriter::new(dir.path(), Vec::new()).with_max_row_group_size(1);
        writer.write(&records()).unwrap();

        let metadata = writer.dataset_metadata().unwrap();
        assert_eq!(metadata.num_rows, 3);
        assert_eq!(metadata.num_row_groups, 3);

        let names: Vec<&str> = metadata.schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), 18);
        assert_eq!(names[..5], ["event_id", "user_id", "show_name", "watch_duration_minutes", "watch_date"]);

        let watch_date = &metadata.schema[4];
        assert!(watch_date.data_type.contains("Millisecond"));
        assert!(metadata.schema[0].nullable);
        assert!(!metadata.schema[1].nullable);
    }

    #[test]
    fn sub_millisecond_precision_is_truncated() {
        let dir = TempDir::new().unwrap();
        let writer = DatasetWriter::new(dir.path(), Vec::new());
        let events = vec![WatchEvent::new("u1", "Dark", 45.0, "2024-03-04T20:00:00.123456Z")];
        let records = DataTransformer::default().transform(&events).unwrap();

        writer.write(&records).unwrap();
        let read = writer.read_dataset().unwrap();
        assert_eq!(read[0].watch_date.timestamp_micros(), 1_709_582_400_123_000);
    }

    #[test]
    fn repeated_writes_append() {
        let dir = TempDir::new().unwrap();
        let writer = DatasetWriter::new(dir.path(), Vec::new());

        writer.write(&records()).unwrap();
        writer.write(&records()).unwrap();

        let metadata = writer.dataset_metadata().unwrap();
        assert_eq!(metadata.num_rows, 6);
        assert_eq!(metadata.file_count, 2);
        assert!(metadata.partitions.is_empty());
        assert_eq!(writer.read_dataset().unwrap().len(), 6);
    }

    #[test]
    fn missing_dataset_is_empty() {
        let dir = TempDir::new().unwrap();
        let writer = DatasetWriter::by_month_and_day(dir.path().join("nothing"));
        assert!(writer.read_dataset().unwrap().is_empty());
        assert_eq!(writer.dataset_metadata().unwrap(), DatasetMetadata::default());
    }
}
