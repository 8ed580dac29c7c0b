use thiserror::Error;

/// Errors raised while ingesting or transforming watch events.
///
/// Collaborator layers (warehouse, ETL driver, streaming loop) wrap these in
/// `anyhow::Error` with context; the transform core only ever returns this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required field is missing or has the wrong fundamental type.
    #[error("schema error: {0}")]
    Schema(String),

    /// A value could not be coerced. Fatal for the whole batch.
    #[error("failed to parse {field} '{value}' at row {row}: {reason}")]
    Parse {
        row: usize,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl PipelineError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Short machine-friendly name used in log lines and error events.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Schema(_) => "SchemaError",
            PipelineError::Parse { .. } => "ParseError",
            PipelineError::Csv(_) => "CsvError",
            PipelineError::Io(_) => "IoError",
            PipelineError::Json(_) => "JsonError",
            PipelineError::Parquet(_) => "ParquetError",
            PipelineError::Arrow(_) => "ArrowError",
        }
    }
}
