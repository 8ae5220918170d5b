use thiserror::Error;

/// The input collaborator could not supply rows.
#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Series preparation left no usable records.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no usable experience records after cleaning")]
pub struct EmptySeriesError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputationError {
    #[error("target level {level} is outside 1..={max}")]
    InvalidTargetLevel { level: i64, max: u32 },
}
