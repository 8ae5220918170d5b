use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ComputationError, DataSourceError};
use crate::metrics;
use crate::models::{MetricsSnapshot, RawExperienceRow};
use crate::series;
use crate::source::DataSource;

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Ready(Box<MetricsSnapshot>),
    /// Nothing usable came back from the source.
    NoData,
}

/// Liveness record of the most recent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub records_processed: usize,
    pub checked_at: DateTime<Utc>,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn failed(message: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            healthy: false,
            records_processed: 0,
            checked_at,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refresh {
    pub outcome: RefreshOutcome,
    pub health: HealthStatus,
}

/// Runs one load → prepare → derive cycle against `source`.
pub async fn refresh(
    source: &DataSource,
    target_level: i64,
    as_of: NaiveDate,
) -> Result<Refresh, ComputationError> {
    let rows = source.load().await;
    derive(rows, target_level, as_of, Utc::now())
}

/// The synchronous half of a refresh. A failed load degrades to an empty
/// row set so the caller can still render a no-data state.
pub fn derive(
    rows: Result<Vec<RawExperienceRow>, DataSourceError>,
    target_level: i64,
    as_of: NaiveDate,
    checked_at: DateTime<Utc>,
) -> Result<Refresh, ComputationError> {
    metrics::validate_target_level(target_level)?;

    let (rows, source_error) = match rows {
        Ok(rows) => (rows, None),
        Err(err) => {
            warn!(error = %err, "data source unavailable, continuing without data");
            (Vec::new(), Some(err.to_string()))
        }
    };

    let series = match series::prepare_rows(&rows) {
        Ok(series) => series,
        Err(err) => {
            info!("{err}");
            let health = HealthStatus {
                healthy: source_error.is_none(),
                records_processed: 0,
                checked_at,
                message: Some(source_error.unwrap_or_else(|| err.to_string())),
            };
            return Ok(Refresh {
                outcome: RefreshOutcome::NoData,
                health,
            });
        }
    };

    let snapshot = metrics::compute_snapshot(&series, target_level, as_of)?;
    info!(
        records = series.len(),
        level = snapshot.current_level,
        target = snapshot.target_level,
        "metrics refreshed"
    );

    Ok(Refresh {
        outcome: RefreshOutcome::Ready(Box::new(snapshot)),
        health: HealthStatus {
            healthy: true,
            records_processed: series.len(),
            checked_at,
            message: None,
        },
    })
}
