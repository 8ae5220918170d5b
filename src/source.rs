use std::path::{Path, PathBuf};

use sqlx::PgPool;
use tracing::info;

use crate::db;
use crate::error::DataSourceError;
use crate::models::RawExperienceRow;

/// Where raw experience rows come from.
pub enum DataSource {
    /// A CSV export of the tracking sheet.
    Csv(PathBuf),
    /// Rows previously imported into Postgres.
    Postgres(PgPool),
}

impl DataSource {
    pub async fn load(&self) -> Result<Vec<RawExperienceRow>, DataSourceError> {
        let rows = match self {
            DataSource::Csv(path) => read_csv(path)?,
            DataSource::Postgres(pool) => db::fetch_rows(pool).await?,
        };
        info!(source = %self.describe(), rows = rows.len(), "loaded experience rows");
        Ok(rows)
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::Csv(path) => path.display().to_string(),
            DataSource::Postgres(_) => "postgres".to_string(),
        }
    }
}

/// Reads every row of a sheet export. Cells are kept as text; validation
/// happens during series preparation.
pub fn read_csv(path: &Path) -> Result<Vec<RawExperienceRow>, DataSourceError> {
    let file = std::fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for result in reader.deserialize::<RawExperienceRow>() {
        rows.push(result?);
    }
    Ok(rows)
}
