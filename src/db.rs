use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::RawExperienceRow;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Mirrors sheet rows as-is. Re-importing the same export is a no-op.
pub async fn import_rows(pool: &PgPool, rows: &[RawExperienceRow]) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for row in rows {
        let source_key = row
            .source_key
            .clone()
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| content_key(row));

        let result = sqlx::query(
            r#"
            INSERT INTO xp_tracker.experience_rows
            (id, create_at, experience, source_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.timestamp.as_deref())
        .bind(row.experience.as_deref())
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn fetch_rows(pool: &PgPool) -> Result<Vec<RawExperienceRow>, sqlx::Error> {
    let records = sqlx::query(
        "SELECT create_at, experience, source_key \
         FROM xp_tracker.experience_rows \
         ORDER BY imported_at, source_key",
    )
    .fetch_all(pool)
    .await?;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        rows.push(RawExperienceRow {
            timestamp: record.try_get("create_at")?,
            experience: record.try_get("experience")?,
            source_key: record.try_get("source_key")?,
        });
    }

    Ok(rows)
}

fn content_key(row: &RawExperienceRow) -> String {
    format!(
        "sheet-{}-{}",
        row.timestamp.as_deref().unwrap_or_default(),
        row.experience.as_deref().unwrap_or_default()
    )
}
