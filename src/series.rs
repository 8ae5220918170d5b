use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::EmptySeriesError;
use crate::models::{DailyPoint, ExperienceRecord, RawExperienceRow};

const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Time-ordered daily series with clamped deltas. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSeries {
    points: Vec<DailyPoint>,
}

#[allow(clippy::len_without_is_empty)]
impl PreparedSeries {
    pub fn points(&self) -> &[DailyPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn latest(&self) -> &DailyPoint {
        &self.points[self.points.len() - 1]
    }
}

/// Parses a day-first timestamp. ISO dates are accepted as well.
pub fn parse_timestamp(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|datetime| datetime.date())
        })
}

/// Parses a cumulative experience cell. Negative and non-numeric values are
/// rejected; fractional values are rounded to the nearest whole point.
pub fn parse_experience(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(whole) = value.parse::<u64>() {
        return Some(whole);
    }

    match value.parse::<f64>() {
        Ok(number) if number.is_finite() && number >= 0.0 && number <= u64::MAX as f64 => {
            Some(number.round() as u64)
        }
        _ => None,
    }
}

pub fn parse_row(row: &RawExperienceRow) -> Option<ExperienceRecord> {
    let recorded_on = parse_timestamp(row.timestamp.as_deref()?)?;
    let cumulative_experience = parse_experience(row.experience.as_deref()?)?;
    Some(ExperienceRecord {
        recorded_on,
        cumulative_experience,
    })
}

/// Drops malformed rows, then builds the series from what remains.
pub fn prepare_rows(rows: &[RawExperienceRow]) -> Result<PreparedSeries, EmptySeriesError> {
    let records: Vec<ExperienceRecord> = rows.iter().filter_map(parse_row).collect();
    let dropped = rows.len() - records.len();
    if dropped > 0 {
        debug!(dropped, kept = records.len(), "dropped malformed experience rows");
    }
    prepare(records)
}

/// Sorts by date (stable) and computes clamped first differences.
pub fn prepare(mut records: Vec<ExperienceRecord>) -> Result<PreparedSeries, EmptySeriesError> {
    if records.is_empty() {
        return Err(EmptySeriesError);
    }

    records.sort_by_key(|record| record.recorded_on);

    let mut previous: Option<u64> = None;
    let points = records
        .into_iter()
        .map(|record| {
            // A lower value than the day before is a sheet correction, not lost progress.
            let daily_delta = previous
                .map(|prev| record.cumulative_experience.saturating_sub(prev))
                .unwrap_or(0);
            previous = Some(record.cumulative_experience);
            DailyPoint {
                recorded_on: record.recorded_on,
                cumulative_experience: record.cumulative_experience,
                daily_delta,
            }
        })
        .collect();

    Ok(PreparedSeries { points })
}
