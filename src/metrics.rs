use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::ComputationError;
use crate::level::{cumulative_required, level_for_experience, MAX_LEVEL};
use crate::models::{
    BestDay, ChartRow, DailyPoint, Eta, Milestone, MetricsSnapshot, PaceKind, Scenario, Trend,
    WeekCell, WeekdayAverage,
};
use crate::series::PreparedSeries;

pub const RECENT_WINDOW: usize = 30;
pub const ETA_HORIZON_DAYS: u64 = 18_250;
pub const SCENARIO_HORIZON_DAYS: u64 = 3_650;
pub const TREND_BAND: f64 = 0.05;
pub const RISK_FRACTION: f64 = 0.1;
pub const MILESTONE_LEVELS: [u32; 6] = [200, 400, 600, 800, 900, 1000];

const SHORT_ROLLING_WINDOW: usize = 7;

/// Derives the full snapshot for one refresh.
///
/// Degenerate inputs (a single record, no positive days, target already met)
/// resolve to zero or unavailable fields. Only an out-of-range target level is
/// an error.
pub fn compute_snapshot(
    series: &PreparedSeries,
    target_level: i64,
    as_of: NaiveDate,
) -> Result<MetricsSnapshot, ComputationError> {
    let target_level = validate_target_level(target_level)?;
    let points = series.points();
    let latest = series.latest();

    let current_experience = latest.cumulative_experience;
    let target_experience = cumulative_required(target_level);
    let remaining_experience = target_experience.saturating_sub(current_experience);

    let positives = positive_deltas(points);
    let general_average = mean(&positives);
    let recent_average = recent_average(points, general_average);

    let (eta, required_daily_pace) = project_eta(remaining_experience, recent_average, as_of);
    let best_day = best_day(points);

    let good_streak = if required_daily_pace > 0.0 {
        trailing_streak(points, |delta| delta >= required_daily_pace)
    } else {
        0
    };
    let risk_streak = if required_daily_pace > 0.0 {
        trailing_streak(points, |delta| delta < required_daily_pace * RISK_FRACTION)
    } else {
        0
    };

    Ok(MetricsSnapshot {
        as_of,
        record_count: points.len(),
        current_experience,
        current_level: level_for_experience(current_experience),
        target_level,
        target_experience,
        remaining_experience,
        general_average,
        recent_average,
        required_daily_pace,
        eta,
        scenarios: scenarios(
            remaining_experience,
            [
                (PaceKind::General, general_average),
                (PaceKind::Recent, recent_average),
                (PaceKind::Record, best_day.experience as f64),
            ],
            as_of,
        ),
        good_streak,
        risk_streak,
        best_day,
        trend: classify_trend(recent_average, general_average),
        trend_slope: trend_slope(points),
        std_dev: sample_std_dev(&positives),
        consistency_score: consistency_score(&positives, recent_average),
        today_delta: latest.daily_delta,
        today_vs_pace: latest.daily_delta as f64 - required_daily_pace,
        milestones: milestones(points, &MILESTONE_LEVELS),
        chart: chart_rows(points, required_daily_pace),
        weekdays: weekday_averages(points),
        heatmap: weekly_heatmap(points),
    })
}

pub fn validate_target_level(level: i64) -> Result<u32, ComputationError> {
    u32::try_from(level)
        .ok()
        .filter(|level| (1..=MAX_LEVEL).contains(level))
        .ok_or(ComputationError::InvalidTargetLevel {
            level,
            max: MAX_LEVEL,
        })
}

fn positive_deltas(points: &[DailyPoint]) -> Vec<f64> {
    points
        .iter()
        .filter(|point| point.daily_delta > 0)
        .map(|point| point.daily_delta as f64)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean positive delta over the trailing window, or `general` if that window
/// has no activity at all.
pub fn recent_average(points: &[DailyPoint], general: f64) -> f64 {
    let start = points.len().saturating_sub(RECENT_WINDOW);
    let recent = positive_deltas(&points[start..]);
    if recent.is_empty() {
        general
    } else {
        mean(&recent)
    }
}

/// Whole days needed to cover `remaining` at `pace`, at least one.
fn days_needed(remaining: u64, pace: f64) -> Option<u64> {
    if pace <= 0.0 || !pace.is_finite() {
        return None;
    }
    Some(((remaining as f64 / pace).floor() as u64).max(1))
}

/// Days needed to cover `remaining` at `pace`, at least one and at most `horizon`.
pub fn days_to_cover(remaining: u64, pace: f64, horizon: u64) -> Option<u64> {
    days_needed(remaining, pace).map(|days| days.min(horizon))
}

/// Primary ETA and the daily pace required to hit it.
///
/// Only the projected date is capped at the horizon; the pace comes from the
/// uncapped day count so it stays comparable to the recent average.
pub fn project_eta(remaining: u64, recent_average: f64, as_of: NaiveDate) -> (Eta, f64) {
    if remaining == 0 {
        return (Eta::Complete, 0.0);
    }

    let Some(needed) = days_needed(remaining, recent_average) else {
        return (Eta::Unavailable, 0.0);
    };
    let pace = remaining as f64 / needed as f64;
    let days = needed.min(ETA_HORIZON_DAYS);
    let Some(date) = as_of.checked_add_days(Days::new(days)) else {
        return (Eta::Unavailable, 0.0);
    };

    let eta = Eta::Projected {
        days_remaining: days as i64,
        date,
    };
    (eta, pace)
}

fn scenarios(remaining: u64, paces: [(PaceKind, f64); 3], as_of: NaiveDate) -> Vec<Scenario> {
    if remaining == 0 {
        return Vec::new();
    }

    paces
        .into_iter()
        .filter_map(|(kind, daily_pace)| {
            let days = days_to_cover(remaining, daily_pace, SCENARIO_HORIZON_DAYS)?;
            let date = as_of.checked_add_days(Days::new(days))?;
            Some(Scenario {
                kind,
                daily_pace,
                days_remaining: days as i64,
                date,
            })
        })
        .collect()
}

/// Counts records from the newest backwards until one fails `holds`.
pub fn trailing_streak(points: &[DailyPoint], holds: impl Fn(f64) -> bool) -> usize {
    points
        .iter()
        .rev()
        .take_while(|point| holds(point.daily_delta as f64))
        .count()
}

/// Largest delta; the earliest record wins a tie.
fn best_day(points: &[DailyPoint]) -> BestDay {
    let mut best = &points[0];
    for point in &points[1..] {
        if point.daily_delta > best.daily_delta {
            best = point;
        }
    }
    BestDay {
        date: best.recorded_on,
        experience: best.daily_delta,
    }
}

pub fn classify_trend(recent: f64, general: f64) -> Trend {
    if recent > general * (1.0 + TREND_BAND) {
        Trend::Up
    } else if recent < general * (1.0 - TREND_BAND) {
        Trend::Down
    } else {
        Trend::Stable
    }
}

/// Least-squares slope of the daily delta against record index.
fn trend_slope(points: &[DailyPoint]) -> Option<f64> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (index, point) in points.iter().enumerate() {
        let x = index as f64;
        let y = point.daily_delta as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return None;
    }
    Some((n * sum_xy - sum_x * sum_y) / denominator)
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|value| {
            let diff = value - avg;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Share of active days at or above the recent average, in percent.
pub fn consistency_score(positives: &[f64], recent_average: f64) -> f64 {
    if positives.is_empty() {
        return 0.0;
    }
    let at_pace = positives
        .iter()
        .filter(|delta| **delta >= recent_average)
        .count();
    at_pace as f64 / positives.len() as f64 * 100.0
}

/// First record whose cumulative value covers each checkpoint.
pub fn milestones(points: &[DailyPoint], levels: &[u32]) -> Vec<Milestone> {
    levels
        .iter()
        .map(|&level| {
            let required_experience = cumulative_required(level);
            let reached_on = points
                .iter()
                .find(|point| point.cumulative_experience >= required_experience)
                .map(|point| point.recorded_on);
            Milestone {
                level,
                required_experience,
                reached_on,
            }
        })
        .collect()
}

fn rolling_mean(points: &[DailyPoint], end: usize, window: usize) -> f64 {
    let start = (end + 1).saturating_sub(window);
    let slice = &points[start..=end];
    slice.iter().map(|point| point.daily_delta as f64).sum::<f64>() / slice.len() as f64
}

fn chart_rows(points: &[DailyPoint], required_daily_pace: f64) -> Vec<ChartRow> {
    let baseline = points[0].cumulative_experience as f64;
    points
        .iter()
        .enumerate()
        .map(|(index, point)| ChartRow {
            date: point.recorded_on,
            cumulative_experience: point.cumulative_experience,
            daily_delta: point.daily_delta,
            rolling_7: rolling_mean(points, index, SHORT_ROLLING_WINDOW),
            rolling_30: rolling_mean(points, index, RECENT_WINDOW),
            pace_percent: (required_daily_pace > 0.0)
                .then(|| point.daily_delta as f64 / required_daily_pace * 100.0),
            planned_experience: baseline + index as f64 * required_daily_pace,
        })
        .collect()
}

fn weekday_averages(points: &[DailyPoint]) -> Vec<WeekdayAverage> {
    let mut weekday = Weekday::Mon;
    let mut averages = Vec::with_capacity(7);
    for _ in 0..7 {
        let deltas: Vec<f64> = points
            .iter()
            .filter(|point| point.recorded_on.weekday() == weekday)
            .map(|point| point.daily_delta as f64)
            .collect();
        averages.push(WeekdayAverage {
            weekday: weekday.to_string(),
            average: mean(&deltas),
        });
        weekday = weekday.succ();
    }
    averages
}

/// Summed delta per ISO week and weekday. Every week touched by the series
/// gets all seven cells, idle or unrecorded days as 0.
fn weekly_heatmap(points: &[DailyPoint]) -> Vec<WeekCell> {
    let mut weeks: Vec<(i32, u32)> = points
        .iter()
        .map(|point| {
            let week = point.recorded_on.iso_week();
            (week.year(), week.week())
        })
        .collect();
    weeks.sort_unstable();
    weeks.dedup();

    let mut cells = Vec::with_capacity(weeks.len() * 7);
    for (year, week) in weeks {
        let mut weekday = Weekday::Mon;
        for _ in 0..7 {
            let total = points
                .iter()
                .filter(|point| {
                    let iso = point.recorded_on.iso_week();
                    iso.year() == year
                        && iso.week() == week
                        && point.recorded_on.weekday() == weekday
                })
                .map(|point| point.daily_delta)
                .sum();
            cells.push(WeekCell {
                week: format!("{year}-S{week:02}"),
                weekday: weekday.to_string(),
                total,
            });
            weekday = weekday.succ();
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::tests::{day, series_of};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn as_of() -> NaiveDate {
        day(10)
    }

    #[test]
    fn corrected_series_yields_expected_core_figures() {
        let series = series_of(&[1000, 1500, 1400, 2500]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        assert_eq!(snapshot.current_experience, 2500);
        assert_eq!(snapshot.current_level, 6);
        assert_eq!(snapshot.target_experience, 9300);
        assert_eq!(snapshot.remaining_experience, 6800);
        assert_close(snapshot.general_average, 800.0);
        assert_close(snapshot.recent_average, 800.0);
        assert_eq!(
            snapshot.best_day,
            BestDay {
                date: day(4),
                experience: 1100
            }
        );
        assert_eq!(snapshot.trend, Trend::Stable);
        assert_close(snapshot.std_dev, 180_000f64.sqrt());
        assert_close(snapshot.consistency_score, 50.0);
        assert_eq!(snapshot.today_delta, 1100);
    }

    #[test]
    fn unreached_target_projects_a_future_date() {
        let series = series_of(&[1000, 1500, 1400, 2500]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        assert!(snapshot.remaining_experience > 0);
        assert_eq!(
            snapshot.eta,
            Eta::Projected {
                days_remaining: 8,
                date: day(18)
            }
        );
        assert_close(snapshot.required_daily_pace, 850.0);
        assert_close(snapshot.today_vs_pace, 250.0);
        assert_eq!(snapshot.good_streak, 1);
        assert_eq!(snapshot.risk_streak, 0);
    }

    #[test]
    fn scenarios_use_each_pace_independently() {
        let series = series_of(&[1000, 1500, 1400, 2500]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        let days: Vec<(PaceKind, i64)> = snapshot
            .scenarios
            .iter()
            .map(|scenario| (scenario.kind, scenario.days_remaining))
            .collect();
        assert_eq!(
            days,
            vec![
                (PaceKind::General, 8),
                (PaceKind::Recent, 8),
                (PaceKind::Record, 6)
            ]
        );
        assert_eq!(snapshot.scenarios[2].date, day(16));
    }

    #[test]
    fn far_targets_are_capped_at_the_horizons() {
        let series = series_of(&[1000, 1100]);
        let snapshot = compute_snapshot(&series, i64::from(MAX_LEVEL), as_of()).unwrap();

        match snapshot.eta {
            Eta::Projected { days_remaining, .. } => {
                assert_eq!(days_remaining, ETA_HORIZON_DAYS as i64)
            }
            other => panic!("unexpected eta {other:?}"),
        }
        assert_close(snapshot.required_daily_pace, 100.0);
        assert!(snapshot
            .scenarios
            .iter()
            .all(|scenario| scenario.days_remaining == SCENARIO_HORIZON_DAYS as i64));
    }

    #[test]
    fn capped_eta_keeps_the_pace_of_the_recent_average() {
        let series = series_of(&[0, 100, 200, 300]);
        let snapshot = compute_snapshot(&series, i64::from(MAX_LEVEL), as_of()).unwrap();

        assert!(matches!(
            snapshot.eta,
            Eta::Projected { days_remaining, .. } if days_remaining == ETA_HORIZON_DAYS as i64
        ));
        assert_close(snapshot.required_daily_pace, 100.0);
        assert_eq!(snapshot.good_streak, 3);
        assert_eq!(snapshot.risk_streak, 0);
        assert_close(snapshot.today_vs_pace, 0.0);
        assert_close(snapshot.chart[3].pace_percent.unwrap(), 100.0);
    }

    #[test]
    fn days_to_cover_is_at_least_one() {
        assert_eq!(days_to_cover(10, 1_000.0, ETA_HORIZON_DAYS), Some(1));
        assert_eq!(days_to_cover(10, 0.0, ETA_HORIZON_DAYS), None);
    }

    #[test]
    fn recent_average_falls_back_when_window_is_idle() {
        let mut values = vec![0, 1000, 2000];
        values.extend(std::iter::repeat(2000).take(RECENT_WINDOW));
        let series = series_of(&values);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        assert_close(snapshot.general_average, 1000.0);
        assert_close(snapshot.recent_average, 1000.0);
    }

    #[test]
    fn recent_average_only_looks_at_trailing_records() {
        let mut values = vec![0, 10_000];
        let mut total = 10_000;
        for _ in 0..RECENT_WINDOW {
            total += 100;
            values.push(total);
        }
        let series = series_of(&values);
        let snapshot = compute_snapshot(&series, 100, as_of()).unwrap();

        assert_close(snapshot.recent_average, 100.0);
        assert!(snapshot.general_average > snapshot.recent_average);
        assert_eq!(snapshot.trend, Trend::Down);
    }

    #[test]
    fn idle_series_has_zero_statistics() {
        let series = series_of(&[1000, 1000, 900]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        assert_close(snapshot.general_average, 0.0);
        assert_close(snapshot.recent_average, 0.0);
        assert_close(snapshot.consistency_score, 0.0);
        assert_close(snapshot.std_dev, 0.0);
        assert_eq!(snapshot.eta, Eta::Unavailable);
        assert_eq!(snapshot.good_streak, 0);
        assert_eq!(snapshot.risk_streak, 0);
        assert!(snapshot.scenarios.is_empty());
    }

    #[test]
    fn consistency_score_without_active_days_is_zero() {
        assert_close(consistency_score(&[], 500.0), 0.0);
    }

    #[test]
    fn streaks_stop_at_the_first_break() {
        let series = series_of(&[0, 100, 200, 210, 310, 410]);
        let points = series.points();

        assert_eq!(trailing_streak(points, |delta| delta >= 100.0), 2);
        assert_eq!(trailing_streak(points, |delta| delta < 50.0), 0);
        assert_eq!(trailing_streak(points, |delta| delta > 1_000.0), 0);
    }

    #[test]
    fn risk_streak_counts_recent_idle_days() {
        let series = series_of(&[1000, 2000, 3000, 3000, 3010, 3010]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        assert!(snapshot.required_daily_pace > 0.0);
        assert_eq!(snapshot.risk_streak, 3);
        assert_eq!(snapshot.good_streak, 0);
    }

    #[test]
    fn reached_target_is_complete() {
        let series = series_of(&[50, 150]);
        let snapshot = compute_snapshot(&series, 2, as_of()).unwrap();

        assert_eq!(snapshot.remaining_experience, 0);
        assert_eq!(snapshot.eta, Eta::Complete);
        assert_close(snapshot.required_daily_pace, 0.0);
        assert!(snapshot.scenarios.is_empty());
        assert_eq!(snapshot.good_streak, 0);
    }

    #[test]
    fn single_record_degrades_gracefully() {
        let series = series_of(&[cumulative_required(50)]);
        let snapshot = compute_snapshot(&series, 100, as_of()).unwrap();

        assert_eq!(snapshot.current_level, 50);
        assert_eq!(snapshot.eta, Eta::Unavailable);
        assert_eq!(snapshot.good_streak, 0);
        assert_eq!(snapshot.risk_streak, 0);
        assert_eq!(snapshot.trend_slope, None);
        assert_eq!(
            snapshot.best_day,
            BestDay {
                date: day(1),
                experience: 0
            }
        );
        assert_eq!(snapshot.chart.len(), 1);
    }

    #[test]
    fn best_day_ties_go_to_the_earliest_record() {
        let series = series_of(&[0, 500, 1000, 1500]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();
        assert_eq!(snapshot.best_day.date, day(2));
    }

    #[test]
    fn trend_has_a_dead_band() {
        assert_eq!(classify_trend(104.0, 100.0), Trend::Stable);
        assert_eq!(classify_trend(96.0, 100.0), Trend::Stable);
        assert_eq!(classify_trend(106.0, 100.0), Trend::Up);
        assert_eq!(classify_trend(94.0, 100.0), Trend::Down);
        assert_eq!(classify_trend(0.0, 0.0), Trend::Stable);
    }

    #[test]
    fn trend_slope_fits_deltas() {
        let series = series_of(&[1000, 1500, 1400, 2500]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();
        assert_close(snapshot.trend_slope.unwrap(), 280.0);
    }

    #[test]
    fn milestones_record_first_record_at_or_above_threshold() {
        let series = series_of(&[
            cumulative_required(200) - 1,
            cumulative_required(200),
            cumulative_required(400) + 5,
            cumulative_required(400) + 10,
        ]);
        let found = milestones(series.points(), &MILESTONE_LEVELS);

        assert_eq!(found[0].level, 200);
        assert_eq!(found[0].reached_on, Some(day(2)));
        assert_eq!(found[1].reached_on, Some(day(3)));
        assert!(found[2..].iter().all(|milestone| milestone.reached_on.is_none()));
    }

    #[test]
    fn chart_rows_carry_rolling_means_and_plan() {
        let series = series_of(&[1000, 1500, 1400, 2500]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();
        let last = &snapshot.chart[3];

        assert_close(last.rolling_7, 400.0);
        assert_close(last.rolling_30, 400.0);
        assert_close(snapshot.chart[1].rolling_7, 250.0);
        assert_close(last.pace_percent.unwrap(), 1100.0 / 850.0 * 100.0);
        assert_close(last.planned_experience, 1000.0 + 3.0 * 850.0);
    }

    #[test]
    fn weekday_averages_cover_the_whole_week() {
        // 2025-01-01 is a Wednesday.
        let series = series_of(&[1000, 1500, 1400, 2500]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        assert_eq!(snapshot.weekdays.len(), 7);
        assert_eq!(snapshot.weekdays[0].weekday, "Mon");
        assert_close(snapshot.weekdays[0].average, 0.0);
        assert_close(snapshot.weekdays[3].average, 500.0);
        assert_close(snapshot.weekdays[5].average, 1100.0);
    }

    #[test]
    fn heatmap_fills_every_weekday_of_each_iso_week() {
        // 2025-01-01..08 spans Wednesday of ISO week 1 to Wednesday of week 2.
        let series = series_of(&[0, 100, 300, 600, 1000, 1500, 2100, 2800]);
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();
        let heatmap = &snapshot.heatmap;

        assert_eq!(heatmap.len(), 14);
        assert!(heatmap[..7].iter().all(|cell| cell.week == "2025-S01"));
        assert!(heatmap[7..].iter().all(|cell| cell.week == "2025-S02"));

        let totals: Vec<u64> = heatmap.iter().map(|cell| cell.total).collect();
        assert_eq!(
            totals,
            vec![0, 0, 0, 100, 200, 300, 400, 500, 600, 700, 0, 0, 0, 0]
        );
        assert_eq!(heatmap[0].weekday, "Mon");
        assert_eq!(heatmap[13].weekday, "Sun");
    }

    #[test]
    fn heatmap_sums_records_sharing_a_day() {
        let records = vec![
            crate::models::ExperienceRecord {
                recorded_on: day(1),
                cumulative_experience: 1000,
            },
            crate::models::ExperienceRecord {
                recorded_on: day(1),
                cumulative_experience: 1200,
            },
            crate::models::ExperienceRecord {
                recorded_on: day(1),
                cumulative_experience: 1500,
            },
        ];
        let series = crate::series::prepare(records).unwrap();
        let snapshot = compute_snapshot(&series, 10, as_of()).unwrap();

        let wednesday = snapshot
            .heatmap
            .iter()
            .find(|cell| cell.weekday == "Wed")
            .unwrap();
        assert_eq!(wednesday.total, 500);
    }

    #[test]
    fn invalid_target_levels_are_rejected() {
        let series = series_of(&[1000]);
        for level in [-5, 0, i64::from(MAX_LEVEL) + 1] {
            assert_eq!(
                compute_snapshot(&series, level, as_of()),
                Err(ComputationError::InvalidTargetLevel {
                    level,
                    max: MAX_LEVEL
                })
            );
        }
    }
}
