use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One spreadsheet row as the source hands it over, before any validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExperienceRow {
    #[serde(
        rename = "create_at",
        alias = "Date",
        alias = "date",
        alias = "timestamp",
        default
    )]
    pub timestamp: Option<String>,
    #[serde(
        rename = "Experience",
        alias = "experience",
        alias = "cumulative_experience",
        default
    )]
    pub experience: Option<String>,
    #[serde(default)]
    pub source_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceRecord {
    pub recorded_on: NaiveDate,
    pub cumulative_experience: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub recorded_on: NaiveDate,
    pub cumulative_experience: u64,
    pub daily_delta: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Eta {
    /// Target already reached.
    Complete,
    /// No pace to project from.
    Unavailable,
    Projected {
        days_remaining: i64,
        date: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceKind {
    General,
    Recent,
    Record,
}

impl PaceKind {
    pub fn label(self) -> &'static str {
        match self {
            PaceKind::General => "General average",
            PaceKind::Recent => "Recent average (30 records)",
            PaceKind::Record => "Record pace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub kind: PaceKind,
    pub daily_pace: f64,
    pub days_remaining: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestDay {
    pub date: NaiveDate,
    pub experience: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn symbol(self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "STABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub level: u32,
    pub required_experience: u64,
    pub reached_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub date: NaiveDate,
    pub cumulative_experience: u64,
    pub daily_delta: u64,
    pub rolling_7: f64,
    pub rolling_30: f64,
    pub pace_percent: Option<f64>,
    pub planned_experience: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayAverage {
    pub weekday: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekCell {
    pub week: String,
    pub weekday: String,
    pub total: u64,
}

/// Everything one refresh derives from the series. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub as_of: NaiveDate,
    pub record_count: usize,
    pub current_experience: u64,
    pub current_level: u32,
    pub target_level: u32,
    pub target_experience: u64,
    pub remaining_experience: u64,
    pub general_average: f64,
    pub recent_average: f64,
    pub required_daily_pace: f64,
    pub eta: Eta,
    pub scenarios: Vec<Scenario>,
    pub good_streak: usize,
    pub risk_streak: usize,
    pub best_day: BestDay,
    pub trend: Trend,
    pub trend_slope: Option<f64>,
    pub std_dev: f64,
    pub consistency_score: f64,
    pub today_delta: u64,
    pub today_vs_pace: f64,
    pub milestones: Vec<Milestone>,
    pub chart: Vec<ChartRow>,
    pub weekdays: Vec<WeekdayAverage>,
    pub heatmap: Vec<WeekCell>,
}
