use std::fmt::Write;

use crate::models::{Eta, MetricsSnapshot};

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Risk streaks longer than this are flagged.
const RISK_STREAK_ALERT: usize = 3;

pub fn format_millions(value: f64) -> String {
    format!("{:.1}M", value / 1e6)
}

pub fn eta_text(eta: &Eta) -> String {
    match eta {
        Eta::Complete => "target reached".to_string(),
        Eta::Unavailable => "N/A".to_string(),
        Eta::Projected {
            days_remaining,
            date,
        } => format!("{} ({} days)", date.format(DATE_FORMAT), days_remaining),
    }
}

pub fn risk_streak_text(days: usize) -> String {
    if days == 0 {
        "OK".to_string()
    } else {
        format!("{days}d")
    }
}

pub fn today_vs_pace_text(difference: f64) -> String {
    let sign = if difference > 0.0 { "+" } else { "" };
    format!("{sign}{} vs pace", format_millions(difference))
}

/// Short plain-text summary for the terminal.
pub fn summary(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Level {} -> {} ({} XP remaining)",
        snapshot.current_level,
        snapshot.target_level,
        snapshot.remaining_experience
    );
    let _ = writeln!(output, "ETA: {}", eta_text(&snapshot.eta));
    let _ = writeln!(
        output,
        "Averages: general {} / recent {} / required {}",
        format_millions(snapshot.general_average),
        format_millions(snapshot.recent_average),
        format_millions(snapshot.required_daily_pace)
    );
    let _ = writeln!(
        output,
        "Streaks: on pace {}d, low activity {}",
        snapshot.good_streak,
        risk_streak_text(snapshot.risk_streak)
    );
    let _ = writeln!(
        output,
        "Today: {} | trend {}",
        today_vs_pace_text(snapshot.today_vs_pace),
        snapshot.trend.symbol()
    );
    output
}

pub fn build_report(source: &str, snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Level {} Progress Report", snapshot.target_level);
    let _ = writeln!(
        output,
        "Generated from {} on {} ({} records)",
        source,
        snapshot.as_of.format(DATE_FORMAT),
        snapshot.record_count
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Current level: {}", snapshot.current_level);
    let _ = writeln!(
        output,
        "- Experience: {} of {} ({} remaining)",
        snapshot.current_experience, snapshot.target_experience, snapshot.remaining_experience
    );
    let _ = writeln!(output, "- ETA: {}", eta_text(&snapshot.eta));
    let _ = writeln!(
        output,
        "- Required daily pace: {}",
        format_millions(snapshot.required_daily_pace)
    );
    let _ = writeln!(
        output,
        "- Best day: {} on {}",
        format_millions(snapshot.best_day.experience as f64),
        snapshot.best_day.date.format(DATE_FORMAT)
    );
    let _ = writeln!(output, "- Trend: {}", snapshot.trend.symbol());
    let _ = writeln!(output);

    let _ = writeln!(output, "## Consistency");
    let _ = writeln!(
        output,
        "- General average: {}",
        format_millions(snapshot.general_average)
    );
    let _ = writeln!(
        output,
        "- Recent average: {}",
        format_millions(snapshot.recent_average)
    );
    let _ = writeln!(
        output,
        "- Standard deviation: {}",
        format_millions(snapshot.std_dev)
    );
    let _ = writeln!(
        output,
        "- Consistency score: {:.1}%",
        snapshot.consistency_score
    );
    let _ = writeln!(output, "- Days on pace: {}", snapshot.good_streak);
    let risk_flag = if snapshot.risk_streak > RISK_STREAK_ALERT {
        " (attention)"
    } else {
        ""
    };
    let _ = writeln!(
        output,
        "- Low activity streak: {}{}",
        risk_streak_text(snapshot.risk_streak),
        risk_flag
    );
    let _ = writeln!(
        output,
        "- Today: {}",
        today_vs_pace_text(snapshot.today_vs_pace)
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## ETA Scenarios");
    if snapshot.scenarios.is_empty() {
        let _ = writeln!(output, "No scenario has a usable pace.");
    } else {
        for scenario in &snapshot.scenarios {
            let _ = writeln!(
                output,
                "- {}: {} days ({}) at {}/day",
                scenario.kind.label(),
                scenario.days_remaining,
                scenario.date.format(DATE_FORMAT),
                format_millions(scenario.daily_pace)
            );
        }
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Weekday Averages");
    for weekday in &snapshot.weekdays {
        let _ = writeln!(
            output,
            "- {}: {}",
            weekday.weekday,
            format_millions(weekday.average)
        );
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Weekly Activity");
    if !snapshot.heatmap.is_empty() {
        let _ = writeln!(output, "| Week | Mon | Tue | Wed | Thu | Fri | Sat | Sun |");
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for week in snapshot.heatmap.chunks(7) {
            let _ = write!(output, "| {} |", week[0].week);
            for cell in week {
                let _ = write!(output, " {} |", format_millions(cell.total as f64));
            }
            let _ = writeln!(output);
        }
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Milestones");
    for milestone in &snapshot.milestones {
        match milestone.reached_on {
            Some(date) => {
                let _ = writeln!(
                    output,
                    "- Level {}: reached {}",
                    milestone.level,
                    date.format(DATE_FORMAT)
                );
            }
            None => {
                let _ = writeln!(output, "- Level {}: not yet reached", milestone.level);
            }
        }
    }

    output
}

pub fn no_data_report(source: &str, reason: Option<&str>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Progress Report");
    let _ = writeln!(output, "No experience data available from {source}.");
    if let Some(reason) = reason {
        let _ = writeln!(output, "Reason: {reason}");
    }
    output
}
