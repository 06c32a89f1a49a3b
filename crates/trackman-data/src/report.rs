//! Text report and chart series rendering.
//!
//! Layout matches the legacy `trackman_analysis_report.txt`: a header with
//! the shot count and date range, a performance block and a dispersion block
//! per club group. Rounding to display precision happens here and nowhere
//! else.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use trackman_core::formatting::{format_fixed, format_report_time, ms_to_mph, underline};
use trackman_core::models::{columns, DateRange};

use crate::aggregator::{AggregateGroup, DailyClubStats, MetricStats};

// ── Report lines ──────────────────────────────────────────────────────────────

/// Which statistic of a metric a report line prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Mean,
    StdDev,
}

/// One `  <label>: <value><unit>` line of a club block.
#[derive(Debug, Clone, Copy)]
pub struct ReportLine {
    pub label: &'static str,
    pub column: &'static str,
    pub stat: Stat,
    pub decimals: usize,
    pub unit: &'static str,
}

impl ReportLine {
    const fn mean(label: &'static str, column: &'static str, decimals: usize, unit: &'static str) -> Self {
        Self { label, column, stat: Stat::Mean, decimals, unit }
    }

    /// Rendered line, or `None` when the group has no such metric column.
    fn render(&self, group: &AggregateGroup) -> Option<String> {
        let stats = group.metric(self.column)?;
        let value = match self.stat {
            Stat::Mean => stats.mean,
            Stat::StdDev => stats.stddev,
        };
        Some(format!(
            "  {}: {}{}\n",
            self.label,
            format_fixed(value, self.decimals),
            self.unit
        ))
    }
}

pub const PERFORMANCE_LINES: [ReportLine; 7] = [
    ReportLine::mean("Average Ball Speed", columns::BALL_SPEED, 1, " mph"),
    ReportLine::mean("Average Club Speed", columns::CLUB_SPEED, 1, " mph"),
    ReportLine::mean("Average Smash Factor", columns::SMASH_FACTOR, 2, ""),
    ReportLine::mean("Average Carry Distance", columns::CARRY, 1, " yards"),
    ReportLine::mean("Average Total Distance", columns::TOTAL, 1, " yards"),
    ReportLine::mean("Average Launch Angle", columns::LAUNCH_ANGLE, 1, " degrees"),
    ReportLine::mean("Average Spin Rate", columns::SPIN_RATE, 0, " rpm"),
];

pub const DISPERSION_LINES: [ReportLine; 4] = [
    ReportLine::mean("Average Side Carry", columns::CARRY_SIDE, 1, " yards"),
    ReportLine {
        label: "Side Carry Standard Deviation",
        column: columns::CARRY_SIDE,
        stat: Stat::StdDev,
        decimals: 1,
        unit: " yards",
    },
    ReportLine::mean("Average Club Path", columns::CLUB_PATH, 1, " degrees"),
    ReportLine::mean("Average Face Angle", columns::FACE_ANGLE, 1, " degrees"),
];

/// Every metric column the analysis report prints.
pub const REPORT_METRICS: &[&str] = &[
    columns::BALL_SPEED,
    columns::CLUB_SPEED,
    columns::SMASH_FACTOR,
    columns::CARRY,
    columns::TOTAL,
    columns::LAUNCH_ANGLE,
    columns::SPIN_RATE,
    columns::CARRY_SIDE,
    columns::CLUB_PATH,
    columns::FACE_ANGLE,
];

/// Metric columns of the club summary.
pub const SUMMARY_METRICS: &[&str] = &[
    columns::ATTACK_ANGLE,
    columns::CLUB_PATH,
    columns::CLUB_SPEED,
    columns::FACE_ANGLE,
    columns::LAUNCH_ANGLE,
    columns::SPIN_RATE,
];

/// Metric columns tracked per day for trend charts.
pub const TREND_METRICS: &[&str] = &[
    columns::BALL_SPEED,
    columns::CARRY,
    columns::CLUB_SPEED,
    columns::SMASH_FACTOR,
];

// ── Analysis report ───────────────────────────────────────────────────────────

/// Dataset-level facts printed in the report header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportContext {
    pub total_shots: usize,
    pub date_range: Option<DateRange>,
}

/// Render the full analysis report.
pub fn format_report(groups: &[AggregateGroup], ctx: &ReportContext) -> String {
    let mut out = underline("TRACKMAN DATA ANALYSIS REPORT", '=');
    out.push('\n');

    let _ = writeln!(out, "Total shots analyzed: {}", ctx.total_shots);
    if let Some(range) = ctx.date_range {
        let _ = writeln!(
            out,
            "Date range: {} to {}",
            format_report_time(&range.start),
            format_report_time(&range.end)
        );
    }
    out.push('\n');

    out.push_str(&underline("CLUB PERFORMANCE SUMMARY", '-'));
    out.push('\n');
    for group in groups {
        let _ = writeln!(out, "{} ({} shots):", group.club, group.shot_count);
        out.extend(PERFORMANCE_LINES.iter().filter_map(|line| line.render(group)));
        out.push('\n');
    }

    out.push_str(&underline("SHOT DISPERSION ANALYSIS", '-'));
    out.push('\n');
    for group in groups {
        let _ = writeln!(out, "{}:", group.club);
        out.extend(DISPERSION_LINES.iter().filter_map(|line| line.render(group)));
        out.push('\n');
    }

    out
}

// ── Club summary ──────────────────────────────────────────────────────────────

/// Render per-club averages of [`SUMMARY_METRICS`]. Groups without shots are
/// left out.
pub fn format_club_summary(groups: &[AggregateGroup]) -> String {
    let mut out = String::from("\nSummary Statistics:\n");

    for group in groups.iter().filter(|g| g.shot_count > 0) {
        let _ = write!(out, "\n{} ({} shots):\n", group.club, group.shot_count);

        for &column in SUMMARY_METRICS {
            let Some(mean) = group.metric(column).map(|m| m.mean) else {
                continue;
            };
            let name = short_name(column);
            if column == columns::CLUB_SPEED {
                let _ = writeln!(out, "  Average Club Speed (raw): {} m/s", format_fixed(mean, 1));
                let _ = writeln!(
                    out,
                    "  Average Club Speed: {} mph",
                    format_fixed(mean.map(ms_to_mph), 1)
                );
            } else if name.contains("Angle") {
                let _ = writeln!(out, "  Average {}: {}°", name, format_fixed(mean, 1));
            } else if column == columns::SPIN_RATE {
                let _ = writeln!(out, "  Average {}: {} rpm", name, format_fixed(mean, 0));
            } else {
                let _ = writeln!(out, "  Average {}: {}", name, format_fixed(mean, 2));
            }
        }
    }

    out
}

fn short_name(column: &str) -> &str {
    column.strip_prefix("Measurement_").unwrap_or(column)
}

// ── Chart series ──────────────────────────────────────────────────────────────

/// One club's value in a [`ChartSeries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub club: String,
    pub shot_count: usize,
    pub count: usize,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
}

/// Per-club values of one metric, ready for a bar chart with error bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub metric: String,
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

/// Build one series per metric in `metrics` that any group carries.
pub fn chart_series(groups: &[AggregateGroup], metrics: &[&str]) -> Vec<ChartSeries> {
    metrics
        .iter()
        .filter(|&&column| groups.iter().any(|g| g.metric(column).is_some()))
        .map(|&column| ChartSeries {
            metric: column.to_string(),
            label: short_name(column).to_string(),
            points: groups
                .iter()
                .map(|g| {
                    let stats = g.metric(column).copied().unwrap_or_default();
                    SeriesPoint {
                        club: g.club.to_string(),
                        shot_count: g.shot_count,
                        count: stats.count,
                        mean: stats.mean,
                        stddev: stats.stddev,
                    }
                })
                .collect(),
        })
        .collect()
}

/// Daily per-club means for trend lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// `%Y-%m-%d`
    pub day: String,
    pub club: String,
    pub shot_count: usize,
    pub means: BTreeMap<String, Option<f64>>,
}

pub fn trend_series(daily: &[DailyClubStats]) -> Vec<TrendPoint> {
    daily
        .iter()
        .map(|d| TrendPoint {
            day: d.day.format("%Y-%m-%d").to_string(),
            club: d.club.to_string(),
            shot_count: d.shot_count,
            means: d
                .metrics
                .iter()
                .map(|(column, stats): (&String, &MetricStats)| (column.clone(), stats.mean))
                .collect(),
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
