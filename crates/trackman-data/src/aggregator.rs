//! Per-club statistics over the combined dataset.
//!
//! Groups shots by club label, including the unknown bucket, and computes
//! count, mean, sample standard deviation, min and max for each requested
//! metric column. Values are kept at full precision; rounding happens only
//! when a report is rendered.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;
use trackman_core::models::{ClubLabel, Shot};
use trackman_core::schema::Schema;
use trackman_core::{Result, TrackmanError};

use crate::store::Dataset;

// ── MetricStats ───────────────────────────────────────────────────────────────

/// Summary statistics of one metric within one group.
///
/// Every statistic is `None` when it is undefined for the observed values;
/// an undefined value is never reported as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricStats {
    /// Number of non-missing observations.
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n − 1). Needs at least two observations.
    pub stddev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let stddev = (count >= 2).then(|| {
            let sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (sq / (n - 1.0)).sqrt()
        });
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count,
            mean: Some(mean),
            stddev,
            min: Some(min),
            max: Some(max),
        }
    }
}

// ── AggregateGroup ────────────────────────────────────────────────────────────

/// Statistics for every shot sharing one club label.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateGroup {
    pub club: ClubLabel,
    /// Every shot in the group, whether or not a metric was recorded.
    pub shot_count: usize,
    /// Keyed by column name. Columns absent from the dataset schema have no
    /// entry.
    pub metrics: BTreeMap<String, MetricStats>,
}

impl AggregateGroup {
    pub fn metric(&self, column: &str) -> Option<&MetricStats> {
        self.metrics.get(column)
    }

    /// Mean of `column`, `None` when absent or undefined.
    pub fn mean(&self, column: &str) -> Option<f64> {
        self.metric(column).and_then(|m| m.mean)
    }
}

/// Per-(day, club) statistics used for trend charts.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyClubStats {
    pub day: NaiveDate,
    pub club: ClubLabel,
    pub shot_count: usize,
    pub metrics: BTreeMap<String, MetricStats>,
}

// ── ShotAggregator ────────────────────────────────────────────────────────────

/// Stateless helper that groups shots by club.
pub struct ShotAggregator;

impl ShotAggregator {
    /// One group per club label in first-seen order.
    ///
    /// The unknown bucket is always present: at its first-seen position when
    /// any shot lacks a club, otherwise appended last with zero shots.
    pub fn aggregate(dataset: &Dataset, metrics: &[&str]) -> Vec<AggregateGroup> {
        let mut groups: Vec<AggregateGroup> = group_by_club(dataset.shots().iter())
            .into_iter()
            .map(|(club, shots)| summarize(club, &shots, metrics, dataset.schema()))
            .collect();

        if !groups.iter().any(|g| g.club.is_unknown()) {
            groups.push(summarize(ClubLabel::Unknown, &[], metrics, dataset.schema()));
        }

        debug!(
            shots = dataset.len(),
            groups = groups.len(),
            "aggregated dataset by club"
        );
        groups
    }

    /// Statistics for a single club. Fails with
    /// [`TrackmanError::UnknownClub`] when no shot carries that label.
    pub fn aggregate_club(
        dataset: &Dataset,
        club: &str,
        metrics: &[&str],
    ) -> Result<AggregateGroup> {
        let label = ClubLabel::parse(Some(club));
        let shots: Vec<&Shot> = dataset.shots().iter().filter(|s| s.club == label).collect();
        if shots.is_empty() {
            return Err(TrackmanError::UnknownClub(club.to_string()));
        }
        Ok(summarize(label, &shots, metrics, dataset.schema()))
    }

    /// Statistics per calendar day (UTC) and club. Days ascend; clubs keep
    /// their first-seen order within the day. Shots without a timestamp are
    /// left out.
    pub fn aggregate_daily(dataset: &Dataset, metrics: &[&str]) -> Vec<DailyClubStats> {
        let mut days: BTreeMap<NaiveDate, Vec<&Shot>> = BTreeMap::new();
        let mut undated = 0usize;
        for shot in dataset.shots() {
            match shot.timestamp {
                Some(ts) => days.entry(ts.date_naive()).or_default().push(shot),
                None => undated += 1,
            }
        }
        if undated > 0 {
            debug!(undated, "shots without a timestamp left out of daily trends");
        }

        days.into_iter()
            .flat_map(|(day, shots)| {
                group_by_club(shots.into_iter())
                    .into_iter()
                    .map(move |(club, shots)| {
                        let group = summarize(club, &shots, metrics, dataset.schema());
                        DailyClubStats {
                            day,
                            club: group.club,
                            shot_count: group.shot_count,
                            metrics: group.metrics,
                        }
                    })
            })
            .collect()
    }

    /// Sum of shot counts across groups.
    pub fn total_shots(groups: &[AggregateGroup]) -> usize {
        groups.iter().map(|g| g.shot_count).sum()
    }
}

// ── Private ───────────────────────────────────────────────────────────────────

fn group_by_club<'a>(shots: impl Iterator<Item = &'a Shot>) -> Vec<(ClubLabel, Vec<&'a Shot>)> {
    let mut order: Vec<(ClubLabel, Vec<&'a Shot>)> = Vec::new();
    let mut index: HashMap<ClubLabel, usize> = HashMap::new();

    for shot in shots {
        let slot = *index.entry(shot.club.clone()).or_insert_with(|| {
            order.push((shot.club.clone(), Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(shot);
    }
    order
}

fn summarize(club: ClubLabel, shots: &[&Shot], metrics: &[&str], schema: &Schema) -> AggregateGroup {
    let metrics = metrics
        .iter()
        .filter(|column| schema.contains(column))
        .map(|&column| {
            let values: Vec<f64> = shots.iter().filter_map(|s| s.number(column)).collect();
            (column.to_string(), MetricStats::from_values(&values))
        })
        .collect();

    AggregateGroup {
        club,
        shot_count: shots.len(),
        metrics,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
