//! Import and analysis pipelines.
//!
//! Ties the reader, normaliser, store, aggregator and report formatter
//! together into the two operations the binary exposes.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use trackman_core::models::{DateRange, RawReport};
use trackman_core::RecordIssue;

use crate::aggregator::{AggregateGroup, ShotAggregator};
use crate::normalizer::{GroupNormalizer, Normalizer};
use crate::report::{
    chart_series, format_report, trend_series, ChartSeries, ReportContext, TrendPoint,
    REPORT_METRICS, TREND_METRICS,
};
use crate::store::{Dataset, GroupStore, MergePolicy, MergeResult, ShotStore};

// ── Import ────────────────────────────────────────────────────────────────────

/// Totals of one import run across all its reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub reports: usize,
    /// Raw shot entries seen, including malformed ones.
    pub shots_read: usize,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub replaced: usize,
    /// Columns added to the stored schema, in order of appearance.
    pub new_columns: Vec<String>,
    pub issues: Vec<RecordIssue>,
}

impl ImportSummary {
    fn absorb(&mut self, merged: MergeResult) {
        self.inserted += merged.inserted;
        self.skipped_duplicate += merged.skipped_duplicate;
        self.replaced += merged.replaced;
        self.new_columns.extend(merged.new_columns);
        self.issues.extend(merged.issues);
    }
}

/// Normalise and merge every report into `store`, one batch per report.
///
/// Under [`MergePolicy::SkipExisting`] entries whose key is already stored
/// are dropped before normalisation, so a re-imported report cannot add
/// columns or fix column kinds. The store is not saved; call
/// [`ShotStore::save`] afterwards.
pub fn import_reports(store: &ShotStore, reports: &[RawReport], policy: MergePolicy) -> ImportSummary {
    let mut normalizer = Normalizer::with_schema(store.snapshot().schema().clone());
    let mut summary = ImportSummary::default();

    for report in reports {
        let batch = match policy {
            MergePolicy::SkipExisting => {
                let stored = store.snapshot();
                let mut seen = HashSet::new();
                normalizer.normalize_where(report, |key| {
                    !stored.contains(key) && seen.insert(key.clone())
                })
            }
            MergePolicy::Overwrite => normalizer.normalize(report),
        };
        summary.reports += 1;
        summary.shots_read += report.shots.len();
        summary.skipped_duplicate += batch.filtered;
        summary.issues.extend(batch.issues);
        summary.absorb(store.merge_with(batch.shots, policy));
    }

    for issue in &summary.issues {
        warn!("{}", issue);
    }
    info!(
        reports = summary.reports,
        shots_read = summary.shots_read,
        inserted = summary.inserted,
        skipped_duplicate = summary.skipped_duplicate,
        replaced = summary.replaced,
        new_columns = summary.new_columns.len(),
        issues = summary.issues.len(),
        "Import finished"
    );
    summary
}

/// Merge the stroke groups of every report into `store`, with the same
/// duplicate handling as [`import_reports`].
pub fn import_groups(store: &GroupStore, reports: &[RawReport], policy: MergePolicy) -> MergeResult {
    let mut normalizer = GroupNormalizer::with_schema(store.snapshot().schema().clone());
    let mut total = MergeResult::default();

    for report in reports {
        let batch = match policy {
            MergePolicy::SkipExisting => {
                let stored = store.snapshot();
                let mut seen = HashSet::new();
                normalizer.normalize_where(report, |key| {
                    !stored.contains(key) && seen.insert(key.clone())
                })
            }
            MergePolicy::Overwrite => normalizer.normalize_where(report, |_| true),
        };
        total.skipped_duplicate += batch.filtered;
        total.issues.extend(batch.issues);
        total.absorb(store.merge_with(batch.groups, policy));
    }

    info!(
        inserted = total.inserted,
        skipped_duplicate = total.skipped_duplicate,
        replaced = total.replaced,
        "Stroke group import finished"
    );
    total
}

// ── Analysis ──────────────────────────────────────────────────────────────────

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    pub columns: usize,
    pub groups: usize,
    /// Wall-clock seconds spent aggregating.
    pub aggregate_time_seconds: f64,
}

/// The complete output of [`analyze_dataset`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub total_shots: usize,
    pub date_range: Option<DateRange>,
    /// Per-club statistics in first-seen order, unknown bucket included.
    pub groups: Vec<AggregateGroup>,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Render the text analysis report.
    pub fn report_text(&self) -> String {
        let ctx = ReportContext {
            total_shots: self.total_shots,
            date_range: self.date_range,
        };
        format_report(&self.groups, &ctx)
    }
}

/// Aggregate the report metrics for every club in `dataset`.
pub fn analyze_dataset(dataset: &Dataset) -> AnalysisResult {
    let start = std::time::Instant::now();
    let groups = ShotAggregator::aggregate(dataset, REPORT_METRICS);
    let elapsed = start.elapsed().as_secs_f64();

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        columns: dataset.schema().len(),
        groups: groups.len(),
        aggregate_time_seconds: elapsed,
    };

    AnalysisResult {
        total_shots: dataset.len(),
        date_range: dataset.date_range(),
        groups,
        metadata,
    }
}

// ── Chart series ──────────────────────────────────────────────────────────────

/// Everything a plotting collaborator needs, as one JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesDocument {
    pub generated_at: String,
    pub total_shots: usize,
    pub date_range: Option<DateRange>,
    /// Per-club bars for each report metric.
    pub clubs: Vec<ChartSeries>,
    /// Per-day, per-club means of the trend metrics.
    pub trends: Vec<TrendPoint>,
}

pub fn build_series(dataset: &Dataset, analysis: &AnalysisResult) -> SeriesDocument {
    let daily = ShotAggregator::aggregate_daily(dataset, TREND_METRICS);
    SeriesDocument {
        generated_at: analysis.metadata.generated_at.clone(),
        total_shots: analysis.total_shots,
        date_range: analysis.date_range,
        clubs: chart_series(&analysis.groups, REPORT_METRICS),
        trends: trend_series(&daily),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
