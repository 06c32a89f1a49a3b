//! Raw entry → [`Shot`] / [`ShotGroup`] conversion against the evolving
//! schema.
//!
//! Every raw entry is validated once here; downstream code only sees the
//! tagged [`CellValue`] model.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use trackman_core::data_processors::FieldExtractor;
use trackman_core::models::{
    columns, CellValue, ClubLabel, GroupKey, RawGroup, RawReport, RawShot, Shot, ShotGroup,
    ShotKey,
};
use trackman_core::schema::Schema;
use trackman_core::RecordIssue;

/// Keys that may carry the shot id, in priority order.
pub const SHOT_ID_KEYS: &[&str] = &["StrokeId", columns::SHOT_ID, "Id"];

/// Keys that may carry the club label, in priority order.
pub const CLUB_KEYS: &[&str] = &["StrokeClub", "GroupClub", "Club"];

/// Keys that may carry the shot time, in priority order.
pub const TIME_KEYS: &[&str] = &["StrokeTime", "GroupDate", "Date"];

/// Keys folded into the shot's typed fields instead of its open-ended values.
const CONSUMED_KEYS: &[&str] = &["StrokeId", "StrokeClub", "StrokeTime"];

/// Group keys folded into the group's typed fields.
const GROUP_CONSUMED_KEYS: &[&str] = &["Date", "Club", "PlayerName"];

/// Output of normalising one report.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub shots: Vec<Shot>,
    /// Per-record problems; the corresponding entries or cells were dropped.
    pub issues: Vec<RecordIssue>,
    /// Columns this batch added to the schema.
    pub new_columns: Vec<String>,
    /// Entries rejected by the key filter without touching the schema.
    pub filtered: usize,
}

/// Converts raw shot entries into schema-conforming shots.
///
/// The normaliser owns a working copy of the schema so that columns and
/// kinds learnt from one report apply to the next.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    schema: Schema,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing schema, typically the store's.
    pub fn with_schema(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Normalise every entry of `report`. Malformed entries are reported and
    /// skipped; the rest of the batch still processes.
    pub fn normalize(&mut self, report: &RawReport) -> NormalizedBatch {
        self.normalize_where(report, |_| true)
    }

    /// Normalise the entries whose key passes `keep`. Rejected entries are
    /// counted in [`NormalizedBatch::filtered`] and teach the schema nothing.
    pub fn normalize_where(
        &mut self,
        report: &RawReport,
        mut keep: impl FnMut(&ShotKey) -> bool,
    ) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let columns_before = self.schema.len();

        for (index, raw) in report.shots.iter().enumerate() {
            let Some(shot_id) = FieldExtractor::first_text(raw, SHOT_ID_KEYS) else {
                warn!(
                    report_id = %report.report_id,
                    index,
                    "skipping raw shot without an id"
                );
                batch.issues.push(RecordIssue::MalformedRecord {
                    report_id: report.report_id.clone(),
                    index,
                    reason: format!("no shot id under any of {:?}", SHOT_ID_KEYS),
                });
                continue;
            };

            let key = ShotKey {
                report_id: report.report_id.clone(),
                shot_id,
            };
            if !keep(&key) {
                batch.filtered += 1;
                continue;
            }
            let shot = self.normalize_entry(report, raw, key.shot_id, &mut batch.issues);
            batch.shots.push(shot);
        }

        batch.new_columns = added_columns(&self.schema, columns_before);

        debug!(
            report_id = %report.report_id,
            shots = batch.shots.len(),
            filtered = batch.filtered,
            issues = batch.issues.len(),
            new_columns = batch.new_columns.len(),
            "normalised report"
        );

        batch
    }

    fn normalize_entry(
        &mut self,
        report: &RawReport,
        raw: &RawShot,
        shot_id: String,
        issues: &mut Vec<RecordIssue>,
    ) -> Shot {
        let club_text = FieldExtractor::first_text(raw, CLUB_KEYS);
        let club = ClubLabel::parse(club_text.as_deref());
        let timestamp = FieldExtractor::first_timestamp(raw, TIME_KEYS).or(report.captured_at);

        let values = collect_values(
            &mut self.schema,
            raw,
            |key| CONSUMED_KEYS.contains(&key) || columns::RESERVED.contains(&key),
            (report.report_id.as_str(), shot_id.as_str()),
            issues,
        );

        Shot {
            report_id: report.report_id.clone(),
            shot_id,
            club,
            timestamp,
            values,
        }
    }
}

// ── GroupNormalizer ───────────────────────────────────────────────────────────

/// Output of normalising the stroke groups of one report.
#[derive(Debug, Clone, Default)]
pub struct GroupBatch {
    pub groups: Vec<ShotGroup>,
    pub issues: Vec<RecordIssue>,
    /// Groups rejected by the key filter without touching the schema.
    pub filtered: usize,
}

/// Converts raw stroke-group records into [`ShotGroup`]s against the group
/// table's schema.
#[derive(Debug, Clone, Default)]
pub struct GroupNormalizer {
    schema: Schema,
}

impl GroupNormalizer {
    pub fn with_schema(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Normalise the groups of `report` whose key passes `keep`.
    pub fn normalize_where(
        &mut self,
        report: &RawReport,
        mut keep: impl FnMut(&GroupKey) -> bool,
    ) -> GroupBatch {
        let mut batch = GroupBatch::default();

        for raw in &report.groups {
            let key = group_key(report, raw);
            if !keep(&key) {
                batch.filtered += 1;
                continue;
            }
            let label = key.label();
            let values = collect_values(
                &mut self.schema,
                raw,
                |k| GROUP_CONSUMED_KEYS.contains(&k),
                (report.report_id.as_str(), label.as_str()),
                &mut batch.issues,
            );
            batch.groups.push(ShotGroup {
                report_id: key.report_id,
                date: key.date,
                club: key.club,
                player_name: key.player_name,
                values,
            });
        }

        debug!(
            report_id = %report.report_id,
            groups = batch.groups.len(),
            filtered = batch.filtered,
            "normalised stroke groups"
        );
        batch
    }
}

fn group_key(report: &RawReport, raw: &RawGroup) -> GroupKey {
    GroupKey {
        report_id: report.report_id.clone(),
        date: FieldExtractor::first_timestamp(raw, &["Date"]),
        club: ClubLabel::parse(FieldExtractor::first_text(raw, &["Club"]).as_deref()),
        player_name: FieldExtractor::first_text(raw, &["PlayerName"]),
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn added_columns(schema: &Schema, before: usize) -> Vec<String> {
    schema
        .columns()
        .iter()
        .skip(before)
        .map(|c| c.name.clone())
        .collect()
}

/// Convert the scalar entries of `raw` into cells, registering each with
/// `schema`. Cells whose kind conflicts are dropped and reported.
fn collect_values(
    schema: &mut Schema,
    raw: &Map<String, Value>,
    consumed: impl Fn(&str) -> bool,
    (report_id, record_id): (&str, &str),
    issues: &mut Vec<RecordIssue>,
) -> BTreeMap<String, CellValue> {
    let mut values = BTreeMap::new();
    for (key, value) in raw {
        if consumed(key.as_str()) {
            continue;
        }
        let Some(cell) = CellValue::from_json(value) else {
            debug!(column = %key, record_id, "skipping nested value");
            continue;
        };
        match schema.observe(key, &cell) {
            Ok(()) => {
                if !cell.is_missing() {
                    values.insert(key.clone(), cell);
                }
            }
            Err(conflict) => {
                warn!(
                    report_id,
                    record_id,
                    column = %key,
                    "{} value in {} column stored as missing",
                    conflict.found,
                    conflict.expected
                );
                issues.push(RecordIssue::SchemaConflict {
                    report_id: report_id.to_string(),
                    shot_id: record_id.to_string(),
                    column: key.clone(),
                    expected: conflict.expected,
                    found: conflict.found,
                });
            }
        }
    }
    values
}

// ── Tests ─────────────────────────────────────────────────────────────────────
