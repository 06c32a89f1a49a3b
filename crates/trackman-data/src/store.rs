//! Deduplicating record stores with CSV persistence.
//!
//! A store keeps its table behind a lock as an immutable [`Arc<Table>`]. A
//! merge builds the next table off to the side and publishes it in one swap,
//! so snapshot readers see a batch either fully or not at all. Shots and
//! stroke groups share the machinery through the [`Record`] trait.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::SecondsFormat;
use tracing::{debug, info, warn};
use trackman_core::data_processors::TimestampProcessor;
use trackman_core::models::{
    columns, CellValue, ClubLabel, DateRange, GroupKey, Shot, ShotGroup, ShotKey,
};
use trackman_core::schema::Schema;
use trackman_core::{RecordIssue, Result, TrackmanError};

// ── Record ────────────────────────────────────────────────────────────────────

/// A row kind the store can deduplicate and persist.
///
/// Typed identity fields live in the leading CSV columns; everything else is
/// an open-ended value governed by the table's schema.
pub trait Record: Clone + fmt::Debug + PartialEq {
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display;

    const LEADING_COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;
    fn report_id(&self) -> &str;
    /// Report-local id used in issues.
    fn record_id(&self) -> String;
    fn values(&self) -> &BTreeMap<String, CellValue>;
    fn values_mut(&mut self) -> &mut BTreeMap<String, CellValue>;
    /// Leading CSV fields, aligned with [`Record::LEADING_COLUMNS`].
    fn leading_fields(&self) -> Vec<String>;
    /// Rebuild from leading CSV fields. `None` when the row has no usable key.
    fn from_leading_fields(fields: &[&str]) -> Option<Self>;
}

fn timestamp_field(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

impl Record for Shot {
    type Key = ShotKey;

    const LEADING_COLUMNS: &'static [&'static str] = &[
        columns::REPORT_ID,
        columns::SHOT_ID,
        columns::CLUB,
        columns::TIMESTAMP,
    ];

    fn key(&self) -> ShotKey {
        Shot::key(self)
    }

    fn report_id(&self) -> &str {
        &self.report_id
    }

    fn record_id(&self) -> String {
        self.shot_id.clone()
    }

    fn values(&self) -> &BTreeMap<String, CellValue> {
        &self.values
    }

    fn values_mut(&mut self) -> &mut BTreeMap<String, CellValue> {
        &mut self.values
    }

    fn leading_fields(&self) -> Vec<String> {
        vec![
            self.report_id.clone(),
            self.shot_id.clone(),
            self.club.as_known().unwrap_or_default().to_string(),
            timestamp_field(self.timestamp),
        ]
    }

    fn from_leading_fields(fields: &[&str]) -> Option<Self> {
        let shot_id = fields[1].trim();
        if shot_id.is_empty() {
            return None;
        }
        Some(Shot {
            report_id: fields[0].to_string(),
            shot_id: shot_id.to_string(),
            club: ClubLabel::parse(Some(fields[2])),
            timestamp: TimestampProcessor::parse_str(fields[3]),
            values: BTreeMap::new(),
        })
    }
}

impl Record for ShotGroup {
    type Key = GroupKey;

    const LEADING_COLUMNS: &'static [&'static str] = &[
        columns::REPORT_ID,
        columns::GROUP_DATE,
        columns::CLUB,
        columns::PLAYER_NAME,
    ];

    fn key(&self) -> GroupKey {
        ShotGroup::key(self)
    }

    fn report_id(&self) -> &str {
        &self.report_id
    }

    fn record_id(&self) -> String {
        self.key().label()
    }

    fn values(&self) -> &BTreeMap<String, CellValue> {
        &self.values
    }

    fn values_mut(&mut self) -> &mut BTreeMap<String, CellValue> {
        &mut self.values
    }

    fn leading_fields(&self) -> Vec<String> {
        vec![
            self.report_id.clone(),
            timestamp_field(self.date),
            self.club.as_known().unwrap_or_default().to_string(),
            self.player_name.clone().unwrap_or_default(),
        ]
    }

    fn from_leading_fields(fields: &[&str]) -> Option<Self> {
        let report_id = fields[0].trim();
        if report_id.is_empty() {
            return None;
        }
        let player = fields[3].trim();
        Some(ShotGroup {
            report_id: report_id.to_string(),
            date: TimestampProcessor::parse_str(fields[1]),
            club: ClubLabel::parse(Some(fields[2])),
            player_name: (!player.is_empty()).then(|| player.to_string()),
            values: BTreeMap::new(),
        })
    }
}

// ── MergePolicy / MergeResult ─────────────────────────────────────────────────

/// What to do with an incoming record whose key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Keep the stored record and count the incoming one as a duplicate.
    #[default]
    SkipExisting,
    /// Replace the stored record in place (corrections via re-import).
    Overwrite,
}

/// Outcome of merging one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub replaced: usize,
    /// Columns the batch added to the stored schema.
    pub new_columns: Vec<String>,
    /// Cells coerced to missing because their kind disagreed with the schema.
    pub issues: Vec<RecordIssue>,
}

impl MergeResult {
    pub fn absorb(&mut self, other: MergeResult) {
        self.inserted += other.inserted;
        self.skipped_duplicate += other.skipped_duplicate;
        self.replaced += other.replaced;
        self.new_columns.extend(other.new_columns);
        self.issues.extend(other.issues);
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// A deduplicated, schema-unioned collection of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R: Record> {
    schema: Schema,
    rows: Vec<R>,
    index: HashMap<R::Key, usize>,
}

/// The combined shot dataset.
pub type Dataset = Table<Shot>;

/// The combined stroke-group dataset.
pub type GroupTable = Table<ShotGroup>;

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            schema: Schema::default(),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: Record> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Records in insertion order.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    /// Apply one batch. Infallible: conflicting cells are dropped and
    /// reported rather than aborting. A skipped duplicate leaves the table,
    /// schema included, untouched.
    pub(crate) fn apply(&mut self, records: Vec<R>, policy: MergePolicy) -> MergeResult {
        let columns_before = self.schema.len();
        let mut result = MergeResult::default();

        for mut record in records {
            let key = record.key();
            match (self.index.get(&key).copied(), policy) {
                (Some(_), MergePolicy::SkipExisting) => {
                    debug!(key = %key, "skipping duplicate record");
                    result.skipped_duplicate += 1;
                }
                (Some(pos), MergePolicy::Overwrite) => {
                    self.conform(&mut record, &mut result.issues);
                    self.rows[pos] = record;
                    result.replaced += 1;
                }
                (None, _) => {
                    self.conform(&mut record, &mut result.issues);
                    self.index.insert(key, self.rows.len());
                    self.rows.push(record);
                    result.inserted += 1;
                }
            }
        }

        result.new_columns = self
            .schema
            .columns()
            .iter()
            .skip(columns_before)
            .map(|c| c.name.clone())
            .collect();
        result
    }

    /// Union the record's columns into the schema, dropping cells whose kind
    /// conflicts with the stored column kind.
    fn conform(&mut self, record: &mut R, issues: &mut Vec<RecordIssue>) {
        let report_id = record.report_id().to_string();
        let record_id = record.record_id();
        let schema = &mut self.schema;
        record
            .values_mut()
            .retain(|column, value| match schema.observe(column, value) {
                Ok(()) => true,
                Err(conflict) => {
                    warn!(
                        report_id = %report_id,
                        record_id = %record_id,
                        column = %column,
                        "{} value in {} column stored as missing",
                        conflict.found,
                        conflict.expected
                    );
                    issues.push(RecordIssue::SchemaConflict {
                        report_id: report_id.clone(),
                        shot_id: record_id.clone(),
                        column: column.clone(),
                        expected: conflict.expected,
                        found: conflict.found,
                    });
                    false
                }
            });
    }
}

impl Table<Shot> {
    /// Shots in insertion order.
    pub fn shots(&self) -> &[Shot] {
        &self.rows
    }

    /// Earliest and latest shot timestamps.
    pub fn date_range(&self) -> Option<DateRange> {
        DateRange::covering(self.rows.iter().filter_map(|s| s.timestamp))
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// File-backed store of one combined table.
///
/// Lifecycle is explicit: [`Store::open`] loads, [`Store::merge`] changes
/// memory only, [`Store::save`] persists.
#[derive(Debug)]
pub struct Store<R: Record> {
    path: PathBuf,
    current: RwLock<Arc<Table<R>>>,
}

/// Store of `combined_shot_data.csv`.
pub type ShotStore = Store<Shot>;

/// Store of `combined_shot_groups.csv`.
pub type GroupStore = Store<ShotGroup>;

impl<R: Record> Store<R> {
    /// An empty store that will persist to `path`. Nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(Table::new())),
        }
    }

    /// Open the store at `path`, loading the table when the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No combined dataset at {}; starting empty", path.display());
            return Ok(Self::new(path));
        }
        let table = read_table(&path)?;
        info!(
            rows = table.len(),
            columns = table.schema().len(),
            "Loaded combined dataset from {}",
            path.display()
        );
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(table)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consistent read-only view of the table as of the last merge.
    pub fn snapshot(&self) -> Arc<Table<R>> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Merge `records`, skipping keys that are already stored.
    pub fn merge(&self, records: Vec<R>) -> MergeResult {
        self.merge_with(records, MergePolicy::SkipExisting)
    }

    /// Merge `records` under `policy`. Merges are serialised; the new state
    /// is published only after the whole batch has been applied.
    pub fn merge_with(&self, records: Vec<R>, policy: MergePolicy) -> MergeResult {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        let result = next.apply(records, policy);
        *guard = Arc::new(next);

        info!(
            inserted = result.inserted,
            skipped_duplicate = result.skipped_duplicate,
            replaced = result.replaced,
            new_columns = result.new_columns.len(),
            "merged batch"
        );
        result
    }

    /// Persist the current snapshot under the full unioned schema.
    ///
    /// Writes `<path>.tmp` first and renames it over `path`, so a failed save
    /// leaves the previous file untouched.
    pub fn save(&self) -> Result<()> {
        let table = self.snapshot();
        write_table(&self.path, &table)?;
        info!(
            rows = table.len(),
            "Saved combined dataset to {}",
            self.path.display()
        );
        Ok(())
    }
}

// ── CSV representation ────────────────────────────────────────────────────────

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_table<R: Record>(path: &Path, table: &Table<R>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| TrackmanError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let tmp = tmp_path(path);
    let written = write_rows(&tmp, table).and_then(|()| {
        std::fs::rename(&tmp, path).map_err(|source| TrackmanError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    });
    if written.is_err() && tmp.is_file() {
        if let Err(e) = std::fs::remove_file(&tmp) {
            warn!("Could not remove {}: {}", tmp.display(), e);
        }
    }
    written
}

fn write_rows<R: Record>(tmp: &Path, table: &Table<R>) -> Result<()> {
    let csv_err = |source| TrackmanError::Csv {
        path: tmp.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(tmp).map_err(csv_err)?;

    let mut header: Vec<&str> = R::LEADING_COLUMNS.to_vec();
    header.extend(table.schema().names());
    writer.write_record(&header).map_err(csv_err)?;

    for record in table.rows() {
        let mut row = record.leading_fields();
        row.extend(table.schema().names().map(|c| {
            record
                .values()
                .get(c)
                .map(CellValue::to_field)
                .unwrap_or_default()
        }));
        writer.write_record(&row).map_err(csv_err)?;
    }

    writer.flush().map_err(|source| TrackmanError::FileWrite {
        path: tmp.to_path_buf(),
        source,
    })
}

fn read_table<R: Record>(path: &Path) -> Result<Table<R>> {
    let csv_err = |source| TrackmanError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let leading = R::LEADING_COLUMNS.len();
    for (i, expected) in R::LEADING_COLUMNS.iter().enumerate() {
        if header.get(i).map(String::as_str) != Some(*expected) {
            return Err(TrackmanError::InvalidDataset {
                path: path.to_path_buf(),
                reason: format!("expected column {} at position {}", expected, i),
            });
        }
    }

    let mut table = Table::new();
    let value_columns = &header[leading..];
    for name in value_columns {
        table.schema.ensure_column(name);
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(csv_err)?;
        let field = |i: usize| row.get(i).unwrap_or("");

        let fields: Vec<&str> = (0..leading).map(field).collect();
        let Some(mut record) = R::from_leading_fields(&fields) else {
            warn!(line = line + 2, "skipping dataset row without a key");
            continue;
        };
        // Short rows simply lack the newer trailing columns.
        for (offset, name) in value_columns.iter().enumerate() {
            let cell = CellValue::from_text(field(leading + offset));
            if !cell.is_missing() {
                record.values_mut().insert(name.clone(), cell);
            }
        }
        records.push(record);
    }

    let result = table.apply(records, MergePolicy::SkipExisting);
    if result.skipped_duplicate > 0 {
        warn!(
            duplicates = result.skipped_duplicate,
            "dropped duplicate rows while loading {}",
            path.display()
        );
    }
    if !result.issues.is_empty() {
        warn!(
            conflicts = result.issues.len(),
            "coerced conflicting cells to missing while loading {}",
            path.display()
        );
    }

    Ok(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shot(report: &str, id: &str, club: &str, values: &[(&str, f64)]) -> Shot {
        Shot {
            report_id: report.to_string(),
            shot_id: id.to_string(),
            club: ClubLabel::parse(Some(club)),
            timestamp: None,
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), CellValue::Number(*v)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    // ── merge ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_merge_inserts_new_shots() {
        let store = ShotStore::new("unused.csv");
        let result = store.merge(vec![
            shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)]),
            shot("r1", "b", "7Iron", &[(columns::CARRY, 152.0)]),
        ]);
        assert_eq!(result.inserted, 2);
        assert_eq!(result.skipped_duplicate, 0);
        assert_eq!(result.new_columns, vec![columns::CARRY.to_string()]);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = ShotStore::new("unused.csv");
        let batch = vec![
            shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)]),
            shot("r1", "b", "Driver", &[(columns::CARRY, 230.0)]),
        ];
        store.merge(batch.clone());
        let once = store.snapshot();

        let second = store.merge(batch);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped_duplicate, 2);
        assert_eq!(*store.snapshot(), *once);
    }

    #[test]
    fn test_same_shot_id_in_other_report_is_distinct() {
        let store = ShotStore::new("unused.csv");
        store.merge(vec![shot("r1", "a", "7Iron", &[])]);
        let result = store.merge(vec![shot("r2", "a", "7Iron", &[])]);
        assert_eq!(result.inserted, 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_duplicates_within_batch_collapse() {
        let store = ShotStore::new("unused.csv");
        let result = store.merge(vec![
            shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)]),
            shot("r1", "a", "7Iron", &[(columns::CARRY, 999.0)]),
        ]);
        assert_eq!(result.inserted, 1);
        assert_eq!(result.skipped_duplicate, 1);
        let snap = store.snapshot();
        assert_eq!(snap.shots()[0].number(columns::CARRY), Some(150.0));
    }

    #[test]
    fn test_overwrite_policy_replaces_in_place() {
        let store = ShotStore::new("unused.csv");
        store.merge(vec![
            shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)]),
            shot("r1", "b", "7Iron", &[(columns::CARRY, 151.0)]),
        ]);
        let result = store.merge_with(
            vec![shot("r1", "a", "8Iron", &[(columns::CARRY, 140.0)])],
            MergePolicy::Overwrite,
        );
        assert_eq!(result.replaced, 1);
        assert_eq!(result.inserted, 0);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.shots()[0].club, ClubLabel::Known("8Iron".into()));
        assert_eq!(snap.shots()[0].number(columns::CARRY), Some(140.0));
    }

    #[test]
    fn test_schema_union_keeps_old_rows_intact() {
        let store = ShotStore::new("unused.csv");
        store.merge(vec![shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)])]);
        let before = store.snapshot().shots()[0].clone();

        let result = store.merge(vec![shot(
            "r2",
            "b",
            "7Iron",
            &[(columns::CARRY, 149.0), (columns::SPIN_RATE, 7000.0)],
        )]);
        assert_eq!(result.new_columns, vec![columns::SPIN_RATE.to_string()]);

        let snap = store.snapshot();
        let old = &snap.shots()[0];
        assert!(old.value(columns::SPIN_RATE).is_missing());
        assert_eq!(*old, before);
    }

    #[test]
    fn test_merge_reports_kind_conflict() {
        let store = ShotStore::new("unused.csv");
        store.merge(vec![shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)])]);

        let mut bad = shot("r2", "b", "7Iron", &[]);
        bad.values
            .insert(columns::CARRY.to_string(), CellValue::Text("long".into()));
        let result = store.merge(vec![bad]);

        assert_eq!(result.inserted, 1);
        assert_eq!(result.issues.len(), 1);
        let snap = store.snapshot();
        assert!(snap.shots()[1].value(columns::CARRY).is_missing());
    }

    #[test]
    fn test_skipped_duplicate_leaves_dataset_unchanged() {
        let store = ShotStore::new("unused.csv");
        store.merge(vec![shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)])]);
        let before = store.snapshot();

        let mut again = shot("r1", "a", "7Iron", &[("NewCol", 1.0)]);
        again
            .values
            .insert(columns::CARRY.to_string(), CellValue::Text("far".into()));
        let result = store.merge(vec![again]);

        assert_eq!(result.skipped_duplicate, 1);
        assert!(result.new_columns.is_empty());
        assert!(result.issues.is_empty());
        assert_eq!(*store.snapshot(), *before);
        assert!(!store.snapshot().schema().contains("NewCol"));
    }

    #[test]
    fn test_skipped_duplicate_does_not_fix_column_kind() {
        let store = ShotStore::new("unused.csv");
        store.merge(vec![shot("r1", "a", "7Iron", &[])]);

        let mut dup = shot("r1", "a", "7Iron", &[]);
        dup.values.insert("Target".into(), CellValue::Number(150.0));
        store.merge(vec![dup]);

        let mut fresh = shot("r2", "b", "7Iron", &[]);
        fresh.values.insert("Target".into(), CellValue::Text("Green".into()));
        let result = store.merge(vec![fresh]);

        assert!(result.issues.is_empty());
        assert_eq!(
            store.snapshot().shots()[1].value("Target"),
            &CellValue::Text("Green".into())
        );
    }

    #[test]
    fn test_snapshot_not_affected_by_later_merge() {
        let store = ShotStore::new("unused.csv");
        store.merge(vec![shot("r1", "a", "7Iron", &[])]);
        let snap = store.snapshot();

        store.merge(vec![shot("r1", "b", "7Iron", &[]), shot("r1", "c", "7Iron", &[])]);
        assert_eq!(snap.len(), 1);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[test]
    fn test_concurrent_readers_see_whole_batches() {
        let store = Arc::new(ShotStore::new("unused.csv"));
        let batch_size = 25;

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for b in 0..20 {
                    let batch = (0..batch_size)
                        .map(|i| shot("r1", &format!("{b}-{i}"), "7Iron", &[]))
                        .collect();
                    store.merge(batch);
                }
            })
        };

        for _ in 0..200 {
            assert_eq!(store.snapshot().len() % batch_size, 0);
        }
        writer.join().unwrap();
        assert_eq!(store.snapshot().len(), 20 * batch_size);
    }

    // ── save / open ───────────────────────────────────────────────────────────

    #[test]
    fn test_save_and_open_preserves_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed").join("combined_shot_data.csv");

        let store = ShotStore::new(&path);
        let mut first = shot("r1", "a", "7Iron", &[(columns::CARRY, 150.25)]);
        first.timestamp = TimestampProcessor::parse_str("2024-03-02T10:00:00Z");
        first
            .values
            .insert("PlayerName".into(), CellValue::Text("Sam, Jr.".into()));
        store.merge(vec![first, shot("r1", "b", "nan", &[(columns::CARRY, 0.0)])]);
        store.save().unwrap();
        assert!(!tmp_path(&path).exists());

        let reopened = ShotStore::open(&path).unwrap();
        let snap = reopened.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.shots(), store.snapshot().shots());
        assert!(snap.shots()[1].club.is_unknown());
        assert_eq!(snap.shots()[1].number(columns::CARRY), Some(0.0));
    }

    #[test]
    fn test_save_writes_unioned_schema_for_all_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("combined.csv");

        let store = ShotStore::new(&path);
        store.merge(vec![shot("r1", "a", "7Iron", &[(columns::CARRY, 150.0)])]);
        store.merge(vec![shot("r2", "b", "7Iron", &[(columns::SPIN_RATE, 7000.0)])]);
        store.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "report_id,shot_id,club,timestamp,Measurement_Carry,Measurement_SpinRate"
        );
        assert_eq!(lines[1], "r1,a,7Iron,,150,");
        assert_eq!(lines[2], "r2,b,7Iron,,,7000");
    }

    #[test]
    fn test_open_tolerates_short_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("combined.csv");
        std::fs::write(
            &path,
            "report_id,shot_id,club,timestamp,Measurement_Carry,Measurement_SpinRate\n\
             r1,a,7Iron,,150\n\
             r1,b,7Iron,,151,6900\n",
        )
        .unwrap();

        let snap = ShotStore::open(&path).unwrap().snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.shots()[0].value(columns::SPIN_RATE).is_missing());
        assert_eq!(snap.shots()[1].number(columns::SPIN_RATE), Some(6900.0));
        assert!(snap.schema().contains(columns::SPIN_RATE));
    }

    #[test]
    fn test_open_drops_duplicate_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("combined.csv");
        std::fs::write(
            &path,
            "report_id,shot_id,club,timestamp\nr1,a,7Iron,\nr1,a,7Iron,\n",
        )
        .unwrap();
        assert_eq!(ShotStore::open(&path).unwrap().snapshot().len(), 1);
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = ShotStore::open(dir.path().join("absent.csv")).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_open_rejects_foreign_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let err = ShotStore::open(&path).unwrap_err();
        assert!(matches!(err, TrackmanError::InvalidDataset { .. }));
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("combined.csv");
        let store = ShotStore::new(&path);
        store.merge(vec![shot("r1", "a", "7Iron", &[])]);
        store.save().unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        // A directory squatting on the temp path makes the write fail.
        std::fs::create_dir(tmp_path(&path)).unwrap();
        store.merge(vec![shot("r1", "b", "7Iron", &[])]);
        let err = store.save().unwrap_err();
        assert!(err.to_string().contains("combined.csv.tmp"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        let path = dir.path().join("combined.csv");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "").unwrap();

        let store = ShotStore::new(&path);
        store.merge(vec![shot("r1", "a", "7Iron", &[])]);
        let err = store.save().unwrap_err();

        assert!(matches!(err, TrackmanError::FileWrite { .. }));
        assert!(!tmp_path(&path).exists());
        assert!(path.join("keep").exists());
    }

    // ── GroupStore ────────────────────────────────────────────────────────────

    fn group(report: &str, club: &str, player: Option<&str>, strokes: f64) -> ShotGroup {
        ShotGroup {
            report_id: report.to_string(),
            date: TimestampProcessor::parse_str("2024-03-02T10:00:00Z"),
            club: ClubLabel::parse(Some(club)),
            player_name: player.map(str::to_string),
            values: BTreeMap::from([
                (columns::NUM_STROKES.to_string(), CellValue::Number(strokes)),
                ("Ball".to_string(), CellValue::Text("Premium".into())),
            ]),
        }
    }

    #[test]
    fn test_group_store_dedups_on_composite_key() {
        let store = GroupStore::new("unused.csv");
        let result = store.merge(vec![
            group("r1", "7Iron", Some("Sam"), 10.0),
            group("r1", "7Iron", Some("Alex"), 8.0),
            group("r1", "Driver", Some("Sam"), 5.0),
            group("r2", "7Iron", Some("Sam"), 10.0),
        ]);
        assert_eq!(result.inserted, 4);

        let again = store.merge(vec![group("r1", "7Iron", Some("Sam"), 3.0)]);
        assert_eq!(again.skipped_duplicate, 1);
        let snap = store.snapshot();
        assert_eq!(snap.len(), 4);
        assert_eq!(snap.rows()[0].num_strokes(), Some(10.0));
    }

    #[test]
    fn test_group_store_save_and_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed").join("combined_shot_groups.csv");

        let store = GroupStore::new(&path);
        store.merge(vec![
            group("r1", "7Iron", Some("Sam"), 10.0),
            group("r1", "nan", None, 0.0),
        ]);
        store.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "report_id,date,club,player_name,Ball,NumStrokes");
        assert_eq!(lines[1], "r1,2024-03-02T10:00:00Z,7Iron,Sam,Premium,10");
        assert_eq!(lines[2], "r1,2024-03-02T10:00:00Z,,,Premium,0");

        let reopened = GroupStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot().rows(), store.snapshot().rows());
    }

    #[test]
    fn test_group_store_rejects_shot_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("combined_shot_data.csv");
        let shots = ShotStore::new(&path);
        shots.merge(vec![shot("r1", "a", "7Iron", &[])]);
        shots.save().unwrap();

        let err = GroupStore::open(&path).unwrap_err();
        assert!(matches!(err, TrackmanError::InvalidDataset { .. }));
    }
}
