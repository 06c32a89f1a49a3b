//! Report file discovery and loading.
//!
//! Provider reports nest shots as `StrokeGroups[].Strokes[]`, each stroke
//! carrying `Measurement` and `NormalizedMeasurement` objects. The reader
//! flattens every stroke into one [`RawShot`] with group metadata copied in,
//! so the normaliser only ever deals with flat key/value maps. Each group also
//! yields one [`RawGroup`] with its stroke count and per-group statistics.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use trackman_core::data_processors::{FieldExtractor, TimestampProcessor};
use trackman_core::models::{columns, RawGroup, RawReport, RawShot};
use trackman_core::{Result, TrackmanError};

/// Keys that may carry the report id at the document root.
const REPORT_ID_KEYS: &[&str] = &["ReportId", "reportId", "Id"];

/// Keys that may carry the session capture time at the document root.
const REPORT_TIME_KEYS: &[&str] = &["Date", "Time", "CreatedDate"];

/// Group-level fields copied onto each stroke: `(group key, shot key)`.
const GROUP_FIELDS: &[(&str, &str)] = &[
    ("Date", "GroupDate"),
    ("Club", "GroupClub"),
    ("Ball", "GroupBall"),
    ("Target", "GroupTarget"),
];

/// Fields of the group's `Player` object: `(player key, shot key)`.
const PLAYER_FIELDS: &[(&str, &str)] = &[
    ("Name", "PlayerName"),
    ("Hcp", "PlayerHcp"),
    ("Gender", "PlayerGender"),
];

/// Stroke-level fields: `(stroke key, shot key)`.
const STROKE_FIELDS: &[(&str, &str)] = &[
    ("Id", "StrokeId"),
    ("Time", "StrokeTime"),
    ("Club", "StrokeClub"),
    ("Ball", "StrokeBall"),
];

const IMPACT_FIELDS: &[&str] = &["ImpactOffset", "ImpactHeight", "DynamicLie"];

/// Fields of a group record, named as in the provider document.
const GROUP_RECORD_FIELDS: &[(&str, &str)] = &[
    ("Date", "Date"),
    ("Club", "Club"),
    ("Ball", "Ball"),
    ("Target", "Target"),
];

const GROUP_PLAYER_FIELDS: &[(&str, &str)] = &[
    ("Name", "PlayerName"),
    ("Hcp", "PlayerHcp"),
    ("Gender", "PlayerGender"),
    ("Id", "PlayerId"),
];

/// Measurements summarised per group as `Avg*`, `Min*` and `Max*`.
const GROUP_STAT_METRICS: &[&str] = &[
    "BallSpeed",
    "ClubSpeed",
    "LaunchAngle",
    "SpinRate",
    "AttackAngle",
    "ClubPath",
    "FaceAngle",
];

static REPORT_FILE_NAME: OnceLock<Option<Regex>> = OnceLock::new();

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.json` report files recursively under `dir`, sorted by path.
pub fn find_report_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Report directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read and flatten one report file.
pub fn load_report(path: &Path) -> Result<RawReport> {
    let content = std::fs::read_to_string(path).map_err(|source| TrackmanError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Value = serde_json::from_str(&content)?;

    let fallback_id = report_id_from_file_name(path);
    let report = parse_report(&doc, fallback_id.as_deref())
        .ok_or_else(|| TrackmanError::MissingReportId(path.to_path_buf()))?;

    debug!(
        report_id = %report.report_id,
        shots = report.shots.len(),
        "Loaded report {}",
        path.display()
    );
    Ok(report)
}

/// Load every path, collecting failures instead of stopping at the first.
pub fn load_reports(paths: &[PathBuf]) -> (Vec<RawReport>, Vec<(PathBuf, TrackmanError)>) {
    let mut reports = Vec::new();
    let mut failures = Vec::new();

    for path in paths {
        match load_report(path) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!("Skipping report {}: {}", path.display(), e);
                failures.push((path.clone(), e));
            }
        }
    }

    (reports, failures)
}

/// Build a [`RawReport`] from a decoded document.
///
/// Returns `None` when neither the document nor `fallback_id` supplies a
/// report id.
pub fn parse_report(doc: &Value, fallback_id: Option<&str>) -> Option<RawReport> {
    let root = doc.as_object();

    let report_id = root
        .and_then(|m| FieldExtractor::first_text(m, REPORT_ID_KEYS))
        .or_else(|| fallback_id.map(str::to_string))?;

    let stroke_groups = root
        .and_then(|m| m.get("StrokeGroups"))
        .and_then(Value::as_array);
    let (shots, groups) = match stroke_groups {
        Some(groups) => (flatten_stroke_groups(groups), group_records(groups)),
        None => (flat_shots(doc), Vec::new()),
    };

    let captured_at = root
        .and_then(|m| FieldExtractor::first_timestamp(m, REPORT_TIME_KEYS))
        .or_else(|| {
            shots
                .iter()
                .find_map(|s| s.get("GroupDate").and_then(TimestampProcessor::parse))
        });

    Some(RawReport {
        report_id,
        captured_at,
        shots,
        groups,
    })
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// `report_data_<id>.json` → `<id>`.
fn report_id_from_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let re = REPORT_FILE_NAME
        .get_or_init(|| Regex::new(r"^report_data_(.+)\.json$").ok())
        .as_ref()?;
    re.captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn flatten_stroke_groups(groups: &[Value]) -> Vec<RawShot> {
    let mut shots = Vec::new();

    for group in groups.iter().filter_map(Value::as_object) {
        let Some(strokes) = group.get("Strokes").and_then(Value::as_array) else {
            continue;
        };

        let mut shared = Map::new();
        copy_fields(&mut shared, group, GROUP_FIELDS);
        if let Some(player) = group.get("Player").and_then(Value::as_object) {
            copy_fields(&mut shared, player, PLAYER_FIELDS);
        }

        for stroke in strokes.iter().filter_map(Value::as_object) {
            let mut shot = shared.clone();
            copy_fields(&mut shot, stroke, STROKE_FIELDS);

            if let Some(impact) = stroke.get("ImpactLocation").and_then(Value::as_object) {
                for &key in IMPACT_FIELDS {
                    if let Some(value) = impact.get(key) {
                        shot.insert(key.to_string(), value.clone());
                    }
                }
            }
            copy_scalars(&mut shot, stroke.get("Measurement"), "Measurement_");
            copy_scalars(&mut shot, stroke.get("NormalizedMeasurement"), "Normalized_");

            shots.push(shot);
        }
    }

    shots
}

/// One record per stroke group, including groups without strokes.
fn group_records(groups: &[Value]) -> Vec<RawGroup> {
    groups
        .iter()
        .filter_map(Value::as_object)
        .map(|group| {
            let mut record = Map::new();
            copy_fields(&mut record, group, GROUP_RECORD_FIELDS);
            if let Some(player) = group.get("Player").and_then(Value::as_object) {
                copy_fields(&mut record, player, GROUP_PLAYER_FIELDS);
            }

            let strokes: Vec<&Map<String, Value>> = group
                .get("Strokes")
                .and_then(Value::as_array)
                .map(|s| s.iter().filter_map(Value::as_object).collect())
                .unwrap_or_default();
            record.insert(columns::NUM_STROKES.to_string(), Value::from(strokes.len()));

            for &metric in GROUP_STAT_METRICS {
                let values: Vec<f64> = strokes
                    .iter()
                    .filter_map(|s| s.get("Measurement")?.get(metric)?.as_f64())
                    .collect();
                if values.is_empty() {
                    continue;
                }
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                record.insert(format!("Avg{metric}"), Value::from(mean));
                record.insert(format!("Min{metric}"), Value::from(min));
                record.insert(format!("Max{metric}"), Value::from(max));
            }
            record
        })
        .collect()
}

/// Reports without stroke groups may list shots directly under `shots`,
/// `Shots` or `data.shots`.
fn flat_shots(doc: &Value) -> Vec<RawShot> {
    let list = doc
        .get("shots")
        .or_else(|| doc.get("Shots"))
        .or_else(|| doc.get("data").and_then(|d| d.get("shots")))
        .and_then(Value::as_array);

    list.map(|items| {
        items
            .iter()
            .filter_map(Value::as_object)
            .cloned()
            .collect()
    })
    .unwrap_or_default()
}

fn copy_fields(dest: &mut RawShot, src: &Map<String, Value>, fields: &[(&str, &str)]) {
    for &(from, to) in fields {
        if let Some(value) = src.get(from) {
            dest.insert(to.to_string(), value.clone());
        }
    }
}

/// Copy scalar entries of a measurement object under `prefix`. Nested
/// objects and arrays are skipped.
fn copy_scalars(dest: &mut RawShot, src: Option<&Value>, prefix: &str) {
    let Some(src) = src.and_then(Value::as_object) else {
        return;
    };
    for (key, value) in src {
        if !value.is_object() && !value.is_array() {
            dest.insert(format!("{prefix}{key}"), value.clone());
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
