use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Well-known columns ────────────────────────────────────────────────────────

/// Flattened measurement column names as produced by the report reader.
pub mod columns {
    pub const BALL_SPEED: &str = "Measurement_BallSpeed";
    pub const CLUB_SPEED: &str = "Measurement_ClubSpeed";
    pub const SMASH_FACTOR: &str = "Measurement_SmashFactor";
    pub const CARRY: &str = "Measurement_Carry";
    pub const TOTAL: &str = "Measurement_Total";
    pub const LAUNCH_ANGLE: &str = "Measurement_LaunchAngle";
    pub const SPIN_RATE: &str = "Measurement_SpinRate";
    pub const CARRY_SIDE: &str = "Measurement_CarrySide";
    pub const CLUB_PATH: &str = "Measurement_ClubPath";
    pub const FACE_ANGLE: &str = "Measurement_FaceAngle";
    pub const ATTACK_ANGLE: &str = "Measurement_AttackAngle";

    /// Leading CSV columns that hold a shot's typed identity fields.
    pub const REPORT_ID: &str = "report_id";
    pub const SHOT_ID: &str = "shot_id";
    pub const CLUB: &str = "club";
    pub const TIMESTAMP: &str = "timestamp";

    /// Column names that can never be used for open-ended values.
    pub const RESERVED: [&str; 4] = [REPORT_ID, SHOT_ID, CLUB, TIMESTAMP];

    /// Leading CSV columns of the shot-group dataset.
    pub const GROUP_DATE: &str = "date";
    pub const PLAYER_NAME: &str = "player_name";

    /// Stroke count of a group, filled in by the reader.
    pub const NUM_STROKES: &str = "NumStrokes";
}

// ── ColumnKind ────────────────────────────────────────────────────────────────

/// Inferred value type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => f.write_str("numeric"),
            ColumnKind::Text => f.write_str("text"),
        }
    }
}

// ── CellValue ─────────────────────────────────────────────────────────────────

/// One cell of the combined dataset.
///
/// `Missing` is distinct from every real value, including `Number(0.0)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

/// Text spellings that upstream data uses for "no value".
const MISSING_SPELLINGS: [&str; 4] = ["nan", "none", "null", "n/a"];

impl CellValue {
    /// Interpret a textual cell (CSV field or JSON string).
    ///
    /// Empty and `nan`-like text is missing; text that parses as a finite
    /// number is numeric; everything else is kept verbatim.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || MISSING_SPELLINGS
                .iter()
                .any(|m| trimmed.eq_ignore_ascii_case(m))
        {
            return CellValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    /// Interpret a scalar JSON value. Returns `None` for objects and arrays,
    /// which are not representable as a single cell.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Some(CellValue::Missing),
            Value::Bool(b) => Some(CellValue::Text(b.to_string())),
            Value::Number(n) => Some(match n.as_f64() {
                Some(f) if f.is_finite() => CellValue::Number(f),
                _ => CellValue::Missing,
            }),
            Value::String(s) => Some(CellValue::from_text(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// The kind of a present value; `None` for missing cells.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            CellValue::Number(_) => Some(ColumnKind::Numeric),
            CellValue::Text(_) => Some(ColumnKind::Text),
            CellValue::Missing => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// CSV field representation. Numbers use the shortest exact form so a
    /// save/load cycle preserves every bit.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Missing => String::new(),
        }
    }
}

// ── ClubLabel ─────────────────────────────────────────────────────────────────

/// Equipment label of a shot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClubLabel {
    Known(String),
    /// No usable club was recorded. Never equal to any `Known` label.
    Unknown,
}

/// Upstream spellings that mean "no club".
const UNKNOWN_CLUB_SPELLINGS: [&str; 5] = ["nan", "none", "null", "unknown", "undefined"];

impl ClubLabel {
    /// Normalise a raw club field.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return ClubLabel::Unknown;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || UNKNOWN_CLUB_SPELLINGS
                .iter()
                .any(|u| trimmed.eq_ignore_ascii_case(u))
        {
            ClubLabel::Unknown
        } else {
            ClubLabel::Known(trimmed.to_string())
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ClubLabel::Unknown)
    }

    /// The label text, `None` for the unknown bucket.
    pub fn as_known(&self) -> Option<&str> {
        match self {
            ClubLabel::Known(s) => Some(s),
            ClubLabel::Unknown => None,
        }
    }
}

/// Renders the unknown bucket as `nan`, matching legacy report output.
impl fmt::Display for ClubLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClubLabel::Known(s) => f.write_str(s),
            ClubLabel::Unknown => f.write_str(crate::formatting::MISSING_TOKEN),
        }
    }
}

// ── ShotKey / Shot ────────────────────────────────────────────────────────────

/// Deduplication key: `(report_id, shot_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShotKey {
    pub report_id: String,
    pub shot_id: String,
}

impl fmt::Display for ShotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.report_id, self.shot_id)
    }
}

/// A single normalised shot.
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    /// Report the shot was imported from.
    pub report_id: String,
    /// Identifier unique within the report.
    pub shot_id: String,
    /// Club used, or the unknown bucket.
    pub club: ClubLabel,
    /// Capture time when one could be resolved.
    pub timestamp: Option<DateTime<Utc>>,
    /// Open-ended column values. Columns not present here read as missing.
    pub values: BTreeMap<String, CellValue>,
}

static MISSING_CELL: CellValue = CellValue::Missing;

impl Shot {
    pub fn key(&self) -> ShotKey {
        ShotKey {
            report_id: self.report_id.clone(),
            shot_id: self.shot_id.clone(),
        }
    }

    /// Value of `column`, or the missing marker when the shot predates it.
    pub fn value(&self, column: &str) -> &CellValue {
        self.values.get(column).unwrap_or(&MISSING_CELL)
    }

    /// Numeric value of `column`, if present.
    pub fn number(&self, column: &str) -> Option<f64> {
        self.value(column).as_f64()
    }
}

// ── GroupKey / ShotGroup ──────────────────────────────────────────────────────

/// Deduplication key of a stroke group: `(report_id, date, club, player)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub report_id: String,
    pub date: Option<DateTime<Utc>>,
    pub club: ClubLabel,
    pub player_name: Option<String>,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.report_id, self.label())
    }
}

impl GroupKey {
    /// `date_club_player`, the report-local part of the key.
    pub fn label(&self) -> String {
        format!(
            "{}_{}_{}",
            self.date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            self.club,
            self.player_name.as_deref().unwrap_or_default()
        )
    }
}

/// One stroke group of a report: a block of shots hit with the same club.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotGroup {
    pub report_id: String,
    pub date: Option<DateTime<Utc>>,
    pub club: ClubLabel,
    pub player_name: Option<String>,
    /// Ball, target, player details, stroke count and per-group averages.
    pub values: BTreeMap<String, CellValue>,
}

impl ShotGroup {
    pub fn key(&self) -> GroupKey {
        GroupKey {
            report_id: self.report_id.clone(),
            date: self.date,
            club: self.club.clone(),
            player_name: self.player_name.clone(),
        }
    }

    pub fn value(&self, column: &str) -> &CellValue {
        self.values.get(column).unwrap_or(&MISSING_CELL)
    }

    pub fn num_strokes(&self) -> Option<f64> {
        self.value(columns::NUM_STROKES).as_f64()
    }
}

// ── Raw input ─────────────────────────────────────────────────────────────────

/// A raw shot entry: whatever keys the report happened to contain.
pub type RawShot = serde_json::Map<String, serde_json::Value>;

/// A raw stroke-group entry: the group's own fields without its strokes.
pub type RawGroup = serde_json::Map<String, serde_json::Value>;

/// One upstream report, already fetched and decoded.
#[derive(Debug, Clone, Default)]
pub struct RawReport {
    pub report_id: String,
    /// Capture date of the session, used when a shot carries no time.
    pub captured_at: Option<DateTime<Utc>>,
    pub shots: Vec<RawShot>,
    /// Empty for reports that list shots without stroke groups.
    pub groups: Vec<RawGroup>,
}

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Earliest and latest shot timestamps of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Span covering every timestamp in `iter`, or `None` when it is empty.
    pub fn covering(iter: impl IntoIterator<Item = DateTime<Utc>>) -> Option<Self> {
        iter.into_iter().fold(None, |range, ts| match range {
            None => Some(DateRange { start: ts, end: ts }),
            Some(r) => Some(DateRange {
                start: r.start.min(ts),
                end: r.end.max(ts),
            }),
        })
    }
}
