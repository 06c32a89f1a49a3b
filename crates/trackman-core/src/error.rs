use std::path::PathBuf;
use thiserror::Error;

use crate::models::ColumnKind;

/// All fatal errors produced by the Trackman pipeline.
#[derive(Error, Debug)]
pub enum TrackmanError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be written, flushed or moved into place.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The combined dataset file is not valid CSV.
    #[error("Failed to process CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A CSV file was readable but is not a combined shot dataset.
    #[error("Invalid dataset {path}: {reason}")]
    InvalidDataset { path: PathBuf, reason: String },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A report document carried no identifier and none could be derived
    /// from its file name.
    #[error("No report id found in {0}")]
    MissingReportId(PathBuf),

    /// No report files were found under the given directory.
    #[error("No report files found in {0}")]
    NoDataFiles(PathBuf),

    /// A club filter matched no shots.
    #[error("No data found for club: {0}")]
    UnknownClub(String),
}

/// Per-record problems that never abort a batch.
///
/// These are accumulated into the batch result returned to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordIssue {
    /// A raw shot entry could not be resolved to a shot id.
    #[error("Malformed record {index} in report {report_id}: {reason}")]
    MalformedRecord {
        report_id: String,
        index: usize,
        reason: String,
    },

    /// A cell's kind disagreed with the column's recorded kind; the cell was
    /// stored as missing.
    #[error(
        "Schema conflict in report {report_id}, shot {shot_id}: column {column} is {expected}, got {found}"
    )]
    SchemaConflict {
        report_id: String,
        shot_id: String,
        column: String,
        expected: ColumnKind,
        found: ColumnKind,
    },
}

/// Convenience alias used throughout the trackman crates.
pub type Result<T> = std::result::Result<T, TrackmanError>;
