use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Resolved locations under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    /// Provider report JSON files.
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub visualizations_dir: PathBuf,
    /// The combined, deduplicated shot dataset.
    pub combined_csv: PathBuf,
    /// One row per stroke group, deduplicated the same way.
    pub groups_csv: PathBuf,
    /// Text analysis report.
    pub report_file: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: &Path) -> Self {
        let processed_dir = data_dir.join("processed");
        let visualizations_dir = data_dir.join("visualizations");
        Self {
            raw_dir: data_dir.join("raw"),
            combined_csv: processed_dir.join("combined_shot_data.csv"),
            groups_csv: processed_dir.join("combined_shot_groups.csv"),
            report_file: visualizations_dir.join("trackman_analysis_report.txt"),
            processed_dir,
            visualizations_dir,
        }
    }
}

/// Ensure the `raw/`, `processed/` and `visualizations/` directories exist
/// under `data_dir` (including any missing parents).
pub fn ensure_directories(data_dir: &Path) -> anyhow::Result<DataLayout> {
    let layout = DataLayout::new(data_dir);
    for dir in [
        &layout.raw_dir,
        &layout.processed_dir,
        &layout.visualizations_dir,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(layout)
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI level name to a `tracing` filter directive.
/// Unrecognised names pass through unchanged.
fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr so stdout carries only report output. When `log_file`
/// is given, the same events are also appended to that file without ANSI
/// colours. Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
