use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Import golf shot telemetry reports and analyze per-club statistics
#[derive(Parser, Debug, Clone)]
#[command(
    name = "trackman",
    about = "Import golf shot telemetry reports and analyze per-club statistics",
    version
)]
pub struct Settings {
    /// Action to run
    #[arg(default_value = "analyze", value_parser = ["import", "analyze", "summary"])]
    pub action: String,

    /// Report JSON files to import (defaults to every report under <data-dir>/raw)
    #[arg(long = "input", num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Data directory holding raw/, processed/ and visualizations/
    #[arg(long, env = "TRACKMAN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Restrict the club summary to a single club
    #[arg(long)]
    pub club: Option<String>,

    /// Replace previously imported shots that share a report/shot id
    #[arg(long)]
    pub overwrite: bool,

    /// Write chart series (per-club and daily trends) as JSON to this path
    #[arg(long)]
    pub series_out: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.trackman/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".trackman").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

/// Default data directory: `~/.trackman`.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trackman")
}

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve defaults, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation; accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_defaults(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. An env-provided data dir also wins over last-used.
        if settings.data_dir.is_none() {
            settings.data_dir = last.data_dir;
        }
        // The club filter is only remembered for the summary action.
        if settings.action == "summary"
            && !is_arg_explicitly_set(&matches, "club")
            && settings.club.is_none()
        {
            settings.club = last.club.clone();
        }

        settings = Self::resolve_defaults(settings);

        let mut params = LastUsedParams::from(&settings);
        if settings.action != "summary" {
            params.club = last.club;
        }
        let _ = params.save_to(config_path);

        settings
    }

    /// The resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    fn resolve_defaults(mut settings: Settings) -> Settings {
        if settings.data_dir.is_none() {
            settings.data_dir = Some(default_data_dir());
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            data_dir: s.data_dir.clone(),
            club: s.club.clone(),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
