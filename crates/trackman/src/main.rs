mod bootstrap;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bootstrap::DataLayout;
use trackman_core::settings::Settings;
use trackman_core::TrackmanError;
use trackman_data::aggregator::ShotAggregator;
use trackman_data::analysis::{analyze_dataset, build_series, import_groups, import_reports};
use trackman_data::reader::{find_report_files, load_reports};
use trackman_data::report::{format_club_summary, SUMMARY_METRICS};
use trackman_data::store::{Dataset, GroupStore, MergePolicy, ShotStore};

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    let layout = bootstrap::ensure_directories(&settings.data_dir())?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Trackman v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Action: {}, data dir: {}",
        settings.action,
        settings.data_dir().display()
    );

    match settings.action.as_str() {
        "import" => run_import(&settings, &layout),
        "analyze" => run_analyze(&settings, &layout),
        "summary" => run_summary(&settings, &layout),
        unknown => bail!("Unknown action: {}", unknown),
    }
}

// ── import ─────────────────────────────────────────────────────────────────────

fn run_import(settings: &Settings, layout: &DataLayout) -> Result<()> {
    let files = if settings.inputs.is_empty() {
        find_report_files(&layout.raw_dir)
    } else {
        settings.inputs.clone()
    };
    if files.is_empty() {
        return Err(TrackmanError::NoDataFiles(layout.raw_dir.clone()).into());
    }

    let (reports, failures) = load_reports(&files);
    if reports.is_empty() {
        bail!("None of the {} report files could be loaded", failures.len());
    }

    let store = ShotStore::open(&layout.combined_csv)?;
    let policy = if settings.overwrite {
        MergePolicy::Overwrite
    } else {
        MergePolicy::SkipExisting
    };
    let summary = import_reports(&store, &reports, policy);
    store.save()?;

    let group_store = GroupStore::open(&layout.groups_csv)?;
    let groups = import_groups(&group_store, &reports, policy);
    group_store.save()?;

    println!(
        "Imported {} reports ({} shots read): {} new, {} duplicates skipped, {} replaced",
        summary.reports,
        summary.shots_read,
        summary.inserted,
        summary.skipped_duplicate,
        summary.replaced
    );
    if !summary.new_columns.is_empty() {
        println!("New columns: {}", summary.new_columns.join(", "));
    }
    if !summary.issues.is_empty() {
        println!("{} records had problems; see the log for details", summary.issues.len());
    }
    if !failures.is_empty() {
        println!("{} report files were skipped", failures.len());
    }
    println!(
        "Combined dataset: {} shots in {}",
        store.snapshot().len(),
        layout.combined_csv.display()
    );
    println!(
        "Shot groups: {} new, {} duplicates skipped; {} groups in {}",
        groups.inserted,
        groups.skipped_duplicate,
        group_store.snapshot().len(),
        layout.groups_csv.display()
    );
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────────────

fn run_analyze(settings: &Settings, layout: &DataLayout) -> Result<()> {
    let Some(dataset) = load_dataset(layout)? else {
        return Ok(());
    };

    let groups = GroupStore::open(&layout.groups_csv)?.snapshot();
    if groups.is_empty() {
        tracing::warn!("No shot groups found at {}", layout.groups_csv.display());
    } else {
        tracing::info!(groups = groups.len(), "Loaded shot groups");
    }

    let analysis = analyze_dataset(&dataset);
    let text = analysis.report_text();
    std::fs::write(&layout.report_file, &text)
        .with_context(|| format!("Failed to write report {}", layout.report_file.display()))?;

    print!("{}", text);
    println!("Analysis report saved to {}", layout.report_file.display());

    if let Some(path) = &settings.series_out {
        let series = build_series(&dataset, &analysis);
        let json = serde_json::to_string_pretty(&series)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write chart series {}", path.display()))?;
        println!("Chart series saved to {}", path.display());
    }
    Ok(())
}

// ── summary ────────────────────────────────────────────────────────────────────

fn run_summary(settings: &Settings, layout: &DataLayout) -> Result<()> {
    let Some(dataset) = load_dataset(layout)? else {
        return Ok(());
    };

    let groups = match &settings.club {
        Some(club) => {
            let group = ShotAggregator::aggregate_club(&dataset, club, SUMMARY_METRICS)?;
            println!("Analyzing data for {} ({} shots)", club, group.shot_count);
            vec![group]
        }
        None => {
            println!("Analyzing all club data ({} shots)", dataset.len());
            ShotAggregator::aggregate(&dataset, SUMMARY_METRICS)
        }
    };

    print!("{}", format_club_summary(&groups));
    Ok(())
}

/// Open the combined dataset, or tell the user to import first when it is
/// empty.
fn load_dataset(layout: &DataLayout) -> Result<Option<Arc<Dataset>>> {
    let dataset = ShotStore::open(&layout.combined_csv)?.snapshot();
    if dataset.is_empty() {
        println!("No combined shot data found. Please run the import first.");
        return Ok(None);
    }
    Ok(Some(dataset))
}
