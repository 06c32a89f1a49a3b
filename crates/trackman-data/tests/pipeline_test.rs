//! End-to-end: report files → import → save → reopen → analysis report.

use std::path::Path;

use serde_json::{json, Value};
use tempfile::TempDir;
use trackman_data::analysis::{analyze_dataset, build_series, import_groups, import_reports};
use trackman_data::core::models::columns;
use trackman_data::reader::{find_report_files, load_reports};
use trackman_data::store::{GroupStore, MergePolicy, ShotStore};

fn stroke(id: &str, club: Option<&str>, time: &str, ball: f64, smash: f64, carry: f64, side: f64) -> Value {
    json!({
        "Id": id,
        "Time": time,
        "Club": club,
        "Measurement": {
            "BallSpeed": ball,
            "SmashFactor": smash,
            "Carry": carry,
            "CarrySide": side,
        }
    })
}

fn write_report(dir: &Path, report_id: &str, groups: Value) {
    let doc = json!({ "StrokeGroups": groups });
    std::fs::write(
        dir.join(format!("report_data_{report_id}.json")),
        serde_json::to_string_pretty(&doc).unwrap(),
    )
    .unwrap();
}

fn seed_raw_dir(raw: &Path) {
    std::fs::create_dir_all(raw).unwrap();
    write_report(
        raw,
        "session-1",
        json!([
            {
                "Date": "2024-01-15T08:00:00Z",
                "Club": "8Iron",
                "Strokes": [
                    stroke("a1", Some("8Iron"), "2024-01-15T08:01:00Z", 54.0, 1.33, 154.8, -3.0),
                    stroke("a2", Some("8Iron"), "2024-01-15T08:02:00Z", 55.0, 1.34, 155.8, 1.0),
                ]
            },
            {
                "Date": "2024-01-15T08:30:00Z",
                "Club": "60Wedge",
                "Strokes": [
                    stroke("a3", Some("60Wedge"), "2024-01-15T08:31:00Z", 25.0, 1.10, 60.0, 2.0),
                ]
            }
        ]),
    );
    write_report(
        raw,
        "session-2",
        json!([
            {
                "Date": "2024-03-02T10:00:00Z",
                "Club": "8Iron",
                "Strokes": [
                    stroke("b1", Some("8Iron"), "2024-03-02T10:01:00Z", 56.0, 1.35, 156.8, 0.5),
                ]
            }
        ]),
    );
}

#[test]
fn import_save_reopen_and_report() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw");
    let csv_path = tmp.path().join("processed").join("combined_shot_data.csv");
    seed_raw_dir(&raw);

    let files = find_report_files(&raw);
    assert_eq!(files.len(), 2);
    let (reports, failures) = load_reports(&files);
    assert!(failures.is_empty());

    let store = ShotStore::open(&csv_path).unwrap();
    let summary = import_reports(&store, &reports, MergePolicy::SkipExisting);
    assert_eq!(summary.inserted, 4);
    assert!(summary.issues.is_empty());
    store.save().unwrap();

    let reopened = ShotStore::open(&csv_path).unwrap();
    let dataset = reopened.snapshot();
    assert_eq!(dataset.len(), 4);
    assert!(dataset.schema().contains(columns::BALL_SPEED));
    assert!(dataset.schema().contains("GroupClub"));

    let analysis = analyze_dataset(&dataset);
    let text = analysis.report_text();

    assert!(text.starts_with("TRACKMAN DATA ANALYSIS REPORT\n=============================\n\n"));
    assert!(text.contains("Total shots analyzed: 4\n"));
    assert!(text.contains("Date range: 2024-01-15 08:01:00 to 2024-03-02 10:01:00\n"));
    assert!(text.contains(
        "8Iron (3 shots):\n  Average Ball Speed: 55.0 mph\n  Average Smash Factor: 1.34\n  Average Carry Distance: 155.8 yards\n"
    ));
    assert!(text.contains("nan (0 shots):\n  Average Ball Speed: nan mph\n"));
    assert!(text.contains("60Wedge:\n  Average Side Carry: 2.0 yards\n  Side Carry Standard Deviation: nan yards\n"));

    let series = build_series(&dataset, &analysis);
    assert_eq!(series.trends.len(), 3);
}

#[test]
fn reimport_is_idempotent_across_restarts() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw");
    let csv_path = tmp.path().join("combined_shot_data.csv");
    seed_raw_dir(&raw);
    let (reports, _) = load_reports(&find_report_files(&raw));

    let store = ShotStore::open(&csv_path).unwrap();
    import_reports(&store, &reports, MergePolicy::SkipExisting);
    store.save().unwrap();
    let first = std::fs::read_to_string(&csv_path).unwrap();

    let store = ShotStore::open(&csv_path).unwrap();
    let summary = import_reports(&store, &reports, MergePolicy::SkipExisting);
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.skipped_duplicate, 4);
    store.save().unwrap();

    assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), first);
}

#[test]
fn shots_without_club_land_in_unknown_bucket() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    write_report(
        &raw,
        "session-3",
        json!([
            {
                "Date": "2024-04-01T09:00:00Z",
                "Strokes": [
                    stroke("c1", None, "2024-04-01T09:01:00Z", 40.0, 1.2, 100.0, 0.0),
                    stroke("c2", Some("Driver"), "2024-04-01T09:02:00Z", 70.0, 1.48, 240.0, 4.0),
                ]
            }
        ]),
    );

    let (reports, _) = load_reports(&find_report_files(&raw));
    let store = ShotStore::new(tmp.path().join("combined.csv"));
    import_reports(&store, &reports, MergePolicy::SkipExisting);

    let analysis = analyze_dataset(&store.snapshot());
    let labels: Vec<String> = analysis.groups.iter().map(|g| g.club.to_string()).collect();
    assert_eq!(labels, vec!["nan", "Driver"]);
    assert_eq!(analysis.groups[0].shot_count, 1);
    assert!(analysis.report_text().contains("nan (1 shots):\n  Average Ball Speed: 40.0 mph\n"));
}

#[test]
fn stroke_groups_saved_and_deduplicated() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw");
    let groups_path = tmp.path().join("processed").join("combined_shot_groups.csv");
    seed_raw_dir(&raw);
    let (reports, _) = load_reports(&find_report_files(&raw));

    let store = GroupStore::open(&groups_path).unwrap();
    let result = import_groups(&store, &reports, MergePolicy::SkipExisting);
    assert_eq!(result.inserted, 3);
    store.save().unwrap();

    let reopened = GroupStore::open(&groups_path).unwrap();
    let again = import_groups(&reopened, &reports, MergePolicy::SkipExisting);
    assert_eq!(again.inserted, 0);
    assert_eq!(again.skipped_duplicate, 3);

    let groups = reopened.snapshot();
    let clubs: Vec<String> = groups.rows().iter().map(|g| g.club.to_string()).collect();
    assert_eq!(clubs, vec!["8Iron", "60Wedge", "8Iron"]);
    assert_eq!(groups.rows()[0].num_strokes(), Some(2.0));

    let header = std::fs::read_to_string(&groups_path).unwrap();
    assert!(header.starts_with("report_id,date,club,player_name,"));
}
