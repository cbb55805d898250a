use chrono::{DateTime, Duration, TimeZone, Utc};
use obs_cli::commands;
use obs_cli::{rerender_report, run_analysis, Settings};
use obs_core::catalog::ids;
use obs_core::snapshot::{AnalysisSnapshot, ComparisonMatrix};
use obs_core::suggestion::{DeferReason, SuggestionStatus};
use obs_store::outputs::{OutputStore, REPORT_FILE};
use obs_store::SuggestionLedger;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::time::Instant;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn write_index(traces_dir: &Path, total: usize, zero_durations: usize, unknown_results: usize) {
    fs::create_dir_all(traces_dir).expect("traces dir");
    let mut index = String::new();
    for i in 0..total {
        let record = json!({
            "trace_id": format!("run-{i:04}"),
            "agent_type": "implementer",
            "duration_seconds": if i < zero_durations { 0 } else { 90 },
            "branch": "feature/observatory",
            "outcome": "success",
            "test_result": if i < unknown_results { "unknown" } else { "pass" },
            "files_changed": 3,
            "proof_status": "verified"
        });
        index.push_str(&record.to_string());
        index.push('\n');
    }
    fs::write(traces_dir.join("index.jsonl"), index).expect("write index");
}

fn settings(root: &Path) -> Settings {
    Settings::new(root.join("traces"), root.join("state"))
}

fn stored(settings: &Settings) -> (AnalysisSnapshot, ComparisonMatrix) {
    let outputs = OutputStore::new(&settings.state_dir);
    (
        outputs
            .load_snapshot()
            .expect("load snapshot")
            .expect("snapshot present"),
        outputs
            .load_matrix()
            .expect("load matrix")
            .expect("matrix present"),
    )
}

#[test]
fn duration_and_unknown_results_are_ranked_and_batched_together() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    write_index(&settings.traces_dir, 320, 271, 312);

    let summary = run_analysis(&settings, now()).expect("analysis");
    assert_eq!(summary.records, 320);

    let (snapshot, matrix) = stored(&settings);
    let evidence = |id: &str| {
        snapshot
            .signals
            .iter()
            .find(|signal| signal.id == id)
            .map(|signal| (signal.evidence.affected, signal.evidence.total))
    };
    assert_eq!(evidence(ids::DURATION_ANOMALY), Some((271, 320)));
    assert_eq!(evidence(ids::TEST_RESULT_UNKNOWN), Some((312, 320)));
    assert_eq!(snapshot.trace_stats.total, 320);
    assert_eq!(snapshot.trace_stats.outcomes.values().sum::<u64>(), 320);

    let duration = matrix
        .rows
        .iter()
        .position(|row| row.signal_id == ids::DURATION_ANOMALY)
        .expect("duration row");
    let unknown = matrix
        .rows
        .iter()
        .position(|row| row.signal_id == ids::TEST_RESULT_UNKNOWN)
        .expect("unknown row");
    assert!(duration < unknown);
    assert_eq!(matrix.rows[duration].batch, matrix.rows[unknown].batch);
    assert!(matrix
        .rows
        .iter()
        .all(|row| (0.0..=1.0).contains(&row.priority_score)));

    let report = fs::read_to_string(settings.state_dir.join(REPORT_FILE)).expect("report");
    assert!(report.contains("| `duration-anomaly` | trace-infrastructure | high | 271/320 |"));
    assert!(report.contains("| `test-result-unknown` | data-quality | high | 312/320 |"));

    let document = OutputStore::new(&settings.state_dir)
        .load_suggestion(&matrix.rows[duration].suggestion_id)
        .expect("load suggestion")
        .expect("suggestion document");
    assert_eq!(document.signal_id, ids::DURATION_ANOMALY);
    assert!(document
        .implementation
        .files
        .contains(&"hooks/lib/trace-lib.sh".to_string()));
}

#[test]
fn five_hundred_records_finish_well_within_bound() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    write_index(&settings.traces_dir, 500, 120, 400);

    let started = Instant::now();
    run_analysis(&settings, now()).expect("analysis");
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
}

#[test]
fn report_regenerates_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    write_index(&settings.traces_dir, 40, 10, 30);
    run_analysis(&settings, now()).expect("analysis");

    let written = fs::read_to_string(settings.state_dir.join(REPORT_FILE)).expect("report");
    let first = rerender_report(&settings).expect("first render");
    let second = rerender_report(&settings).expect("second render");
    assert_eq!(first, second);
    assert_eq!(first, written);
}

#[test]
fn resolved_suggestions_never_return() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    write_index(&settings.traces_dir, 50, 20, 40);
    run_analysis(&settings, now()).expect("first analysis");

    let (_, matrix) = stored(&settings);
    let implemented = matrix
        .rows
        .iter()
        .find(|row| row.signal_id == ids::DURATION_ANOMALY)
        .map(|row| row.suggestion_id.clone())
        .expect("duration suggestion");
    let rejected = matrix
        .rows
        .iter()
        .find(|row| row.signal_id == ids::TEST_RESULT_UNKNOWN)
        .map(|row| row.suggestion_id.clone())
        .expect("unknown suggestion");
    commands::transition(&settings, &implemented, SuggestionStatus::Implemented, now())
        .expect("implement");
    commands::transition(&settings, &rejected, SuggestionStatus::Rejected, now())
        .expect("reject");

    let later = now() + Duration::days(1);
    run_analysis(&settings, later).expect("second analysis");
    let (snapshot, matrix) = stored(&settings);
    assert!(snapshot
        .signals
        .iter()
        .any(|signal| signal.id == ids::DURATION_ANOMALY));
    assert!(matrix
        .rows
        .iter()
        .all(|row| row.signal_id != ids::DURATION_ANOMALY
            && row.signal_id != ids::TEST_RESULT_UNKNOWN));
    assert!(snapshot.trends.is_some());

    let ledger = SuggestionLedger::open(&settings.state_dir).expect("open");
    assert_eq!(
        ledger.state().status_of(&implemented),
        Some(SuggestionStatus::Implemented)
    );
    assert_eq!(
        ledger.state().status_of(&rejected),
        Some(SuggestionStatus::Rejected)
    );
    assert!(ledger.state().deferred_entry(&implemented).is_none());
    assert_ne!(ledger.get_pending(), Some(implemented.as_str()));
}

#[test]
fn deferred_suggestion_resurfaces_on_a_later_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    write_index(&settings.traces_dir, 30, 30, 0);
    run_analysis(&settings, now()).expect("first analysis");

    let (_, matrix) = stored(&settings);
    let id = matrix.rows[0].suggestion_id.clone();
    commands::defer(
        &settings,
        &id,
        DeferReason::Dependency,
        Some(commands::parse_reassess_after("3d", now()).expect("offset")),
        Some("after the hook rewrite lands".to_string()),
        now(),
    )
    .expect("defer");

    let not_yet = run_analysis(&settings, now() + Duration::days(1)).expect("early run");
    assert!(not_yet.resurfaced.is_empty());

    let due = run_analysis(&settings, now() + Duration::days(4)).expect("due run");
    assert_eq!(due.resurfaced, vec![id.clone()]);
    let ledger = SuggestionLedger::open(&settings.state_dir).expect("open");
    assert_eq!(ledger.state().status_of(&id), Some(SuggestionStatus::Proposed));
    assert!(ledger.state().deferred.is_empty());
}

#[test]
fn empty_corpus_still_writes_zeroed_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());

    let summary = run_analysis(&settings, now()).expect("analysis");
    assert_eq!(summary.records, 0);
    assert_eq!(summary.signals, 0);
    assert_eq!(summary.health.score, 100);

    let (snapshot, matrix) = stored(&settings);
    assert_eq!(snapshot.trace_stats.total, 0);
    assert!(snapshot.signals.is_empty());
    assert!(matrix.rows.is_empty());
    let report = fs::read_to_string(settings.state_dir.join(REPORT_FILE)).expect("report");
    assert!(report.contains("_No active signals. The trace corpus looks clean._"));
}

#[test]
fn malformed_lines_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    write_index(&settings.traces_dir, 10, 0, 0);
    let index = settings.traces_dir.join("index.jsonl");
    let mut content = fs::read_to_string(&index).expect("read index");
    content.push_str("{ this is not json\n\n");
    fs::write(&index, content).expect("rewrite index");

    let summary = run_analysis(&settings, now()).expect("analysis");
    assert_eq!(summary.records, 10);
    assert_eq!(summary.skipped_lines, 1);
}

#[test]
fn trace_id_naming_a_file_does_not_abort_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    write_index(&settings.traces_dir, 5, 0, 0);
    let index = settings.traces_dir.join("index.jsonl");
    let mut content = fs::read_to_string(&index).expect("read index");
    let record = json!({
        "trace_id": "index.jsonl",
        "agent_type": "implementer",
        "duration_seconds": 90,
        "branch": "feature/observatory",
        "outcome": "success",
        "test_result": "pass",
        "files_changed": 3
    });
    content.push_str(&record.to_string());
    content.push('\n');
    fs::write(&index, content).expect("rewrite index");

    let summary = run_analysis(&settings, now()).expect("analysis");
    assert_eq!(summary.records, 6);
    assert!(settings.state_dir.join(REPORT_FILE).exists());
}

#[test]
fn legacy_store_with_resolved_signal_keeps_it_out_of_the_matrix() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path());
    fs::create_dir_all(&settings.traces_dir).expect("traces dir");
    let mut index = String::new();
    for i in 0..8 {
        let record = json!({
            "trace_id": format!("crash-{i}"),
            "agent_type": "tester",
            "duration_seconds": 60,
            "branch": "feature/observatory",
            "outcome": "crashed",
            "test_result": "fail",
            "files_changed": 1
        });
        index.push_str(&record.to_string());
        index.push('\n');
    }
    fs::write(settings.traces_dir.join("index.jsonl"), index).expect("write index");
    fs::create_dir_all(&settings.state_dir).expect("state dir");
    let legacy = json!({
        "version": 1,
        "signal_index": {"crash-cluster": "SUG-001"},
        "suggestions": {"SUG-001": {"status": "implemented"}},
        "deferred": []
    });
    fs::write(settings.state_dir.join("state.json"), legacy.to_string()).expect("seed state");

    run_analysis(&settings, now()).expect("analysis");
    let (snapshot, matrix) = stored(&settings);
    assert!(snapshot
        .signals
        .iter()
        .any(|signal| signal.id == ids::CRASH_CLUSTER));
    assert!(matrix
        .rows
        .iter()
        .all(|row| row.signal_id != ids::CRASH_CLUSTER));
}
