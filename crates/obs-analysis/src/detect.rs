use chrono::Duration;
use obs_core::catalog::{self, ids};
use obs_core::{
    percent, Evidence, ProofStatus, Severity, Signal, TestResult, TraceOutcome, UNKNOWN_BRANCH,
};
use obs_corpus::Corpus;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const DEFAULT_UNKNOWN_RESULT_HIGH_WATER: f64 = 0.30;
const DEFAULT_FILES_UNCHANGED_THRESHOLD: f64 = 0.50;
const DEFAULT_OUTCOME_FLATNESS_THRESHOLD: f64 = 0.60;
const DEFAULT_ARTIFACT_GAP_THRESHOLD: f64 = 0.20;
const DEFAULT_CRASH_RATE_THRESHOLD: f64 = 0.50;
const DEFAULT_CRASH_MIN_SAMPLES: u64 = 5;
const DEFAULT_MARKER_STALE_MINUTES: i64 = 120;
const DEFAULT_PROOF_UNKNOWN_THRESHOLD: f64 = 0.80;
const MAX_LISTED_MARKERS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorThresholds {
    pub unknown_result_high_water: f64,
    pub files_unchanged_threshold: f64,
    pub outcome_flatness_threshold: f64,
    pub artifact_gap_threshold: f64,
    pub required_artifacts: Vec<String>,
    pub protected_branches: Vec<String>,
    pub crash_rate_threshold: f64,
    /// A type needs strictly more samples than this before it can form a crash cluster.
    pub crash_min_samples: u64,
    pub marker_stale_minutes: i64,
    pub proof_unknown_threshold: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            unknown_result_high_water: DEFAULT_UNKNOWN_RESULT_HIGH_WATER,
            files_unchanged_threshold: DEFAULT_FILES_UNCHANGED_THRESHOLD,
            outcome_flatness_threshold: DEFAULT_OUTCOME_FLATNESS_THRESHOLD,
            artifact_gap_threshold: DEFAULT_ARTIFACT_GAP_THRESHOLD,
            required_artifacts: vec![
                "manifest.json".to_string(),
                "summary.md".to_string(),
                "test-output.txt".to_string(),
            ],
            protected_branches: vec!["main".to_string(), "master".to_string()],
            crash_rate_threshold: DEFAULT_CRASH_RATE_THRESHOLD,
            crash_min_samples: DEFAULT_CRASH_MIN_SAMPLES,
            marker_stale_minutes: DEFAULT_MARKER_STALE_MINUTES,
            proof_unknown_threshold: DEFAULT_PROOF_UNKNOWN_THRESHOLD,
        }
    }
}

pub type DetectorFn = fn(&Corpus, &DetectorThresholds) -> Vec<Signal>;

/// The detector panel. Rules are independent and only read the corpus, so
/// their order only affects discovery order downstream.
pub const DETECTORS: &[(&str, DetectorFn)] = &[
    (ids::DURATION_ANOMALY, detect_duration_anomaly),
    (ids::TEST_RESULT_UNKNOWN, detect_test_result_unknown),
    (ids::FILES_UNCHANGED, detect_files_unchanged),
    (ids::OUTCOME_FLATNESS, detect_outcome_flatness),
    (ids::ARTIFACT_COMPLETENESS_GAP, detect_artifact_gap),
    (ids::PROTECTED_BRANCH_VIOLATION, detect_protected_branch),
    (ids::TELEMETRY_FAILURE, detect_telemetry_failure),
    (ids::AGENT_TYPE_INCONSISTENCY, detect_agent_type_inconsistency),
    (ids::CRASH_CLUSTER, detect_crash_cluster),
    (ids::ORPHANED_MARKERS, detect_orphaned_markers),
    (ids::PROOF_STATUS_UNKNOWN, detect_proof_status_unknown),
];

pub fn detect(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let mut signals = Vec::new();
    for (rule_id, rule) in DETECTORS {
        let fired = rule(corpus, thresholds);
        debug!(event = "detector_ran", rule = rule_id, fired = fired.len());
        signals.extend(fired);
    }
    signals
}

fn emit(id: &str, severity: Severity, description: String, evidence: Evidence) -> Vec<Signal> {
    let Some(entry) = catalog::lookup(id) else {
        warn!(event = "detector_unknown_signal", signal = id);
        return Vec::new();
    };
    vec![Signal {
        id: entry.id.to_string(),
        category: entry.category,
        severity,
        description,
        evidence,
        root_cause: entry.root_cause.to_string(),
        unlocks: entry.unlocks.iter().map(|id| id.to_string()).collect(),
    }]
}

fn describe(evidence: &Evidence, noun: &str, what: &str) -> String {
    format!(
        "{} {noun} ({}) {what}",
        evidence.ratio_label(),
        percent(evidence.fraction())
    )
}

fn normalized_type(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn detect_duration_anomaly(corpus: &Corpus, _: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let zero = corpus
        .records
        .iter()
        .filter(|record| record.duration_seconds == 0)
        .count() as u64;
    let negative = corpus
        .records
        .iter()
        .filter(|record| record.duration_seconds < 0)
        .count() as u64;
    let affected = zero + negative;
    if affected == 0 {
        return Vec::new();
    }
    let evidence = Evidence::new(affected, total)
        .with_detail("zero_duration", zero)
        .with_detail("negative_duration", negative);
    let description = describe(&evidence, "trace records", "have zero or negative duration");
    emit(
        ids::DURATION_ANOMALY,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

pub fn detect_test_result_unknown(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let affected = corpus
        .records
        .iter()
        .filter(|record| record.test_result == TestResult::Unknown)
        .count() as u64;
    let evidence = Evidence::new(affected, total)
        .with_detail("threshold", thresholds.unknown_result_high_water);
    if evidence.fraction() <= thresholds.unknown_result_high_water {
        return Vec::new();
    }
    let description = describe(&evidence, "trace records", "have an unknown test result");
    emit(
        ids::TEST_RESULT_UNKNOWN,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

pub fn detect_files_unchanged(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let affected = corpus
        .records
        .iter()
        .filter(|record| record.files_changed == 0)
        .count() as u64;
    let evidence = Evidence::new(affected, total)
        .with_detail("threshold", thresholds.files_unchanged_threshold);
    if evidence.fraction() <= thresholds.files_unchanged_threshold {
        return Vec::new();
    }
    let description = describe(&evidence, "trace records", "report zero files changed");
    emit(
        ids::FILES_UNCHANGED,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

pub fn detect_outcome_flatness(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let affected = corpus
        .records
        .iter()
        .filter(|record| record.outcome == TraceOutcome::Partial)
        .count() as u64;
    let evidence = Evidence::new(affected, total)
        .with_detail("threshold", thresholds.outcome_flatness_threshold);
    if evidence.fraction() <= thresholds.outcome_flatness_threshold {
        return Vec::new();
    }
    let description = describe(&evidence, "trace records", "landed in the catch-all partial outcome");
    emit(
        ids::OUTCOME_FLATNESS,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

pub fn detect_artifact_gap(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.runs.len() as u64;
    if total == 0 || thresholds.required_artifacts.is_empty() {
        return Vec::new();
    }
    let mut missing_by_artifact = BTreeMap::<String, u64>::new();
    let mut affected = 0u64;
    for run in &corpus.runs {
        let missing = run.missing(&thresholds.required_artifacts);
        if missing.is_empty() {
            continue;
        }
        affected += 1;
        for name in missing {
            *missing_by_artifact.entry(name.to_string()).or_default() += 1;
        }
    }
    let evidence = Evidence::new(affected, total)
        .with_detail("missing_by_artifact", json!(missing_by_artifact))
        .with_detail("threshold", thresholds.artifact_gap_threshold);
    if evidence.fraction() <= thresholds.artifact_gap_threshold {
        return Vec::new();
    }
    let description = describe(&evidence, "runs", "are missing at least one required artifact");
    emit(
        ids::ARTIFACT_COMPLETENESS_GAP,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

pub fn detect_protected_branch(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let mut by_branch = BTreeMap::<String, u64>::new();
    for record in &corpus.records {
        let branch = record.branch.trim();
        if thresholds
            .protected_branches
            .iter()
            .any(|protected| protected == branch)
        {
            *by_branch.entry(branch.to_string()).or_default() += 1;
        }
    }
    let affected = by_branch.values().sum::<u64>();
    if affected == 0 {
        return Vec::new();
    }
    let evidence = Evidence::new(affected, total).with_detail("by_branch", json!(by_branch));
    let description = describe(&evidence, "agent runs", "executed on a protected branch");
    emit(
        ids::PROTECTED_BRANCH_VIOLATION,
        Severity::High,
        description,
        evidence,
    )
}

pub fn detect_telemetry_failure(corpus: &Corpus, _: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let affected = corpus
        .records
        .iter()
        .filter(|record| record.branch == UNKNOWN_BRANCH)
        .count() as u64;
    if affected == 0 {
        return Vec::new();
    }
    let evidence = Evidence::new(affected, total);
    let description = describe(&evidence, "trace records", "report branch \"unknown\"");
    emit(
        ids::TELEMETRY_FAILURE,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

pub fn detect_agent_type_inconsistency(corpus: &Corpus, _: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let mut spellings = BTreeMap::<String, BTreeMap<String, u64>>::new();
    for record in &corpus.records {
        *spellings
            .entry(normalized_type(&record.agent_type))
            .or_default()
            .entry(record.agent_type.clone())
            .or_default() += 1;
    }

    let mut affected = 0u64;
    let mut variants = BTreeMap::<String, Vec<String>>::new();
    for (normalized, by_spelling) in &spellings {
        if by_spelling.len() < 2 {
            continue;
        }
        // The most common spelling is canonical; every other spelling counts as affected.
        let dominant = by_spelling.values().copied().max().unwrap_or(0);
        affected += by_spelling.values().sum::<u64>() - dominant;
        variants.insert(normalized.clone(), by_spelling.keys().cloned().collect());
    }
    if affected == 0 {
        return Vec::new();
    }
    let evidence = Evidence::new(affected, total).with_detail("variants", json!(variants));
    let description = describe(
        &evidence,
        "trace records",
        "use a non-canonical spelling of their agent type",
    );
    emit(
        ids::AGENT_TYPE_INCONSISTENCY,
        Severity::from_fraction(evidence.fraction()).min(Severity::Medium),
        description,
        evidence,
    )
}

pub fn detect_crash_cluster(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let mut by_type = BTreeMap::<String, (u64, u64)>::new();
    for record in &corpus.records {
        let entry = by_type.entry(normalized_type(&record.agent_type)).or_default();
        entry.1 += 1;
        if record.outcome == TraceOutcome::Crashed {
            entry.0 += 1;
        }
    }

    let mut affected = 0u64;
    let mut total = 0u64;
    let mut clusters = BTreeMap::<String, serde_json::Value>::new();
    for (agent_type, (crashed, runs)) in by_type {
        if runs <= thresholds.crash_min_samples || runs == 0 {
            continue;
        }
        let rate = crashed as f64 / runs as f64;
        if rate <= thresholds.crash_rate_threshold {
            continue;
        }
        affected += crashed;
        total += runs;
        clusters.insert(agent_type, json!({"crashed": crashed, "runs": runs}));
    }
    if total == 0 {
        return Vec::new();
    }
    let names = clusters.keys().cloned().collect::<Vec<_>>().join(", ");
    let evidence = Evidence::new(affected, total).with_detail("agent_types", json!(clusters));
    let description = format!(
        "{} runs ({}) crashed across crash-prone agent types: {names}",
        evidence.ratio_label(),
        percent(evidence.fraction())
    );
    emit(ids::CRASH_CLUSTER, Severity::High, description, evidence)
}

pub fn detect_orphaned_markers(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.markers.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    // A stale age past the representable range means no marker can be stale.
    let Some(stale_after) = Duration::try_minutes(thresholds.marker_stale_minutes.max(0)) else {
        warn!(
            event = "marker_stale_age_out_of_range",
            minutes = thresholds.marker_stale_minutes
        );
        return Vec::new();
    };
    let orphaned = corpus
        .markers
        .iter()
        .filter(|marker| corpus.observed_at - marker.modified_at > stale_after)
        .map(|marker| marker.name.clone())
        .collect::<Vec<_>>();
    if orphaned.is_empty() {
        return Vec::new();
    }
    let evidence = Evidence::new(orphaned.len() as u64, total)
        .with_detail(
            "markers",
            json!(orphaned.iter().take(MAX_LISTED_MARKERS).collect::<Vec<_>>()),
        )
        .with_detail("stale_after_minutes", thresholds.marker_stale_minutes);
    let description = describe(&evidence, "in-progress markers", "are older than the stale age");
    emit(
        ids::ORPHANED_MARKERS,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

pub fn detect_proof_status_unknown(corpus: &Corpus, thresholds: &DetectorThresholds) -> Vec<Signal> {
    let total = corpus.manifests().count() as u64;
    if total == 0 {
        return Vec::new();
    }
    let affected = corpus
        .manifests()
        .filter(|manifest| manifest.proof_status == ProofStatus::Unknown)
        .count() as u64;
    let evidence =
        Evidence::new(affected, total).with_detail("threshold", thresholds.proof_unknown_threshold);
    if evidence.fraction() <= thresholds.proof_unknown_threshold {
        return Vec::new();
    }
    let description = describe(&evidence, "run manifests", "carry an unknown proof status");
    emit(
        ids::PROOF_STATUS_UNKNOWN,
        Severity::from_fraction(evidence.fraction()),
        description,
        evidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{now, record, records};
    use obs_corpus::{MarkerFile, RunArtifacts, RunManifest};
    use std::collections::BTreeSet;

    fn corpus(records: Vec<obs_core::TraceRecord>) -> Corpus {
        Corpus::from_records(records, now())
    }

    #[test]
    fn empty_corpus_fires_nothing() {
        let signals = detect(&Corpus::empty(now()), &DetectorThresholds::default());
        assert!(signals.is_empty());
    }

    #[test]
    fn every_registered_rule_maps_to_a_catalog_entry() {
        for (rule_id, _) in DETECTORS {
            assert!(catalog::is_known(rule_id), "{rule_id} missing from catalog");
        }
        assert_eq!(DETECTORS.len(), catalog::entries().len());
    }

    #[test]
    fn duration_anomaly_carries_raw_counts() {
        let mut input = records(320);
        for (index, record) in input.iter_mut().enumerate().take(271) {
            record.duration_seconds = if index % 2 == 0 { 0 } else { -5 };
        }
        let signals = detect_duration_anomaly(&corpus(input), &DetectorThresholds::default());
        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.evidence.affected, 271);
        assert_eq!(signal.evidence.total, 320);
        assert_eq!(signal.severity, Severity::High);
        assert!(signal.description.starts_with("271/320"));
        assert_eq!(signal.evidence.details["zero_duration"], json!(136));
        assert_eq!(signal.evidence.details["negative_duration"], json!(135));
    }

    #[test]
    fn unknown_results_at_high_water_mark_do_not_fire() {
        let mut input = records(10);
        for record in input.iter_mut().take(3) {
            record.test_result = TestResult::Unknown;
        }
        let thresholds = DetectorThresholds::default();
        assert!(detect_test_result_unknown(&corpus(input.clone()), &thresholds).is_empty());

        input[3].test_result = TestResult::Unknown;
        let fired = detect_test_result_unknown(&corpus(input), &thresholds);
        assert_eq!(fired[0].evidence.ratio_label(), "4/10");
        assert_eq!(fired[0].severity, Severity::Medium);
    }

    #[test]
    fn files_unchanged_and_flatness_use_their_own_thresholds() {
        let mut input = records(10);
        for record in input.iter_mut().take(6) {
            record.files_changed = 0;
            record.outcome = TraceOutcome::Partial;
        }
        let thresholds = DetectorThresholds::default();
        let flat_corpus = corpus(input);
        assert_eq!(detect_files_unchanged(&flat_corpus, &thresholds).len(), 1);
        // 60% partial sits exactly on the flatness threshold.
        assert!(detect_outcome_flatness(&flat_corpus, &thresholds).is_empty());
    }

    #[test]
    fn protected_branch_and_telemetry_failures_are_separate_rules() {
        let mut input = records(4);
        input[0].branch = "main".to_string();
        input[1].branch = "master".to_string();
        input[2].branch = UNKNOWN_BRANCH.to_string();
        let corpus = corpus(input);
        let thresholds = DetectorThresholds::default();

        let protected = detect_protected_branch(&corpus, &thresholds);
        assert_eq!(protected[0].evidence.ratio_label(), "2/4");
        assert_eq!(protected[0].severity, Severity::High);
        assert_eq!(
            protected[0].evidence.details["by_branch"],
            json!({"main": 1, "master": 1})
        );

        let telemetry = detect_telemetry_failure(&corpus, &thresholds);
        assert_eq!(telemetry[0].evidence.ratio_label(), "1/4");
    }

    #[test]
    fn miscapitalised_agent_types_are_reported() {
        let mut input = records(5);
        input[0].agent_type = "tester".to_string();
        input[1].agent_type = "tester".to_string();
        input[2].agent_type = "Tester".to_string();
        let signals =
            detect_agent_type_inconsistency(&corpus(input), &DetectorThresholds::default());
        assert_eq!(signals[0].evidence.ratio_label(), "1/5");
        assert_eq!(
            signals[0].evidence.details["variants"],
            json!({"tester": ["Tester", "tester"]})
        );
        assert!(signals[0].severity <= Severity::Medium);
    }

    #[test]
    fn consistent_agent_types_do_not_fire() {
        let mut input = records(3);
        input[0].agent_type = "Planner".to_string();
        assert!(
            detect_agent_type_inconsistency(&corpus(input), &DetectorThresholds::default())
                .is_empty()
        );
    }

    #[test]
    fn crash_cluster_requires_more_than_minimum_samples() {
        let mut five = (0..5).map(record).collect::<Vec<_>>();
        for record in &mut five {
            record.agent_type = "tester".to_string();
            record.outcome = TraceOutcome::Crashed;
        }
        let thresholds = DetectorThresholds::default();
        assert!(detect_crash_cluster(&corpus(five.clone()), &thresholds).is_empty());

        let mut six = five;
        let mut extra = record(99);
        extra.agent_type = "Tester".to_string();
        six.push(extra);
        let signals = detect_crash_cluster(&corpus(six), &thresholds);
        assert_eq!(signals[0].evidence.ratio_label(), "5/6");
        assert_eq!(signals[0].severity, Severity::High);
        assert!(signals[0].description.contains("tester"));
    }

    #[test]
    fn crash_rate_at_half_does_not_cluster() {
        let mut input = records(10);
        for record in input.iter_mut().take(5) {
            record.outcome = TraceOutcome::Crashed;
        }
        assert!(detect_crash_cluster(&corpus(input), &DetectorThresholds::default()).is_empty());
    }

    #[test]
    fn only_stale_markers_are_orphaned() {
        let mut corpus = corpus(records(1));
        corpus.markers = vec![
            MarkerFile {
                name: ".active-tester-old".to_string(),
                agent_type: "tester".to_string(),
                session_id: "old".to_string(),
                modified_at: now() - Duration::hours(5),
            },
            MarkerFile {
                name: ".active-tester-new".to_string(),
                agent_type: "tester".to_string(),
                session_id: "new".to_string(),
                modified_at: now() - Duration::minutes(10),
            },
        ];
        let signals = detect_orphaned_markers(&corpus, &DetectorThresholds::default());
        assert_eq!(signals[0].evidence.ratio_label(), "1/2");
        assert_eq!(signals[0].evidence.details["markers"], json!([".active-tester-old"]));
    }

    #[test]
    fn out_of_range_stale_age_orphans_nothing() {
        let mut corpus = corpus(records(1));
        corpus.markers = vec![MarkerFile {
            name: ".active-tester-old".to_string(),
            agent_type: "tester".to_string(),
            session_id: "old".to_string(),
            modified_at: now() - Duration::days(30),
        }];
        let thresholds = DetectorThresholds {
            marker_stale_minutes: i64::MAX,
            ..DetectorThresholds::default()
        };
        assert!(detect_orphaned_markers(&corpus, &thresholds).is_empty());

        let negative = DetectorThresholds {
            marker_stale_minutes: -5,
            ..DetectorThresholds::default()
        };
        assert_eq!(detect_orphaned_markers(&corpus, &negative).len(), 1);
    }

    fn run(trace_id: &str, proof: Option<ProofStatus>, files: &[&str]) -> RunArtifacts {
        RunArtifacts {
            trace_id: trace_id.to_string(),
            manifest: proof.map(|proof_status| RunManifest {
                trace_id: trace_id.to_string(),
                agent_type: None,
                proof_status,
                artifacts: Vec::new(),
            }),
            files: files.iter().map(|name| name.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn artifact_gap_counts_runs_with_any_missing_artifact() {
        let mut corpus = corpus(records(4));
        let complete = ["manifest.json", "summary.md", "test-output.txt"];
        corpus.runs = vec![
            run("t-1", Some(ProofStatus::Verified), &complete),
            run("t-2", Some(ProofStatus::Verified), &["manifest.json"]),
            run("t-3", None, &[]),
            run("t-4", Some(ProofStatus::Verified), &complete),
        ];
        let signals = detect_artifact_gap(&corpus, &DetectorThresholds::default());
        assert_eq!(signals[0].evidence.ratio_label(), "2/4");
        assert_eq!(
            signals[0].evidence.details["missing_by_artifact"],
            json!({"manifest.json": 1, "summary.md": 2, "test-output.txt": 2})
        );
    }

    #[test]
    fn proof_status_needs_a_strong_unknown_majority() {
        let mut corpus = corpus(records(5));
        corpus.runs = (0..5)
            .map(|index| {
                let status = if index == 0 {
                    ProofStatus::Verified
                } else {
                    ProofStatus::Unknown
                };
                run(&format!("t-{index}"), Some(status), &["manifest.json"])
            })
            .collect();
        // 4/5 = 80% is not above the threshold.
        let thresholds = DetectorThresholds::default();
        assert!(detect_proof_status_unknown(&corpus, &thresholds).is_empty());

        corpus.runs.push(run("t-5", Some(ProofStatus::Unknown), &[]));
        let signals = detect_proof_status_unknown(&corpus, &thresholds);
        assert_eq!(signals[0].evidence.ratio_label(), "5/6");
    }

    #[test]
    fn signals_copy_static_unlocks_from_catalog() {
        let mut input = records(2);
        input[0].duration_seconds = 0;
        let signals = detect_duration_anomaly(&corpus(input), &DetectorThresholds::default());
        assert_eq!(
            signals[0].unlocks,
            vec![ids::TEST_RESULT_UNKNOWN.to_string(), ids::FILES_UNCHANGED.to_string()]
        );
    }
}
