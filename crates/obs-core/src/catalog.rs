use crate::SignalCategory;
use std::collections::BTreeSet;
use thiserror::Error;

/// Bumped whenever an entry's unlock edges or target files change.
pub const CATALOG_VERSION: u32 = 1;

pub mod ids {
    pub const DURATION_ANOMALY: &str = "duration-anomaly";
    pub const TEST_RESULT_UNKNOWN: &str = "test-result-unknown";
    pub const FILES_UNCHANGED: &str = "files-unchanged";
    pub const OUTCOME_FLATNESS: &str = "outcome-flatness";
    pub const ARTIFACT_COMPLETENESS_GAP: &str = "artifact-completeness-gap";
    pub const PROTECTED_BRANCH_VIOLATION: &str = "protected-branch-violation";
    pub const TELEMETRY_FAILURE: &str = "telemetry-failure";
    pub const AGENT_TYPE_INCONSISTENCY: &str = "agent-type-inconsistency";
    pub const CRASH_CLUSTER: &str = "crash-cluster";
    pub const ORPHANED_MARKERS: &str = "orphaned-markers";
    pub const PROOF_STATUS_UNKNOWN: &str = "proof-status-unknown";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub category: SignalCategory,
    pub title: &'static str,
    pub root_cause: &'static str,
    pub impact: &'static str,
    pub files: &'static [&'static str],
    pub approach: &'static str,
    pub test_strategy: &'static str,
    pub unlocks: &'static [&'static str],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate catalog id {0}")]
    DuplicateId(String),
    #[error("{from} unlocks unknown signal {to}")]
    UnknownUnlock { from: String, to: String },
    #[error("{0} unlocks itself")]
    SelfUnlock(String),
    #[error("{0} has no target files")]
    NoTargetFiles(String),
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        id: ids::DURATION_ANOMALY,
        category: SignalCategory::TraceInfrastructure,
        title: "Fix trace duration capture",
        root_cause: "Start timestamp is written after the agent exits, so end minus start collapses to zero or goes negative.",
        impact: "Every duration-based statistic is meaningless until timing is captured at agent start.",
        files: &["hooks/lib/trace-lib.sh"],
        approach: "Record the start epoch in init_trace and compute duration in finalize_trace from the persisted value.",
        test_strategy: "Run a traced no-op agent and assert duration_seconds > 0 in the index line.",
        unlocks: &[ids::TEST_RESULT_UNKNOWN, ids::FILES_UNCHANGED],
    },
    CatalogEntry {
        id: ids::TEST_RESULT_UNKNOWN,
        category: SignalCategory::DataQuality,
        title: "Capture test results in traces",
        root_cause: "The finalizer only reads test output when the tester artifact exists, which most roles never write.",
        impact: "Outcome quality cannot be judged without knowing whether tests passed.",
        files: &["hooks/lib/trace-lib.sh", "hooks/check-tester.sh"],
        approach: "Parse the last test-status marker during finalize_trace and fall back to the tester artifact.",
        test_strategy: "Fixture trace with a passing test-status marker must index test_result=pass.",
        unlocks: &[],
    },
    CatalogEntry {
        id: ids::FILES_UNCHANGED,
        category: SignalCategory::TraceCompleteness,
        title: "Count changed files at finalize",
        root_cause: "files_changed is computed against the wrong base ref and reports zero for committed work.",
        impact: "Productive runs look like no-ops, hiding real throughput.",
        files: &["hooks/finalize-trace.sh"],
        approach: "Diff against the merge base recorded at trace start instead of HEAD.",
        test_strategy: "Commit inside a traced run and assert files_changed matches git diff --name-only.",
        unlocks: &[],
    },
    CatalogEntry {
        id: ids::OUTCOME_FLATNESS,
        category: SignalCategory::DataQuality,
        title: "Classify outcomes beyond partial",
        root_cause: "The outcome classifier defaults to partial whenever the summary lacks an explicit verdict line.",
        impact: "A flat outcome distribution makes success-rate trends invisible.",
        files: &["hooks/finalize-trace.sh"],
        approach: "Derive outcome from exit status and test result before falling back to the summary verdict.",
        test_strategy: "Table test over exit status / test result pairs against the expected outcome.",
        unlocks: &[],
    },
    CatalogEntry {
        id: ids::ARTIFACT_COMPLETENESS_GAP,
        category: SignalCategory::TraceCompleteness,
        title: "Enforce required trace artifacts",
        root_cause: "Agents exit before writing summary and test output, and nothing back-fills them.",
        impact: "Incomplete runs cannot be audited or replayed.",
        files: &["hooks/finalize-trace.sh", "agents/templates/summary.md"],
        approach: "Write placeholder artifacts at finalize when the agent did not produce them, flagged as synthesized.",
        test_strategy: "Finalize a run with an empty artifact dir and assert every required artifact exists.",
        unlocks: &[ids::PROOF_STATUS_UNKNOWN],
    },
    CatalogEntry {
        id: ids::PROTECTED_BRANCH_VIOLATION,
        category: SignalCategory::WorkflowCompliance,
        title: "Block agents on protected branches",
        root_cause: "Branch guard only runs for write tools, so read-heavy agents start on main unchecked.",
        impact: "Work lands directly on main or master without review.",
        files: &["hooks/branch-guard.sh"],
        approach: "Check the branch at agent start and refuse to run on main or master.",
        test_strategy: "Start an agent on main in a fixture repo and assert the guard denies it.",
        unlocks: &[],
    },
    CatalogEntry {
        id: ids::TELEMETRY_FAILURE,
        category: SignalCategory::TraceInfrastructure,
        title: "Repair branch telemetry",
        root_cause: "Git branch detection runs outside the project directory and falls back to the literal unknown.",
        impact: "Branch-based compliance checks are blind for affected runs.",
        files: &["hooks/lib/trace-lib.sh"],
        approach: "Resolve the project root before invoking git and record detection errors explicitly.",
        test_strategy: "Init a trace from a nested directory and assert the branch is resolved.",
        unlocks: &[ids::PROTECTED_BRANCH_VIOLATION],
    },
    CatalogEntry {
        id: ids::AGENT_TYPE_INCONSISTENCY,
        category: SignalCategory::DataQuality,
        title: "Normalize agent type labels",
        root_cause: "Agent type is copied verbatim from the dispatcher, which does not normalize case.",
        impact: "Per-agent statistics split the same role across several buckets.",
        files: &["hooks/subagent-start.sh"],
        approach: "Lowercase and trim the agent type before writing the trace.",
        test_strategy: "Start agents named Tester and tester and assert one agent_type value.",
        unlocks: &[ids::CRASH_CLUSTER],
    },
    CatalogEntry {
        id: ids::CRASH_CLUSTER,
        category: SignalCategory::AgentPerformance,
        title: "Investigate crash-prone agent type",
        root_cause: "One agent type exits abnormally in most runs, usually from context exhaustion or a missing tool.",
        impact: "Crashed runs waste budget and leave partial work behind.",
        files: &["hooks/subagent-stop.sh"],
        approach: "Capture exit reason for crashed runs and add a pre-flight check for the failing type.",
        test_strategy: "Replay recorded crash traces and assert the exit reason is captured.",
        unlocks: &[],
    },
    CatalogEntry {
        id: ids::ORPHANED_MARKERS,
        category: SignalCategory::TraceInfrastructure,
        title: "Clean up orphaned in-progress markers",
        root_cause: "Session end does not remove active markers when the agent is killed.",
        impact: "Stale markers make guards believe an agent is still running.",
        files: &["hooks/session-end.sh"],
        approach: "Sweep markers older than the stale age at session end and at session start.",
        test_strategy: "Create an old marker, run session end, assert it is gone.",
        unlocks: &[ids::OUTCOME_FLATNESS],
    },
    CatalogEntry {
        id: ids::PROOF_STATUS_UNKNOWN,
        category: SignalCategory::WorkflowCompliance,
        title: "Record proof status in manifests",
        root_cause: "The proof gate never writes its verdict back into the run manifest.",
        impact: "Verification coverage cannot be measured.",
        files: &["hooks/proof-gate.sh"],
        approach: "Write proof_status to manifest.json whenever the proof gate transitions.",
        test_strategy: "Verify a run through the gate and assert manifest proof_status=verified.",
        unlocks: &[],
    },
];

pub fn entries() -> &'static [CatalogEntry] {
    ENTRIES
}

pub fn lookup(id: &str) -> Option<&'static CatalogEntry> {
    ENTRIES.iter().find(|entry| entry.id == id)
}

pub fn is_known(id: &str) -> bool {
    lookup(id).is_some()
}

/// Signals whose fix unlocks `id`.
pub fn depends_on(id: &str) -> Vec<&'static str> {
    ENTRIES
        .iter()
        .filter(|entry| entry.unlocks.contains(&id))
        .map(|entry| entry.id)
        .collect()
}

pub fn unlocks(id: &str) -> Vec<String> {
    lookup(id)
        .map(|entry| entry.unlocks.iter().map(|id| id.to_string()).collect())
        .unwrap_or_default()
}

pub fn validate() -> Result<(), CatalogError> {
    let mut seen = BTreeSet::new();
    for entry in ENTRIES {
        if !seen.insert(entry.id) {
            return Err(CatalogError::DuplicateId(entry.id.to_string()));
        }
        if entry.files.is_empty() {
            return Err(CatalogError::NoTargetFiles(entry.id.to_string()));
        }
    }
    for entry in ENTRIES {
        for target in entry.unlocks {
            if *target == entry.id {
                return Err(CatalogError::SelfUnlock(entry.id.to_string()));
            }
            if !seen.contains(target) {
                return Err(CatalogError::UnknownUnlock {
                    from: entry.id.to_string(),
                    to: target.to_string(),
                });
            }
        }
    }
    Ok(())
}
