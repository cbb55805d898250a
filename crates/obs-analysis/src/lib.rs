pub mod cluster;
pub mod detect;
pub mod scoring;
pub mod snapshot;

use thiserror::Error;

pub use cluster::{cluster, effort_for, Clustering};
pub use detect::{detect, DetectorThresholds, DETECTORS};
pub use scoring::{score_signals, ScoringConfig, SuggestionDraft};
pub use snapshot::{build_snapshot, health_for};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to digest corpus: {0}")]
    Digest(#[from] serde_json::Error),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use obs_core::{ProofStatus, TestResult, TraceOutcome, TraceRecord};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    pub fn record(index: usize) -> TraceRecord {
        TraceRecord {
            trace_id: format!("t-{index:04}"),
            agent_type: "implementer".to_string(),
            started_at: None,
            ended_at: None,
            duration_seconds: 60,
            branch: "feature/work".to_string(),
            outcome: TraceOutcome::Success,
            test_result: TestResult::Pass,
            files_changed: 2,
            proof_status: ProofStatus::Verified,
        }
    }

    pub fn records(count: usize) -> Vec<TraceRecord> {
        (0..count).map(record).collect()
    }
}
