use crate::suggestion::{EffortTier, SuggestionStatus};
use crate::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DurationSummary {
    pub min_seconds: i64,
    pub max_seconds: i64,
    pub mean_seconds: f64,
    pub non_positive: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TraceStats {
    pub total: u64,
    pub skipped_malformed: u64,
    pub outcomes: BTreeMap<String, u64>,
    pub test_results: BTreeMap<String, u64>,
    pub proof_statuses: BTreeMap<String, u64>,
    pub branches: BTreeMap<String, u64>,
    pub duration: DurationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ArtifactCompleteness {
    pub runs_checked: u64,
    pub complete: u64,
    pub incomplete: u64,
    pub missing_by_artifact: BTreeMap<String, u64>,
    pub completeness_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SelfMetrics {
    pub suggestions_made: u64,
    pub proposed: u64,
    pub implemented: u64,
    pub rejected: u64,
    pub deferred: u64,
    pub acceptance_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HealthSummary {
    pub score: u32,
    pub rating: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TrendDirection {
    New,
    Resolved,
    Worsening,
    Improving,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::New => "new",
            TrendDirection::Resolved => "resolved",
            TrendDirection::Worsening => "worsening",
            TrendDirection::Improving => "improving",
            TrendDirection::Stable => "stable",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalTrend {
    pub signal_id: String,
    pub previous_affected: u64,
    pub current_affected: u64,
    pub previous_fraction: f64,
    pub current_fraction: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendBlock {
    pub previous_generated_at: DateTime<Utc>,
    pub total_delta: i64,
    pub signals: Vec<SignalTrend>,
}

impl TrendBlock {
    pub fn direction_for(&self, signal_id: &str) -> Option<TrendDirection> {
        self.signals
            .iter()
            .find(|trend| trend.signal_id == signal_id)
            .map(|trend| trend.direction)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentTypeStats {
    pub runs: u64,
    pub outcomes: BTreeMap<String, u64>,
    pub crash_rate: f64,
    pub mean_duration_seconds: f64,
    pub spellings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSnapshot {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub corpus_digest: String,
    pub trace_stats: TraceStats,
    pub artifact_completeness: ArtifactCompleteness,
    pub self_metrics: SelfMetrics,
    pub health: HealthSummary,
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub trends: Option<TrendBlock>,
    #[serde(default)]
    pub agent_types: BTreeMap<String, AgentTypeStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatrixRow {
    pub suggestion_id: String,
    pub signal_id: String,
    pub title: String,
    pub status: SuggestionStatus,
    pub priority_score: f64,
    pub batch: String,
    pub effort: EffortTier,
    pub files: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub unlocks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub label: String,
    pub members: Vec<String>,
    pub files: Vec<String>,
    pub effort: EffortTier,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EffortBuckets {
    pub quick_win: Vec<String>,
    pub moderate: Vec<String>,
    pub deep: Vec<String>,
}

impl EffortBuckets {
    pub fn bucket(&self, tier: EffortTier) -> &[String] {
        match tier {
            EffortTier::QuickWin => &self.quick_win,
            EffortTier::Moderate => &self.moderate,
            EffortTier::Deep => &self.deep,
        }
    }

    pub fn push(&mut self, tier: EffortTier, signal_id: String) {
        match tier {
            EffortTier::QuickWin => self.quick_win.push(signal_id),
            EffortTier::Moderate => self.moderate.push(signal_id),
            EffortTier::Deep => self.deep.push(signal_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonMatrix {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<MatrixRow>,
    pub batches: Vec<Batch>,
    pub effort_buckets: EffortBuckets,
}
