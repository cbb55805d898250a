pub mod catalog;
pub mod snapshot;
pub mod suggestion;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceRecord {
    pub trace_id: String,
    #[serde(alias = "role")]
    pub agent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(alias = "duration")]
    pub duration_seconds: i64,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub outcome: TraceOutcome,
    #[serde(default)]
    pub test_result: TestResult,
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub proof_status: ProofStatus,
}

fn default_branch() -> String {
    UNKNOWN_BRANCH.to_string()
}

/// Branch value written upstream when git detection failed.
pub const UNKNOWN_BRANCH: &str = "unknown";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TraceOutcome {
    Success,
    Partial,
    Crashed,
    Failure,
}

impl TraceOutcome {
    pub const ALL: [TraceOutcome; 4] = [
        TraceOutcome::Success,
        TraceOutcome::Partial,
        TraceOutcome::Crashed,
        TraceOutcome::Failure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TraceOutcome::Success => "success",
            TraceOutcome::Partial => "partial",
            TraceOutcome::Crashed => "crashed",
            TraceOutcome::Failure => "failure",
        }
    }

    /// Unrecognised upstream vocabulary lands in the catch-all `partial` bucket.
    pub fn parse_lenient(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "success" | "succeeded" | "completed" | "ok" => TraceOutcome::Success,
            "crashed" | "crash" => TraceOutcome::Crashed,
            "failure" | "failed" | "fail" | "error" => TraceOutcome::Failure,
            _ => TraceOutcome::Partial,
        }
    }
}

impl fmt::Display for TraceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TraceOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TraceOutcome::parse_lenient(&raw))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Pass,
    Fail,
    #[default]
    Unknown,
}

impl TestResult {
    pub const ALL: [TestResult; 3] = [TestResult::Pass, TestResult::Fail, TestResult::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Pass => "pass",
            TestResult::Fail => "fail",
            TestResult::Unknown => "unknown",
        }
    }

    pub fn parse_lenient(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "pass" | "passed" => TestResult::Pass,
            "fail" | "failed" => TestResult::Fail,
            _ => TestResult::Unknown,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TestResult::parse_lenient(&raw))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    #[default]
    Unknown,
    Pending,
    Verified,
}

impl ProofStatus {
    pub const ALL: [ProofStatus; 3] = [
        ProofStatus::Unknown,
        ProofStatus::Pending,
        ProofStatus::Verified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProofStatus::Unknown => "unknown",
            ProofStatus::Pending => "pending",
            ProofStatus::Verified => "verified",
        }
    }

    pub fn parse_lenient(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "pending" => ProofStatus::Pending,
            "verified" => ProofStatus::Verified,
            _ => ProofStatus::Unknown,
        }
    }
}

impl fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProofStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ProofStatus::parse_lenient(&raw))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SignalCategory {
    DataQuality,
    WorkflowCompliance,
    AgentPerformance,
    TraceInfrastructure,
    TraceCompleteness,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 5] = [
        SignalCategory::DataQuality,
        SignalCategory::WorkflowCompliance,
        SignalCategory::AgentPerformance,
        SignalCategory::TraceInfrastructure,
        SignalCategory::TraceCompleteness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::DataQuality => "data-quality",
            SignalCategory::WorkflowCompliance => "workflow-compliance",
            SignalCategory::AgentPerformance => "agent-performance",
            SignalCategory::TraceInfrastructure => "trace-infrastructure",
            SignalCategory::TraceCompleteness => "trace-completeness",
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalCategory {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace('_', "-");
        SignalCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| format!("Unknown signal category: {input}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Severity implied by the share of the corpus a signal touches.
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction >= 0.5 {
            Severity::High
        } else if fraction >= 0.1 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("Unknown severity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Evidence {
    pub affected: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl Evidence {
    pub fn new(affected: u64, total: u64) -> Self {
        Self {
            affected,
            total,
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Share of the denominator affected; zero when there is no denominator.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.affected as f64 / self.total as f64
    }

    pub fn ratio_label(&self) -> String {
        format!("{}/{}", self.affected, self.total)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub id: String,
    pub category: SignalCategory,
    pub severity: Severity,
    pub description: String,
    pub evidence: Evidence,
    pub root_cause: String,
    #[serde(default)]
    pub unlocks: Vec<String>,
}

pub fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Hex sha256 over the canonical JSON rendering of `value`. `serde_json` maps are
/// key-ordered without the `preserve_order` feature, so the rendering is stable.
pub fn canonical_digest<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let rendered = serde_json::to_string(&serde_json::to_value(value)?)?;
    let digest = Sha256::digest(rendered.as_bytes());
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}
