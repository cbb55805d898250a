use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub const STATE_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionStatus {
    Proposed,
    Implemented,
    Rejected,
    Deferred,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Proposed => "proposed",
            SuggestionStatus::Implemented => "implemented",
            SuggestionStatus::Rejected => "rejected",
            SuggestionStatus::Deferred => "deferred",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SuggestionStatus::Implemented | SuggestionStatus::Rejected
        )
    }

    /// Lifecycle edges: proposed may go anywhere, deferred may only come back
    /// to proposed or be rejected, terminal states never move.
    pub fn can_transition_to(&self, next: SuggestionStatus) -> bool {
        match (self, next) {
            (SuggestionStatus::Proposed, SuggestionStatus::Proposed) => false,
            (SuggestionStatus::Proposed, _) => true,
            (SuggestionStatus::Deferred, SuggestionStatus::Proposed)
            | (SuggestionStatus::Deferred, SuggestionStatus::Rejected) => true,
            (SuggestionStatus::Deferred, _) => false,
            (SuggestionStatus::Implemented, _) | (SuggestionStatus::Rejected, _) => false,
        }
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "proposed" => Ok(SuggestionStatus::Proposed),
            "implemented" | "done" => Ok(SuggestionStatus::Implemented),
            "rejected" => Ok(SuggestionStatus::Rejected),
            "deferred" => Ok(SuggestionStatus::Deferred),
            other => Err(format!("Unknown suggestion status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DeferReason {
    Dependency,
    User,
    LowValue,
    /// Upgraded from a bare id in a version 1 store; waits for a human to add context.
    Legacy,
}

impl DeferReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeferReason::Dependency => "dependency",
            DeferReason::User => "user",
            DeferReason::LowValue => "low-value",
            DeferReason::Legacy => "legacy",
        }
    }
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeferReason {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "dependency" => Ok(DeferReason::Dependency),
            "user" => Ok(DeferReason::User),
            "low-value" | "low_value" | "lowvalue" => Ok(DeferReason::LowValue),
            "legacy" => Ok(DeferReason::Legacy),
            other => Err(format!("Unknown defer reason: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeferredEntry {
    pub suggestion_id: String,
    #[serde(default)]
    pub signal_id: String,
    pub reason: DeferReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reassess_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reassess_condition: Option<String>,
    #[serde(default)]
    pub priority_at_deferral: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred_at: Option<DateTime<Utc>>,
}

impl DeferredEntry {
    /// Only the date is machine-checked; the condition text is advisory.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.reassess_after {
            Some(after) => after <= now,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EffortTier {
    QuickWin,
    Moderate,
    Deep,
}

impl EffortTier {
    pub const ALL: [EffortTier; 3] = [EffortTier::QuickWin, EffortTier::Moderate, EffortTier::Deep];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffortTier::QuickWin => "quick-win",
            EffortTier::Moderate => "moderate",
            EffortTier::Deep => "deep",
        }
    }
}

impl fmt::Display for EffortTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImplementationPointer {
    pub files: Vec<String>,
    pub approach: String,
    pub test_strategy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub id: String,
    pub status: SuggestionStatus,
    pub signal_id: String,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub implementation: ImplementationPointer,
    pub priority_score: f64,
    pub batch: String,
    pub effort: EffortTier,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub unlocks: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestionSummary {
    #[serde(default)]
    pub signal_id: String,
    pub status: SuggestionStatus,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub priority: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestionState {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
    #[serde(default = "default_next_sequence")]
    pub next_sequence: u32,
    #[serde(default)]
    pub signal_index: BTreeMap<String, String>,
    #[serde(default)]
    pub suggestions: BTreeMap<String, SuggestionSummary>,
    #[serde(default)]
    pub deferred: Vec<DeferredEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

fn default_next_sequence() -> u32 {
    1
}

impl Default for SuggestionState {
    fn default() -> Self {
        Self {
            version: STATE_SCHEMA_VERSION,
            pending: None,
            next_sequence: default_next_sequence(),
            signal_index: BTreeMap::new(),
            suggestions: BTreeMap::new(),
            deferred: Vec::new(),
            last_run: None,
        }
    }
}

impl SuggestionState {
    pub fn status_of(&self, id: &str) -> Option<SuggestionStatus> {
        self.suggestions.get(id).map(|summary| summary.status)
    }

    pub fn suggestion_for_signal(&self, signal_id: &str) -> Option<&str> {
        self.signal_index.get(signal_id).map(String::as_str)
    }

    /// Signal ids whose suggestion reached a terminal status, found through
    /// either the summary or the signal index.
    pub fn resolved_signals(&self) -> Vec<String> {
        let from_summaries = self
            .suggestions
            .values()
            .filter(|summary| summary.status.is_terminal() && !summary.signal_id.is_empty())
            .map(|summary| summary.signal_id.clone());
        let from_index = self
            .signal_index
            .iter()
            .filter(|(_, id)| self.status_of(id).is_some_and(|status| status.is_terminal()))
            .map(|(signal_id, _)| signal_id.clone());
        from_summaries
            .chain(from_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn count(&self, status: SuggestionStatus) -> usize {
        self.suggestions
            .values()
            .filter(|summary| summary.status == status)
            .count()
    }

    pub fn deferred_entry(&self, id: &str) -> Option<&DeferredEntry> {
        self.deferred.iter().find(|entry| entry.suggestion_id == id)
    }
}

pub fn format_suggestion_id(sequence: u32) -> String {
    format!("SUG-{sequence:03}")
}
