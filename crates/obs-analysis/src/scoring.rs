use obs_core::catalog;
use obs_core::suggestion::ImplementationPointer;
use obs_core::{Severity, Signal, SignalCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Multiplicative boost for a signal whose fix unlocks another active signal.
pub const UNLOCK_BOOST: f64 = 0.15;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeverityWeights {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            high: 1.0,
            medium: 0.6,
            low: 0.3,
        }
    }
}

/// How much a category's detectors are trusted. Kept at or below 0.85 so that
/// `0.85 * (1 + UNLOCK_BOOST)` stays under 1 and the clamp never eats the boost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryConfidence {
    pub trace_infrastructure: f64,
    pub workflow_compliance: f64,
    pub data_quality: f64,
    pub trace_completeness: f64,
    pub agent_performance: f64,
}

impl Default for CategoryConfidence {
    fn default() -> Self {
        Self {
            trace_infrastructure: 0.85,
            workflow_compliance: 0.80,
            data_quality: 0.75,
            trace_completeness: 0.70,
            agent_performance: 0.60,
        }
    }
}

impl CategoryConfidence {
    pub fn factor(&self, category: SignalCategory) -> f64 {
        match category {
            SignalCategory::TraceInfrastructure => self.trace_infrastructure,
            SignalCategory::WorkflowCompliance => self.workflow_compliance,
            SignalCategory::DataQuality => self.data_quality,
            SignalCategory::TraceCompleteness => self.trace_completeness,
            SignalCategory::AgentPerformance => self.agent_performance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub severity_weights: SeverityWeights,
    pub category_confidence: CategoryConfidence,
    pub unlock_boost: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            severity_weights: SeverityWeights::default(),
            category_confidence: CategoryConfidence::default(),
            unlock_boost: UNLOCK_BOOST,
        }
    }
}

impl ScoringConfig {
    pub fn severity_weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.severity_weights.high,
            Severity::Medium => self.severity_weights.medium,
            Severity::Low => self.severity_weights.low,
        }
    }
}

/// A scored, not yet persisted suggestion for one active signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionDraft {
    pub signal_id: String,
    pub category: SignalCategory,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub implementation: ImplementationPointer,
    pub base_score: f64,
    pub priority_score: f64,
    pub boosted: bool,
    pub depends_on: Vec<String>,
    pub unlocks: Vec<String>,
}

pub fn base_score(signal: &Signal, corpus_size: u64, config: &ScoringConfig) -> f64 {
    let denominator = if signal.evidence.total > 0 {
        signal.evidence.total
    } else {
        corpus_size
    };
    let fraction = if denominator == 0 {
        0.0
    } else {
        (signal.evidence.affected as f64 / denominator as f64).clamp(0.0, 1.0)
    };
    config.severity_weight(signal.severity)
        * fraction
        * config.category_confidence.factor(signal.category)
}

/// Scores every signal not already resolved. Recomputed from scratch on each
/// call; output is ordered by score with ties kept in discovery order.
pub fn score_signals(
    signals: &[Signal],
    corpus_size: u64,
    resolved: &BTreeSet<String>,
    config: &ScoringConfig,
) -> Vec<SuggestionDraft> {
    let active = signals
        .iter()
        .filter(|signal| !resolved.contains(&signal.id))
        .collect::<Vec<_>>();
    let active_ids = active
        .iter()
        .map(|signal| signal.id.as_str())
        .collect::<BTreeSet<_>>();

    let mut drafts = Vec::with_capacity(active.len());
    for signal in active {
        let base = base_score(signal, corpus_size, config);
        let boosted = signal
            .unlocks
            .iter()
            .any(|target| target != &signal.id && active_ids.contains(target.as_str()));
        let raw = if boosted {
            base * (1.0 + config.unlock_boost)
        } else {
            base
        };
        let priority_score = clamp_unit(raw);
        debug!(
            event = "signal_scored",
            signal = %signal.id,
            base,
            boosted,
            priority_score
        );

        let entry = catalog::lookup(&signal.id);
        drafts.push(SuggestionDraft {
            signal_id: signal.id.clone(),
            category: signal.category,
            severity: signal.severity,
            title: entry
                .map(|entry| entry.title.to_string())
                .unwrap_or_else(|| signal.id.clone()),
            description: signal.description.clone(),
            impact: entry.map(|entry| entry.impact.to_string()).unwrap_or_default(),
            implementation: ImplementationPointer {
                files: entry
                    .map(|entry| entry.files.iter().map(|file| file.to_string()).collect())
                    .unwrap_or_default(),
                approach: entry
                    .map(|entry| entry.approach.to_string())
                    .unwrap_or_default(),
                test_strategy: entry
                    .map(|entry| entry.test_strategy.to_string())
                    .unwrap_or_default(),
            },
            base_score: base,
            priority_score,
            boosted,
            depends_on: catalog::depends_on(&signal.id)
                .into_iter()
                .map(str::to_string)
                .collect(),
            unlocks: signal.unlocks.clone(),
        });
    }

    drafts.sort_by(|left, right| right.priority_score.total_cmp(&left.priority_score));
    drafts
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
