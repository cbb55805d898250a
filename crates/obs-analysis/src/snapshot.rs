use crate::AnalysisError;
use chrono::{DateTime, Utc};
use obs_core::snapshot::{
    AgentTypeStats, AnalysisSnapshot, ArtifactCompleteness, DurationSummary, HealthSummary,
    SelfMetrics, SignalTrend, TraceStats, TrendBlock, TrendDirection, SNAPSHOT_SCHEMA_VERSION,
};
use obs_core::{canonical_digest, ProofStatus, Severity, Signal, TestResult, TraceOutcome};
use obs_corpus::Corpus;
use std::collections::{BTreeMap, BTreeSet};

/// Fraction change below this is reported as stable.
const TREND_EPSILON: f64 = 0.01;

const HEALTH_PENALTY_HIGH: u32 = 20;
const HEALTH_PENALTY_MEDIUM: u32 = 10;
const HEALTH_PENALTY_LOW: u32 = 4;

const RATING_THRESHOLDS: &[(u32, &str)] = &[
    (90, "Exemplary"),
    (70, "Healthy"),
    (50, "Needs Work"),
    (30, "At Risk"),
    (0, "Critical"),
];

pub fn build_snapshot(
    corpus: &Corpus,
    signals: &[Signal],
    self_metrics: SelfMetrics,
    previous: Option<&AnalysisSnapshot>,
    generated_at: DateTime<Utc>,
    required_artifacts: &[String],
) -> Result<AnalysisSnapshot, AnalysisError> {
    let trace_stats = trace_stats(corpus);
    let trends = previous.map(|previous| trends(previous, signals, trace_stats.total));

    Ok(AnalysisSnapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        generated_at,
        corpus_digest: canonical_digest(&corpus.records)?,
        artifact_completeness: artifact_completeness(corpus, required_artifacts),
        self_metrics,
        health: health_for(signals),
        signals: signals.to_vec(),
        trends,
        agent_types: agent_type_breakdown(corpus),
        trace_stats,
    })
}

fn zeroed<I: IntoIterator<Item = &'static str>>(keys: I) -> BTreeMap<String, u64> {
    keys.into_iter().map(|key| (key.to_string(), 0)).collect()
}

fn trace_stats(corpus: &Corpus) -> TraceStats {
    let mut outcomes = zeroed(TraceOutcome::ALL.iter().map(TraceOutcome::as_str));
    let mut test_results = zeroed(TestResult::ALL.iter().map(TestResult::as_str));
    let mut proof_statuses = zeroed(ProofStatus::ALL.iter().map(ProofStatus::as_str));
    let mut branches = BTreeMap::<String, u64>::new();

    for record in &corpus.records {
        *outcomes.entry(record.outcome.as_str().to_string()).or_default() += 1;
        *test_results
            .entry(record.test_result.as_str().to_string())
            .or_default() += 1;
        *proof_statuses
            .entry(record.proof_status.as_str().to_string())
            .or_default() += 1;
        *branches.entry(record.branch.clone()).or_default() += 1;
    }

    let duration = if corpus.records.is_empty() {
        DurationSummary::default()
    } else {
        let values = corpus
            .records
            .iter()
            .map(|record| record.duration_seconds)
            .collect::<Vec<_>>();
        DurationSummary {
            min_seconds: values.iter().copied().min().unwrap_or(0),
            max_seconds: values.iter().copied().max().unwrap_or(0),
            mean_seconds: values.iter().sum::<i64>() as f64 / values.len() as f64,
            non_positive: values.iter().filter(|value| **value <= 0).count() as u64,
        }
    };

    TraceStats {
        total: corpus.records.len() as u64,
        skipped_malformed: corpus.skipped_lines as u64,
        outcomes,
        test_results,
        proof_statuses,
        branches,
        duration,
    }
}

fn artifact_completeness(corpus: &Corpus, required: &[String]) -> ArtifactCompleteness {
    let mut missing_by_artifact = required
        .iter()
        .map(|name| (name.clone(), 0))
        .collect::<BTreeMap<String, u64>>();
    let mut complete = 0u64;
    for run in &corpus.runs {
        let missing = run.missing(required);
        if missing.is_empty() {
            complete += 1;
        }
        for name in missing {
            *missing_by_artifact.entry(name.to_string()).or_default() += 1;
        }
    }
    let runs_checked = corpus.runs.len() as u64;
    ArtifactCompleteness {
        runs_checked,
        complete,
        incomplete: runs_checked - complete,
        missing_by_artifact,
        completeness_rate: if runs_checked == 0 {
            0.0
        } else {
            complete as f64 / runs_checked as f64
        },
    }
}

fn agent_type_breakdown(corpus: &Corpus) -> BTreeMap<String, AgentTypeStats> {
    let mut grouped = BTreeMap::<String, (AgentTypeStats, BTreeSet<String>, i64)>::new();
    for record in &corpus.records {
        let key = record.agent_type.trim().to_lowercase();
        let (stats, spellings, duration_sum) = grouped.entry(key).or_insert_with(|| {
            (
                AgentTypeStats {
                    outcomes: zeroed(TraceOutcome::ALL.iter().map(TraceOutcome::as_str)),
                    ..AgentTypeStats::default()
                },
                BTreeSet::new(),
                0,
            )
        });
        stats.runs += 1;
        *stats
            .outcomes
            .entry(record.outcome.as_str().to_string())
            .or_default() += 1;
        spellings.insert(record.agent_type.clone());
        *duration_sum += record.duration_seconds;
    }

    grouped
        .into_iter()
        .map(|(key, (mut stats, spellings, duration_sum))| {
            let crashed = stats
                .outcomes
                .get(TraceOutcome::Crashed.as_str())
                .copied()
                .unwrap_or(0);
            if stats.runs > 0 {
                stats.crash_rate = crashed as f64 / stats.runs as f64;
                stats.mean_duration_seconds = duration_sum as f64 / stats.runs as f64;
            }
            stats.spellings = spellings.into_iter().collect();
            (key, stats)
        })
        .collect()
}

pub fn health_for(signals: &[Signal]) -> HealthSummary {
    let penalty = signals
        .iter()
        .map(|signal| match signal.severity {
            Severity::High => HEALTH_PENALTY_HIGH,
            Severity::Medium => HEALTH_PENALTY_MEDIUM,
            Severity::Low => HEALTH_PENALTY_LOW,
        })
        .sum::<u32>();
    let score = 100u32.saturating_sub(penalty);
    HealthSummary {
        score,
        rating: rating_for(score).to_string(),
    }
}

pub fn rating_for(score: u32) -> &'static str {
    RATING_THRESHOLDS
        .iter()
        .find(|(threshold, _)| score >= *threshold)
        .map(|(_, label)| *label)
        .unwrap_or("Critical")
}

fn trends(previous: &AnalysisSnapshot, signals: &[Signal], total: u64) -> TrendBlock {
    let before = previous
        .signals
        .iter()
        .map(|signal| (signal.id.as_str(), signal))
        .collect::<BTreeMap<_, _>>();
    let now = signals
        .iter()
        .map(|signal| signal.id.as_str())
        .collect::<BTreeSet<_>>();

    let mut trends = Vec::new();
    for signal in signals {
        let current_fraction = signal.evidence.fraction();
        let trend = match before.get(signal.id.as_str()) {
            None => SignalTrend {
                signal_id: signal.id.clone(),
                previous_affected: 0,
                current_affected: signal.evidence.affected,
                previous_fraction: 0.0,
                current_fraction,
                direction: TrendDirection::New,
            },
            Some(prior) => {
                let previous_fraction = prior.evidence.fraction();
                let delta = current_fraction - previous_fraction;
                let direction = if delta > TREND_EPSILON {
                    TrendDirection::Worsening
                } else if delta < -TREND_EPSILON {
                    TrendDirection::Improving
                } else {
                    TrendDirection::Stable
                };
                SignalTrend {
                    signal_id: signal.id.clone(),
                    previous_affected: prior.evidence.affected,
                    current_affected: signal.evidence.affected,
                    previous_fraction,
                    current_fraction,
                    direction,
                }
            }
        };
        trends.push(trend);
    }
    for prior in &previous.signals {
        if now.contains(prior.id.as_str()) {
            continue;
        }
        trends.push(SignalTrend {
            signal_id: prior.id.clone(),
            previous_affected: prior.evidence.affected,
            current_affected: 0,
            previous_fraction: prior.evidence.fraction(),
            current_fraction: 0.0,
            direction: TrendDirection::Resolved,
        });
    }

    TrendBlock {
        previous_generated_at: previous.generated_at,
        total_delta: total as i64 - previous.trace_stats.total as i64,
        signals: trends,
    }
}
