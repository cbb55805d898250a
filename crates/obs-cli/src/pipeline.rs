use crate::config::Settings;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use obs_analysis::{build_snapshot, cluster, detect, score_signals};
use obs_core::snapshot::{ComparisonMatrix, HealthSummary, MatrixRow};
use obs_core::suggestion::{Suggestion, SuggestionStatus};
use obs_corpus::CorpusReader;
use obs_report::render_report;
use obs_store::{OutputStore, SuggestionLedger};
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub records: usize,
    pub skipped_lines: usize,
    pub signals: usize,
    pub active_suggestions: usize,
    pub batches: usize,
    pub resurfaced: Vec<String>,
    pub health: HealthSummary,
    pub pending: Option<String>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analyzed {} records ({} skipped): {} signals, {} active suggestions in {} batches, health {}/100 ({})",
            self.records,
            self.skipped_lines,
            self.signals,
            self.active_suggestions,
            self.batches,
            self.health.score,
            self.health.rating
        )?;
        if !self.resurfaced.is_empty() {
            write!(f, ", resurfaced {}", self.resurfaced.join(", "))?;
        }
        match &self.pending {
            Some(id) => write!(f, ", next {id}"),
            None => Ok(()),
        }
    }
}

/// One full analysis pass over the trace corpus. Every output is rewritten
/// from this run's data; any write failure aborts the run.
pub fn run_analysis(settings: &Settings, now: DateTime<Utc>) -> Result<RunSummary> {
    let mut ledger = SuggestionLedger::open(&settings.state_dir).with_context(|| {
        format!(
            "Failed to open suggestion state in {}",
            settings.state_dir.display()
        )
    })?;
    let resurfaced = ledger
        .auto_resurface(now)
        .context("Failed to resurface deferred suggestions")?;

    let corpus = CorpusReader::new(&settings.traces_dir)
        .read(now)
        .with_context(|| format!("Failed to read traces from {}", settings.traces_dir.display()))?;
    let signals = detect(&corpus, &settings.thresholds);

    let outputs = OutputStore::new(&settings.state_dir);
    let previous = outputs
        .load_snapshot()
        .context("Failed to load previous snapshot")?;
    let mut snapshot = build_snapshot(
        &corpus,
        &signals,
        ledger.self_metrics(),
        previous.as_ref(),
        now,
        &settings.thresholds.required_artifacts,
    )
    .context("Failed to build analysis snapshot")?;

    let resolved = ledger
        .state()
        .resolved_signals()
        .into_iter()
        .collect::<BTreeSet<_>>();
    let drafts = score_signals(
        &signals,
        corpus.records.len() as u64,
        &resolved,
        &settings.scoring,
    );
    let clustering = cluster(&drafts);

    let mut rows = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.iter().enumerate() {
        let id = ledger
            .propose(&draft.signal_id, &draft.title, draft.priority_score, now)
            .with_context(|| format!("Failed to record suggestion for {}", draft.signal_id))?;
        let status = ledger
            .state()
            .status_of(&id)
            .unwrap_or(SuggestionStatus::Proposed);
        let suggestion = Suggestion {
            id: id.clone(),
            status,
            signal_id: draft.signal_id.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            impact: draft.impact.clone(),
            implementation: draft.implementation.clone(),
            priority_score: draft.priority_score,
            batch: clustering.labels[index].clone(),
            effort: clustering.efforts[index],
            depends_on: draft.depends_on.clone(),
            unlocks: draft.unlocks.clone(),
            updated_at: now,
        };
        outputs
            .write_suggestion(&suggestion)
            .with_context(|| format!("Failed to write suggestion {id}"))?;
        rows.push(MatrixRow {
            suggestion_id: id,
            signal_id: suggestion.signal_id,
            title: suggestion.title,
            status,
            priority_score: suggestion.priority_score,
            batch: suggestion.batch,
            effort: suggestion.effort,
            files: suggestion.implementation.files,
            depends_on: suggestion.depends_on,
            unlocks: suggestion.unlocks,
        });
    }

    ledger.refresh_pending();
    ledger
        .record_run(
            now,
            format!(
                "records={} signals={} active={}",
                corpus.records.len(),
                signals.len(),
                rows.len()
            ),
        )
        .context("Failed to save suggestion state")?;

    // Counts include the suggestions this run just proposed.
    snapshot.self_metrics = ledger.self_metrics();
    outputs
        .publish_snapshot(&snapshot)
        .context("Failed to write analysis snapshot")?;

    let matrix = ComparisonMatrix {
        generated_at: now,
        rows,
        batches: clustering.batches,
        effort_buckets: clustering.effort_buckets,
    };
    outputs
        .write_matrix(&matrix)
        .context("Failed to write comparison matrix")?;
    outputs
        .write_report(&render_report(&snapshot, &matrix, ledger.state()))
        .context("Failed to write report")?;

    let summary = RunSummary {
        generated_at: now,
        records: corpus.records.len(),
        skipped_lines: corpus.skipped_lines,
        signals: signals.len(),
        active_suggestions: matrix.rows.len(),
        batches: matrix.batches.len(),
        resurfaced,
        health: snapshot.health,
        pending: ledger.get_pending().map(str::to_string),
    };
    info!(
        event = "analysis_complete",
        records = summary.records,
        signals = summary.signals,
        active = summary.active_suggestions,
        health = summary.health.score
    );
    Ok(summary)
}

/// Re-renders `report.md` from what the last analysis stored.
pub fn rerender_report(settings: &Settings) -> Result<String> {
    let ledger = SuggestionLedger::open(&settings.state_dir).with_context(|| {
        format!(
            "Failed to open suggestion state in {}",
            settings.state_dir.display()
        )
    })?;
    let outputs = OutputStore::new(&settings.state_dir);
    let snapshot = outputs
        .load_snapshot()
        .context("Failed to load analysis snapshot")?
        .with_context(|| {
            format!(
                "No analysis snapshot in {}; run `observatory analyze` first",
                settings.state_dir.display()
            )
        })?;
    let matrix = outputs
        .load_matrix()
        .context("Failed to load comparison matrix")?
        .with_context(|| {
            format!(
                "No comparison matrix in {}; run `observatory analyze` first",
                settings.state_dir.display()
            )
        })?;
    let report = render_report(&snapshot, &matrix, ledger.state());
    outputs
        .write_report(&report)
        .context("Failed to write report")?;
    Ok(report)
}
