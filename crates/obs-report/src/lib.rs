//! Markdown rendering of one analysis run.
//!
//! Rendering reads only its inputs: the date comes from the snapshot, so the
//! same snapshot, matrix and state always render the same document.

use obs_core::snapshot::{AnalysisSnapshot, ComparisonMatrix, MatrixRow, TrendDirection};
use obs_core::suggestion::{EffortTier, SuggestionState};
use obs_core::{percent, Severity};
use std::collections::BTreeSet;

pub const SECTION_TITLES: [&str; 8] = [
    "System Health Summary",
    "Signal Landscape",
    "Batch Analysis",
    "Dependency Map",
    "Effort Buckets",
    "Deferred / Backlog",
    "Self-Metrics",
    "Agent-Type Breakdown",
];

const BAR_WIDTH: usize = 10;

pub fn render_report(
    snapshot: &AnalysisSnapshot,
    matrix: &ComparisonMatrix,
    state: &SuggestionState,
) -> String {
    let mut out = String::new();
    out.push_str("# Observatory Report\n");
    out.push_str(&format!(
        "**Date:** {} | **Health: {}/100** | **Rating: {}**\n\n",
        snapshot.generated_at.format("%Y-%m-%d"),
        snapshot.health.score,
        snapshot.health.rating
    ));

    render_health(&mut out, snapshot);
    render_landscape(&mut out, snapshot);
    render_batches(&mut out, matrix);
    render_dependencies(&mut out, matrix);
    render_effort(&mut out, matrix);
    render_backlog(&mut out, state);
    render_self_metrics(&mut out, snapshot, state);
    render_agent_types(&mut out, snapshot);
    out
}

/// `score` out of 100 as a fixed-width block bar.
pub fn score_bar(score: f64) -> String {
    let clamped = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
    let filled = ((clamped / 100.0) * BAR_WIDTH as f64).round() as usize;
    let mut bar = "\u{2588}".repeat(filled);
    bar.push_str(&"\u{2591}".repeat(BAR_WIDTH - filled));
    bar
}

fn heading(out: &mut String, index: usize) {
    out.push_str(&format!("## {}\n\n", SECTION_TITLES[index]));
}

fn placeholder(out: &mut String, text: &str) {
    out.push_str(&format!("_{text}_\n\n"));
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn render_health(out: &mut String, snapshot: &AnalysisSnapshot) {
    heading(out, 0);
    let stats = &snapshot.trace_stats;
    if stats.total == 0 && snapshot.signals.is_empty() {
        placeholder(out, "No trace records were found. Every metric below is zero.");
    }
    out.push_str(&format!(
        "- Health: {}/100 {} {}\n",
        snapshot.health.score,
        score_bar(f64::from(snapshot.health.score)),
        snapshot.health.rating
    ));
    out.push_str(&format!(
        "- Trace records analysed: {} (malformed lines skipped: {})\n",
        stats.total, stats.skipped_malformed
    ));
    let count = |severity: Severity| {
        snapshot
            .signals
            .iter()
            .filter(|signal| signal.severity == severity)
            .count()
    };
    out.push_str(&format!(
        "- Active signals: {} (high {}, medium {}, low {})\n",
        snapshot.signals.len(),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low)
    ));
    let artifacts = &snapshot.artifact_completeness;
    out.push_str(&format!(
        "- Artifact completeness: {} ({}/{} runs)\n",
        percent(artifacts.completeness_rate),
        artifacts.complete,
        artifacts.runs_checked
    ));
    if stats.total > 0 {
        out.push_str(&format!(
            "- Durations: min {}s, max {}s, mean {:.1}s, non-positive {}\n",
            stats.duration.min_seconds,
            stats.duration.max_seconds,
            stats.duration.mean_seconds,
            stats.duration.non_positive
        ));
    }
    match &snapshot.trends {
        Some(trends) => out.push_str(&format!(
            "- Since {}: {:+} records\n",
            trends.previous_generated_at.format("%Y-%m-%d %H:%M UTC"),
            trends.total_delta
        )),
        None => out.push_str("- First run: no previous snapshot to compare\n"),
    }
    out.push('\n');
}

fn render_landscape(out: &mut String, snapshot: &AnalysisSnapshot) {
    heading(out, 1);
    if snapshot.signals.is_empty() {
        placeholder(out, "No active signals. The trace corpus looks clean.");
    } else {
        out.push_str("| Signal | Category | Severity | Affected | Share | Trend |\n");
        out.push_str("|--------|----------|----------|----------|-------|-------|\n");
        for signal in &snapshot.signals {
            let fraction = signal.evidence.fraction();
            let trend = snapshot
                .trends
                .as_ref()
                .and_then(|trends| trends.direction_for(&signal.id))
                .map(|direction| direction.as_str())
                .unwrap_or("-");
            out.push_str(&format!(
                "| `{}` | {} | {} | {} | {} {} | {} |\n",
                signal.id,
                signal.category.as_str(),
                signal.severity.as_str(),
                signal.evidence.ratio_label(),
                score_bar(fraction * 100.0),
                percent(fraction),
                trend
            ));
        }
        out.push('\n');
    }

    let resolved = snapshot
        .trends
        .iter()
        .flat_map(|trends| trends.signals.iter())
        .filter(|trend| trend.direction == TrendDirection::Resolved)
        .map(|trend| format!("`{}`", trend.signal_id))
        .collect::<Vec<_>>();
    if !resolved.is_empty() {
        out.push_str(&format!("Cleared since the last run: {}\n\n", resolved.join(", ")));
    }
}

fn row_for<'a>(matrix: &'a ComparisonMatrix, signal_id: &str) -> Option<&'a MatrixRow> {
    matrix.rows.iter().find(|row| row.signal_id == signal_id)
}

fn render_batches(out: &mut String, matrix: &ComparisonMatrix) {
    heading(out, 2);
    if matrix.batches.is_empty() {
        placeholder(out, "No active suggestions to batch.");
        return;
    }
    for batch in &matrix.batches {
        out.push_str(&format!(
            "### Batch {} ({}, {} suggestion{})\n\n",
            batch.label,
            batch.effort,
            batch.members.len(),
            if batch.members.len() == 1 { "" } else { "s" }
        ));
        for member in &batch.members {
            match row_for(matrix, member) {
                Some(row) => out.push_str(&format!(
                    "- {} `{}`: {} (priority {:.3}, {})\n",
                    row.suggestion_id,
                    row.signal_id,
                    cell(&row.title),
                    row.priority_score,
                    row.status
                )),
                None => out.push_str(&format!("- `{member}`\n")),
            }
        }
        if !batch.files.is_empty() {
            let files = batch
                .files
                .iter()
                .map(|file| format!("`{file}`"))
                .collect::<Vec<_>>();
            out.push_str(&format!("- Shared files: {}\n", files.join(", ")));
        }
        out.push('\n');
    }
}

fn render_dependencies(out: &mut String, matrix: &ComparisonMatrix) {
    heading(out, 3);
    let active = matrix
        .rows
        .iter()
        .map(|row| row.signal_id.as_str())
        .collect::<BTreeSet<_>>();
    let mut lines = Vec::new();
    for row in &matrix.rows {
        if row.unlocks.is_empty() {
            continue;
        }
        let targets = row
            .unlocks
            .iter()
            .map(|target| {
                if active.contains(target.as_str()) {
                    format!("`{target}`")
                } else {
                    format!("`{target}` (inactive)")
                }
            })
            .collect::<Vec<_>>();
        lines.push(format!(
            "- `{}` ({}) unlocks {}\n",
            row.signal_id,
            row.suggestion_id,
            targets.join(", ")
        ));
    }
    if lines.is_empty() {
        placeholder(out, "No dependencies between active suggestions.");
        return;
    }
    for line in lines {
        out.push_str(&line);
    }
    out.push('\n');
}

fn render_effort(out: &mut String, matrix: &ComparisonMatrix) {
    heading(out, 4);
    let buckets = &matrix.effort_buckets;
    if EffortTier::ALL
        .iter()
        .all(|tier| buckets.bucket(*tier).is_empty())
    {
        placeholder(out, "No active suggestions.");
        return;
    }
    out.push_str("| Tier | Count | Signals |\n");
    out.push_str("|------|-------|---------|\n");
    for tier in EffortTier::ALL {
        let members = buckets.bucket(tier);
        let names = members
            .iter()
            .map(|id| format!("`{id}`"))
            .collect::<Vec<_>>();
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            tier,
            members.len(),
            if names.is_empty() {
                "-".to_string()
            } else {
                names.join(", ")
            }
        ));
    }
    out.push('\n');
}

fn render_backlog(out: &mut String, state: &SuggestionState) {
    heading(out, 5);
    if state.deferred.is_empty() {
        placeholder(out, "Nothing is deferred.");
        return;
    }
    let mut entries = state.deferred.iter().collect::<Vec<_>>();
    entries.sort_by(|left, right| left.suggestion_id.cmp(&right.suggestion_id));

    out.push_str("| Suggestion | Signal | Reason | Reassess after | Condition | Priority at deferral |\n");
    out.push_str("|------------|--------|--------|----------------|-----------|----------------------|\n");
    for entry in entries {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.3} |\n",
            entry.suggestion_id,
            if entry.signal_id.is_empty() {
                "-".to_string()
            } else {
                format!("`{}`", entry.signal_id)
            },
            entry.reason,
            entry
                .reassess_after
                .map(|after| after.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "manual".to_string()),
            entry
                .reassess_condition
                .as_deref()
                .map(cell)
                .unwrap_or_else(|| "-".to_string()),
            entry.priority_at_deferral
        ));
    }
    out.push('\n');
}

fn render_self_metrics(out: &mut String, snapshot: &AnalysisSnapshot, state: &SuggestionState) {
    heading(out, 6);
    let metrics = &snapshot.self_metrics;
    if metrics.suggestions_made == 0 {
        placeholder(out, "No suggestions have been made yet.");
    } else {
        out.push_str(&format!("- Suggestions made: {}\n", metrics.suggestions_made));
        out.push_str(&format!(
            "- Proposed {} / implemented {} / rejected {} / deferred {}\n",
            metrics.proposed, metrics.implemented, metrics.rejected, metrics.deferred
        ));
        out.push_str(&format!(
            "- Acceptance rate: {}\n",
            percent(metrics.acceptance_rate)
        ));
    }
    match state.pending.as_deref() {
        Some(id) => {
            let title = state
                .suggestions
                .get(id)
                .map(|summary| cell(&summary.title))
                .unwrap_or_default();
            out.push_str(&format!("- Next up: {id} {title}\n\n"));
        }
        None => out.push_str("- Next up: none\n\n"),
    }
}

fn render_agent_types(out: &mut String, snapshot: &AnalysisSnapshot) {
    heading(out, 7);
    if snapshot.agent_types.is_empty() {
        placeholder(out, "No agent runs recorded.");
        return;
    }
    out.push_str("| Agent type | Runs | Crash rate | Mean duration | Spellings |\n");
    out.push_str("|------------|------|------------|---------------|-----------|\n");
    for (agent, stats) in &snapshot.agent_types {
        out.push_str(&format!(
            "| {} | {} | {} | {:.1}s | {} |\n",
            cell(agent),
            stats.runs,
            percent(stats.crash_rate),
            stats.mean_duration_seconds,
            cell(&stats.spellings.join(", "))
        ));
    }
    out.push('\n');
}
