use crate::config::Settings;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use obs_core::suggestion::{DeferReason, SuggestionStatus};
use obs_store::{OutputStore, SuggestionLedger};

fn open_ledger(settings: &Settings) -> Result<SuggestionLedger> {
    SuggestionLedger::open(&settings.state_dir).with_context(|| {
        format!(
            "Failed to open suggestion state in {}",
            settings.state_dir.display()
        )
    })
}

/// Accepts an RFC 3339 timestamp or a relative `<N>d` offset from `now`.
pub fn parse_reassess_after(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Some(days) = trimmed.strip_suffix('d') {
        let days: i64 = days
            .parse()
            .with_context(|| format!("Invalid day offset: {trimmed}"))?;
        if days < 0 {
            bail!("Day offset must not be negative: {trimmed}");
        }
        return Duration::try_days(days)
            .and_then(|offset| now.checked_add_signed(offset))
            .with_context(|| format!("Day offset is out of range: {trimmed}"));
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|value| value.with_timezone(&Utc))
        .with_context(|| format!("Expected RFC 3339 or <N>d, got {trimmed}"))
}

pub fn status(settings: &Settings, now: DateTime<Utc>) -> Result<String> {
    let ledger = open_ledger(settings)?;
    let state = ledger.state();
    let mut out = String::new();
    match ledger.get_pending() {
        Some(id) => {
            let title = state
                .suggestions
                .get(id)
                .map(|summary| summary.title.as_str())
                .unwrap_or_default();
            out.push_str(&format!("Pending: {id} {title}\n"));
        }
        None => out.push_str("Pending: none\n"),
    }
    let metrics = ledger.self_metrics();
    out.push_str(&format!(
        "Suggestions: {} (proposed {}, implemented {}, rejected {}, deferred {})\n",
        metrics.suggestions_made,
        metrics.proposed,
        metrics.implemented,
        metrics.rejected,
        metrics.deferred
    ));
    if let Some(last_run) = state.last_run {
        out.push_str(&format!("Last run: {}\n", last_run.to_rfc3339()));
    }
    let due = ledger.get_reassessable(now);
    if due.is_empty() {
        out.push_str("Due for reassessment: none\n");
    } else {
        let ids = due
            .iter()
            .map(|entry| entry.suggestion_id.as_str())
            .collect::<Vec<_>>();
        out.push_str(&format!("Due for reassessment: {}\n", ids.join(", ")));
    }
    Ok(out)
}

/// Applies a lifecycle move and mirrors the new status into the suggestion
/// document when one exists.
pub fn transition(
    settings: &Settings,
    id: &str,
    status: SuggestionStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut ledger = open_ledger(settings)?;
    ledger
        .transition(id, status, None, None, now)
        .with_context(|| format!("Failed to mark {id} as {status}"))?;
    sync_document(settings, id, status, now)
}

pub fn defer(
    settings: &Settings,
    id: &str,
    reason: DeferReason,
    reassess_after: Option<DateTime<Utc>>,
    condition: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut ledger = open_ledger(settings)?;
    let summary = ledger
        .state()
        .suggestions
        .get(id)
        .cloned()
        .with_context(|| format!("Unknown suggestion: {id}"))?;
    ledger
        .defer_with_context(
            id,
            &summary.signal_id,
            reason,
            reassess_after,
            condition,
            summary.priority,
            now,
        )
        .with_context(|| format!("Failed to defer {id}"))?;
    sync_document(settings, id, SuggestionStatus::Deferred, now)
}

pub fn resurface(settings: &Settings, now: DateTime<Utc>) -> Result<Vec<String>> {
    let mut ledger = open_ledger(settings)?;
    let ids = ledger
        .auto_resurface(now)
        .context("Failed to resurface deferred suggestions")?;
    for id in &ids {
        sync_document(settings, id, SuggestionStatus::Proposed, now)?;
    }
    Ok(ids)
}

fn sync_document(
    settings: &Settings,
    id: &str,
    status: SuggestionStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let outputs = OutputStore::new(&settings.state_dir);
    let Some(mut suggestion) = outputs
        .load_suggestion(id)
        .with_context(|| format!("Failed to load suggestion {id}"))?
    else {
        return Ok(());
    };
    suggestion.status = status;
    suggestion.updated_at = now;
    outputs
        .write_suggestion(&suggestion)
        .with_context(|| format!("Failed to write suggestion {id}"))?;
    Ok(())
}
