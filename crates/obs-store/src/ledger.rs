use crate::atomic::write_json_atomic;
use crate::history::{HistoryEntry, HistoryLog};
use crate::{StoreError, CORRUPT_STATE_FILE, HISTORY_FILE, LOCK_FILE, STATE_FILE};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use obs_core::snapshot::SelfMetrics;
use obs_core::suggestion::{
    format_suggestion_id, DeferReason, DeferredEntry, SuggestionState, SuggestionStatus,
    SuggestionSummary, STATE_SCHEMA_VERSION,
};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Fresh,
    Loaded,
    Migrated,
    Recovered,
}

struct StateLock {
    file: File,
}

impl StateLock {
    fn acquire(state_dir: &Path) -> Result<Self, StoreError> {
        let path = state_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| StoreError::io("open", &path, source))?;
        if file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(state_dir.to_path_buf()));
        }
        Ok(Self { file })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Single-writer view of `state.json`. Every mutation is persisted atomically
/// and audit-logged before the call returns.
pub struct SuggestionLedger {
    dir: PathBuf,
    state_path: PathBuf,
    state: SuggestionState,
    history: HistoryLog,
    outcome: LoadOutcome,
    _lock: StateLock,
}

impl SuggestionLedger {
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(state_dir)
            .map_err(|source| StoreError::io("create", state_dir, source))?;
        let lock = StateLock::acquire(state_dir)?;
        let state_path = state_dir.join(STATE_FILE);
        let (state, outcome) = load_state(&state_path)?;

        let ledger = Self {
            dir: state_dir.to_path_buf(),
            state_path,
            state,
            history: HistoryLog::new(state_dir.join(HISTORY_FILE)),
            outcome,
            _lock: lock,
        };
        if outcome == LoadOutcome::Migrated {
            ledger.save()?;
            info!(
                event = "state_migrated",
                version = STATE_SCHEMA_VERSION,
                suggestions = ledger.state.suggestions.len()
            );
        }
        Ok(ledger)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> &SuggestionState {
        &self.state
    }

    pub fn load_outcome(&self) -> LoadOutcome {
        self.outcome
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn get_pending(&self) -> Option<&str> {
        self.state.pending.as_deref()
    }

    pub fn save(&self) -> Result<(), StoreError> {
        write_json_atomic(&self.state_path, &self.state)
    }

    /// Registers a candidate for `signal_id`. The first sighting allocates the
    /// next `SUG-NNN` id; later sightings refresh title and priority in place.
    pub fn propose(
        &mut self,
        signal_id: &str,
        title: &str,
        priority: f64,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        if let Some(existing) = self.state.suggestion_for_signal(signal_id).map(str::to_string) {
            let summary = self
                .state
                .suggestions
                .entry(existing.clone())
                .or_insert_with(|| SuggestionSummary {
                    signal_id: signal_id.to_string(),
                    status: SuggestionStatus::Proposed,
                    title: String::new(),
                    priority: 0.0,
                    updated_at: None,
                });
            if summary.status.is_terminal() {
                return Err(StoreError::IllegalTransition {
                    id: existing,
                    from: summary.status,
                    to: SuggestionStatus::Proposed,
                });
            }
            summary.title = title.to_string();
            summary.priority = priority;
            summary.updated_at = Some(now);
            self.refresh_pending();
            self.save()?;
            return Ok(existing);
        }

        let id = self.allocate_id();
        self.state
            .signal_index
            .insert(signal_id.to_string(), id.clone());
        self.state.suggestions.insert(
            id.clone(),
            SuggestionSummary {
                signal_id: signal_id.to_string(),
                status: SuggestionStatus::Proposed,
                title: title.to_string(),
                priority,
                updated_at: Some(now),
            },
        );
        self.refresh_pending();
        self.save()?;
        self.history.append(&HistoryEntry {
            suggestion_id: Some(id.clone()),
            to: Some(SuggestionStatus::Proposed),
            title: Some(title.to_string()),
            priority: Some(priority),
            detail: Some(signal_id.to_string()),
            ..HistoryEntry::event(now, "proposed")
        })?;
        info!(event = "suggestion_proposed", id = %id, signal = %signal_id, priority);
        Ok(id)
    }

    /// Moves a suggestion along its lifecycle. `title` and `priority` default to
    /// the stored values. Deferring through here records a user deferral with no
    /// reassessment date.
    pub fn transition(
        &mut self,
        id: &str,
        new_status: SuggestionStatus,
        title: Option<&str>,
        priority: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let summary = self
            .state
            .suggestions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownSuggestion(id.to_string()))?;
        if new_status == SuggestionStatus::Deferred {
            return self.defer_with_context(
                id,
                &summary.signal_id,
                DeferReason::User,
                None,
                None,
                priority.unwrap_or(summary.priority),
                now,
            );
        }
        if !summary.status.can_transition_to(new_status) {
            return Err(StoreError::IllegalTransition {
                id: id.to_string(),
                from: summary.status,
                to: new_status,
            });
        }

        let title = title.map(str::to_string).unwrap_or(summary.title);
        let priority = priority.unwrap_or(summary.priority);
        if summary.status == SuggestionStatus::Deferred {
            self.state.deferred.retain(|entry| entry.suggestion_id != id);
        }
        if let Some(stored) = self.state.suggestions.get_mut(id) {
            stored.status = new_status;
            stored.title = title.clone();
            stored.priority = priority;
            stored.updated_at = Some(now);
        }
        if self.state.pending.as_deref() == Some(id) && new_status != SuggestionStatus::Proposed {
            self.state.pending = None;
        }
        if new_status == SuggestionStatus::Proposed {
            self.refresh_pending();
        }
        self.save()?;
        self.history.append(&HistoryEntry {
            suggestion_id: Some(id.to_string()),
            from: Some(summary.status),
            to: Some(new_status),
            title: Some(title),
            priority: Some(priority),
            ..HistoryEntry::event(now, new_status.as_str())
        })?;
        info!(
            event = "suggestion_transition",
            id = %id,
            from = %summary.status,
            to = %new_status
        );
        Ok(())
    }

    /// Parks a proposed suggestion, or replaces the context of one already
    /// deferred.
    #[allow(clippy::too_many_arguments)]
    pub fn defer_with_context(
        &mut self,
        id: &str,
        signal_id: &str,
        reason: DeferReason,
        reassess_after: Option<DateTime<Utc>>,
        reassess_condition: Option<String>,
        priority_at_deferral: f64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let from = self
            .state
            .status_of(id)
            .ok_or_else(|| StoreError::UnknownSuggestion(id.to_string()))?;
        if from != SuggestionStatus::Deferred && !from.can_transition_to(SuggestionStatus::Deferred)
        {
            return Err(StoreError::IllegalTransition {
                id: id.to_string(),
                from,
                to: SuggestionStatus::Deferred,
            });
        }

        let signal_id = if signal_id.is_empty() {
            self.state
                .suggestions
                .get(id)
                .map(|summary| summary.signal_id.clone())
                .unwrap_or_default()
        } else {
            signal_id.to_string()
        };
        self.state.deferred.retain(|entry| entry.suggestion_id != id);
        self.state.deferred.push(DeferredEntry {
            suggestion_id: id.to_string(),
            signal_id,
            reason,
            reassess_after,
            reassess_condition: reassess_condition.clone(),
            priority_at_deferral,
            deferred_at: Some(now),
        });
        let title = match self.state.suggestions.get_mut(id) {
            Some(summary) => {
                summary.status = SuggestionStatus::Deferred;
                summary.updated_at = Some(now);
                summary.title.clone()
            }
            None => String::new(),
        };
        if self.state.pending.as_deref() == Some(id) {
            self.state.pending = None;
        }
        self.save()?;

        let mut detail = format!("reason={reason}");
        if let Some(after) = reassess_after {
            detail.push_str(&format!(" after={}", after.to_rfc3339()));
        }
        if let Some(condition) = reassess_condition {
            detail.push_str(&format!(" condition={condition}"));
        }
        self.history.append(&HistoryEntry {
            suggestion_id: Some(id.to_string()),
            from: Some(from),
            to: Some(SuggestionStatus::Deferred),
            title: Some(title),
            priority: Some(priority_at_deferral),
            detail: Some(detail),
            ..HistoryEntry::event(now, "deferred")
        })?;
        info!(event = "suggestion_deferred", id = %id, reason = %reason);
        Ok(())
    }

    pub fn get_reassessable(&self, now: DateTime<Utc>) -> Vec<&DeferredEntry> {
        self.state
            .deferred
            .iter()
            .filter(|entry| entry.is_due(now))
            .collect()
    }

    /// Returns due deferrals to "proposed". Does not touch disk when nothing is
    /// due, so repeated calls at the same instant are no-ops.
    pub fn auto_resurface(&mut self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let due = self
            .get_reassessable(now)
            .into_iter()
            .map(|entry| entry.suggestion_id.clone())
            .collect::<Vec<_>>();
        if due.is_empty() {
            return Ok(due);
        }

        self.state.deferred.retain(|entry| !due.contains(&entry.suggestion_id));
        let mut resurfaced = Vec::with_capacity(due.len());
        for id in &due {
            if let Some(summary) = self.state.suggestions.get_mut(id) {
                summary.status = SuggestionStatus::Proposed;
                summary.updated_at = Some(now);
                resurfaced.push((id.clone(), summary.title.clone(), summary.priority));
            }
        }
        self.refresh_pending();
        self.save()?;
        for (id, title, priority) in resurfaced {
            self.history.append(&HistoryEntry {
                suggestion_id: Some(id),
                from: Some(SuggestionStatus::Deferred),
                to: Some(SuggestionStatus::Proposed),
                title: Some(title),
                priority: Some(priority),
                detail: Some("reassessment date reached".to_string()),
                ..HistoryEntry::event(now, "resurfaced")
            })?;
        }
        info!(event = "deferrals_resurfaced", count = due.len());
        Ok(due)
    }

    pub fn self_metrics(&self) -> SelfMetrics {
        let implemented = self.state.count(SuggestionStatus::Implemented) as u64;
        let rejected = self.state.count(SuggestionStatus::Rejected) as u64;
        let decided = implemented + rejected;
        SelfMetrics {
            suggestions_made: self.state.suggestions.len() as u64,
            proposed: self.state.count(SuggestionStatus::Proposed) as u64,
            implemented,
            rejected,
            deferred: self.state.count(SuggestionStatus::Deferred) as u64,
            acceptance_rate: if decided == 0 {
                0.0
            } else {
                implemented as f64 / decided as f64
            },
        }
    }

    /// Stamps the run and writes a `run` line to the audit log.
    pub fn record_run(&mut self, now: DateTime<Utc>, detail: String) -> Result<(), StoreError> {
        self.state.last_run = Some(now);
        self.save()?;
        self.history.append(&HistoryEntry {
            detail: Some(detail),
            ..HistoryEntry::event(now, "run")
        })
    }

    /// Points `pending` at the highest-priority proposed suggestion when it is
    /// unset or stale. Ties go to the lower id.
    pub fn refresh_pending(&mut self) {
        let current_is_proposed = self
            .state
            .pending
            .as_deref()
            .and_then(|id| self.state.status_of(id))
            == Some(SuggestionStatus::Proposed);
        if current_is_proposed {
            return;
        }
        self.state.pending = self
            .state
            .suggestions
            .iter()
            .filter(|(_, summary)| summary.status == SuggestionStatus::Proposed)
            .fold(None::<(&String, f64)>, |best, (id, summary)| match best {
                Some((_, score)) if score >= summary.priority => best,
                _ => Some((id, summary.priority)),
            })
            .map(|(id, _)| id.clone());
    }

    fn allocate_id(&mut self) -> String {
        loop {
            let id = format_suggestion_id(self.state.next_sequence);
            self.state.next_sequence = self.state.next_sequence.saturating_add(1);
            if !self.state.suggestions.contains_key(&id) {
                return id;
            }
        }
    }
}

fn load_state(path: &Path) -> Result<(SuggestionState, LoadOutcome), StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok((SuggestionState::default(), LoadOutcome::Fresh));
        }
        Err(source) => return Err(StoreError::io("read", path, source)),
    };

    match parse_state(&content) {
        Ok((state, false)) => Ok((state, LoadOutcome::Loaded)),
        Ok((state, true)) => Ok((state, LoadOutcome::Migrated)),
        Err(err) => {
            let aside = path.with_file_name(CORRUPT_STATE_FILE);
            warn!(
                event = "state_corrupt",
                path = %path.display(),
                moved_to = %aside.display(),
                error = %err
            );
            fs::rename(path, &aside).map_err(|source| StoreError::io("rename", path, source))?;
            Ok((SuggestionState::default(), LoadOutcome::Recovered))
        }
    }
}

/// Parses a store of any known version. The flag reports whether the document
/// had to be upgraded.
pub fn parse_state(content: &str) -> Result<(SuggestionState, bool), serde_json::Error> {
    let mut raw: Value = serde_json::from_str(content)?;
    let migrated = upgrade_legacy(&mut raw);
    let state = serde_json::from_value(raw)?;
    Ok((state, migrated))
}

/// Version 1 stores kept `deferred` as a bare list of ids. Upgrades them to
/// rich entries and bumps the version. Summaries missing a signal id get it
/// from `signal_index`; a listed id whose summary is terminal is dropped.
fn upgrade_legacy(raw: &mut Value) -> bool {
    let Some(root) = raw.as_object_mut() else {
        return false;
    };
    let version = root.get("version").and_then(Value::as_u64).unwrap_or(1);
    let mut changed = false;

    let signal_by_suggestion = root
        .get("signal_index")
        .and_then(Value::as_object)
        .map(|index| {
            index
                .iter()
                .filter_map(|(signal, id)| id.as_str().map(|id| (id.to_string(), signal.clone())))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    let mut terminal = BTreeSet::new();
    if let Some(suggestions) = root.get_mut("suggestions").and_then(Value::as_object_mut) {
        for (id, summary) in suggestions.iter_mut() {
            let Some(summary) = summary.as_object_mut() else {
                continue;
            };
            let status = summary
                .get("status")
                .and_then(Value::as_str)
                .and_then(|status| status.parse::<SuggestionStatus>().ok());
            if status.is_some_and(|status| status.is_terminal()) {
                terminal.insert(id.clone());
            }
            let has_signal = summary
                .get("signal_id")
                .and_then(Value::as_str)
                .is_some_and(|signal| !signal.is_empty());
            if has_signal {
                continue;
            }
            if let Some(signal) = signal_by_suggestion.get(id) {
                summary.insert("signal_id".to_string(), json!(signal));
                changed = true;
            }
        }
    }

    let mut legacy_ids = Vec::new();
    if let Some(Value::Array(deferred)) = root.get_mut("deferred") {
        let mut upgraded = Vec::with_capacity(deferred.len());
        for item in deferred.drain(..) {
            let Some(id) = item.as_str().map(str::to_string) else {
                upgraded.push(item);
                continue;
            };
            changed = true;
            if terminal.contains(&id) {
                warn!(event = "legacy_deferral_dropped", id = %id, reason = "terminal status");
                continue;
            }
            let signal_id = signal_by_suggestion.get(&id).cloned().unwrap_or_default();
            upgraded.push(json!({
                "suggestion_id": id,
                "signal_id": signal_id,
                "reason": DeferReason::Legacy.as_str(),
                "priority_at_deferral": 0.0,
            }));
            legacy_ids.push((id, signal_id));
        }
        *deferred = upgraded;
    }

    if !legacy_ids.is_empty() {
        let suggestions = root
            .entry("suggestions")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(suggestions) = suggestions.as_object_mut() {
            for (id, signal_id) in legacy_ids {
                let summary = suggestions
                    .entry(id)
                    .or_insert_with(|| json!({ "signal_id": signal_id }));
                if let Some(summary) = summary.as_object_mut() {
                    summary.insert(
                        "status".to_string(),
                        json!(SuggestionStatus::Deferred.as_str()),
                    );
                }
            }
        }
    }

    if version < u64::from(STATE_SCHEMA_VERSION) {
        root.insert("version".to_string(), json!(STATE_SCHEMA_VERSION));
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn fresh_store_allocates_sequential_ids_and_pending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        assert_eq!(ledger.load_outcome(), LoadOutcome::Fresh);

        let first = ledger.propose("duration-anomaly", "Fix durations", 0.4, now()).expect("propose");
        let second = ledger.propose("crash-cluster", "Crashes", 0.9, now()).expect("propose");
        assert_eq!(first, "SUG-001");
        assert_eq!(second, "SUG-002");
        assert_eq!(ledger.get_pending(), Some("SUG-001"));

        let again = ledger.propose("duration-anomaly", "Fix durations", 0.5, now()).expect("re-propose");
        assert_eq!(again, first);
        assert_eq!(ledger.state().suggestions.len(), 2);
    }

    #[test]
    fn pending_is_cleared_and_repointed_after_transition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        let first = ledger.propose("a", "A", 0.8, now()).expect("propose");
        let second = ledger.propose("b", "B", 0.3, now()).expect("propose");

        ledger
            .transition(&first, SuggestionStatus::Implemented, None, None, now())
            .expect("implement");
        assert_eq!(ledger.get_pending(), None);
        ledger.refresh_pending();
        assert_eq!(ledger.get_pending(), Some(second.as_str()));
    }

    #[test]
    fn terminal_suggestions_never_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        let id = ledger.propose("a", "A", 0.8, now()).expect("propose");
        ledger
            .transition(&id, SuggestionStatus::Rejected, None, None, now())
            .expect("reject");

        let err = ledger
            .transition(&id, SuggestionStatus::Proposed, None, None, now())
            .expect_err("terminal");
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        assert!(ledger.propose("a", "A", 0.9, now()).is_err());
        assert!(ledger
            .defer_with_context(&id, "a", DeferReason::User, None, None, 0.1, now())
            .is_err());
        assert_eq!(ledger.state().resolved_signals(), vec!["a".to_string()]);
    }

    #[test]
    fn deferral_resurfaces_once_after_its_date() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        let id = ledger.propose("duration-anomaly", "Durations", 0.82, now()).expect("propose");
        let after = now() + Duration::days(7);
        ledger
            .defer_with_context(
                &id,
                "duration-anomaly",
                DeferReason::Dependency,
                Some(after),
                Some("after hook rewrite".to_string()),
                0.82,
                now(),
            )
            .expect("defer");
        assert_eq!(ledger.get_pending(), None);
        assert!(ledger.get_reassessable(now()).is_empty());

        let later = after + Duration::hours(1);
        assert_eq!(ledger.auto_resurface(later).expect("resurface"), vec![id.clone()]);
        assert_eq!(ledger.state().status_of(&id), Some(SuggestionStatus::Proposed));
        assert!(ledger.state().deferred.is_empty());
        assert_eq!(ledger.get_pending(), Some(id.as_str()));

        let history_len = ledger.history().read_all().expect("history").len();
        assert!(ledger.auto_resurface(later).expect("second pass").is_empty());
        assert_eq!(ledger.history().read_all().expect("history").len(), history_len);
    }

    #[test]
    fn redeferring_replaces_previous_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        let id = ledger.propose("a", "A", 0.5, now()).expect("propose");
        ledger
            .defer_with_context(&id, "a", DeferReason::User, None, None, 0.5, now())
            .expect("defer");
        ledger
            .defer_with_context(&id, "a", DeferReason::LowValue, Some(now()), None, 0.2, now())
            .expect("re-defer");
        assert_eq!(ledger.state().deferred.len(), 1);
        assert_eq!(ledger.state().deferred[0].reason, DeferReason::LowValue);
    }

    #[test]
    fn deferred_cannot_jump_to_implemented() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        let id = ledger.propose("a", "A", 0.5, now()).expect("propose");
        ledger
            .transition(&id, SuggestionStatus::Deferred, None, None, now())
            .expect("defer");
        assert!(ledger
            .transition(&id, SuggestionStatus::Implemented, None, None, now())
            .is_err());
        ledger
            .transition(&id, SuggestionStatus::Proposed, None, None, now())
            .expect("back to proposed");
        assert!(ledger.state().deferred.is_empty());
    }

    #[test]
    fn unknown_suggestion_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        let err = ledger
            .transition("SUG-404", SuggestionStatus::Implemented, None, None, now())
            .expect_err("unknown");
        assert!(matches!(err, StoreError::UnknownSuggestion(id) if id == "SUG-404"));
    }

    #[test]
    fn legacy_store_is_upgraded_without_losing_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let legacy = json!({
            "version": 1,
            "signal_index": {
                "duration-anomaly": "SUG-001",
                "crash-cluster": "SUG-002",
                "missing-artifacts": "SUG-004"
            },
            "suggestions": {
                "SUG-001": {"signal_id": "duration-anomaly", "status": "deferred", "title": "Durations"},
                "SUG-002": {"signal_id": "crash-cluster", "status": "implemented"},
                "SUG-004": {"signal_id": "missing-artifacts", "status": "proposed"}
            },
            "deferred": ["SUG-001", "SUG-003", "SUG-002", "SUG-004"]
        });
        fs::write(dir.path().join(STATE_FILE), legacy.to_string()).expect("seed");

        let ledger = SuggestionLedger::open(dir.path()).expect("open");
        assert_eq!(ledger.load_outcome(), LoadOutcome::Migrated);
        let state = ledger.state();
        assert_eq!(state.version, STATE_SCHEMA_VERSION);
        let deferred_ids = state
            .deferred
            .iter()
            .map(|entry| entry.suggestion_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(deferred_ids, vec!["SUG-001", "SUG-003", "SUG-004"]);
        assert_eq!(state.deferred[0].signal_id, "duration-anomaly");
        assert_eq!(state.deferred[0].reason, DeferReason::Legacy);
        assert_eq!(state.deferred[1].signal_id, "");
        assert_eq!(state.deferred[2].signal_id, "missing-artifacts");
        assert_eq!(state.status_of("SUG-003"), Some(SuggestionStatus::Deferred));
        assert_eq!(state.status_of("SUG-004"), Some(SuggestionStatus::Deferred));
        assert_eq!(state.status_of("SUG-002"), Some(SuggestionStatus::Implemented));
        assert!(state.deferred_entry("SUG-002").is_none());
        assert!(ledger.get_reassessable(now() + Duration::days(3650)).is_empty());
        drop(ledger);

        let mut reopened = SuggestionLedger::open(dir.path()).expect("reopen");
        assert_eq!(reopened.load_outcome(), LoadOutcome::Loaded);
        assert_eq!(reopened.state().deferred.len(), 3);
        reopened
            .transition("SUG-004", SuggestionStatus::Proposed, None, None, now())
            .expect("back to proposed");
        assert!(reopened.state().deferred_entry("SUG-004").is_none());
    }

    #[test]
    fn legacy_summaries_without_signal_ids_are_filled_from_the_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let legacy = json!({
            "version": 1,
            "signal_index": {"crash-cluster": "SUG-001"},
            "suggestions": {"SUG-001": {"status": "implemented"}},
            "deferred": []
        });
        fs::write(dir.path().join(STATE_FILE), legacy.to_string()).expect("seed");

        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        assert_eq!(ledger.load_outcome(), LoadOutcome::Migrated);
        assert_eq!(ledger.state().suggestions["SUG-001"].signal_id, "crash-cluster");
        assert_eq!(ledger.state().resolved_signals(), vec!["crash-cluster".to_string()]);
        assert!(ledger.propose("crash-cluster", "Crashes", 0.9, now()).is_err());
    }

    #[test]
    fn upgrade_is_idempotent() {
        let legacy = r#"{"version":1,"deferred":["SUG-001"]}"#;
        let (once, migrated) = parse_state(legacy).expect("first parse");
        assert!(migrated);
        let encoded = serde_json::to_string(&once).expect("encode");
        let (twice, migrated_again) = parse_state(&encoded).expect("second parse");
        assert!(!migrated_again);
        assert_eq!(once, twice);
    }

    #[test]
    fn corrupt_store_is_moved_aside() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(STATE_FILE), "{ not json").expect("seed");
        let ledger = SuggestionLedger::open(dir.path()).expect("open");
        assert_eq!(ledger.load_outcome(), LoadOutcome::Recovered);
        assert!(ledger.state().suggestions.is_empty());
        assert!(dir.path().join(CORRUPT_STATE_FILE).exists());
    }

    #[test]
    fn second_writer_is_refused_while_lock_is_held() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _first = SuggestionLedger::open(dir.path()).expect("open");
        let err = SuggestionLedger::open(dir.path())
            .err()
            .expect("second open must fail");
        assert!(matches!(err, StoreError::Locked(_)));
    }

    #[test]
    fn self_metrics_count_statuses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        assert_eq!(ledger.self_metrics().acceptance_rate, 0.0);
        let a = ledger.propose("a", "A", 0.5, now()).expect("a");
        let b = ledger.propose("b", "B", 0.5, now()).expect("b");
        let c = ledger.propose("c", "C", 0.5, now()).expect("c");
        ledger.propose("d", "D", 0.5, now()).expect("d");
        ledger.transition(&a, SuggestionStatus::Implemented, None, None, now()).expect("a");
        ledger.transition(&b, SuggestionStatus::Implemented, None, None, now()).expect("b");
        ledger.transition(&c, SuggestionStatus::Rejected, None, None, now()).expect("c");

        let metrics = ledger.self_metrics();
        assert_eq!(metrics.suggestions_made, 4);
        assert_eq!(metrics.proposed, 1);
        assert!((metrics.acceptance_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn every_transition_is_audited() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ledger = SuggestionLedger::open(dir.path()).expect("open");
        let id = ledger.propose("a", "A", 0.5, now()).expect("propose");
        ledger.transition(&id, SuggestionStatus::Deferred, None, None, now()).expect("defer");
        ledger.transition(&id, SuggestionStatus::Rejected, None, None, now()).expect("reject");

        let events = ledger
            .history()
            .read_all()
            .expect("history")
            .into_iter()
            .map(|entry| entry.event)
            .collect::<Vec<_>>();
        assert_eq!(events, vec!["proposed", "deferred", "rejected"]);
    }
}
