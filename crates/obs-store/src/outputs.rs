use crate::atomic::{write_atomic, write_json_atomic};
use crate::StoreError;
use obs_core::snapshot::{AnalysisSnapshot, ComparisonMatrix};
use obs_core::suggestion::Suggestion;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const SNAPSHOT_FILE: &str = "analysis-cache.json";
pub const PREVIOUS_SNAPSHOT_FILE: &str = "analysis-cache.prev.json";
pub const MATRIX_FILE: &str = "comparison-matrix.json";
pub const REPORT_FILE: &str = "report.md";
pub const SUGGESTIONS_DIR: &str = "suggestions";

/// Derived documents under the state directory. Each is regenerated whole and
/// replaced atomically.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn previous_snapshot_path(&self) -> PathBuf {
        self.dir.join(PREVIOUS_SNAPSHOT_FILE)
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.dir.join(MATRIX_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    pub fn suggestion_path(&self, id: &str) -> PathBuf {
        self.dir.join(SUGGESTIONS_DIR).join(format!("{id}.json"))
    }

    /// The snapshot from the last completed run. An unreadable cache only
    /// costs trend data, so it is logged and treated as absent.
    pub fn load_snapshot(&self) -> Result<Option<AnalysisSnapshot>, StoreError> {
        read_optional(&self.snapshot_path())
    }

    pub fn load_previous_snapshot(&self) -> Result<Option<AnalysisSnapshot>, StoreError> {
        read_optional(&self.previous_snapshot_path())
    }

    /// Copies the current snapshot over the previous one, then replaces the
    /// current. A crash between the two steps leaves both files readable.
    pub fn publish_snapshot(&self, snapshot: &AnalysisSnapshot) -> Result<(), StoreError> {
        let current = self.snapshot_path();
        match fs::read(&current) {
            Ok(bytes) => write_atomic(&self.previous_snapshot_path(), &bytes)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::io("read", &current, source)),
        }
        write_json_atomic(&current, snapshot)
    }

    pub fn write_suggestion(&self, suggestion: &Suggestion) -> Result<PathBuf, StoreError> {
        let path = self.suggestion_path(&suggestion.id);
        write_json_atomic(&path, suggestion)?;
        Ok(path)
    }

    pub fn load_suggestion(&self, id: &str) -> Result<Option<Suggestion>, StoreError> {
        read_optional(&self.suggestion_path(id))
    }

    pub fn write_matrix(&self, matrix: &ComparisonMatrix) -> Result<(), StoreError> {
        write_json_atomic(&self.matrix_path(), matrix)
    }

    pub fn load_matrix(&self) -> Result<Option<ComparisonMatrix>, StoreError> {
        read_optional(&self.matrix_path())
    }

    pub fn write_report(&self, markdown: &str) -> Result<(), StoreError> {
        write_atomic(&self.report_path(), markdown.as_bytes())
    }
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::io("read", path, source)),
    };
    match serde_json::from_str(&content) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(event = "document_unreadable", path = %path.display(), error = %err);
            Ok(None)
        }
    }
}
