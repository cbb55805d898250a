use chrono::{DateTime, Utc};
use obs_core::{ProofStatus, TraceRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

pub const INDEX_FILE: &str = "index.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";
const MARKER_PREFIX: &str = ".active-";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to {op} {path}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunManifest {
    pub trace_id: String,
    #[serde(default, alias = "role", skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub proof_status: ProofStatus,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// What exists on disk for one indexed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub trace_id: String,
    pub manifest: Option<RunManifest>,
    pub files: BTreeSet<String>,
}

impl RunArtifacts {
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| !self.files.contains(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerFile {
    pub name: String,
    pub agent_type: String,
    pub session_id: String,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Corpus {
    pub records: Vec<TraceRecord>,
    pub skipped_lines: usize,
    pub runs: Vec<RunArtifacts>,
    pub markers: Vec<MarkerFile>,
    pub observed_at: DateTime<Utc>,
}

impl Corpus {
    pub fn empty(observed_at: DateTime<Utc>) -> Self {
        Self::from_records(Vec::new(), observed_at)
    }

    pub fn from_records(records: Vec<TraceRecord>, observed_at: DateTime<Utc>) -> Self {
        Self {
            records,
            skipped_lines: 0,
            runs: Vec::new(),
            markers: Vec::new(),
            observed_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn manifests(&self) -> impl Iterator<Item = &RunManifest> {
        self.runs.iter().filter_map(|run| run.manifest.as_ref())
    }
}

pub struct CorpusReader {
    root: PathBuf,
}

impl CorpusReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A missing traces directory or index is an empty corpus, not an error.
    pub fn read(&self, observed_at: DateTime<Utc>) -> Result<Corpus, CorpusError> {
        let index_path = self.root.join(INDEX_FILE);
        let content = match fs::read_to_string(&index_path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(event = "corpus_index_missing", path = %index_path.display());
                String::new()
            }
            Err(source) => {
                return Err(CorpusError::Io {
                    op: "read",
                    path: index_path,
                    source,
                })
            }
        };

        let (records, skipped_lines) = parse_index(&content);
        if skipped_lines > 0 {
            warn!(
                event = "corpus_malformed_lines",
                skipped = skipped_lines,
                path = %index_path.display()
            );
        }

        let mut seen = BTreeSet::new();
        let mut runs = Vec::new();
        for record in &records {
            if seen.insert(record.trace_id.as_str()) {
                runs.push(self.read_run(&record.trace_id));
            }
        }

        let markers = self.read_markers(observed_at)?;

        Ok(Corpus {
            records,
            skipped_lines,
            runs,
            markers,
            observed_at,
        })
    }

    /// Lists a run directory. A trace id that cannot name a directory under the
    /// root, or a directory that cannot be listed, yields no artifacts.
    fn read_run(&self, trace_id: &str) -> RunArtifacts {
        let mut run = RunArtifacts {
            trace_id: trace_id.to_string(),
            manifest: None,
            files: BTreeSet::new(),
        };
        if !is_safe_trace_id(trace_id) {
            warn!(event = "corpus_trace_id_rejected", trace_id = %trace_id);
            return run;
        }

        let run_dir = self.root.join(trace_id);
        match fs::read_dir(&run_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
                        run.files
                            .insert(entry.file_name().to_string_lossy().into_owned());
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(event = "run_dir_unreadable", path = %run_dir.display(), error = %err);
                return run;
            }
        }

        if run.files.contains(MANIFEST_FILE) {
            let path = run_dir.join(MANIFEST_FILE);
            run.manifest = match fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<RunManifest>(&raw) {
                    Ok(manifest) => Some(manifest),
                    Err(err) => {
                        warn!(event = "manifest_parse_failed", path = %path.display(), error = %err);
                        None
                    }
                },
                Err(err) => {
                    warn!(event = "manifest_read_failed", path = %path.display(), error = %err);
                    None
                }
            };
        }
        run
    }

    fn read_markers(&self, observed_at: DateTime<Utc>) -> Result<Vec<MarkerFile>, CorpusError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CorpusError::Io {
                    op: "list",
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut markers = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some((agent_type, session_id)) = parse_marker_name(&name) else {
                continue;
            };
            let modified_at = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or(observed_at);
            markers.push(MarkerFile {
                name,
                agent_type,
                session_id,
                modified_at,
            });
        }
        markers.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(markers)
    }
}

/// Parses the newline-delimited index. Blank lines are ignored; lines that are
/// not a valid record are counted and dropped.
pub fn parse_index(content: &str) -> (Vec<TraceRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceRecord>(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                debug!(event = "corpus_line_skipped", line = line_no + 1, error = %err);
                skipped += 1;
            }
        }
    }
    (records, skipped)
}

/// A trace id must be a single plain path component.
fn is_safe_trace_id(trace_id: &str) -> bool {
    let mut components = Path::new(trace_id).components();
    !trace_id.is_empty()
        && !trace_id.contains(|c: char| c == '/' || c == '\\')
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\.active-(?P<agent>.+)-(?P<session>[^-]+)$").expect("valid regex")
    })
}

/// `.active-<agent>-<session>`; the session id is the last dash-separated segment.
pub fn parse_marker_name(name: &str) -> Option<(String, String)> {
    if !name.starts_with(MARKER_PREFIX) {
        return None;
    }
    let captures = marker_pattern().captures(name)?;
    Some((
        captures.name("agent")?.as_str().to_string(),
        captures.name("session")?.as_str().to_string(),
    ))
}
