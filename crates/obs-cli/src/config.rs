use anyhow::{Context, Result};
use obs_analysis::{DetectorThresholds, ScoringConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "observatory.toml";
pub const DEFAULT_TRACES_DIR: &str = "traces";
pub const DEFAULT_STATE_DIR: &str = ".observatory";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsSection {
    pub traces_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
}

/// Shape of `observatory.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub paths: PathsSection,
    pub detector: DetectorThresholds,
    pub scoring: ScoringConfig,
}

/// Values that outrank the config file. clap fills these from flags or from
/// `OBSERVATORY_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub traces_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub traces_dir: PathBuf,
    pub state_dir: PathBuf,
    pub thresholds: DetectorThresholds,
    pub scoring: ScoringConfig,
    pub config_source: Option<PathBuf>,
}

impl Settings {
    pub fn new(traces_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            traces_dir: traces_dir.into(),
            state_dir: state_dir.into(),
            thresholds: DetectorThresholds::default(),
            scoring: ScoringConfig::default(),
            config_source: None,
        }
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("observatory").join(CONFIG_FILE))
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse config {}", path.display()))
}

pub fn resolve(overrides: &Overrides) -> Result<Settings> {
    resolve_with(overrides, user_config_path())
}

/// Defaults, then the first config file found, then flags and environment.
/// An explicit `--config` must exist; the implicit locations are optional.
pub fn resolve_with(overrides: &Overrides, user_config: Option<PathBuf>) -> Result<Settings> {
    let provisional_state = overrides
        .state_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

    let source = match &overrides.config {
        Some(path) => Some(path.clone()),
        None => [Some(provisional_state.join(CONFIG_FILE)), user_config]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_file()),
    };
    let file = match &source {
        Some(path) => {
            debug!(event = "config_loaded", path = %path.display());
            load_file_config(path)?
        }
        None => FileConfig::default(),
    };

    Ok(Settings {
        traces_dir: overrides
            .traces_dir
            .clone()
            .or(file.paths.traces_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACES_DIR)),
        state_dir: overrides
            .state_dir
            .clone()
            .or(file.paths.state_dir)
            .unwrap_or(provisional_state),
        thresholds: file.detector,
        scoring: file.scoring,
        config_source: source,
    })
}
