//! Durable state for the observatory: the suggestion ledger, its audit log and
//! the derived documents written next to it.

pub mod atomic;
pub mod history;
pub mod ledger;
pub mod outputs;

use obs_core::suggestion::SuggestionStatus;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use atomic::{write_atomic, write_json_atomic};
pub use history::{HistoryEntry, HistoryLog};
pub use ledger::{LoadOutcome, SuggestionLedger};
pub use outputs::OutputStore;

pub const STATE_FILE: &str = "state.json";
pub const CORRUPT_STATE_FILE: &str = "state.json.corrupt";
pub const LOCK_FILE: &str = "state.lock";
pub const HISTORY_FILE: &str = "history.jsonl";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {op} {path}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("state directory {0} is held by another run")]
    Locked(PathBuf),
    #[error("unknown suggestion: {0}")]
    UnknownSuggestion(String),
    #[error("{id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: String,
        from: SuggestionStatus,
        to: SuggestionStatus,
    },
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}
