use crate::StoreError;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Writes a sibling temp file, syncs it, then renames it over `path`, so readers
/// see either the old document or the new one and never a partial write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::io("create", parent, source))?;
    }
    let tmp_path = temp_path(path);
    let result = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .map_err(|source| StoreError::io("write", &tmp_path, source))
        .and_then(|_| {
            fs::rename(&tmp_path, path).map_err(|source| StoreError::io("rename", path, source))
        });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut payload = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    payload.push(b'\n');
    write_atomic(path, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_content_without_leaving_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("doc.json");
        write_json_atomic(&path, &serde_json::json!({"v": 1})).expect("first write");
        write_json_atomic(&path, &serde_json::json!({"v": 2})).expect("second write");

        let content = fs::read_to_string(&path).expect("read back");
        assert!(content.contains("\"v\": 2"));
        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn failed_write_is_surfaced_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").expect("write blocker");
        let err = write_atomic(&blocker.join("doc.json"), b"{}").expect_err("must fail");
        let message = err.to_string();
        assert!(message.contains("blocker"), "{message}");
        let source = std::error::Error::source(&err).expect("io source");
        assert!(!message.contains(&source.to_string()), "{message}");
    }
}
