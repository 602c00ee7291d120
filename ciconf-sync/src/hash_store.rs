//! Hash store: SHA-256 idempotency tracking for installed files.
//!
//! Persists a `HashStoreFile` JSON document at
//! `<state>/hashes/<scope>.json`, one per update pass (`jenkins`, ...).
//! Writes use an atomic `.tmp` + rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// Maps installed file paths to the SHA-256 hex digest last written there.
pub type HashStore = HashMap<String, String>;

/// On-disk hash store payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashStoreFile {
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub files: HashStore,
}

impl HashStoreFile {
    fn empty() -> Self {
        Self {
            synced_at: Utc::now(),
            files: HashMap::new(),
        }
    }
}

/// `<state>/hashes/<scope>.json`
pub fn store_path_at(state_dir: &Path, scope: &str) -> PathBuf {
    state_dir.join("hashes").join(format!("{scope}.json"))
}

/// Load the store for `scope`; empty when the file does not exist yet.
pub fn load_at(state_dir: &Path, scope: &str) -> Result<HashStoreFile, SyncError> {
    let path = store_path_at(state_dir, scope);
    if !path.exists() {
        return Ok(HashStoreFile::empty());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the store for `scope` atomically.
pub fn save_at(state_dir: &Path, scope: &str, store: &HashStoreFile) -> Result<(), SyncError> {
    let path = store_path_at(state_dir, scope);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid hash store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = load_at(tmp.path(), "jenkins").unwrap();
        assert!(store.files.is_empty());
    }

    #[test]
    fn saved_entries_load_back() {
        let tmp = TempDir::new().unwrap();
        let mut store = HashStoreFile::empty();
        store
            .files
            .insert("/var/lib/jenkins/config.xml".into(), "deadbeef".into());
        save_at(tmp.path(), "jenkins", &store).unwrap();

        let loaded = load_at(tmp.path(), "jenkins").unwrap();
        assert_eq!(loaded.files, store.files);
        assert!(!store_path_at(tmp.path(), "jenkins")
            .with_extension("json.tmp")
            .exists());
    }

    #[test]
    fn missing_files_key_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path(), "old");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"synced_at":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert!(load_at(tmp.path(), "old").unwrap().files.is_empty());
    }
}
