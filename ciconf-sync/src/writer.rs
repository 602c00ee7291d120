//! Hash-gated atomic installs.
//!
//! ## Protocol
//!
//! 1. Normalise line endings and SHA-256 the content.
//! 2. Compare with the stored hash; identical and still on disk → skip.
//! 3. Write `<path>.ciconf.tmp`, rename over the target.
//! 4. Record the new hash (the caller saves the store).
//!
//! A `Written` result is what gates restarts of the consuming service.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};
use crate::hash_store::{self, HashStore};

/// Outcome of an individual file install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Content changed or the file did not exist.
    Written { path: PathBuf },
    /// Content matches the stored hash.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path } | WriteResult::Unchanged { path } => path,
        }
    }
}

pub fn digest(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

/// Atomically write `content` to `path` unless the stored hash matches.
pub fn atomic_write(
    path: &Path,
    content: &str,
    store: &mut HashStore,
) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.ciconf.tmp", path.display()));
    atomic_write_with_tmp(path, content, store, &tmp)
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &str,
    store: &mut HashStore,
    tmp: &Path,
) -> Result<WriteResult, SyncError> {
    let normalized = content.replace("\r\n", "\n");
    let content = normalized.as_str();
    let digest = digest(content);

    let key = path.to_string_lossy().to_string();
    if store.get(&key) == Some(&digest) && path.exists() {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    store.insert(key, digest);
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

/// Install a set of files under one hash-store scope and save the store.
pub fn install_all(
    state_dir: &Path,
    scope: &str,
    files: &[(PathBuf, String)],
) -> Result<Vec<WriteResult>, SyncError> {
    let started = Utc::now();
    let mut store = hash_store::load_at(state_dir, scope)?;
    let mut results = Vec::with_capacity(files.len());
    for (path, content) in files {
        results.push(atomic_write(path, content, &mut store.files)?);
    }
    if results.iter().any(WriteResult::written) {
        store.synced_at = started;
        hash_store::save_at(state_dir, scope, &store)?;
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.xml");
        let result = atomic_write(&path, "<hudson/>", &mut HashMap::new()).unwrap();
        assert!(result.written());
        assert_eq!(fs::read_to_string(&path).unwrap(), "<hudson/>");
    }

    #[test]
    fn same_content_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.xml");
        let mut store = HashMap::new();
        atomic_write(&path, "same", &mut store).unwrap();
        let result = atomic_write(&path, "same", &mut store).unwrap();
        assert!(!result.written());
    }

    #[test]
    fn deleted_target_is_rewritten_even_with_matching_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.xml");
        let mut store = HashMap::new();
        atomic_write(&path, "same", &mut store).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(atomic_write(&path, "same", &mut store).unwrap().written());
    }

    #[test]
    fn crlf_and_lf_share_a_hash() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jenkins_jobs.ini");
        let mut store = HashMap::new();
        assert!(atomic_write(&path, "a\r\nb\r\n", &mut store).unwrap().written());
        assert!(!atomic_write(&path, "a\nb\n", &mut store).unwrap().written());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn creates_parent_directories_and_cleans_tmp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("etc").join("jenkins_jobs").join("jenkins_jobs.ini");
        atomic_write(&path, "x", &mut HashMap::new()).unwrap();
        assert!(path.exists());
        assert!(!PathBuf::from(format!("{}.ciconf.tmp", path.display())).exists());
    }

    #[test]
    fn install_all_persists_store_only_on_change() {
        let state = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let files = vec![(out.path().join("a"), "1".to_string())];

        let first = install_all(state.path(), "jenkins", &files).unwrap();
        assert!(first[0].written());
        let saved = hash_store::load_at(state.path(), "jenkins").unwrap();

        let second = install_all(state.path(), "jenkins", &files).unwrap();
        assert!(!second[0].written());
        let after = hash_store::load_at(state.path(), "jenkins").unwrap();
        assert_eq!(saved.synced_at, after.synced_at);
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let path = readonly_dir.join("config.xml");
        fs::write(&path, "original").unwrap();
        fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o555)).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("config.xml.ciconf.tmp");
        let result =
            atomic_write_with_tmp(&path, "new content", &mut HashMap::new(), &tmp_path);

        fs::set_permissions(&readonly_dir, fs::Permissions::from_mode(0o755)).unwrap();
        // root ignores directory permissions; only assert when denied.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists());
        }
    }
}
