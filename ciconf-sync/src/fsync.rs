//! Directory overlay used for hooks, theme and permissions.
//!
//! Top-level sub-directories of `src` replace their counterpart in `dst`
//! wholesale; top-level files are copied over whatever is there. Anything in
//! `dst` that `src` does not mention is left alone.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

/// Overlay `src` onto `dst`, creating `dst` if needed. Returns the top-level
/// destination paths that were written.
///
/// Symlinks are recreated as links, never followed.
pub fn sync_dir(src: &Path, dst: &Path) -> Result<Vec<PathBuf>, SyncError> {
    fs::create_dir_all(dst).map_err(|e| io_err(dst, e))?;

    let mut written = Vec::new();
    let top = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in top {
        let entry = entry.map_err(|e| io_err(src, e.into()))?;
        let to = dst.join(entry.file_name());
        if entry.file_type().is_dir() {
            clear(&to)?;
            copy_tree(entry.path(), &to)?;
        } else {
            copy_entry(&entry, &to)?;
        }
        tracing::debug!("synced {} -> {}", entry.path().display(), to.display());
        written.push(to);
    }
    Ok(written)
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dst).map_err(|e| io_err(dst, e))?;
    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| io_err(src, e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io_err(entry.path(), std::io::Error::other(e)))?;
        copy_entry(&entry, &dst.join(rel))?;
    }
    Ok(())
}

fn copy_entry(entry: &walkdir::DirEntry, to: &Path) -> Result<(), SyncError> {
    let kind = entry.file_type();
    if kind.is_dir() {
        fs::create_dir_all(to).map_err(|e| io_err(to, e))
    } else if kind.is_symlink() {
        let target = fs::read_link(entry.path()).map_err(|e| io_err(entry.path(), e))?;
        clear(to)?;
        std::os::unix::fs::symlink(&target, to).map_err(|e| io_err(to, e))
    } else {
        if fs::symlink_metadata(to).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(to).map_err(|e| io_err(to, e))?;
        }
        fs::copy(entry.path(), to)
            .map(|_| ())
            .map_err(|e| io_err(to, e))
    }
}

/// Remove whatever sits at `path`, without following a link there.
fn clear(path: &Path) -> Result<(), SyncError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(|e| io_err(path, e)),
        Ok(_) => fs::remove_file(path).map_err(|e| io_err(path, e)),
        Err(_) => Ok(()),
    }
}

/// Remove `dst` and copy `src` into its place.
pub fn replace_dir(src: &Path, dst: &Path) -> Result<(), SyncError> {
    clear(dst)?;
    copy_tree(src, dst)
}
