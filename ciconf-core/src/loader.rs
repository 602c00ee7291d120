//! Loading of the YAML declarations shipped in the config repository.
//!
//! Every loader takes an explicit path so tests can point at a `TempDir`.
//! A missing file is [`ConfigError::NotFound`]; a malformed one is
//! [`ConfigError::Parse`] with path and serde_yaml line context.

use std::path::Path;

use serde::Deserialize;

use crate::error::{io_err, ConfigError};
use crate::types::{ControlFile, GroupsFile, ProjectDecl, ProjectsFile};

fn read_yaml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// projects.yml
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct RawProjects {
    base_url: Option<String>,
    branches: Option<Vec<String>>,
    projects: Option<Vec<ProjectDecl>>,
}

/// Load and validate `projects.yml`.
///
/// `base_url`, `branches` and `projects` are all required; the first absent
/// key is reported as [`ConfigError::MissingKey`]. Branch names are trimmed.
pub fn load_projects_at(path: &Path) -> Result<ProjectsFile, ConfigError> {
    let raw: Option<RawProjects> = read_yaml(path)?;
    let raw = raw.unwrap_or_default();
    let missing = |key| ConfigError::MissingKey {
        path: path.to_path_buf(),
        key,
    };

    let base_url = raw.base_url.ok_or_else(|| missing("base_url"))?;
    let branches = raw.branches.ok_or_else(|| missing("branches"))?;
    let projects = raw.projects.ok_or_else(|| missing("projects"))?;

    Ok(ProjectsFile {
        base_url,
        branches: branches
            .into_iter()
            .map(|b| b.trim().to_owned())
            .filter(|b| !b.is_empty())
            .collect(),
        projects,
    })
}

// ---------------------------------------------------------------------------
// groups.yml
// ---------------------------------------------------------------------------

/// Load `groups.yml` (group name → teams).
pub fn load_groups_at(path: &Path) -> Result<GroupsFile, ConfigError> {
    read_yaml(path)
}

// ---------------------------------------------------------------------------
// control.yml
// ---------------------------------------------------------------------------

/// Load `control.yml`. Returns `Ok(None)` when the repository has none.
pub fn load_control_at(path: &Path) -> Result<Option<ControlFile>, ConfigError> {
    if !path.exists() {
        tracing::debug!("no control.yml found in repo at {}", path.display());
        return Ok(None);
    }
    let control: Option<ControlFile> = read_yaml(path)?;
    Ok(Some(control.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).expect("write");
        path
    }

    #[test]
    fn projects_loads_and_trims_branches() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "projects.yml",
            "base_url: github.com\nbranches: [' master', 'stable/2024 ']\nprojects:\n  - name: openstack/neutron\n    repo: openstack/neutron\n",
        );
        let parsed = load_projects_at(&path).expect("load");
        assert_eq!(parsed.base_url, "github.com");
        assert_eq!(parsed.branches, vec!["master", "stable/2024"]);
        assert_eq!(parsed.projects.len(), 1);
    }

    #[test]
    fn projects_missing_key_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "projects.yml", "base_url: github.com\nprojects: []\n");
        let err = load_projects_at(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "branches", .. }), "got: {err}");
        assert!(err.is_incomplete());
    }

    #[test]
    fn bare_mapping_reports_base_url() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "projects.yml", "{}\n");
        let err = load_projects_at(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "base_url", .. }), "got: {err}");
    }

    #[test]
    fn missing_control_is_none() {
        let dir = TempDir::new().unwrap();
        let control = load_control_at(&dir.path().join("control.yml")).expect("load");
        assert!(control.is_none());
    }
}
