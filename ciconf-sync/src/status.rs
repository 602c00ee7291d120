//! Read-only status of the declared projects.

use std::path::Path;

use serde::Serialize;

use ciconf_core::{loader, CiPaths};
use ciconf_gerrit::provision::ProvisionSettings;
use ciconf_gerrit::runas::SERVICE_USER;
use ciconf_gerrit::{oracle, CommandRunner, RunAs};

use crate::error::SyncError;
use crate::gerrit::Prepared;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub name: String,
    pub upstream: String,
    pub remote_url: String,
    pub initialized: bool,
}

/// Ask the oracle about every project in `projects.yml`.
pub fn project_status(
    paths: &CiPaths,
    runner: &mut dyn CommandRunner,
    git_root: &Path,
) -> Result<Prepared<Vec<ProjectStatus>>, SyncError> {
    let declared = match loader::load_projects_at(&paths.projects_file()) {
        Ok(declared) => declared,
        Err(e) if e.is_incomplete() => return Ok(Prepared::Skipped(e.to_string())),
        Err(e) => return Err(e.into()),
    };
    let settings = ProvisionSettings::new("", "", "").with_git_root(git_root);
    let identity = RunAs::new(SERVICE_USER, git_root);

    let mut out = Vec::with_capacity(declared.projects.len());
    for project in &declared.projects {
        let remote_url = settings.remote_url(&project.name);
        let initialized =
            oracle::is_initialized(runner, &identity, &remote_url, &declared.branches)?;
        tracing::debug!("{}: initialized={}", project.name, initialized);
        out.push(ProjectStatus {
            name: project.name.clone(),
            upstream: format!(
                "https://{}/{}",
                declared.base_url.trim_end_matches('/'),
                project.repo
            ),
            remote_url,
            initialized,
        });
    }
    Ok(Prepared::Ready(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciconf_gerrit::fakes::FakeRunner;
    use tempfile::TempDir;

    #[test]
    fn reports_each_declared_project() {
        let tmp = TempDir::new().unwrap();
        let paths = CiPaths::new(tmp.path());
        let file = paths.projects_file();
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(
            &file,
            "base_url: github.com\nbranches: [master]\nprojects:\n  - {name: ci/a, repo: up/a}\n  - {name: ci/b, repo: up/b}\n",
        )
        .unwrap();

        let mut runner = FakeRunner::new().on(
            "/srv/git/ci/a.git",
            "1\tHEAD\n1\trefs/heads/master\n2\trefs/meta/config\n",
        );
        let Prepared::Ready(status) =
            project_status(&paths, &mut runner, Path::new("/srv/git")).unwrap()
        else {
            panic!("expected status");
        };
        assert_eq!(status.len(), 2);
        assert!(status[0].initialized);
        assert!(!status[1].initialized);
        assert_eq!(status[1].upstream, "https://github.com/up/b");
        assert_eq!(runner.matching("ls-remote").len(), 2);
    }

    #[test]
    fn missing_projects_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut runner = FakeRunner::new();
        let outcome =
            project_status(&CiPaths::new(tmp.path()), &mut runner, Path::new("/srv/git")).unwrap();
        assert!(matches!(outcome, Prepared::Skipped(_)));
    }
}
