//! Project provisioning.
//!
//! Every declared project is created on the review server, then, unless the
//! repository is already initialized, seeded from its upstream: clone, write
//! `.gitreview`, add the server's repository as a second remote and push the
//! upstream default branch to each missing declared branch. Work happens as
//! the service account inside a scratch directory removed when the batch
//! ends, whatever the outcome.

use std::path::{Path, PathBuf};

use ciconf_core::ProjectDecl;
use ciconf_renderer::{GitReviewCtx, Renderer};

use crate::client::{GerritClient, SSH_PORT};
use crate::error::{io_err, GerritError};
use crate::oracle;
use crate::runas::{CommandRunner, RunAs, SERVICE_USER};

/// Where the review server keeps its bare repositories.
pub const GIT_ROOT: &str = "/srv/git";

/// Name of the remote pointing at the server's copy.
const GERRIT_REMOTE: &str = "gerrit";

/// Hostname to advertise in `.gitreview`: the host of `public_url`, or the
/// raw value when it is not a URL.
pub fn gerrit_hostname(public_url: &str) -> Result<String, GerritError> {
    let raw = public_url.trim();
    if raw.is_empty() {
        return Err(ciconf_core::ConfigError::MissingRelationKeys {
            relation: ciconf_core::relation::GERRIT_RELATION.to_string(),
            keys: vec!["public_url".into()],
        }
        .into());
    }
    Ok(url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string()))
}

/// Fixed inputs of a provisioning batch.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub admin_username: String,
    pub admin_email: String,
    /// Host written into `.gitreview`.
    pub review_host: String,
    pub git_root: PathBuf,
    pub service_user: String,
}

impl ProvisionSettings {
    pub fn new(
        admin_username: impl Into<String>,
        admin_email: impl Into<String>,
        review_host: impl Into<String>,
    ) -> Self {
        Self {
            admin_username: admin_username.into(),
            admin_email: admin_email.into(),
            review_host: review_host.into(),
            git_root: PathBuf::from(GIT_ROOT),
            service_user: SERVICE_USER.to_string(),
        }
    }

    pub fn with_git_root(mut self, git_root: impl Into<PathBuf>) -> Self {
        self.git_root = git_root.into();
        self
    }

    /// Server-side repository for `project`.
    pub fn remote_url(&self, project: &str) -> String {
        self.git_root
            .join(format!("{project}.git"))
            .to_string_lossy()
            .into_owned()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub already_present: Vec<String>,
    pub skipped_initialized: Vec<String>,
    pub seeded: Vec<String>,
    pub branches_pushed: usize,
}

impl ProvisionReport {
    pub fn changed(&self) -> bool {
        !self.created.is_empty() || !self.seeded.is_empty()
    }
}

pub struct ProjectProvisioner<'a> {
    client: GerritClient<'a>,
    runner: &'a mut dyn CommandRunner,
    renderer: &'a Renderer,
    settings: ProvisionSettings,
}

impl<'a> ProjectProvisioner<'a> {
    pub fn new(
        client: GerritClient<'a>,
        runner: &'a mut dyn CommandRunner,
        renderer: &'a Renderer,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            client,
            runner,
            renderer,
            settings,
        }
    }

    /// Provision every project, fail-fast. The cache is flushed once at the
    /// end of every successful non-empty batch, even when every project was
    /// already initialized.
    pub fn provision(
        &mut self,
        projects: &[ProjectDecl],
        branches: &[String],
        base_url: &str,
    ) -> Result<ProvisionReport, GerritError> {
        let mut report = ProvisionReport::default();
        if projects.is_empty() {
            return Ok(report);
        }

        let workdir = tempfile::Builder::new()
            .prefix("ciconf-projects")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        self.runner.own(workdir.path(), &self.settings.service_user)?;
        let identity = RunAs::new(self.settings.service_user.clone(), workdir.path());

        let user_name = self.settings.admin_username.clone();
        let user_email = self.settings.admin_email.clone();
        self.git(&identity, &["config", "--global", "user.name", &user_name])?;
        self.git(&identity, &["config", "--global", "user.email", &user_email])?;

        for project in projects {
            self.provision_one(&identity, workdir.path(), project, branches, base_url, &mut report)
                .map_err(|source| {
                    tracing::error!(project = %project.name, "project setup failed: {source}");
                    GerritError::Project {
                        project: project.name.clone(),
                        source: Box::new(source),
                    }
                })?;
        }

        self.client.flush_caches()?;
        Ok(report)
    }

    fn provision_one(
        &mut self,
        identity: &RunAs,
        workdir: &Path,
        project: &ProjectDecl,
        branches: &[String],
        base_url: &str,
        report: &mut ProvisionReport,
    ) -> Result<(), GerritError> {
        let name = project.name.as_str();
        if self.client.create_project(name)?.created() {
            tracing::info!(project = name, "created project");
            report.created.push(name.to_string());
        } else {
            tracing::debug!(project = name, "project already exists");
            report.already_present.push(name.to_string());
        }

        let remote_url = self.settings.remote_url(name);
        if oracle::is_initialized(&mut *self.runner, identity, &remote_url, branches)? {
            tracing::info!(project = name, "repository already initialized, skipping");
            report.skipped_initialized.push(name.to_string());
            return Ok(());
        }

        let upstream = format!("https://{}/{}", base_url.trim_end_matches('/'), project.repo);
        let clone_dir = workdir.join(name.replace('/', "_"));
        let clone_arg = clone_dir.to_string_lossy().into_owned();
        tracing::info!(project = name, %upstream, "cloning upstream");
        self.git(identity, &["clone", &upstream, &clone_arg])?;

        let in_clone = identity.within(&clone_dir);
        self.write_gitreview(&in_clone, &clone_dir, name)?;

        self.git(&in_clone, &["remote", "add", GERRIT_REMOTE, &remote_url])?;
        self.git(&in_clone, &["fetch", "--all"])?;

        for branch in branches.iter().map(|b| b.trim()).filter(|b| !b.is_empty()) {
            let tracking = format!("{GERRIT_REMOTE}/{branch}");
            if self.runner.probe(&in_clone, "git", &["show-branch", &tracking])? {
                tracing::debug!(project = name, branch, "branch exists on server");
                continue;
            }
            let refspec = format!("HEAD:refs/heads/{branch}");
            tracing::info!(project = name, branch, "seeding branch");
            self.git(&in_clone, &["push", "--force", GERRIT_REMOTE, &refspec])?;
            report.branches_pushed += 1;
        }

        report.seeded.push(name.to_string());
        Ok(())
    }

    /// Render `.gitreview` into the clone and commit it if the tree changed.
    fn write_gitreview(
        &mut self,
        in_clone: &RunAs,
        clone_dir: &Path,
        project: &str,
    ) -> Result<(), GerritError> {
        let ctx = GitReviewCtx {
            project: project.to_string(),
            host: self.settings.review_host.clone(),
            port: SSH_PORT,
        };
        let (path, existed) = self.renderer.write_gitreview(clone_dir, &ctx)?;
        self.runner.own(&path, &self.settings.service_user)?;
        if !existed {
            self.git(in_clone, &["add", ".gitreview"])?;
        }

        let status = self.runner.run(in_clone, "git", &["status", "--porcelain"])?;
        if status.trim().is_empty() {
            return Ok(());
        }
        let message = format!(
            "Configured git-review to point to '{}'",
            self.settings.review_host
        );
        self.git(in_clone, &["commit", "-a", "-m", &message])
    }

    fn git(&mut self, identity: &RunAs, args: &[&str]) -> Result<(), GerritError> {
        self.runner.run(identity, "git", args).map(|_| ())
    }
}
