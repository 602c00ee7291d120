//! The jenkins update pass.
//!
//! Installs the security configuration (restarting jenkins only when its
//! content changed), writes the jenkins-job-builder config, dumps the context
//! for the repository's jobs update hook, runs the hook and `jenkins-jobs`,
//! then the repository's `setup.d` scripts.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use ciconf_core::relation::JENKINS_RELATION;
use ciconf_core::{loader, CharmConfig, CiPaths, JenkinsRelation, RelationSource};
use ciconf_gerrit::{CommandRunner, RestartCoordinator, RestartSignal, RunAs, ServiceControl};
use ciconf_renderer::{JjbConfigCtx, Renderer};

use crate::context;
use crate::error::{io_err, SyncError};
use crate::gerrit::Prepared;
use crate::writer::{self, WriteResult};

pub const JENKINS_CONFIG_FILE: &str = "/var/lib/jenkins/config.xml";
pub const JJB_CONFIG_FILE: &str = "/etc/jenkins_jobs/jenkins_jobs.ini";
/// Owner given to the installed security configuration.
pub const JENKINS_OWNER: &str = "jenkins:nogroup";
/// Account `jenkins-jobs` runs as, so its cache is not root-owned.
pub const CI_USER: &str = "ci";

pub const HASH_SCOPE: &str = "jenkins";
const CONFIG_MODE: u32 = 0o644;

/// Installed file locations outside the config repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JenkinsTargets {
    pub jenkins_config: PathBuf,
    pub jjb_config: PathBuf,
    pub ci_user: String,
}

impl Default for JenkinsTargets {
    fn default() -> Self {
        Self {
            jenkins_config: PathBuf::from(JENKINS_CONFIG_FILE),
            jjb_config: PathBuf::from(JJB_CONFIG_FILE),
            ci_user: CI_USER.to_string(),
        }
    }
}

pub fn prepare_jenkins(
    paths: &CiPaths,
    relations: &dyn RelationSource,
    config: &CharmConfig,
) -> Result<Prepared<JenkinsPass>, SyncError> {
    let Some(settings) = relations.settings(JENKINS_RELATION)? else {
        return Ok(Prepared::Skipped("no relation to jenkins".into()));
    };
    if !paths.config_dir().is_dir() {
        return Ok(Prepared::Skipped("CI not yet configured".into()));
    }
    match JenkinsRelation::from_settings(settings) {
        Ok(relation) => Ok(Prepared::Ready(JenkinsPass {
            paths: paths.clone(),
            relation,
            config: config.clone(),
            targets: JenkinsTargets::default(),
        })),
        Err(e) if e.is_incomplete() => Ok(Prepared::Skipped(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JenkinsReport {
    pub security: Option<WriteResult>,
    pub jjb_config: Option<WriteResult>,
    pub jobs_updated: bool,
    pub setup_ran: bool,
    pub required_packages: Vec<String>,
    pub restarted: bool,
}

#[derive(Debug, Clone)]
pub struct JenkinsPass {
    paths: CiPaths,
    relation: JenkinsRelation,
    config: CharmConfig,
    targets: JenkinsTargets,
}

impl JenkinsPass {
    pub fn with_targets(mut self, targets: JenkinsTargets) -> Self {
        self.targets = targets;
        self
    }

    /// Credentials from charm configuration first, then from the relation.
    pub fn credentials(&self) -> Option<(String, String)> {
        if let Some(creds) = self.config.jenkins_credentials() {
            tracing::info!("configuring jenkins credentials from charm configuration");
            return Some(creds);
        }
        match (&self.relation.admin_username, &self.relation.admin_password) {
            (Some(user), Some(password)) => {
                tracing::info!("configuring jenkins credentials from jenkins relation");
                Some((user.clone(), password.clone()))
            }
            _ => None,
        }
    }

    pub fn run(
        &self,
        runner: &mut dyn CommandRunner,
        service: &mut dyn ServiceControl,
        renderer: &Renderer,
    ) -> Result<JenkinsReport, SyncError> {
        tracing::info!("updating jenkins");
        let mut report = JenkinsReport::default();
        let mut restart = RestartCoordinator::new();

        report.security = self.update_security(runner)?;
        restart.raise_if(
            RestartSignal::Security,
            report.security.as_ref().is_some_and(WriteResult::written),
        );
        report.restarted = restart.finish(service);

        report.jjb_config = self.write_jjb_config(renderer)?;
        if report.jjb_config.is_some() {
            report.jobs_updated = self.update_jobs(runner)?;
        } else {
            tracing::info!("could not write jenkins-job-builder config, skipping jobs update");
        }

        let setup_d = self.paths.setup_d();
        if setup_d.is_dir() {
            tracing::info!("running repo setup from {}", setup_d.display());
            let setup_arg = setup_d.to_string_lossy();
            runner.run(&RunAs::current(self.paths.config_dir()), "run-parts", &[&setup_arg])?;
            report.setup_ran = true;
        }

        report.required_packages = required_packages(&self.paths)?;
        if !report.required_packages.is_empty() {
            tracing::info!(
                "config repository requires packages: {}",
                report.required_packages.join(" ")
            );
        }
        Ok(report)
    }

    fn update_security(
        &self,
        runner: &mut dyn CommandRunner,
    ) -> Result<Option<WriteResult>, SyncError> {
        let jobs_dir = self.paths.jobs_dir();
        if !jobs_dir.is_dir() {
            tracing::error!(
                "could not find jobs-config directory at {}, skipping jenkins config update",
                jobs_dir.display()
            );
            return Ok(None);
        }
        let security = self.paths.jenkins_security_file();
        if !security.is_file() {
            tracing::info!("could not find jenkins config file at {}, skipping", security.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&security).map_err(|e| io_err(&security, e))?;
        let target = &self.targets.jenkins_config;
        let files = [(target.clone(), content)];
        let mut results = writer::install_all(&self.paths.state_dir(), HASH_SCOPE, &files)?;
        let result = results.pop();

        if let Some(WriteResult::Written { path }) = &result {
            tracing::info!("updated jenkins config at {}", path.display());
            let path_arg = path.to_string_lossy();
            let dir = path.parent().unwrap_or(Path::new("/"));
            runner.run(&RunAs::current(dir), "chown", &[JENKINS_OWNER, &path_arg])?;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(CONFIG_MODE))
                .map_err(|e| io_err(path, e))?;
        }
        Ok(result)
    }

    fn write_jjb_config(&self, renderer: &Renderer) -> Result<Option<WriteResult>, SyncError> {
        let Some((username, password)) = self.credentials() else {
            tracing::info!("not enough data in jenkins relation, not writing jenkins-job-builder config");
            return Ok(None);
        };
        let rendered = renderer.jjb_config(&JjbConfigCtx {
            username,
            password,
            jenkins_url: self.relation.jenkins_url.clone(),
        })?;
        let files = [(self.targets.jjb_config.clone(), rendered)];
        let mut results = writer::install_all(&self.paths.state_dir(), HASH_SCOPE, &files)?;
        Ok(results.pop())
    }

    fn update_jobs(&self, runner: &mut dyn CommandRunner) -> Result<bool, SyncError> {
        let jobs_dir = self.paths.jobs_dir();
        if !jobs_dir.is_dir() {
            tracing::error!(
                "could not find jobs-config directory at {}, skipping jenkins-jobs update",
                jobs_dir.display()
            );
            return Ok(false);
        }
        let hook = self.paths.jobs_update_hook();
        if !hook.is_file() {
            tracing::error!("could not find jobs-config update hook at {}", hook.display());
            return Ok(false);
        }

        let dump = self.paths.context_dump();
        context::dump_context(&dump, Some(&self.relation.settings), &self.config)?;

        let jobs_arg = jobs_dir.to_string_lossy().into_owned();
        let hook_env = RunAs::current(&jobs_dir)
            .with_env("JJB_CHARM_CONTEXT", dump.to_string_lossy())
            .with_env("JJB_JOBS_CONFIG_DIR", jobs_arg.as_str());
        tracing::info!("calling jenkins-job-builder repo update hook: {}", hook.display());
        runner.run(&hook_env, &hook.to_string_lossy(), &[])?;

        tracing::info!("updating jobs in jenkins");
        let as_ci = RunAs::new(&self.targets.ci_user, self.paths.config_dir());
        runner.run(&as_ci, "jenkins-jobs", &["--flush-cache", "update", &jobs_arg])?;
        Ok(true)
    }
}

/// Plugins `control.yml` asks jenkins to have installed.
pub fn required_plugins(paths: &CiPaths) -> Result<Vec<String>, SyncError> {
    Ok(loader::load_control_at(&paths.control_file())?
        .map(|c| c.required_jenkins_plugins)
        .unwrap_or_default())
}

/// Packages `control.yml` lists as job dependencies.
pub fn required_packages(paths: &CiPaths) -> Result<Vec<String>, SyncError> {
    Ok(loader::load_control_at(&paths.control_file())?
        .map(|c| c.required_jenkins_packages)
        .unwrap_or_default())
}
