//! The gerrit update pass.
//!
//! [`prepare_gerrit`] decides whether there is enough to work with; a
//! [`GerritPass`] then provisions projects, pushes permissions, installs hooks
//! and theme, and restarts the server once if any of those raised a signal.

use std::fs;
use std::path::{Path, PathBuf};

use ciconf_core::relation::GERRIT_RELATION;
use ciconf_core::{loader, CiPaths, GerritRelation, RelationSource};
use ciconf_gerrit::provision::GIT_ROOT;
use ciconf_gerrit::runas::SERVICE_USER;
use ciconf_gerrit::{
    gerrit_hostname, CommandRunner, GerritClient, ProjectProvisioner, ProvisionReport,
    ProvisionSettings, RemoteShell, RestartCoordinator, RestartSignal, RunAs, ServiceControl,
    SshTarget, SSH_PORT,
};
use ciconf_renderer::{placeholders, Renderer};

use crate::error::{io_err, SyncError};
use crate::fsync;

/// Remote name used inside the permissions scratch checkout.
const PERMS_REMOTE: &str = "repo";
const ALL_PROJECTS: &str = "All-Projects";

/// Outcome of a readiness check.
#[derive(Debug)]
pub enum Prepared<T> {
    Ready(T),
    /// Not enough configuration yet; the reason is logged by the caller.
    Skipped(String),
}

/// Check relation and config tree. Missing pieces skip the pass instead of
/// failing it.
pub fn prepare_gerrit(
    paths: &CiPaths,
    relations: &dyn RelationSource,
) -> Result<Prepared<GerritPass>, SyncError> {
    let Some(settings) = relations.settings(GERRIT_RELATION)? else {
        return Ok(Prepared::Skipped("no relation to gerrit".into()));
    };
    if !paths.gerrit_dir().is_dir() {
        return Ok(Prepared::Skipped(format!(
            "could not find gerrit config directory at {}",
            paths.gerrit_dir().display()
        )));
    }
    match GerritRelation::from_settings(settings) {
        Ok(relation) => Ok(Prepared::Ready(GerritPass::new(paths.clone(), relation))),
        Err(e) if e.is_incomplete() => Ok(Prepared::Skipped(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// The seams one pass talks through.
pub struct GerritIo<'a> {
    pub shell: &'a mut dyn RemoteShell,
    pub runner: &'a mut dyn CommandRunner,
    pub service: &'a mut dyn ServiceControl,
    pub renderer: &'a Renderer,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GerritReport {
    pub projects: Option<ProvisionReport>,
    pub permissions_pushed: bool,
    pub hooks: Vec<PathBuf>,
    pub theme_installed: bool,
    pub restart_signals: Vec<RestartSignal>,
    pub restarted: bool,
}

#[derive(Debug, Clone)]
pub struct GerritPass {
    paths: CiPaths,
    relation: GerritRelation,
    git_root: PathBuf,
}

impl GerritPass {
    pub fn new(paths: CiPaths, relation: GerritRelation) -> Self {
        Self {
            paths,
            relation,
            git_root: PathBuf::from(GIT_ROOT),
        }
    }

    pub fn with_git_root(mut self, git_root: impl Into<PathBuf>) -> Self {
        self.git_root = git_root.into();
        self
    }

    pub fn relation(&self) -> &GerritRelation {
        &self.relation
    }

    /// The admin session runs against the local server.
    pub fn ssh_target(&self) -> SshTarget {
        SshTarget::new(
            "localhost",
            &self.relation.admin_username,
            SSH_PORT,
            &self.relation.admin_privkey_path,
        )
    }

    fn site(&self, sub: &str) -> PathBuf {
        self.relation.review_site_dir.join(sub)
    }

    pub fn run(&self, io: GerritIo<'_>) -> Result<GerritReport, SyncError> {
        tracing::info!("updating gerrit");
        let GerritIo {
            shell,
            runner,
            service,
            renderer,
        } = io;
        let mut report = GerritReport::default();
        let mut restart = RestartCoordinator::new();

        if let Some(projects) = self.update_projects(&mut *shell, &mut *runner, renderer)? {
            restart.raise_if(RestartSignal::Projects, projects.changed());
            report.projects = Some(projects);
        }

        report.permissions_pushed = self.update_permissions(&mut *shell, &mut *runner)?;
        restart.raise_if(RestartSignal::Permissions, report.permissions_pushed);

        report.hooks = self.update_hooks()?;
        restart.raise_if(RestartSignal::Hooks, !report.hooks.is_empty());

        report.theme_installed = self.update_theme()?;
        restart.raise_if(RestartSignal::Theme, report.theme_installed);

        report.restart_signals = restart.signals().collect();
        report.restarted = restart.finish(service);
        Ok(report)
    }

    // projects ---------------------------------------------------------------

    fn update_projects(
        &self,
        shell: &mut dyn RemoteShell,
        runner: &mut dyn CommandRunner,
        renderer: &Renderer,
    ) -> Result<Option<ProvisionReport>, SyncError> {
        let file = self.paths.projects_file();
        let declared = match loader::load_projects_at(&file) {
            Ok(declared) => declared,
            Err(e) if e.is_incomplete() => {
                tracing::warn!("skipping projects refresh: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let host = gerrit_hostname(&self.relation.public_url)?;
        let settings = ProvisionSettings::new(
            &self.relation.admin_username,
            &self.relation.admin_email,
            host,
        )
        .with_git_root(&self.git_root);

        let mut provisioner =
            ProjectProvisioner::new(GerritClient::new(shell), runner, renderer, settings);
        let report =
            provisioner.provision(&declared.projects, &declared.branches, &declared.base_url)?;
        tracing::info!(
            "projects: {} created, {} seeded, {} already initialized",
            report.created.len(),
            report.seeded.len(),
            report.skipped_initialized.len()
        );
        Ok(Some(report))
    }

    // permissions ------------------------------------------------------------

    fn update_permissions(
        &self,
        shell: &mut dyn RemoteShell,
        runner: &mut dyn CommandRunner,
    ) -> Result<bool, SyncError> {
        let perms_dir = self.paths.gerrit_permissions_dir();
        if !perms_dir.is_dir() {
            tracing::warn!(
                "gerrit permissions directory not found at {}, skipping permissions refresh",
                perms_dir.display()
            );
            return Ok(false);
        }
        let groups = match loader::load_groups_at(&self.paths.groups_file()) {
            Ok(groups) => groups,
            Err(e) if e.is_incomplete() => {
                tracing::warn!("skipping permissions refresh: {}", e);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let mut client = GerritClient::new(shell);
        for group in &groups.groups {
            if client.create_group(&group.name)?.created() {
                tracing::info!("created group {}", group.name);
            }
        }

        tracing::info!("installing gerrit permissions from {}", perms_dir.display());
        let scratch = tempfile::Builder::new()
            .prefix("gerritperms")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        runner.own(scratch.path(), SERVICE_USER)?;

        let ssh_command = format!(
            "ssh -i {} -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
            self.relation.admin_privkey_path.display()
        );
        let identity =
            RunAs::new(SERVICE_USER, scratch.path()).with_env("GIT_SSH_COMMAND", ssh_command);
        let repo_url = format!(
            "ssh://{}@localhost:{}/{}.git",
            self.relation.admin_username, SSH_PORT, ALL_PROJECTS
        );
        let fetch_ref = format!("refs/meta/config:refs/remotes/{PERMS_REMOTE}/meta/config");
        let tracking = format!("{PERMS_REMOTE}/meta/config");

        runner.run(&identity, "git", &["init"])?;
        runner.run(&identity, "git", &["remote", "add", PERMS_REMOTE, &repo_url])?;
        runner.run(&identity, "git", &["fetch", PERMS_REMOTE, &fetch_ref])?;
        runner.run(&identity, "git", &["checkout", "-B", "meta/config", &tracking])?;

        let overlay = perms_dir.join(ALL_PROJECTS);
        if overlay.is_dir() {
            fsync::sync_dir(&overlay, scratch.path())?;
        }

        let uuids = client.group_uuids()?;
        write_groups_file(&scratch.path().join("groups"), &uuids)?;

        let name = &self.relation.admin_username;
        let email = &self.relation.admin_email;
        runner.run(&identity, "git", &["config", "--global", "user.name", name])?;
        runner.run(&identity, "git", &["config", "--global", "user.email", email])?;
        runner.run(&identity, "git", &["add", "-A"])?;
        let status = runner.run(&identity, "git", &["status", "--porcelain"])?;
        if status.trim().is_empty() {
            tracing::info!("permissions unchanged");
            return Ok(false);
        }
        runner.run(&identity, "git", &["commit", "-a", "-m", "Update permissions"])?;
        runner.run(
            &identity,
            "git",
            &["push", PERMS_REMOTE, "meta/config:refs/meta/config"],
        )?;
        tracing::info!("pushed permissions for {} groups", uuids.len());
        Ok(true)
    }

    // hooks and theme ----------------------------------------------------------

    fn update_hooks(&self) -> Result<Vec<PathBuf>, SyncError> {
        let src = self.paths.gerrit_hooks_dir();
        if !src.is_dir() {
            tracing::warn!(
                "gerrit hooks directory not found at {}, skipping hooks refresh",
                src.display()
            );
            return Ok(Vec::new());
        }
        let dest = self.site("hooks");
        tracing::info!("installing gerrit hooks from {} to {}", src.display(), dest.display());
        let installed = fsync::sync_dir(&src, &dest)?;
        let regular = |p: &&PathBuf| fs::symlink_metadata(p).is_ok_and(|m| m.is_file());
        for path in installed.iter().filter(regular) {
            substitute_in_place(path, &self.relation)?;
        }
        Ok(installed)
    }

    fn update_theme(&self) -> Result<bool, SyncError> {
        let theme = self.paths.gerrit_theme_dir();
        if !theme.is_dir() {
            tracing::warn!(
                "gerrit theme directory not found at {}, skipping theme refresh",
                theme.display()
            );
            return Ok(false);
        }
        let files = theme.join("files");
        let statics = theme.join("static");
        if !files.is_dir() || !statics.is_dir() {
            tracing::warn!(
                "theme directory at {} missing required subdirs: files, static",
                theme.display()
            );
            return Ok(false);
        }
        tracing::info!("installing theme from {}", theme.display());
        fsync::sync_dir(&files, &self.site("etc"))?;
        fsync::sync_dir(&statics, &self.site("static"))?;
        Ok(true)
    }
}

/// `<uuid>\t<name>` per line, the format the meta-config branch expects.
fn write_groups_file(path: &Path, uuids: &[(String, String)]) -> Result<(), SyncError> {
    let body: String = uuids
        .iter()
        .map(|(name, uuid)| format!("{uuid}\t{name}\n"))
        .collect();
    fs::write(path, body).map_err(|e| io_err(path, e))
}

/// Replace `{{key}}` markers with relation values. Non-UTF-8 files are left as
/// copied.
fn substitute_in_place(path: &Path, relation: &GerritRelation) -> Result<(), SyncError> {
    let Ok(text) = fs::read_to_string(path) else {
        tracing::debug!("not substituting in binary hook {}", path.display());
        return Ok(());
    };
    let replaced = placeholders::substitute(&text, relation.settings.iter());
    if replaced != text {
        fs::write(path, replaced).map_err(|e| io_err(path, e))?;
    }
    Ok(())
}
