//! `ci-configurator gerrit` and `ci-configurator sync-members`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use ciconf_gerrit::provision::GIT_ROOT;
use ciconf_gerrit::{HostRunner, InitScript, LaunchpadCredentials, LaunchpadDirectory, SshSession};
use ciconf_sync::{prepare_gerrit, sync_members, GerritIo, GerritPass, GerritReport, Prepared};

use super::{print_done, print_skipped, Workspace};

#[derive(Args, Debug)]
pub struct GerritArgs {
    /// Root of the server's bare repositories.
    #[arg(long, default_value = GIT_ROOT)]
    pub git_root: PathBuf,
}

impl GerritArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        update_gerrit(ws, &self.git_root)
    }
}

#[derive(Args, Debug)]
pub struct MembersArgs {}

impl MembersArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        update_members(ws)
    }
}

fn prepared(ws: &Workspace) -> Result<Option<GerritPass>> {
    match prepare_gerrit(&ws.paths, ws.relations()).context("failed to read gerrit relation")? {
        Prepared::Ready(pass) => Ok(Some(pass)),
        Prepared::Skipped(why) => {
            print_skipped("gerrit", &why);
            Ok(None)
        }
    }
}

pub(crate) fn update_gerrit(ws: &Workspace, git_root: &Path) -> Result<()> {
    let Some(pass) = prepared(ws)? else {
        return Ok(());
    };
    let pass = pass.with_git_root(git_root);
    let renderer = ws.renderer()?;
    let mut session =
        SshSession::connect(pass.ssh_target()).context("failed to open gerrit admin session")?;
    let mut runner = HostRunner::new();
    let mut service = InitScript::gerrit();

    let report = pass
        .run(GerritIo {
            shell: &mut session,
            runner: &mut runner,
            service: &mut service,
            renderer: &renderer,
        })
        .context("gerrit update failed")?;
    print_gerrit_report(&report);
    Ok(())
}

pub(crate) fn update_members(ws: &Workspace) -> Result<()> {
    let Some(pass) = prepared(ws)? else {
        return Ok(());
    };
    let mut session =
        SshSession::connect(pass.ssh_target()).context("failed to open gerrit admin session")?;
    let mut directory = LaunchpadDirectory::new();
    if let Some(encoded) = ws.config.lp_credentials() {
        let credentials = LaunchpadCredentials::from_base64(encoded)
            .context("invalid lp-credentials-file")?;
        directory = directory.with_credentials(credentials);
    }

    match sync_members(&ws.paths, &mut session, &mut directory).context("member sync failed")? {
        Prepared::Skipped(why) => print_skipped("members", &why),
        Prepared::Ready(report) => {
            print_done(format!(
                "members: {} groups created, {} accounts created, {} updated, {} added to groups",
                report.groups_created.len(),
                report.accounts_created.len(),
                report.accounts_updated.len(),
                report.memberships
            ));
            if report.keys_added + report.keys_removed > 0 {
                println!(
                    "  ssh keys: +{} -{}",
                    report.keys_added, report.keys_removed
                );
            }
        }
    }
    Ok(())
}

fn print_gerrit_report(report: &GerritReport) {
    match &report.projects {
        Some(projects) => print_done(format!(
            "projects: {} created, {} already present, {} seeded, {} already initialized",
            projects.created.len(),
            projects.already_present.len(),
            projects.seeded.len(),
            projects.skipped_initialized.len()
        )),
        None => print_skipped("projects", "no projects.yml"),
    }
    if report.permissions_pushed {
        print_done("permissions pushed to All-Projects");
    } else {
        print_done("permissions unchanged");
    }
    for hook in &report.hooks {
        println!("  ✎ {}", hook.display());
    }
    if report.theme_installed {
        print_done("theme installed");
    }
    if report.restarted {
        let signals: Vec<String> = report.restart_signals.iter().map(|s| s.to_string()).collect();
        print_done(format!("gerrit restarted ({})", signals.join(", ")));
    }
}
