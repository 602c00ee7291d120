//! `ci-configurator refresh-config`: the config-changed entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use ciconf_gerrit::provision::GIT_ROOT;
use ciconf_gerrit::HostRunner;
use ciconf_sync::{refresh_config, Prepared, Refreshed};

use super::{gerrit, jenkins, print_done, print_skipped, zuul, Workspace};

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Use a local copy of the config tree instead of the configured repository.
    #[arg(long)]
    pub bundled: Option<PathBuf>,

    /// Only refresh the checkout; skip the update passes.
    #[arg(long)]
    pub no_update: bool,

    /// Root of the gerrit server's bare repositories.
    #[arg(long, default_value = GIT_ROOT)]
    pub git_root: PathBuf,
}

impl RefreshArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        let mut runner = HostRunner::new();
        let bundled = self.bundled.as_deref();
        let refreshed = refresh_config(&ws.paths, &ws.config, bundled, &mut runner)
            .context("failed to refresh config repository")?;
        match refreshed {
            Prepared::Skipped(why) => {
                print_skipped("config repository", &why);
                return Ok(());
            }
            Prepared::Ready(how) => {
                let dir = ws.paths.config_dir();
                let what = match how {
                    Refreshed::Bundled => "copied from bundled tree".to_string(),
                    Refreshed::Branched(rcs) => format!("checked out ({rcs})"),
                    Refreshed::Updated(rcs) => format!("updated ({rcs})"),
                };
                print_done(format!("{} {what}", dir.display()));
            }
        }
        if self.no_update {
            return Ok(());
        }

        jenkins::update_jenkins(ws)?;
        gerrit::update_gerrit(ws, &self.git_root)?;
        gerrit::update_members(ws)?;
        zuul::check_zuul(ws)
    }
}
