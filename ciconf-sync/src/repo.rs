//! Config repository refresh.
//!
//! The config directory is either a copy of a bundled tree or a checkout of
//! `config-repo`, branched once and then kept on `config-repo-revision`
//! (`trunk` follows the tip).

use std::fmt;
use std::path::Path;

use ciconf_core::{CharmConfig, CiPaths};
use ciconf_gerrit::{CommandRunner, RunAs};

use crate::error::SyncError;
use crate::fsync;
use crate::gerrit::Prepared;
use crate::jenkins::CI_USER;

pub const TRUNK: &str = "trunk";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rcs {
    Bzr,
    Git,
}

impl Rcs {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "bzr" => Some(Rcs::Bzr),
            "git" => Some(Rcs::Git),
            _ => None,
        }
    }

    fn program(self) -> &'static str {
        match self {
            Rcs::Bzr => "bzr",
            Rcs::Git => "git",
        }
    }

    fn metadata_dir(self) -> &'static str {
        match self {
            Rcs::Bzr => ".bzr",
            Rcs::Git => ".git",
        }
    }
}

impl fmt::Display for Rcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Whether `location` looks like something `rcs` can branch from.
pub fn is_valid_config_repo(rcs: &str, location: Option<&str>) -> bool {
    let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) else {
        return false;
    };
    match Rcs::parse(rcs) {
        Some(Rcs::Bzr) => location.starts_with("lp:") || location.starts_with("bzr"),
        Some(Rcs::Git) => {
            ["git://", "http://", "https://", "ssh://", "git@"]
                .iter()
                .any(|p| location.starts_with(p))
                || location.ends_with(".git")
        }
        None => {
            tracing::warn!("unknown config-repo-rcs: {}", rcs);
            false
        }
    }
}

/// `true` once a config tree is in place.
pub fn is_ci_configured(paths: &CiPaths) -> bool {
    paths.config_dir().is_dir()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refreshed {
    /// Replaced by the bundled copy.
    Bundled,
    /// Fresh checkout.
    Branched(Rcs),
    /// Existing checkout brought to the configured revision.
    Updated(Rcs),
}

/// Bring the config directory up to date.
///
/// A `bundled` tree wins over any configured repository.
pub fn refresh_config(
    paths: &CiPaths,
    config: &CharmConfig,
    bundled: Option<&Path>,
    runner: &mut dyn CommandRunner,
) -> Result<Prepared<Refreshed>, SyncError> {
    let dest = paths.config_dir();
    if let Some(bundled) = bundled.filter(|b| b.is_dir()) {
        tracing::info!(
            "updating {} from local configs dir: {}",
            dest.display(),
            bundled.display()
        );
        fsync::replace_dir(bundled, &dest)?;
        return Ok(Prepared::Ready(Refreshed::Bundled));
    }

    let location = config.config_repo.as_deref();
    if !is_valid_config_repo(&config.config_repo_rcs, location) {
        return Ok(Prepared::Skipped(format!(
            "no usable config-repo for rcs '{}'",
            config.config_repo_rcs
        )));
    }
    let (Some(rcs), Some(location)) = (Rcs::parse(&config.config_repo_rcs), location) else {
        return Ok(Prepared::Skipped("config-repo not set".into()));
    };
    let revision = config.config_repo_revision.as_deref().filter(|r| !r.is_empty());
    std::fs::create_dir_all(paths.root()).map_err(|e| crate::error::io_err(paths.root(), e))?;

    if rcs == Rcs::Bzr {
        if let Some(lp_user) = config.lp_login.as_deref().filter(|l| !l.is_empty()) {
            runner.run(&RunAs::new(CI_USER, paths.root()), "bzr", &["launchpad-login", lp_user])?;
        }
    }

    tracing::info!("updating {} from remote repo: {}", dest.display(), location);
    if dest.is_dir() && !dest.join(rcs.metadata_dir()).is_dir() {
        tracing::info!("{} exists but is not a {} checkout, removing", dest.display(), rcs);
        std::fs::remove_dir_all(&dest).map_err(|e| crate::error::io_err(&dest, e))?;
    }

    let dest_arg = dest.to_string_lossy().into_owned();
    let program = rcs.program();
    if !dest.exists() {
        tracing::info!("branching new checkout of {}", location);
        let here = RunAs::current(paths.root());
        match rcs {
            Rcs::Bzr => {
                let mut args = vec!["branch", location, dest_arg.as_str()];
                if let Some(rev) = revision.filter(|r| *r != TRUNK) {
                    args.extend(["-r", rev]);
                }
                runner.run(&here, program, &args)?;
            }
            Rcs::Git => {
                runner.run(&here, program, &["clone", location, &dest_arg])?;
                if let Some(rev) = revision.filter(|r| *r != TRUNK) {
                    runner.run(&here.within(&dest), program, &["checkout", rev])?;
                }
            }
        }
        return Ok(Prepared::Ready(Refreshed::Branched(rcs)));
    }

    let inside = RunAs::current(&dest);
    let steps: Vec<Vec<&str>> = match (rcs, revision) {
        (Rcs::Bzr, Some(TRUNK)) => vec![vec!["revert"], vec!["pull"]],
        (Rcs::Bzr, Some(rev)) => vec![vec!["revert"], vec!["update", "-r", rev]],
        (Rcs::Bzr, None) => vec![vec!["revert"]],
        (Rcs::Git, Some(TRUNK)) => vec![vec!["checkout", "--", "."], vec!["pull", "--ff-only"]],
        (Rcs::Git, Some(rev)) => vec![
            vec!["checkout", "--", "."],
            vec!["fetch", "origin"],
            vec!["checkout", rev],
        ],
        (Rcs::Git, None) => vec![vec!["checkout", "--", "."]],
    };
    for args in &steps {
        runner.run(&inside, program, args)?;
    }
    Ok(Prepared::Ready(Refreshed::Updated(rcs)))
}
