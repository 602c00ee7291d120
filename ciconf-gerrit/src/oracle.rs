//! Is a repository already initialized?
//!
//! A project counts as initialized when its remote exposes `HEAD`, the
//! meta-config ref and `refs/heads/<b>` for every declared branch. Partial
//! listings are "not initialized".

use std::collections::BTreeSet;

use crate::error::GerritError;
use crate::runas::{CommandRunner, RunAs};

pub const HEAD_REF: &str = "HEAD";
pub const META_CONFIG_REF: &str = "refs/meta/config";

/// Ref names from `git ls-remote` output (`<sha>\t<ref>` per line).
pub fn parse_ls_remote(listing: &str) -> BTreeSet<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _sha = fields.next()?;
            fields.next().map(str::to_string)
        })
        .collect()
}

/// `true` iff `refs` holds both sentinel refs and every declared branch.
/// Branch names are compared exactly after trimming.
pub fn refs_satisfy<S: AsRef<str>>(refs: &BTreeSet<String>, branches: &[S]) -> bool {
    refs.contains(HEAD_REF)
        && refs.contains(META_CONFIG_REF)
        && branches
            .iter()
            .all(|b| refs.contains(&format!("refs/heads/{}", b.as_ref().trim())))
}

/// List the remote's refs once and decide.
pub fn is_initialized<S: AsRef<str>>(
    runner: &mut dyn CommandRunner,
    identity: &RunAs,
    remote_url: &str,
    branches: &[S],
) -> Result<bool, GerritError> {
    let listing = runner.run(identity, "git", &["ls-remote", remote_url])?;
    Ok(refs_satisfy(&parse_ls_remote(&listing), branches))
}
