//! The member sync pass: groups.yml teams → review-server accounts.

use ciconf_core::{loader, CiPaths};
use ciconf_gerrit::{
    expand_teams, AccountReconciler, Directory, GerritClient, ReconcileReport, RemoteShell,
    Visited,
};

use crate::error::SyncError;
use crate::gerrit::Prepared;

/// Expand every group's teams and reconcile the resulting accounts.
///
/// Person records are looked up at most once per run, however many groups
/// list them. The cache is flushed at the end if anything changed.
pub fn sync_members(
    paths: &CiPaths,
    shell: &mut dyn RemoteShell,
    directory: &mut dyn Directory,
) -> Result<Prepared<ReconcileReport>, SyncError> {
    let groups = match loader::load_groups_at(&paths.groups_file()) {
        Ok(groups) => groups,
        Err(e) if e.is_incomplete() => return Ok(Prepared::Skipped(e.to_string())),
        Err(e) => return Err(e.into()),
    };

    let mut reconciler = AccountReconciler::new(GerritClient::new(shell));
    let mut visited = Visited::new();
    for group in &groups.groups {
        let (members, seen) = expand_teams(directory, &group.teams, visited)?;
        visited = seen;
        tracing::info!(
            "group {}: {} members from {} teams",
            group.name,
            members.len(),
            group.teams.len()
        );
        reconciler.reconcile_group(&group.name, &members)?;
    }

    let report = reconciler.finish()?;
    tracing::info!(
        "members synced: {} accounts created, {} updated, {} people looked up",
        report.accounts_created.len(),
        report.accounts_updated.len(),
        visited.len()
    );
    Ok(Prepared::Ready(report))
}
