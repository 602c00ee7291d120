//! Account reconciliation.
//!
//! For every member of a declared group the reconciler makes sure an account
//! exists, converges its SSH keys and web identity to the declared values and
//! adds it to the group. Accounts are reconciled once per run even when
//! several groups list them. Only commands that change server state are
//! counted in the report, so a converged server reports no change. Anything
//! the server rejects in an unrecognized way aborts the run; nothing already
//! applied is rolled back.

use std::collections::BTreeSet;

use ciconf_core::{GroupName, Login, MemberRecord};

use crate::client::{Applied, GerritClient};
use crate::error::GerritError;

/// Identity domain that was renamed; old URIs are rewritten before use.
pub const LEGACY_IDENTITY_HOST: &str = "login.launchpad.net";
pub const IDENTITY_HOST: &str = "login.ubuntu.com";

/// Rewrite identities issued under the legacy host to the current host.
pub fn normalize_identity(uri: &str) -> String {
    uri.replace(LEGACY_IDENTITY_HOST, IDENTITY_HOST)
}

/// Key identity for comparison: `<type> <data>`, comment ignored.
pub fn key_fingerprint(key: &str) -> String {
    key.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

/// What a reconciliation run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub groups_created: Vec<GroupName>,
    pub accounts_created: Vec<Login>,
    /// Existing accounts whose name, keys or identity had to change.
    pub accounts_updated: Vec<Login>,
    pub keys_added: usize,
    pub keys_removed: usize,
    pub identities_removed: usize,
    pub identities_added: usize,
    /// Members added to a group they were not in yet.
    pub memberships: usize,
}

impl ReconcileReport {
    /// Whether any remote state changed.
    pub fn changed(&self) -> bool {
        !self.groups_created.is_empty()
            || !self.accounts_created.is_empty()
            || !self.accounts_updated.is_empty()
            || self.keys_added > 0
            || self.keys_removed > 0
            || self.identities_removed > 0
            || self.identities_added > 0
            || self.memberships > 0
    }
}

pub struct AccountReconciler<'s> {
    client: GerritClient<'s>,
    seen: BTreeSet<Login>,
    report: ReconcileReport,
}

impl<'s> AccountReconciler<'s> {
    pub fn new(client: GerritClient<'s>) -> Self {
        Self {
            client,
            seen: BTreeSet::new(),
            report: ReconcileReport::default(),
        }
    }

    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    /// Create `group` if needed, reconcile every member not yet seen in this
    /// run, then add the members the group does not have yet.
    pub fn reconcile_group(
        &mut self,
        group: &GroupName,
        members: &[MemberRecord],
    ) -> Result<(), GerritError> {
        tracing::info!(%group, members = members.len(), "reconciling group");
        if self.client.create_group(group)?.created() {
            tracing::info!(%group, "created group");
            self.report.groups_created.push(group.clone());
        }

        for member in members {
            if self.seen.insert(member.login.clone()) {
                self.reconcile_account(member)?;
            } else {
                tracing::debug!(login = %member.login, "account already reconciled this run");
            }
        }

        let current: BTreeSet<Login> = self.client.group_members(group)?.into_iter().collect();
        let mut missing: Vec<Login> = Vec::new();
        for member in members {
            if !current.contains(&member.login) && !missing.contains(&member.login) {
                missing.push(member.login.clone());
            }
        }
        if missing.is_empty() {
            tracing::debug!(%group, "membership already complete");
            return Ok(());
        }
        tracing::info!(%group, added = missing.len(), "adding members");
        self.client.add_members(group, &missing)?;
        self.report.memberships += missing.len();
        Ok(())
    }

    /// Converge one account to `member`.
    pub fn reconcile_account(&mut self, member: &MemberRecord) -> Result<(), GerritError> {
        let login = &member.login;
        let created = match self
            .client
            .create_account(login, &member.full_name, member.email.as_deref())?
        {
            Applied::Created => {
                tracing::info!(%login, "created account");
                self.report.accounts_created.push(login.clone());
                true
            }
            Applied::AlreadyExisted => {
                tracing::debug!(%login, "account exists");
                false
            }
        };

        let account_id = self
            .client
            .account_id(login)?
            .ok_or_else(|| GerritError::Parse {
                command: format!("account lookup for {login}"),
                message: "no account id returned".into(),
            })?;

        let mut touched = false;
        if !created {
            let stored = self.client.full_name(account_id)?;
            if stored.as_deref() != Some(member.full_name.as_str()) {
                tracing::info!(%login, "updating full name");
                self.client.set_full_name(login, &member.full_name)?;
                touched = true;
            }
        }

        if member.ssh_keys.is_empty() {
            tracing::info!(%login, "no ssh keys declared; account has no login capability");
        }
        touched |= self.converge_keys(login, account_id, &member.ssh_keys)?;
        touched |= self.converge_identity(account_id, member)?;
        if touched && !created {
            self.report.accounts_updated.push(login.clone());
        }
        Ok(())
    }

    /// Returns whether any key was added or removed.
    fn converge_keys(
        &mut self,
        login: &Login,
        account_id: u64,
        declared: &[String],
    ) -> Result<bool, GerritError> {
        let current = self.client.ssh_keys(account_id)?;
        let wanted: BTreeSet<String> = declared.iter().map(|k| key_fingerprint(k)).collect();
        let present: BTreeSet<String> = current.iter().map(|k| key_fingerprint(k)).collect();

        let stale: Vec<String> = current
            .iter()
            .filter(|k| !wanted.contains(&key_fingerprint(k)))
            .cloned()
            .collect();
        if !stale.is_empty() {
            tracing::info!(%login, count = stale.len(), "removing ssh keys");
            self.client.delete_ssh_keys(login, &stale)?;
            self.report.keys_removed += stale.len();
        }

        let mut added = BTreeSet::new();
        for key in declared {
            let fp = key_fingerprint(key);
            if present.contains(&fp) || !added.insert(fp) {
                continue;
            }
            tracing::info!(%login, "adding ssh key");
            self.client.add_ssh_key(login, key.trim())?;
            self.report.keys_added += 1;
        }
        Ok(!stale.is_empty() || !added.is_empty())
    }

    /// Keep exactly the declared web identity. Other `http...` identities
    /// are removed; with no declared identity nothing is touched.
    fn converge_identity(
        &mut self,
        account_id: u64,
        member: &MemberRecord,
    ) -> Result<bool, GerritError> {
        let Some(declared) = member.external_id.as_deref() else {
            return Ok(false);
        };
        let declared = normalize_identity(declared);
        let current = self.client.http_external_ids(account_id)?;

        let stale: Vec<String> = current.iter().filter(|id| **id != declared).cloned().collect();
        if !stale.is_empty() {
            self.client.delete_external_ids(account_id, &stale)?;
            self.report.identities_removed += stale.len();
        }
        let linked = !current.contains(&declared);
        if linked {
            tracing::info!(login = %member.login, identity = %declared, "linking identity");
            self.client
                .insert_external_id(account_id, member.email.as_deref(), &declared)?;
            self.report.identities_added += 1;
        }
        Ok(linked || !stale.is_empty())
    }

    /// Flush caches if anything changed and hand back the report.
    pub fn finish(mut self) -> Result<ReconcileReport, GerritError> {
        if self.report.changed() {
            self.client.flush_caches()?;
        }
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_identity_host_is_rewritten() {
        assert_eq!(
            normalize_identity("https://login.launchpad.net/+id/abc"),
            "https://login.ubuntu.com/+id/abc"
        );
        assert_eq!(
            normalize_identity("https://login.ubuntu.com/+id/abc"),
            "https://login.ubuntu.com/+id/abc"
        );
    }

    #[test]
    fn fingerprint_ignores_comment_and_spacing() {
        assert_eq!(
            key_fingerprint("ssh-rsa AAAA  user@host"),
            key_fingerprint(" ssh-rsa  AAAA other")
        );
        assert_ne!(key_fingerprint("ssh-rsa AAAA"), key_fingerprint("ssh-rsa BBBB"));
    }

    #[test]
    fn empty_report_is_unchanged() {
        assert!(!ReconcileReport::default().changed());
    }
}
