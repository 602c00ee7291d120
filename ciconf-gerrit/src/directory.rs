//! Directory of record and nested team expansion.

use std::collections::{BTreeMap, BTreeSet};

use ciconf_core::{Login, MemberRecord, TeamName};

use crate::error::GerritError;

/// Membership statuses that count as active.
pub const ACTIVE_STATUSES: [&str; 2] = ["Approved", "Administrator"];

/// One direct membership of a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub name: String,
    pub status: String,
    pub is_team: bool,
}

impl MemberEntry {
    pub fn person(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            is_team: false,
        }
    }

    pub fn team(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            is_team: true,
            ..Self::person(name, status)
        }
    }

    pub fn is_active(&self) -> bool {
        ACTIVE_STATUSES.contains(&self.status.as_str())
    }
}

/// Source of team memberships and person details.
pub trait Directory {
    /// Direct members of `team`, sub-teams included.
    fn members(&mut self, team: &TeamName) -> Result<Vec<MemberEntry>, GerritError>;

    /// Full record for one person.
    fn person(&mut self, login: &Login) -> Result<MemberRecord, GerritError>;
}

/// State carried from one expansion to the next within a run.
///
/// Person records are looked up once per run no matter how many groups list
/// them.
#[derive(Debug, Default, Clone)]
pub struct Visited {
    people: BTreeMap<Login, MemberRecord>,
}

impl Visited {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn contains(&self, login: &Login) -> bool {
        self.people.contains_key(login)
    }
}

/// Resolve `teams` into a flat member list.
///
/// Depth-first over an explicit worklist. Sub-teams are recursed into; a team
/// already expanded in this call is skipped, which breaks cycles. Each login
/// appears at most once in the result. `visited` is threaded through and
/// handed back so later groups reuse the person records.
pub fn expand_teams(
    directory: &mut dyn Directory,
    teams: &[TeamName],
    mut visited: Visited,
) -> Result<(Vec<MemberRecord>, Visited), GerritError> {
    let mut pending: Vec<TeamName> = teams.iter().rev().cloned().collect();
    let mut expanded: BTreeSet<TeamName> = BTreeSet::new();
    let mut listed: BTreeSet<Login> = BTreeSet::new();
    let mut members = Vec::new();

    while let Some(team) = pending.pop() {
        if !expanded.insert(team.clone()) {
            continue;
        }
        tracing::debug!(%team, "expanding team");
        let entries = directory.members(&team)?;

        let mut subteams = Vec::new();
        for entry in entries {
            if !entry.is_active() {
                tracing::debug!(%team, member = %entry.name, status = %entry.status, "inactive");
                continue;
            }
            if entry.is_team {
                subteams.push(TeamName::from(entry.name));
                continue;
            }
            let login = Login::from(entry.name);
            if !listed.insert(login.clone()) {
                continue;
            }
            let record = match visited.people.get(&login) {
                Some(record) => record.clone(),
                None => {
                    let record = directory.person(&login)?;
                    visited.people.insert(login, record.clone());
                    record
                }
            };
            members.push(record);
        }
        pending.extend(subteams.into_iter().rev());
    }

    Ok((members, visited))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeDirectory;

    fn logins(records: &[MemberRecord]) -> Vec<&str> {
        records.iter().map(|r| r.login.0.as_str()).collect()
    }

    #[test]
    fn nested_member_listed_once() {
        let mut dir = FakeDirectory::new()
            .team("core", [MemberEntry::person("u", "Approved"), MemberEntry::team("sub", "Approved")])
            .team("sub", [MemberEntry::person("u", "Approved"), MemberEntry::person("v", "Administrator")])
            .people(["u", "v"]);

        let (members, _) = expand_teams(&mut dir, &[TeamName::from("core")], Visited::new()).unwrap();
        assert_eq!(logins(&members), vec!["u", "v"]);
    }

    #[test]
    fn inactive_members_and_teams_are_skipped() {
        let mut dir = FakeDirectory::new()
            .team(
                "core",
                [
                    MemberEntry::person("a", "Approved"),
                    MemberEntry::person("b", "Proposed"),
                    MemberEntry::team("old", "Expired"),
                ],
            )
            .team("old", [MemberEntry::person("c", "Approved")])
            .people(["a", "b", "c"]);

        let (members, _) = expand_teams(&mut dir, &[TeamName::from("core")], Visited::new()).unwrap();
        assert_eq!(logins(&members), vec!["a"]);
    }

    #[test]
    fn cycles_terminate() {
        let mut dir = FakeDirectory::new()
            .team("x", [MemberEntry::team("y", "Approved"), MemberEntry::person("a", "Approved")])
            .team("y", [MemberEntry::team("x", "Approved"), MemberEntry::person("b", "Approved")])
            .people(["a", "b"]);

        let (members, _) = expand_teams(&mut dir, &[TeamName::from("x")], Visited::new()).unwrap();
        assert_eq!(logins(&members), vec!["a", "b"]);
    }

    #[test]
    fn person_records_are_fetched_once_per_run() {
        let mut dir = FakeDirectory::new()
            .team("t1", [MemberEntry::person("a", "Approved")])
            .team("t2", [MemberEntry::person("a", "Approved")])
            .people(["a"]);

        let (first, visited) =
            expand_teams(&mut dir, &[TeamName::from("t1")], Visited::new()).unwrap();
        let (second, visited) = expand_teams(&mut dir, &[TeamName::from("t2")], visited).unwrap();

        assert_eq!(logins(&first), vec!["a"]);
        assert_eq!(logins(&second), vec!["a"]);
        assert_eq!(dir.person_lookups(), 1);
        assert!(visited.contains(&Login::from("a")));
    }
}
