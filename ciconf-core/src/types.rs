//! Domain types for the CI topology declarations.
//!
//! All types are serializable/deserializable via serde + serde_yaml.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a review-server group (unique key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupName(pub String);

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for GroupName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stable account login. Never changes once the account exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Login(pub String);

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Login {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Login {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of a team in the directory of record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamName(pub String);

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TeamName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TeamName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One entry of `projects.yml`'s `projects` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDecl {
    /// Project path on the review server, e.g. `openstack/neutron`.
    pub name: String,
    /// Upstream source path, relative to `base_url`.
    pub repo: String,
}

/// Validated contents of `projects.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsFile {
    /// Clone source host, e.g. `github.com`.
    pub base_url: String,
    pub branches: Vec<String>,
    pub projects: Vec<ProjectDecl>,
}

/// Teams listed for a group. The YAML value is either a space-separated
/// string or a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum TeamList {
    Spaced(String),
    List(Vec<String>),
}

impl TeamList {
    fn into_teams(self) -> Vec<TeamName> {
        let raw = match self {
            TeamList::Spaced(s) => s.split_whitespace().map(str::to_owned).collect(),
            TeamList::List(v) => v,
        };
        raw.into_iter()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .map(TeamName::from)
            .collect()
    }
}

/// A group and the ordered teams whose members belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDecl {
    pub name: GroupName,
    pub teams: Vec<TeamName>,
}

/// Contents of `groups.yml`, sorted by group name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupsFile {
    pub groups: Vec<GroupDecl>,
}

impl<'de> Deserialize<'de> for GroupsFile {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: Option<BTreeMap<String, Option<TeamList>>> = Option::deserialize(deserializer)?;
        let groups = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(name, teams)| GroupDecl {
                name: GroupName::from(name),
                teams: teams.map(TeamList::into_teams).unwrap_or_default(),
            })
            .collect();
        Ok(GroupsFile { groups })
    }
}

/// Contents of the config repository's `control.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlFile {
    #[serde(default)]
    pub required_jenkins_plugins: Vec<String>,
    #[serde(default)]
    pub required_jenkins_packages: Vec<String>,
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// A resolved directory member, ready to be reconciled into an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub login: Login,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Full public key lines: `<type> <data> <comment>`.
    #[serde(default)]
    pub ssh_keys: Vec<String>,
    /// Identity-provider URI for the member, if one was discovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
