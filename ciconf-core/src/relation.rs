//! Relation settings exchanged with the principal service units.
//!
//! The deployment framework itself is external. The configurator only needs
//! "give me the key/value bag for relation X", expressed by [`RelationSource`]:
//!
//! - [`FileRelation`]: a YAML/JSON document mapping relation name → settings.
//! - [`HookToolRelation`]: the framework's `relation-ids` / `relation-list` /
//!   `relation-get` tools, available while a hook runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

pub const GERRIT_RELATION: &str = "gerrit-configurator";
pub const JENKINS_RELATION: &str = "jenkins-configurator";
pub const ZUUL_RELATION: &str = "zuul-configurator";

/// Ordered key/value bag published by a related unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationSettings(pub BTreeMap<String, String>);

impl RelationSettings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Check that every key in `keys` is present and non-empty.
    ///
    /// All missing keys are reported at once.
    pub fn require(&self, relation: &str, keys: &[&str]) -> Result<(), ConfigError> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|k| self.get(k).is_none())
            .map(|k| (*k).to_owned())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRelationKeys {
                relation: relation.to_owned(),
                keys: missing,
            })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RelationSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Typed views
// ---------------------------------------------------------------------------

/// The settings the review-server principal must publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GerritRelation {
    pub admin_username: String,
    pub admin_email: String,
    pub admin_privkey_path: PathBuf,
    pub review_site_dir: PathBuf,
    pub public_url: String,
    /// The full bag, used for `{{key}}` substitution in hooks.
    pub settings: RelationSettings,
}

impl GerritRelation {
    pub const REQUIRED_KEYS: [&'static str; 5] = [
        "admin_username",
        "admin_email",
        "admin_privkey_path",
        "review_site_dir",
        "public_url",
    ];

    pub fn from_settings(settings: RelationSettings) -> Result<Self, ConfigError> {
        settings.require(GERRIT_RELATION, &Self::REQUIRED_KEYS)?;
        let value = |key: &str| settings.get(key).unwrap_or_default().to_owned();
        Ok(GerritRelation {
            admin_username: value("admin_username"),
            admin_email: value("admin_email"),
            admin_privkey_path: PathBuf::from(value("admin_privkey_path")),
            review_site_dir: PathBuf::from(value("review_site_dir")),
            public_url: value("public_url"),
            settings,
        })
    }
}

/// The settings published by the build-server principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JenkinsRelation {
    pub jenkins_url: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub settings: RelationSettings,
}

impl JenkinsRelation {
    pub fn from_settings(settings: RelationSettings) -> Result<Self, ConfigError> {
        settings.require(JENKINS_RELATION, &["jenkins_url"])?;
        Ok(JenkinsRelation {
            jenkins_url: settings.get("jenkins_url").unwrap_or_default().to_owned(),
            admin_username: settings.get("admin_username").map(str::to_owned),
            admin_password: settings.get("admin_password").map(str::to_owned),
            settings,
        })
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where relation settings come from.
pub trait RelationSource {
    /// Settings for `relation`, or `Ok(None)` when the relation is not
    /// established (no related units).
    fn settings(&self, relation: &str) -> Result<Option<RelationSettings>, ConfigError>;
}

/// Relation settings read from a document on disk:
///
/// ```yaml
/// gerrit-configurator:
///   admin_username: admin
///   public_url: https://review.example.com
/// ```
#[derive(Debug, Clone)]
pub struct FileRelation {
    path: PathBuf,
}

impl FileRelation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RelationSource for FileRelation {
    fn settings(&self, relation: &str) -> Result<Option<RelationSettings>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        let mut all: BTreeMap<String, BTreeMap<String, serde_yaml::Value>> =
            serde_yaml::from_str::<Option<_>>(&contents)
                .map_err(|e| ConfigError::Parse {
                    path: self.path.clone(),
                    source: e,
                })?
                .unwrap_or_default();
        Ok(all.remove(relation).map(|raw| {
            raw.into_iter()
                .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k, v)))
                .collect()
        }))
    }
}

fn scalar_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Relation settings read through the deployment framework's hook tools.
///
/// Settings of every unit on every relation id are merged; later units win.
#[derive(Debug, Clone, Default)]
pub struct HookToolRelation;

impl HookToolRelation {
    fn tool(name: &str, args: &[&str]) -> Result<String, ConfigError> {
        let output = Command::new(name)
            .args(args)
            .output()
            .map_err(|e| ConfigError::HookTool {
                tool: name.to_owned(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ConfigError::HookTool {
                tool: name.to_owned(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl RelationSource for HookToolRelation {
    fn settings(&self, relation: &str) -> Result<Option<RelationSettings>, ConfigError> {
        let ids = Self::tool("relation-ids", &[relation])?;
        let mut merged = BTreeMap::new();
        let mut any_unit = false;
        for rid in ids.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let units = Self::tool("relation-list", &["-r", rid])?;
            for unit in units.lines().map(str::trim).filter(|l| !l.is_empty()) {
                any_unit = true;
                let raw = Self::tool("relation-get", &["--format=json", "-r", rid, "-", unit])?;
                let values: Option<BTreeMap<String, serde_json::Value>> =
                    serde_json::from_str(&raw)?;
                for (k, v) in values.unwrap_or_default() {
                    if let serde_json::Value::String(s) = v {
                        merged.insert(k, s);
                    } else if !v.is_null() {
                        merged.insert(k, v.to_string());
                    }
                }
            }
        }
        Ok(any_unit.then_some(RelationSettings(merged)))
    }
}
