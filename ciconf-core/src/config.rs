//! Local charm configuration (`<root>/config.yaml`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, ConfigError};

/// Options the configurator reads itself. Anything else in the file is kept in
/// `extra` so it still reaches the context dump.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CharmConfig {
    /// Location of the config repository (`lp:...`, `bzr+ssh://...`, git URL).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_repo: Option<String>,
    #[serde(default = "default_rcs")]
    pub config_repo_rcs: String,
    /// Revision to pin; `trunk` follows the branch tip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_repo_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jenkins_admin_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jenkins_token: Option<String>,
    /// Space-separated `key=value` tokens expanded into the context dump.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub misc_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp_login: Option<String>,
    /// Base64 of the directory's OAuth credentials file. Never written to
    /// the context dump.
    #[serde(default, skip_serializing)]
    pub lp_credentials_file: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_rcs() -> String {
    "bzr".to_owned()
}

impl CharmConfig {
    /// Load the configuration file at `path`.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let parsed: Option<CharmConfig> =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(parsed.unwrap_or_else(|| CharmConfig {
            config_repo_rcs: default_rcs(),
            ..Default::default()
        }))
    }

    /// Like [`CharmConfig::load_at`] but falls back to defaults when the file
    /// does not exist.
    pub fn load_or_default_at(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_at(path) {
            Err(ConfigError::NotFound { path }) => {
                tracing::debug!("no charm config at {}, using defaults", path.display());
                Ok(CharmConfig {
                    config_repo_rcs: default_rcs(),
                    ..Default::default()
                })
            }
            other => other,
        }
    }

    /// Jenkins credentials from configuration, when both are set and non-empty.
    pub fn jenkins_credentials(&self) -> Option<(String, String)> {
        match (self.jenkins_admin_user.as_deref(), self.jenkins_token.as_deref()) {
            (Some(user), Some(token)) if !user.is_empty() && !token.is_empty() => {
                Some((user.to_owned(), token.to_owned()))
            }
            _ => None,
        }
    }

    /// The directory credentials option, when set and non-blank.
    pub fn lp_credentials(&self) -> Option<&str> {
        self.lp_credentials_file
            .as_deref()
            .filter(|encoded| !encoded.trim().is_empty())
    }

    /// Flatten the configuration into the key/value map written to the
    /// context dump. `misc-config` is replaced by its `key=value` tokens.
    pub fn context_map(&self) -> Result<BTreeMap<String, Value>, ConfigError> {
        let mut ctxt = BTreeMap::new();
        let Value::Object(fields) = serde_json::to_value(self)? else {
            return Ok(ctxt);
        };
        for (key, value) in fields {
            if key == "misc-config" {
                if let Value::String(misc) = &value {
                    for (k, v) in split_misc_config(misc) {
                        ctxt.insert(k, Value::String(v));
                    }
                }
                continue;
            }
            ctxt.insert(key, value);
        }
        Ok(ctxt)
    }
}

/// Split `a=1 b=2 junk` into `[("a","1"), ("b","2")]`. Tokens without `=`
/// are ignored.
pub fn split_misc_config(misc: &str) -> Vec<(String, String)> {
    misc.split_whitespace()
        .filter_map(|token| token.split_once('='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}
