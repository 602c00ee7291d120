//! Launchpad as the directory of record.
//!
//! Read-only access to the JSON web service, anonymous unless
//! [`LaunchpadCredentials`] are supplied. Person records are assembled from
//! the person resource, its preferred email and its SSH keys; the identity
//! URI comes from the Yadis document served for the person's profile page.
//! Anonymous callers get a redacted email link, so records built without
//! credentials carry no email.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use ciconf_core::{Login, MemberRecord, TeamName};

use crate::directory::{Directory, MemberEntry};
use crate::error::GerritError;
use crate::oauth::LaunchpadCredentials;

pub const API_ROOT: &str = "https://api.launchpad.net/1.0";
pub const WEB_ROOT: &str = "https://launchpad.net";

/// Link value served in place of hidden resources.
pub const REDACTED: &str = "tag:launchpad.net:2008:redacted";

const XRDS_CONTENT_TYPE: &str = "application/xrds+xml";

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    entries: Vec<T>,
    #[serde(default)]
    next_collection_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MembershipEntry {
    self_link: String,
    status: String,
    #[serde(default)]
    member_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonEntry {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    is_team: bool,
    #[serde(default)]
    preferred_email_address_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SshKeyEntry {
    keytype: String,
    keytext: String,
    #[serde(default)]
    comment: String,
}

/// OpenSSH key type for a Launchpad key type name.
pub fn key_type(lp_type: &str) -> &'static str {
    match lp_type {
        "RSA" => "ssh-rsa",
        "DSA" => "ssh-dss",
        "ED25519" => "ssh-ed25519",
        "ECDSA" => "ecdsa-sha2-nistp256",
        _ => "ssh-rsa",
    }
}

/// Login from a membership `self_link` (`.../~team/+member/<login>`).
pub fn login_from_link(link: &str) -> Option<&str> {
    link.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

/// The OpenID local identifier advertised in a Yadis (XRDS) document.
pub fn yadis_local_id(xrds: &str) -> Option<String> {
    static LOCAL_ID: OnceLock<Regex> = OnceLock::new();
    let re = LOCAL_ID.get_or_init(|| {
        Regex::new(r"<(?:\w+:)?(?:LocalID|Delegate)>\s*([^<\s]+)\s*</(?:\w+:)?(?:LocalID|Delegate)>")
            .expect("static regex")
    });
    re.captures(xrds).map(|c| c[1].to_string())
}

pub struct LaunchpadDirectory {
    agent: ureq::Agent,
    api_root: String,
    web_root: String,
    credentials: Option<LaunchpadCredentials>,
    people: HashMap<String, PersonEntry>,
    warned_redacted: bool,
}

impl Default for LaunchpadDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchpadDirectory {
    pub fn new() -> Self {
        Self::with_roots(API_ROOT, WEB_ROOT)
    }

    pub fn with_roots(api_root: impl Into<String>, web_root: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .user_agent(concat!("ci-configurator/", env!("CARGO_PKG_VERSION")))
                .build(),
            api_root: api_root.into().trim_end_matches('/').to_string(),
            web_root: web_root.into().trim_end_matches('/').to_string(),
            credentials: None,
            people: HashMap::new(),
            warned_redacted: false,
        }
    }

    /// Sign every web-service request with `credentials`.
    pub fn with_credentials(mut self, credentials: LaunchpadCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn get_json(&self, url: &str) -> Result<Value, GerritError> {
        let fail = |message: String| GerritError::Directory {
            url: url.to_string(),
            message,
        };
        let mut request = self.agent.get(url).set("Accept", "application/json");
        if let Some(credentials) = &self.credentials {
            request = request.set("Authorization", &credentials.authorization());
        }
        request
            .call()
            .map_err(|e| fail(e.to_string()))?
            .into_json::<Value>()
            .map_err(|e| fail(e.to_string()))
    }

    fn get_typed<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, GerritError> {
        serde_json::from_value(self.get_json(url)?).map_err(|e| GerritError::Directory {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Follow `next_collection_link` until exhausted.
    fn collect_all<T: serde::de::DeserializeOwned>(
        &self,
        first: String,
    ) -> Result<Vec<T>, GerritError> {
        let mut out = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next {
            let page: Collection<T> = self.get_typed(&url)?;
            out.extend(page.entries);
            next = page.next_collection_link;
        }
        Ok(out)
    }

    fn person_entry(&mut self, name: &str, link: Option<&str>) -> Result<&PersonEntry, GerritError> {
        if !self.people.contains_key(name) {
            let url = link
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}/~{name}", self.api_root));
            let entry: PersonEntry = self.get_typed(&url)?;
            self.people.insert(name.to_string(), entry);
        }
        self.people.get(name).ok_or_else(|| GerritError::Directory {
            url: name.to_string(),
            message: "person vanished from cache".into(),
        })
    }

    fn preferred_email(&self, link: &str) -> Option<String> {
        match self.get_json(link) {
            Ok(v) => v.get("email").and_then(Value::as_str).map(str::to_string),
            Err(e) => {
                tracing::debug!("preferred email not visible: {e}");
                None
            }
        }
    }

    fn identity(&self, login: &Login) -> Option<String> {
        let url = format!("{}/~{}", self.web_root, login.0);
        let doc = match self.agent.get(&url).set("Accept", XRDS_CONTENT_TYPE).call() {
            Ok(response) => response.into_string().map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match doc {
            Ok(body) => yadis_local_id(&body),
            Err(e) => {
                tracing::warn!(%login, "identity discovery failed: {e}");
                None
            }
        }
    }
}

impl Directory for LaunchpadDirectory {
    fn members(&mut self, team: &TeamName) -> Result<Vec<MemberEntry>, GerritError> {
        let url = format!("{}/~{}/members_details", self.api_root, team.0);
        let details: Vec<MembershipEntry> = self.collect_all(url)?;

        let mut entries = Vec::with_capacity(details.len());
        for detail in details {
            let Some(name) = login_from_link(&detail.self_link) else {
                tracing::warn!(%team, link = %detail.self_link, "membership without a login");
                continue;
            };
            let name = name.to_string();
            let is_team = self.person_entry(&name, detail.member_link.as_deref())?.is_team;
            entries.push(MemberEntry {
                name,
                status: detail.status,
                is_team,
            });
        }
        Ok(entries)
    }

    fn person(&mut self, login: &Login) -> Result<MemberRecord, GerritError> {
        let (display_name, email_link) = {
            let entry = self.person_entry(&login.0, None)?;
            (
                entry.display_name.clone(),
                entry.preferred_email_address_link.clone(),
            )
        };
        let email = match email_link.as_deref() {
            Some(REDACTED) => {
                if !self.warned_redacted {
                    tracing::warn!("preferred emails are redacted; set lp-credentials-file to sync them");
                    self.warned_redacted = true;
                }
                None
            }
            Some(link) => self.preferred_email(link),
            None => None,
        };

        let keys_url = format!("{}/~{}/sshkeys", self.api_root, login.0);
        let keys: Vec<SshKeyEntry> = match self.get_json(&keys_url)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            other => serde_json::from_value::<Collection<SshKeyEntry>>(other)
                .map(|c| c.entries)
                .map_err(|e| GerritError::Directory {
                    url: keys_url.clone(),
                    message: e.to_string(),
                })?,
        };
        let ssh_keys = keys
            .iter()
            .map(|k| {
                format!("{} {} {}", key_type(&k.keytype), k.keytext, k.comment)
                    .trim()
                    .to_string()
            })
            .collect();

        Ok(MemberRecord {
            login: login.clone(),
            full_name: display_name.unwrap_or_else(|| login.0.clone()),
            email,
            ssh_keys,
            external_id: self.identity(login),
        })
    }
}
