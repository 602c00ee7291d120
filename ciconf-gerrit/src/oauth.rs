//! OAuth 1.0 credentials for the directory's web service.
//!
//! Anonymous requests see a redacted preferred-email link, so the sync
//! account's access token is needed to learn member addresses. Tokens are
//! stored in launchpadlib's credentials file format: an INI document whose
//! first section holds `consumer_key`, `consumer_secret`, `access_token` and
//! `access_secret`. Requests are signed with the PLAINTEXT method, which is
//! what the service accepts over HTTPS.

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::GerritError;

/// Realm the web service expects in the `Authorization` header.
pub const REALM: &str = "https://api.launchpad.net/";

#[derive(Clone, PartialEq, Eq)]
pub struct LaunchpadCredentials {
    pub consumer_key: String,
    pub access_token: String,
    consumer_secret: String,
    access_secret: String,
}

impl fmt::Debug for LaunchpadCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchpadCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

impl LaunchpadCredentials {
    /// Parse a credentials file. Values from the first section win; comments
    /// and blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, GerritError> {
        let mut values: HashMap<&str, &str> = HashMap::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(['#', ';', '[']) {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.entry(key.trim()).or_insert(value.trim());
            }
        }
        let take = |key: &str| {
            values
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .ok_or_else(|| GerritError::Credentials(format!("missing {key}")))
        };
        Ok(Self {
            consumer_key: take("consumer_key")?,
            access_token: take("access_token")?,
            access_secret: take("access_secret")?,
            consumer_secret: values.get("consumer_secret").unwrap_or(&"").to_string(),
        })
    }

    /// Decode the base64 form the charm option carries.
    pub fn from_base64(encoded: &str) -> Result<Self, GerritError> {
        let compact: String = encoded.split_whitespace().collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|e| GerritError::Credentials(format!("not base64: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| GerritError::Credentials(format!("not UTF-8: {e}")))?;
        Self::parse(&text)
    }

    /// `Authorization` header value for one request. Every call carries a
    /// fresh nonce and the current timestamp.
    pub fn authorization(&self) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.header(timestamp, &nonce)
    }

    fn header(&self, timestamp: u64, nonce: &str) -> String {
        let signature = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.access_secret)
        );
        format!(
            "OAuth realm=\"{REALM}\", oauth_consumer_key=\"{}\", oauth_token=\"{}\", \
             oauth_signature_method=\"PLAINTEXT\", oauth_signature=\"{}\", \
             oauth_timestamp=\"{timestamp}\", oauth_nonce=\"{nonce}\", oauth_version=\"1.0\"",
            encode(&self.consumer_key),
            encode(&self.access_token),
            encode(&signature),
        )
    }
}

/// RFC 3986 unreserved characters pass through; OAuth encodes the rest.
const OAUTH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_SET).to_string()
}
