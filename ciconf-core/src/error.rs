//! Error types for ciconf-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading declarations, configuration and
/// relation settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON parse error (hook tool output).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A declaration file did not exist at the expected path.
    #[error("declaration not found at {path}")]
    NotFound { path: PathBuf },

    /// A declaration file is missing a required top-level key.
    #[error("required key '{key}' not found in {path}")]
    MissingKey { path: PathBuf, key: &'static str },

    /// One or more relation settings are unset or empty.
    #[error("missing values '{}' in {relation} relation", keys.join(","))]
    MissingRelationKeys { relation: String, keys: Vec<String> },

    /// A deployment hook tool (`relation-get`, ...) could not be run or failed.
    #[error("hook tool '{tool}' failed: {message}")]
    HookTool { tool: String, message: String },
}

impl ConfigError {
    /// `true` for errors that mean "not enough configuration yet" rather than
    /// a broken installation. Callers skip the pass and wait for the next event.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            ConfigError::NotFound { .. }
                | ConfigError::MissingKey { .. }
                | ConfigError::MissingRelationKeys { .. }
        )
    }
}

/// Convenience constructor for [`ConfigError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
