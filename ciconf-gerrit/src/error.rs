//! Error types for ciconf-gerrit.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::classify::Classification;

/// How far an error should travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged and dropped; the pass carries on.
    Advisory,
    /// Aborts the current batch and propagates to the caller.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Advisory => write!(f, "advisory"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// A local process that could not be started or exited unsuccessfully.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start [{command}]: {err}")]
    Start {
        command: String,
        #[source]
        err: std::io::Error,
    },

    #[error("[{command}] as {user} failed with {status}: {stderr}")]
    Failure {
        command: String,
        user: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("unknown local user '{0}'")]
    UnknownUser(String),

    #[error("cannot look up user '{user}': {message}")]
    UserLookup { user: String, message: String },
}

/// All errors that can arise while talking to the review server or
/// provisioning repositories for it.
#[derive(Debug, Error)]
pub enum GerritError {
    /// The remote channel itself failed. Never retried.
    #[error("transport failure running '{command}': {message}")]
    Transport { command: String, message: String },

    /// The review server rejected an administrative command.
    #[error("remote command '{command}' failed ({kind}): {message}")]
    Remote {
        command: String,
        kind: Classification,
        message: String,
    },

    /// A command succeeded but its output could not be understood.
    #[error("unexpected output from '{command}': {message}")]
    Parse { command: String, message: String },

    /// A local helper process (git, init script) failed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("render error: {0}")]
    Render(#[from] ciconf_renderer::RenderError),

    #[error("configuration error: {0}")]
    Config(#[from] ciconf_core::ConfigError),

    /// The directory of record could not be queried.
    #[error("directory query {url} failed: {message}")]
    Directory { url: String, message: String },

    #[error("invalid directory credentials: {0}")]
    Credentials(String),

    /// Provisioning of one project failed; wraps the cause.
    #[error("project setup failed for '{project}': {source}")]
    Project {
        project: String,
        #[source]
        source: Box<GerritError>,
    },
}

impl GerritError {
    /// Everything raised by this crate aborts the batch; only the lifecycle
    /// wrappers in [`crate::restart`] downgrade to advisory.
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }

    /// `true` when the remote server reported an idempotent conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            GerritError::Remote {
                kind: Classification::Conflict,
                ..
            }
        )
    }

    /// `true` when a local process ran and exited non-zero.
    pub fn is_exit_failure(&self) -> bool {
        matches!(self, GerritError::Exec(ExecError::Failure { .. }))
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> GerritError {
    GerritError::Io {
        path: path.into(),
        source,
    }
}
