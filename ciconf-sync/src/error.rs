//! Error types for ciconf-sync.

use std::path::PathBuf;

use thiserror::Error;

use ciconf_core::ConfigError;
use ciconf_gerrit::GerritError;
use ciconf_renderer::RenderError;

/// All errors that can arise from an update pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gerrit(#[from] GerritError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (hash store, context dump).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// `true` when the pass should be skipped rather than reported as broken.
    pub fn is_incomplete(&self) -> bool {
        match self {
            SyncError::Config(e) => e.is_incomplete(),
            SyncError::Gerrit(GerritError::Config(e)) => e.is_incomplete(),
            _ => false,
        }
    }
}

impl From<ciconf_gerrit::ExecError> for SyncError {
    fn from(e: ciconf_gerrit::ExecError) -> Self {
        SyncError::Gerrit(e.into())
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
