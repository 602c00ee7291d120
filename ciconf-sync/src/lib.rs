//! # ciconf-sync
//!
//! One update pass per target, plus the filesystem plumbing they share.
//!
//! - [`gerrit`]: projects, permissions, hooks, theme, restart
//! - [`members`]: groups.yml teams → accounts
//! - [`jenkins`] / [`zuul`]
//! - [`repo`]: config repository refresh
//! - [`writer`] + [`hash_store`]: hash-gated atomic installs
//! - [`fsync`], [`context`], [`status`]

pub mod context;
pub mod error;
pub mod fsync;
pub mod gerrit;
pub mod hash_store;
pub mod jenkins;
pub mod members;
pub mod repo;
pub mod status;
pub mod writer;
pub mod zuul;

pub use error::SyncError;
pub use gerrit::{prepare_gerrit, GerritIo, GerritPass, GerritReport, Prepared};
pub use jenkins::{prepare_jenkins, JenkinsPass, JenkinsReport, JenkinsTargets};
pub use members::sync_members;
pub use repo::{refresh_config, Refreshed};
pub use status::{project_status, ProjectStatus};
pub use writer::WriteResult;
pub use zuul::update_zuul;
