//! # ciconf-gerrit
//!
//! Review-server reconciliation: accounts, groups and projects.
//!
//! - [`shell`]: the remote command channel ([`RemoteShell`], [`SshSession`])
//! - [`classify`]: error text → [`Classification`]
//! - [`client`]: one method per administrative command ([`GerritClient`])
//! - [`directory`] / [`launchpad`]: team membership and nested expansion
//! - [`oauth`]: signed access to the directory ([`LaunchpadCredentials`])
//! - [`accounts`]: [`AccountReconciler`]
//! - [`oracle`]: [`oracle::is_initialized`]
//! - [`provision`]: [`ProjectProvisioner`]
//! - [`runas`]: local commands as the service account
//! - [`restart`]: [`RestartCoordinator`]
//! - `fakes`: scripted doubles of every seam (`test-utils` feature)

pub mod accounts;
pub mod classify;
pub mod client;
pub mod directory;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;
pub mod launchpad;
pub mod oauth;
pub mod oracle;
pub mod provision;
pub mod restart;
pub mod runas;
pub mod shell;

pub use accounts::{AccountReconciler, ReconcileReport};
pub use classify::{Classification, Classifier, RemoteOutcome};
pub use client::{Applied, GerritClient, SSH_PORT};
pub use directory::{expand_teams, Directory, MemberEntry, Visited};
pub use error::{ExecError, GerritError, Severity};
pub use launchpad::LaunchpadDirectory;
pub use oauth::LaunchpadCredentials;
pub use provision::{gerrit_hostname, ProjectProvisioner, ProvisionReport, ProvisionSettings};
pub use restart::{InitScript, RestartCoordinator, RestartSignal, ServiceControl};
pub use runas::{CommandRunner, HostRunner, RunAs};
pub use shell::{CommandOutput, RemoteShell, SshSession, SshTarget};
