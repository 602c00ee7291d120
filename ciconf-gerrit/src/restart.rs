//! Restart coordination.
//!
//! Sub-steps of a gerrit pass raise [`RestartSignal`]s. At the end of the pass
//! the coordinator restarts the service once if any signal was raised. Stop
//! and start are best effort: their failures are [`LifecycleError`]s of
//! [`Severity::Advisory`], logged and never escalated.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::error::Severity;

/// Init script controlling the review server.
pub const GERRIT_INIT_SCRIPT: &str = "/etc/init.d/gerrit";
pub const JENKINS_INIT_SCRIPT: &str = "/etc/init.d/jenkins";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RestartSignal {
    Projects,
    Permissions,
    Hooks,
    Theme,
    Security,
}

impl fmt::Display for RestartSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestartSignal::Projects => "projects",
            RestartSignal::Permissions => "permissions",
            RestartSignal::Hooks => "hooks",
            RestartSignal::Theme => "theme",
            RestartSignal::Security => "security",
        };
        f.write_str(name)
    }
}

/// Failure of a lifecycle operation.
#[derive(Debug, Error)]
#[error("{action} of {service} failed: {message}")]
pub struct LifecycleError {
    pub service: String,
    pub action: &'static str,
    pub message: String,
}

impl LifecycleError {
    pub fn severity(&self) -> Severity {
        Severity::Advisory
    }
}

/// Stop/start of a long-running service.
pub trait ServiceControl {
    fn name(&self) -> &str;
    fn stop(&mut self) -> Result<(), LifecycleError>;
    fn start(&mut self) -> Result<(), LifecycleError>;
}

/// A SysV init script (`<script> stop|start`).
#[derive(Debug, Clone)]
pub struct InitScript {
    name: String,
    script: PathBuf,
}

impl InitScript {
    pub fn new(name: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
        }
    }

    pub fn gerrit() -> Self {
        Self::new("gerrit", GERRIT_INIT_SCRIPT)
    }

    pub fn jenkins() -> Self {
        Self::new("jenkins", JENKINS_INIT_SCRIPT)
    }

    fn invoke(&self, action: &'static str) -> Result<(), LifecycleError> {
        let fail = |message: String| LifecycleError {
            service: self.name.clone(),
            action,
            message,
        };
        let output = Command::new(&self.script)
            .arg(action)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| fail(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(fail(format!(
                "{} {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl ServiceControl for InitScript {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&mut self) -> Result<(), LifecycleError> {
        self.invoke("stop")
    }

    fn start(&mut self) -> Result<(), LifecycleError> {
        self.invoke("start")
    }
}

/// Log an advisory failure and carry on.
pub fn best_effort(result: Result<(), LifecycleError>) {
    if let Err(e) = result {
        tracing::warn!(severity = %e.severity(), "{e}");
    }
}

#[derive(Debug, Default, Clone)]
pub struct RestartCoordinator {
    raised: BTreeSet<RestartSignal>,
}

impl RestartCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, signal: RestartSignal) {
        self.raised.insert(signal);
    }

    pub fn raise_if(&mut self, signal: RestartSignal, condition: bool) {
        if condition {
            self.raise(signal);
        }
    }

    pub fn required(&self) -> bool {
        !self.raised.is_empty()
    }

    pub fn signals(&self) -> impl Iterator<Item = RestartSignal> + '_ {
        self.raised.iter().copied()
    }

    /// Stop then start `service` if anything was raised. Returns whether a
    /// restart was attempted.
    pub fn finish(self, service: &mut dyn ServiceControl) -> bool {
        if !self.required() {
            tracing::debug!(service = service.name(), "no restart required");
            return false;
        }
        let reasons = self
            .raised
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        tracing::info!(service = service.name(), %reasons, "restarting");
        best_effort(service.stop());
        best_effort(service.start());
        true
    }
}
