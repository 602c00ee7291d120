//! Remote command channel to the review-server host.
//!
//! One [`SshSession`] is opened per run and handed by `&mut` to whoever needs
//! it; nothing global. The session is an OpenSSH control master: every
//! [`RemoteShell::execute`] call is a single multiplexed round trip, and the
//! master is shut down when the session is dropped.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{io_err, GerritError};

/// Raw result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Something that can run an administrative command on the review server.
///
/// Implementations return whatever the server printed. Failures of the
/// channel itself are [`GerritError::Transport`]; error text on stderr is
/// left for [`crate::classify`] to interpret.
pub trait RemoteShell {
    fn execute(&mut self, command: &str) -> Result<CommandOutput, GerritError>;
}

/// Where and how to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key_file: PathBuf,
}

impl SshTarget {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        port: u16,
        key_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port,
            key_file: key_file.into(),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// `ssh` exits with this status when the connection itself failed.
const SSH_TRANSPORT_STATUS: i32 = 255;

/// Multiplexed OpenSSH session.
///
/// The host key is accepted unconditionally and never recorded.
pub struct SshSession {
    target: SshTarget,
    control_path: PathBuf,
    // Holds the control socket; removed after the master exits.
    _control_dir: tempfile::TempDir,
}

impl SshSession {
    /// Start the control master and wait until it has authenticated.
    pub fn connect(target: SshTarget) -> Result<Self, GerritError> {
        let control_dir = tempfile::Builder::new()
            .prefix("ciconf-ssh")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        let control_path = control_dir.path().join("master");
        let log_path = control_dir.path().join("master.log");

        tracing::debug!(
            host = %target.host,
            port = target.port,
            user = %target.user,
            "opening ssh control master"
        );

        let status = Command::new("ssh")
            .args(["-f", "-N", "-M"])
            .arg("-S")
            .arg(&control_path)
            .args([
                "-o",
                "ControlPersist=yes",
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "UserKnownHostsFile=/dev/null",
                "-o",
                "BatchMode=yes",
            ])
            .arg("-E")
            .arg(&log_path)
            .arg("-i")
            .arg(&target.key_file)
            .arg("-p")
            .arg(target.port.to_string())
            .arg(target.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| GerritError::Transport {
                command: "ssh".into(),
                message: format!("failed to start ssh: {e}"),
            })?;

        if !status.success() {
            let message = fs::read_to_string(&log_path)
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            return Err(GerritError::Transport {
                command: format!("ssh {}", target.destination()),
                message: if message.is_empty() {
                    format!("control master exited with {status}")
                } else {
                    message
                },
            });
        }

        Ok(Self {
            target,
            control_path,
            _control_dir: control_dir,
        })
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    pub fn control_path(&self) -> &Path {
        &self.control_path
    }

    fn client(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-S")
            .arg(&self.control_path)
            .arg("-p")
            .arg(self.target.port.to_string())
            .arg(self.target.destination());
        cmd
    }
}

impl RemoteShell for SshSession {
    fn execute(&mut self, command: &str) -> Result<CommandOutput, GerritError> {
        tracing::debug!(%command, "remote");
        let output = self
            .client()
            .arg("--")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GerritError::Transport {
                command: command.to_string(),
                message: format!("failed to start ssh: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.code() == Some(SSH_TRANSPORT_STATUS) {
            return Err(GerritError::Transport {
                command: command.to_string(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let _ = self
            .client()
            .args(["-O", "exit"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}
