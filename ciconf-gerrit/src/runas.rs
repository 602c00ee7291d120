//! Local commands run as a dedicated service identity.
//!
//! Repository work (clone, commit, push) happens as the review server's own
//! account so the files it touches stay owned by that account. Instead of
//! forking and dropping privileges by hand, a [`RunAs`] value describes the
//! identity and [`HostRunner`] applies it through `CommandExt::uid`/`gid`.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use nix::unistd::{chown, Uid, User};

use crate::error::{io_err, ExecError, GerritError};

/// Account the review server runs as.
pub const SERVICE_USER: &str = "gerrit2";

/// Mode given to scratch directories handed to the service account.
pub const SCRATCH_MODE: u32 = 0o774;

/// Who runs a command, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAs {
    pub user: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl RunAs {
    pub fn new(user: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    /// The identity this process already runs as.
    pub fn current(cwd: impl Into<PathBuf>) -> Self {
        let user = User::from_uid(Uid::effective())
            .ok()
            .flatten()
            .map(|u| u.name)
            .unwrap_or_else(|| "root".to_string());
        Self::new(user, cwd)
    }

    /// Same identity, different working directory.
    pub fn within(&self, cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..self.clone()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Runs local programs on behalf of the provisioner.
pub trait CommandRunner {
    /// Run `program args...` as `identity`; non-zero exit is
    /// [`ExecError::Failure`]. Returns stdout.
    fn run(&mut self, identity: &RunAs, program: &str, args: &[&str])
        -> Result<String, GerritError>;

    /// Hand `path` to `user`. Directories also get [`SCRATCH_MODE`];
    /// regular files keep their mode so git does not see them as executable.
    fn own(&mut self, path: &Path, user: &str) -> Result<(), GerritError>;

    /// Like [`CommandRunner::run`] but a non-zero exit is `Ok(false)`.
    fn probe(
        &mut self,
        identity: &RunAs,
        program: &str,
        args: &[&str],
    ) -> Result<bool, GerritError> {
        match self.run(identity, program, args) {
            Ok(_) => Ok(true),
            Err(e) if e.is_exit_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Runs commands on this host.
#[derive(Debug, Default)]
pub struct HostRunner;

impl HostRunner {
    pub fn new() -> Self {
        Self
    }

    fn lookup(user: &str) -> Result<User, ExecError> {
        User::from_name(user)
            .map_err(|e| ExecError::UserLookup {
                user: user.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| ExecError::UnknownUser(user.to_string()))
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

impl CommandRunner for HostRunner {
    fn run(
        &mut self,
        identity: &RunAs,
        program: &str,
        args: &[&str],
    ) -> Result<String, GerritError> {
        let user = Self::lookup(&identity.user)?;
        let rendered = render_command(program, args);
        tracing::debug!(user = %identity.user, cwd = %identity.cwd.display(), "{rendered}");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&identity.cwd)
            .env("HOME", &user.dir)
            .envs(&identity.env)
            .stdin(Stdio::null());
        if Uid::effective() != user.uid {
            cmd.uid(user.uid.as_raw()).gid(user.gid.as_raw());
        }

        let output = cmd.output().map_err(|err| ExecError::Start {
            command: rendered.clone(),
            err,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(ExecError::Failure {
                command: rendered,
                user: identity.user.clone(),
                status: output.status.to_string(),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(stdout)
    }

    fn own(&mut self, path: &Path, user: &str) -> Result<(), GerritError> {
        let owner = Self::lookup(user)?;
        if Uid::effective() != owner.uid {
            chown(path, Some(owner.uid), Some(owner.gid)).map_err(|e| io_err(path, e.into()))?;
        }
        let meta = std::fs::symlink_metadata(path).map_err(|e| io_err(path, e))?;
        if !meta.is_dir() {
            return Ok(());
        }
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(SCRATCH_MODE))
            .map_err(|e| io_err(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn current_user() -> String {
        RunAs::current("/").user
    }

    #[test]
    fn run_returns_stdout() {
        let dir = TempDir::new().unwrap();
        let who = RunAs::new(current_user(), dir.path());
        let out = HostRunner::new().run(&who, "echo", &["hello"]).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn probe_maps_exit_failure_to_false() {
        let dir = TempDir::new().unwrap();
        let who = RunAs::new(current_user(), dir.path());
        assert!(!HostRunner::new().probe(&who, "false", &[]).unwrap());
        assert!(HostRunner::new().probe(&who, "true", &[]).unwrap());
    }

    #[test]
    fn unknown_user_is_reported() {
        let dir = TempDir::new().unwrap();
        let who = RunAs::new("no-such-user-ciconf", dir.path());
        let err = HostRunner::new().run(&who, "true", &[]).unwrap_err();
        assert!(matches!(
            err,
            GerritError::Exec(ExecError::UnknownUser(ref u)) if u == "no-such-user-ciconf"
        ));
    }

    #[test]
    fn own_sets_scratch_mode() {
        let dir = TempDir::new().unwrap();
        HostRunner::new().own(dir.path(), &current_user()).unwrap();
        let mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SCRATCH_MODE);
    }

    #[test]
    fn own_leaves_file_mode_alone() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join(".gitreview");
        std::fs::write(&file, "[gerrit]\n").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        HostRunner::new().own(&file, &current_user()).unwrap();
        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn owned_gitreview_is_tracked_as_a_regular_file() {
        let dir = TempDir::new().unwrap();
        let who = RunAs::new(current_user(), dir.path());
        let mut runner = HostRunner::new();
        runner.run(&who, "git", &["init", "--quiet"]).unwrap();

        let file = dir.path().join(".gitreview");
        std::fs::write(&file, "[gerrit]\nhost=review.example.com\n").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();
        runner.own(dir.path(), &current_user()).unwrap();
        runner.own(&file, &current_user()).unwrap();
        runner.run(&who, "git", &["add", ".gitreview"]).unwrap();

        let staged = runner
            .run(&who, "git", &["ls-files", "-s", ".gitreview"])
            .unwrap();
        assert!(staged.starts_with("100644 "), "got: {staged}");
    }

    #[test]
    fn within_keeps_user_and_env() {
        let base = RunAs::new("gerrit2", "/tmp").with_env("GIT_SSH_COMMAND", "ssh");
        let moved = base.within("/tmp/repo");
        assert_eq!(moved.user, "gerrit2");
        assert_eq!(moved.cwd, PathBuf::from("/tmp/repo"));
        assert_eq!(moved.env.get("GIT_SSH_COMMAND").map(String::as_str), Some("ssh"));
    }
}
