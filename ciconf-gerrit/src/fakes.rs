//! In-memory doubles for the remote shell, local runner, directory and
//! service control. They script responses and record what was asked of them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ciconf_core::{Login, MemberRecord, TeamName};

use crate::directory::{Directory, MemberEntry};
use crate::error::{ExecError, GerritError};
use crate::restart::{LifecycleError, ServiceControl};
use crate::runas::{CommandRunner, RunAs};
use crate::shell::{CommandOutput, RemoteShell};

// ---------------------------------------------------------------------------
// Remote shell
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Output(CommandOutput),
    Transport(String),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
    once: bool,
    used: bool,
}

/// Remote shell answering from a rule list.
///
/// Needles are looked up in the command as the server splits it into words,
/// so they are written without shell quoting. The first unused rule whose
/// needle matches wins; `once` rules are retired after one use. Unmatched
/// commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedShell {
    rules: Vec<Rule>,
    commands: Vec<String>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, needle: &str, reply: Reply, once: bool) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            reply,
            once,
            used: false,
        });
        self
    }

    pub fn on(self, needle: &str, stdout: &str, stderr: &str) -> Self {
        self.push(needle, Reply::Output(CommandOutput::new(stdout, stderr)), false)
    }

    pub fn on_once(self, needle: &str, stdout: &str, stderr: &str) -> Self {
        self.push(needle, Reply::Output(CommandOutput::new(stdout, stderr)), true)
    }

    /// Answer `needle` with gsql JSON rows built from `rows`.
    pub fn on_rows(self, needle: &str, column: &str, rows: &[&str]) -> Self {
        let mut out = String::new();
        for value in rows {
            out.push_str(
                &serde_json::json!({"type": "row", "columns": {column: value}}).to_string(),
            );
            out.push('\n');
        }
        out.push_str(&format!(
            "{{\"type\":\"query-stats\",\"rowCount\":{}}}\n",
            rows.len()
        ));
        self.on(needle, &out, "")
    }

    pub fn transport_failure(self, needle: &str, message: &str) -> Self {
        self.push(needle, Reply::Transport(message.to_string()), false)
    }

    /// Every command received, in order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Commands whose words contain `needle`, as received.
    pub fn matching(&self, needle: &str) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| unquoted(c).contains(needle))
            .map(String::as_str)
            .collect()
    }
}

/// `command` split the way the server splits it, rejoined with spaces.
fn unquoted(command: &str) -> String {
    shell_words::split(command)
        .map(|words| words.join(" "))
        .unwrap_or_else(|_| command.to_string())
}

impl RemoteShell for ScriptedShell {
    fn execute(&mut self, command: &str) -> Result<CommandOutput, GerritError> {
        self.commands.push(command.to_string());
        let words = unquoted(command);
        let rule = self
            .rules
            .iter_mut()
            .find(|r| !r.used && words.contains(&r.needle));
        let Some(rule) = rule else {
            return Ok(CommandOutput::default());
        };
        if rule.once {
            rule.used = true;
        }
        match &rule.reply {
            Reply::Output(out) => Ok(out.clone()),
            Reply::Transport(message) => Err(GerritError::Transport {
                command: command.to_string(),
                message: message.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Local runner
// ---------------------------------------------------------------------------

/// One recorded local invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub user: String,
    pub cwd: PathBuf,
    pub command: String,
}

/// Command runner that never spawns anything.
///
/// Responses are scripted by substring like [`ScriptedShell`]. `git clone`
/// creates its target directory so later file writes have somewhere to go.
#[derive(Debug, Default)]
pub struct FakeRunner {
    stdout: Vec<(String, String)>,
    failures: Vec<String>,
    invocations: Vec<Invocation>,
    owned: Vec<(PathBuf, String)>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, stdout: &str) -> Self {
        self.stdout.push((needle.to_string(), stdout.to_string()));
        self
    }

    /// Commands containing `needle` exit non-zero.
    pub fn failing(mut self, needle: &str) -> Self {
        self.failures.push(needle.to_string());
        self
    }

    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    pub fn commands(&self) -> Vec<&str> {
        self.invocations.iter().map(|i| i.command.as_str()).collect()
    }

    pub fn matching(&self, needle: &str) -> Vec<&str> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    pub fn owned(&self) -> &[(PathBuf, String)] {
        &self.owned
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &mut self,
        identity: &RunAs,
        program: &str,
        args: &[&str],
    ) -> Result<String, GerritError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.invocations.push(Invocation {
            user: identity.user.clone(),
            cwd: identity.cwd.clone(),
            command: command.clone(),
        });

        if self.failures.iter().any(|n| command.contains(n.as_str())) {
            return Err(ExecError::Failure {
                command,
                user: identity.user.clone(),
                status: "exit status: 1".into(),
                stdout: String::new(),
                stderr: "scripted failure".into(),
            }
            .into());
        }

        if program == "git" && args.first() == Some(&"clone") {
            if let Some(target) = args.last() {
                let target = identity.cwd.join(target);
                std::fs::create_dir_all(&target)
                    .map_err(|e| crate::error::io_err(&target, e))?;
            }
        }

        Ok(self
            .stdout
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }

    fn own(&mut self, path: &Path, user: &str) -> Result<(), GerritError> {
        self.owned.push((path.to_path_buf(), user.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Directory backed by maps; counts person lookups.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    teams: BTreeMap<TeamName, Vec<MemberEntry>>,
    people: BTreeMap<Login, MemberRecord>,
    person_lookups: usize,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team<I>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = MemberEntry>,
    {
        self.teams
            .insert(TeamName::from(name), members.into_iter().collect());
        self
    }

    /// Register people with a single key each and no identity.
    pub fn people<'a, I>(mut self, logins: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for login in logins {
            self.people.insert(
                Login::from(login),
                MemberRecord {
                    login: Login::from(login),
                    full_name: login.to_uppercase(),
                    email: Some(format!("{login}@example.com")),
                    ssh_keys: vec![format!("ssh-ed25519 KEY-{login} {login}@host")],
                    external_id: None,
                },
            );
        }
        self
    }

    pub fn record(mut self, record: MemberRecord) -> Self {
        self.people.insert(record.login.clone(), record);
        self
    }

    pub fn person_lookups(&self) -> usize {
        self.person_lookups
    }
}

impl Directory for FakeDirectory {
    fn members(&mut self, team: &TeamName) -> Result<Vec<MemberEntry>, GerritError> {
        self.teams
            .get(team)
            .cloned()
            .ok_or_else(|| GerritError::Directory {
                url: team.to_string(),
                message: "no such team".into(),
            })
    }

    fn person(&mut self, login: &Login) -> Result<MemberRecord, GerritError> {
        self.person_lookups += 1;
        self.people
            .get(login)
            .cloned()
            .ok_or_else(|| GerritError::Directory {
                url: login.to_string(),
                message: "no such person".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Service control
// ---------------------------------------------------------------------------

/// Service that records stop/start calls.
#[derive(Debug)]
pub struct RecordingService {
    name: String,
    calls: Vec<&'static str>,
    fail_stop: bool,
}

impl RecordingService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Vec::new(),
            fail_stop: false,
        }
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn calls(&self) -> &[&'static str] {
        &self.calls
    }
}

impl ServiceControl for RecordingService {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&mut self) -> Result<(), LifecycleError> {
        self.calls.push("stop");
        if self.fail_stop {
            return Err(LifecycleError {
                service: self.name.clone(),
                action: "stop",
                message: "not running".into(),
            });
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), LifecycleError> {
        self.calls.push("start");
        Ok(())
    }
}
