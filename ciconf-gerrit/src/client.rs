//! Typed wrappers around the review server's administrative commands.
//!
//! Each method is exactly one remote invocation. Command lines are joined
//! with `shell_words`, so every user-provided value reaches the server as a
//! single word; SQL literals additionally have their single quotes doubled.

use serde_json::{Map, Value};

use ciconf_core::{GroupName, Login};

use crate::classify::{Classification, Classifier, RemoteOutcome};
use crate::error::GerritError;
use crate::shell::RemoteShell;

/// Administrative SSH port of the review server.
pub const SSH_PORT: u16 = 29418;

/// Outcome of a create-style command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    AlreadyExisted,
}

impl Applied {
    pub fn created(self) -> bool {
        self == Applied::Created
    }
}

/// SQL string literal for `gerrit gsql`.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One row of a `gsql --format JSON` result.
pub type Row = Map<String, Value>;

pub struct GerritClient<'s> {
    shell: &'s mut dyn RemoteShell,
    classifier: &'static Classifier,
}

impl<'s> GerritClient<'s> {
    pub fn new(shell: &'s mut dyn RemoteShell) -> Self {
        Self {
            shell,
            classifier: Classifier::standard(),
        }
    }

    /// Run a command; any classified failure is an error.
    pub fn run(&mut self, command: &str) -> Result<String, GerritError> {
        let output = self.shell.execute(command)?;
        match self.classifier.classify(&output) {
            RemoteOutcome::Success => Ok(output.stdout),
            RemoteOutcome::Failed { class, message } => Err(GerritError::Remote {
                command: command.to_string(),
                kind: class,
                message,
            }),
        }
    }

    /// Run a create-style command; a conflict means the object already exists.
    pub fn run_idempotent(&mut self, command: &str) -> Result<Applied, GerritError> {
        match self.run(command) {
            Ok(_) => Ok(Applied::Created),
            Err(GerritError::Remote {
                kind: Classification::Conflict,
                message,
                ..
            }) => {
                tracing::debug!(%command, "already present: {message}");
                Ok(Applied::AlreadyExisted)
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub fn create_account(
        &mut self,
        login: &Login,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<Applied, GerritError> {
        let mut words = vec![
            "gerrit",
            "create-account",
            login.0.as_str(),
            "--full-name",
            full_name,
        ];
        if let Some(email) = email {
            words.extend(["--email", email]);
        }
        self.run_idempotent(&shell_words::join(words))
    }

    pub fn set_full_name(&mut self, login: &Login, full_name: &str) -> Result<(), GerritError> {
        let cmd = shell_words::join([
            "gerrit",
            "set-account",
            login.0.as_str(),
            "--full-name",
            full_name,
        ]);
        self.run(&cmd).map(|_| ())
    }

    /// Full name stored for an account, if it has one.
    pub fn full_name(&mut self, account_id: u64) -> Result<Option<String>, GerritError> {
        let query = format!("SELECT full_name FROM accounts WHERE account_id={account_id}");
        let rows = self.gsql(&query)?;
        Ok(rows.first().and_then(|row| column_str(row, "full_name")))
    }

    /// Internal account id for `login`, if the account exists.
    pub fn account_id(&mut self, login: &Login) -> Result<Option<u64>, GerritError> {
        let query = format!(
            "SELECT account_id FROM account_external_ids WHERE external_id={}",
            sql_literal(&format!("username:{}", login.0))
        );
        let rows = self.gsql(&query)?;
        match rows.first() {
            None => Ok(None),
            Some(row) => column_u64(row, "account_id")
                .map(Some)
                .ok_or_else(|| GerritError::Parse {
                    command: query,
                    message: format!("row without a numeric account_id: {row:?}"),
                }),
        }
    }

    /// Stored public keys of an account, exactly as the server holds them.
    pub fn ssh_keys(&mut self, account_id: u64) -> Result<Vec<String>, GerritError> {
        let query = format!(
            "SELECT ssh_public_key FROM account_ssh_keys WHERE account_id={account_id}"
        );
        let rows = self.gsql(&query)?;
        Ok(rows
            .iter()
            .filter_map(|row| column_str(row, "ssh_public_key"))
            .collect())
    }

    /// Remove the given keys in one invocation.
    pub fn delete_ssh_keys(&mut self, login: &Login, keys: &[String]) -> Result<(), GerritError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut words = vec!["gerrit", "set-account", login.0.as_str()];
        for key in keys {
            words.extend(["--delete-ssh-key", key.as_str()]);
        }
        self.run(&shell_words::join(words)).map(|_| ())
    }

    pub fn add_ssh_key(&mut self, login: &Login, key: &str) -> Result<(), GerritError> {
        let cmd = shell_words::join([
            "gerrit",
            "set-account",
            login.0.as_str(),
            "--add-ssh-key",
            key,
        ]);
        self.run(&cmd).map(|_| ())
    }

    /// Web-identity (`http...`) external ids linked to an account.
    pub fn http_external_ids(&mut self, account_id: u64) -> Result<Vec<String>, GerritError> {
        let query = format!(
            "SELECT external_id FROM account_external_ids \
             WHERE account_id={account_id} AND external_id LIKE 'http%'"
        );
        let rows = self.gsql(&query)?;
        Ok(rows
            .iter()
            .filter_map(|row| column_str(row, "external_id"))
            .collect())
    }

    pub fn delete_external_ids(
        &mut self,
        account_id: u64,
        ids: &[String],
    ) -> Result<(), GerritError> {
        if ids.is_empty() {
            return Ok(());
        }
        let list = ids
            .iter()
            .map(|id| sql_literal(id))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "DELETE FROM account_external_ids \
             WHERE account_id={account_id} AND external_id IN ({list})"
        );
        self.gsql(&query).map(|_| ())
    }

    pub fn insert_external_id(
        &mut self,
        account_id: u64,
        email: Option<&str>,
        external_id: &str,
    ) -> Result<(), GerritError> {
        let email = email.map(sql_literal).unwrap_or_else(|| "NULL".into());
        let query = format!(
            "INSERT INTO account_external_ids (account_id, email_address, external_id) \
             VALUES ({account_id}, {email}, {})",
            sql_literal(external_id)
        );
        self.gsql(&query).map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Groups and projects
    // -----------------------------------------------------------------------

    pub fn create_group(&mut self, group: &GroupName) -> Result<Applied, GerritError> {
        self.run_idempotent(&shell_words::join(["gerrit", "create-group", group.0.as_str()]))
    }

    /// Logins already in `group`.
    pub fn group_members(&mut self, group: &GroupName) -> Result<Vec<Login>, GerritError> {
        let query = format!(
            "SELECT e.external_id FROM account_external_ids e, account_group_members m, \
             account_groups g WHERE g.name={} AND m.group_id=g.group_id \
             AND e.account_id=m.account_id AND e.external_id LIKE 'username:%'",
            sql_literal(&group.0)
        );
        let rows = self.gsql(&query)?;
        Ok(rows
            .iter()
            .filter_map(|row| column_str(row, "external_id"))
            .filter_map(|id| id.strip_prefix("username:").map(Login::from))
            .collect())
    }

    /// Add members to a group in one invocation. Existing members are kept.
    pub fn add_members(&mut self, group: &GroupName, logins: &[Login]) -> Result<(), GerritError> {
        if logins.is_empty() {
            return Ok(());
        }
        let mut words = vec!["gerrit", "set-members", group.0.as_str()];
        for login in logins {
            words.extend(["--add", login.0.as_str()]);
        }
        self.run(&shell_words::join(words)).map(|_| ())
    }

    /// `(name, uuid)` of every group the server knows.
    pub fn group_uuids(&mut self) -> Result<Vec<(String, String)>, GerritError> {
        let rows = self.gsql("SELECT name, group_uuid FROM account_groups")?;
        Ok(rows
            .iter()
            .filter_map(|row| Some((column_str(row, "name")?, column_str(row, "group_uuid")?)))
            .collect())
    }

    pub fn create_project(&mut self, name: &str) -> Result<Applied, GerritError> {
        self.run_idempotent(&shell_words::join(["gerrit", "create-project", name]))
    }

    pub fn flush_caches(&mut self) -> Result<(), GerritError> {
        tracing::info!("flushing review server caches");
        self.run("gerrit flush-caches").map(|_| ())
    }

    // -----------------------------------------------------------------------
    // gsql
    // -----------------------------------------------------------------------

    /// Run a query through `gerrit gsql --format JSON` and return its rows.
    ///
    /// Every output line is one JSON object; `row` objects carry a `columns`
    /// map, stats objects are ignored and an `error` object fails the call.
    pub fn gsql(&mut self, query: &str) -> Result<Vec<Row>, GerritError> {
        let cmd = shell_words::join(["gerrit", "gsql", "--format", "JSON", "-c", query]);
        let stdout = self.run(&cmd)?;
        parse_gsql(&cmd, &stdout)
    }
}

pub(crate) fn parse_gsql(command: &str, stdout: &str) -> Result<Vec<Row>, GerritError> {
    let mut rows = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let value: Value = serde_json::from_str(line).map_err(|e| GerritError::Parse {
            command: command.to_string(),
            message: format!("{e}: {line}"),
        })?;
        match value.get("type").and_then(Value::as_str) {
            Some("row") => {
                if let Some(Value::Object(columns)) = value.get("columns") {
                    rows.push(columns.clone());
                }
            }
            Some("error") => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(line)
                    .to_string();
                return Err(GerritError::Remote {
                    command: command.to_string(),
                    kind: Classification::Fatal,
                    message,
                });
            }
            _ => {}
        }
    }
    Ok(rows)
}

fn column_str(row: &Row, name: &str) -> Option<String> {
    match row.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn column_u64(row: &Row, name: &str) -> Option<u64> {
    match row.get(name)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedShell;
    use rstest::rstest;

    #[rstest]
    #[case::plain("plain")]
    #[case::spaces("two words")]
    #[case::double_quotes(r#"a "b" \c"#)]
    #[case::single_quote("o'neil")]
    #[case::substitution("$(rm -rf /)")]
    #[case::empty("")]
    fn values_reach_the_server_as_one_word(#[case] value: &str) {
        let mut shell = ScriptedShell::new();
        let mut client = GerritClient::new(&mut shell);
        client.add_ssh_key(&Login::from("jdoe"), value).unwrap();
        let words = shell_words::split(&shell.commands()[0]).unwrap();
        assert_eq!(words, ["gerrit", "set-account", "jdoe", "--add-ssh-key", value]);
    }

    #[test]
    fn gsql_query_is_one_word_and_literals_double_quotes() {
        assert_eq!(sql_literal("o'neil"), "'o''neil'");
        let mut shell = ScriptedShell::new();
        let mut client = GerritClient::new(&mut shell);
        client.full_name(7).unwrap();
        assert_eq!(
            shell.commands(),
            ["gerrit gsql --format JSON -c 'SELECT full_name FROM accounts WHERE account_id=7'"]
        );
    }

    #[test]
    fn group_members_strip_the_username_scheme() {
        let mut shell = ScriptedShell::new().on_rows(
            "account_group_members",
            "external_id",
            &["username:alice", "username:bob"],
        );
        let mut client = GerritClient::new(&mut shell);
        let members = client.group_members(&GroupName::from("core")).unwrap();
        assert_eq!(members, [Login::from("alice"), Login::from("bob")]);
        assert_eq!(shell.matching("g.name='core'").len(), 1);
    }

    #[test]
    fn gsql_rows_are_collected_and_stats_ignored() {
        let out = concat!(
            "{\"type\":\"row\",\"columns\":{\"account_id\":\"1000002\"}}\n",
            "{\"type\":\"query-stats\",\"rowCount\":1,\"runTimeMilliseconds\":2}\n"
        );
        let rows = parse_gsql("q", out).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(column_u64(&rows[0], "account_id"), Some(1000002));
    }

    #[test]
    fn gsql_error_row_is_fatal() {
        let err = parse_gsql("q", "{\"type\":\"error\",\"message\":\"no such table\"}\n")
            .unwrap_err();
        match err {
            GerritError::Remote { kind, message, .. } => {
                assert_eq!(kind, Classification::Fatal);
                assert_eq!(message, "no such table");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_group_conflict_is_already_existed() {
        let mut shell = ScriptedShell::new().on("create-group", "", "fatal: Name Already Used\n");
        let mut client = GerritClient::new(&mut shell);
        let applied = client.create_group(&GroupName::from("ci-admins")).unwrap();
        assert_eq!(applied, Applied::AlreadyExisted);
        assert_eq!(shell.commands(), ["gerrit create-group ci-admins"]);
    }

    #[test]
    fn create_group_other_fatal_is_an_error() {
        let mut shell =
            ScriptedShell::new().on("create-group", "", "fatal: Name Already Used by 7\n");
        let mut client = GerritClient::new(&mut shell);
        let err = client.create_group(&GroupName::from("ci-admins")).unwrap_err();
        assert!(!err.is_conflict());
    }

    #[test]
    fn add_members_is_one_command() {
        let mut shell = ScriptedShell::new();
        let mut client = GerritClient::new(&mut shell);
        client
            .add_members(
                &GroupName::from("core"),
                &[Login::from("alice"), Login::from("bob")],
            )
            .unwrap();
        assert_eq!(
            shell.commands(),
            ["gerrit set-members core --add alice --add bob"]
        );
    }

    #[test]
    fn missing_account_is_none() {
        let mut shell = ScriptedShell::new().on(
            "account_external_ids WHERE external_id",
            "{\"type\":\"query-stats\",\"rowCount\":0}\n",
            "",
        );
        let mut client = GerritClient::new(&mut shell);
        assert_eq!(client.account_id(&Login::from("ghost")).unwrap(), None);
    }
}
