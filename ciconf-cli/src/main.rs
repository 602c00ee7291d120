//! ci-configurator: applies a CI config repository to gerrit, jenkins and zuul.
//!
//! # Usage
//!
//! ```text
//! ci-configurator [--root <dir>] [--relation-file <yaml>] refresh-config [--bundled <dir>] [--no-update]
//! ci-configurator gerrit [--git-root <dir>]
//! ci-configurator sync-members
//! ci-configurator jenkins
//! ci-configurator plugins
//! ci-configurator zuul
//! ci-configurator status [--json]
//! ```

mod commands;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    gerrit::{GerritArgs, MembersArgs},
    jenkins::{JenkinsArgs, PluginsArgs},
    refresh::RefreshArgs,
    status::StatusArgs,
    zuul::ZuulArgs,
    GlobalArgs, Workspace,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ci-configurator",
    version,
    about = "Reconcile gerrit, jenkins and zuul with a CI config repository",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Log output format.
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Refresh the config checkout, then run every update pass.
    RefreshConfig(RefreshArgs),

    /// Provision projects and install permissions, hooks and theme.
    Gerrit(GerritArgs),

    /// Reconcile group membership against the people directory.
    SyncMembers(MembersArgs),

    /// Install jenkins security and job-builder config, then update jobs.
    Jenkins(JenkinsArgs),

    /// Print the jenkins plugins the config repository requires.
    Plugins(PluginsArgs),

    /// Check the zuul layout is in place.
    Zuul(ZuulArgs),

    /// Show provisioning state of the declared projects.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'; expected: text, json")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Logs go to stderr; stdout carries the command's own output.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("warning: logging not initialised: {e}");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);
    let ws = Workspace::open(&cli.global)?;
    match cli.command {
        Commands::RefreshConfig(args) => args.run(&ws),
        Commands::Gerrit(args) => args.run(&ws),
        Commands::SyncMembers(args) => args.run(&ws),
        Commands::Jenkins(args) => args.run(&ws),
        Commands::Plugins(args) => args.run(&ws),
        Commands::Zuul(args) => args.run(&ws),
        Commands::Status(args) => args.run(&ws),
    }
}
