//! `ci-configurator status`: what the config repository declares and how
//! much of it the review server already has.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ciconf_gerrit::provision::GIT_ROOT;
use ciconf_gerrit::HostRunner;
use ciconf_sync::repo::is_ci_configured;
use ciconf_sync::{hash_store, jenkins, project_status, Prepared, ProjectStatus};

/// Arguments for `ci-configurator status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Root of the gerrit server's bare repositories.
    #[arg(long, default_value = GIT_ROOT)]
    pub git_root: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    config_dir: PathBuf,
    configured: bool,
    jenkins_installed_at: Option<DateTime<Utc>>,
    projects: Vec<ProjectStatus>,
    skipped: Option<String>,
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "Project")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Upstream")]
    upstream: String,
}

impl StatusArgs {
    pub fn run(self, ws: &super::Workspace) -> Result<()> {
        let mut runner = HostRunner::new();
        let (projects, skipped) = match project_status(&ws.paths, &mut runner, &self.git_root)
            .context("failed to query project state")?
        {
            Prepared::Ready(projects) => (projects, None),
            Prepared::Skipped(why) => (Vec::new(), Some(why)),
        };
        let jenkins_installed_at = last_install(&ws.paths.state_dir())?;
        let report = StatusReport {
            config_dir: ws.paths.config_dir(),
            configured: is_ci_configured(&ws.paths),
            jenkins_installed_at,
            projects,
            skipped,
        };

        if self.json {
            let json = serde_json::to_string_pretty(&report)
                .context("failed to serialize status report")?;
            println!("{json}");
            return Ok(());
        }
        print_report(&report);
        Ok(())
    }
}

fn last_install(state_dir: &std::path::Path) -> Result<Option<DateTime<Utc>>> {
    if !hash_store::store_path_at(state_dir, jenkins::HASH_SCOPE).exists() {
        return Ok(None);
    }
    let store =
        hash_store::load_at(state_dir, jenkins::HASH_SCOPE).context("failed to read hash store")?;
    Ok(Some(store.synced_at))
}

fn format_age(at: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(at);
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn print_report(report: &StatusReport) {
    let configured = if report.configured {
        "■".green().bold()
    } else {
        "□".red().bold()
    };
    println!("{configured} config: {}", report.config_dir.display());
    match report.jenkins_installed_at {
        Some(at) => println!("  jenkins config installed {}", format_age(at)),
        None => println!("  jenkins config never installed"),
    }

    if let Some(why) = &report.skipped {
        println!("{} projects: {why}", "·".dimmed());
        return;
    }
    let rows: Vec<ProjectRow> = report
        .projects
        .iter()
        .map(|p| ProjectRow {
            name: p.name.clone(),
            state: if p.initialized {
                format!("{} initialized", "■".green())
            } else {
                format!("{} pending", "■".yellow())
            },
            upstream: p.upstream.clone(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ages_are_coarse() {
        assert_eq!(format_age(Utc::now()), "just now");
        assert_eq!(format_age(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(format_age(Utc::now() - Duration::hours(3)), "3h ago");
        assert_eq!(format_age(Utc::now() - Duration::days(2)), "2d ago");
    }
}
