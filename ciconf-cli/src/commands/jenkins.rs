//! `ci-configurator jenkins` and `ci-configurator plugins`.

use anyhow::{Context, Result};
use clap::Args;

use ciconf_gerrit::{HostRunner, InitScript};
use ciconf_sync::jenkins::required_plugins;
use ciconf_sync::{prepare_jenkins, Prepared};

use super::{print_done, print_skipped, print_write, Workspace};

#[derive(Args, Debug)]
pub struct JenkinsArgs {}

impl JenkinsArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        update_jenkins(ws)
    }
}

/// Arguments for `ci-configurator plugins`.
#[derive(Args, Debug)]
pub struct PluginsArgs {
    /// Emit a JSON array instead of a space-separated line.
    #[arg(long)]
    pub json: bool,
}

impl PluginsArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        let plugins = required_plugins(&ws.paths).context("failed to read control.yml")?;
        if self.json {
            let json = serde_json::to_string_pretty(&plugins)
                .context("failed to serialize plugin list")?;
            println!("{json}");
        } else {
            println!("{}", plugins.join(" "));
        }
        Ok(())
    }
}

pub(crate) fn update_jenkins(ws: &Workspace) -> Result<()> {
    let pass = match prepare_jenkins(&ws.paths, ws.relations(), &ws.config)
        .context("failed to read jenkins relation")?
    {
        Prepared::Ready(pass) => pass,
        Prepared::Skipped(why) => {
            print_skipped("jenkins", &why);
            return Ok(());
        }
    };
    let renderer = ws.renderer()?;
    let mut runner = HostRunner::new();
    let mut service = InitScript::jenkins();

    let report = pass
        .run(&mut runner, &mut service, &renderer)
        .context("jenkins update failed")?;

    print_done("jenkins config");
    for result in report.security.iter().chain(report.jjb_config.iter()) {
        print_write(result);
    }
    if report.restarted {
        print_done("jenkins restarted");
    }
    if report.jobs_updated {
        print_done("jobs updated");
    }
    if report.setup_ran {
        print_done("setup.d scripts ran");
    }
    if !report.required_packages.is_empty() {
        println!(
            "  packages required by the config repository: {}",
            report.required_packages.join(" ")
        );
    }
    Ok(())
}
