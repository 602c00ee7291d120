use anyhow::{Context, Result};
use clap::Args;

use ciconf_sync::{update_zuul, Prepared};

use super::{print_done, print_skipped, Workspace};

#[derive(Args, Debug)]
pub struct ZuulArgs {}

impl ZuulArgs {
    pub fn run(self, ws: &Workspace) -> Result<()> {
        check_zuul(ws)
    }
}

pub(crate) fn check_zuul(ws: &Workspace) -> Result<()> {
    match update_zuul(&ws.paths, ws.relations()).context("failed to read zuul relation")? {
        Prepared::Ready(dir) => print_done(format!("zuul layout at {}", dir.display())),
        Prepared::Skipped(why) => print_skipped("zuul", &why),
    }
    Ok(())
}
