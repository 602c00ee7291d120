pub mod gerrit;
pub mod jenkins;
pub mod refresh;
pub mod status;
pub mod zuul;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ciconf_core::paths::DEFAULT_ROOT;
use ciconf_core::{CharmConfig, CiPaths, FileRelation, HookToolRelation, RelationSource};
use ciconf_renderer::Renderer;
use ciconf_sync::WriteResult;

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Charm root holding config.yaml, state/ and the ci-config checkout.
    #[arg(long, global = true, env = "CICONF_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Charm configuration file (defaults to <root>/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Read relation settings from a YAML document instead of the hook tools.
    #[arg(long, global = true, env = "CICONF_RELATION_FILE")]
    pub relation_file: Option<PathBuf>,

    /// Directory of template overrides.
    #[arg(long, global = true)]
    pub templates: Option<PathBuf>,
}

/// Everything a pass needs from the host, resolved once per invocation.
pub struct Workspace {
    pub paths: CiPaths,
    pub config: CharmConfig,
    relations: Box<dyn RelationSource>,
    templates: Option<PathBuf>,
}

impl Workspace {
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let paths = CiPaths::new(&global.root);
        let config_path = global
            .config
            .clone()
            .unwrap_or_else(|| paths.charm_config());
        let config = CharmConfig::load_or_default_at(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        let relations: Box<dyn RelationSource> = match &global.relation_file {
            Some(file) => Box::new(FileRelation::new(file)),
            None => Box::new(HookToolRelation),
        };
        Ok(Self {
            paths,
            config,
            relations,
            templates: global.templates.clone(),
        })
    }

    pub fn relations(&self) -> &dyn RelationSource {
        self.relations.as_ref()
    }

    pub fn renderer(&self) -> Result<Renderer> {
        Renderer::with_overrides(self.templates.as_deref()).context("failed to load templates")
    }
}

pub(crate) fn print_skipped(pass: &str, why: &str) {
    println!("{} {pass}: skipped ({why})", "·".dimmed());
}

pub(crate) fn print_done(message: impl std::fmt::Display) {
    println!("{} {message}", "✓".green().bold());
}

pub(crate) fn print_write(result: &WriteResult) {
    let marker = if result.written() {
        "✎".yellow()
    } else {
        "·".dimmed()
    };
    println!("  {marker} {}", result.path().display());
}
