//! ciconf core library: declarations, configuration, relation settings.
//!
//! - [`types`]: newtypes and declaration structs
//! - [`loader`]: `projects.yml` / `groups.yml` / `control.yml`
//! - [`config`]: local charm configuration
//! - [`relation`]: relation settings and their sources
//! - [`paths`]: filesystem layout
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod loader;
pub mod paths;
pub mod relation;
pub mod types;

pub use config::CharmConfig;
pub use error::ConfigError;
pub use paths::CiPaths;
pub use relation::{
    FileRelation, GerritRelation, HookToolRelation, JenkinsRelation, RelationSettings,
    RelationSource,
};
pub use types::{
    ControlFile, GroupDecl, GroupName, GroupsFile, Login, MemberRecord, ProjectDecl, ProjectsFile,
    TeamName,
};
