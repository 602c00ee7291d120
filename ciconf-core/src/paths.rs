//! Filesystem layout of the configurator.
//!
//! # Storage layout
//!
//! ```text
//! <root>/                         (default /etc/ci-configurator)
//!   config.yaml                   charm configuration
//!   state/                        content hashes of installed files
//!   ci-config/                    checkout or copy of the config repository
//!     control.yml
//!     charm_context.json          context dump for the jobs update hook
//!     setup.d/
//!     gerrit/
//!       hooks/  theme/{files,static}/
//!       permissions/{groups.yml,All-Projects/}
//!       projects/projects.yml
//!     jenkins/
//!       jobs/update  security/config.xml
//!     zuul/
//! ```

use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT: &str = "/etc/ci-configurator";
pub const CONFIG_REPO_DIR: &str = "ci-config";
pub const CONTEXT_DUMP: &str = "charm_context.json";

/// All paths derived from one configurator root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiPaths {
    root: PathBuf,
}

impl Default for CiPaths {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl CiPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn charm_config(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    /// `<root>/ci-config/`: where the config repository ends up.
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_REPO_DIR)
    }

    pub fn control_file(&self) -> PathBuf {
        self.config_dir().join("control.yml")
    }

    pub fn context_dump(&self) -> PathBuf {
        self.config_dir().join(CONTEXT_DUMP)
    }

    pub fn setup_d(&self) -> PathBuf {
        self.config_dir().join("setup.d")
    }

    // gerrit ---------------------------------------------------------------

    pub fn gerrit_dir(&self) -> PathBuf {
        self.config_dir().join("gerrit")
    }

    pub fn gerrit_theme_dir(&self) -> PathBuf {
        self.gerrit_dir().join("theme")
    }

    pub fn gerrit_hooks_dir(&self) -> PathBuf {
        self.gerrit_dir().join("hooks")
    }

    pub fn gerrit_permissions_dir(&self) -> PathBuf {
        self.gerrit_dir().join("permissions")
    }

    pub fn groups_file(&self) -> PathBuf {
        self.gerrit_permissions_dir().join("groups.yml")
    }

    pub fn projects_file(&self) -> PathBuf {
        self.gerrit_dir().join("projects").join("projects.yml")
    }

    // jenkins --------------------------------------------------------------

    pub fn jenkins_dir(&self) -> PathBuf {
        self.config_dir().join("jenkins")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.jenkins_dir().join("jobs")
    }

    pub fn jobs_update_hook(&self) -> PathBuf {
        self.jobs_dir().join("update")
    }

    pub fn jenkins_security_file(&self) -> PathBuf {
        self.jenkins_dir().join("security").join("config.xml")
    }

    // zuul -----------------------------------------------------------------

    pub fn zuul_dir(&self) -> PathBuf {
        self.config_dir().join("zuul")
    }
}
