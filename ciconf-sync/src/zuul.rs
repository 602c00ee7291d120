//! The zuul update pass. The gating server reads its layout straight from
//! the config repository; all that is checked here is that it exists.

use ciconf_core::relation::ZUUL_RELATION;
use ciconf_core::{CiPaths, RelationSource};

use crate::error::SyncError;
use crate::gerrit::Prepared;

/// Returns the zuul config directory when it is in place.
pub fn update_zuul(
    paths: &CiPaths,
    relations: &dyn RelationSource,
) -> Result<Prepared<std::path::PathBuf>, SyncError> {
    if relations.settings(ZUUL_RELATION)?.is_none() {
        return Ok(Prepared::Skipped("no relation to zuul".into()));
    }
    tracing::info!("updating zuul");
    let dir = paths.zuul_dir();
    if !dir.is_dir() {
        tracing::info!(
            "could not find zuul config directory at {}, skipping zuul update",
            dir.display()
        );
        return Ok(Prepared::Skipped(format!("no zuul config at {}", dir.display())));
    }
    Ok(Prepared::Ready(dir))
}
