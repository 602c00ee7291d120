//! Context dump handed to the jobs update hook (`JJB_CHARM_CONTEXT`).

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use ciconf_core::{CharmConfig, RelationSettings};

use crate::error::{io_err, SyncError};

/// Merge relation settings and charm configuration. Configuration keys win.
pub fn build_context(
    relation: Option<&RelationSettings>,
    config: &CharmConfig,
) -> Result<BTreeMap<String, Value>, SyncError> {
    let mut ctxt: BTreeMap<String, Value> = relation
        .map(|settings| {
            settings
                .iter()
                .map(|(k, v)| (k.to_owned(), Value::String(v.to_owned())))
                .collect()
        })
        .unwrap_or_default();
    ctxt.extend(config.context_map()?);
    Ok(ctxt)
}

/// Write the merged context as JSON at `path`.
pub fn dump_context(
    path: &Path,
    relation: Option<&RelationSettings>,
    config: &CharmConfig,
) -> Result<(), SyncError> {
    tracing::info!("saving charm context to {}", path.display());
    let ctxt = build_context(relation, config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let json = serde_json::to_string(&ctxt)?;
    std::fs::write(path, json).map_err(|e| io_err(path, e))
}
