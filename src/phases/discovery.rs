//! Phase 2: Discovery
//!
//! Reads the manifest of the working tree and turns its declarations into
//! `SubmoduleRecord`s, keeping manifest order. An empty manifest is a valid
//! result.

use std::path::Path;

use log::debug;

use super::SubmoduleRecord;
use crate::error::Result;
use crate::manifest::ManifestReader;

/// Execute Phase 2: load the declared submodules.
pub fn execute(reader: &dyn ManifestReader, manifest: &Path) -> Result<Vec<SubmoduleRecord>> {
    let records: Vec<SubmoduleRecord> = reader
        .read(manifest)?
        .into_iter()
        .map(|decl| SubmoduleRecord {
            path: decl.path,
            url: decl.url,
            declared_branch: decl.branch,
        })
        .collect();

    debug!(
        "Loaded {} submodule(s) from {}",
        records.len(),
        manifest.display()
    );
    Ok(records)
}
