//! Phase 4: Application
//!
//! Moves every submodule that needs it to its upstream commit and records
//! the move as one commit per submodule. A failed update becomes a failed
//! `UpdateOutcome` and the phase continues with the next submodule.

use log::{info, warn};

use super::{ResolvedSubmodule, UpdateOutcome};
use crate::driver::{short_commit, VersionControl};

/// Execute Phase 4: apply required updates, in manifest order.
pub fn execute(submodules: &[ResolvedSubmodule], driver: &dyn VersionControl) -> Vec<UpdateOutcome> {
    submodules
        .iter()
        .filter_map(|submodule| {
            let upstream = submodule.upstream.as_deref()?;
            // Re-checked here so a reordered pipeline cannot apply a no-op.
            if !submodule.update_required() || upstream == submodule.recorded.as_str() {
                return None;
            }
            Some(apply_one(submodule, upstream, driver))
        })
        .collect()
}

fn apply_one(submodule: &ResolvedSubmodule, to: &str, driver: &dyn VersionControl) -> UpdateOutcome {
    let path = submodule.record.path.as_str();
    let from = submodule.recorded.as_str();

    let result = driver
        .fetch_and_checkout(path, to)
        .and_then(|()| driver.stage_and_commit(path, from, to));

    match result {
        Ok(()) => {
            info!(
                "Updated {} from {} to {}",
                path,
                short_commit(from),
                short_commit(to)
            );
            UpdateOutcome::applied(path, from, to)
        }
        Err(e) => {
            warn!("{}", e);
            UpdateOutcome::failed(path, from, to, e.to_string())
        }
    }
}
