//! Phase 5: Publication
//!
//! Brings the local branch in line with the remote and pushes it. The push
//! happens at most once per run (plus the single retry the driver performs
//! after a remote-ahead rejection), and only when an update was applied.

use log::{debug, error, info, warn};

use super::UpdateOutcome;
use crate::driver::{PushSummary, Recovery, VersionControl};
use crate::error::Result;
use crate::suggestions;

/// Merges the remote into `branch` ahead of the push, unless skipped.
pub fn synchronize(
    driver: &dyn VersionControl,
    branch: &str,
    skip_sync: bool,
) -> Result<Option<Recovery>> {
    if skip_sync {
        debug!("Skipping synchronization with origin/{}", branch);
        return Ok(None);
    }
    let recovery = driver.synchronize_with_remote(branch)?;
    if recovery
        .as_ref()
        .is_some_and(Recovery::discarded_local_commits)
    {
        warn!("Local update commits were replaced by origin/{}; the next run re-applies them", branch);
    }
    Ok(recovery)
}

/// Pushes `branch` when at least one outcome was applied, unless skipped.
pub fn push(
    driver: &dyn VersionControl,
    branch: &str,
    outcomes: &[UpdateOutcome],
    skip_push: bool,
    force: bool,
) -> Result<Option<PushSummary>> {
    if skip_push {
        info!("Skipping push to origin/{}", branch);
        return Ok(None);
    }
    if !outcomes.iter().any(UpdateOutcome::is_applied) {
        debug!("No updates applied; nothing to push");
        return Ok(None);
    }

    match driver.push(branch, force) {
        Ok(summary) => {
            info!(
                "Pushed {} to origin ({} attempt{})",
                branch,
                summary.attempts,
                if summary.attempts == 1 { "" } else { "s" }
            );
            if summary.discarded_local_commits() {
                warn!("Push recovery reset {} to origin/{}; discarded updates are re-applied by the next run", branch, branch);
            }
            Ok(Some(summary))
        }
        Err(e) => {
            error!("{}", e);
            if let Some(kind) = e.push_failure_kind() {
                for hint in suggestions::push_guidance(kind) {
                    error!("hint: {}", hint);
                }
            }
            Err(e)
        }
    }
}
