//! Push and merge recovery.
//!
//! A push races every other writer of the branch. When the remote moved
//! ahead, the driver merges it and retries exactly once. Submodule bindings
//! are opaque pointers that git cannot merge, so a conflict on them is
//! resolved by resetting to the remote: the remote wins, and the discarded
//! local update is re-applied by the next cycle since the submodule will
//! still be behind its upstream.
//!
//! ```text
//! push ──ok──────────────────────────────────────────▶ done
//!  │
//!  ├─ rejected (remote ahead) ─▶ fetch ─▶ pull ─┬─ merged ────┐
//!  │                                             ├─ submodule ─┤ reset --hard origin/<branch>
//!  │                                             └─ other ─────┼─▶ SyncFailed
//!  │                                                           ▼
//!  │                                                      retry push ──ok──▶ done
//!  │                                                           └─rejected─▶ PushFailed
//!  └─ rejected (permission / not found / protected / other) ─▶ PushFailed
//! ```

use log::{debug, info, warn};

use super::GitDriver;
use crate::error::{Error, Result};
use crate::git::{PullResult, PushResult};

/// How a pull-and-merge completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// The remote was merged into the local branch.
    Merged,
    /// Submodule conflicts forced a reset to the remote branch; local
    /// commits that were not yet pushed were discarded.
    ResetToRemote { conflicts: Vec<String> },
}

impl Recovery {
    pub fn discarded_local_commits(&self) -> bool {
        matches!(self, Recovery::ResetToRemote { .. })
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSummary {
    /// Number of push attempts made (1 or 2).
    pub attempts: u32,
    pub forced: bool,
    /// Set when the first attempt was rejected and recovered from.
    pub recovery: Option<Recovery>,
}

impl PushSummary {
    pub fn discarded_local_commits(&self) -> bool {
        self.recovery
            .as_ref()
            .is_some_and(Recovery::discarded_local_commits)
    }
}

impl GitDriver {
    fn sync_failed(branch: &str, err: impl ToString) -> Error {
        Error::SyncFailed {
            branch: branch.to_string(),
            message: err.to_string(),
        }
    }

    fn push_outcome(branch: &str, result: PushResult) -> Result<()> {
        match result {
            PushResult::Pushed => Ok(()),
            PushResult::Rejected { kind, message } => Err(Error::PushFailed {
                branch: branch.to_string(),
                kind,
                message,
            }),
        }
    }

    /// Merges `origin/<branch>` into `branch`, resetting to the remote when
    /// only submodule bindings conflict.
    pub(super) fn pull_and_merge(&self, branch: &str) -> Result<Recovery> {
        let current = self.current_branch_name();
        if current.as_deref() != Some(branch) {
            debug!("Switching to {} before merging", branch);
            self.ops
                .switch_branch(&self.root, branch)
                .map_err(|e| Self::sync_failed(branch, e))?;
        }

        match self
            .ops
            .pull(&self.root, branch)
            .map_err(|e| Self::sync_failed(branch, e))?
        {
            PullResult::Merged => {
                info!("Merged origin/{} into {}", branch, branch);
                Ok(Recovery::Merged)
            }
            PullResult::SubmoduleConflict { paths } => {
                warn!(
                    "Submodule conflict while merging origin/{} ({}); resetting to the remote. \
                     Discarded updates will be re-applied on the next run",
                    branch,
                    if paths.is_empty() {
                        "unknown paths".to_string()
                    } else {
                        paths.join(", ")
                    }
                );
                let remote = format!("origin/{}", branch);
                self.ops
                    .reset_hard(&self.root, &remote)
                    .map_err(|e| Self::sync_failed(branch, e))?;
                Ok(Recovery::ResetToRemote { conflicts: paths })
            }
            PullResult::Failed { message } => {
                if let Err(e) = self.ops.abort_merge(&self.root) {
                    debug!("No merge to abort after failed pull: {}", e);
                }
                Err(Self::sync_failed(branch, message))
            }
        }
    }

    pub(super) fn synchronize(&self, branch: &str) -> Result<Option<Recovery>> {
        if !self.divergence(branch) {
            debug!("{} is not behind origin/{}; nothing to merge", branch, branch);
            return Ok(None);
        }
        self.pull_and_merge(branch).map(Some)
    }

    pub(super) fn push_with_recovery(&self, branch: &str, force: bool) -> Result<PushSummary> {
        if force {
            warn!("Force-pushing {} to origin", branch);
            let result = self.ops.push(&self.root, branch, true)?;
            Self::push_outcome(branch, result)?;
            return Ok(PushSummary {
                attempts: 1,
                forced: true,
                recovery: None,
            });
        }

        match self.ops.push(&self.root, branch, false)? {
            PushResult::Pushed => Ok(PushSummary {
                attempts: 1,
                forced: false,
                recovery: None,
            }),
            PushResult::Rejected { kind, message } if kind.is_recoverable() => {
                warn!(
                    "Push to origin/{} rejected ({}); merging the remote and retrying once",
                    branch, kind
                );
                debug!("Rejection detail: {}", message);
                self.ops
                    .fetch_origin(&self.root)
                    .map_err(|e| Self::sync_failed(branch, e))?;
                let recovery = self.pull_and_merge(branch)?;

                let retry = self.ops.push(&self.root, branch, false)?;
                Self::push_outcome(branch, retry)?;
                Ok(PushSummary {
                    attempts: 2,
                    forced: false,
                    recovery: Some(recovery),
                })
            }
            PushResult::Rejected { kind, message } => Err(Error::PushFailed {
                branch: branch.to_string(),
                kind,
                message,
            }),
        }
    }
}
