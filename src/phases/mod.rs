//! Implementation of the phases of a submodule-sync run.
//!
//! ## Overview
//!
//! A run walks one state machine:
//!
//! ```text
//! UNINITIALIZED → REPOSITORY_READY → MANIFEST_LOADED → COMMITS_RESOLVED
//!              → UPDATES_APPLIED → SYNCHRONIZED → PUSHED → DONE
//! ```
//!
//! with `FAILED` reachable from every state. Each phase lives in its own
//! module and hands an immutable snapshot to the next:
//!
//! 1. Repository - Pick or provision the working tree (`repository`)
//! 2. Discovery - Read the declared submodules (`discovery`)
//! 3. Resolution - Pair each recorded commit with its upstream tip (`resolve`)
//! 4. Application - Check out and commit every required update (`apply`)
//! 5. Publication - Synchronize with the remote and push once (`publish`)
//!
//! The `orchestrator` drives the phases, tracks the state, honours
//! cancellation between phases and always tears the working tree down.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::driver::{PushSummary, Recovery};

// Phase modules
pub mod apply;
pub mod discovery;
pub mod orchestrator;
pub mod publish;
pub mod repository;
pub mod resolve;

pub use orchestrator::ReconciliationEngine;

/// Placeholder used wherever a commit could not be read.
pub const UNKNOWN_COMMIT: &str = "unknown";

/// State of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    RepositoryReady,
    ManifestLoaded,
    CommitsResolved,
    UpdatesApplied,
    Synchronized,
    Pushed,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Uninitialized => "UNINITIALIZED",
            RunState::RepositoryReady => "REPOSITORY_READY",
            RunState::ManifestLoaded => "MANIFEST_LOADED",
            RunState::CommitsResolved => "COMMITS_RESOLVED",
            RunState::UpdatesApplied => "UPDATES_APPLIED",
            RunState::Synchronized => "SYNCHRONIZED",
            RunState::Pushed => "PUSHED",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A declared submodule, as read from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleRecord {
    pub path: String,
    pub url: String,
    /// Branch to track; the remote's default branch when `None`.
    pub declared_branch: Option<String>,
}

/// Commit the parent tree binds a submodule to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommit {
    Known(String),
    /// The binding could not be read.
    Unknown,
}

impl RecordedCommit {
    pub fn as_str(&self) -> &str {
        match self {
            RecordedCommit::Known(commit) => commit,
            RecordedCommit::Unknown => UNKNOWN_COMMIT,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, RecordedCommit::Known(_))
    }
}

impl fmt::Display for RecordedCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submodule with its recorded and upstream commits resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSubmodule {
    pub record: SubmoduleRecord,
    pub recorded: RecordedCommit,
    /// Latest commit on the tracked branch; `None` when it could not be
    /// resolved.
    pub upstream: Option<String>,
    /// Branch the upstream commit was read from.
    pub tracked_branch: Option<String>,
}

impl ResolvedSubmodule {
    /// The upstream commit, or the recorded one when resolution failed.
    pub fn upstream_commit(&self) -> &str {
        self.upstream
            .as_deref()
            .unwrap_or_else(|| self.recorded.as_str())
    }

    /// True iff the upstream commit was resolved and differs from the
    /// recorded one.
    pub fn update_required(&self) -> bool {
        match &self.upstream {
            Some(upstream) => upstream.as_str() != self.recorded.as_str(),
            None => false,
        }
    }
}

/// Result of one attempted submodule update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    path: String,
    from: String,
    to: String,
    failure: Option<String>,
}

impl UpdateOutcome {
    pub fn applied(path: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
            to: to.into(),
            failure: None,
        }
    }

    pub fn failed(
        path: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
            to: to.into(),
            failure: Some(reason.into()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_applied(&self) -> bool {
        self.failure.is_none()
    }

    pub fn from_commit(&self) -> &str {
        &self.from
    }

    pub fn to_commit(&self) -> &str {
        &self.to
    }

    /// Why the update failed; `None` iff it was applied.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub state: RunState,
    /// Branch that was synchronized and pushed.
    pub branch: Option<String>,
    pub total_submodules: usize,
    /// Attempted updates, in manifest order.
    pub outcomes: Vec<UpdateOutcome>,
    /// How the pre-push synchronization went, if it ran.
    pub sync: Option<Recovery>,
    pub push: Option<PushSummary>,
    /// Set when a reset to the remote dropped local update commits. They
    /// are re-applied by the next run.
    pub updates_discarded: bool,
}

impl RunReport {
    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_applied()).count()
    }

    /// Some updates failed while the run itself completed.
    pub fn is_partial_failure(&self) -> bool {
        self.failed_count() > 0
    }
}

/// Outcome of a dry run that stops after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub branch: Option<String>,
    pub submodules: Vec<ResolvedSubmodule>,
}

impl Plan {
    pub fn outdated(&self) -> impl Iterator<Item = &ResolvedSubmodule> {
        self.submodules.iter().filter(|s| s.update_required())
    }
}

/// Cooperative cancellation shared between a run and its owner.
///
/// The engine checks the token at every phase boundary up to the push. A
/// push that has started always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
