//! # Error Handling
//!
//! This module defines the centralized error type for `submodule-sync`. It
//! uses `thiserror` to derive a single `Error` enum covering every failure
//! the reconciliation cycle can hit, from provisioning the working tree to
//! pushing the parent repository.
//!
//! ## Fatal vs. recovered errors
//!
//! Not every variant aborts a run. The engine treats them in three tiers:
//!
//! - **Fatal**: `RepositoryNotFound`, `ManifestUnreadable`, `ProvisionFailed`,
//!   `SyncFailed` and `PushFailed` end the run in the `Failed` state.
//! - **Recovered per submodule**: `CommitReadFailed` and `RemoteLookupFailed`
//!   degrade to sentinel values; `UpdateFailed` and `CommitFailed` become a
//!   failed `UpdateOutcome` and the run moves on to the next submodule.
//! - **Logged only**: teardown failures never escalate.
//!
//! Push rejections carry a [`PushFailureKind`] so that recovery code switches
//! on a closed enumeration instead of matching on `git` output.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Classified reason a push to the remote was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushFailureKind {
    /// The remote branch has commits the local branch lacks.
    RemoteAhead,
    /// The credential cannot write to the repository.
    PermissionDenied,
    /// The remote repository does not exist or is not visible.
    RepositoryNotFound,
    /// Branch protection rules refused the update.
    ProtectedBranch,
    /// Anything the classifier could not place.
    Other,
}

impl PushFailureKind {
    /// Whether the push state machine may recover from this rejection by
    /// merging the remote and retrying.
    pub fn is_recoverable(self) -> bool {
        matches!(self, PushFailureKind::RemoteAhead)
    }
}

impl fmt::Display for PushFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PushFailureKind::RemoteAhead => "remote ahead",
            PushFailureKind::PermissionDenied => "permission denied",
            PushFailureKind::RepositoryNotFound => "repository not found",
            PushFailureKind::ProtectedBranch => "protected branch",
            PushFailureKind::Other => "rejected",
        };
        f.write_str(label)
    }
}

/// Main error type for submodule-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A requested working tree path does not exist.
    #[error("Repository not found: {}", path.display())]
    RepositoryNotFound { path: PathBuf },

    /// The submodule manifest is absent or cannot be parsed.
    #[error("Manifest unreadable: {}: {message}", path.display())]
    ManifestUnreadable { path: PathBuf, message: String },

    /// Cloning or preparing the working tree failed.
    #[error("Provisioning failed for {url}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ProvisionFailed {
        url: String,
        message: String,
        /// Optional hint for how to resolve the failure
        hint: Option<String>,
    },

    /// The parent tree has no readable binding for a submodule path.
    #[error("Could not read recorded commit for {path}: {message}")]
    CommitReadFailed { path: String, message: String },

    /// The hosting API or remote could not report a branch tip.
    #[error("Remote lookup failed for {slug}: {message}")]
    RemoteLookupFailed { slug: String, message: String },

    /// Fetching or checking out a submodule's new commit failed.
    #[error("Update failed for {path}: {message}")]
    UpdateFailed { path: String, message: String },

    /// Staging or committing a submodule binding failed.
    #[error("Commit failed for {path}: {message}")]
    CommitFailed { path: String, message: String },

    /// Bringing the local branch in line with the remote failed.
    #[error("Synchronization with origin/{branch} failed: {message}")]
    SyncFailed { branch: String, message: String },

    /// The push to the remote was rejected or could not be completed.
    #[error("Push to origin/{branch} failed ({kind}): {message}")]
    PushFailed {
        branch: String,
        kind: PushFailureKind,
        message: String,
    },

    /// A git subprocess exited unsuccessfully.
    #[error("Git command failed in {}: git {command} - {stderr}", dir.display())]
    GitCommand {
        command: String,
        dir: PathBuf,
        stderr: String,
    },

    /// A subprocess or HTTP call exceeded its time budget.
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// The run was cancelled at a phase boundary.
    #[error("Run cancelled after {phase}")]
    Cancelled { phase: String },

    /// Another run already holds the lock for this target.
    #[error("Another run is in progress (lock: {})", lock_path.display())]
    RunInProgress { lock_path: PathBuf },

    /// The settings file could not be interpreted.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An HTTP client error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// The classified push failure, if this is a push error.
    pub fn push_failure_kind(&self) -> Option<PushFailureKind> {
        match self {
            Error::PushFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
