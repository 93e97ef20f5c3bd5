//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Manifest not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::manifest_not_found(path));
//! ```

use std::path::Path;

use crate::error::{Error, PushFailureKind};

/// Hint lines for a classified push rejection.
pub fn push_guidance(kind: PushFailureKind) -> &'static [&'static str] {
    match kind {
        PushFailureKind::RemoteAhead => &[
            "The remote branch kept moving while this run merged it; run again",
            "Use --force-push only if discarding remote history is acceptable",
        ],
        PushFailureKind::PermissionDenied => &[
            "Make sure the token has write access to the repository (contents: write)",
            "Set GITHUB_TOKEN or pass --token",
        ],
        PushFailureKind::RepositoryNotFound => &[
            "Check --owner and --repo",
            "A token without access to a private repository also reports it as not found",
        ],
        PushFailureKind::ProtectedBranch => &[
            "The branch is protected; allow the token's account to push to it",
            "Or target an unprotected branch with --branch and merge through a pull request",
        ],
        PushFailureKind::Other => &["Re-run with --log-level debug to see git's full output"],
    }
}

/// Hint lines for any library error, empty when there is nothing to add.
pub fn hints_for(error: &Error) -> Vec<String> {
    match error {
        Error::PushFailed { kind, .. } => push_guidance(*kind)
            .iter()
            .map(|hint| hint.to_string())
            .collect(),
        Error::RepositoryNotFound { .. } => vec![
            "Pass an existing directory to --path, or omit it to use a scratch clone".to_string(),
        ],
        Error::ManifestUnreadable { .. } => vec![
            "Check that the repository declares submodules in .gitmodules".to_string(),
            "Use --manifest to point at a different file".to_string(),
        ],
        Error::SyncFailed { .. } => vec![
            "The local branch could not be merged with the remote; resolve the conflict by hand"
                .to_string(),
            "Use --skip-sync to push without merging first".to_string(),
        ],
        Error::RunInProgress { lock_path } => vec![format!(
            "If no other run is active, remove the stale lock file {}",
            lock_path.display()
        )],
        Error::Timeout { .. } => {
            vec!["Raise timeouts.git_seconds or timeouts.http_seconds in the settings file".to_string()]
        }
        _ => Vec::new(),
    }
}

/// Wraps a library error for display, appending its hints.
pub fn explain(error: Error) -> anyhow::Error {
    let hints = hints_for(&error);
    if hints.is_empty() {
        return anyhow::Error::new(error);
    }
    let hints = hints
        .iter()
        .map(|hint| format!("hint: {}", hint))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow::anyhow!("{error}\n\n{hints}")
}

/// Generate an error for when the parent repository was not specified.
pub fn missing_target() -> anyhow::Error {
    anyhow::anyhow!(
        "No repository to update\n\n\
         hint: Pass --owner and --repo\n\
         hint: Or set SUBMODULE_SYNC_OWNER and SUBMODULE_SYNC_REPO\n\
         hint: Or add owner/repo to .submodule-sync.yaml"
    )
}

/// Generate an error for when a manifest file does not exist.
pub fn manifest_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Manifest not found: {path}\n\n\
         hint: Run from the root of a repository with submodules\n\
         hint: Use --manifest to specify a different path",
        path = path.display()
    )
}

/// Generate an error for a settings file that cannot be read.
pub fn settings_unreadable(path: &Path, error: &Error) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid settings file {path}: {error}\n\n\
         hint: Known keys are owner, repo, branch, repo_path, manifest, api_url, resolver, \
         skip_sync, skip_push, author and timeouts",
        path = path.display()
    )
}
