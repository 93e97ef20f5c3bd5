//! Default values for submodule-sync configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Branch assumed when the hosting API cannot report a default branch.
pub const DEFAULT_BRANCH: &str = "main";

/// Manifest file read from the working tree root.
pub const MANIFEST_FILE: &str = ".gitmodules";

/// Settings file looked up in the current directory.
pub const SETTINGS_FILE: &str = ".submodule-sync.yaml";

/// Base URL of the GitHub REST API.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Committer name used when no other identity source is available.
pub const FALLBACK_AUTHOR_NAME: &str = "submodule-sync[bot]";

/// Committer email used when no other identity source is available.
pub const FALLBACK_AUTHOR_EMAIL: &str = "submodule-sync@users.noreply.github.com";

/// Prefix of every scratch directory created by the provisioner.
pub const SCRATCH_PREFIX: &str = "submodule-sync-";

/// Marker file written into scratch directories to prove ownership.
pub const SCRATCH_MARKER: &str = ".submodule-sync-scratch";

/// Upper bound for a single git subprocess.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound for a single hosting API request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Returns the directory holding run-in-progress lock files.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/submodule-sync/locks` (XDG Base Directory)
/// - macOS: `~/Library/Caches/submodule-sync/locks`
/// - Windows: `{FOLDERID_LocalAppData}\submodule-sync\locks`
///
/// Falls back to `.submodule-sync-locks` in the current directory if the
/// platform cache directory cannot be determined.
pub fn default_lock_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("submodule-sync").join("locks"))
        .unwrap_or_else(|| PathBuf::from(".submodule-sync-locks"))
}
