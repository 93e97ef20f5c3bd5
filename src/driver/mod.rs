//! # Version Control Driver
//!
//! This module provides the driver the reconciliation engine uses to read
//! and change a working tree. It is split into two layers, the same way the
//! engine's other collaborators are:
//!
//! - **`GitOperations`** (in `ops`): primitive, policy-free git calls. The
//!   default implementation shells out to `git`; tests script the results.
//!
//! - **`VersionControl`**: the operations the engine relies on, with their
//!   failure semantics. Reading a binding fails loudly, probing status is
//!   best-effort, a checkout either lands on the target or leaves the
//!   submodule where it was, and pushing recovers from a remote that moved
//!   ahead (see `push`).
//!
//! `GitDriver` implements `VersionControl` on top of any `GitOperations`.

mod commit;
mod ops;
mod push;

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::{Identity, IdentityConfig, IdentitySource};
use crate::defaults;
use crate::error::{Error, Result};
use crate::git::HostCredential;

pub use commit::{commit_message, short_commit};
pub use ops::{DefaultGitOperations, GitOperations};
pub use push::{PushSummary, Recovery};

/// Operations the reconciliation engine performs against a working tree.
pub trait VersionControl {
    /// Commit the parent tree records for a submodule path.
    fn recorded_commit(&self, path: &str) -> Result<String>;

    /// Fetches the submodule's remotes and checks out `target` exactly.
    fn fetch_and_checkout(&self, path: &str, target: &str) -> Result<()>;

    /// Stages the submodule's new binding and commits it.
    fn stage_and_commit(&self, path: &str, from: &str, to: &str) -> Result<()>;

    /// Whether `origin/<branch>` has commits the local branch lacks.
    /// Best-effort: `false` when the comparison cannot be made.
    fn diverges_from_remote(&self, branch: &str) -> bool;

    /// Merges the remote when it diverged. Returns how it was reconciled,
    /// or `None` when nothing had to be done.
    fn synchronize_with_remote(&self, branch: &str) -> Result<Option<Recovery>>;

    /// Pushes `branch`, recovering once from a remote-ahead rejection.
    fn push(&self, branch: &str, force: bool) -> Result<PushSummary>;

    /// Checked-out branch, or the conventional default when unknown.
    fn current_branch(&self) -> String;

    /// Best-effort: `false` when status cannot be read.
    fn has_uncommitted_changes(&self) -> bool;

    /// Makes sure commits can be authored, returning the identity in use.
    fn configure_identity(&self) -> Result<(Identity, IdentitySource)>;
}

/// Opens a `VersionControl` for a working tree root.
pub trait DriverFactory {
    fn open(&self, root: &Path) -> Box<dyn VersionControl>;
}

/// Factory producing `GitDriver`s backed by the system `git`.
#[derive(Debug, Clone)]
pub struct GitDriverFactory {
    identity: IdentityConfig,
    timeout: std::time::Duration,
    credential: Option<HostCredential>,
}

impl GitDriverFactory {
    pub fn new(identity: IdentityConfig, timeout: std::time::Duration) -> Self {
        Self {
            identity,
            timeout,
            credential: None,
        }
    }

    /// Credential sent on fetch, pull and push.
    pub fn with_credential(mut self, credential: Option<HostCredential>) -> Self {
        self.credential = credential;
        self
    }
}

impl DriverFactory for GitDriverFactory {
    fn open(&self, root: &Path) -> Box<dyn VersionControl> {
        let ops = DefaultGitOperations::new(self.timeout).with_credential(self.credential.clone());
        Box::new(GitDriver::with_operations(
            Box::new(ops),
            root.to_path_buf(),
            self.identity.clone(),
        ))
    }
}

/// `VersionControl` implemented over `GitOperations`.
pub struct GitDriver {
    ops: Box<dyn GitOperations>,
    root: PathBuf,
    identity: IdentityConfig,
    resolved_identity: OnceCell<(Identity, IdentitySource)>,
}

impl GitDriver {
    /// Creates a driver using the system `git`.
    pub fn new(root: PathBuf, identity: IdentityConfig, timeout: std::time::Duration) -> Self {
        Self::with_operations(Box::new(DefaultGitOperations::new(timeout)), root, identity)
    }

    /// Creates a driver with a custom `GitOperations` implementation.
    pub fn with_operations(
        ops: Box<dyn GitOperations>,
        root: PathBuf,
        identity: IdentityConfig,
    ) -> Self {
        Self {
            ops,
            root,
            identity,
            resolved_identity: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn current_branch_name(&self) -> Option<String> {
        match self.ops.current_branch(&self.root) {
            Ok(branch) if !branch.is_empty() && branch != "HEAD" => Some(branch),
            Ok(_) => None,
            Err(e) => {
                debug!("Could not read current branch: {}", e);
                None
            }
        }
    }

    fn divergence(&self, branch: &str) -> bool {
        if let Err(e) = self.ops.fetch_origin(&self.root) {
            warn!("Could not fetch origin to check divergence: {}", e);
            return false;
        }
        let remote_ref = format!("origin/{}", branch);
        let (local, remote) = match (
            self.ops.resolve_ref(&self.root, branch),
            self.ops.resolve_ref(&self.root, &remote_ref),
        ) {
            (Ok(local), Ok(remote)) => (local, remote),
            (local, remote) => {
                debug!(
                    "Cannot compare {} with {}: {:?} / {:?}",
                    branch,
                    remote_ref,
                    local.err().map(|e| e.to_string()),
                    remote.err().map(|e| e.to_string())
                );
                return false;
            }
        };
        if local == remote {
            return false;
        }
        match self.ops.is_ancestor(&self.root, &remote, &local) {
            // Local is strictly ahead; there is nothing to merge.
            Ok(true) => false,
            Ok(false) => true,
            Err(e) => {
                debug!("Ancestry check failed: {}", e);
                false
            }
        }
    }

    /// Puts `path` back to what `HEAD` records: out of the index, and the
    /// submodule checked out at the recorded commit.
    fn restore_binding(&self, path: &str) {
        if let Err(e) = self.ops.unstage(&self.root, path) {
            warn!("Could not unstage {}: {}", path, e);
        }
        match self.ops.gitlink_commit(&self.root, path) {
            Ok(Some(recorded)) => self.restore_checkout(&self.root.join(path), Some(&recorded)),
            Ok(None) => debug!("{} has no recorded binding to restore", path),
            Err(e) => warn!("Could not read the recorded binding of {}: {}", path, e),
        }
    }

    fn restore_checkout(&self, dir: &Path, previous: Option<&str>) {
        let Some(previous) = previous else {
            return;
        };
        if let Err(e) = self.ops.checkout(dir, previous) {
            warn!(
                "Could not restore {} to {}: {}",
                dir.display(),
                short_commit(previous),
                e
            );
        }
    }
}

impl VersionControl for GitDriver {
    fn recorded_commit(&self, path: &str) -> Result<String> {
        match self.ops.gitlink_commit(&self.root, path) {
            Ok(Some(commit)) => Ok(commit),
            Ok(None) => Err(Error::CommitReadFailed {
                path: path.to_string(),
                message: "no submodule binding recorded in HEAD".to_string(),
            }),
            Err(e) => Err(Error::CommitReadFailed {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn fetch_and_checkout(&self, path: &str, target: &str) -> Result<()> {
        let update_failed = |e: Error| Error::UpdateFailed {
            path: path.to_string(),
            message: e.to_string(),
        };
        let dir = self.root.join(path);

        if !self.ops.is_initialized(&dir) {
            debug!("Initializing submodule {}", path);
            self.ops
                .init_submodule(&self.root, path)
                .map_err(update_failed)?;
        }

        let previous = self.ops.head_commit(&dir).ok();
        self.ops.fetch_all(&dir).map_err(update_failed)?;

        if let Err(e) = self.ops.checkout(&dir, target) {
            self.restore_checkout(&dir, previous.as_deref());
            return Err(update_failed(e));
        }

        let landed = self.ops.head_commit(&dir).map_err(update_failed)?;
        if !landed.starts_with(target) {
            self.restore_checkout(&dir, previous.as_deref());
            return Err(Error::UpdateFailed {
                path: path.to_string(),
                message: format!(
                    "checkout landed on {} instead of {}",
                    short_commit(&landed),
                    short_commit(target)
                ),
            });
        }
        Ok(())
    }

    fn stage_and_commit(&self, path: &str, from: &str, to: &str) -> Result<()> {
        let commit_failed = |e: Error| Error::CommitFailed {
            path: path.to_string(),
            message: e.to_string(),
        };
        self.configure_identity().map_err(commit_failed)?;
        let committed = self.ops.stage(&self.root, path).and_then(|()| {
            self.ops
                .commit(&self.root, path, &commit_message(path, from, to))
        });
        if let Err(e) = committed {
            self.restore_binding(path);
            return Err(commit_failed(e));
        }
        info!(
            "Committed {}: {} -> {}",
            path,
            short_commit(from),
            short_commit(to)
        );
        Ok(())
    }

    fn diverges_from_remote(&self, branch: &str) -> bool {
        self.divergence(branch)
    }

    fn synchronize_with_remote(&self, branch: &str) -> Result<Option<Recovery>> {
        self.synchronize(branch)
    }

    fn push(&self, branch: &str, force: bool) -> Result<PushSummary> {
        self.push_with_recovery(branch, force)
    }

    fn current_branch(&self) -> String {
        self.current_branch_name()
            .unwrap_or_else(|| defaults::DEFAULT_BRANCH.to_string())
    }

    fn has_uncommitted_changes(&self) -> bool {
        match self.ops.status(&self.root) {
            Ok(status) => !status.trim().is_empty(),
            Err(e) => {
                debug!("Could not read status: {}", e);
                false
            }
        }
    }

    fn configure_identity(&self) -> Result<(Identity, IdentitySource)> {
        if let Some(resolved) = self.resolved_identity.get() {
            return Ok(resolved.clone());
        }

        let (identity, source) = self.identity.resolve(
            || self.ops.configured_identity(&self.root).ok().flatten(),
            || self.ops.last_commit_author(&self.root).ok().flatten(),
        );
        if source != IdentitySource::Repository {
            self.ops.set_identity(&self.root, &identity)?;
        }
        debug!("Committing as {} ({:?})", identity, source);

        let _ = self.resolved_identity.set((identity.clone(), source));
        Ok((identity, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PushFailureKind;
    use crate::git::{PullResult, PushResult};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    const OLD: &str = "1111111111111111111111111111111111111111";
    const NEW: &str = "2222222222222222222222222222222222222222";

    fn git_error(stderr: &str) -> Error {
        Error::GitCommand {
            command: "mock".to_string(),
            dir: PathBuf::from("/mock/repo"),
            stderr: stderr.to_string(),
        }
    }

    /// Mock git operations for testing
    #[derive(Default)]
    struct MockGitOperations {
        calls: Arc<Mutex<Vec<String>>>,
        gitlinks: HashMap<String, String>,
        heads: Mutex<HashMap<PathBuf, String>>,
        refs: HashMap<String, String>,
        ancestors: Vec<(String, String)>,
        initialized: bool,
        fail_fetch_all: bool,
        fail_checkout: bool,
        fail_stage: bool,
        fail_commit: bool,
        fail_fetch_origin: bool,
        branch: Option<String>,
        status: Option<String>,
        configured: Option<Identity>,
        last_author: Option<Identity>,
        push_results: Mutex<VecDeque<PushResult>>,
        pull_result: Option<PullResult>,
    }

    impl MockGitOperations {
        fn new() -> Self {
            Self {
                initialized: true,
                branch: Some("main".to_string()),
                pull_result: Some(PullResult::Merged),
                ..Self::default()
            }
        }

        fn with_pushes(self, results: Vec<PushResult>) -> Self {
            *self.push_results.lock().unwrap() = results.into();
            self
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    impl GitOperations for MockGitOperations {
        fn gitlink_commit(&self, _root: &Path, path: &str) -> Result<Option<String>> {
            self.record(format!("gitlink {}", path));
            Ok(self.gitlinks.get(path).cloned())
        }

        fn is_initialized(&self, _dir: &Path) -> bool {
            self.initialized
        }

        fn init_submodule(&self, _root: &Path, path: &str) -> Result<()> {
            self.record(format!("init {}", path));
            Ok(())
        }

        fn head_commit(&self, dir: &Path) -> Result<String> {
            self.heads
                .lock()
                .unwrap()
                .get(dir)
                .cloned()
                .ok_or_else(|| git_error("no HEAD"))
        }

        fn fetch_all(&self, dir: &Path) -> Result<()> {
            self.record(format!("fetch-all {}", dir.display()));
            if self.fail_fetch_all {
                return Err(git_error("could not resolve host"));
            }
            Ok(())
        }

        fn checkout(&self, dir: &Path, target: &str) -> Result<()> {
            self.record(format!("checkout {} {}", dir.display(), target));
            if self.fail_checkout && target == NEW {
                return Err(git_error("reference is not a tree"));
            }
            self.heads
                .lock()
                .unwrap()
                .insert(dir.to_path_buf(), target.to_string());
            Ok(())
        }

        fn stage(&self, _root: &Path, path: &str) -> Result<()> {
            self.record(format!("add {}", path));
            if self.fail_stage {
                return Err(git_error("index.lock exists"));
            }
            Ok(())
        }

        fn commit(&self, _root: &Path, path: &str, message: &str) -> Result<()> {
            self.record(format!(
                "commit -- {}: {}",
                path,
                message.lines().next().unwrap_or("")
            ));
            if self.fail_commit {
                return Err(git_error("pre-commit hook failed"));
            }
            Ok(())
        }

        fn unstage(&self, _root: &Path, path: &str) -> Result<()> {
            self.record(format!("unstage {}", path));
            Ok(())
        }

        fn fetch_origin(&self, _root: &Path) -> Result<()> {
            self.record("fetch-origin");
            if self.fail_fetch_origin {
                return Err(git_error("network unreachable"));
            }
            Ok(())
        }

        fn resolve_ref(&self, _root: &Path, reference: &str) -> Result<String> {
            self.refs
                .get(reference)
                .cloned()
                .ok_or_else(|| git_error("unknown revision"))
        }

        fn is_ancestor(&self, _root: &Path, ancestor: &str, descendant: &str) -> Result<bool> {
            Ok(self
                .ancestors
                .contains(&(ancestor.to_string(), descendant.to_string())))
        }

        fn pull(&self, _root: &Path, branch: &str) -> Result<PullResult> {
            self.record(format!("pull {}", branch));
            Ok(self.pull_result.clone().unwrap_or(PullResult::Merged))
        }

        fn abort_merge(&self, _root: &Path) -> Result<()> {
            self.record("merge-abort");
            Ok(())
        }

        fn reset_hard(&self, _root: &Path, target: &str) -> Result<()> {
            self.record(format!("reset {}", target));
            Ok(())
        }

        fn current_branch(&self, _root: &Path) -> Result<String> {
            self.branch.clone().ok_or_else(|| git_error("no branch"))
        }

        fn switch_branch(&self, _root: &Path, branch: &str) -> Result<()> {
            self.record(format!("switch {}", branch));
            Ok(())
        }

        fn push(&self, _root: &Path, branch: &str, force: bool) -> Result<PushResult> {
            self.record(format!("push {}{}", branch, if force { " --force" } else { "" }));
            Ok(self
                .push_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PushResult::Pushed))
        }

        fn status(&self, _root: &Path) -> Result<String> {
            self.status.clone().ok_or_else(|| git_error("not a repo"))
        }

        fn configured_identity(&self, _root: &Path) -> Result<Option<Identity>> {
            Ok(self.configured.clone())
        }

        fn set_identity(&self, _root: &Path, identity: &Identity) -> Result<()> {
            self.record(format!("set-identity {}", identity));
            Ok(())
        }

        fn last_commit_author(&self, _root: &Path) -> Result<Option<Identity>> {
            Ok(self.last_author.clone())
        }
    }

    fn mock_driver(ops: MockGitOperations) -> (GitDriver, Arc<Mutex<Vec<String>>>) {
        let calls = ops.calls.clone();
        let driver = GitDriver::with_operations(
            Box::new(ops),
            PathBuf::from("/mock/repo"),
            IdentityConfig::default(),
        );
        (driver, calls)
    }

    fn ahead(message: &str) -> PushResult {
        PushResult::Rejected {
            kind: PushFailureKind::RemoteAhead,
            message: message.to_string(),
        }
    }

    fn pushes(calls: &Arc<Mutex<Vec<String>>>) -> usize {
        calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("push"))
            .count()
    }

    #[test]
    fn test_recorded_commit_reads_gitlink() {
        let mut ops = MockGitOperations::new();
        ops.gitlinks.insert("vendor/lib".to_string(), OLD.to_string());
        let (driver, _) = mock_driver(ops);
        assert_eq!(driver.recorded_commit("vendor/lib").unwrap(), OLD);
    }

    #[test]
    fn test_recorded_commit_missing_binding() {
        let (driver, _) = mock_driver(MockGitOperations::new());
        let result = driver.recorded_commit("vendor/missing");
        assert!(matches!(result, Err(Error::CommitReadFailed { .. })));
    }

    #[test]
    fn test_fetch_and_checkout_lands_on_target() {
        let ops = MockGitOperations::new();
        ops.heads
            .lock()
            .unwrap()
            .insert(PathBuf::from("/mock/repo/vendor/lib"), OLD.to_string());
        let (driver, calls) = mock_driver(ops);

        driver.fetch_and_checkout("vendor/lib", NEW).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], "fetch-all /mock/repo/vendor/lib");
        assert_eq!(calls[1], format!("checkout /mock/repo/vendor/lib {}", NEW));
    }

    #[test]
    fn test_fetch_and_checkout_initializes_missing_submodule() {
        let mut ops = MockGitOperations::new();
        ops.initialized = false;
        let (driver, calls) = mock_driver(ops);

        driver.fetch_and_checkout("vendor/lib", NEW).unwrap();
        assert_eq!(calls.lock().unwrap()[0], "init vendor/lib");
    }

    #[test]
    fn test_fetch_and_checkout_restores_previous_head_on_failure() {
        let mut ops = MockGitOperations::new();
        ops.fail_checkout = true;
        ops.heads
            .lock()
            .unwrap()
            .insert(PathBuf::from("/mock/repo/vendor/lib"), OLD.to_string());
        let (driver, calls) = mock_driver(ops);

        let result = driver.fetch_and_checkout("vendor/lib", NEW);
        assert!(matches!(result, Err(Error::UpdateFailed { .. })));

        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.last().unwrap(),
            &format!("checkout /mock/repo/vendor/lib {}", OLD)
        );
    }

    #[test]
    fn test_fetch_failure_does_not_checkout() {
        let mut ops = MockGitOperations::new();
        ops.fail_fetch_all = true;
        let (driver, calls) = mock_driver(ops);

        let result = driver.fetch_and_checkout("vendor/lib", NEW);
        match result {
            Err(Error::UpdateFailed { path, message }) => {
                assert_eq!(path, "vendor/lib");
                assert!(message.contains("could not resolve host"));
            }
            other => panic!("expected UpdateFailed, got {:?}", other),
        }
        assert!(!calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with("checkout")));
    }

    #[test]
    fn test_stage_and_commit_configures_identity_once() {
        let mut ops = MockGitOperations::new();
        ops.last_author = Some(Identity::new("Last Author", "last@example.com"));
        let (driver, calls) = mock_driver(ops);

        driver.stage_and_commit("vendor/lib", OLD, NEW).unwrap();
        driver.stage_and_commit("tools", OLD, NEW).unwrap();

        let calls = calls.lock().unwrap();
        let identity_calls: Vec<_> = calls
            .iter()
            .filter(|c| c.starts_with("set-identity"))
            .collect();
        assert_eq!(identity_calls.len(), 1);
        assert!(identity_calls[0].contains("Last Author"));
        assert!(calls.contains(&"add vendor/lib".to_string()));
        assert!(calls.contains(
            &"commit -- vendor/lib: chore(submodules): update vendor/lib to 2222222".to_string()
        ));
        assert!(calls.contains(&"commit -- tools: chore(submodules): update tools to 2222222".to_string()));
    }

    #[test]
    fn test_configure_identity_keeps_repository_identity() {
        let mut ops = MockGitOperations::new();
        ops.configured = Some(Identity::new("Configured", "c@example.com"));
        let (driver, calls) = mock_driver(ops);

        let (identity, source) = driver.configure_identity().unwrap();
        assert_eq!(identity.name, "Configured");
        assert_eq!(source, IdentitySource::Repository);
        assert!(!calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with("set-identity")));
    }

    #[test]
    fn test_configure_identity_falls_back_to_default() {
        let (driver, _) = mock_driver(MockGitOperations::new());
        let (identity, source) = driver.configure_identity().unwrap();
        assert_eq!(identity, Identity::fallback());
        assert_eq!(source, IdentitySource::Default);
    }

    #[test]
    fn test_stage_and_commit_failure() {
        let mut ops = MockGitOperations::new();
        ops.fail_commit = true;
        let (driver, _) = mock_driver(ops);
        let result = driver.stage_and_commit("vendor/lib", OLD, NEW);
        assert!(matches!(result, Err(Error::CommitFailed { .. })));
    }

    #[test]
    fn test_failed_commit_unstages_and_restores_recorded_checkout() {
        let mut ops = MockGitOperations::new();
        ops.fail_commit = true;
        ops.gitlinks.insert("vendor/lib".to_string(), OLD.to_string());
        let (driver, calls) = mock_driver(ops);

        let result = driver.stage_and_commit("vendor/lib", OLD, NEW);
        assert!(matches!(result, Err(Error::CommitFailed { .. })));

        let calls = calls.lock().unwrap();
        let commit = calls.iter().position(|c| c.starts_with("commit")).unwrap();
        let unstage = calls.iter().position(|c| c == "unstage vendor/lib").unwrap();
        assert!(unstage > commit);
        assert_eq!(
            calls.last().unwrap(),
            &format!("checkout /mock/repo/vendor/lib {}", OLD)
        );
    }

    #[test]
    fn test_failed_stage_never_commits_and_restores() {
        let mut ops = MockGitOperations::new();
        ops.fail_stage = true;
        ops.gitlinks.insert("tools".to_string(), OLD.to_string());
        let (driver, calls) = mock_driver(ops);

        let result = driver.stage_and_commit("tools", "unknown", NEW);
        match result {
            Err(Error::CommitFailed { path, message }) => {
                assert_eq!(path, "tools");
                assert!(message.contains("index.lock"));
            }
            other => panic!("expected CommitFailed, got {:?}", other),
        }

        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("commit")));
        assert!(calls.contains(&"unstage tools".to_string()));
        assert_eq!(calls.last().unwrap(), &format!("checkout /mock/repo/tools {}", OLD));
    }

    #[test]
    fn test_successful_commit_leaves_index_alone() {
        let (driver, calls) = mock_driver(MockGitOperations::new());
        driver.stage_and_commit("vendor/lib", OLD, NEW).unwrap();
        assert!(!calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with("unstage") || c.starts_with("checkout")));
    }

    #[test]
    fn test_diverges_when_remote_not_ancestor() {
        let mut ops = MockGitOperations::new();
        ops.refs.insert("main".to_string(), OLD.to_string());
        ops.refs.insert("origin/main".to_string(), NEW.to_string());
        let (driver, _) = mock_driver(ops);
        assert!(driver.diverges_from_remote("main"));
    }

    #[test]
    fn test_not_divergent_when_local_ahead_or_equal() {
        let mut ops = MockGitOperations::new();
        ops.refs.insert("main".to_string(), NEW.to_string());
        ops.refs.insert("origin/main".to_string(), OLD.to_string());
        ops.ancestors.push((OLD.to_string(), NEW.to_string()));
        let (driver, _) = mock_driver(ops);
        assert!(!driver.diverges_from_remote("main"));

        let mut ops = MockGitOperations::new();
        ops.refs.insert("main".to_string(), OLD.to_string());
        ops.refs.insert("origin/main".to_string(), OLD.to_string());
        let (driver, _) = mock_driver(ops);
        assert!(!driver.diverges_from_remote("main"));
    }

    #[test]
    fn test_divergence_is_best_effort() {
        let mut ops = MockGitOperations::new();
        ops.fail_fetch_origin = true;
        let (driver, _) = mock_driver(ops);
        assert!(!driver.diverges_from_remote("main"));

        // Unknown refs
        let (driver, _) = mock_driver(MockGitOperations::new());
        assert!(!driver.diverges_from_remote("main"));
    }

    #[test]
    fn test_synchronize_skips_when_not_divergent() {
        let (driver, calls) = mock_driver(MockGitOperations::new());
        assert_eq!(driver.synchronize_with_remote("main").unwrap(), None);
        assert!(!calls.lock().unwrap().iter().any(|c| c.starts_with("pull")));
    }

    #[test]
    fn test_synchronize_resets_on_submodule_conflict() {
        let mut ops = MockGitOperations::new();
        ops.refs.insert("main".to_string(), OLD.to_string());
        ops.refs.insert("origin/main".to_string(), NEW.to_string());
        ops.pull_result = Some(PullResult::SubmoduleConflict {
            paths: vec!["vendor/lib".to_string()],
        });
        let (driver, calls) = mock_driver(ops);

        let recovery = driver.synchronize_with_remote("main").unwrap();
        assert_eq!(
            recovery,
            Some(Recovery::ResetToRemote {
                conflicts: vec!["vendor/lib".to_string()]
            })
        );
        assert!(calls
            .lock()
            .unwrap()
            .contains(&"reset origin/main".to_string()));
    }

    #[test]
    fn test_synchronize_propagates_other_pull_failures() {
        let mut ops = MockGitOperations::new();
        ops.refs.insert("main".to_string(), OLD.to_string());
        ops.refs.insert("origin/main".to_string(), NEW.to_string());
        ops.pull_result = Some(PullResult::Failed {
            message: "CONFLICT (content): Merge conflict in README.md".to_string(),
        });
        let (driver, calls) = mock_driver(ops);

        let result = driver.synchronize_with_remote("main");
        match result {
            Err(Error::SyncFailed { branch, message }) => {
                assert_eq!(branch, "main");
                assert!(message.contains("README.md"));
            }
            other => panic!("expected SyncFailed, got {:?}", other),
        }
        let calls = calls.lock().unwrap();
        assert!(calls.contains(&"merge-abort".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("reset")));
    }

    #[test]
    fn test_push_direct_success() {
        let (driver, calls) = mock_driver(MockGitOperations::new());
        let summary = driver.push("main", false).unwrap();
        assert_eq!(summary.attempts, 1);
        assert_eq!(summary.recovery, None);
        assert_eq!(pushes(&calls), 1);
    }

    #[test]
    fn test_push_retries_once_after_merge() {
        let ops = MockGitOperations::new().with_pushes(vec![
            ahead("[rejected] (fetch first)"),
            PushResult::Pushed,
        ]);
        let (driver, calls) = mock_driver(ops);

        let summary = driver.push("main", false).unwrap();
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.recovery, Some(Recovery::Merged));
        assert!(!summary.discarded_local_commits());

        let calls = calls.lock().unwrap();
        let sequence: Vec<&str> = calls.iter().map(String::as_str).collect();
        assert_eq!(sequence, vec!["push main", "fetch-origin", "pull main", "push main"]);
    }

    #[test]
    fn test_push_retry_failure_surfaces_second_error() {
        let ops = MockGitOperations::new().with_pushes(vec![
            ahead("first rejection"),
            PushResult::Rejected {
                kind: PushFailureKind::ProtectedBranch,
                message: "second rejection".to_string(),
            },
        ]);
        let (driver, calls) = mock_driver(ops);

        let result = driver.push("main", false);
        match result {
            Err(Error::PushFailed { kind, message, .. }) => {
                assert_eq!(kind, PushFailureKind::ProtectedBranch);
                assert_eq!(message, "second rejection");
            }
            other => panic!("expected PushFailed, got {:?}", other),
        }
        assert_eq!(pushes(&calls), 2);
    }

    #[test]
    fn test_push_resets_to_remote_on_submodule_conflict() {
        let mut ops = MockGitOperations::new()
            .with_pushes(vec![ahead("non-fast-forward"), PushResult::Pushed]);
        ops.pull_result = Some(PullResult::SubmoduleConflict {
            paths: vec!["vendor/lib".to_string()],
        });
        let (driver, calls) = mock_driver(ops);

        let summary = driver.push("main", false).unwrap();
        assert!(summary.discarded_local_commits());
        assert!(calls
            .lock()
            .unwrap()
            .contains(&"reset origin/main".to_string()));
    }

    #[test]
    fn test_push_switches_branch_before_merge() {
        let mut ops =
            MockGitOperations::new().with_pushes(vec![ahead("fetch first"), PushResult::Pushed]);
        ops.branch = Some("HEAD".to_string());
        let (driver, calls) = mock_driver(ops);

        driver.push("main", false).unwrap();
        assert!(calls.lock().unwrap().contains(&"switch main".to_string()));
    }

    #[test]
    fn test_push_non_recoverable_rejections_fail_immediately() {
        for kind in [
            PushFailureKind::PermissionDenied,
            PushFailureKind::RepositoryNotFound,
            PushFailureKind::ProtectedBranch,
            PushFailureKind::Other,
        ] {
            let ops = MockGitOperations::new().with_pushes(vec![PushResult::Rejected {
                kind,
                message: "denied".to_string(),
            }]);
            let (driver, calls) = mock_driver(ops);

            let result = driver.push("main", false);
            assert_eq!(
                result.as_ref().err().and_then(Error::push_failure_kind),
                Some(kind)
            );
            let calls = calls.lock().unwrap();
            assert_eq!(calls.as_slice(), ["push main"]);
        }
    }

    #[test]
    fn test_force_push_skips_recovery() {
        let ops = MockGitOperations::new().with_pushes(vec![ahead("fetch first")]);
        let (driver, calls) = mock_driver(ops);

        let result = driver.push("main", true);
        assert_eq!(
            result.err().and_then(|e| e.push_failure_kind()),
            Some(PushFailureKind::RemoteAhead)
        );
        assert_eq!(calls.lock().unwrap().as_slice(), ["push main --force"]);

        let (driver, _) = mock_driver(MockGitOperations::new());
        let summary = driver.push("main", true).unwrap();
        assert!(summary.forced);
        assert_eq!(summary.attempts, 1);
    }

    #[test]
    fn test_current_branch_falls_back_to_default() {
        let mut ops = MockGitOperations::new();
        ops.branch = None;
        let (driver, _) = mock_driver(ops);
        assert_eq!(driver.current_branch(), defaults::DEFAULT_BRANCH);

        let mut ops = MockGitOperations::new();
        ops.branch = Some("release".to_string());
        let (driver, _) = mock_driver(ops);
        assert_eq!(driver.current_branch(), "release");
    }

    #[test]
    fn test_has_uncommitted_changes_is_best_effort() {
        let mut ops = MockGitOperations::new();
        ops.status = Some(" M vendor/lib\n".to_string());
        let (driver, _) = mock_driver(ops);
        assert!(driver.has_uncommitted_changes());

        let mut ops = MockGitOperations::new();
        ops.status = Some(String::new());
        let (driver, _) = mock_driver(ops);
        assert!(!driver.has_uncommitted_changes());

        let (driver, _) = mock_driver(MockGitOperations::new());
        assert!(!driver.has_uncommitted_changes());
    }
}
