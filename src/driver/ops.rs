//! Primitive git operations used by the driver.
//!
//! Each method maps to one (occasionally two) `git` invocations and carries
//! no policy. Keeping them behind a trait lets the driver's recovery logic
//! be tested against scripted results instead of real repositories.

use std::path::Path;
use std::time::Duration;

use crate::config::Identity;
use crate::error::{Error, Result};
use crate::git::{self, HostCredential, PullResult, PushResult};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Commit a gitlink at `path` points to in `HEAD`, if it is one.
    fn gitlink_commit(&self, root: &Path, path: &str) -> Result<Option<String>>;

    /// Whether a submodule directory has its own checked-out repository.
    fn is_initialized(&self, dir: &Path) -> bool;

    /// Initializes one submodule (`git submodule update --init`).
    fn init_submodule(&self, root: &Path, path: &str) -> Result<()>;

    /// Commit `HEAD` points to in `dir`.
    fn head_commit(&self, dir: &Path) -> Result<String>;

    /// Fetches all remotes, pruning stale refs.
    fn fetch_all(&self, dir: &Path) -> Result<()>;

    /// Checks out `target` as a detached `HEAD`.
    fn checkout(&self, dir: &Path, target: &str) -> Result<()>;

    fn stage(&self, root: &Path, path: &str) -> Result<()>;

    /// Commits `path` alone; anything else in the index stays staged and
    /// out of the commit.
    fn commit(&self, root: &Path, path: &str, message: &str) -> Result<()>;

    /// Drops `path` from the index, back to what `HEAD` records.
    fn unstage(&self, root: &Path, path: &str) -> Result<()>;

    fn fetch_origin(&self, root: &Path) -> Result<()>;

    /// Resolves a revision to a full commit id.
    fn resolve_ref(&self, root: &Path, reference: &str) -> Result<String>;

    fn is_ancestor(&self, root: &Path, ancestor: &str, descendant: &str) -> Result<bool>;

    fn pull(&self, root: &Path, branch: &str) -> Result<PullResult>;

    fn abort_merge(&self, root: &Path) -> Result<()>;

    fn reset_hard(&self, root: &Path, target: &str) -> Result<()>;

    /// Name of the checked-out branch (`HEAD` when detached).
    fn current_branch(&self, root: &Path) -> Result<String>;

    fn switch_branch(&self, root: &Path, branch: &str) -> Result<()>;

    fn push(&self, root: &Path, branch: &str, force: bool) -> Result<PushResult>;

    /// `git status --porcelain` output.
    fn status(&self, root: &Path) -> Result<String>;

    /// Identity visible to git in `root` (`user.name` / `user.email`).
    fn configured_identity(&self, root: &Path) -> Result<Option<Identity>>;

    /// Writes the identity into the repository's local config.
    fn set_identity(&self, root: &Path, identity: &Identity) -> Result<()>;

    /// Author of the most recent commit.
    fn last_commit_author(&self, root: &Path) -> Result<Option<Identity>>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
#[derive(Debug, Clone)]
pub struct DefaultGitOperations {
    timeout: Duration,
    /// Sent with commands that talk to a remote.
    credential: Option<HostCredential>,
}

impl DefaultGitOperations {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Option<HostCredential>) -> Self {
        self.credential = credential;
        self
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        git::run_checked(dir, args, self.timeout)
    }

    fn run_remote(&self, dir: &Path, args: &[&str]) -> Result<String> {
        git::run_checked_as(dir, self.credential.as_ref(), args, self.timeout)
    }

    fn config_value(&self, root: &Path, key: &str) -> Result<Option<String>> {
        let output = git::run(root, &["config", "--get", key], self.timeout)?;
        let value = output.stdout.trim();
        Ok((output.success && !value.is_empty()).then(|| value.to_string()))
    }
}

impl GitOperations for DefaultGitOperations {
    fn gitlink_commit(&self, root: &Path, path: &str) -> Result<Option<String>> {
        let output = self.run(root, &["ls-tree", "HEAD", "--", path])?;
        Ok(git::parse_gitlink(&output))
    }

    fn is_initialized(&self, dir: &Path) -> bool {
        git::is_work_tree(dir)
    }

    fn init_submodule(&self, root: &Path, path: &str) -> Result<()> {
        self.run_remote(root, &["submodule", "update", "--init", "--", path])
            .map(drop)
    }

    fn head_commit(&self, dir: &Path) -> Result<String> {
        self.run(dir, &["rev-parse", "HEAD"])
    }

    fn fetch_all(&self, dir: &Path) -> Result<()> {
        self.run_remote(dir, &["fetch", "--all", "--prune"]).map(drop)
    }

    fn checkout(&self, dir: &Path, target: &str) -> Result<()> {
        self.run(dir, &["checkout", "--quiet", "--detach", target])
            .map(drop)
    }

    fn stage(&self, root: &Path, path: &str) -> Result<()> {
        self.run(root, &["add", "--", path]).map(drop)
    }

    fn commit(&self, root: &Path, path: &str, message: &str) -> Result<()> {
        self.run(root, &["commit", "--quiet", "--only", "-m", message, "--", path])
            .map(drop)
    }

    fn unstage(&self, root: &Path, path: &str) -> Result<()> {
        self.run(root, &["reset", "--quiet", "--", path]).map(drop)
    }

    fn fetch_origin(&self, root: &Path) -> Result<()> {
        self.run_remote(root, &["fetch", "--prune", "origin"])
            .map(drop)
    }

    fn resolve_ref(&self, root: &Path, reference: &str) -> Result<String> {
        let spec = format!("{}^{{commit}}", reference);
        self.run(root, &["rev-parse", "--verify", "--quiet", &spec])
    }

    fn is_ancestor(&self, root: &Path, ancestor: &str, descendant: &str) -> Result<bool> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let output = git::run(root, &args, self.timeout)?;
        if output.success {
            return Ok(true);
        }
        // Exit status 1 means "not an ancestor"; anything else is an error,
        // which git reports on stderr.
        if output.stderr.trim().is_empty() {
            Ok(false)
        } else {
            Err(Error::GitCommand {
                command: args.join(" "),
                dir: root.to_path_buf(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    fn pull(&self, root: &Path, branch: &str) -> Result<PullResult> {
        git::pull(root, branch, self.credential.as_ref(), self.timeout)
    }

    fn abort_merge(&self, root: &Path) -> Result<()> {
        self.run(root, &["merge", "--abort"]).map(drop)
    }

    fn reset_hard(&self, root: &Path, target: &str) -> Result<()> {
        self.run(root, &["reset", "--hard", "--quiet", target])
            .map(drop)
    }

    fn current_branch(&self, root: &Path) -> Result<String> {
        self.run(root, &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn switch_branch(&self, root: &Path, branch: &str) -> Result<()> {
        self.run(root, &["checkout", "--quiet", branch]).map(drop)
    }

    fn push(&self, root: &Path, branch: &str, force: bool) -> Result<PushResult> {
        git::push(root, branch, force, self.credential.as_ref(), self.timeout)
    }

    fn status(&self, root: &Path) -> Result<String> {
        self.run(root, &["status", "--porcelain"])
    }

    fn configured_identity(&self, root: &Path) -> Result<Option<Identity>> {
        let name = self.config_value(root, "user.name")?;
        let email = self.config_value(root, "user.email")?;
        Ok(Identity::from_parts(name, email))
    }

    fn set_identity(&self, root: &Path, identity: &Identity) -> Result<()> {
        self.run(root, &["config", "user.name", &identity.name])?;
        self.run(root, &["config", "user.email", &identity.email])?;
        Ok(())
    }

    fn last_commit_author(&self, root: &Path) -> Result<Option<Identity>> {
        let output = self.run(root, &["log", "-1", "--format=%an%n%ae"])?;
        let mut lines = output.lines();
        Ok(Identity::from_parts(
            lines.next().map(str::to_string),
            lines.next().map(str::to_string),
        ))
    }
}
