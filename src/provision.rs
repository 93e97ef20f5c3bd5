//! # Working Tree Provisioning
//!
//! Materializes the working tree a run operates on and removes it again
//! afterwards. A provisioner either clones into a directory it is handed, or
//! creates its own scratch directory and clones into that.
//!
//! Scratch directories are the only thing teardown ever deletes. Each one is
//! named with [`defaults::SCRATCH_PREFIX`] and carries a
//! [`defaults::SCRATCH_MARKER`] file written at creation; a directory missing
//! either is left alone, so a caller-supplied path can never be removed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::RepoTarget;
use crate::defaults;
use crate::error::Result;
use crate::git;

/// What a filesystem path holds, as far as provisioning is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    Missing,
    /// An existing git working tree.
    WorkTree,
    /// An existing, empty directory that is not a working tree.
    Empty,
    /// An existing directory (or file) with foreign contents.
    Occupied,
}

/// How the working tree behind a handle came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOrigin {
    /// A working tree the caller already had.
    Existing,
    /// Cloned into a directory supplied by the caller.
    ClonedInto,
    /// Cloned into a scratch directory owned by the provisioner.
    Scratch,
}

/// The working tree root a run operates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    root: PathBuf,
    origin: HandleOrigin,
    /// Directory to remove on teardown; set only for scratch clones.
    scratch: Option<PathBuf>,
}

impl RepositoryHandle {
    /// Handle for a working tree that already exists.
    pub fn existing(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            origin: HandleOrigin::Existing,
            scratch: None,
        }
    }

    /// Handle for a clone into a caller-supplied directory.
    pub fn cloned_into(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            origin: HandleOrigin::ClonedInto,
            scratch: None,
        }
    }

    /// Handle for a clone at `root` inside the scratch directory `scratch`.
    pub fn scratch(root: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            origin: HandleOrigin::Scratch,
            scratch: Some(scratch.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn origin(&self) -> HandleOrigin {
        self.origin
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_deref()
    }

    /// Whether the tree was freshly cloned by this run.
    pub fn is_fresh_clone(&self) -> bool {
        self.origin != HandleOrigin::Existing
    }
}

/// Creates and removes working trees.
pub trait RepositoryProvisioner {
    /// Clones `target` with its submodules.
    ///
    /// With `target_path` the clone lands in that (empty) directory;
    /// without it, in a new scratch directory. Fails with
    /// `ProvisionFailed`, leaving no scratch directory behind.
    fn provision(
        &self,
        target: &RepoTarget,
        credential: Option<&str>,
        target_path: Option<&Path>,
    ) -> Result<RepositoryHandle>;

    /// Removes the scratch directory behind `handle`, if it owns one.
    /// Idempotent.
    fn teardown(&self, handle: &RepositoryHandle) -> Result<()>;

    /// Classifies a requested path.
    fn inspect(&self, path: &Path) -> PathState {
        inspect_path(path)
    }
}

/// Classifies `path` by looking at the filesystem.
pub fn inspect_path(path: &Path) -> PathState {
    if !path.exists() {
        return PathState::Missing;
    }
    if git::is_work_tree(path) {
        return PathState::WorkTree;
    }
    match fs::read_dir(path) {
        Ok(mut entries) => {
            if entries.next().is_none() {
                PathState::Empty
            } else {
                PathState::Occupied
            }
        }
        Err(_) => PathState::Occupied,
    }
}

/// Provisioner that clones with the system `git`.
#[derive(Debug, Clone)]
pub struct GitProvisioner {
    /// Where scratch directories are created; the system temp dir if unset.
    scratch_parent: Option<PathBuf>,
    timeout: Duration,
}

impl GitProvisioner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            scratch_parent: None,
            timeout,
        }
    }

    pub fn with_scratch_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(parent.into());
        self
    }

    fn create_scratch(&self, target: &RepoTarget) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(defaults::SCRATCH_PREFIX);
        let dir = match &self.scratch_parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        fs::write(dir.path().join(defaults::SCRATCH_MARKER), target.slug())?;
        Ok(dir)
    }
}

impl RepositoryProvisioner for GitProvisioner {
    fn provision(
        &self,
        target: &RepoTarget,
        credential: Option<&str>,
        target_path: Option<&Path>,
    ) -> Result<RepositoryHandle> {
        // origin keeps the plain URL; the token only travels as a header.
        let url = target.display_url();
        let credential = credential.and_then(|token| git::HostCredential::new(&target.host, token));
        let credential = credential.as_ref();
        let branch = target.branch.as_deref();

        if let Some(path) = target_path {
            info!("Cloning {} into {}", url, path.display());
            git::clone_with_submodules(&url, branch, path, credential, self.timeout)?;
            return Ok(RepositoryHandle::cloned_into(path));
        }

        // Dropping the TempDir on any early return removes it.
        let scratch = self.create_scratch(target)?;
        let root = scratch.path().join("repo");
        info!(
            "Cloning {} into scratch directory {}",
            url,
            scratch.path().display()
        );
        git::clone_with_submodules(&url, branch, &root, credential, self.timeout)?;

        let scratch = scratch.keep();
        Ok(RepositoryHandle::scratch(root, scratch))
    }

    fn teardown(&self, handle: &RepositoryHandle) -> Result<()> {
        let Some(dir) = handle.scratch_dir() else {
            return Ok(());
        };
        if !dir.exists() {
            debug!("Scratch directory {} already removed", dir.display());
            return Ok(());
        }
        if !is_owned_scratch(dir) {
            warn!(
                "Refusing to remove {}: not a scratch directory created by submodule-sync",
                dir.display()
            );
            return Ok(());
        }
        fs::remove_dir_all(dir)?;
        debug!("Removed scratch directory {}", dir.display());
        Ok(())
    }
}

/// Whether `dir` carries both ownership marks of a scratch directory.
pub fn is_owned_scratch(dir: &Path) -> bool {
    let named = dir
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(defaults::SCRATCH_PREFIX));
    named && dir.join(defaults::SCRATCH_MARKER).is_file()
}
