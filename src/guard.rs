//! Run-in-progress lock.
//!
//! At most one reconciliation may run against a target at a time. A run
//! holds a lock file named after the target, created exclusively, and
//! removes it when the guard is dropped. The file records who holds it; a
//! lock whose holder process is gone (a crashed run) is taken over.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::RepoTarget;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMeta {
    pub target: String,
    pub pid: u32,
    pub started_at_secs: u64,
}

/// Held for the duration of a run.
#[derive(Debug)]
pub struct RunGuard {
    path: PathBuf,
    released: bool,
}

impl RunGuard {
    /// Takes the lock for `target` inside `lock_dir`.
    ///
    /// Fails with `RunInProgress` when another live run holds it.
    pub fn acquire(lock_dir: &Path, target: &RepoTarget) -> Result<Self> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(lock_file_name(target));

        let mut reclaimed = false;
        let mut file = loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if reclaimed || !Self::reclaim_stale(&path) {
                        return Err(Error::RunInProgress { lock_path: path });
                    }
                    reclaimed = true;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let meta = LockMeta {
            target: target.slug(),
            pid: std::process::id(),
            started_at_secs: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };
        let written = serde_json::to_vec(&meta)
            .map_err(io::Error::from)
            .and_then(|bytes| file.write_all(&bytes));
        if let Err(e) = written {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        debug!("Acquired run lock {}", path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads who holds the lock at `path`.
    pub fn holder(path: &Path) -> Option<LockMeta> {
        let bytes = fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Removes the lock at `path` when its holder process no longer exists.
    /// A lock without readable metadata may be mid-write and is kept.
    fn reclaim_stale(path: &Path) -> bool {
        let Some(meta) = Self::holder(path) else {
            return false;
        };
        if process_alive(meta.pid) {
            return false;
        }
        // Another run may have reclaimed it already.
        if Self::holder(path).as_ref() != Some(&meta) {
            return false;
        }
        warn!(
            "Removing stale run lock {} left by process {} (no longer running)",
            path.display(),
            meta.pid
        );
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                debug!("Could not remove stale lock {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn release(mut self) -> Result<()> {
        self.remove()?;
        Ok(())
    }

    fn remove(&mut self) -> io::Result<()> {
        if !self.released {
            self.released = true;
            fs::remove_file(&self.path)?;
            debug!("Released run lock {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let _ = self.remove();
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    // Signal 0 only checks that the process exists and may be signalled.
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// `<host>_<owner>_<repo>.lock`, with anything unsafe in a file name
/// replaced.
fn lock_file_name(target: &RepoTarget) -> String {
    let raw = format!("{}_{}_{}", target.host, target.owner, target.repo);
    let safe: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}.lock", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn target() -> RepoTarget {
        RepoTarget::new("acme", "widgets")
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let dir = TempDir::new().unwrap();
        let guard = RunGuard::acquire(dir.path(), &target()).unwrap();

        let second = RunGuard::acquire(dir.path(), &target());
        match second {
            Err(Error::RunInProgress { lock_path }) => assert_eq!(lock_path, guard.path()),
            other => panic!("expected RunInProgress, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = TempDir::new().unwrap();
        let path = {
            let guard = RunGuard::acquire(dir.path(), &target()).unwrap();
            guard.path().to_path_buf()
        };
        assert!(!path.exists());
        RunGuard::acquire(dir.path(), &target()).unwrap();
    }

    #[test]
    fn test_explicit_release() {
        let dir = TempDir::new().unwrap();
        let guard = RunGuard::acquire(dir.path(), &target()).unwrap();
        let path = guard.path().to_path_buf();
        guard.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_holder_metadata() {
        let dir = TempDir::new().unwrap();
        let guard = RunGuard::acquire(dir.path(), &target()).unwrap();

        let meta = RunGuard::holder(guard.path()).unwrap();
        assert_eq!(meta.target, "acme/widgets");
        assert_eq!(meta.pid, std::process::id());
    }

    #[test]
    fn test_distinct_targets_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let _a = RunGuard::acquire(dir.path(), &target()).unwrap();
        let _b = RunGuard::acquire(dir.path(), &RepoTarget::new("acme", "gadgets")).unwrap();
    }

    fn write_lock(dir: &Path, pid: u32) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(lock_file_name(&target()));
        let meta = LockMeta {
            target: "acme/widgets".to_string(),
            pid,
            started_at_secs: 1,
        };
        fs::write(&path, serde_json::to_vec(&meta).unwrap()).unwrap();
        path
    }

    #[test]
    #[cfg(unix)]
    fn test_lock_of_exited_process_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        write_lock(dir.path(), dead_pid);

        let guard = RunGuard::acquire(dir.path(), &target()).unwrap();
        let meta = RunGuard::holder(guard.path()).unwrap();
        assert_eq!(meta.pid, std::process::id());
    }

    #[test]
    fn test_lock_of_live_process_is_respected() {
        let dir = TempDir::new().unwrap();
        let path = write_lock(dir.path(), std::process::id());

        let result = RunGuard::acquire(dir.path(), &target());
        assert!(matches!(result, Err(Error::RunInProgress { .. })));
        assert_eq!(RunGuard::holder(&path).unwrap().started_at_secs, 1);
    }

    #[test]
    fn test_unreadable_lock_is_never_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(lock_file_name(&target()));
        fs::write(&path, b"").unwrap();

        let result = RunGuard::acquire(dir.path(), &target());
        assert!(matches!(result, Err(Error::RunInProgress { .. })));
        assert!(path.exists());
    }

    #[test]
    fn test_lock_file_name_is_sanitized() {
        let mut target = RepoTarget::new("group/sub", "repo");
        target.host = "git.example.com:8443".to_string();
        assert_eq!(lock_file_name(&target), "git.example.com-8443_group-sub_repo.lock");
    }
}
