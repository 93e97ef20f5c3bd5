//! Phase 1: Repository
//!
//! Decides which working tree a run operates on:
//!
//! | Requested path                    | Result                         |
//! |-----------------------------------|--------------------------------|
//! | none                              | scratch clone                  |
//! | does not exist                    | `RepositoryNotFound`           |
//! | empty, not a working tree         | clone into that path           |
//! | non-empty, not a working tree     | scratch clone (path untouched) |
//! | existing working tree             | used as is                     |

use log::{info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::provision::{PathState, RepositoryHandle, RepositoryProvisioner};

/// Execute Phase 1: produce the working tree handle for this run.
pub fn execute(
    config: &SyncConfig,
    provisioner: &dyn RepositoryProvisioner,
) -> Result<RepositoryHandle> {
    let credential = config.credential.as_deref();

    let Some(path) = config.repo_path.as_deref() else {
        return provisioner.provision(&config.target, credential, None);
    };

    match provisioner.inspect(path) {
        PathState::Missing => Err(Error::RepositoryNotFound {
            path: path.to_path_buf(),
        }),
        PathState::WorkTree => {
            info!("Using existing working tree at {}", path.display());
            Ok(RepositoryHandle::existing(path))
        }
        PathState::Empty => provisioner.provision(&config.target, credential, Some(path)),
        PathState::Occupied => {
            warn!(
                "{} is not a git working tree and is not empty; using a scratch clone instead",
                path.display()
            );
            provisioner.provision(&config.target, credential, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoTarget;
    use crate::provision::HandleOrigin;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// Provisioner that reports a fixed path state and records calls.
    struct MockProvisioner {
        state: PathState,
        calls: Arc<Mutex<Vec<Option<PathBuf>>>>,
    }

    impl MockProvisioner {
        fn new(state: PathState) -> Self {
            Self {
                state,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl RepositoryProvisioner for MockProvisioner {
        fn provision(
            &self,
            _target: &RepoTarget,
            _credential: Option<&str>,
            target_path: Option<&Path>,
        ) -> Result<RepositoryHandle> {
            self.calls
                .lock()
                .unwrap()
                .push(target_path.map(Path::to_path_buf));
            Ok(match target_path {
                Some(path) => RepositoryHandle::cloned_into(path),
                None => RepositoryHandle::scratch(
                    "/tmp/submodule-sync-test/repo",
                    "/tmp/submodule-sync-test",
                ),
            })
        }

        fn teardown(&self, _handle: &RepositoryHandle) -> Result<()> {
            Ok(())
        }

        fn inspect(&self, _path: &Path) -> PathState {
            self.state
        }
    }

    fn config(path: Option<&str>) -> SyncConfig {
        let mut config = SyncConfig::new(RepoTarget::new("acme", "widgets"));
        config.repo_path = path.map(PathBuf::from);
        config
    }

    #[test]
    fn test_no_path_provisions_scratch() {
        let provisioner = MockProvisioner::new(PathState::Missing);
        let handle = execute(&config(None), &provisioner).unwrap();
        assert_eq!(handle.origin(), HandleOrigin::Scratch);
        assert_eq!(provisioner.calls.lock().unwrap().as_slice(), [None]);
    }

    #[test]
    fn test_missing_path_is_fatal() {
        let provisioner = MockProvisioner::new(PathState::Missing);
        let result = execute(&config(Some("/work/missing")), &provisioner);
        assert!(matches!(result, Err(Error::RepositoryNotFound { .. })));
        assert!(provisioner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_path_is_cloned_into() {
        let provisioner = MockProvisioner::new(PathState::Empty);
        let handle = execute(&config(Some("/work/empty")), &provisioner).unwrap();
        assert_eq!(handle.root(), Path::new("/work/empty"));
        assert_eq!(handle.origin(), HandleOrigin::ClonedInto);
        assert_eq!(
            provisioner.calls.lock().unwrap().as_slice(),
            [Some(PathBuf::from("/work/empty"))]
        );
    }

    #[test]
    fn test_occupied_path_falls_back_to_scratch() {
        let provisioner = MockProvisioner::new(PathState::Occupied);
        let handle = execute(&config(Some("/work/photos")), &provisioner).unwrap();
        assert_eq!(handle.origin(), HandleOrigin::Scratch);
        assert_eq!(provisioner.calls.lock().unwrap().as_slice(), [None]);
    }

    #[test]
    fn test_work_tree_is_used_directly() {
        let provisioner = MockProvisioner::new(PathState::WorkTree);
        let handle = execute(&config(Some("/work/repo")), &provisioner).unwrap();
        assert_eq!(handle.origin(), HandleOrigin::Existing);
        assert!(!handle.is_fresh_clone());
        assert!(provisioner.calls.lock().unwrap().is_empty());
    }
}
