//! Orchestrator for a complete reconciliation run
//!
//! This module coordinates all phases behind the `ReconciliationEngine`. The
//! engine owns its collaborators and the working tree handle of the current
//! run; nothing it holds is shared with another run.

use std::path::PathBuf;

use log::{debug, info, warn};

use super::{
    apply, discovery, publish, repository, resolve, CancellationToken, Plan, RunReport, RunState,
};
use crate::config::{ResolverKind, SyncConfig};
use crate::driver::{DriverFactory, GitDriverFactory, VersionControl};
use crate::error::{Error, Result};
use crate::git::HostCredential;
use crate::manifest::{GitmodulesReader, ManifestReader};
use crate::provision::{GitProvisioner, RepositoryHandle, RepositoryProvisioner};
use crate::remote::{GitHubResolver, LsRemoteResolver, RemoteCommitResolver};

/// Drives reconciliation runs, one at a time.
pub struct ReconciliationEngine {
    config: SyncConfig,
    provisioner: Box<dyn RepositoryProvisioner>,
    manifest: Box<dyn ManifestReader>,
    resolver: Box<dyn RemoteCommitResolver>,
    drivers: Box<dyn DriverFactory>,
    cancel: CancellationToken,
    history: Vec<RunState>,
}

impl ReconciliationEngine {
    /// Creates an engine with explicit collaborators.
    pub fn new(
        config: SyncConfig,
        provisioner: Box<dyn RepositoryProvisioner>,
        manifest: Box<dyn ManifestReader>,
        resolver: Box<dyn RemoteCommitResolver>,
        drivers: Box<dyn DriverFactory>,
    ) -> Self {
        Self {
            config,
            provisioner,
            manifest,
            resolver,
            drivers,
            cancel: CancellationToken::new(),
            history: vec![RunState::Uninitialized],
        }
    }

    /// Creates an engine backed by `git` and the configured resolver.
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        let timeouts = config.timeouts;
        // Git only ever presents the token to the target's host.
        let credential = config
            .credential
            .as_deref()
            .and_then(|token| HostCredential::new(&config.target.host, token));
        let resolver: Box<dyn RemoteCommitResolver> = match config.resolver {
            ResolverKind::Github => Box::new(
                GitHubResolver::new(&config.api_url, config.credential.clone(), timeouts.http)?
                    .with_fallback(LsRemoteResolver::new(None, timeouts.git)),
            ),
            ResolverKind::Git => Box::new(LsRemoteResolver::new(credential.clone(), timeouts.git)),
        };
        let drivers = GitDriverFactory::new(config.identity.clone(), timeouts.git)
            .with_credential(credential);

        Ok(Self::new(
            config,
            Box::new(GitProvisioner::new(timeouts.git)),
            Box::new(GitmodulesReader),
            resolver,
            Box::new(drivers),
        ))
    }

    /// Uses `token` for cancellation instead of the engine's own.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The state the last run ended in (or is in).
    pub fn state(&self) -> RunState {
        self.history
            .last()
            .copied()
            .unwrap_or(RunState::Uninitialized)
    }

    /// Every state the last run passed through, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Execute a complete run: update every outdated submodule, then
    /// synchronize and push once.
    ///
    /// The working tree is torn down whether the run succeeds or fails.
    pub fn run(&mut self) -> Result<RunReport> {
        self.history = vec![RunState::Uninitialized];
        let handle = match self.prepare() {
            Ok(handle) => handle,
            Err(e) => return self.fail(e),
        };

        let result = self.reconcile(&handle);
        self.teardown(&handle);
        match result {
            Ok(report) => {
                self.enter(RunState::Done);
                Ok(report)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Execute a dry run that stops once commits are resolved. Nothing is
    /// checked out, committed or pushed.
    pub fn plan(&mut self) -> Result<Plan> {
        self.history = vec![RunState::Uninitialized];
        let handle = match self.prepare() {
            Ok(handle) => handle,
            Err(e) => return self.fail(e),
        };

        let result = self.resolve_plan(&handle);
        self.teardown(&handle);
        match result {
            Ok(plan) => {
                self.enter(RunState::Done);
                Ok(plan)
            }
            Err(e) => self.fail(e),
        }
    }

    /// REPOSITORY_READY: returns the handle only once the state is reached,
    /// so every caller that holds a handle tears it down.
    fn prepare(&mut self) -> Result<RepositoryHandle> {
        let handle = repository::execute(&self.config, self.provisioner.as_ref())?;
        if let Err(e) = self.advance(RunState::RepositoryReady) {
            self.teardown(&handle);
            return Err(e);
        }
        Ok(handle)
    }

    fn open_driver(&self, handle: &RepositoryHandle) -> Box<dyn VersionControl> {
        let driver = self.drivers.open(handle.root());
        if handle.is_fresh_clone() {
            if let Err(e) = driver.configure_identity() {
                warn!("Could not configure commit identity: {}", e);
            }
        }
        driver
    }

    fn branch(&self, driver: &dyn VersionControl) -> String {
        self.config
            .target
            .branch
            .clone()
            .unwrap_or_else(|| driver.current_branch())
    }

    fn manifest_path(&self, handle: &RepositoryHandle) -> PathBuf {
        handle.root().join(&self.config.manifest_path)
    }

    fn resolve_plan(&mut self, handle: &RepositoryHandle) -> Result<Plan> {
        let driver = self.open_driver(handle);

        let records = discovery::execute(self.manifest.as_ref(), &self.manifest_path(handle))?;
        self.advance(RunState::ManifestLoaded)?;

        let submodules = resolve::execute(&records, driver.as_ref(), self.resolver.as_ref());
        self.enter(RunState::CommitsResolved);

        Ok(Plan {
            branch: Some(self.branch(driver.as_ref())),
            submodules,
        })
    }

    fn reconcile(&mut self, handle: &RepositoryHandle) -> Result<RunReport> {
        let driver = self.open_driver(handle);

        // Phase 2: Discovery
        let records = discovery::execute(self.manifest.as_ref(), &self.manifest_path(handle))?;
        self.advance(RunState::ManifestLoaded)?;
        if records.is_empty() {
            info!("No submodules declared; nothing to do");
            return Ok(RunReport {
                state: RunState::Done,
                branch: None,
                total_submodules: 0,
                outcomes: Vec::new(),
                sync: None,
                push: None,
                updates_discarded: false,
            });
        }

        // Phase 3: Resolution
        let submodules = resolve::execute(&records, driver.as_ref(), self.resolver.as_ref());
        self.advance(RunState::CommitsResolved)?;
        info!(
            "{} of {} submodule(s) need an update",
            submodules.iter().filter(|s| s.update_required()).count(),
            submodules.len()
        );

        // Phase 4: Application
        let outcomes = apply::execute(&submodules, driver.as_ref());
        self.advance(RunState::UpdatesApplied)?;

        // Phase 5: Publication
        let branch = self.branch(driver.as_ref());
        if driver.has_uncommitted_changes() {
            debug!("Working tree has changes outside the update commits");
        }

        let sync = publish::synchronize(driver.as_ref(), &branch, self.config.skip_sync)?;
        self.advance(RunState::Synchronized)?;

        // Once started, a push runs to completion; cancellation is not
        // checked past this point.
        let push = publish::push(
            driver.as_ref(),
            &branch,
            &outcomes,
            self.config.skip_push,
            self.config.force_push,
        )?;
        self.enter(RunState::Pushed);

        let updates_discarded = sync
            .as_ref()
            .is_some_and(|r| r.discarded_local_commits())
            || push.as_ref().is_some_and(|p| p.discarded_local_commits());

        Ok(RunReport {
            state: RunState::Done,
            branch: Some(branch),
            total_submodules: records.len(),
            outcomes,
            sync,
            push,
            updates_discarded,
        })
    }

    fn enter(&mut self, state: RunState) {
        debug!("Reached {}", state);
        self.history.push(state);
    }

    /// Enters `state`, then honours a pending cancellation.
    fn advance(&mut self, state: RunState) -> Result<()> {
        self.enter(state);
        if self.cancel.is_cancelled() {
            info!("Run cancelled after {}", state);
            return Err(Error::Cancelled {
                phase: state.to_string(),
            });
        }
        Ok(())
    }

    fn fail<T>(&mut self, error: Error) -> Result<T> {
        debug!("Run failed after {}: {}", self.state(), error);
        self.enter(RunState::Failed);
        Err(error)
    }

    fn teardown(&self, handle: &RepositoryHandle) {
        if let Err(e) = self.provisioner.teardown(handle) {
            warn!("Could not remove scratch directory: {}", e);
        }
    }
}
