//! # Submodule Sync Library
//!
//! This library keeps the git submodules of a repository pointed at the
//! latest commit of the branch each one tracks. It is used by the
//! `submodule-sync` command-line tool, which is typically run on a schedule,
//! but the engine can be embedded directly.
//!
//! ## Quick Example
//!
//! ```no_run
//! use submodule_sync::config::{RepoTarget, SyncConfig};
//! use submodule_sync::phases::ReconciliationEngine;
//!
//! let mut config = SyncConfig::new(RepoTarget::new("acme", "widgets").with_branch("main"));
//! config.credential = std::env::var("GITHUB_TOKEN").ok();
//!
//! let mut engine = ReconciliationEngine::from_config(config)?;
//! let report = engine.run()?;
//! println!(
//!     "{} of {} submodules updated",
//!     report.updated_count(),
//!     report.total_submodules
//! );
//! # Ok::<(), submodule_sync::error::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: `SyncConfig` is built once, up front, and
//!   passed to the engine; the library never reads process environment in
//!   the middle of a run.
//! - **Collaborators (`provision`, `manifest`, `remote`)**: materialize the
//!   working tree, read `.gitmodules`, and look up branch tips. Each sits
//!   behind a trait so the engine can be driven with test doubles.
//! - **Driver (`driver`, `git`)**: every git interaction, including the push
//!   state machine that merges a remote that moved ahead and retries once.
//! - **Phases (`phases`)**: the reconciliation state machine and its
//!   `ReconciliationEngine`.
//!
//! ## Execution Flow
//!
//! 1.  **Repository**: Use the requested working tree or clone a scratch one.
//! 2.  **Discovery**: Read the declared submodules from the manifest.
//! 3.  **Resolution**: Pair each recorded commit with its upstream tip.
//! 4.  **Application**: Check out and commit each outdated submodule.
//! 5.  **Publication**: Merge the remote if it diverged, then push once.
//!
//! Scratch clones are removed at the end of every run, successful or not.

pub mod config;
pub mod defaults;
pub mod driver;
pub mod error;
pub mod git;
pub mod guard;
pub mod manifest;
pub mod output;
pub mod phases;
pub mod provision;
pub mod remote;
pub mod suggestions;
