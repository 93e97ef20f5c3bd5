//! # Sync Command Implementation
//!
//! This module implements the `sync` subcommand, which runs one complete
//! reconciliation cycle: every submodule behind its tracked branch is moved
//! to the branch tip, each move is committed, and the branch is pushed once.
//!
//! A run lock keyed by the target repository keeps two runs from working on
//! the same repository at once. Ctrl-C is not intercepted; the engine's
//! cancellation token is for embedders.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use log::debug;

use submodule_sync::driver::short_commit;
use submodule_sync::guard::RunGuard;
use submodule_sync::output::{OutputConfig, Status};
use submodule_sync::phases::{ReconciliationEngine, RunReport};
use submodule_sync::{defaults, suggestions};

use super::{build_config, load_settings, TargetArgs, EXIT_PARTIAL_FAILURE};

/// Update submodules to their latest upstream commits and push
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Do not merge the remote branch before pushing.
    #[arg(long)]
    pub skip_sync: bool,

    /// Commit updates locally but do not push them.
    #[arg(long)]
    pub skip_push: bool,

    /// Force-push, discarding remote commits the local branch lacks.
    #[arg(long)]
    pub force_push: bool,

    /// Directory holding run lock files.
    ///
    /// Defaults to the system cache directory (`~/.cache/submodule-sync/locks`
    /// on Linux).
    #[arg(long, value_name = "DIR", env = "SUBMODULE_SYNC_LOCK_DIR")]
    pub lock_dir: Option<PathBuf>,
}

/// Execute the `sync` command.
pub fn execute(args: SyncArgs, output: &OutputConfig) -> Result<ExitCode> {
    let settings = load_settings(args.target.settings.as_deref())?;
    let mut config = build_config(&args.target, settings)?;
    config.skip_sync |= args.skip_sync;
    config.skip_push |= args.skip_push;
    config.force_push = args.force_push;

    let lock_dir = args.lock_dir.unwrap_or_else(defaults::default_lock_dir);
    let guard = RunGuard::acquire(&lock_dir, &config.target).map_err(suggestions::explain)?;

    println!(
        "{} Updating submodules of {}",
        output.label(Status::Working),
        config.target.slug()
    );

    let mut engine = ReconciliationEngine::from_config(config).map_err(suggestions::explain)?;
    let result = engine.run();
    debug!("Run ended in {} via {:?}", engine.state(), engine.history());
    drop(guard);

    let report = result.map_err(suggestions::explain)?;
    print_report(&report, output);

    if report.is_partial_failure() {
        return Ok(ExitCode::from(EXIT_PARTIAL_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport, output: &OutputConfig) {
    if report.total_submodules == 0 {
        println!("{} No submodules declared", output.label(Status::Ok));
        return;
    }

    for outcome in &report.outcomes {
        match outcome.failure_reason() {
            None => println!(
                "{} {}: {} -> {}",
                output.label(Status::Updated),
                outcome.path(),
                short_commit(outcome.from_commit()),
                short_commit(outcome.to_commit())
            ),
            Some(reason) => println!(
                "{} {}: {}",
                output.label(Status::Failed),
                outcome.path(),
                reason
            ),
        }
    }

    println!(
        "\n{} of {} submodules updated",
        report.updated_count(),
        report.total_submodules
    );

    if let Some(push) = &report.push {
        println!(
            "{} Pushed {}{}",
            output.label(Status::Pushed),
            report.branch.as_deref().unwrap_or(defaults::DEFAULT_BRANCH),
            if push.attempts > 1 { " after merging the remote" } else { "" }
        );
    } else if report.updated_count() > 0 {
        println!(
            "{} Updates committed locally, not pushed",
            output.label(Status::Info)
        );
    }

    if report.updates_discarded {
        println!(
            "{} The remote branch conflicted with the update commits and won; the next run re-applies them",
            output.label(Status::Warning)
        );
    }

    if report.is_partial_failure() {
        println!(
            "{} {} submodule update(s) failed; the rest were kept",
            output.label(Status::Warning),
            report.failed_count()
        );
    }
}
