//! # Check Command Implementation
//!
//! This module implements the `check` subcommand, a dry run of `sync`. It
//! reads the manifest, resolves the recorded and upstream commit of every
//! submodule, and reports which ones are behind.
//!
//! This command does not fetch submodules, commit or push. It does clone
//! the parent repository when no `--path` is given.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use submodule_sync::driver::short_commit;
use submodule_sync::output::{emoji, OutputConfig, Status};
use submodule_sync::phases::{Plan, ReconciliationEngine};
use submodule_sync::suggestions;

use super::{build_config, load_settings, TargetArgs};

/// Report which submodules are behind their tracked branch
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Exit with status 1 when any submodule is outdated.
    #[arg(long)]
    pub exit_code: bool,
}

/// Execute the `check` command.
pub fn execute(args: CheckArgs, output: &OutputConfig) -> Result<ExitCode> {
    let settings = load_settings(args.target.settings.as_deref())?;
    let config = build_config(&args.target, settings)?;

    println!(
        "{} Checking submodules of {}",
        emoji(output, "🔍", "[CHECK]"),
        config.target.slug()
    );

    let mut engine = ReconciliationEngine::from_config(config).map_err(suggestions::explain)?;
    let plan = engine.plan().map_err(suggestions::explain)?;
    let outdated = print_plan(&plan, output);

    if args.exit_code && outdated > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints the plan and returns the number of outdated submodules.
fn print_plan(plan: &Plan, output: &OutputConfig) -> usize {
    if plan.submodules.is_empty() {
        println!("{} No submodules declared", output.label(Status::Ok));
        return 0;
    }

    for submodule in &plan.submodules {
        let path = &submodule.record.path;
        let branch = submodule.tracked_branch.as_deref().unwrap_or("?");
        if submodule.update_required() {
            println!(
                "{} {} ({}): {} -> {}",
                output.label(Status::Outdated),
                path,
                branch,
                short_commit(submodule.recorded.as_str()),
                short_commit(submodule.upstream_commit())
            );
        } else if submodule.upstream.is_none() {
            println!(
                "{} {}: latest commit unknown",
                output.label(Status::Unknown),
                path
            );
        } else {
            println!(
                "{} {} ({}): up to date",
                output.label(Status::Ok),
                path,
                branch
            );
        }
    }

    let outdated = plan.outdated().count();
    println!(
        "\n{} of {} submodules outdated",
        outdated,
        plan.submodules.len()
    );
    outdated
}
