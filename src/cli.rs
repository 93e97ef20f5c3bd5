//! CLI argument parsing and command dispatch

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use submodule_sync::output::OutputConfig;

use crate::commands;

/// Submodule Sync - Keep git submodules on the latest commit of their branch
#[derive(Parser, Debug)]
#[command(name = "submodule-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update outdated submodules, commit each update and push once
    Sync(commands::sync::SyncArgs),

    /// Report outdated submodules without changing anything
    Check(commands::check::CheckArgs),

    /// List the submodules declared in a manifest
    Ls(commands::ls::LsArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<ExitCode> {
        init_logging(&self.log_level);

        let output = OutputConfig::from_env_and_flag(&self.color);
        console::set_colors_enabled(output.use_color);
        console::set_colors_enabled_stderr(output.use_color);

        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &output),
            Commands::Check(args) => commands::check::execute(args, &output),
            Commands::Ls(args) => commands::ls::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Initializes `env_logger` at `level`. `RUST_LOG` takes precedence when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // Logging is already set up when the CLI is driven in-process.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
