//! # Completions Command Implementation
//!
//! This module implements the `completions` subcommand, which prints a shell
//! completion script generated by `clap_complete` from the CLI definition.
//!
//! ```bash
//! submodule-sync completions bash > ~/.local/share/bash-completion/completions/submodule-sync
//! submodule-sync completions zsh --output ~/.zfunc/_submodule-sync
//! submodule-sync completions fish > ~/.config/fish/completions/submodule-sync.fish
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, ValueEnum};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

/// Shell types for completion generation
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    /// Bourne Again Shell
    Bash,
    /// Z Shell
    Zsh,
    /// Fish Shell
    Fish,
    /// PowerShell
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish Shell
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,

    /// Write the script to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<ExitCode> {
    let script = render(args.shell)?;
    match args.output {
        Some(path) => fs::write(&path, script)
            .with_context(|| format!("Failed to write completions to {}", path.display()))?,
        None => io::stdout().write_all(&script)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn render(shell: CompletionShell) -> Result<Vec<u8>> {
    let mut cmd = Cli::command();
    let mut script = Vec::new();
    generate(Shell::from(shell), &mut cmd, "submodule-sync", &mut script);
    Ok(script)
}
