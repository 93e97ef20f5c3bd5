//! # Ls Command Implementation
//!
//! This module implements the `ls` subcommand, which lists the submodules
//! declared in a local manifest.
//!
//! This command is a safe, read-only operation: it does not touch the
//! network or any repository.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, ValueEnum};

use submodule_sync::defaults::MANIFEST_FILE;
use submodule_sync::manifest::{GitmodulesReader, ManifestReader, SubmoduleDecl};
use submodule_sync::suggestions;

/// List the submodules declared in a manifest
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Path to the manifest file.
    #[arg(short, long, value_name = "FILE", default_value = MANIFEST_FILE)]
    pub manifest: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: LsFormat,

    /// Show only the number of submodules.
    #[arg(long)]
    pub count: bool,
}

/// Output formats for the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LsFormat {
    /// One submodule per line: path, url, branch
    #[default]
    Table,
    /// JSON array of objects
    Json,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs) -> Result<ExitCode> {
    if !args.manifest.exists() {
        return Err(suggestions::manifest_not_found(&args.manifest));
    }
    let submodules = GitmodulesReader.read(&args.manifest)?;

    if args.count {
        println!("{}", submodules.len());
        return Ok(ExitCode::SUCCESS);
    }

    match args.format {
        LsFormat::Table => print_table(&submodules),
        LsFormat::Json => println!("{}", to_json(&submodules)?),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_table(submodules: &[SubmoduleDecl]) {
    if submodules.is_empty() {
        println!("No submodules declared");
        return;
    }
    let width = submodules
        .iter()
        .map(|s| s.path.len())
        .max()
        .unwrap_or_default();
    for submodule in submodules {
        println!(
            "{:width$}  {}  {}",
            submodule.path,
            submodule.url,
            submodule.branch.as_deref().unwrap_or("(default)"),
            width = width
        );
    }
}

fn to_json(submodules: &[SubmoduleDecl]) -> Result<String> {
    let entries: Vec<serde_json::Value> = submodules
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "path": s.path,
                "url": s.url,
                "branch": s.branch,
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}
