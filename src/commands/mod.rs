//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `submodule-sync` command-line tool. Each subcommand is defined in its own
//! file to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! `sync` and `check` share [`TargetArgs`], which is merged with the
//! settings file into a [`SyncConfig`] here. Command-line flags and their
//! environment variables win over the settings file, which wins over the
//! built-in defaults.

pub mod check;
pub mod completions;
pub mod ls;
pub mod sync;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Args, ValueEnum};
use log::debug;

use submodule_sync::config::{
    self, Identity, IdentityConfig, RepoTarget, ResolverKind, Settings, SyncConfig,
};
use submodule_sync::defaults;
use submodule_sync::suggestions;

/// Exit code for a run where some submodule updates failed.
pub const EXIT_PARTIAL_FAILURE: u8 = 3;

/// Upstream resolver selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolverArg {
    /// GitHub REST API
    Github,
    /// `git ls-remote` against each submodule's remote
    Git,
}

impl From<ResolverArg> for ResolverKind {
    fn from(arg: ResolverArg) -> Self {
        match arg {
            ResolverArg::Github => ResolverKind::Github,
            ResolverArg::Git => ResolverKind::Git,
        }
    }
}

/// Arguments naming the parent repository and how to reach it.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Owner (user or organization) of the parent repository.
    #[arg(long, value_name = "OWNER", env = "SUBMODULE_SYNC_OWNER")]
    pub owner: Option<String>,

    /// Name of the parent repository.
    #[arg(long, value_name = "REPO", env = "SUBMODULE_SYNC_REPO")]
    pub repo: Option<String>,

    /// Branch to update. Defaults to the branch the working tree is on.
    #[arg(short, long, value_name = "BRANCH", env = "SUBMODULE_SYNC_BRANCH")]
    pub branch: Option<String>,

    /// Token used to clone, push and query the hosting API.
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Existing working tree (or empty directory to clone into).
    ///
    /// Without it, the repository is cloned into a scratch directory that
    /// is removed when the run ends.
    #[arg(short, long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Manifest location relative to the working tree root.
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Settings file. Defaults to .submodule-sync.yaml when it exists.
    #[arg(long, value_name = "FILE", env = "SUBMODULE_SYNC_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// How to look up the latest commit of each submodule.
    #[arg(long, value_enum)]
    pub resolver: Option<ResolverArg>,

    /// Base URL of the GitHub API (for GitHub Enterprise).
    #[arg(long, value_name = "URL", env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    /// Commit author name.
    #[arg(long, value_name = "NAME", requires = "author_email")]
    pub author_name: Option<String>,

    /// Commit author email.
    #[arg(long, value_name = "EMAIL", requires = "author_name")]
    pub author_email: Option<String>,

    /// Seconds a single git command may run.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub git_timeout: Option<u64>,
}

/// Loads the settings file named by `explicit`, or the default one if it
/// exists.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(defaults::SETTINGS_FILE), false),
    };

    if !path.exists() {
        if required {
            anyhow::bail!(
                "Settings file not found: {}\n\nhint: Omit --settings to use {} when present",
                path.display(),
                defaults::SETTINGS_FILE
            );
        }
        return Ok(Settings::default());
    }

    debug!("Loading settings from {}", path.display());
    config::from_file(&path).map_err(|e| suggestions::settings_unreadable(&path, &e))
}

/// Merges command-line arguments over settings into a run configuration.
pub fn build_config(args: &TargetArgs, settings: Settings) -> Result<SyncConfig> {
    let owner = args.owner.clone().or(settings.owner.clone());
    let repo = args.repo.clone().or(settings.repo.clone());
    let (Some(owner), Some(repo)) = (owner, repo) else {
        return Err(suggestions::missing_target());
    };

    let mut target = RepoTarget::new(owner, repo);
    target.branch = args.branch.clone().or(settings.branch.clone());

    let explicit = match (&args.author_name, &args.author_email) {
        (Some(name), Some(email)) => Some(Identity::new(name, email)),
        _ => settings.author.clone(),
    };

    let mut timeouts = settings.timeouts()?;
    if let Some(seconds) = args.git_timeout {
        timeouts.git = Duration::from_secs(seconds);
    }

    let mut config = SyncConfig::new(target);
    config.credential = args.token.clone().filter(|t| !t.is_empty());
    config.repo_path = args.path.clone().or(settings.repo_path);
    if let Some(manifest) = args.manifest.clone().or(settings.manifest) {
        config.manifest_path = manifest;
    }
    config.identity = IdentityConfig::capture(explicit);
    config.timeouts = timeouts;
    if let Some(api_url) = args.api_url.clone().or(settings.api_url) {
        config.api_url = api_url;
    }
    config.resolver = args
        .resolver
        .map(ResolverKind::from)
        .or(settings.resolver)
        .unwrap_or_default();
    config.skip_sync = settings.skip_sync.unwrap_or(false);
    config.skip_push = settings.skip_push.unwrap_or(false);

    debug!("Configuration: {:?}", config);
    Ok(config)
}
