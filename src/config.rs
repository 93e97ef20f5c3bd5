//! # Run Configuration
//!
//! This module defines the explicit configuration object handed to the
//! reconciliation engine at construction. Nothing in the library reads the
//! process environment while a run is in progress; the CLI layer gathers
//! flags, environment variables and the optional `.submodule-sync.yaml`
//! settings file once and folds them into a [`SyncConfig`].
//!
//! ## Key Components
//!
//! - **`SyncConfig`**: everything one run needs: the target repository, an
//!   optional local working tree, identity sources, timeouts and the
//!   skip/force switches.
//!
//! - **`IdentityConfig`**: the committer identity sources in precedence order
//!   (explicit > environment > repository > history > fixed default).
//!
//! - **`Settings`**: the serde model of the YAML settings file. Every field is
//!   optional; flags and environment variables take precedence over it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

/// A committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// The identity used when every other source is empty.
    pub fn fallback() -> Self {
        Self::new(
            defaults::FALLBACK_AUTHOR_NAME,
            defaults::FALLBACK_AUTHOR_EMAIL,
        )
    }

    /// Builds an identity only when both halves are present and non-blank.
    pub fn from_parts(name: Option<String>, email: Option<String>) -> Option<Self> {
        match (name, email) {
            (Some(name), Some(email)) if !name.trim().is_empty() && !email.trim().is_empty() => {
                Some(Self::new(name.trim(), email.trim()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Where a resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Explicit,
    Environment,
    Repository,
    History,
    Default,
}

/// Identity sources captured when the configuration is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Identity given on the command line or in the settings file.
    pub explicit: Option<Identity>,
    /// Identity taken from `GIT_AUTHOR_NAME` / `GIT_AUTHOR_EMAIL`.
    pub environment: Option<Identity>,
}

impl IdentityConfig {
    /// Captures the environment identity once, next to an explicit one.
    pub fn capture(explicit: Option<Identity>) -> Self {
        let environment = Identity::from_parts(
            std::env::var("GIT_AUTHOR_NAME").ok(),
            std::env::var("GIT_AUTHOR_EMAIL").ok(),
        );
        Self {
            explicit,
            environment,
        }
    }

    /// Resolves the identity to commit with.
    ///
    /// The repository and history sources are only consulted when the
    /// configured sources are empty, since reading them costs a git call.
    pub fn resolve(
        &self,
        repository: impl FnOnce() -> Option<Identity>,
        history: impl FnOnce() -> Option<Identity>,
    ) -> (Identity, IdentitySource) {
        if let Some(identity) = &self.explicit {
            return (identity.clone(), IdentitySource::Explicit);
        }
        if let Some(identity) = &self.environment {
            return (identity.clone(), IdentitySource::Environment);
        }
        if let Some(identity) = repository() {
            return (identity, IdentitySource::Repository);
        }
        if let Some(identity) = history() {
            return (identity, IdentitySource::History);
        }
        (Identity::fallback(), IdentitySource::Default)
    }
}

/// Bounds applied to every external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub git: Duration,
    pub http: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            git: defaults::GIT_TIMEOUT,
            http: defaults::HTTP_TIMEOUT,
        }
    }
}

/// The parent repository a run keeps current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub host: String,
    pub owner: String,
    pub repo: String,
    /// Branch to update; `None` means the branch the working tree is on.
    pub branch: Option<String>,
}

impl RepoTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            host: "github.com".to_string(),
            owner: owner.into(),
            repo: repo.into(),
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// `owner/repo`, used in logs and lock names.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// HTTPS clone URL. It never carries a credential, so it is safe to log
    /// and to keep as the clone's `origin`.
    pub fn display_url(&self) -> String {
        format!("https://{}/{}/{}.git", self.host, self.owner, self.repo)
    }
}

/// Which upstream resolver implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// GitHub REST API.
    #[default]
    Github,
    /// `git ls-remote` against the submodule URL's host.
    Git,
}

/// Complete configuration for one reconciliation run.
#[derive(Clone)]
pub struct SyncConfig {
    pub target: RepoTarget,
    /// Token used for cloning, pushing and API calls. Never logged.
    pub credential: Option<String>,
    /// Local working tree to operate on; `None` provisions a scratch clone.
    pub repo_path: Option<PathBuf>,
    /// Manifest location relative to the working tree root.
    pub manifest_path: PathBuf,
    pub identity: IdentityConfig,
    pub timeouts: Timeouts,
    pub api_url: String,
    pub resolver: ResolverKind,
    pub skip_sync: bool,
    pub skip_push: bool,
    pub force_push: bool,
}

impl SyncConfig {
    pub fn new(target: RepoTarget) -> Self {
        Self {
            target,
            credential: None,
            repo_path: None,
            manifest_path: PathBuf::from(defaults::MANIFEST_FILE),
            identity: IdentityConfig::default(),
            timeouts: Timeouts::default(),
            api_url: defaults::GITHUB_API_URL.to_string(),
            resolver: ResolverKind::default(),
            skip_sync: false,
            skip_push: false,
            force_push: false,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("target", &self.target)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("repo_path", &self.repo_path)
            .field("manifest_path", &self.manifest_path)
            .field("identity", &self.identity)
            .field("timeouts", &self.timeouts)
            .field("api_url", &self.api_url)
            .field("resolver", &self.resolver)
            .field("skip_sync", &self.skip_sync)
            .field("skip_push", &self.skip_push)
            .field("force_push", &self.force_push)
            .finish()
    }
}

/// Timeouts section of the settings file, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSettings {
    pub git_seconds: Option<u64>,
    pub http_seconds: Option<u64>,
}

/// The `.submodule-sync.yaml` settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub repo_path: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub api_url: Option<String>,
    pub resolver: Option<ResolverKind>,
    pub skip_sync: Option<bool>,
    pub skip_push: Option<bool>,
    pub author: Option<Identity>,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

impl Settings {
    /// Applies the timeout section over the defaults.
    pub fn timeouts(&self) -> Result<Timeouts> {
        let mut timeouts = Timeouts::default();
        if let Some(seconds) = self.timeouts.git_seconds {
            timeouts.git = nonzero_seconds("timeouts.git_seconds", seconds)?;
        }
        if let Some(seconds) = self.timeouts.http_seconds {
            timeouts.http = nonzero_seconds("timeouts.http_seconds", seconds)?;
        }
        Ok(timeouts)
    }
}

fn nonzero_seconds(field: &str, seconds: u64) -> Result<Duration> {
    if seconds == 0 {
        return Err(Error::ConfigParse {
            message: format!("{} must be greater than zero", field),
            hint: Some("Remove the field to use the default timeout".to_string()),
        });
    }
    Ok(Duration::from_secs(seconds))
}

/// Parses settings from a YAML string. An empty document yields defaults.
pub fn parse(yaml_content: &str) -> Result<Settings> {
    if yaml_content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings = serde_yaml::from_str(yaml_content)?;
    settings.timeouts()?;
    Ok(settings)
}

/// Reads and parses a settings file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
