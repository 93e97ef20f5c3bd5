//! # Upstream Commit Resolution
//!
//! Answers two questions about a submodule's remote: what is its default
//! branch, and what commit is at the tip of a given branch.
//!
//! Submodule URLs come in several shapes (`https://host/owner/repo.git`,
//! `ssh://git@host/owner/repo`, `git@host:owner/repo.git`). [`RemoteSlug`]
//! normalizes them; URLs that do not name an owner and repository (relative
//! URLs, `file://` paths) yield `None` and the submodule is left alone.
//!
//! Two resolvers are provided:
//!
//! - [`GitHubResolver`] talks to the GitHub REST API (or a GitHub Enterprise
//!   API root). Submodules hosted elsewhere are answered by `git ls-remote`
//!   without the API token.
//! - [`LsRemoteResolver`] runs `git ls-remote` and works against any host the
//!   local git can reach.
//!
//! A token is only ever sent to the host it was issued for.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use log::debug;

use crate::defaults;
use crate::error::{Error, Result};
use crate::git::{self, HostCredential};

/// Host, owner and repository name parsed from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteSlug {
    pub host: String,
    /// Owner; nested groups are joined with `/`.
    pub owner: String,
    pub repo: String,
}

impl RemoteSlug {
    /// Parses a submodule URL. Returns `None` for URLs without owner/repo.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        if !url.contains("://") {
            return Self::parse_scp_like(url);
        }

        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "https" | "http" | "ssh" | "git") {
            return None;
        }
        let host = parsed.host_str()?.to_string();
        Self::from_path(host, parsed.path())
    }

    fn parse_scp_like(url: &str) -> Option<Self> {
        let (user_host, path) = url.split_once(':')?;
        if user_host.contains('/') || path.starts_with("//") {
            return None;
        }
        let host = user_host.rsplit('@').next()?.trim();
        if host.is_empty() {
            return None;
        }
        Self::from_path(host.to_string(), path)
    }

    fn from_path(host: String, path: &str) -> Option<Self> {
        let trimmed = path.trim_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        let (owner, repo) = trimmed.rsplit_once('/')?;
        if owner.is_empty() || repo.is_empty() || owner.split('/').any(str::is_empty) {
            return None;
        }
        Some(Self {
            host,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// HTTPS URL of the repository.
    pub fn https_url(&self) -> String {
        format!("https://{}/{}/{}.git", self.host, self.owner, self.repo)
    }
}

impl fmt::Display for RemoteSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Looks up branch tips and default branches of submodule remotes.
pub trait RemoteCommitResolver: Send + Sync {
    /// The commit at the tip of `branch`.
    fn latest_commit(&self, slug: &RemoteSlug, branch: &str) -> Result<String>;

    /// The repository's default branch.
    fn default_branch(&self, slug: &RemoteSlug) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: CommitResponse,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

/// Resolver backed by the GitHub REST API.
///
/// Only repositories on the host the API belongs to are looked up there;
/// anything else goes to an uncredentialed [`LsRemoteResolver`].
pub struct GitHubResolver {
    api_url: Url,
    /// Git host served by `api_url`.
    host: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
    elsewhere: LsRemoteResolver,
}

impl GitHubResolver {
    pub fn new(api_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("submodule-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let api_url = Url::parse(api_url)?;
        Ok(Self {
            host: served_host(&api_url),
            api_url,
            token: token.filter(|t| !t.is_empty()),
            client,
            elsewhere: LsRemoteResolver::new(None, defaults::GIT_TIMEOUT),
        })
    }

    /// Resolver for submodules on other hosts.
    pub fn with_fallback(mut self, resolver: LsRemoteResolver) -> Self {
        self.elsewhere = resolver;
        self
    }

    /// Whether `slug` lives on the host this API answers for.
    pub fn serves(&self, slug: &RemoteSlug) -> bool {
        slug.host.eq_ignore_ascii_case(&self.host)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::ConfigParse {
                message: format!("API URL cannot be a base: {}", self.api_url),
                hint: Some("Use an http(s) URL such as https://api.github.com".to_string()),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, slug: &RemoteSlug, url: Url) -> Result<T> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let lookup_failed = |message: String| Error::RemoteLookupFailed {
            slug: slug.to_string(),
            message,
        };

        let response = request.send().map_err(|e| lookup_failed(e.to_string()))?;
        match response.status() {
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(lookup_failed(
                    "unauthorized (token invalid or expired)".to_string(),
                ))
            }
            reqwest::StatusCode::FORBIDDEN => {
                return Err(lookup_failed(
                    "forbidden (rate limited or insufficient permissions)".to_string(),
                ))
            }
            reqwest::StatusCode::NOT_FOUND => {
                return Err(lookup_failed("not found".to_string()))
            }
            _ => {}
        }

        response
            .error_for_status()
            .map_err(|e| lookup_failed(e.to_string()))?
            .json::<T>()
            .map_err(|e| lookup_failed(format!("unexpected response: {}", e)))
    }
}

/// `api.github.com` answers for `github.com`; an Enterprise root such as
/// `https://ghe.example.com/api/v3` answers for its own host.
fn served_host(api_url: &Url) -> String {
    let host = api_url.host_str().unwrap_or_default().to_ascii_lowercase();
    match host.strip_prefix("api.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    }
}

impl RemoteCommitResolver for GitHubResolver {
    fn latest_commit(&self, slug: &RemoteSlug, branch: &str) -> Result<String> {
        if !self.serves(slug) {
            debug!("{} is on {}, not {}; using ls-remote", slug, slug.host, self.host);
            return self.elsewhere.latest_commit(slug, branch);
        }
        let url = self.endpoint(&["repos", &slug.owner, &slug.repo, "branches", branch])?;
        let response: BranchResponse = self.get_json(slug, url)?;
        Ok(response.commit.sha)
    }

    fn default_branch(&self, slug: &RemoteSlug) -> Result<String> {
        if !self.serves(slug) {
            debug!("{} is on {}, not {}; using ls-remote", slug, slug.host, self.host);
            return self.elsewhere.default_branch(slug);
        }
        let url = self.endpoint(&["repos", &slug.owner, &slug.repo])?;
        let response: RepositoryResponse = self.get_json(slug, url)?;
        Ok(response.default_branch)
    }
}

/// Resolver that asks the remote directly with `git ls-remote`.
pub struct LsRemoteResolver {
    credential: Option<HostCredential>,
    timeout: Duration,
}

impl LsRemoteResolver {
    pub fn new(credential: Option<HostCredential>, timeout: Duration) -> Self {
        Self {
            credential,
            timeout,
        }
    }

    /// The credential to present to `slug`'s host, if it was issued for it.
    pub fn credential_for(&self, slug: &RemoteSlug) -> Option<&HostCredential> {
        self.credential
            .as_ref()
            .filter(|credential| credential.applies_to(&slug.host))
    }

    fn ls_remote(&self, slug: &RemoteSlug, flags: &[&str], pattern: &str) -> Result<String> {
        let url = slug.https_url();
        let mut args = vec!["ls-remote"];
        args.extend_from_slice(flags);
        args.extend([url.as_str(), pattern]);

        let credential = self.credential_for(slug);
        git::run_checked_as(&std::env::temp_dir(), credential, &args, self.timeout).map_err(|e| {
            Error::RemoteLookupFailed {
                slug: slug.to_string(),
                message: e.to_string(),
            }
        })
    }
}

impl RemoteCommitResolver for LsRemoteResolver {
    fn latest_commit(&self, slug: &RemoteSlug, branch: &str) -> Result<String> {
        let reference = format!("refs/heads/{}", branch);
        let output = self.ls_remote(slug, &[], &reference)?;
        git::parse_branch_tip(&output, branch).ok_or_else(|| Error::RemoteLookupFailed {
            slug: slug.to_string(),
            message: format!("branch '{}' not found", branch),
        })
    }

    fn default_branch(&self, slug: &RemoteSlug) -> Result<String> {
        let output = self.ls_remote(slug, &["--symref"], "HEAD")?;
        git::parse_symref_head(&output).ok_or_else(|| Error::RemoteLookupFailed {
            slug: slug.to_string(),
            message: "remote HEAD is not a branch".to_string(),
        })
    }
}
