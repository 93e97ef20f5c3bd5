//! # Git Process Plumbing
//!
//! Thin wrappers around the system `git` command. Using the binary rather
//! than a library means authentication works the way it does in a shell:
//! SSH keys and credential helpers are honoured. An access token is passed
//! per command as an HTTP header scoped to one host (see [`HostCredential`])
//! and never written into a remote URL or the repository config.
//!
//! Every invocation is bounded by a timeout. A process that outlives it is
//! killed and reported as [`Error::Timeout`], so a hung fetch cannot wedge a
//! scheduled cycle.
//!
//! This is also the only place that reads `git`'s human-oriented output.
//! Push and pull results are turned into [`PushResult`] and [`PullResult`]
//! here; callers switch on those enums and never inspect stderr themselves.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use log::debug;
use regex::Regex;

use crate::error::{Error, PushFailureKind, Result};

/// Git file mode of a submodule binding (a "gitlink").
pub const GITLINK_MODE: &str = "160000";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured output of a finished git process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// What happened to a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Pushed,
    Rejected {
        kind: PushFailureKind,
        message: String,
    },
}

/// What happened to a merge pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullResult {
    Merged,
    /// The merge stopped on conflicting submodule bindings only.
    SubmoduleConflict { paths: Vec<String> },
    /// Any other failure, including conflicts on regular files.
    Failed { message: String },
}

/// One entry of `git ls-files -u`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmergedEntry {
    pub mode: String,
    pub path: String,
}

/// An access token that is only ever sent to one HTTPS host.
///
/// Git receives it as `-c http.https://<host>/.extraHeader=...`, so it is
/// attached to requests for that host alone and does not outlive the
/// command.
#[derive(Clone, PartialEq, Eq)]
pub struct HostCredential {
    host: String,
    token: String,
}

impl HostCredential {
    /// `None` for an empty token.
    pub fn new(host: &str, token: &str) -> Option<Self> {
        if token.is_empty() || host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_ascii_lowercase(),
            token: token.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn applies_to(&self, host: &str) -> bool {
        self.host.eq_ignore_ascii_case(host)
    }

    /// The `-c` value carrying the token.
    pub fn config_value(&self) -> String {
        let basic = B64.encode(format!("x-access-token:{}", self.token));
        format!(
            "http.https://{}/.extraHeader=AUTHORIZATION: basic {}",
            self.host, basic
        )
    }
}

impl std::fmt::Debug for HostCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCredential")
            .field("host", &self.host)
            .field("token", &"***")
            .finish()
    }
}

/// Replaces `user:secret@` in URLs and authorization header values so
/// commands can be logged safely.
pub fn redact(text: &str) -> String {
    static CREDENTIALS: OnceLock<Regex> = OnceLock::new();
    static HEADERS: OnceLock<Regex> = OnceLock::new();
    let re = CREDENTIALS.get_or_init(|| {
        Regex::new(r"(?P<scheme>[a-zA-Z][a-zA-Z0-9+.-]*://)[^/@\s]+@").expect("valid regex")
    });
    let headers = HEADERS.get_or_init(|| {
        Regex::new(r"(?i)(?P<prefix>authorization:\s*(basic|bearer)\s+)\S+").expect("valid regex")
    });
    let text = re.replace_all(text, "${scheme}***@");
    headers.replace_all(&text, "${prefix}***").into_owned()
}

/// Runs `git <args>` in `dir`, waiting at most `timeout`.
///
/// A non-zero exit is not an error here; inspect [`GitOutput::success`].
pub fn run(dir: &Path, args: &[&str], timeout: Duration) -> Result<GitOutput> {
    run_as(dir, None, args, timeout)
}

/// Like [`run`], sending `credential` to its host for this command only.
pub fn run_as(
    dir: &Path,
    credential: Option<&HostCredential>,
    args: &[&str],
    timeout: Duration,
) -> Result<GitOutput> {
    let header = credential.map(HostCredential::config_value);
    let mut full: Vec<&str> = Vec::with_capacity(args.len() + 2);
    if let Some(header) = &header {
        full.extend(["-c", header.as_str()]);
    }
    full.extend_from_slice(args);
    spawn(dir, &full, timeout)
}

fn spawn(dir: &Path, args: &[&str], timeout: Duration) -> Result<GitOutput> {
    let rendered = redact(&args.join(" "));
    debug!("git {} (in {})", rendered, dir.display());

    let mut child = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::GitCommand {
            command: rendered.clone(),
            dir: dir.to_path_buf(),
            stderr: e.to_string(),
        })?;

    // Drain both pipes on their own threads so a chatty process cannot block
    // on a full pipe while we wait for it.
    let stdout_reader = child.stdout.take().map(drain);
    let stderr_reader = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Timeout {
                operation: format!("git {}", rendered),
                seconds: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader.map(join_output).unwrap_or_default();
    let stderr = stderr_reader.map(join_output).unwrap_or_default();

    Ok(GitOutput {
        success: status.success(),
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = source.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn join_output(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Runs git and returns trimmed stdout, failing on a non-zero exit.
pub fn run_checked(dir: &Path, args: &[&str], timeout: Duration) -> Result<String> {
    run_checked_as(dir, None, args, timeout)
}

/// Like [`run_checked`], with a per-command credential.
pub fn run_checked_as(
    dir: &Path,
    credential: Option<&HostCredential>,
    args: &[&str],
    timeout: Duration,
) -> Result<String> {
    let output = run_as(dir, credential, args, timeout)?;
    if !output.success {
        return Err(Error::GitCommand {
            command: redact(&args.join(" ")),
            dir: dir.to_path_buf(),
            stderr: redact(output.stderr.trim()),
        });
    }
    Ok(output.stdout.trim().to_string())
}

/// Whether `dir` is the top level of a git working tree.
pub fn is_work_tree(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Clone a repository with submodules initialized, using a shallow clone.
///
/// `target_dir` must not exist or be empty. `url` should carry no
/// credentials: it becomes the clone's `origin`. On failure, whatever the
/// clone left behind inside `target_dir` is removed, but `target_dir` itself
/// is left to its owner.
pub fn clone_with_submodules(
    url: &str,
    branch: Option<&str>,
    target_dir: &Path,
    credential: Option<&HostCredential>,
    timeout: Duration,
) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let target = target_dir.to_string_lossy().into_owned();
    let mut args = vec![
        "clone",
        "--depth=1",
        "--recurse-submodules",
        "--shallow-submodules",
    ];
    if let Some(branch) = branch {
        args.extend(["--branch", branch]);
    }
    args.extend([url, target.as_str()]);

    let result = run_as(Path::new("."), credential, &args, timeout);

    let failure = match result {
        Ok(output) if output.success => return Ok(()),
        Ok(output) => clone_failure(url, branch, &output.stderr),
        Err(err) => Error::ProvisionFailed {
            url: redact(url),
            message: err.to_string(),
            hint: None,
        },
    };

    clear_directory(target_dir);
    Err(failure)
}

fn clone_failure(url: &str, branch: Option<&str>, stderr: &str) -> Error {
    let stderr = redact(stderr.trim());
    let hint = if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("could not read Username")
        || stderr.contains("Could not read from remote repository")
    {
        Some("Make sure the token has access to the repository (set GITHUB_TOKEN or --token)".to_string())
    } else if stderr.contains("Remote branch") && stderr.contains("not found") {
        Some(format!(
            "Branch '{}' does not exist on the remote",
            branch.unwrap_or_default()
        ))
    } else {
        None
    };

    Error::ProvisionFailed {
        url: redact(url),
        message: stderr,
        hint,
    }
}

fn clear_directory(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = removed {
            debug!("could not remove {}: {}", path.display(), e);
        }
    }
}

/// Pushes `branch` to `origin`.
pub fn push(
    dir: &Path,
    branch: &str,
    force: bool,
    credential: Option<&HostCredential>,
    timeout: Duration,
) -> Result<PushResult> {
    let mut args = vec!["push", "--porcelain"];
    if force {
        args.push("--force");
    }
    args.extend(["origin", branch]);

    let output = run_as(dir, credential, &args, timeout)?;
    let rejected_line = output.stdout.lines().any(|line| line.starts_with('!'));
    if output.success && !rejected_line {
        return Ok(PushResult::Pushed);
    }

    Ok(PushResult::Rejected {
        kind: classify_push_failure(&output.stdout, &output.stderr),
        message: redact(rejection_message(&output).trim()),
    })
}

fn rejection_message(output: &GitOutput) -> String {
    let status_lines: Vec<&str> = output
        .stdout
        .lines()
        .filter(|line| line.starts_with('!'))
        .collect();
    if !output.stderr.trim().is_empty() {
        output.stderr.clone()
    } else {
        status_lines.join("\n")
    }
}

/// Classifies a failed push from its porcelain status lines and stderr.
///
/// Porcelain status lines (`!<tab>src:dst<tab>[rejected] (fetch first)`) are
/// consulted first; stderr text is the fallback for failures that happen
/// before any ref is negotiated (authentication, missing repository).
pub fn classify_push_failure(stdout: &str, stderr: &str) -> PushFailureKind {
    let stderr = stderr.to_lowercase();

    for line in stdout.lines() {
        let Some(status) = line.strip_prefix('!') else {
            continue;
        };
        let status = status.to_lowercase();
        if status.contains("protected branch") || stderr.contains("gh006") {
            return PushFailureKind::ProtectedBranch;
        }
        if status.contains("[rejected]")
            && (status.contains("fetch first") || status.contains("non-fast-forward"))
        {
            return PushFailureKind::RemoteAhead;
        }
        if status.contains("[remote rejected]") {
            return classify_stderr(&stderr).unwrap_or(PushFailureKind::Other);
        }
    }

    classify_stderr(&stderr).unwrap_or(PushFailureKind::Other)
}

fn classify_stderr(stderr: &str) -> Option<PushFailureKind> {
    if stderr.contains("protected branch") || stderr.contains("gh006") {
        return Some(PushFailureKind::ProtectedBranch);
    }
    if stderr.contains("permission denied")
        || (stderr.contains("permission to") && stderr.contains("denied"))
        || stderr.contains("403")
        || stderr.contains("authentication failed")
        || stderr.contains("could not read username")
    {
        return Some(PushFailureKind::PermissionDenied);
    }
    if stderr.contains("repository not found")
        || stderr.contains("does not appear to be a git repository")
    {
        return Some(PushFailureKind::RepositoryNotFound);
    }
    if stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
        || stderr.contains("rejected")
    {
        return Some(PushFailureKind::RemoteAhead);
    }
    None
}

/// Merge-pulls `origin/<branch>` into the current branch.
pub fn pull(
    dir: &Path,
    branch: &str,
    credential: Option<&HostCredential>,
    timeout: Duration,
) -> Result<PullResult> {
    let output = run_as(
        dir,
        credential,
        &["pull", "--no-rebase", "--no-edit", "origin", branch],
        timeout,
    )?;
    if output.success {
        return Ok(PullResult::Merged);
    }

    let unmerged = parse_unmerged(&run(dir, &["ls-files", "-u"], timeout)?.stdout);
    let combined = format!("{}\n{}", output.stdout, output.stderr);
    Ok(classify_pull_failure(&unmerged, &combined))
}

/// Decides whether a failed pull stopped on submodule bindings only.
pub fn classify_pull_failure(unmerged: &[UnmergedEntry], output: &str) -> PullResult {
    if !unmerged.is_empty() {
        if unmerged.iter().all(|entry| entry.mode == GITLINK_MODE) {
            let mut paths: Vec<String> = unmerged.iter().map(|e| e.path.clone()).collect();
            paths.dedup();
            return PullResult::SubmoduleConflict { paths };
        }
    } else if output.contains("CONFLICT (submodule)") || output.contains("Failed to merge submodule")
    {
        return PullResult::SubmoduleConflict { paths: Vec::new() };
    }

    PullResult::Failed {
        message: redact(output.trim()),
    }
}

/// Parses `git ls-files -u` output. Each path appears once per stage.
pub fn parse_unmerged(output: &str) -> Vec<UnmergedEntry> {
    output
        .lines()
        .filter_map(|line| {
            let (meta, path) = line.split_once('\t')?;
            let mode = meta.split_whitespace().next()?;
            Some(UnmergedEntry {
                mode: mode.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}

/// Extracts the commit of a gitlink from `git ls-tree HEAD -- <path>`.
pub fn parse_gitlink(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (meta, _path) = line.split_once('\t')?;
        let mut parts = meta.split_whitespace();
        let mode = parts.next()?;
        let kind = parts.next()?;
        let sha = parts.next()?;
        (mode == GITLINK_MODE && kind == "commit").then(|| sha.to_string())
    })
}

/// Extracts the branch HEAD points at from `git ls-remote --symref <url> HEAD`.
pub fn parse_symref_head(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.strip_prefix("ref: ")?;
        let (reference, name) = rest.split_once('\t')?;
        if name.trim() != "HEAD" {
            return None;
        }
        reference
            .strip_prefix("refs/heads/")
            .map(|branch| branch.to_string())
    })
}

/// Extracts the tip of `refs/heads/<branch>` from `git ls-remote` output.
pub fn parse_branch_tip(output: &str, branch: &str) -> Option<String> {
    let wanted = format!("refs/heads/{}", branch);
    output.lines().find_map(|line| {
        let (sha, reference) = line.split_once('\t')?;
        (reference.trim() == wanted).then(|| sha.trim().to_string())
    })
}
