//! Commit message format for submodule updates.

const SHORT_COMMIT_LEN: usize = 7;

/// Abbreviates a commit id for the summary line.
pub fn short_commit(commit: &str) -> &str {
    commit.get(..SHORT_COMMIT_LEN).unwrap_or(commit)
}

/// Builds the commit message for moving `path` from `from` to `to`.
///
/// The body always carries the full, untruncated commit ids so downstream
/// tooling can parse them back out.
pub fn commit_message(path: &str, from: &str, to: &str) -> String {
    format!(
        "chore(submodules): update {path} to {short}\n\
         \n\
         Update submodule {path}\n\
         - From: {from}\n\
         - To: {to}",
        path = path,
        short = short_commit(to),
        from = from,
        to = to,
    )
}
