//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, helper functions, and macros
//! to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_gitmodules(manifests::TWO_SUBMODULES);
//!     fixture.command().arg("ls").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    pub use super::TestFixture;
}

/// Environment variables the CLI reads; cleared so the host cannot leak in.
const CLI_ENV: &[&str] = &[
    "SUBMODULE_SYNC_OWNER",
    "SUBMODULE_SYNC_REPO",
    "SUBMODULE_SYNC_BRANCH",
    "SUBMODULE_SYNC_SETTINGS",
    "SUBMODULE_SYNC_LOCK_DIR",
    "GITHUB_TOKEN",
    "GITHUB_API_URL",
    "RUST_LOG",
];

/// Common `.gitmodules` snippets for testing.
#[allow(dead_code)]
pub mod manifests {
    /// Two submodules, one tracking an explicit branch.
    pub const TWO_SUBMODULES: &str = r#"[submodule "vendor/lib"]
	path = vendor/lib
	url = https://github.com/acme/lib.git
	branch = stable
[submodule "tools"]
	path = tools
	url = git@github.com:acme/tools.git
"#;

    /// One well-formed entry and one missing its url.
    pub const WITH_MALFORMED: &str = r#"[submodule "broken"]
	path = broken
[submodule "ok"]
	path = ok
	url = https://github.com/acme/ok.git
"#;

    /// A manifest without entries.
    pub const EMPTY: &str = "# no submodules yet\n";
}

/// A test fixture that provides a temporary directory with optional
/// manifest, settings and working tree marker.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `.gitmodules` file with the given content.
    pub fn with_gitmodules(self, content: &str) -> Self {
        self.with_file(".gitmodules", content)
    }

    /// Add a `.submodule-sync.yaml` settings file with the given content.
    #[allow(dead_code)]
    pub fn with_settings(self, content: &str) -> Self {
        self.with_file(".submodule-sync.yaml", content)
    }

    /// Mark the directory as a git working tree.
    #[allow(dead_code)]
    pub fn with_work_tree(self) -> Self {
        self.temp_dir
            .child(".git")
            .create_dir_all()
            .expect("Failed to create .git directory");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("submodule-sync");
        cmd.current_dir(self.path());
        for var in CLI_ENV {
            cmd.env_remove(var);
        }
        cmd.env("NO_COLOR", "1");
        cmd
    }

    /// Create a `sync` command for `acme/widgets` with its lock directory
    /// inside the fixture.
    #[allow(dead_code)]
    pub fn sync_command(&self) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg("sync")
            .arg("--owner")
            .arg("acme")
            .arg("--repo")
            .arg("widgets")
            .arg("--lock-dir")
            .arg(self.path().join(".locks"));
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_gitmodules() {
        let fixture = TestFixture::new().with_gitmodules(manifests::EMPTY);
        assert!(fixture.path().join(".gitmodules").exists());
    }

    #[test]
    fn test_fixture_with_work_tree() {
        let fixture = TestFixture::new().with_work_tree();
        assert!(fixture.path().join(".git").is_dir());
    }

    #[test]
    fn test_manifests_parse() {
        let entries = submodule_sync::manifest::parse(manifests::TWO_SUBMODULES).unwrap();
        assert_eq!(entries.len(), 2);
        let entries = submodule_sync::manifest::parse(manifests::WITH_MALFORMED).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
