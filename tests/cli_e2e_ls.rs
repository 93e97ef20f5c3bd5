//! End-to-end tests for the `submodule-sync ls` command.
//!
//! These tests verify the CLI behavior of the `ls` command by invoking
//! the binary directly and checking its output.

mod common;
use common::prelude::*;

#[test]
fn test_ls_help() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("ls")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "List the submodules declared in a manifest",
        ));
}

#[test]
fn test_ls_missing_manifest() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("ls")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Manifest not found: .gitmodules"))
        .stderr(predicate::str::contains("hint: Use --manifest"));
}

#[test]
fn test_ls_table() {
    let fixture = TestFixture::new().with_gitmodules(manifests::TWO_SUBMODULES);

    let output = fixture.command().arg("ls").output().unwrap();
    assert!(output.status.success());

    insta::assert_snapshot!(String::from_utf8_lossy(&output.stdout), @r"
    vendor/lib  https://github.com/acme/lib.git  stable
    tools       git@github.com:acme/tools.git  (default)
    ");
}

#[test]
fn test_ls_empty_manifest() {
    let fixture = TestFixture::new().with_gitmodules(manifests::EMPTY);

    fixture
        .command()
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("No submodules declared"));
}

#[test]
fn test_ls_skips_malformed_entries() {
    let fixture = TestFixture::new().with_gitmodules(manifests::WITH_MALFORMED);

    fixture
        .command()
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"))
        .stdout(predicate::str::contains("broken").not());
}

#[test]
fn test_ls_count() {
    let fixture = TestFixture::new().with_gitmodules(manifests::TWO_SUBMODULES);

    fixture
        .command()
        .arg("ls")
        .arg("--count")
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_ls_json() {
    let fixture = TestFixture::new().with_gitmodules(manifests::TWO_SUBMODULES);

    let output = fixture
        .command()
        .arg("ls")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "vendor/lib");
    assert_eq!(entries[0]["branch"], "stable");
    assert_eq!(entries[1]["url"], "git@github.com:acme/tools.git");
    assert!(entries[1]["branch"].is_null());
}

#[test]
fn test_ls_custom_manifest_path() {
    let fixture = TestFixture::new().with_file("config/modules.ini", manifests::TWO_SUBMODULES);

    fixture
        .command()
        .arg("ls")
        .arg("--manifest")
        .arg("config/modules.ini")
        .arg("--count")
        .assert()
        .success()
        .stdout("2\n");
}
