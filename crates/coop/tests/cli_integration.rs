//! CLI integration tests for the Coop command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Argument parsing works as expected
//! - Contexts and tokens persist under `COOP_CONFIG_DIR`
//!
//! Note: These tests do not require a running server.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the coop binary with an isolated config directory.
fn coop(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("coop").unwrap();
    cmd.env("COOP_CONFIG_DIR", config_dir.path())
        .env_remove("COOP_CONTEXT")
        .env_remove("COOP_SERVER_URL")
        .env_remove("COOP_ACCESS_TOKEN")
        .env_remove("COOP_REFRESH_TOKEN");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("farm management API"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("coop"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("post"))
        .stdout(predicate::str::contains("put"))
        .stdout(predicate::str::contains("patch"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("context"));
}

#[test]
fn test_upload_help_shows_options() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .args(["upload", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--field"))
        .stdout(predicate::str::contains("--mime"))
        .stdout(predicate::str::contains("--timeout-ms"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Validation Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    coop(&dir).arg("frobnicate").assert().failure();
}

#[test]
fn test_get_requires_path() {
    let dir = TempDir::new().unwrap();
    coop(&dir).arg("get").assert().failure();
}

#[test]
fn test_login_requires_both_tokens() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .args(["auth", "login", "--access-token", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--refresh-token"));
}

#[test]
fn test_post_rejects_invalid_json() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .args(["--server", "http://127.0.0.1:1", "post", "flocks", "--data", "{nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("valid JSON"));
}

#[test]
fn test_request_without_context_fails() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .args(["get", "flocks"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("context"));
}

#[test]
fn test_unreachable_server_reports_normalized_error() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .args(["--json", "--server", "http://127.0.0.1:1", "get", "flocks"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"success\":false"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Context Management Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_context_lifecycle() {
    let dir = TempDir::new().unwrap();

    coop(&dir)
        .args(["context", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No contexts configured"));

    coop(&dir)
        .args(["context", "set", "farm", "--url", "https://api.example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created"))
        .stdout(predicate::str::contains("set as current"));

    coop(&dir)
        .args(["context", "set", "vet", "--url", "https://vet.example.com", "--timeout-ms", "5000"])
        .assert()
        .success();

    assert!(dir.path().join("client.yaml").exists());

    coop(&dir)
        .args(["context", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("farm"));

    coop(&dir)
        .args(["context", "use", "vet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to context \"vet\""));

    coop(&dir)
        .args(["--json", "context", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"vet\""))
        .stdout(predicate::str::contains("\"current\":true"));

    coop(&dir)
        .args(["context", "remove", "vet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No current context"));

    coop(&dir)
        .args(["context", "use", "vet"])
        .assert()
        .failure();
}

#[test]
fn test_context_set_validates() {
    let dir = TempDir::new().unwrap();

    coop(&dir)
        .args(["context", "set", "farm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url is required"));

    coop(&dir)
        .args(["context", "set", "farm", "--url", "https://api.example.com", "--token-store", "vault"])
        .assert()
        .failure();

    assert!(!dir.path().join("client.yaml").exists());
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_login_status_logout() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .args(["context", "set", "farm", "--url", "https://api.example.com"])
        .assert()
        .success();

    coop(&dir)
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"loggedIn\":false"));

    coop(&dir)
        .args(["auth", "login", "--access-token", "at-1", "--refresh-token", "rt-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tokens stored"));

    let token_file = dir.path().join("tokens").join("farm.json");
    assert!(token_file.exists());
    let contents = std::fs::read_to_string(&token_file).unwrap();
    assert!(contents.contains("at-1"));

    coop(&dir)
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"loggedIn\":true"))
        .stdout(predicate::str::contains("\"context\":\"farm\""));

    coop(&dir)
        .args(["auth", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));

    assert!(!token_file.exists());

    coop(&dir)
        .args(["auth", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored tokens"));
}

#[test]
fn test_server_flag_without_config_uses_default_context() {
    let dir = TempDir::new().unwrap();
    coop(&dir)
        .args([
            "--server",
            "http://localhost:3000",
            "auth",
            "login",
            "--access-token",
            "at",
            "--refresh-token",
            "rt",
        ])
        .assert()
        .success();

    assert!(dir.path().join("tokens").join("default.json").exists());
}
