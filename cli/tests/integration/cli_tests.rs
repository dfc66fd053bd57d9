//! Argument parsing, help output and commands that need no host state.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

pub fn jmakactl() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("jmakactl"));
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("JMAKACTL_CONFIG");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    jmakactl().assert().code(2).stderr(predicate::str::contains(
        "Install jmaka instances",
    ));
}

#[test]
fn test_cli_help_flag_lists_commands() {
    jmakactl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("uninstall"))
        .stdout(predicate::str::contains("backup"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("nginx"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    jmakactl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("jmakactl"));
}

#[test]
fn test_install_help_shows_nginx_actions() {
    jmakactl()
        .args(["install", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--nginx-action"))
        .stdout(predicate::str::contains("write-snippet"));
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    jmakactl().arg("deploy").assert().code(2);
}

// --- nginx snippet ---

#[test]
fn test_nginx_snippet_at_root_proxies_to_port() {
    jmakactl()
        .args(["nginx", "snippet", "--port", "5010"])
        .assert()
        .success()
        .stdout(predicate::str::contains("location / {"))
        .stdout(predicate::str::contains("proxy_pass http://127.0.0.1:5010;"));
}

#[test]
fn test_nginx_snippet_strip_prefix_uses_trailing_slash() {
    jmakactl()
        .args([
            "nginx",
            "snippet",
            "--port",
            "5011",
            "--path-prefix",
            "shop",
            "--mount-mode",
            "strip-prefix",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("location /shop/ {"))
        .stdout(predicate::str::contains("proxy_pass http://127.0.0.1:5011/;"));
}

#[test]
fn test_nginx_snippet_rejects_privileged_port() {
    jmakactl()
        .args(["nginx", "snippet", "--port", "80"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1024"));
}

#[test]
fn test_nginx_snippet_error_is_json_with_flag() {
    let output = jmakactl()
        .args(["--json", "nginx", "snippet", "--port", "70000"])
        .output()
        .expect("run jmakactl");
    assert!(!output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("error object on stdout");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "validation");
}
