//! End-to-end install, list, backup and uninstall against a settings file
//! that points every path into a temporary directory.
//!
//! `systemctl` and `nginx` are replaced by `true`, so nothing on the host
//! changes. Ports are still probed against the real kernel tables, hence the
//! explicit high port.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::cli_tests::jmakactl;

const PORT: &str = "58931";

struct Host {
    dir: TempDir,
    config: PathBuf,
}

impl Host {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["nginx/sites-enabled", "nginx/conf.d", "nginx/snippets", "systemd"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        let config = root.join("config.yaml");
        let yaml = format!(
            "install_root: {r}/opt\n\
             data_root: {r}/data\n\
             state_dir: {r}/state\n\
             backup_dir: {r}/backups\n\
             systemd_dir: {r}/systemd\n\
             require_root: false\n\
             systemctl: \"true\"\n\
             nginx:\n  \
               binary: \"true\"\n  \
               snippet_dir: {r}/nginx/snippets\n  \
               site_dirs: [{r}/nginx/sites-enabled, {r}/nginx/conf.d]\n  \
               sweep_roots: [{r}/nginx]\n",
            r = root.display()
        );
        std::fs::write(&config, yaml).unwrap();

        let bundle = root.join("bundle");
        std::fs::create_dir_all(bundle.join("wwwroot")).unwrap();
        std::fs::write(bundle.join("jmaka"), "#!/bin/sh\n").unwrap();
        std::fs::write(bundle.join("wwwroot/index.html"), "<h1/>").unwrap();

        Self { dir, config }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = jmakactl();
        cmd.arg("--config").arg(&self.config).arg("-y");
        cmd
    }

    fn install(&self, name: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["install", "--name", name, "--port", PORT, "--nginx-action", "none", "--bundle"])
            .arg(self.root().join("bundle"));
        cmd
    }

    fn list_json(&self) -> serde_json::Value {
        let output = self.cmd().args(["--json", "list"]).output().unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

#[test]
fn test_install_list_backup_uninstall_round() {
    let host = Host::new();

    host.install("Shop").assert().success();
    assert!(host.root().join("opt/shop/jmaka").is_file());
    assert!(host.root().join("data/shop").is_dir());
    let unit = std::fs::read_to_string(host.root().join("systemd/jmaka-shop.service")).unwrap();
    assert!(unit.contains(PORT));

    let listed = host.list_json();
    let records = listed.as_array().expect("array of instances");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], "shop");
    assert_eq!(records[0]["port"], 58931);
    assert_eq!(records[0]["nginx_action"], "none");

    let backups = host.root().join("out");
    host.cmd()
        .args(["backup", "--output-dir"])
        .arg(&backups)
        .assert()
        .success();
    assert!(std::fs::read_dir(&backups).unwrap().count() >= 1);

    host.cmd()
        .args(["uninstall", "--instance", "shop"])
        .assert()
        .success();
    assert!(!host.root().join("opt/shop").exists());
    assert!(!host.root().join("data/shop").exists());
    assert!(!host.root().join("systemd/jmaka-shop.service").exists());
    assert_eq!(host.list_json().as_array().map(Vec::len), Some(0));
}

#[test]
fn test_list_on_an_empty_host_is_an_empty_array() {
    let host = Host::new();
    assert_eq!(host.list_json(), serde_json::json!([]));
}

#[test]
fn test_sweep_without_token_is_refused_non_interactively() {
    let host = Host::new();
    host.install("shop").assert().success();

    host.cmd()
        .arg("uninstall")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--confirm DELETE"));
    assert!(host.root().join("opt/shop").exists());
}

#[test]
fn test_sweep_with_token_removes_everything() {
    let host = Host::new();
    host.install("shop").assert().success();

    host.cmd()
        .args(["uninstall", "--confirm", "DELETE"])
        .assert()
        .success();
    assert!(!host.root().join("opt/shop").exists());
    assert_eq!(host.list_json(), serde_json::json!([]));
}

#[test]
fn test_install_rejects_privileged_port() {
    let host = Host::new();
    host.cmd()
        .args(["install", "--name", "shop", "--port", "80", "--nginx-action", "none", "--bundle"])
        .arg(host.root().join("bundle"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1024"));
    assert!(!host.root().join("opt/shop").exists());
}

#[test]
fn test_backup_with_nothing_installed_fails() {
    let host = Host::new();
    host.cmd().arg("backup").assert().failure();
}

#[test]
fn test_relative_path_in_settings_is_reported() {
    let host = Host::new();
    std::fs::write(&host.config, "data_root: data\n").unwrap();
    host.cmd()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("data_root"));
}
