//! Instance registry persistence and settings file resolution.

#![allow(clippy::expect_used, clippy::unwrap_used, unsafe_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use chrono::Utc;
use jmaka_cli::application::ports::InstanceRegistry;
use jmaka_cli::domain::error::ConfigError;
use jmaka_cli::infra::config::{CONFIG_ENV, YamlConfigStore};
use jmaka_common::{InstanceRecord, InstanceSlug, ManagedInstance, MountMode, NginxAction, PathPrefix};
use serial_test::serial;

use crate::helpers::Sandbox;

fn record(sb: &Sandbox, name: &str, port: u16) -> InstanceRecord {
    let slug = InstanceSlug::normalize(name).unwrap();
    InstanceRecord {
        instance: ManagedInstance::new(
            slug.clone(),
            port,
            sb.settings.instance_dir(&slug),
            PathPrefix::normalize("/app/").unwrap(),
            MountMode::StripPrefix,
        )
        .unwrap(),
        data_directory: sb.settings.data_dir(&slug),
        domain: Some("app.example.com".to_string()),
        nginx_action: NginxAction::Auto,
        vhost_path: None,
        installed_at: Utc::now(),
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[test]
fn registry_round_trips_and_lists_sorted() {
    let sb = Sandbox::new();
    sb.host.save(&record(&sb, "zeta", 5011)).unwrap();
    sb.host.save(&record(&sb, "alpha", 5010)).unwrap();

    let loaded = sb
        .host
        .load(&InstanceSlug::normalize("alpha").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(loaded.instance.port, 5010);
    assert_eq!(loaded.instance.mount_mode, MountMode::StripPrefix);

    let names: Vec<String> = sb
        .host
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.instance.name.to_string())
        .collect();
    assert_eq!(names, ["alpha", "zeta"]);
}

#[test]
fn registry_files_are_private() {
    let sb = Sandbox::new();
    sb.host.save(&record(&sb, "alpha", 5010)).unwrap();
    let path = sb.settings.registry_dir().join("alpha.json");
    let mode = std::fs::metadata(path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
fn registry_ignores_foreign_files() {
    let sb = Sandbox::new();
    sb.host.save(&record(&sb, "alpha", 5010)).unwrap();
    let dir = sb.settings.registry_dir();
    std::fs::write(dir.join("README"), "x").unwrap();
    std::fs::write(dir.join("Not A Slug.json"), "{}").unwrap();

    assert_eq!(sb.host.list().unwrap().len(), 1);
}

#[test]
fn registry_remove_reports_presence() {
    let sb = Sandbox::new();
    let slug = InstanceSlug::normalize("alpha").unwrap();
    sb.host.save(&record(&sb, "alpha", 5010)).unwrap();

    assert!(sb.host.remove(&slug).unwrap());
    assert!(!sb.host.remove(&slug).unwrap());
    assert!(sb.host.load(&slug).unwrap().is_none());
}

#[test]
fn empty_registry_lists_nothing() {
    let sb = Sandbox::new();
    assert!(sb.host.list().unwrap().is_empty());
}

// ── Settings ─────────────────────────────────────────────────────────────────

fn write_config(dir: &std::path::Path, yaml: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn partial_settings_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "install_root: /srv/jmaka\nnginx:\n  client_max_body_size: 512m\n",
    );

    let settings = YamlConfigStore::new(Some(path)).load().unwrap();
    assert_eq!(settings.install_root, PathBuf::from("/srv/jmaka"));
    assert_eq!(settings.nginx.client_max_body_size, "512m");
    assert_eq!(settings.nginx.binary, "nginx");
    assert_eq!(settings.preferred_port, 5010);
    assert!(settings.require_root);
}

#[test]
fn relative_paths_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "data_root: var/lib/jmaka\n");

    let err = YamlConfigStore::new(Some(path)).load().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::RelativePath { .. })
    ));
}

#[test]
fn malformed_yaml_is_reported_with_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "install_root: [unclosed\n");

    let err = YamlConfigStore::new(Some(path.clone())).load().unwrap_err();
    assert!(format!("{err:#}").contains(&path.display().to_string()));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = YamlConfigStore::new(Some(dir.path().join("absent.yaml")))
        .load()
        .unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}

#[test]
#[serial]
fn environment_names_the_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "preferred_port: 7000\n");

    // SAFETY: env mutation is serialized by #[serial]
    unsafe { std::env::set_var(CONFIG_ENV, &path) };
    let store = YamlConfigStore::new(None);
    let resolved = store.path();
    let loaded = store.load();
    unsafe { std::env::remove_var(CONFIG_ENV) };

    assert_eq!(resolved, Some(path));
    assert_eq!(loaded.unwrap().preferred_port, 7000);
}

#[test]
#[serial]
fn flag_wins_over_environment() {
    let dir = tempfile::tempdir().unwrap();
    let flagged = write_config(dir.path(), "preferred_port: 7001\n");

    // SAFETY: env mutation is serialized by #[serial]
    unsafe { std::env::set_var(CONFIG_ENV, "/nonexistent/config.yaml") };
    let loaded = YamlConfigStore::new(Some(flagged)).load();
    unsafe { std::env::remove_var(CONFIG_ENV) };

    assert_eq!(loaded.unwrap().preferred_port, 7001);
}
