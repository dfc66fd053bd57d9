//! Backup archives and restore, end to end through a sandboxed host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;

use jmaka_cli::application::ports::{InsertOutcome, InstanceRegistry};
use jmaka_cli::application::services::backup::{BackupReport, create_backup};
use jmaka_cli::application::services::install::{InstallRequest, install};
use jmaka_cli::application::services::restore::restore;
use jmaka_cli::application::services::uninstall::{UninstallScope, uninstall};
use jmaka_cli::domain::backup::{archive_file_name, checksum_path, stamp};
use jmaka_cli::domain::error::{BackupError, InstanceError};
use jmaka_common::{InstanceSlug, MountMode, NginxAction, include_directive};

use crate::helpers::{
    CollectingReporter, FixedChooser, RecordingRunner, Sandbox, read, tls_vhost,
};

const DOMAIN: &str = "shop.example.com";

fn shop() -> InstanceSlug {
    InstanceSlug::normalize("shop").unwrap()
}

/// Install `shop` attached to its vhost, put a file in its storage, back it
/// up, then uninstall it.
async fn backed_up_then_removed(sb: &Sandbox) -> (BackupReport, PathBuf) {
    let site = sb.nginx_file("sites-enabled/shop.conf", &tls_vhost(DOMAIN));
    let req = InstallRequest {
        name: "shop".to_string(),
        port: Some(5100),
        bundle: sb.bundle_dir().display().to_string(),
        domain: Some(DOMAIN.to_string()),
        path_prefix: Some("/shop/".to_string()),
        mount_mode: MountMode::BasePath,
        nginx_action: NginxAction::Auto,
    };
    let runner = RecordingRunner::new();
    let reporter = CollectingReporter::default();
    install(&sb.host, &runner, &reporter, &FixedChooser::default(), &sb.settings, &req)
        .await
        .unwrap();
    std::fs::write(sb.settings.data_dir(&shop()).join("db.json"), b"{\"n\":1}").unwrap();

    let report = create_backup(&sb.host, &sb.settings, None, "test").unwrap();

    uninstall(
        &sb.host,
        &runner,
        &reporter,
        &sb.settings,
        &UninstallScope::Instance(shop()),
        false,
    )
    .await
    .unwrap();
    (report, site)
}

#[tokio::test]
async fn backups_within_one_second_get_distinct_archives() {
    let sb = Sandbox::new();
    let req = InstallRequest {
        name: "shop".to_string(),
        port: Some(5100),
        bundle: sb.bundle_dir().display().to_string(),
        domain: None,
        path_prefix: None,
        mount_mode: MountMode::StripPrefix,
        nginx_action: NginxAction::None,
    };
    install(
        &sb.host,
        &RecordingRunner::new(),
        &CollectingReporter::default(),
        &FixedChooser::default(),
        &sb.settings,
        &req,
    )
    .await
    .unwrap();

    // Occupy the names for this second and the next so the run collides.
    std::fs::create_dir_all(&sb.settings.backup_dir).unwrap();
    let now = chrono::Local::now();
    let taken: Vec<PathBuf> = [now, now + chrono::Duration::seconds(1)]
        .iter()
        .map(|t| sb.settings.backup_dir.join(archive_file_name(&stamp(*t), 0)))
        .collect();
    for path in &taken {
        std::fs::write(path, b"earlier archive").unwrap();
    }

    let first = create_backup(&sb.host, &sb.settings, None, "test").unwrap();
    let second = create_backup(&sb.host, &sb.settings, None, "test").unwrap();

    assert!(!taken.contains(&first.archive));
    assert_ne!(first.archive, second.archive);
    for path in &taken {
        assert_eq!(std::fs::read(path).unwrap(), b"earlier archive");
    }
    for report in [&first, &second] {
        let name = report.archive.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(".tar.gz"), "{name}");
        assert!(report.archive.is_file());
        assert!(read(&checksum_path(&report.archive)).starts_with(&report.checksum));
    }
}

#[test]
fn backup_with_nothing_installed_fails() {
    let sb = Sandbox::new();
    let err = create_backup(&sb.host, &sb.settings, None, "test").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InstanceError>(),
        Some(InstanceError::NoneInstalled)
    ));
}

#[tokio::test]
async fn backup_writes_archive_and_checksum_sidecar() {
    let sb = Sandbox::new();
    let (report, _) = backed_up_then_removed(&sb).await;

    assert!(report.archive.starts_with(&sb.settings.backup_dir));
    assert!(report.archive.is_file());
    assert_eq!(report.instances, vec![shop()]);

    let sidecar = read(&checksum_path(&report.archive));
    let name = report.archive.file_name().unwrap().to_string_lossy();
    assert_eq!(sidecar, format!("{}  {name}\n", report.checksum));
}

#[tokio::test]
async fn restore_brings_everything_back() {
    let sb = Sandbox::new();
    let (report, site) = backed_up_then_removed(&sb).await;
    assert!(!sb.settings.instance_dir(&shop()).exists());

    let host = sb.next_run();
    let runner = RecordingRunner::new();
    let reporter = CollectingReporter::default();
    let restored = restore(
        &host,
        &runner,
        &reporter,
        &FixedChooser::default(),
        &sb.settings,
        &report.archive,
    )
    .await
    .unwrap();

    assert!(restored.verified);
    assert_eq!(restored.instances, vec![shop()]);
    assert_eq!(restored.attached.len(), 1);
    assert_eq!(restored.attached[0].outcome, InsertOutcome::Inserted { blocks: 1 });

    assert!(sb.settings.instance_dir(&shop()).join("jmaka").is_file());
    assert_eq!(
        read(&sb.settings.data_dir(&shop()).join("db.json")),
        "{\"n\":1}"
    );
    assert!(sb.settings.unit_path(&shop()).is_file());
    assert!(sb.settings.snippet_path(&shop()).is_file());
    let directive = include_directive(&sb.settings.snippet_path(&shop()));
    assert!(read(&site).contains(&directive));

    let record = host.load(&shop()).unwrap().unwrap();
    assert_eq!(record.instance.port, 5100);
    assert_eq!(record.vhost_path.as_deref(), Some(site.as_path()));

    let calls = runner.calls();
    assert_eq!(
        calls,
        vec![
            "systemctl daemon-reload",
            "systemctl restart jmaka-shop.service",
            "nginx -t",
            "systemctl reload nginx",
        ]
    );
    assert!(!sb.settings.state_dir.join("restore.staging").exists());
}

#[tokio::test]
async fn tampered_archive_is_refused() {
    let sb = Sandbox::new();
    let (report, _) = backed_up_then_removed(&sb).await;
    std::fs::write(
        checksum_path(&report.archive),
        format!("{}  x.tar.gz\n", "0".repeat(64)),
    )
    .unwrap();

    let err = restore(
        &sb.host,
        &RecordingRunner::new(),
        &CollectingReporter::default(),
        &FixedChooser::default(),
        &sb.settings,
        &report.archive,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BackupError>(),
        Some(BackupError::ChecksumMismatch { .. })
    ));
    assert!(sb.host.list().unwrap().is_empty());
    assert!(!sb.settings.instance_dir(&shop()).exists());
}

#[tokio::test]
async fn missing_sidecar_restores_with_a_warning() {
    let sb = Sandbox::new();
    let (report, _) = backed_up_then_removed(&sb).await;
    std::fs::remove_file(checksum_path(&report.archive)).unwrap();

    let reporter = CollectingReporter::default();
    let restored = restore(
        &sb.host,
        &RecordingRunner::new(),
        &reporter,
        &FixedChooser::default(),
        &sb.settings,
        &report.archive,
    )
    .await
    .unwrap();
    assert!(!restored.verified);
    assert_eq!(reporter.warnings().len(), 1);
    assert!(sb.settings.instance_dir(&shop()).is_dir());
}

#[tokio::test]
async fn missing_archive_is_not_found() {
    let sb = Sandbox::new();
    let err = restore(
        &sb.host,
        &RecordingRunner::new(),
        &CollectingReporter::default(),
        &FixedChooser::default(),
        &sb.settings,
        &sb.root().join("nope.tar.gz"),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BackupError>(),
        Some(BackupError::NotFound(_))
    ));
}
