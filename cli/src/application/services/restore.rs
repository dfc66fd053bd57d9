//! Application service: restore instances from a backup archive.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jmaka_common::{InstanceRecord, InstanceSlug, NginxAction, snippet_file_name, unit_name};

use crate::application::ports::{CommandRunner, Host, ProgressReporter, VhostChooser};
use crate::application::services::vhost::{self, Attachment};
use crate::application::services::{proxy, systemd};
use crate::domain::backup::{Section, checksum_path, parse_checksum};
use crate::domain::config::Settings;
use crate::domain::error::BackupError;

/// Result of a successful restore.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub instances: Vec<InstanceSlug>,
    pub attached: Vec<Attachment>,
    /// `false` when the archive had no checksum sidecar.
    pub verified: bool,
}

/// Restore every instance recorded in `archive`, replacing what exists.
///
/// # Errors
///
/// Returns a `BackupError` when the archive is missing, fails verification
/// or holds unsafe entries, and any failure of the restore steps.
pub async fn restore(
    host: &impl Host,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    chooser: &impl VhostChooser,
    settings: &Settings,
    archive: &Path,
) -> Result<RestoreReport> {
    if !host.exists(archive) {
        return Err(BackupError::NotFound(archive.to_path_buf()).into());
    }
    let verified = verify_checksum(host, archive)?;
    if !verified {
        reporter.warn("no checksum file next to the archive; integrity not verified");
    }

    let staging = settings.state_dir.join("restore.staging");
    host.remove_dir_all(&staging)?;
    host.create_dir_all(&staging)?;
    reporter.step(&format!("unpacking {}...", archive.display()));
    let manifest = host.unpack_archive(archive, &staging)?;

    let result = restore_from(host, runner, reporter, chooser, settings, &staging, manifest.instances).await;
    host.remove_dir_all(&staging)?;
    let (instances, attached) = result?;
    Ok(RestoreReport {
        instances,
        attached,
        verified,
    })
}

async fn restore_from(
    host: &impl Host,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    chooser: &impl VhostChooser,
    settings: &Settings,
    staging: &Path,
    records: Vec<InstanceRecord>,
) -> Result<(Vec<InstanceSlug>, Vec<Attachment>)> {
    let section = |s: Section| staging.join(s.dir_name());
    let mut restored = Vec::new();
    let mut units = Vec::new();
    let mut snippet_restored = false;

    for mut record in records {
        let slug = record.instance.name.clone();
        reporter.step(&format!("restoring {slug}..."));
        record.instance.base_directory = settings.instance_dir(&slug);
        record.data_directory = settings.data_dir(&slug);

        let app = section(Section::App).join(slug.as_str());
        if host.exists(&app) {
            host.replace(&app, &record.instance.base_directory)?;
        }
        let data = section(Section::Data).join(slug.as_str());
        if host.exists(&data) {
            host.replace(&data, &record.data_directory)?;
        } else {
            host.create_dir_all(&record.data_directory)?;
        }
        let unit = section(Section::Units).join(unit_name(&slug));
        if host.exists(&unit) {
            host.create_dir_all(&settings.systemd_dir)?;
            host.replace(&unit, &settings.unit_path(&slug))?;
            units.push(unit_name(&slug));
        }
        let snippet = section(Section::Snippets).join(snippet_file_name(&slug));
        if host.exists(&snippet) {
            host.create_dir_all(&settings.nginx.snippet_dir)?;
            host.replace(&snippet, &settings.snippet_path(&slug))?;
            snippet_restored = true;
        }
        record.vhost_path = None;
        host.save(&record)?;
        restored.push(record);
    }

    if !units.is_empty() {
        systemd::daemon_reload(runner, settings).await?;
        for unit in &units {
            reporter.step(&format!("restarting {unit}..."));
            systemd::restart(runner, settings, unit).await?;
        }
    }

    let mut attached = Vec::new();
    for record in &mut restored {
        let (NginxAction::Auto, Some(domain)) = (record.nginx_action, record.domain.clone()) else {
            continue;
        };
        let attachment = vhost::attach(host, chooser, settings, &record.instance.name, &domain)
            .with_context(|| format!("re-attaching {} to {domain}", record.instance.name))?;
        record.vhost_path = Some(attachment.path.clone());
        host.save(record)?;
        attached.push(attachment);
    }

    if snippet_restored {
        proxy::check_and_reload(runner, settings, reporter).await?;
    }

    let slugs = restored.into_iter().map(|r| r.instance.name).collect();
    Ok((slugs, attached))
}

/// Check the `.sha256` sidecar when present; `Ok(false)` when absent.
fn verify_checksum(host: &impl Host, archive: &Path) -> Result<bool> {
    let sidecar: PathBuf = checksum_path(archive);
    if !host.exists(&sidecar) {
        return Ok(false);
    }
    let content = host.read_to_string(&sidecar)?;
    let expected = parse_checksum(&content)
        .with_context(|| format!("malformed checksum file {}", sidecar.display()))?;
    let actual = host.sha256_file(archive)?;
    if actual != expected {
        return Err(BackupError::ChecksumMismatch {
            path: archive.to_path_buf(),
            expected,
            actual,
        }
        .into());
    }
    Ok(true)
}
