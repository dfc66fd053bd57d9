//! Application service: backup archive creation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Local, Utc};
use jmaka_common::{InstanceSlug, snippet_file_name, unit_name};

use crate::application::ports::{ArchiveSource, Host};
use crate::domain::backup::{
    BackupManifest, FORMAT_VERSION, Section, archive_file_name, checksum_line, checksum_path,
    stamp,
};
use crate::domain::config::Settings;
use crate::domain::error::InstanceError;

/// Result of a successful backup.
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub archive: PathBuf,
    pub checksum: String,
    pub instances: Vec<InstanceSlug>,
}

/// Archive every registered instance into `output_dir` (default: the
/// configured backup directory) and write the checksum sidecar.
///
/// # Errors
///
/// Returns `InstanceError::NoneInstalled` when the registry is empty, or any
/// I/O failure while writing the archive.
pub fn create_backup(
    host: &impl Host,
    settings: &Settings,
    output_dir: Option<&Path>,
    tool_version: &str,
) -> Result<BackupReport> {
    let records = host.list()?;
    if records.is_empty() {
        return Err(InstanceError::NoneInstalled.into());
    }

    let dir = output_dir.unwrap_or(&settings.backup_dir);
    host.create_dir_all(dir)?;
    let archive = unused_archive_path(host, dir, &stamp(Local::now()));

    let mut sources = Vec::new();
    for record in &records {
        let slug = &record.instance.name;
        let candidates = [
            (Section::App, PathBuf::from(slug.as_str()), record.instance.base_directory.clone()),
            (Section::Data, PathBuf::from(slug.as_str()), record.data_directory.clone()),
            (Section::Units, PathBuf::from(unit_name(slug)), settings.unit_path(slug)),
            (Section::Snippets, PathBuf::from(snippet_file_name(slug)), settings.snippet_path(slug)),
        ];
        for (section, name, source) in candidates {
            if host.exists(&source) {
                sources.push(ArchiveSource { section, name, source });
            } else {
                tracing::debug!(path = %source.display(), "not present; skipped");
            }
        }
    }

    let manifest = BackupManifest {
        format_version: FORMAT_VERSION,
        created_at: Utc::now(),
        tool_version: tool_version.to_string(),
        instances: records,
    };
    host.write_archive(&archive, &manifest, &sources)?;

    let checksum = host.sha256_file(&archive)?;
    host.write_atomic(
        &checksum_path(&archive),
        &checksum_line(&checksum, &archive),
        0o644,
    )?;
    tracing::info!(archive = %archive.display(), "backup written");

    Ok(BackupReport {
        archive,
        checksum,
        instances: manifest.instances.into_iter().map(|r| r.instance.name).collect(),
    })
}

/// First archive name for `stamp` with neither the archive nor its sidecar
/// present in `dir`.
fn unused_archive_path(host: &impl Host, dir: &Path, stamp: &str) -> PathBuf {
    (0u32..)
        .map(|n| dir.join(archive_file_name(stamp, n)))
        .find(|p| !host.exists(p) && !host.exists(&checksum_path(p)))
        .unwrap_or_else(|| dir.join(archive_file_name(stamp, 0)))
}
