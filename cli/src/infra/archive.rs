//! Backup archive infrastructure: implements `BackupArchiver` with
//! `tar` + `flate2`.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::application::ports::{ArchiveSource, BackupArchiver};
use crate::domain::backup::{
    BackupManifest, FORMAT_VERSION, MANIFEST_NAME, Section, classify_entry,
};
use crate::domain::error::BackupError;
use crate::infra::host::LocalHost;

impl BackupArchiver for LocalHost {
    fn write_archive(
        &self,
        archive: &Path,
        manifest: &BackupManifest,
        sources: &[ArchiveSource],
    ) -> Result<()> {
        let parent = archive
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(".jmakactl-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .with_context(|| format!("creating temp file in {}", parent.display()))?;

        let encoder = GzEncoder::new(temp.reopen()?, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let manifest_json =
            serde_json::to_vec_pretty(manifest).context("serializing backup manifest")?;
        append_bytes(&mut builder, Path::new(MANIFEST_NAME), &manifest_json, 0o644)?;
        for record in &manifest.instances {
            let json = serde_json::to_vec_pretty(record).context("serializing instance record")?;
            let name = Path::new(Section::Registry.dir_name())
                .join(format!("{}.json", record.instance.name));
            append_bytes(&mut builder, &name, &json, 0o600)?;
        }

        for source in sources {
            let name = Path::new(source.section.dir_name()).join(&source.name);
            if source.source.is_dir() {
                builder
                    .append_dir_all(&name, &source.source)
                    .with_context(|| format!("archiving {}", source.source.display()))?;
            } else {
                builder
                    .append_path_with_name(&source.source, &name)
                    .with_context(|| format!("archiving {}", source.source.display()))?;
            }
        }

        let encoder = builder.into_inner().context("finishing tar stream")?;
        let file = encoder.finish().context("finishing gzip stream")?;
        file.sync_all().context("syncing backup archive")?;
        temp.persist_noclobber(archive)
            .map_err(|e| e.error)
            .with_context(|| format!("writing {}", archive.display()))?;
        Ok(())
    }

    fn unpack_archive(&self, archive: &Path, into: &Path) -> Result<BackupManifest> {
        let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        let mut manifest = None;

        for entry in tar.entries().context("reading backup archive")? {
            let mut entry = entry.context("reading backup archive entry")?;
            let raw = entry.path().context("reading entry path")?.into_owned();
            let Some(classified) = classify_entry(&raw)? else {
                let mut json = String::new();
                entry
                    .read_to_string(&mut json)
                    .context("reading backup manifest")?;
                let parsed: BackupManifest =
                    serde_json::from_str(&json).context("parsing backup manifest")?;
                manifest = Some(parsed);
                continue;
            };

            let entry_type = entry.header().entry_type();
            if !entry_type.is_dir() && !entry_type.is_file() {
                return Err(BackupError::UnsafeEntry(raw.display().to_string()).into());
            }
            let target: PathBuf = into
                .join(classified.section.dir_name())
                .join(&classified.rest);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            entry
                .unpack(&target)
                .with_context(|| format!("unpacking {}", raw.display()))?;
        }

        let manifest = manifest.ok_or(BackupError::MissingManifest)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(BackupError::UnsupportedFormat(manifest.format_version).into());
        }
        Ok(manifest)
    }
}

fn append_bytes<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    name: &Path,
    data: &[u8],
    mode: u32,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs()),
    );
    header.set_cksum();
    builder
        .append_data(&mut header, name, data)
        .with_context(|| format!("archiving {}", name.display()))
}
