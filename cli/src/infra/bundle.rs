//! Bundle infrastructure: implements `BundleMaterializer`.
//!
//! Sources: a directory, a `.tar` / `.tar.gz` / `.tgz` archive, or an
//! `http(s)://` URL of such an archive. Everything is built in
//! `<base>.staging` and renamed into place once complete.

use std::fs::{File, Permissions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

use crate::application::ports::BundleMaterializer;
use crate::domain::error::BundleError;
use crate::infra::fs::copy_recursive;
use crate::infra::host::LocalHost;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
}

impl ArchiveKind {
    /// Detect the format from a file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

impl BundleMaterializer for LocalHost {
    async fn materialize(&self, source: &str, base: &Path) -> Result<()> {
        let source = source.to_string();
        let base = base.to_path_buf();
        let quiet = self.quiet;
        tokio::task::spawn_blocking(move || materialize_blocking(&source, &base, quiet))
            .await
            .context("bundle task panicked")?
    }
}

fn materialize_blocking(source: &str, base: &Path, quiet: bool) -> Result<()> {
    let staging = sibling(base, ".staging");
    if staging.exists() {
        std::fs::remove_dir_all(&staging)
            .with_context(|| format!("removing stale {}", staging.display()))?;
    }
    if let Err(e) = fill_staging(source, &staging, quiet) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    if base.exists() {
        std::fs::remove_dir_all(base)
            .with_context(|| format!("removing previous {}", base.display()))?;
    }
    std::fs::rename(&staging, base)
        .with_context(|| format!("moving {} into place", staging.display()))?;
    tracing::info!(base = %base.display(), "bundle materialized");
    Ok(())
}

fn fill_staging(source: &str, staging: &Path, quiet: bool) -> Result<()> {
    std::fs::create_dir_all(staging)
        .with_context(|| format!("creating {}", staging.display()))?;

    if is_url(source) {
        let name = url_file_name(source);
        let kind =
            ArchiveKind::from_name(name).ok_or_else(|| BundleError::Unsupported(source.into()))?;
        let download_dir = tempfile::tempdir().context("creating download directory")?;
        let file = download_dir.path().join(name);
        download(source, &file, quiet)?;
        extract(&file, kind, staging)?;
    } else {
        let path = Path::new(source);
        let meta = std::fs::metadata(path).map_err(|_| BundleError::NotFound(source.into()))?;
        if meta.is_dir() {
            for entry in std::fs::read_dir(path).with_context(|| format!("listing {source}"))? {
                let entry = entry.with_context(|| format!("listing {source}"))?;
                copy_recursive(&entry.path(), &staging.join(entry.file_name()))?;
            }
        } else {
            let kind = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(ArchiveKind::from_name)
                .ok_or_else(|| BundleError::Unsupported(source.into()))?;
            extract(path, kind, staging)?;
        }
    }

    if std::fs::read_dir(staging)?.next().is_none() {
        return Err(BundleError::Empty(source.into()).into());
    }
    strip_single_top_level(staging)?;
    normalize_permissions(staging)
}

/// Unpack `archive` into `dest`, refusing entries that would escape it.
///
/// # Errors
///
/// Returns `BundleError::UnsafeEntry` for absolute or `..` paths, or any
/// read/write failure.
pub fn extract(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    let reader: Box<dyn Read> = match kind {
        ArchiveKind::Tar => Box::new(file),
        ArchiveKind::TarGz => Box::new(GzDecoder::new(file)),
    };
    let mut tar = tar::Archive::new(reader);
    for entry in tar.entries().context("reading archive")? {
        let mut entry = entry.context("reading archive entry")?;
        let raw = entry.path().context("reading entry path")?.into_owned();
        let rel = safe_relative(&raw)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&rel);
        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("creating {}", target.display()))?;
        } else if entry_type.is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let mut out =
                File::create(&target).with_context(|| format!("creating {}", target.display()))?;
            std::io::copy(&mut entry, &mut out)
                .with_context(|| format!("extracting {}", rel.display()))?;
            let mode = entry.header().mode().unwrap_or(0o644);
            out.set_permissions(Permissions::from_mode(file_mode(mode)))?;
        } else {
            tracing::warn!(entry = %raw.display(), "skipping non-regular archive entry");
        }
    }
    Ok(())
}

fn safe_relative(path: &Path) -> Result<PathBuf, BundleError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(BundleError::UnsafeEntry(path.display().to_string())),
        }
    }
    Ok(out)
}

/// `0755` when any execute bit was set in the source, else `0644`.
fn file_mode(source_mode: u32) -> u32 {
    if source_mode & 0o111 == 0 { 0o644 } else { 0o755 }
}

/// When everything sits under one directory, lift its contents up a level.
fn strip_single_top_level(staging: &Path) -> Result<()> {
    let entries: Vec<_> = std::fs::read_dir(staging)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    let [only] = entries.as_slice() else {
        return Ok(());
    };
    if !only.is_dir() {
        return Ok(());
    }
    let lifted = sibling(staging, ".lift");
    std::fs::rename(only, &lifted).with_context(|| format!("lifting {}", only.display()))?;
    std::fs::remove_dir(staging)?;
    std::fs::rename(&lifted, staging)
        .with_context(|| format!("lifting into {}", staging.display()))?;
    Ok(())
}

fn normalize_permissions(dir: &Path) -> Result<()> {
    std::fs::set_permissions(dir, Permissions::from_mode(0o755))?;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let meta = std::fs::symlink_metadata(&path)?;
        if meta.is_dir() {
            normalize_permissions(&path)?;
        } else if meta.is_file() {
            let mode = file_mode(meta.permissions().mode());
            std::fs::set_permissions(&path, Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn url_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

fn download(url: &str, dest: &Path, quiet: bool) -> Result<()> {
    let response = match ureq::get(url).set("User-Agent", "jmakactl").call() {
        Ok(r) => r,
        Err(ureq::Error::Status(code, _)) => anyhow::bail!("Download failed: HTTP {code}"),
        Err(e) => anyhow::bail!("Download failed: {e}"),
    };
    let total = response
        .header("Content-Length")
        .and_then(|v| v.parse::<u64>().ok());
    let pb = make_progress_bar(quiet, total);

    let mut file = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    let mut reader = response.into_reader();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).context("Download interrupted")?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).context("Download interrupted")?;
        pb.inc(n as u64);
    }
    pb.finish_and_clear();
    file.sync_all().context("syncing download")?;
    Ok(())
}

fn make_progress_bar(quiet: bool, total: Option<u64>) -> indicatif::ProgressBar {
    if quiet {
        return indicatif::ProgressBar::hidden();
    }
    if let Some(t) = total {
        let pb = indicatif::ProgressBar::new(t);
        pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("  downloading [{bar:40}] {percent}%  {bytes}/{total_bytes}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb
    } else {
        indicatif::ProgressBar::new_spinner()
    }
}
