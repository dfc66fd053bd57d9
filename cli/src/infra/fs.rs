//! Filesystem infrastructure: atomic replacement, per-run backups and the
//! `LocalFs` / `FileHasher` ports.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::Permissions;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::application::ports::{FileHasher, LocalFs};
use crate::domain::backup::hex_encode;
use crate::infra::host::LocalHost;

// ── Atomic replacement ────────────────────────────────────────────────────────

/// New content written and synced next to its target, not yet visible.
///
/// Dropping a `StagedFile` without calling [`StagedFile::commit`] deletes the
/// temp file and leaves the target untouched.
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Rename the staged content over the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("replacing {}", target.display()))?;
        Ok(())
    }
}

/// Write `content` to a temp file in the target's directory and fsync it.
///
/// Permission bits are `mode` when given, otherwise the existing target's,
/// otherwise `0644`.
///
/// # Errors
///
/// Returns an error if the temp file cannot be created, written or synced.
pub fn stage(target: &Path, content: &[u8], mode: Option<u32>) -> Result<StagedFile> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".jmakactl-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    temp.write_all(content)
        .with_context(|| format!("writing temp file for {}", target.display()))?;

    let permissions = match (mode, std::fs::metadata(target)) {
        (Some(mode), _) => Permissions::from_mode(mode),
        (None, Ok(meta)) => meta.permissions(),
        (None, Err(_)) => Permissions::from_mode(0o644),
    };
    temp.as_file()
        .set_permissions(permissions)
        .with_context(|| format!("setting permissions for {}", target.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("syncing temp file for {}", target.display()))?;

    Ok(StagedFile {
        temp,
        target: target.to_path_buf(),
    })
}

/// Stage and commit in one step.
///
/// # Errors
///
/// Returns an error if staging or the final rename fails.
pub fn write_atomic(target: &Path, content: &[u8], mode: Option<u32>) -> Result<()> {
    stage(target, content, mode)?.commit()
}

// ── Backups ───────────────────────────────────────────────────────────────────

/// Sibling backups taken during one run: at most one per file.
pub struct BackupSession {
    stamp: String,
    taken: RefCell<BTreeMap<PathBuf, PathBuf>>,
}

impl BackupSession {
    #[must_use]
    pub fn new(stamp: String) -> Self {
        Self {
            stamp,
            taken: RefCell::new(BTreeMap::new()),
        }
    }

    /// Copy `path` (contents and permission bits) to
    /// `<path>.bak.<stamp>` unless this session already backed it up.
    /// Returns the backup's path.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    pub fn ensure(&self, path: &Path) -> Result<PathBuf> {
        if let Some(existing) = self.taken.borrow().get(path) {
            return Ok(existing.clone());
        }
        let target = backup_path(path, &self.stamp);
        std::fs::copy(path, &target).with_context(|| {
            format!("backing up {} to {}", path.display(), target.display())
        })?;
        tracing::info!(file = %path.display(), backup = %target.display(), "backup written");
        self.taken
            .borrow_mut()
            .insert(path.to_path_buf(), target.clone());
        Ok(target)
    }

    /// Backup paths in original-file order.
    #[must_use]
    pub fn taken(&self) -> Vec<PathBuf> {
        self.taken.borrow().values().cloned().collect()
    }
}

/// First unused name among `<path>.bak.<stamp>`, `<path>.bak.<stamp>.1`, ...
#[must_use]
pub fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let mut base = path.as_os_str().to_os_string();
    base.push(format!(".bak.{stamp}"));
    let base = PathBuf::from(base);
    if base.symlink_metadata().is_err() {
        return base;
    }
    (1u32..)
        .map(|n| {
            let mut name = base.clone().into_os_string();
            name.push(format!(".{n}"));
            PathBuf::from(name)
        })
        .find(|p| p.symlink_metadata().is_err())
        .unwrap_or(base)
}

// ── Tree helpers ──────────────────────────────────────────────────────────────

/// Copy a file or directory tree, following symlinks.
///
/// # Errors
///
/// Returns an error on the first entry that cannot be copied.
pub fn copy_recursive(from: &Path, to: &Path) -> Result<()> {
    let meta = std::fs::metadata(from).with_context(|| format!("reading {}", from.display()))?;
    if !meta.is_dir() {
        std::fs::copy(from, to)
            .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
        return Ok(());
    }
    std::fs::create_dir_all(to).with_context(|| format!("creating {}", to.display()))?;
    for entry in std::fs::read_dir(from).with_context(|| format!("listing {}", from.display()))? {
        let entry = entry.with_context(|| format!("listing {}", from.display()))?;
        copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

fn remove_any(path: &Path) -> Result<bool> {
    let meta = match path.symlink_metadata() {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("inspecting {}", path.display())),
    };
    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

/// Compute the SHA256 hex digest of a file.
///
/// Reads the file in 64 KB chunks to avoid loading large files into memory.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file.read(&mut buf).context("reading file")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

// ── Ports ─────────────────────────────────────────────────────────────────────

impl LocalFs for LocalHost {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating directory {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<bool> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing directory {}", path.display())),
        }
    }

    fn remove_file(&self, path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing file {}", path.display())),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading file {}", path.display()))
    }

    fn write_atomic(&self, path: &Path, content: &str, mode: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }
        write_atomic(path, content.as_bytes(), Some(mode))
    }

    fn replace(&self, from: &Path, to: &Path) -> Result<()> {
        remove_any(to)?;
        if let Some(parent) = to.parent() {
            self.create_dir_all(parent)?;
        }
        if let Err(e) = std::fs::rename(from, to) {
            tracing::debug!(error = %e, "rename failed; copying instead");
            copy_recursive(from, to)?;
            remove_any(from)?;
        }
        Ok(())
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }
}

impl FileHasher for LocalHost {
    fn sha256_file(&self, path: &Path) -> Result<String> {
        sha256_file(path)
    }
}
