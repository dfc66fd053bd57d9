//! Backup archive layout and manifest types.
//!
//! Archive layout:
//!
//! ```text
//! manifest.json
//! registry/<slug>.json
//! app/<slug>/...
//! data/<slug>/...
//! units/jmaka-<slug>.service
//! snippets/jmaka-<slug>.conf
//! ```

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use jmaka_common::{InstanceRecord, InstanceSlug};
use serde::{Deserialize, Serialize};

use crate::domain::error::BackupError;

/// Bumped when the archive layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

pub const MANIFEST_NAME: &str = "manifest.json";

/// Describes what a backup archive holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub tool_version: String,
    pub instances: Vec<InstanceRecord>,
}

/// Top-level directory of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Registry,
    App,
    Data,
    Units,
    Snippets,
}

impl Section {
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::App => "app",
            Self::Data => "data",
            Self::Units => "units",
            Self::Snippets => "snippets",
        }
    }

    fn from_dir_name(name: &str) -> Option<Self> {
        [
            Self::Registry,
            Self::App,
            Self::Data,
            Self::Units,
            Self::Snippets,
        ]
        .into_iter()
        .find(|s| s.dir_name() == name)
    }
}

/// Timestamp used in backup file names: `YYYYMMDD-HHMMSS`, local time.
#[must_use]
pub fn stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d-%H%M%S").to_string()
}

/// `jmaka-backup-<stamp>.tar.gz`, or `jmaka-backup-<stamp>.<n>.tar.gz` for the
/// `n`th later archive taken within the same second.
#[must_use]
pub fn archive_file_name(stamp: &str, collision: u32) -> String {
    if collision == 0 {
        format!("jmaka-backup-{stamp}.tar.gz")
    } else {
        format!("jmaka-backup-{stamp}.{collision}.tar.gz")
    }
}

/// `<archive>.sha256`
#[must_use]
pub fn checksum_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".sha256");
    PathBuf::from(name)
}

/// `sha256sum`-compatible sidecar content.
#[must_use]
pub fn checksum_line(hex: &str, archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{hex}  {name}\n")
}

/// Extract the digest from a sidecar, rejecting anything malformed.
#[must_use]
pub fn parse_checksum(content: &str) -> Option<String> {
    let hex = content.split_whitespace().next()?;
    (hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())).then(|| hex.to_lowercase())
}

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}

/// A validated archive entry below one of the sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPath {
    pub section: Section,
    /// Path below the section directory (`<slug>/...` or a file name).
    pub rest: PathBuf,
}

impl EntryPath {
    /// Slug owning this entry, when the section is per-instance directory.
    #[must_use]
    pub fn slug(&self) -> Option<InstanceSlug> {
        let first = self.rest.components().next()?;
        let Component::Normal(name) = first else {
            return None;
        };
        InstanceSlug::try_from(name.to_string_lossy().into_owned()).ok()
    }
}

/// Classify an archive entry path; `Ok(None)` for the manifest itself.
///
/// # Errors
///
/// Rejects absolute paths, `..` components and unknown sections.
pub fn classify_entry(path: &Path) -> Result<Option<EntryPath>, BackupError> {
    let unsafe_entry = || BackupError::UnsafeEntry(path.display().to_string());
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(p) => parts.push(p.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(unsafe_entry()),
        }
    }
    match parts.as_slice() {
        [] => Err(unsafe_entry()),
        [only] if only == MANIFEST_NAME => Ok(None),
        [section, rest @ ..] => {
            let section = Section::from_dir_name(section).ok_or_else(unsafe_entry)?;
            Ok(Some(EntryPath {
                section,
                rest: rest.iter().collect(),
            }))
        }
    }
}
