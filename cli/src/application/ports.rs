//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared crate, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Result;
use jmaka_common::{InstanceRecord, InstanceSlug};
use regex::bytes::Regex;

use crate::domain::backup::{BackupManifest, Section};
use crate::domain::nginx::Candidate;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds the
    /// configured timeout. A non-zero exit is NOT an error at this level.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
}

// ── Operator Interaction Ports ────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit an informational message.
    fn info(&self, message: &str);
}

/// Picks one vhost among ranked candidates.
pub trait VhostChooser {
    /// Return the index of the chosen candidate. `candidates` is never empty
    /// and is ordered best-first.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be shown.
    fn choose_vhost(&self, domain: &str, candidates: &[Candidate]) -> Result<usize>;
}

// ── Registry Port ─────────────────────────────────────────────────────────────

/// Persistent record of installed instances.
pub trait InstanceRegistry {
    /// Create or replace the record for `record.instance.name`.
    fn save(&self, record: &InstanceRecord) -> Result<()>;
    /// Load one record, `None` when the instance is not registered.
    fn load(&self, slug: &InstanceSlug) -> Result<Option<InstanceRecord>>;
    /// All records, sorted by slug.
    fn list(&self) -> Result<Vec<InstanceRecord>>;
    /// Remove a record; returns `false` when it did not exist.
    fn remove(&self, slug: &InstanceSlug) -> Result<bool>;
}

// ── Vhost Port ────────────────────────────────────────────────────────────────

/// Outcome of inserting a managed directive into a vhost file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The directive was added to `blocks` server blocks.
    Inserted { blocks: usize },
    /// The file already contained the directive; it was not rewritten.
    AlreadyPresent,
}

/// Which part of the nginx tree a removal sweep may touch.
#[derive(Debug, Clone, Copy)]
pub struct SweepScope<'a> {
    /// Directories walked recursively.
    pub roots: &'a [PathBuf],
    /// Files directly inside these qualify regardless of extension.
    pub site_dirs: &'a [PathBuf],
    /// Recognized configuration file extensions.
    pub extensions: &'a [String],
}

/// Locates and edits nginx virtual-host files.
///
/// Every mutation is preceded by a backup (once per file per run) and
/// performed by atomic replacement.
pub trait VhostEditor {
    /// Rank files in `dirs` (priority order) that declare `domain`.
    /// An empty result means no candidate exists.
    fn locate(&self, domain: &str, dirs: &[PathBuf]) -> Result<Vec<Candidate>>;

    /// Insert `directive` into every server block of `path` naming `domain`.
    ///
    /// # Errors
    ///
    /// Fails with a `VhostError` when the file is missing, unparsable, or
    /// declares no matching server block.
    fn insert(&self, path: &Path, domain: &str, directive: &str) -> Result<InsertOutcome>;

    /// Delete every line matching `predicate` from qualifying files in
    /// `scope`; returns the files that were modified.
    fn remove_from_tree(&self, scope: &SweepScope<'_>, predicate: &Regex) -> Result<Vec<PathBuf>>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Abstracts reading the host's listening TCP ports.
pub trait PortProbe {
    /// Ports currently in LISTEN state on any address family.
    fn listening_ports(&self) -> Result<BTreeSet<u16>>;
}

// ── Bundle Port ───────────────────────────────────────────────────────────────

/// Places an application bundle into an instance directory.
#[allow(async_fn_in_trait)]
pub trait BundleMaterializer {
    /// Materialize `source` (directory, tarball or URL) at `base`, replacing
    /// whatever was there only once the new tree is complete.
    async fn materialize(&self, source: &str, base: &Path) -> Result<()>;
}

// ── Filesystem Ports ──────────────────────────────────────────────────────────

/// Host filesystem operations used by the lifecycle services.
pub trait LocalFs {
    /// Whether `path` exists (symlinks followed).
    fn exists(&self, path: &Path) -> bool;
    /// Create a directory and its parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Remove a directory tree; returns `false` when it was already gone.
    fn remove_dir_all(&self, path: &Path) -> Result<bool>;
    /// Remove a file; returns `false` when it was already gone.
    fn remove_file(&self, path: &Path) -> Result<bool>;
    /// Read a UTF-8 file.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Write `content` via temp file and rename, with permission bits `mode`.
    fn write_atomic(&self, path: &Path, content: &str, mode: u32) -> Result<()>;
    /// Move a file or directory tree to `to`, replacing whatever is there.
    fn replace(&self, from: &Path, to: &Path) -> Result<()>;
    /// File names directly inside `dir`, sorted; empty when `dir` is missing.
    fn list_dir(&self, dir: &Path) -> Result<Vec<String>>;
}

/// Abstracts file hashing operations.
pub trait FileHasher {
    /// Compute the SHA-256 hex digest of a file.
    fn sha256_file(&self, path: &Path) -> Result<String>;
}

// ── Backup Archive Port ───────────────────────────────────────────────────────

/// One file or directory tree to place in a backup archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    pub section: Section,
    /// Path below the section directory.
    pub name: PathBuf,
    /// Host path to read from.
    pub source: PathBuf,
}

/// Reads and writes backup archives.
pub trait BackupArchiver {
    /// Write a gzip tarball with `manifest` and every source. Never replaces
    /// an existing file at `archive`.
    fn write_archive(
        &self,
        archive: &Path,
        manifest: &BackupManifest,
        sources: &[ArchiveSource],
    ) -> Result<()>;

    /// Validate every entry of `archive` and unpack it below `into`.
    fn unpack_archive(&self, archive: &Path, into: &Path) -> Result<BackupManifest>;
}

// ── Composite ─────────────────────────────────────────────────────────────────

/// Composite trait: everything the lifecycle services need from the host.
pub trait Host:
    InstanceRegistry
    + VhostEditor
    + PortProbe
    + BundleMaterializer
    + LocalFs
    + FileHasher
    + BackupArchiver
{
}

/// Blanket implementation: any type implementing all sub-traits is a `Host`.
impl<T> Host for T where
    T: InstanceRegistry
        + VhostEditor
        + PortProbe
        + BundleMaterializer
        + LocalFs
        + FileHasher
        + BackupArchiver
{
}
