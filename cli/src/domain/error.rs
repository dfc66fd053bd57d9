//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

// ── Instance errors ───────────────────────────────────────────────────────────

/// Operator input that fails validation. Raised before anything is written.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error(transparent)]
    Identity(#[from] jmaka_common::IdentityError),

    #[error("Invalid domain '{0}': expected a hostname such as shop.example.com")]
    InvalidDomain(String),

    #[error("Port {port} is already in use by another process.")]
    PortInUse { port: u16 },

    #[error("No free port found at or above {0}.")]
    NoFreePort(u16),

    #[error("--domain is required when --nginx-action is 'auto'.")]
    DomainRequired,

    #[error("Instance '{0}' is not installed.")]
    NotInstalled(String),

    #[error("No instances are installed.")]
    NoneInstalled,
}

// ── Vhost errors ──────────────────────────────────────────────────────────────

/// Failures of the vhost locator and mutator.
#[derive(Debug, Error)]
pub enum VhostError {
    #[error("Vhost file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No nginx server block declares '{domain}'. Searched: {searched}")]
    NoCandidate { domain: String, searched: String },

    #[error("{} has no single-line server_name for '{domain}'; nothing inserted.", path.display())]
    DomainNotInFile { path: PathBuf, domain: String },

    #[error("{}:{line}: cannot safely parse nginx config ({reason}); file left untouched.", path.display())]
    Unparsable {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

// ── External command errors ───────────────────────────────────────────────────

/// A collaborator program (systemctl, nginx, chown) exited non-zero.
#[derive(Debug, Error)]
#[error("`{command}` failed (exit {code}): {stderr}")]
pub struct ExternalCommandError {
    pub command: String,
    pub code: String,
    pub stderr: String,
}

// ── Bundle errors ─────────────────────────────────────────────────────────────

/// Problems with the application bundle being materialized.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Bundle not found: {0}")]
    NotFound(String),

    #[error("Unsupported bundle '{0}': expected a directory, .tar, .tar.gz or .tgz")]
    Unsupported(String),

    #[error("Refusing unsafe archive entry '{0}'")]
    UnsafeEntry(String),

    #[error("Bundle '{0}' is empty")]
    Empty(String),
}

// ── Backup errors ─────────────────────────────────────────────────────────────

/// Backup and restore failures.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup archive not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Backup archive has no manifest.json")]
    MissingManifest,

    #[error("Unsupported backup format version {0}")]
    UnsupportedFormat(u32),

    #[error("Refusing unsafe archive entry '{0}'")]
    UnsafeEntry(String),
}

// ── Privilege errors ──────────────────────────────────────────────────────────

/// Raised once at startup when a host-mutating command runs unprivileged.
#[derive(Debug, Error)]
#[error(
    "This command changes system configuration and must run as root (effective uid {euid}). Re-run with sudo."
)]
pub struct PrivilegeError {
    pub euid: u32,
}

// ── Confirmation ──────────────────────────────────────────────────────────────

/// The operator did not pass the confirmation gate of a destructive sweep.
#[derive(Debug, Error)]
#[error("Confirmation required: pass --confirm {expected} to remove every instance.")]
pub struct ConfirmationError {
    pub expected: &'static str,
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors in the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' must be an absolute path")]
    RelativePath { key: String, value: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
