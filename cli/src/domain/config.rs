//! Domain types and validators for jmakactl settings.
//!
//! Pure functions only; no I/O. The settings
//! struct is threaded explicitly through every operation; nothing reads
//! ambient environment defaults after startup.

use std::path::{Path, PathBuf};

use anyhow::Result;
use jmaka_common::{InstanceSlug, snippet_file_name, unit_name};
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Settings schema ──────────────────────────────────────────────────────────

/// Top-level settings stored in `/etc/jmakactl/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parent of every instance's application directory.
    pub install_root: PathBuf,
    /// Parent of every instance's storage directory.
    pub data_root: PathBuf,
    /// Instance registry location.
    pub state_dir: PathBuf,
    /// Where `backup` writes archives.
    pub backup_dir: PathBuf,
    /// Where unit files are written.
    pub systemd_dir: PathBuf,
    /// Refuse host-mutating commands unless running as root.
    pub require_root: bool,
    /// First port the allocator tries.
    pub preferred_port: u16,
    /// Optional timeout for external commands; unset waits indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    /// `systemctl` binary.
    pub systemctl: String,
    pub service: ServiceSettings,
    pub nginx: NginxSettings,
}

/// Service unit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Executable inside the instance directory.
    pub executable: String,
    /// Account the service runs as; also the owner of its directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// nginx integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxSettings {
    /// `nginx` binary used for the configuration self-check.
    pub binary: String,
    /// Where snippet files are written.
    pub snippet_dir: PathBuf,
    /// Vhost directories searched by the locator, highest priority first.
    pub site_dirs: Vec<PathBuf>,
    /// Roots walked by the include removal sweep.
    pub sweep_roots: Vec<PathBuf>,
    /// Extensions the sweep treats as configuration outside `site_dirs`.
    pub sweep_extensions: Vec<String>,
    /// `client_max_body_size` emitted into snippets.
    pub client_max_body_size: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from("/opt/jmaka"),
            data_root: PathBuf::from("/var/lib/jmaka"),
            state_dir: PathBuf::from("/var/lib/jmakactl"),
            backup_dir: PathBuf::from("/var/backups/jmaka"),
            systemd_dir: PathBuf::from("/etc/systemd/system"),
            require_root: true,
            preferred_port: 5010,
            command_timeout_secs: None,
            systemctl: "systemctl".to_string(),
            service: ServiceSettings::default(),
            nginx: NginxSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            executable: "jmaka".to_string(),
            user: None,
        }
    }
}

impl Default for NginxSettings {
    fn default() -> Self {
        Self {
            binary: "nginx".to_string(),
            snippet_dir: PathBuf::from("/etc/nginx/snippets"),
            site_dirs: vec![
                PathBuf::from("/etc/nginx/sites-enabled"),
                PathBuf::from("/etc/nginx/conf.d"),
                PathBuf::from("/etc/nginx/sites-available"),
            ],
            sweep_roots: vec![PathBuf::from("/etc/nginx")],
            sweep_extensions: vec!["conf".to_string()],
            client_max_body_size: crate::domain::nginx::snippet::DEFAULT_MAX_BODY_SIZE.to_string(),
        }
    }
}

// ── Derived paths ────────────────────────────────────────────────────────────

impl Settings {
    #[must_use]
    pub fn instance_dir(&self, slug: &InstanceSlug) -> PathBuf {
        self.install_root.join(slug.as_str())
    }

    #[must_use]
    pub fn data_dir(&self, slug: &InstanceSlug) -> PathBuf {
        self.data_root.join(slug.as_str())
    }

    #[must_use]
    pub fn unit_path(&self, slug: &InstanceSlug) -> PathBuf {
        self.systemd_dir.join(unit_name(slug))
    }

    #[must_use]
    pub fn snippet_path(&self, slug: &InstanceSlug) -> PathBuf {
        self.nginx.snippet_dir.join(snippet_file_name(slug))
    }

    #[must_use]
    pub fn registry_dir(&self) -> PathBuf {
        self.state_dir.join("instances")
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validate a loaded settings file.
///
/// # Errors
///
/// Returns an error if any path is relative or a value is unusable.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    let paths: [(&str, &Path); 6] = [
        ("install_root", &settings.install_root),
        ("data_root", &settings.data_root),
        ("state_dir", &settings.state_dir),
        ("backup_dir", &settings.backup_dir),
        ("systemd_dir", &settings.systemd_dir),
        ("nginx.snippet_dir", &settings.nginx.snippet_dir),
    ];
    for (key, path) in paths {
        require_absolute(key, path)?;
    }
    for path in &settings.nginx.site_dirs {
        require_absolute("nginx.site_dirs", path)?;
    }
    for path in &settings.nginx.sweep_roots {
        require_absolute("nginx.sweep_roots", path)?;
    }
    if settings.nginx.site_dirs.is_empty() {
        return Err(invalid("nginx.site_dirs", "at least one directory is required").into());
    }
    if settings.preferred_port < jmaka_common::MIN_PORT {
        return Err(invalid("preferred_port", "must be between 1024 and 65535").into());
    }
    if settings.service.executable.is_empty() || settings.service.executable.contains('/') {
        return Err(invalid(
            "service.executable",
            "must be a file name inside the instance directory",
        )
        .into());
    }
    let body = &settings.nginx.client_max_body_size;
    let digits = body.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("nginx.client_max_body_size", "expected a size such as 100m").into());
    }
    Ok(())
}

fn require_absolute(key: &str, path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::RelativePath {
            key: key.to_string(),
            value: path.display().to_string(),
        })
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
