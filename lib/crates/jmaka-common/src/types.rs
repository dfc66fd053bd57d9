use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest port an instance may listen on (below is reserved for privileged services).
pub const MIN_PORT: u16 = 1024;

/// Upper bound for a normalized slug.
pub const MAX_SLUG_LEN: usize = 40;

/// Rejections produced while normalizing instance identity input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Invalid instance name '{0}': must contain at least one letter or digit")]
    EmptySlug(String),

    #[error("'{0}' is not a normalized instance slug")]
    NotNormalized(String),

    #[error("Invalid port {0}: must be between 1024 and 65535")]
    PortOutOfRange(u32),

    #[error("Invalid path prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

// ── Slug ──────────────────────────────────────────────────────────────────────

/// Filesystem and service-name safe instance identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceSlug(String);

impl InstanceSlug {
    /// Normalize free-form input into a slug.
    ///
    /// Runs of characters outside `[a-z0-9]` (after ASCII lower-casing) become a
    /// single `-`, edge dashes are trimmed and the result is capped at
    /// [`MAX_SLUG_LEN`] characters.
    pub fn normalize(raw: &str) -> Result<Self, IdentityError> {
        let mut out = String::with_capacity(raw.len());
        let mut pending_dash = false;
        for c in raw.chars() {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            } else {
                pending_dash = true;
            }
        }
        out.truncate(MAX_SLUG_LEN);
        let trimmed = out.trim_end_matches('-');
        if trimmed.is_empty() {
            return Err(IdentityError::EmptySlug(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InstanceSlug {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let slug = Self::normalize(&value)?;
        if slug.0 != value {
            return Err(IdentityError::NotNormalized(value));
        }
        Ok(slug)
    }
}

impl From<InstanceSlug> for String {
    fn from(value: InstanceSlug) -> Self {
        value.0
    }
}

impl fmt::Display for InstanceSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Path prefix ───────────────────────────────────────────────────────────────

/// URL path prefix an instance is mounted under: `/` or `/seg/.../`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPrefix(String);

impl PathPrefix {
    /// The root mount.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalize user input: add the leading slash, collapse repeated slashes
    /// and ensure a trailing slash.
    pub fn normalize(raw: &str) -> Result<Self, IdentityError> {
        let invalid = |reason: &str| IdentityError::InvalidPrefix {
            prefix: raw.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = raw.trim();
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("whitespace is not allowed"));
        }
        let mut out = String::from("/");
        for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(invalid("'.' and '..' segments are not allowed"));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-'))
            {
                return Err(invalid("segments may only contain A-Z a-z 0-9 . _ ~ -"));
            }
            out.push_str(segment);
            out.push('/');
        }
        Ok(Self(out))
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// `/jmaka/` as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `/jmaka` for `/jmaka/`; `/` stays `/`.
    #[must_use]
    pub fn without_trailing_slash(&self) -> &str {
        if self.is_root() {
            &self.0
        } else {
            self.0.trim_end_matches('/')
        }
    }
}

impl TryFrom<String> for PathPrefix {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let prefix = Self::normalize(&value)?;
        if prefix.0 != value {
            return Err(IdentityError::InvalidPrefix {
                prefix: value,
                reason: "not normalized".to_string(),
            });
        }
        Ok(prefix)
    }
}

impl From<PathPrefix> for String {
    fn from(value: PathPrefix) -> Self {
        value.0
    }
}

impl fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Enums ─────────────────────────────────────────────────────────────────────

/// Whether the proxy forwards the prefix to the backend or strips it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum MountMode {
    /// Backend receives the full prefixed URI.
    #[default]
    BasePath,
    /// Proxy removes the prefix; backend sees root-relative URIs.
    StripPrefix,
}

/// What install does with the reverse proxy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum NginxAction {
    /// Leave nginx alone.
    None,
    /// Write the snippet, attach it to the domain's vhost and reload.
    #[default]
    Auto,
    /// Print the snippet to stdout only.
    Print,
    /// Write the snippet file but do not touch any vhost.
    WriteSnippet,
}

// ── Instance ──────────────────────────────────────────────────────────────────

/// Validate an instance port.
pub fn validate_port(port: u32) -> Result<u16, IdentityError> {
    match u16::try_from(port) {
        Ok(p) if p >= MIN_PORT => Ok(p),
        _ => Err(IdentityError::PortOutOfRange(port)),
    }
}

/// An installed application instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedInstance {
    pub name: InstanceSlug,
    pub port: u16,
    pub base_directory: PathBuf,
    pub path_prefix: PathPrefix,
    pub mount_mode: MountMode,
}

impl ManagedInstance {
    /// Build an instance; a root prefix forces [`MountMode::BasePath`].
    pub fn new(
        name: InstanceSlug,
        port: u16,
        base_directory: PathBuf,
        path_prefix: PathPrefix,
        mount_mode: MountMode,
    ) -> Result<Self, IdentityError> {
        let port = validate_port(u32::from(port))?;
        let mount_mode = if path_prefix.is_root() {
            MountMode::BasePath
        } else {
            mount_mode
        };
        Ok(Self {
            name,
            port,
            base_directory,
            path_prefix,
            mount_mode,
        })
    }
}

/// Registry entry persisted for every installed instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(flatten)]
    pub instance: ManagedInstance,
    pub data_directory: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub nginx_action: NginxAction,
    /// Vhost file the managed include was inserted into, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vhost_path: Option<PathBuf>,
    pub installed_at: DateTime<Utc>,
}
