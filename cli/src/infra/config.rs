//! Settings loading from YAML.
//!
//! Resolution order: `--config`, `JMAKACTL_CONFIG`, `/etc/jmakactl/config.yaml`,
//! then `<user config dir>/jmakactl/config.yaml`. When nothing is found the
//! built-in defaults apply.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::config::{Settings, validate_settings};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "JMAKACTL_CONFIG";

/// System-wide settings file.
pub const SYSTEM_CONFIG: &str = "/etc/jmakactl/config.yaml";

/// Loads [`Settings`] from a YAML file on disk.
pub struct YamlConfigStore {
    explicit: Option<PathBuf>,
}

impl YamlConfigStore {
    /// `explicit` is the `--config` flag, if given.
    #[must_use]
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// The settings file that applies, if any.
    ///
    /// An explicitly named file (flag or environment) is returned even when it
    /// does not exist so that `load` can report it.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV)
            && !val.is_empty()
        {
            return Some(PathBuf::from(val));
        }
        let system = PathBuf::from(SYSTEM_CONFIG);
        if system.exists() {
            return Some(system);
        }
        dirs::config_dir()
            .map(|d| d.join("jmakactl").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Load and validate the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file is missing, cannot be parsed, or holds
    /// invalid values.
    pub fn load(&self) -> Result<Settings> {
        let Some(path) = self.path() else {
            tracing::debug!("no settings file found; using defaults");
            return Ok(Settings::default());
        };
        let settings = load_file(&path)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }
}

fn load_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let settings: Settings = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse {}", path.display()))?;
    validate_settings(&settings).with_context(|| format!("invalid settings in {}", path.display()))?;
    Ok(settings)
}
