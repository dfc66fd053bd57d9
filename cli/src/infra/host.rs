//! `LocalHost`: the production implementation of every host port.
//!
//! Each port lives in its own module (`fs`, `vhost`, `registry`, `network`,
//! `bundle`, `archive`); this struct carries the state they share.

use std::path::PathBuf;

use chrono::Local;

use crate::domain::backup::stamp;
use crate::domain::config::Settings;
use crate::infra::fs::BackupSession;

/// Kernel socket tables read by the port probe.
pub const PROC_NET: &str = "/proc/net";

/// The machine this process runs on.
pub struct LocalHost {
    pub(crate) registry_dir: PathBuf,
    pub(crate) proc_net: PathBuf,
    pub(crate) quiet: bool,
    pub(crate) backups: BackupSession,
}

impl LocalHost {
    /// Host bound to the registry location in `settings`. Backups taken
    /// during this process share one timestamp.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            registry_dir: settings.registry_dir(),
            proc_net: PathBuf::from(PROC_NET),
            quiet: false,
            backups: BackupSession::new(stamp(Local::now())),
        }
    }

    /// Read socket tables from another directory (used in tests).
    #[must_use]
    pub fn with_proc_net(mut self, dir: PathBuf) -> Self {
        self.proc_net = dir;
        self
    }

    /// Hide download progress bars.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Backup copies taken so far in this run.
    #[must_use]
    pub fn backups_taken(&self) -> Vec<PathBuf> {
        self.backups.taken()
    }
}
