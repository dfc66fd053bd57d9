//! Command implementations

pub mod backup;
pub mod install;
pub mod list;
pub mod nginx;
pub mod restore;
pub mod uninstall;

use std::path::PathBuf;

use clap::Args;
use jmaka_common::{MountMode, NginxAction};

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Instance name (normalized to lowercase letters, digits and dashes)
    #[arg(long)]
    pub name: String,

    /// Backend port (default: keep the current one, or the first free port)
    #[arg(long)]
    pub port: Option<u32>,

    /// Application bundle: directory, .tar, .tar.gz/.tgz, or http(s) URL
    #[arg(long)]
    pub bundle: String,

    /// Domain whose nginx vhost receives the include
    #[arg(long)]
    pub domain: Option<String>,

    /// URL prefix the instance is served under (e.g. /shop/)
    #[arg(long)]
    pub path_prefix: Option<String>,

    /// Whether the backend sees the prefix
    #[arg(long, value_enum, default_value_t = MountMode::BasePath)]
    pub mount_mode: MountMode,

    /// What to do with nginx
    #[arg(long, value_enum, default_value_t = NginxAction::Auto)]
    pub nginx_action: NginxAction,
}

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Remove only this instance (default: every managed instance)
    #[arg(long)]
    pub instance: Option<String>,

    /// Confirmation token for removing every instance
    #[arg(long, value_name = "TOKEN")]
    pub confirm: Option<String>,

    /// Leave data directories in place
    #[arg(long)]
    pub keep_data: bool,
}

/// Arguments for the backup command.
#[derive(Args)]
pub struct BackupArgs {
    /// Directory to write the archive to (default: `backup_dir` setting)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for the restore command.
#[derive(Args)]
pub struct RestoreArgs {
    /// Backup archive produced by `jmakactl backup`
    pub archive: PathBuf,
}
