//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::domain::error::PrivilegeError;
use crate::infra::config::YamlConfigStore;
use crate::infra::privilege::effective_uid;

/// Install jmaka instances, wire them into nginx, back them up and remove them
#[derive(Parser)]
#[command(
    name = "jmakactl",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Settings file (default: $JMAKACTL_CONFIG, then /etc/jmakactl/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Answer yes to every prompt
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install or reinstall an instance
    Install(commands::InstallArgs),

    /// Remove one instance, or every managed artifact
    Uninstall(commands::UninstallArgs),

    /// Archive every installed instance
    Backup(commands::BackupArgs),

    /// Restore instances from a backup archive
    Restore(commands::RestoreArgs),

    /// List installed instances
    List,

    /// Inspect and edit the nginx configuration
    #[command(subcommand)]
    Nginx(commands::nginx::NginxCommand),
}

impl Command {
    /// Whether the command changes host state.
    fn mutates_host(&self) -> bool {
        match self {
            Self::Install(_) | Self::Uninstall(_) | Self::Backup(_) | Self::Restore(_) => true,
            Self::Nginx(cmd) => cmd.mutates_host(),
            Self::List => false,
        }
    }
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if settings cannot be loaded, the privilege check
    /// fails, or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            config,
            json,
            quiet,
            no_color,
            yes,
            verbose: _,
            command,
        } = self;

        let settings = YamlConfigStore::new(config).load()?;
        if settings.require_root && command.mutates_host() {
            let euid = effective_uid()?;
            if euid != 0 {
                return Err(PrivilegeError { euid }.into());
            }
        }

        let flags = AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        };
        let app = AppContext::new(&flags, settings);

        match command {
            Command::Install(args) => commands::install::run(&app, &args).await,
            Command::Uninstall(args) => commands::uninstall::run(&app, &args).await,
            Command::Backup(args) => commands::backup::run(&app, &args),
            Command::Restore(args) => commands::restore::run(&app, &args).await,
            Command::List => commands::list::run(&app),
            Command::Nginx(cmd) => commands::nginx::run(&app, cmd).await,
        }
    }
}
