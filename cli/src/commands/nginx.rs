//! `jmakactl nginx`: locate vhosts, print snippets, detach includes.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;
use jmaka_common::{InstanceSlug, MountMode, PathPrefix, validate_port};

use crate::app::AppContext;
use crate::application::services::{proxy, vhost};
use crate::domain::error::InstanceError;
use crate::domain::nginx::snippet;

/// nginx subcommands.
#[derive(Subcommand)]
pub enum NginxCommand {
    /// Rank the vhost files that declare a domain
    Locate {
        /// Domain to look for in `server_name`
        domain: String,
    },

    /// Print the location snippet for a backend port
    Snippet {
        /// Backend port
        #[arg(long)]
        port: u32,

        /// URL prefix (default: /)
        #[arg(long)]
        path_prefix: Option<String>,

        /// Whether the backend sees the prefix
        #[arg(long, value_enum, default_value_t = MountMode::BasePath)]
        mount_mode: MountMode,
    },

    /// Remove an instance's include from every nginx config file
    Detach {
        /// Instance name
        instance: String,
    },
}

impl NginxCommand {
    /// Only `detach` edits the nginx tree.
    #[must_use]
    pub fn mutates_host(&self) -> bool {
        matches!(self, Self::Detach { .. })
    }
}

/// Run an nginx subcommand.
///
/// # Errors
///
/// Returns an error if input is invalid or the lookup or edit fails.
pub async fn run(app: &AppContext, cmd: NginxCommand) -> Result<ExitCode> {
    match cmd {
        NginxCommand::Locate { domain } => locate(app, &domain),
        NginxCommand::Snippet {
            port,
            path_prefix,
            mount_mode,
        } => print_snippet(app, port, path_prefix.as_deref(), mount_mode),
        NginxCommand::Detach { instance } => detach(app, &instance).await,
    }
}

fn locate(app: &AppContext, domain: &str) -> Result<ExitCode> {
    let domain = domain.trim().to_ascii_lowercase();
    let candidates = vhost::locate(&app.host, &app.settings, &domain)?;
    app.renderer().render_candidates(&domain, &candidates)?;
    Ok(ExitCode::SUCCESS)
}

fn print_snippet(
    app: &AppContext,
    port: u32,
    path_prefix: Option<&str>,
    mount_mode: MountMode,
) -> Result<ExitCode> {
    let port = validate_port(port).map_err(InstanceError::from)?;
    let prefix = match path_prefix {
        Some(raw) => PathPrefix::normalize(raw).map_err(InstanceError::from)?,
        None => PathPrefix::root(),
    };
    let mode = if prefix.is_root() {
        MountMode::BasePath
    } else {
        mount_mode
    };
    let text = snippet::generate_with_body_limit(
        port,
        &prefix,
        mode,
        &app.settings.nginx.client_max_body_size,
    );
    print!("{text}");
    Ok(ExitCode::SUCCESS)
}

async fn detach(app: &AppContext, instance: &str) -> Result<ExitCode> {
    let ctx = &app.output;
    let slug = InstanceSlug::normalize(instance).map_err(InstanceError::from)?;
    let modified = vhost::detach(&app.host, &app.settings, Some(&slug))?;
    if modified.is_empty() {
        ctx.info(&format!("No include for {slug} found."));
        return Ok(ExitCode::SUCCESS);
    }
    for path in &modified {
        ctx.info(&format!("updated {}", path.display()));
    }
    for backup in app.host.backups_taken() {
        ctx.info(&format!("backup: {}", backup.display()));
    }
    let reporter = app.reporter();
    proxy::check_and_reload(&app.runner, &app.settings, &reporter).await?;
    ctx.success(&format!("{slug} detached from nginx"));
    Ok(ExitCode::SUCCESS)
}
