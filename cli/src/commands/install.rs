//! `jmakactl install`: install or reinstall one instance.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::InsertOutcome;
use crate::application::services::install::{self, InstallRequest, ProxyOutcome};
use crate::commands::InstallArgs;

/// Run `jmakactl install`.
///
/// # Errors
///
/// Returns an error if validation fails or any install step fails.
pub async fn run(app: &AppContext, args: &InstallArgs) -> Result<ExitCode> {
    let request = InstallRequest {
        name: args.name.clone(),
        port: args.port,
        bundle: args.bundle.clone(),
        domain: args.domain.clone(),
        path_prefix: args.path_prefix.clone(),
        mount_mode: args.mount_mode,
        nginx_action: args.nginx_action,
    };
    let ctx = &app.output;
    let reporter = app.reporter();
    let outcome = install::install(
        &app.host,
        &app.runner,
        &reporter,
        app,
        &app.settings,
        &request,
    )
    .await?;

    let record = &outcome.record;
    match &outcome.proxy {
        ProxyOutcome::Skipped => {}
        // Printed even with --quiet; the snippet is the command's output.
        ProxyOutcome::Printed(text) => print!("{text}"),
        ProxyOutcome::SnippetWritten { path, directive } => {
            ctx.success(&format!("snippet written to {}", path.display()));
            ctx.info(&format!("add to the server block: {directive}"));
        }
        ProxyOutcome::Attached(attachment) => match attachment.outcome {
            InsertOutcome::Inserted { blocks } => ctx.success(&format!(
                "include added to {} ({blocks} server block{})",
                attachment.path.display(),
                if blocks == 1 { "" } else { "s" }
            )),
            InsertOutcome::AlreadyPresent => ctx.info(&format!(
                "include already present in {}",
                attachment.path.display()
            )),
        },
    }
    for backup in app.host.backups_taken() {
        ctx.info(&format!("backup: {}", backup.display()));
    }

    ctx.success(&format!(
        "{} installed on port {}, served at {}",
        record.instance.name, record.instance.port, record.instance.path_prefix
    ));
    Ok(ExitCode::SUCCESS)
}
