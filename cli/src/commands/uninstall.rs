//! `jmakactl uninstall [--instance N]`: remove one instance or sweep them all.

use std::process::ExitCode;

use anyhow::Result;
use jmaka_common::InstanceSlug;

use crate::app::AppContext;
use crate::application::services::uninstall::{self, UninstallReport, UninstallScope};
use crate::commands::UninstallArgs;
use crate::domain::error::{ConfirmationError, InstanceError};

/// Token required before removing every instance.
pub const SWEEP_TOKEN: &str = "DELETE";

/// Run `jmakactl uninstall`.
///
/// # Errors
///
/// Returns `ConfirmationError` when a full sweep is not confirmed, or any
/// failure of the removal steps.
pub async fn run(app: &AppContext, args: &UninstallArgs) -> Result<ExitCode> {
    let ctx = &app.output;
    let scope = match &args.instance {
        Some(name) => {
            let slug = InstanceSlug::normalize(name).map_err(InstanceError::from)?;
            let prompt = format!("Remove instance {slug} and its nginx include?");
            if !app.confirm(&prompt, true)? {
                ctx.info("Cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
            UninstallScope::Instance(slug)
        }
        None => {
            confirm_sweep(app, args.confirm.as_deref())?;
            UninstallScope::All
        }
    };

    let reporter = app.reporter();
    let report = uninstall::uninstall(
        &app.host,
        &app.runner,
        &reporter,
        &app.settings,
        &scope,
        args.keep_data,
    )
    .await?;
    summarize(app, &report);
    Ok(ExitCode::SUCCESS)
}

fn confirm_sweep(app: &AppContext, given: Option<&str>) -> Result<()> {
    if given == Some(SWEEP_TOKEN) {
        return Ok(());
    }
    if given.is_none() {
        let ctx = &app.output;
        ctx.warn("This removes every jmaka instance, its service, snippet and include.");
        let prompt = format!("Type {SWEEP_TOKEN} to continue");
        if app.typed_token(&prompt)?.as_deref().map(str::trim) == Some(SWEEP_TOKEN) {
            return Ok(());
        }
    }
    Err(ConfirmationError {
        expected: SWEEP_TOKEN,
    }
    .into())
}

fn summarize(app: &AppContext, report: &UninstallReport) {
    let ctx = &app.output;
    if report.instances.is_empty() {
        ctx.info("No managed instances found.");
        return;
    }
    for path in report.removed_files.iter().chain(&report.removed_dirs) {
        ctx.info(&format!("removed {}", path.display()));
    }
    for backup in app.host.backups_taken() {
        ctx.info(&format!("backup: {}", backup.display()));
    }
    let names: Vec<&str> = report.instances.iter().map(InstanceSlug::as_str).collect();
    ctx.success(&format!("uninstalled {}", names.join(", ")));
}
