//! `jmakactl restore <ARCHIVE>`: bring instances back from a backup.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::InsertOutcome;
use crate::application::services::restore::restore;
use crate::commands::RestoreArgs;

/// Run `jmakactl restore`.
///
/// # Errors
///
/// Returns an error if the archive is missing, fails verification, or any
/// restore step fails.
pub async fn run(app: &AppContext, args: &RestoreArgs) -> Result<ExitCode> {
    let ctx = &app.output;
    let prompt = format!(
        "Restore from {}? Existing instances with the same names are replaced.",
        args.archive.display()
    );
    if !app.confirm(&prompt, true)? {
        ctx.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let reporter = app.reporter();
    let report = restore(
        &app.host,
        &app.runner,
        &reporter,
        app,
        &app.settings,
        &args.archive,
    )
    .await?;

    for attachment in &report.attached {
        if attachment.outcome == InsertOutcome::AlreadyPresent {
            ctx.info(&format!("include already present in {}", attachment.path.display()));
        } else {
            ctx.info(&format!("include added to {}", attachment.path.display()));
        }
    }
    let names: Vec<&str> = report.instances.iter().map(|s| s.as_str()).collect();
    ctx.success(&format!("restored {}", names.join(", ")));
    Ok(ExitCode::SUCCESS)
}
