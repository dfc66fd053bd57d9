//! `jmakactl backup`: archive every installed instance.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::backup::create_backup;
use crate::commands::BackupArgs;
use crate::output::progress;

/// Run `jmakactl backup`.
///
/// # Errors
///
/// Returns an error if nothing is installed or the archive cannot be written.
pub fn run(app: &AppContext, args: &BackupArgs) -> Result<ExitCode> {
    let ctx = &app.output;
    let pb = ctx
        .show_progress()
        .then(|| progress::spinner("Writing backup archive..."));

    let result = create_backup(
        &app.host,
        &app.settings,
        args.output_dir.as_deref(),
        env!("CARGO_PKG_VERSION"),
    );
    let report = match result {
        Ok(report) => {
            if let Some(pb) = &pb {
                progress::finish_ok(pb, "Backup archive written");
            }
            report
        }
        Err(e) => {
            if let Some(pb) = &pb {
                progress::finish_error(pb, "Backup failed");
            }
            return Err(e);
        }
    };

    ctx.kv("Archive", &report.archive.display().to_string());
    ctx.kv("SHA-256", &report.checksum);
    let names: Vec<&str> = report.instances.iter().map(|s| s.as_str()).collect();
    ctx.kv("Instances", &names.join(", "));
    Ok(ExitCode::SUCCESS)
}
