//! Application service: nginx self-check and graceful reload.

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, ProgressReporter};
use crate::application::services::process::run_checked;
use crate::domain::config::Settings;

/// Run `nginx -t`, then `systemctl reload nginx`. A failed self-check is
/// returned as-is and the reload is never attempted.
///
/// # Errors
///
/// Returns an error if the self-check or the reload fails.
pub async fn check_and_reload(
    runner: &impl CommandRunner,
    settings: &Settings,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("checking nginx configuration...");
    run_checked(runner, &settings.nginx.binary, &["-t"])
        .await
        .context("nginx configuration test failed; nginx was not reloaded")?;
    reporter.step("reloading nginx...");
    run_checked(runner, &settings.systemctl, &["reload", "nginx"]).await?;
    reporter.success("nginx reloaded");
    Ok(())
}
