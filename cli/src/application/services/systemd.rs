//! Application service: systemd unit activation through `systemctl`.

use anyhow::Result;

use crate::application::ports::CommandRunner;
use crate::application::services::process::{command_error, run_checked};
use crate::domain::config::Settings;

/// `daemon-reload`, `enable`, `restart`.
///
/// # Errors
///
/// Returns an error if any `systemctl` call fails.
pub async fn activate(runner: &impl CommandRunner, settings: &Settings, unit: &str) -> Result<()> {
    daemon_reload(runner, settings).await?;
    run_checked(runner, &settings.systemctl, &["enable", unit]).await?;
    restart(runner, settings, unit).await
}

/// Reload unit files from disk.
///
/// # Errors
///
/// Returns an error if `systemctl daemon-reload` fails.
pub async fn daemon_reload(runner: &impl CommandRunner, settings: &Settings) -> Result<()> {
    run_checked(runner, &settings.systemctl, &["daemon-reload"]).await?;
    Ok(())
}

/// Restart one unit.
///
/// # Errors
///
/// Returns an error if `systemctl restart` fails.
pub async fn restart(runner: &impl CommandRunner, settings: &Settings, unit: &str) -> Result<()> {
    run_checked(runner, &settings.systemctl, &["restart", unit]).await?;
    Ok(())
}

/// `disable --now`. A unit that does not exist is not an error.
///
/// # Errors
///
/// Returns an error for any other `systemctl` failure.
pub async fn disable(runner: &impl CommandRunner, settings: &Settings, unit: &str) -> Result<()> {
    let args = ["disable", "--now", unit];
    let output = runner.run(&settings.systemctl, &args).await?;
    if output.status.success() {
        return Ok(());
    }
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
    .to_lowercase();
    if is_missing_unit(&text) {
        tracing::debug!(unit, "unit not present; nothing to disable");
        return Ok(());
    }
    Err(command_error(&settings.systemctl, &args, &output).into())
}

fn is_missing_unit(text: &str) -> bool {
    ["does not exist", "not loaded", "not found", "no such file"]
        .iter()
        .any(|needle| text.contains(needle))
}
