//! `jmakactl list`: show registered instances.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::InstanceRegistry;

/// Run `jmakactl list`.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let records = app.host.list()?;
    app.renderer().render_instances(&records)?;
    Ok(ExitCode::SUCCESS)
}
