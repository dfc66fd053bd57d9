//! Checked execution of collaborator programs.

use std::process::Output;

use anyhow::Result;

use crate::application::ports::CommandRunner;
use crate::domain::error::ExternalCommandError;

/// Run a program and turn a non-zero exit into an [`ExternalCommandError`].
///
/// # Errors
///
/// Returns an error if the program cannot be run or exits non-zero.
pub async fn run_checked(
    runner: &impl CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<Output> {
    tracing::debug!(program, ?args, "running external command");
    let output = runner.run(program, args).await?;
    if output.status.success() {
        return Ok(output);
    }
    Err(command_error(program, args, &output).into())
}

/// Describe a failed invocation.
#[must_use]
pub fn command_error(program: &str, args: &[&str], output: &Output) -> ExternalCommandError {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    let code = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    ExternalCommandError {
        command,
        code,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
