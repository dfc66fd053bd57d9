//! Effective-UID lookup for the startup privilege gate.

use anyhow::{Context, Result};

const PROC_SELF_STATUS: &str = "/proc/self/status";

/// Effective UID of this process.
///
/// # Errors
///
/// Returns an error if `/proc/self/status` cannot be read or parsed.
pub fn effective_uid() -> Result<u32> {
    let status = std::fs::read_to_string(PROC_SELF_STATUS)
        .with_context(|| format!("reading {PROC_SELF_STATUS}"))?;
    parse_effective_uid(&status).context("no Uid line in /proc/self/status")
}

/// Second field of the `Uid:` line (real, effective, saved, filesystem).
#[must_use]
pub fn parse_effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().nth(1))
        .and_then(|uid| uid.parse().ok())
}
