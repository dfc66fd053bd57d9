//! JSON output helpers.
//!
//! Provides the error-object formatter used by all `--json` code paths when
//! a command fails, plus the JSON renderer for read-only commands.

use anyhow::{Context, Result};
use jmaka_common::InstanceRecord;

use crate::domain::error::{
    BackupError, BundleError, ConfigError, ConfirmationError, ExternalCommandError,
    InstanceError, PrivilegeError, VhostError,
};
use crate::domain::nginx::Candidate;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Machine-readable category of a failure, taken from the first typed error
/// in the chain.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if cause.is::<InstanceError>() || cause.is::<ConfigError>() {
            return "validation";
        }
        if let Some(e) = cause.downcast_ref::<VhostError>() {
            return match e {
                VhostError::Unparsable { .. } => "config_unparsable",
                _ => "not_found",
            };
        }
        if let Some(e) = cause.downcast_ref::<BundleError>() {
            return match e {
                BundleError::NotFound(_) => "not_found",
                _ => "validation",
            };
        }
        if let Some(e) = cause.downcast_ref::<BackupError>() {
            return match e {
                BackupError::NotFound(_) => "not_found",
                _ => "validation",
            };
        }
        if cause.is::<ExternalCommandError>() {
            return "external_command";
        }
        if cause.is::<PrivilegeError>() {
            return "privilege";
        }
        if cause.is::<ConfirmationError>() {
            return "confirmation";
        }
    }
    "error"
}

/// Renders domain types as pretty-printed JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Print the registered instances as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_instances(&self, records: &[InstanceRecord]) -> Result<()> {
        let out = serde_json::to_string_pretty(records).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// Print the ranked candidates for a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_candidates(&self, domain: &str, candidates: &[Candidate]) -> Result<()> {
        let obj = serde_json::json!({
            "domain": domain,
            "candidates": candidates,
        });
        let out = serde_json::to_string_pretty(&obj).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }
}
