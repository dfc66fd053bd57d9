//! Environment contract between the service unit and the jmaka backend.

use std::path::Path;

use crate::types::{ManagedInstance, MountMode};

/// Listen URL, e.g. `http://127.0.0.1:5010`.
pub const ENV_LISTEN: &str = "JMAKA_LISTEN";
/// Root directory for uploaded and generated files.
pub const ENV_STORAGE_ROOT: &str = "JMAKA_STORAGE_ROOT";
/// Prefix the backend must serve under; empty when it sees root-relative URIs.
pub const ENV_BASE_PATH: &str = "JMAKA_BASE_PATH";

/// Environment variables for an instance, in unit file order.
#[must_use]
pub fn service_environment(instance: &ManagedInstance, data_dir: &Path) -> Vec<(String, String)> {
    let base_path = match instance.mount_mode {
        MountMode::BasePath if !instance.path_prefix.is_root() => {
            instance.path_prefix.without_trailing_slash().to_string()
        }
        _ => String::new(),
    };
    vec![
        (
            ENV_LISTEN.to_string(),
            format!("http://127.0.0.1:{}", instance.port),
        ),
        (ENV_STORAGE_ROOT.to_string(), data_dir.display().to_string()),
        (ENV_BASE_PATH.to_string(), base_path),
    ]
}
