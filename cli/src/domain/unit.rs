//! systemd unit rendering for managed instances.

use std::fmt::Write as _;
use std::path::Path;

use jmaka_common::{ManagedInstance, service_environment};

use crate::domain::config::ServiceSettings;

/// Render the unit file for `instance`.
#[must_use]
pub fn render_unit(
    instance: &ManagedInstance,
    data_dir: &Path,
    service: &ServiceSettings,
) -> String {
    let base = instance.base_directory.display().to_string();
    let exec = instance.base_directory.join(&service.executable);
    let mut out = format!(
        "# Managed by jmakactl. Regenerated on every install.
[Unit]
Description=jmaka instance {name}
After=network.target

[Service]
Type=simple
WorkingDirectory={workdir}
ExecStart={exec}
Restart=always
RestartSec=5
",
        name = instance.name,
        workdir = escape_value(&base),
        exec = escape_value(&exec.display().to_string()),
    );
    if let Some(user) = &service.user {
        let _ = writeln!(out, "User={user}\nGroup={user}");
    }
    for (key, value) in service_environment(instance, data_dir) {
        let _ = writeln!(out, "Environment=\"{}\"", escape_value(&format!("{key}={value}")));
    }
    out.push_str(
        "SyslogIdentifier=jmaka
StandardOutput=journal
StandardError=journal

[Install]
WantedBy=multi-user.target
",
    );
    out
}

/// Escape specifiers and quotes for use in unit values.
fn escape_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('%', "%%")
}
