//! Managed `location` snippet generation.
//!
//! Total and pure: every (port, prefix, mode) combination renders.

use std::fmt::Write as _;

use jmaka_common::{MountMode, PathPrefix};

/// Upload limit emitted when the settings do not override it.
pub const DEFAULT_MAX_BODY_SIZE: &str = "100m";

const HEADER: &str = "# Managed by jmakactl. Regenerated on every install; local edits are lost.\n";

/// Render the snippet with the default upload limit.
#[must_use]
pub fn generate(port: u16, prefix: &PathPrefix, mode: MountMode) -> String {
    generate_with_body_limit(port, prefix, mode, DEFAULT_MAX_BODY_SIZE)
}

/// Render the snippet for an instance listening on `127.0.0.1:<port>`.
#[must_use]
pub fn generate_with_body_limit(
    port: u16,
    prefix: &PathPrefix,
    mode: MountMode,
    max_body_size: &str,
) -> String {
    let mut out = String::from(HEADER);
    if prefix.is_root() {
        location(&mut out, "/", &format!("http://127.0.0.1:{port}"), max_body_size);
        return out;
    }

    let bare = prefix.without_trailing_slash();
    let upstream = match mode {
        MountMode::BasePath => format!("http://127.0.0.1:{port}"),
        MountMode::StripPrefix => format!("http://127.0.0.1:{port}/"),
    };
    let _ = write!(
        out,
        "location = {bare} {{\n    return 301 {prefix};\n}}\n\n",
        prefix = prefix.as_str()
    );
    location(&mut out, prefix.as_str(), &upstream, max_body_size);
    out
}

fn location(out: &mut String, path: &str, upstream: &str, max_body_size: &str) {
    let _ = write!(
        out,
        "location {path} {{
    proxy_pass {upstream};
    proxy_http_version 1.1;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    proxy_set_header X-Forwarded-Proto $scheme;
    proxy_set_header Upgrade $http_upgrade;
    proxy_set_header Connection \"upgrade\";
    client_max_body_size {max_body_size};
}}
"
    );
}
