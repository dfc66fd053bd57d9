//! Pure half of the vhost locator: matching, scoring and ranking.

use std::path::PathBuf;

use serde::Serialize;

use super::scan;

/// A vhost file that declares the requested domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub path: PathBuf,
    /// 2 = listens on 443 with TLS, 1 = listens on 443, 0 = otherwise.
    pub score: u8,
}

/// `true` when any single-line `server_name` in `text` lists `domain`.
#[must_use]
pub fn file_declares_domain(text: &[u8], domain: &str) -> bool {
    scan::lines(text).any(|line| scan::declares_domain(line, domain))
}

/// Score a vhost file by how it listens on 443.
#[must_use]
pub fn tls_score(text: &[u8]) -> u8 {
    let mut on_443 = false;
    let mut ssl_listen = false;
    let mut ssl_on = false;
    for line in scan::lines(text) {
        if let Some(listen) = scan::listen(line) {
            if listen.port_443 {
                on_443 = true;
                ssl_listen |= listen.ssl;
            }
        } else if scan::is_ssl_on(line) {
            ssl_on = true;
        }
    }
    match (on_443, ssl_listen || ssl_on) {
        (true, true) => 2,
        (true, false) => 1,
        _ => 0,
    }
}

/// Order candidates by descending score; ties keep encounter order.
#[must_use]
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    // sort_by is stable
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}

/// File names never treated as live configuration: our own backups, editor
/// and package-manager leftovers, and hidden files.
#[must_use]
pub fn is_ignored_file_name(name: &str) -> bool {
    name.starts_with('.')
        || name.contains(".bak.")
        || name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".orig")
        || name.contains(".dpkg-")
}

/// Basic hostname check for `--domain`.
#[must_use]
pub fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
