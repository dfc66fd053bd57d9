//! Deterministic names derived from an instance slug.
//!
//! Every artifact the tool writes carries the `jmaka-` prefix so the uninstall
//! sweep can recognize it without consulting the registry.

use std::path::Path;

use crate::types::InstanceSlug;

/// Prefix shared by unit files, snippet files and managed includes.
pub const MANAGED_PREFIX: &str = "jmaka-";

const UNIT_SUFFIX: &str = ".service";
const SNIPPET_SUFFIX: &str = ".conf";

/// `jmaka-<slug>.service`
#[must_use]
pub fn unit_name(slug: &InstanceSlug) -> String {
    format!("{MANAGED_PREFIX}{slug}{UNIT_SUFFIX}")
}

/// `jmaka-<slug>.conf`
#[must_use]
pub fn snippet_file_name(slug: &InstanceSlug) -> String {
    format!("{MANAGED_PREFIX}{slug}{SNIPPET_SUFFIX}")
}

/// The managed directive line content: `include <snippet_path>;`
#[must_use]
pub fn include_directive(snippet_path: &Path) -> String {
    format!("include {};", snippet_path.display())
}

/// Recover the slug from a unit file name written by this tool.
#[must_use]
pub fn slug_from_unit_file(file_name: &str) -> Option<InstanceSlug> {
    strip_managed(file_name, UNIT_SUFFIX)
}

/// Recover the slug from a snippet file name written by this tool.
#[must_use]
pub fn slug_from_snippet_file(file_name: &str) -> Option<InstanceSlug> {
    strip_managed(file_name, SNIPPET_SUFFIX)
}

fn strip_managed(file_name: &str, suffix: &str) -> Option<InstanceSlug> {
    let inner = file_name
        .strip_prefix(MANAGED_PREFIX)?
        .strip_suffix(suffix)?;
    InstanceSlug::try_from(inner.to_string()).ok()
}
