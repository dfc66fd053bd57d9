//! Application service: locating vhosts and attaching/detaching the managed
//! include directive.

use std::path::PathBuf;

use anyhow::Result;
use jmaka_common::{InstanceSlug, include_directive};

use crate::application::ports::{InsertOutcome, SweepScope, VhostChooser, VhostEditor};
use crate::domain::config::Settings;
use crate::domain::error::{InstanceError, VhostError};
use crate::domain::nginx::Candidate;
use crate::domain::nginx::locate::is_valid_domain;
use crate::domain::nginx::mutate::{any_include_pattern, include_pattern_for};

/// Where a directive went and what happened there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub outcome: InsertOutcome,
}

/// Ranked vhost candidates for `domain` across the configured site dirs.
///
/// # Errors
///
/// Returns `InstanceError::InvalidDomain` for a malformed domain and
/// `VhostError::NoCandidate` when no file declares it.
pub fn locate(
    editor: &impl VhostEditor,
    settings: &Settings,
    domain: &str,
) -> Result<Vec<Candidate>> {
    if !is_valid_domain(domain) {
        return Err(InstanceError::InvalidDomain(domain.to_string()).into());
    }
    let candidates = editor.locate(domain, &settings.nginx.site_dirs)?;
    if candidates.is_empty() {
        let searched = settings
            .nginx
            .site_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(VhostError::NoCandidate {
            domain: domain.to_string(),
            searched,
        }
        .into());
    }
    Ok(candidates)
}

/// Locate the vhost serving `domain` and insert the include for `slug`.
///
/// # Errors
///
/// Returns an error if no vhost is found, the choice fails, or the insert
/// is refused.
pub fn attach(
    editor: &impl VhostEditor,
    chooser: &impl VhostChooser,
    settings: &Settings,
    slug: &InstanceSlug,
    domain: &str,
) -> Result<Attachment> {
    let candidates = locate(editor, settings, domain)?;
    let index = if candidates.len() == 1 {
        0
    } else {
        chooser.choose_vhost(domain, &candidates)?
    };
    let path = candidates
        .get(index)
        .map(|c| c.path.clone())
        .ok_or_else(|| anyhow::anyhow!("vhost selection {index} is out of range"))?;

    let directive = include_directive(&settings.snippet_path(slug));
    tracing::info!(path = %path.display(), %directive, "inserting managed include");
    let outcome = editor.insert(&path, domain, &directive)?;
    Ok(Attachment { path, outcome })
}

/// Remove the include for `slug` (or for every instance when `None`) from
/// the whole nginx tree. Returns the modified files.
///
/// # Errors
///
/// Returns an error if a qualifying file cannot be read, or a matching one
/// cannot be backed up or rewritten.
pub fn detach(
    editor: &impl VhostEditor,
    settings: &Settings,
    slug: Option<&InstanceSlug>,
) -> Result<Vec<PathBuf>> {
    let predicate = slug.map_or_else(any_include_pattern, |s| include_pattern_for(s.as_str()));
    let scope = SweepScope {
        roots: &settings.nginx.sweep_roots,
        site_dirs: &settings.nginx.site_dirs,
        extensions: &settings.nginx.sweep_extensions,
    };
    editor.remove_from_tree(&scope, &predicate)
}
