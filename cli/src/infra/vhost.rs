//! Filesystem side of the vhost locator and mutator.
//!
//! Text transforms live in `crate::domain::nginx`; this module finds files,
//! takes backups and performs atomic replacement.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::bytes::Regex;

use crate::application::ports::{InsertOutcome, SweepScope, VhostEditor};
use crate::domain::error::VhostError;
use crate::domain::nginx::locate::{file_declares_domain, is_ignored_file_name, rank, tls_score};
use crate::domain::nginx::mutate::{InsertPlan, plan_insert, remove_matching_lines};
use crate::domain::nginx::Candidate;
use crate::infra::fs::write_atomic;
use crate::infra::host::LocalHost;

impl VhostEditor for LocalHost {
    fn locate(&self, domain: &str, dirs: &[PathBuf]) -> Result<Vec<Candidate>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for dir in dirs {
            for path in sorted_entries(dir) {
                if !file_name_allowed(&path) {
                    continue;
                }
                let Ok(canonical) = std::fs::canonicalize(&path) else {
                    continue;
                };
                if !canonical.is_file() || !seen.insert(canonical) {
                    continue;
                }
                let text = match std::fs::read(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable vhost");
                        continue;
                    }
                };
                if file_declares_domain(&text, domain) {
                    tracing::debug!(path = %path.display(), "candidate vhost");
                    found.push(Candidate {
                        score: tls_score(&text),
                        path,
                    });
                }
            }
        }
        Ok(rank(found))
    }

    fn insert(&self, path: &Path, domain: &str, directive: &str) -> Result<InsertOutcome> {
        let target = match std::fs::canonicalize(path) {
            Ok(target) => target,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(VhostError::NotFound(path.to_path_buf()).into());
            }
            Err(e) => return Err(e).with_context(|| format!("resolving {}", path.display())),
        };
        let text = std::fs::read(&target)
            .with_context(|| format!("reading {}", target.display()))?;

        let plan = plan_insert(&text, domain, directive).map_err(|f| VhostError::Unparsable {
            path: target.clone(),
            line: f.line,
            reason: f.reason,
        })?;
        match plan {
            InsertPlan::DomainNotFound => Err(VhostError::DomainNotInFile {
                path: target,
                domain: domain.to_string(),
            }
            .into()),
            InsertPlan::AlreadyPresent => {
                self.backups.ensure(&target)?;
                Ok(InsertOutcome::AlreadyPresent)
            }
            InsertPlan::Insert { content, blocks } => {
                self.backups.ensure(&target)?;
                write_atomic(&target, &content, None)?;
                tracing::info!(path = %target.display(), blocks, "directive inserted");
                Ok(InsertOutcome::Inserted { blocks })
            }
        }
    }

    fn remove_from_tree(&self, scope: &SweepScope<'_>, predicate: &Regex) -> Result<Vec<PathBuf>> {
        let site_dirs: HashSet<PathBuf> = scope
            .site_dirs
            .iter()
            .filter_map(|d| std::fs::canonicalize(d).ok())
            .collect();

        let mut walk = TreeWalk::default();
        for root in scope.roots {
            walk.visit_dir(root);
        }

        let mut modified = Vec::new();
        let mut processed = HashSet::new();
        for path in walk.files {
            if !file_name_allowed(&path) || !qualifies(&path, scope.extensions, &site_dirs) {
                continue;
            }
            let Ok(canonical) = std::fs::canonicalize(&path) else {
                continue;
            };
            if !processed.insert(canonical.clone()) {
                continue;
            }
            let text = std::fs::read(&canonical)
                .with_context(|| format!("reading {}", canonical.display()))?;
            let Some((content, removed)) = remove_matching_lines(&text, predicate) else {
                continue;
            };
            self.backups.ensure(&canonical)?;
            write_atomic(&canonical, &content, None)?;
            tracing::info!(path = %canonical.display(), removed, "managed include removed");
            modified.push(canonical);
        }
        Ok(modified)
    }
}

/// Recursive walk that follows directory symlinks, visiting each canonical
/// directory once.
#[derive(Default)]
struct TreeWalk {
    visited: HashSet<PathBuf>,
    files: Vec<PathBuf>,
}

impl TreeWalk {
    fn visit_dir(&mut self, dir: &Path) {
        let Ok(canonical) = std::fs::canonicalize(dir) else {
            tracing::debug!(dir = %dir.display(), "sweep root missing; skipped");
            return;
        };
        if !self.visited.insert(canonical) {
            return;
        }
        for path in sorted_entries(dir) {
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => self.visit_dir(&path),
                Ok(meta) if meta.is_file() => self.files.push(path),
                _ => {}
            }
        }
    }
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::debug!(dir = %dir.display(), "cannot list directory; skipped");
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    paths.sort();
    paths
}

fn file_name_allowed(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| !is_ignored_file_name(name))
}

fn qualifies(path: &Path, extensions: &[String], site_dirs: &HashSet<PathBuf>) -> bool {
    let by_extension = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| extensions.iter().any(|e| e == ext));
    by_extension
        || path
            .parent()
            .and_then(|p| std::fs::canonicalize(p).ok())
            .is_some_and(|p| site_dirs.contains(&p))
}
