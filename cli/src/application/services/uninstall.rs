//! Application service: uninstall one instance or sweep every managed
//! artifact off the host.
//!
//! Order: includes, snippets, proxy reload, services, directories, registry.
//! Artifacts are found both through the registry and by their `jmaka-`
//! names, so a half-finished install is still cleaned up.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use jmaka_common::{InstanceSlug, slug_from_snippet_file, slug_from_unit_file, unit_name};

use crate::application::ports::{CommandRunner, Host, ProgressReporter};
use crate::application::services::{proxy, systemd, vhost};
use crate::domain::config::Settings;
use crate::domain::error::InstanceError;

/// Which instances to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallScope {
    Instance(InstanceSlug),
    All,
}

/// What the uninstall removed.
#[derive(Debug, Clone, Default)]
pub struct UninstallReport {
    pub instances: Vec<InstanceSlug>,
    /// Vhost files the include directive was removed from.
    pub modified_vhosts: Vec<PathBuf>,
    /// Snippet and unit files deleted.
    pub removed_files: Vec<PathBuf>,
    /// Application and data directories deleted.
    pub removed_dirs: Vec<PathBuf>,
}

struct Target {
    slug: InstanceSlug,
    base: PathBuf,
    data: PathBuf,
}

/// Remove instances and their host artifacts.
///
/// # Errors
///
/// Returns `InstanceError::NotInstalled` when a named instance has no trace
/// on the host, or any failure of the removal steps. A failed proxy
/// self-check stops the uninstall before services are touched.
pub async fn uninstall(
    host: &impl Host,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    settings: &Settings,
    scope: &UninstallScope,
    keep_data: bool,
) -> Result<UninstallReport> {
    let targets = match scope {
        UninstallScope::Instance(slug) => vec![single_target(host, settings, slug)?],
        UninstallScope::All => discover(host, settings)?,
    };
    let mut report = UninstallReport {
        instances: targets.iter().map(|t| t.slug.clone()).collect(),
        ..UninstallReport::default()
    };

    // 1. Include directives
    reporter.step("removing managed include directives...");
    let only = match scope {
        UninstallScope::Instance(slug) => Some(slug),
        UninstallScope::All => None,
    };
    report.modified_vhosts = vhost::detach(host, settings, only)?;
    for path in &report.modified_vhosts {
        reporter.info(&format!("updated {}", path.display()));
    }

    // 2. Snippets
    let mut snippets_removed = false;
    for target in &targets {
        let path = settings.snippet_path(&target.slug);
        if host.remove_file(&path)? {
            snippets_removed = true;
            report.removed_files.push(path);
        }
    }

    // 3. Proxy
    if snippets_removed || !report.modified_vhosts.is_empty() {
        proxy::check_and_reload(runner, settings, reporter).await?;
    }

    // 4. Services
    let mut units_removed = false;
    for target in &targets {
        let unit = unit_name(&target.slug);
        reporter.step(&format!("stopping {unit}..."));
        systemd::disable(runner, settings, &unit).await?;
        let path = settings.unit_path(&target.slug);
        if host.remove_file(&path)? {
            units_removed = true;
            report.removed_files.push(path);
        }
    }
    if units_removed {
        systemd::daemon_reload(runner, settings).await?;
    }

    // 5. Directories
    for target in &targets {
        if host.remove_dir_all(&target.base)? {
            report.removed_dirs.push(target.base.clone());
        }
        if keep_data {
            reporter.info(&format!("kept data in {}", target.data.display()));
        } else if host.remove_dir_all(&target.data)? {
            report.removed_dirs.push(target.data.clone());
        }
    }

    // 6. Registry
    for target in &targets {
        host.remove(&target.slug)?;
    }

    Ok(report)
}

fn single_target(host: &impl Host, settings: &Settings, slug: &InstanceSlug) -> Result<Target> {
    let target = target_for(host, settings, slug.clone())?;
    let registered = host.load(slug)?.is_some();
    let traces = [
        settings.unit_path(slug),
        settings.snippet_path(slug),
        target.base.clone(),
    ];
    if !registered && !traces.iter().any(|p| host.exists(p)) {
        return Err(InstanceError::NotInstalled(slug.to_string()).into());
    }
    Ok(target)
}

/// Every instance known to the registry or leaving a `jmaka-*` unit or
/// snippet behind.
fn discover(host: &impl Host, settings: &Settings) -> Result<Vec<Target>> {
    let mut slugs: BTreeSet<InstanceSlug> = host
        .list()?
        .into_iter()
        .map(|r| r.instance.name)
        .collect();
    slugs.extend(
        host.list_dir(&settings.systemd_dir)?
            .iter()
            .filter_map(|name| slug_from_unit_file(name)),
    );
    slugs.extend(
        host.list_dir(&settings.nginx.snippet_dir)?
            .iter()
            .filter_map(|name| slug_from_snippet_file(name)),
    );
    slugs
        .into_iter()
        .map(|slug| target_for(host, settings, slug))
        .collect()
}

/// Registered paths win over the current settings so moved roots still
/// resolve to what was installed.
fn target_for(host: &impl Host, settings: &Settings, slug: InstanceSlug) -> Result<Target> {
    let (base, data) = match host.load(&slug)? {
        Some(record) => (record.instance.base_directory, record.data_directory),
        None => (settings.instance_dir(&slug), settings.data_dir(&slug)),
    };
    Ok(Target { slug, base, data })
}
