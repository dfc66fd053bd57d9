//! Application service: install (or reinstall) one instance.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use jmaka_common::{
    InstanceRecord, InstanceSlug, ManagedInstance, MountMode, NginxAction, PathPrefix,
    include_directive, unit_name, validate_port,
};

use crate::application::ports::{
    CommandRunner, Host, PortProbe, ProgressReporter, VhostChooser,
};
use crate::application::services::process::run_checked;
use crate::application::services::vhost::{self, Attachment};
use crate::application::services::{proxy, systemd};
use crate::domain::config::Settings;
use crate::domain::error::InstanceError;
use crate::domain::network::propose_free_port;
use crate::domain::nginx::locate::is_valid_domain;
use crate::domain::nginx::snippet;
use crate::domain::unit::render_unit;

/// Operator input for an install, as typed on the command line.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub name: String,
    pub port: Option<u32>,
    pub bundle: String,
    pub domain: Option<String>,
    pub path_prefix: Option<String>,
    pub mount_mode: MountMode,
    pub nginx_action: NginxAction,
}

/// What the install did on the nginx side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyOutcome {
    /// Nothing was written.
    Skipped,
    /// Snippet text for the operator to place themselves.
    Printed(String),
    /// Snippet file written; the operator adds the include.
    SnippetWritten { path: PathBuf, directive: String },
    /// Snippet written, include inserted, nginx reloaded.
    Attached(Attachment),
}

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub record: InstanceRecord,
    pub proxy: ProxyOutcome,
}

/// Install an instance: bundle, data dir, unit, then the nginx action.
///
/// Every operator input is validated before the first write.
///
/// # Errors
///
/// Returns an error if validation fails or any step fails; completed steps
/// stay in place and re-running the install is the recovery.
pub async fn install(
    host: &impl Host,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    chooser: &impl VhostChooser,
    settings: &Settings,
    request: &InstallRequest,
) -> Result<InstallOutcome> {
    let mut record = plan(host, settings, request)?;
    let slug = record.instance.name.clone();

    // Saved before the first host change so an interrupted install can still
    // be found and removed.
    host.save(&record)?;

    reporter.step(&format!("installing bundle into {}...", record.instance.base_directory.display()));
    host.materialize(&request.bundle, &record.instance.base_directory)
        .await
        .with_context(|| format!("installing bundle '{}'", request.bundle))?;
    host.create_dir_all(&record.data_directory)?;
    if let Some(user) = &settings.service.user {
        let owner = format!("{user}:{user}");
        for dir in [&record.instance.base_directory, &record.data_directory] {
            let dir = dir.display().to_string();
            run_checked(runner, "chown", &["-R", &owner, &dir]).await?;
        }
    }

    let unit = unit_name(&slug);
    reporter.step(&format!("activating {unit}..."));
    let content = render_unit(&record.instance, &record.data_directory, &settings.service);
    host.write_atomic(&settings.unit_path(&slug), &content, 0o644)?;
    systemd::activate(runner, settings, &unit).await?;
    reporter.success(&format!("{unit} running on port {}", record.instance.port));

    let proxy = apply_nginx_action(host, runner, reporter, chooser, settings, &mut record).await?;
    host.save(&record)?;
    Ok(InstallOutcome { record, proxy })
}

/// Validate the request and build the registry record, without side effects.
fn plan(
    host: &impl Host,
    settings: &Settings,
    request: &InstallRequest,
) -> Result<InstanceRecord> {
    let slug = InstanceSlug::normalize(&request.name).map_err(InstanceError::from)?;
    let prefix = match request.path_prefix.as_deref() {
        Some(raw) => PathPrefix::normalize(raw).map_err(InstanceError::from)?,
        None => PathPrefix::root(),
    };
    let domain = request
        .domain
        .as_deref()
        .map(|d| {
            let d = d.trim().to_ascii_lowercase();
            if is_valid_domain(&d) {
                Ok(d)
            } else {
                Err(InstanceError::InvalidDomain(d))
            }
        })
        .transpose()?;
    if request.nginx_action == NginxAction::Auto && domain.is_none() {
        return Err(InstanceError::DomainRequired.into());
    }

    let existing = host.load(&slug)?;
    let port = resolve_port(host, settings, request.port, existing.as_ref())?;
    let instance = ManagedInstance::new(
        slug.clone(),
        port,
        settings.instance_dir(&slug),
        prefix,
        request.mount_mode,
    )
    .map_err(InstanceError::from)?;

    Ok(InstanceRecord {
        instance,
        data_directory: settings.data_dir(&slug),
        domain,
        nginx_action: request.nginx_action,
        vhost_path: None,
        installed_at: Utc::now(),
    })
}

/// Explicit ports must be free unless this instance already owns them; with
/// no port, a reinstall keeps its port and a new install gets a free one.
fn resolve_port(
    probe: &impl PortProbe,
    settings: &Settings,
    requested: Option<u32>,
    existing: Option<&InstanceRecord>,
) -> Result<u16> {
    if let Some(raw) = requested {
        let port = validate_port(raw).map_err(InstanceError::from)?;
        let owned = existing.is_some_and(|r| r.instance.port == port);
        if !owned && probe.listening_ports()?.contains(&port) {
            return Err(InstanceError::PortInUse { port }.into());
        }
        return Ok(port);
    }
    if let Some(record) = existing {
        return Ok(record.instance.port);
    }
    let bound = probe.listening_ports()?;
    propose_free_port(&bound, settings.preferred_port)
        .ok_or_else(|| InstanceError::NoFreePort(settings.preferred_port).into())
}

async fn apply_nginx_action(
    host: &impl Host,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    chooser: &impl VhostChooser,
    settings: &Settings,
    record: &mut InstanceRecord,
) -> Result<ProxyOutcome> {
    let instance = &record.instance;
    let text = snippet::generate_with_body_limit(
        instance.port,
        &instance.path_prefix,
        instance.mount_mode,
        &settings.nginx.client_max_body_size,
    );
    let snippet_path = settings.snippet_path(&instance.name);

    match record.nginx_action {
        NginxAction::None => Ok(ProxyOutcome::Skipped),
        NginxAction::Print => Ok(ProxyOutcome::Printed(text)),
        NginxAction::WriteSnippet => {
            write_snippet(host, &snippet_path, &text)?;
            Ok(ProxyOutcome::SnippetWritten {
                directive: include_directive(&snippet_path),
                path: snippet_path,
            })
        }
        NginxAction::Auto => {
            let domain = record
                .domain
                .clone()
                .ok_or(InstanceError::DomainRequired)?;
            write_snippet(host, &snippet_path, &text)?;
            let attachment = vhost::attach(host, chooser, settings, &instance.name, &domain)?;
            proxy::check_and_reload(runner, settings, reporter).await?;
            record.vhost_path = Some(attachment.path.clone());
            Ok(ProxyOutcome::Attached(attachment))
        }
    }
}

fn write_snippet(host: &impl Host, path: &std::path::Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        host.create_dir_all(parent)?;
    }
    host.write_atomic(path, text, 0o644)
}
