//! Human-readable terminal renderer.

use jmaka_common::{InstanceRecord, MountMode, NginxAction};
use owo_colors::OwoColorize as _;

use crate::domain::nginx::Candidate;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the registered instances, one block each.
    pub fn render_instances(&self, records: &[InstanceRecord]) {
        if records.is_empty() {
            self.ctx.info("No instances installed.");
            self.ctx.info("Install one: jmakactl install --name <NAME> --bundle <SRC>");
            return;
        }
        for (i, record) in records.iter().enumerate() {
            if i > 0 && !self.ctx.quiet {
                println!();
            }
            let instance = &record.instance;
            self.ctx.header(instance.name.as_str());
            self.ctx.kv("port:     ", &instance.port.to_string());
            self.ctx.kv("prefix:   ", &format!(
                "{} ({})",
                instance.path_prefix,
                mount_mode_display(instance.mount_mode)
            ));
            self.ctx.kv("app:      ", &instance.base_directory.display().to_string());
            self.ctx.kv("data:     ", &record.data_directory.display().to_string());
            self.ctx.kv("domain:   ", record.domain.as_deref().unwrap_or("-"));
            self.ctx.kv("nginx:    ", nginx_action_display(record.nginx_action));
            if let Some(vhost) = &record.vhost_path {
                self.ctx.kv("vhost:    ", &vhost.display().to_string());
            }
            self.ctx.kv(
                "installed:",
                &record.installed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
        }
    }

    /// Render ranked vhost candidates, best first.
    pub fn render_candidates(&self, domain: &str, candidates: &[Candidate]) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header(&format!("Vhost files declaring {domain}:"));
        for (i, candidate) in candidates.iter().enumerate() {
            let marker = if i == 0 {
                format!("{}", "→".style(self.ctx.styles.success))
            } else {
                " ".to_string()
            };
            println!(
                "  {marker} {}  {}",
                candidate.path.display(),
                score_display(candidate.score).style(self.ctx.styles.dim)
            );
        }
    }
}

fn score_display(score: u8) -> &'static str {
    match score {
        2 => "(443 ssl)",
        1 => "(443)",
        _ => "(plain)",
    }
}

fn mount_mode_display(mode: MountMode) -> &'static str {
    match mode {
        MountMode::BasePath => "base-path",
        MountMode::StripPrefix => "strip-prefix",
    }
}

fn nginx_action_display(action: NginxAction) -> &'static str {
    match action {
        NginxAction::None => "none",
        NginxAction::Auto => "auto",
        NginxAction::Print => "print",
        NginxAction::WriteSnippet => "write-snippet",
    }
}
