//! Application context: the state passed to every command handler.
//!
//! `AppContext` bundles the loaded settings, the output context and the
//! production port implementations.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::VhostChooser;
use crate::domain::config::Settings;
use crate::domain::nginx::Candidate;
use crate::infra::LocalHost;
use crate::infra::command_runner::TokioCommandRunner;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `JMAKACTL_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
///
/// Constructed once in `Cli::run()` and passed as `&AppContext` to all
/// command handlers.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Settings loaded at startup; threaded into every service call.
    pub settings: Settings,
    /// Host filesystem, registry, archives and kernel tables.
    pub host: LocalHost,
    /// External process execution.
    pub runner: TokioCommandRunner,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `JMAKACTL_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags and loaded settings.
    #[must_use]
    pub fn new(flags: &AppFlags, settings: Settings) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("JMAKACTL_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        // Progress lines would corrupt JSON on stdout.
        let quiet = flags.output.quiet || flags.output.json;
        let output = OutputContext::new(flags.output.no_color, quiet);
        let host = LocalHost::new(&settings).quiet(!output.show_progress());
        let runner = TokioCommandRunner::new(settings.command_timeout_secs.map(Duration::from_secs));

        Self {
            output,
            mode,
            settings,
            host,
            runner,
            non_interactive,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter for application services.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `JMAKACTL_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    /// Ask the user to type a confirmation token; `None` in
    /// non-interactive mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails.
    pub fn typed_token(&self, prompt: &str) -> Result<Option<String>> {
        if self.non_interactive {
            return Ok(None);
        }
        let typed: String = dialoguer::Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(Some(typed))
    }
}

impl VhostChooser for AppContext {
    fn choose_vhost(&self, domain: &str, candidates: &[Candidate]) -> Result<usize> {
        if self.non_interactive {
            return Ok(0);
        }
        let items: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} (score {})", c.path.display(), c.score))
            .collect();
        let choice = dialoguer::Select::new()
            .with_prompt(format!("Which vhost serves {domain}?"))
            .items(&items)
            .default(0)
            .interact()?;
        Ok(choice)
    }
}
