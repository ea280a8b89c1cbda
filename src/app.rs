//! Application context — unified state passed to every command handler.
//!
//! `AppContext` bundles the output context and the two registries so
//! adding a cross-cutting concern requires only one field change here —
//! zero command signatures change. The daemon gateway is deliberately not
//! constructed here: commands that never touch the daemon (templates,
//! version, tailscale setup) must not require one.

use anyhow::Result;

use crate::infra::registry::{SnapshotRegistry, WorkspaceRegistry};
use crate::output::{OutputContext, TerminalReporter};

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Workspace registry (`~/.devbox/workspaces.json`).
    pub workspaces: WorkspaceRegistry,
    /// Snapshot registry (`~/.devbox/snapshots.json`).
    pub snapshots: SnapshotRegistry,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when the `CI` or `DEVBOX_YES` environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new(no_color: bool, quiet: bool) -> Result<Self> {
        let non_interactive = std::env::var("CI").is_ok() || std::env::var("DEVBOX_YES").is_ok();
        Ok(Self {
            output: OutputContext::new(no_color, quiet),
            workspaces: WorkspaceRegistry::new()?,
            snapshots: SnapshotRegistry::new()?,
            non_interactive,
        })
    }

    /// Progress reporter bound to this context's output.
    #[must_use]
    pub fn terminal_reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI or `DEVBOX_YES` env), returns
    /// `default` immediately without prompting.
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
}
