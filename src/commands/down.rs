//! `devbox down [--remove]` — pause or remove a workspace.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::lifecycle::{self, DownOutcome};
use crate::commands::resolve_name;
use crate::infra::docker::DockerRuntime;

/// Arguments for the down command.
#[derive(Args)]
pub struct DownArgs {
    /// Workspace name (defaults to the current directory name)
    pub name: Option<String>,

    /// Remove the container entirely instead of pausing
    #[arg(short, long)]
    pub remove: bool,
}

/// Run `devbox down`.
///
/// # Errors
///
/// Returns an error if the workspace does not exist or the daemon rejects
/// the operation.
pub async fn run(args: &DownArgs, app: &AppContext) -> Result<()> {
    let name = resolve_name(args.name.as_deref())?;
    let runtime = DockerRuntime::connect().await?;

    let outcome = lifecycle::down(&runtime, &app.workspaces, &name, args.remove).await?;

    let ctx = &app.output;
    match outcome {
        DownOutcome::Paused => {
            ctx.success(&format!("Workspace '{name}' paused (saving resources)"));
            ctx.kv("Resume", &format!("devbox up --name {name}"));
        }
        DownOutcome::Removed => {
            ctx.success(&format!("Workspace '{name}' removed"));
        }
    }
    Ok(())
}
