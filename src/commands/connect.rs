//! `devbox connect [--ssh]` — open the workspace in VS Code or SSH.
//!
//! Reads the registry only; the actual session is handed off to the
//! user's `ssh` or `code` binary with inherited stdio.

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::WorkspaceStore;
use crate::commands::resolve_name;
use crate::domain::error::WorkspaceError;
use crate::domain::workspace::{CONTAINER_USER, HOME_MOUNT};

/// Arguments for the connect command.
#[derive(Args)]
pub struct ConnectArgs {
    /// Workspace name (defaults to the current directory name)
    pub name: Option<String>,

    /// Open a plain SSH session instead of VS Code
    #[arg(long)]
    pub ssh: bool,
}

/// Run `devbox connect`.
///
/// # Errors
///
/// Returns an error if the workspace is not recorded or the client
/// program cannot be spawned.
pub async fn run(args: &ConnectArgs, app: &AppContext) -> Result<()> {
    let name = resolve_name(args.name.as_deref())?;
    let Some(record) = app.workspaces.get(&name)? else {
        return Err(WorkspaceError::NotFound(name).into());
    };

    let ctx = &app.output;
    let port = record.port;
    if args.ssh {
        ctx.info(&format!("Connecting to '{name}' via SSH..."));
        let status = tokio::process::Command::new("ssh")
            .args(["-p", &port.to_string()])
            .arg(format!("{CONTAINER_USER}@localhost"))
            .status()
            .await
            .context("launching ssh")?;
        anyhow::ensure!(status.success(), "ssh exited with {status}");
    } else {
        ctx.info(&format!("Opening '{name}' in VS Code..."));
        let status = tokio::process::Command::new("code")
            .arg("--remote")
            .arg(format!("ssh-remote+{CONTAINER_USER}@localhost:{port}"))
            .arg(HOME_MOUNT)
            .status()
            .await
            .context("launching VS Code (is 'code' on your PATH?)")?;
        anyhow::ensure!(status.success(), "code exited with {status}");
    }
    Ok(())
}
