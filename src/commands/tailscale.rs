//! `devbox tailscale <setup|remove|status>` — remote access configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::application::ports::{ContainerRuntime, WorkspaceStore};
use crate::commands::resolve_name;
use crate::domain::container_name;
use crate::domain::error::{RemoteAccessError, WorkspaceError};
use crate::domain::workspace::CONTAINER_USER;
use crate::infra::docker::DockerRuntime;

/// Tailscale subcommands.
#[derive(Subcommand)]
pub enum TailscaleCommand {
    /// Store the Tailscale auth key used by new workspaces
    Setup(SetupArgs),

    /// Remove the stored Tailscale configuration
    Remove,

    /// Show Tailscale status for a workspace
    Status(StatusArgs),
}

/// Arguments for `tailscale setup`.
#[derive(Args)]
pub struct SetupArgs {
    /// Tailscale auth key (tskey-...)
    pub auth_key: String,
}

/// Arguments for `tailscale status`.
#[derive(Args)]
pub struct StatusArgs {
    /// Workspace name (defaults to the current directory name)
    pub name: Option<String>,
}

/// Run a tailscale subcommand.
///
/// # Errors
///
/// Returns an error if validation fails or the underlying operation fails.
pub async fn run(command: TailscaleCommand, app: &AppContext) -> Result<()> {
    match command {
        TailscaleCommand::Setup(args) => setup(&args, app),
        TailscaleCommand::Remove => remove(app),
        TailscaleCommand::Status(args) => status(&args, app).await,
    }
}

/// Validate a Tailscale auth key before anything is stored.
fn validate_auth_key(key: &str) -> Result<()> {
    if !key.starts_with("tskey-") {
        return Err(RemoteAccessError::InvalidAuthKey.into());
    }
    Ok(())
}

fn setup(args: &SetupArgs, app: &AppContext) -> Result<()> {
    validate_auth_key(&args.auth_key)?;
    app.workspaces.set_tailscale_key(&args.auth_key)?;

    let ctx = &app.output;
    ctx.success("Tailscale configured");
    ctx.kv("Enable per workspace", "devbox up --tailscale");
    Ok(())
}

fn remove(app: &AppContext) -> Result<()> {
    app.workspaces.clear_tailscale_key()?;
    app.output.success("Tailscale configuration removed");
    Ok(())
}

async fn status(args: &StatusArgs, app: &AppContext) -> Result<()> {
    let name = resolve_name(args.name.as_deref())?;
    let runtime = DockerRuntime::connect().await?;

    let container = container_name(&name);
    if runtime.get_container(&container).await?.is_none() {
        return Err(WorkspaceError::NotFound(name).into());
    }

    let ctx = &app.output;
    let probe = runtime
        .exec(&container, &["tailscale", "status", "--json"])
        .await?;
    if probe.exit_code != 0 {
        ctx.warn(&format!("Tailscale is not running in workspace '{name}'"));
        ctx.kv("Enable", "devbox up --tailscale");
        return Ok(());
    }

    let ip_result = runtime.exec(&container, &["tailscale", "ip", "-4"]).await?;
    let ip = if ip_result.exit_code == 0 {
        ip_result.output.trim().to_string()
    } else {
        "N/A".to_string()
    };

    ctx.header(&format!("Tailscale status: {name}"));
    ctx.kv("Status", "connected");
    ctx.kv("Tailscale IP", &ip);
    ctx.kv("SSH", &format!("ssh {CONTAINER_USER}@{ip}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_auth_key_accepts_tskey_prefix() {
        assert!(validate_auth_key("tskey-auth-abc123").is_ok());
    }

    #[test]
    fn test_validate_auth_key_rejects_other_shapes() {
        let err = validate_auth_key("abc123").expect_err("expected Err");
        assert!(err.to_string().contains("tskey-"), "wrong message: {err}");
        assert!(validate_auth_key("").is_err());
        assert!(validate_auth_key("TSKEY-abc").is_err());
    }
}
