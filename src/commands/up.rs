//! `devbox up` — create or resume a development workspace.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::lifecycle::{self, UpOutcome, UpRequest};
use crate::commands::resolve_name;
use crate::domain::workspace::{CONTAINER_USER, HOME_MOUNT};
use crate::domain::{cpu_quota, parse_memory_limit, validate_workspace_name};
use crate::infra::docker::DockerRuntime;
use crate::infra::ssh::LocalSshKeys;
use crate::output::OutputContext;

/// Arguments for the up command.
#[derive(Args)]
pub struct UpArgs {
    /// Workspace name (defaults to the current directory name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Host SSH port
    #[arg(short, long, default_value_t = 2222)]
    pub port: u16,

    /// CPU limit (fractional CPUs, e.g. "4" or "1.5")
    #[arg(long, default_value = "4")]
    pub cpu: String,

    /// Memory limit (e.g. "8g", "512m")
    #[arg(short, long, default_value = "8g")]
    pub memory: String,

    /// Workspace template (see 'devbox templates')
    #[arg(short, long, default_value = "base")]
    pub template: String,

    /// Enable Tailscale remote access
    #[arg(long)]
    pub tailscale: bool,
}

/// Run `devbox up`.
///
/// # Errors
///
/// Returns an error if validation fails, the daemon is unreachable, or
/// creation is rejected.
pub async fn run(args: &UpArgs, app: &AppContext) -> Result<()> {
    let name = resolve_name(args.name.as_deref())?;
    validate_workspace_name(&name)?;
    let cpu_quota = cpu_quota(&args.cpu)?;
    let memory_bytes = parse_memory_limit(&args.memory)?;

    let runtime = DockerRuntime::connect().await?;
    let ssh = LocalSshKeys::new()?;
    let reporter = app.terminal_reporter();

    let outcome = lifecycle::up(
        &runtime,
        &app.workspaces,
        &ssh,
        &reporter,
        &UpRequest {
            name: &name,
            port: args.port,
            cpu_quota,
            memory_bytes,
            template: &args.template,
            tailscale: args.tailscale,
        },
    )
    .await?;

    let ctx = &app.output;
    match outcome {
        UpOutcome::AlreadyRunning => {
            ctx.warn(&format!("Workspace '{name}' is already running"));
        }
        UpOutcome::Resumed => {
            ctx.success(&format!("Workspace '{name}' resumed"));
        }
        UpOutcome::Restarted => {
            ctx.success(&format!("Workspace '{name}' started"));
        }
        UpOutcome::Created {
            record,
            tailscale_ip,
        } => {
            ctx.success(&format!("Workspace '{name}' created"));
            if let Some(ip) = tailscale_ip {
                ctx.success("Tailscale connected");
                ctx.kv("Remote SSH", &format!("ssh {CONTAINER_USER}@{ip}"));
            }
            print_connect_hints(ctx, &name, record.port);
        }
    }
    Ok(())
}

fn print_connect_hints(ctx: &OutputContext, name: &str, port: u16) {
    ctx.kv("SSH", &format!("ssh -p {port} {CONTAINER_USER}@localhost"));
    ctx.kv(
        "VS Code",
        &format!("code --remote ssh-remote+{CONTAINER_USER}@localhost:{port} {HOME_MOUNT}"),
    );
    ctx.kv("Connect", &format!("devbox connect {name}"));
}
