//! `devbox logs [--follow] [--tail N]` — workspace logs.
//!
//! Follow mode streams lazily until Ctrl-C. Log reading performs no
//! mutations, so interrupting it leaves nothing half-created.

use anyhow::Result;
use clap::Args;
use futures_util::StreamExt;

use crate::app::AppContext;
use crate::application::ports::ContainerRuntime;
use crate::commands::resolve_name;
use crate::domain::container_name;
use crate::domain::error::WorkspaceError;
use crate::infra::docker::DockerRuntime;

/// Arguments for the logs command.
#[derive(Args)]
pub struct LogsArgs {
    /// Workspace name (defaults to the current directory name)
    pub name: Option<String>,

    /// Follow log output until interrupted
    #[arg(short, long)]
    pub follow: bool,

    /// Number of trailing lines to show
    #[arg(long, default_value_t = 100)]
    pub tail: u32,
}

/// Run `devbox logs`.
///
/// # Errors
///
/// Returns an error if the workspace does not exist or the log stream
/// fails.
pub async fn run(args: &LogsArgs, app: &AppContext) -> Result<()> {
    let name = resolve_name(args.name.as_deref())?;
    let runtime = DockerRuntime::connect().await?;

    let container = container_name(&name);
    if runtime.get_container(&container).await?.is_none() {
        return Err(WorkspaceError::NotFound(name).into());
    }

    let mut stream = runtime
        .logs(&container, Some(args.tail), args.follow)
        .await?;

    let ctx = &app.output;
    if args.follow {
        ctx.info(&format!("Following logs for '{name}' (Ctrl-C to stop)"));
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                chunk = stream.next() => match chunk {
                    Some(line) => print!("{}", line?),
                    None => break,
                },
            }
        }
    } else {
        ctx.info(&format!("Last {} lines of '{name}':", args.tail));
        while let Some(line) = stream.next().await {
            print!("{}", line?);
        }
    }
    Ok(())
}
