//! `devbox status` — live resource usage for a workspace.
//!
//! Everything shown here is re-fetched from the daemon; nothing is cached
//! or persisted.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ContainerRuntime;
use crate::commands::resolve_name;
use crate::domain::container_name;
use crate::domain::error::WorkspaceError;
use crate::infra::docker::DockerRuntime;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Workspace name (defaults to the current directory name)
    pub name: Option<String>,
}

/// Run `devbox status`.
///
/// # Errors
///
/// Returns an error if the workspace does not exist or the daemon cannot
/// produce stats.
pub async fn run(args: &StatusArgs, app: &AppContext) -> Result<()> {
    let name = resolve_name(args.name.as_deref())?;
    let runtime = DockerRuntime::connect().await?;

    let container = container_name(&name);
    let Some(info) = runtime.get_container(&container).await? else {
        return Err(WorkspaceError::NotFound(name).into());
    };
    let metrics = runtime.stats(&container).await?;

    let ctx = &app.output;
    ctx.header(&format!("Workspace: {name}"));
    ctx.kv("Status", info.status.as_str());
    ctx.kv("Container ID", short_id(&info.id));
    ctx.kv("CPU", &format!("{:.1}%", metrics.cpu_percent));
    ctx.kv(
        "Memory",
        &format!(
            "{:.2}GB / {:.2}GB ({:.1}%)",
            gib(metrics.memory_usage),
            gib(metrics.memory_limit),
            memory_percent(metrics.memory_usage, metrics.memory_limit),
        ),
    );
    ctx.kv("Created", &info.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    Ok(())
}

fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    &id[..id.len().min(12)]
}

#[allow(clippy::cast_precision_loss)]
fn gib(bytes: u64) -> f64 {
    bytes as f64 / f64::from(1024 * 1024 * 1024)
}

#[allow(clippy::cast_precision_loss)]
fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        usage as f64 / limit as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_truncates_to_12() {
        assert_eq!(short_id("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_short_id_strips_digest_prefix() {
        assert_eq!(short_id("sha256:0123456789abcdef0123"), "0123456789ab");
    }

    #[test]
    fn test_gib_converts_bytes() {
        assert!((gib(8 * 1024 * 1024 * 1024) - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_memory_percent_handles_zero_limit() {
        assert!(memory_percent(100, 0).abs() < f64::EPSILON);
        assert!((memory_percent(1, 2) - 50.0).abs() < f64::EPSILON);
    }
}
