//! `devbox snapshot <create|list|restore|delete>` — snapshot management.

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::application::ports::{ContainerRuntime, SnapshotStore};
use crate::application::services::snapshots::{self as service, ImageCleanup};
use crate::domain::error::SnapshotError;
use crate::domain::workspace::CONTAINER_USER;
use crate::domain::{SnapshotListing, validate_workspace_name};
use crate::infra::docker::DockerRuntime;
use crate::output::progress;

/// Snapshot subcommands.
#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// Capture a snapshot of a workspace
    Create(CreateArgs),

    /// List snapshots
    List(ListArgs),

    /// Restore a snapshot as a new workspace
    Restore(RestoreArgs),

    /// Delete a snapshot
    Delete(DeleteArgs),
}

/// Arguments for `snapshot create`.
#[derive(Args)]
pub struct CreateArgs {
    /// Workspace to snapshot
    pub workspace: String,

    /// Snapshot name (defaults to <workspace>-<timestamp>)
    #[arg(long)]
    pub name: Option<String>,

    /// Description attached to the snapshot
    #[arg(short, long, default_value = "")]
    pub message: String,
}

/// Arguments for `snapshot list`.
#[derive(Args)]
pub struct ListArgs {
    /// Only show snapshots of this workspace
    #[arg(long)]
    pub workspace: Option<String>,
}

/// Arguments for `snapshot restore`.
#[derive(Args)]
pub struct RestoreArgs {
    /// Snapshot to restore
    pub snapshot: String,

    /// Name for the restored workspace (defaults to <source>-restored)
    #[arg(long)]
    pub workspace: Option<String>,

    /// Host SSH port for the restored workspace
    #[arg(short, long, default_value_t = 2222)]
    pub port: u16,
}

/// Arguments for `snapshot delete`.
#[derive(Args)]
pub struct DeleteArgs {
    /// Snapshot to delete
    pub snapshot: String,

    /// Delete without confirmation
    #[arg(short, long)]
    pub force: bool,
}

/// Run a snapshot subcommand.
///
/// # Errors
///
/// Returns an error if the underlying operation fails.
pub async fn run(command: SnapshotCommand, app: &AppContext) -> Result<()> {
    match command {
        SnapshotCommand::Create(args) => create(&args, app).await,
        SnapshotCommand::List(args) => list(&args, app).await,
        SnapshotCommand::Restore(args) => restore(&args, app).await,
        SnapshotCommand::Delete(args) => delete(&args, app).await,
    }
}

async fn create(args: &CreateArgs, app: &AppContext) -> Result<()> {
    validate_workspace_name(&args.workspace)?;
    let runtime = DockerRuntime::connect().await?;

    let ctx = &app.output;
    let spinner = ctx
        .show_progress()
        .then(|| progress::spinner(&format!("Creating snapshot of '{}'...", args.workspace)));

    let result = service::create(
        &runtime,
        &app.snapshots,
        &args.workspace,
        args.name.as_deref(),
        &args.message,
        Utc::now(),
    )
    .await;

    let record = match result {
        Ok(record) => {
            if let Some(pb) = &spinner {
                progress::finish_ok(pb, &format!("Snapshot '{}' created", record.name));
            } else {
                ctx.success(&format!("Snapshot '{}' created", record.name));
            }
            record
        }
        Err(err) => {
            if let Some(pb) = &spinner {
                progress::finish_error(pb, "Snapshot failed");
            }
            return Err(err);
        }
    };

    if let Some(image) = runtime.get_image(&record.image_tag).await? {
        ctx.kv("Size", &format!("{:.1} MB", mib(image.size_bytes)));
    }
    ctx.kv("Image", &record.image_tag);
    ctx.kv("Restore", &format!("devbox snapshot restore {}", record.name));
    Ok(())
}

async fn list(args: &ListArgs, app: &AppContext) -> Result<()> {
    let runtime = DockerRuntime::connect().await?;
    let listings = service::list(&runtime, &app.snapshots, args.workspace.as_deref()).await?;

    let ctx = &app.output;
    if listings.is_empty() {
        ctx.info("No snapshots found");
        ctx.kv("Create one", "devbox snapshot create <workspace>");
        return Ok(());
    }

    ctx.header("Snapshots");
    if !ctx.quiet {
        println!(
            "  {:<32} {:<16} {:<17} {:>10}  {:<8} {}",
            "NAME", "WORKSPACE", "CREATED", "SIZE", "IMAGE", "MESSAGE"
        );
        for listing in &listings {
            println!("  {}", render_row(listing));
        }
    }
    Ok(())
}

fn render_row(listing: &SnapshotListing) -> String {
    let record = &listing.record;
    let image = if listing.exists { "ok" } else { "missing" };
    let created = record.created_at.format("%Y-%m-%d %H:%M").to_string();
    let size = format!("{:.1} MB", mib(listing.size_bytes));
    format!(
        "{:<32} {:<16} {:<17} {:>10}  {:<8} {}",
        record.name,
        record.workspace,
        created,
        size,
        image,
        truncate(&record.message, 40),
    )
}

async fn restore(args: &RestoreArgs, app: &AppContext) -> Result<()> {
    let runtime = DockerRuntime::connect().await?;

    let ctx = &app.output;
    let spinner = ctx
        .show_progress()
        .then(|| progress::spinner(&format!("Restoring snapshot '{}'...", args.snapshot)));

    let result = service::restore(
        &runtime,
        &app.workspaces,
        &app.snapshots,
        &args.snapshot,
        args.workspace.as_deref(),
        args.port,
    )
    .await;

    match result {
        Ok(record) => {
            if let Some(pb) = &spinner {
                progress::finish_ok(pb, &format!("Workspace '{}' restored", record.name));
            } else {
                ctx.success(&format!("Workspace '{}' restored", record.name));
            }
            ctx.kv(
                "SSH",
                &format!("ssh -p {} {CONTAINER_USER}@localhost", record.port),
            );
            Ok(())
        }
        Err(err) => {
            if let Some(pb) = &spinner {
                progress::finish_error(pb, "Restore failed");
            }
            Err(err)
        }
    }
}

async fn delete(args: &DeleteArgs, app: &AppContext) -> Result<()> {
    let runtime = DockerRuntime::connect().await?;
    if app.snapshots.get(&args.snapshot)?.is_none() {
        return Err(SnapshotError::NotFound(args.snapshot.clone()).into());
    }

    let ctx = &app.output;
    if !args.force
        && !app.confirm(&format!("Delete snapshot '{}'?", args.snapshot), false)?
    {
        ctx.info("Cancelled");
        return Ok(());
    }

    let cleanup = service::delete(&runtime, &app.snapshots, &args.snapshot).await?;
    match cleanup {
        ImageCleanup::Removed => ctx.success("Snapshot image removed"),
        ImageCleanup::AlreadyGone => ctx.warn("Snapshot image was already removed"),
        ImageCleanup::Failed(reason) => {
            ctx.warn(&format!("Could not remove snapshot image: {reason}"));
        }
    }
    ctx.success(&format!("Snapshot '{}' deleted", args.snapshot));
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mib(bytes: u64) -> f64 {
    bytes as f64 / f64::from(1024 * 1024)
}

/// Display-only truncation; stored messages are never shortened.
fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        message.to_string()
    } else {
        let head: String = message.chars().take(max).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_shortens_only_for_display() {
        assert_eq!(truncate("short", 40), "short");
        let long = "x".repeat(60);
        let shown = truncate(&long, 40);
        assert_eq!(shown.chars().count(), 43);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn test_mib_converts_bytes() {
        assert!((mib(42 * 1024 * 1024) - 42.0).abs() < f64::EPSILON);
    }
}
