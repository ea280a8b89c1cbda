//! Snapshot capture, listing, restore, and deletion.
//!
//! Commit-based snapshotting over the container runtime, with its own
//! metadata namespace in the registry. Metadata is written only after the
//! daemon operation it describes has succeeded; the gap between a
//! successful commit and the metadata write can leave an orphan image,
//! which is an accepted, detectable inconsistency (surfaced by `list`, not
//! prevented).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::application::ports::{
    ContainerRuntime, ContainerSpec, ImageRemoval, SnapshotStore, WorkspaceStore,
};
use crate::application::services::lifecycle::ensure_volume;
use crate::domain::error::{SnapshotError, WorkspaceError};
use crate::domain::snapshot::{
    RESTORED_SUFFIX, RESTORED_TEMPLATE, SNAPSHOT_REPO, SnapshotListing, SnapshotRecord,
    default_snapshot_name, snapshot_image_tag,
};
use crate::domain::workspace::{self, WorkspaceRecord};
use crate::domain::{container_name, validate_workspace_name, volume_name};

/// Outcome of the image-removal half of `delete`.
///
/// Metadata removal proceeds regardless — a dangling image with no record
/// is preferable to a record that can never be cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCleanup {
    /// The backing image was removed.
    Removed,
    /// The backing image was already gone (idempotent).
    AlreadyGone,
    /// The daemon refused the removal; carried as a warning.
    Failed(String),
}

/// Capture a snapshot of a workspace's container filesystem.
///
/// The snapshot name defaults to `<workspace>-<timestamp>` at second
/// granularity; a collision with an existing record is an error, never an
/// overwrite.
///
/// # Errors
///
/// Returns [`WorkspaceError::NotFound`] when the workspace has no
/// container, [`SnapshotError::AlreadyExists`] on a name collision, or an
/// error if the commit or the metadata write fails.
pub async fn create(
    runtime: &impl ContainerRuntime,
    snapshots: &impl SnapshotStore,
    workspace: &str,
    snapshot_name: Option<&str>,
    message: &str,
    now: DateTime<Utc>,
) -> Result<SnapshotRecord> {
    let container = container_name(workspace);
    let Some(info) = runtime.get_container(&container).await? else {
        return Err(WorkspaceError::NotFound(workspace.to_string()).into());
    };

    let name = snapshot_name.map_or_else(|| default_snapshot_name(workspace, now), str::to_string);
    if snapshots.get(&name)?.is_some() {
        return Err(SnapshotError::AlreadyExists(name).into());
    }

    let image = runtime
        .commit_container(&container, SNAPSHOT_REPO, &name, message)
        .await
        .with_context(|| format!("committing snapshot '{name}'"))?;

    // Commit confirmed; record the snapshot. A crash before this write
    // leaves an orphan image with no record — detectable, not prevented.
    let record = SnapshotRecord {
        name: name.clone(),
        workspace: workspace.to_string(),
        created_at: now,
        message: message.to_string(),
        image_id: image.id,
        image_tag: snapshot_image_tag(&name),
        container_state: info.status.to_string(),
    };
    snapshots
        .save(&record)
        .with_context(|| format!("recording snapshot '{name}'"))?;
    Ok(record)
}

/// List snapshots with daemon-side liveness, newest first.
///
/// Records whose backing image is gone are still returned, marked
/// `exists=false` with a zero size — dangling records must remain visible
/// so the user can clean them up.
///
/// # Errors
///
/// Returns an error if the registry cannot be read or the daemon cannot be
/// queried.
pub async fn list(
    runtime: &impl ContainerRuntime,
    snapshots: &impl SnapshotStore,
    workspace_filter: Option<&str>,
) -> Result<Vec<SnapshotListing>> {
    let mut listings = Vec::new();
    for record in snapshots.list()? {
        if workspace_filter.is_some_and(|w| w != record.workspace) {
            continue;
        }
        let image = runtime.get_image(&record.image_tag).await?;
        listings.push(SnapshotListing {
            exists: image.is_some(),
            size_bytes: image.map_or(0, |i| i.size_bytes),
            record,
        });
    }
    listings.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
    Ok(listings)
}

/// Restore a snapshot as a new workspace.
///
/// The new workspace always gets a fresh volume — the image already
/// contains the filesystem state at commit time, and reusing the source
/// workspace's volume would mix stale and snapshotted data. The container
/// runs directly from the snapshot image, bypassing template resolution.
///
/// # Errors
///
/// Returns [`SnapshotError::NotFound`] when no record exists,
/// [`SnapshotError::ImageMissing`] when the record exists but its image is
/// gone (a distinct failure with different guidance), or an error if the
/// daemon rejects the creation — including a name conflict with an
/// existing workspace, which is deliberately left to the daemon's own
/// uniqueness enforcement.
pub async fn restore(
    runtime: &impl ContainerRuntime,
    workspaces: &impl WorkspaceStore,
    snapshots: &impl SnapshotStore,
    snapshot_name: &str,
    new_workspace: Option<&str>,
    port: u16,
) -> Result<WorkspaceRecord> {
    let Some(record) = snapshots.get(snapshot_name)? else {
        return Err(SnapshotError::NotFound(snapshot_name.to_string()).into());
    };
    if runtime.get_image(&record.image_tag).await?.is_none() {
        return Err(SnapshotError::ImageMissing {
            name: snapshot_name.to_string(),
            tag: record.image_tag.clone(),
        }
        .into());
    }

    let workspace = new_workspace.map_or_else(
        || format!("{}{RESTORED_SUFFIX}", record.workspace),
        str::to_string,
    );
    validate_workspace_name(&workspace)?;

    let container = container_name(&workspace);
    let volume = volume_name(&workspace);
    ensure_volume(runtime, &volume).await?;

    let info = runtime
        .run_container(&ContainerSpec {
            image: &record.image_tag,
            name: &container,
            host_ssh_port: port,
            env: Vec::new(),
            volume_name: &volume,
            volume_mount: workspace::HOME_MOUNT,
            cpu_quota: None,
            memory_bytes: None,
            add_capabilities: Vec::new(),
            add_devices: Vec::new(),
        })
        .await
        .with_context(|| {
            format!("restoring snapshot '{snapshot_name}' as workspace '{workspace}'")
        })?;

    let ws_record = WorkspaceRecord {
        name: workspace.clone(),
        container_name: container,
        port,
        template: RESTORED_TEMPLATE.to_string(),
        created_at: info.created_at,
        snapshot_source: Some(snapshot_name.to_string()),
    };
    workspaces
        .save(&ws_record)
        .with_context(|| format!("recording restored workspace '{workspace}'"))?;
    Ok(ws_record)
}

/// Delete a snapshot: remove the backing image, then the record.
///
/// Callers are responsible for obtaining confirmation before invoking this;
/// nothing here prompts. Image removal failures are reported, not raised —
/// the record is removed last, regardless.
///
/// # Errors
///
/// Returns [`SnapshotError::NotFound`] when no record exists, or an error
/// if the record itself cannot be removed.
pub async fn delete(
    runtime: &impl ContainerRuntime,
    snapshots: &impl SnapshotStore,
    snapshot_name: &str,
) -> Result<ImageCleanup> {
    let Some(record) = snapshots.get(snapshot_name)? else {
        return Err(SnapshotError::NotFound(snapshot_name.to_string()).into());
    };

    let cleanup = match runtime.remove_image(&record.image_tag, true).await {
        Ok(ImageRemoval::Removed) => ImageCleanup::Removed,
        Ok(ImageRemoval::NotFound) => ImageCleanup::AlreadyGone,
        Err(err) => ImageCleanup::Failed(format!("{err:#}")),
    };

    snapshots
        .remove(snapshot_name)
        .with_context(|| format!("removing record for snapshot '{snapshot_name}'"))?;
    Ok(cleanup)
}
