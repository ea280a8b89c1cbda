//! Workspace lifecycle: idempotent create-or-resume and pause-or-remove.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Every operation re-queries the daemon first, reconciles against what it
//! finds, and writes to the registry only after the daemon has confirmed
//! the corresponding state change.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{
    ContainerRuntime, ContainerSpec, ContainerStatus, ProgressReporter, SshKeys, WorkspaceStore,
};
use crate::domain::error::{RemoteAccessError, WorkspaceError};
use crate::domain::workspace::{self, WorkspaceRecord};
use crate::domain::{container_name, image_for_template, volume_name};

/// Attempts made to observe a Tailscale IP after creation.
const TAILSCALE_IP_ATTEMPTS: u32 = 10;
/// Delay between Tailscale IP attempts.
const TAILSCALE_IP_INTERVAL: Duration = Duration::from_secs(1);

/// Parameters for `up`. Limits are pre-validated by the command layer.
pub struct UpRequest<'a> {
    /// Workspace name (already validated).
    pub name: &'a str,
    /// Host-side SSH port.
    pub port: u16,
    /// CPU quota in daemon units.
    pub cpu_quota: i64,
    /// Memory limit in bytes.
    pub memory_bytes: i64,
    /// Template id.
    pub template: &'a str,
    /// Whether to enable Tailscale remote access.
    pub tailscale: bool,
}

/// Outcome of `up`.
#[derive(Debug)]
pub enum UpOutcome {
    /// The container already exists and is running — nothing was done.
    AlreadyRunning,
    /// The container was paused and has been unpaused. Configuration
    /// changes are not applied to existing containers.
    Resumed,
    /// The container existed stopped and has been started.
    Restarted,
    /// A new workspace was created.
    Created {
        record: WorkspaceRecord,
        /// Tailscale IP, when remote access was requested and observed
        /// within the polling bound.
        tailscale_ip: Option<String>,
    },
}

/// Outcome of `down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownOutcome {
    /// The container was paused; process state and volume are preserved.
    Paused,
    /// The container and its registry record were removed.
    Removed,
}

/// Bring a workspace up: resume it when a container exists, create it
/// otherwise.
///
/// # Errors
///
/// Returns an error if the daemon rejects an operation, the SSH key cannot
/// be resolved, Tailscale is requested without a configured auth key, or
/// the registry cannot be written.
pub async fn up(
    runtime: &impl ContainerRuntime,
    store: &impl WorkspaceStore,
    ssh: &impl SshKeys,
    reporter: &impl ProgressReporter,
    req: &UpRequest<'_>,
) -> Result<UpOutcome> {
    let container = container_name(req.name);

    if let Some(existing) = runtime.get_container(&container).await? {
        return match existing.status {
            ContainerStatus::Running => Ok(UpOutcome::AlreadyRunning),
            ContainerStatus::Paused => {
                runtime
                    .unpause_container(&container)
                    .await
                    .with_context(|| format!("resuming workspace '{}'", req.name))?;
                Ok(UpOutcome::Resumed)
            }
            _ => {
                runtime
                    .start_container(&container)
                    .await
                    .with_context(|| format!("starting workspace '{}'", req.name))?;
                Ok(UpOutcome::Restarted)
            }
        };
    }

    create_workspace(runtime, store, ssh, reporter, req, &container).await
}

async fn create_workspace(
    runtime: &impl ContainerRuntime,
    store: &impl WorkspaceStore,
    ssh: &impl SshKeys,
    reporter: &impl ProgressReporter,
    req: &UpRequest<'_>,
    container: &str,
) -> Result<UpOutcome> {
    let ssh_key = ssh
        .ensure_public_key()
        .await
        .context("resolving SSH public key")?;

    let mut env = vec![("SSH_PUBLIC_KEY".to_string(), ssh_key)];
    let mut add_capabilities = Vec::new();
    let mut add_devices = Vec::new();
    if req.tailscale {
        let auth_key = store
            .tailscale_key()?
            .ok_or(RemoteAccessError::KeyNotConfigured)?;
        env.push(("TAILSCALE_AUTH_KEY".to_string(), auth_key));
        env.push(("TAILSCALE_HOSTNAME".to_string(), container.to_string()));
        add_capabilities = vec!["NET_ADMIN", "SYS_MODULE"];
        add_devices = vec!["/dev/net/tun"];
    }

    let image = image_for_template(req.template);
    ensure_image(runtime, reporter, image).await?;

    let volume = volume_name(req.name);
    ensure_volume(runtime, &volume).await?;

    reporter.step(&format!("creating workspace '{}'...", req.name));
    let info = runtime
        .run_container(&ContainerSpec {
            image,
            name: container,
            host_ssh_port: req.port,
            env,
            volume_name: &volume,
            volume_mount: workspace::HOME_MOUNT,
            cpu_quota: Some(req.cpu_quota),
            memory_bytes: Some(req.memory_bytes),
            add_capabilities,
            add_devices,
        })
        .await
        .with_context(|| format!("creating workspace '{}'", req.name))?;

    // Daemon has confirmed the container is running; now it is safe to record
    // it, using the daemon's own creation timestamp.
    let record = WorkspaceRecord {
        name: req.name.to_string(),
        container_name: container.to_string(),
        port: req.port,
        template: req.template.to_string(),
        created_at: info.created_at,
        snapshot_source: None,
    };
    store
        .save(&record)
        .with_context(|| format!("recording workspace '{}'", req.name))?;

    let tailscale_ip = if req.tailscale {
        poll_tailscale_ip(runtime, reporter, container).await
    } else {
        None
    };

    Ok(UpOutcome::Created {
        record,
        tailscale_ip,
    })
}

/// Pause a workspace, or stop and remove it entirely with `remove`.
///
/// The registry record is deleted last, only after the daemon removal
/// succeeded — a failed removal must not lose the record.
///
/// # Errors
///
/// Returns [`WorkspaceError::NotFound`] when no container exists, or an
/// error if the daemon rejects an operation.
pub async fn down(
    runtime: &impl ContainerRuntime,
    store: &impl WorkspaceStore,
    name: &str,
    remove: bool,
) -> Result<DownOutcome> {
    let container = container_name(name);
    if runtime.get_container(&container).await?.is_none() {
        return Err(WorkspaceError::NotFound(name.to_string()).into());
    }

    if remove {
        runtime
            .stop_container(&container)
            .await
            .with_context(|| format!("stopping workspace '{name}'"))?;
        runtime
            .remove_container(&container)
            .await
            .with_context(|| format!("removing workspace '{name}'"))?;
        store
            .remove(name)
            .with_context(|| format!("removing record for workspace '{name}'"))?;
        Ok(DownOutcome::Removed)
    } else {
        runtime
            .pause_container(&container)
            .await
            .with_context(|| format!("pausing workspace '{name}'"))?;
        Ok(DownOutcome::Paused)
    }
}

/// Ensure an image is present locally, pulling it when missing.
///
/// # Errors
///
/// Returns an error if the daemon cannot be queried or the pull fails.
pub(crate) async fn ensure_image(
    runtime: &impl ContainerRuntime,
    reporter: &impl ProgressReporter,
    image: &str,
) -> Result<()> {
    if runtime.get_image(image).await?.is_some() {
        return Ok(());
    }
    reporter.step(&format!("pulling image {image}..."));
    runtime
        .pull_image(image, reporter)
        .await
        .with_context(|| format!("pulling image {image}"))?;
    reporter.success(&format!("image {image} ready"));
    Ok(())
}

/// Get-or-create a named volume.
///
/// # Errors
///
/// Returns an error if the daemon cannot be queried or the creation fails.
pub(crate) async fn ensure_volume(runtime: &impl ContainerRuntime, volume: &str) -> Result<()> {
    if runtime.get_volume(volume).await?.is_some() {
        return Ok(());
    }
    runtime
        .create_volume(volume)
        .await
        .with_context(|| format!("creating volume {volume}"))
}

/// Bounded wait for the workspace to join the tailnet.
///
/// Creation has already succeeded when this runs; not observing an IP within
/// the bound is a soft warning, never a failure.
async fn poll_tailscale_ip(
    runtime: &impl ContainerRuntime,
    reporter: &impl ProgressReporter,
    container: &str,
) -> Option<String> {
    reporter.step("waiting for Tailscale to connect...");
    for attempt in 0..TAILSCALE_IP_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(TAILSCALE_IP_INTERVAL).await;
        }
        if let Ok(result) = runtime.exec(container, &["tailscale", "ip", "-4"]).await
            && result.exit_code == 0
        {
            let ip = result.output.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }
    reporter.warn("Tailscale IP not available yet; check later with 'devbox tailscale status'");
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{
        FakeRuntime, FakeWorkspaceStore, ReporterStub, running_workspace,
    };
    use crate::application::ports::ExecResult;

    fn request(name: &str) -> UpRequest<'_> {
        UpRequest {
            name,
            port: 2222,
            cpu_quota: 400_000,
            memory_bytes: 8 * 1024 * 1024 * 1024,
            template: "base",
            tailscale: false,
        }
    }

    #[tokio::test]
    async fn up_creates_container_volume_and_record() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();

        let outcome = up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("up");

        let UpOutcome::Created { record, tailscale_ip } = outcome else {
            panic!("expected Created");
        };
        assert_eq!(record.name, "api");
        assert_eq!(record.container_name, "devbox-api");
        assert_eq!(record.template, "base");
        assert!(record.snapshot_source.is_none());
        assert!(tailscale_ip.is_none());

        assert_eq!(runtime.container_count(), 1);
        assert!(runtime.has_volume("devbox-api-storage"));
        let stored = store.get("api").expect("get").expect("record stored");
        assert_eq!(stored.port, 2222);
    }

    #[tokio::test]
    async fn up_records_daemon_creation_timestamp_not_client_clock() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();

        up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("up");

        let stored = store.get("api").expect("get").expect("record");
        let info = runtime
            .get_container("devbox-api")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(
            stored.created_at, info.created_at,
            "record must carry the daemon-reported creation time"
        );
        assert_ne!(
            stored.created_at,
            FakeRuntime::daemon_timestamp(0),
            "daemon clock must have advanced for this container"
        );
    }

    #[tokio::test]
    async fn up_is_idempotent_second_call_is_noop() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();

        let first = up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("first up");
        assert!(matches!(first, UpOutcome::Created { .. }));

        let second = up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("second up");
        assert!(matches!(second, UpOutcome::AlreadyRunning));
        assert_eq!(runtime.container_count(), 1, "no second container");
    }

    #[tokio::test]
    async fn up_pulls_missing_image_exactly_once() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();

        up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("up");
        assert_eq!(runtime.pull_count(), 1);

        // Second workspace from the same template: image already present.
        up(&runtime, &store, &runtime, &ReporterStub, &request("web"))
            .await
            .expect("up");
        assert_eq!(runtime.pull_count(), 1, "image must not be pulled again");
    }

    #[tokio::test]
    async fn up_unpauses_paused_container_without_reconfiguring() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        running_workspace(&runtime, &store, "api");
        runtime.pause_container("devbox-api").await.expect("pause");

        let mut changed = request("api");
        changed.port = 4444; // must be ignored for existing containers
        let outcome = up(&runtime, &store, &runtime, &ReporterStub, &changed)
            .await
            .expect("up");

        assert!(matches!(outcome, UpOutcome::Resumed));
        let info = runtime
            .get_container("devbox-api")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(info.status, ContainerStatus::Running);
        assert_eq!(
            store.get("api").expect("get").expect("record").port,
            2222,
            "record must be unchanged"
        );
    }

    #[tokio::test]
    async fn up_starts_stopped_container() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        running_workspace(&runtime, &store, "api");
        runtime.stop_container("devbox-api").await.expect("stop");

        let outcome = up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("up");

        assert!(matches!(outcome, UpOutcome::Restarted));
        let info = runtime
            .get_container("devbox-api")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(info.status, ContainerStatus::Running);
    }

    #[tokio::test]
    async fn up_with_tailscale_requires_configured_key() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        let mut req = request("api");
        req.tailscale = true;

        let err = up(&runtime, &store, &runtime, &ReporterStub, &req)
            .await
            .expect_err("expected Err");
        assert!(
            err.to_string().contains("devbox tailscale setup"),
            "guidance missing: {err}"
        );
        assert_eq!(runtime.container_count(), 0, "no daemon mutation on validation failure");
    }

    #[tokio::test]
    async fn up_with_tailscale_sets_env_caps_and_reports_ip() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        store.set_tailscale_key("tskey-abc123").expect("set key");
        runtime.set_exec_response(ExecResult {
            exit_code: 0,
            output: "100.64.0.7\n".to_string(),
        });
        let mut req = request("api");
        req.tailscale = true;

        let outcome = up(&runtime, &store, &runtime, &ReporterStub, &req)
            .await
            .expect("up");
        let UpOutcome::Created { tailscale_ip, .. } = outcome else {
            panic!("expected Created");
        };
        assert_eq!(tailscale_ip.as_deref(), Some("100.64.0.7"));

        let spec = runtime.last_spec().expect("spec recorded");
        assert!(spec.env.iter().any(|(k, v)| k == "TAILSCALE_AUTH_KEY" && v == "tskey-abc123"));
        assert!(
            spec.env
                .iter()
                .any(|(k, v)| k == "TAILSCALE_HOSTNAME" && v == "devbox-api")
        );
        assert!(spec.add_capabilities.contains(&"NET_ADMIN".to_string()));
        assert!(spec.add_devices.contains(&"/dev/net/tun".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn up_with_tailscale_missing_ip_is_soft_warning() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        store.set_tailscale_key("tskey-abc123").expect("set key");
        // Default exec response fails, so the poll exhausts its bound.
        let mut req = request("api");
        req.tailscale = true;

        let outcome = up(&runtime, &store, &runtime, &ReporterStub, &req)
            .await
            .expect("up must still succeed");
        let UpOutcome::Created { tailscale_ip, .. } = outcome else {
            panic!("expected Created");
        };
        assert!(tailscale_ip.is_none());
        assert!(store.get("api").expect("get").is_some(), "record persisted regardless");
    }

    #[tokio::test]
    async fn down_pauses_by_default_and_keeps_record_and_volume() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        running_workspace(&runtime, &store, "api");
        runtime.write_volume_file("devbox-api-storage", "notes.txt", "keep me");

        let outcome = down(&runtime, &store, "api", false).await.expect("down");

        assert_eq!(outcome, DownOutcome::Paused);
        let info = runtime
            .get_container("devbox-api")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(info.status, ContainerStatus::Paused);
        assert!(store.get("api").expect("get").is_some(), "record preserved");
        assert_eq!(
            runtime.read_volume_file("devbox-api-storage", "notes.txt").as_deref(),
            Some("keep me"),
            "pause must not touch the volume"
        );
    }

    #[tokio::test]
    async fn down_remove_deletes_container_and_record() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        running_workspace(&runtime, &store, "api");

        let outcome = down(&runtime, &store, "api", true).await.expect("down");

        assert_eq!(outcome, DownOutcome::Removed);
        assert!(runtime.get_container("devbox-api").await.expect("get").is_none());
        assert!(store.get("api").expect("get").is_none(), "record removed");
    }

    #[tokio::test]
    async fn down_remove_keeps_record_when_daemon_removal_fails() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        running_workspace(&runtime, &store, "api");
        runtime.fail_remove_container();

        let err = down(&runtime, &store, "api", true).await.expect_err("expected Err");
        assert!(err.to_string().contains("removing workspace"), "context missing: {err}");
        assert!(
            store.get("api").expect("get").is_some(),
            "record must survive a failed daemon removal"
        );
    }

    #[tokio::test]
    async fn down_missing_workspace_is_actionable_error() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();

        let err = down(&runtime, &store, "ghost", false).await.expect_err("expected Err");
        let msg = err.to_string();
        assert!(msg.contains("Workspace 'ghost' not found"), "wrong message: {msg}");
        assert!(msg.contains("devbox list"), "guidance missing: {msg}");
    }

    #[tokio::test]
    async fn pause_resume_round_trip_preserves_volume_contents() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        running_workspace(&runtime, &store, "api");
        runtime.write_volume_file("devbox-api-storage", "state.db", "v1");

        down(&runtime, &store, "api", false).await.expect("down");
        let outcome = up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("up");

        assert!(matches!(outcome, UpOutcome::Resumed));
        assert_eq!(
            runtime.read_volume_file("devbox-api-storage", "state.db").as_deref(),
            Some("v1")
        );
    }

    #[tokio::test]
    async fn remove_is_terminal_next_up_goes_through_full_creation() {
        let runtime = FakeRuntime::new();
        let store = FakeWorkspaceStore::new();
        running_workspace(&runtime, &store, "api");

        down(&runtime, &store, "api", true).await.expect("down");
        let outcome = up(&runtime, &store, &runtime, &ReporterStub, &request("api"))
            .await
            .expect("up");

        assert!(
            matches!(outcome, UpOutcome::Created { .. }),
            "up after remove must create, not resume"
        );
    }
}
