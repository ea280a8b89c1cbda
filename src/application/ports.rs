//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::{SnapshotRecord, WorkspaceRecord};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Container status as observed from the daemon.
///
/// Never cached — every operation re-queries the daemon, because daemon
/// state can change outside devbox's control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerStatus {
    /// Parse a daemon status string (`"running"`, `"paused"`, ...).
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// The daemon-side status string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container as reported by the daemon.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Daemon-assigned container id.
    pub id: String,
    /// Container name (without the daemon's leading slash).
    pub name: String,
    /// Current status.
    pub status: ContainerStatus,
    /// Creation timestamp from the daemon's own record.
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating and starting a workspace container.
///
/// Containers are always created with port 22/tcp bound to `host_ssh_port`,
/// the volume mounted read-write, and the `unless-stopped` restart policy.
pub struct ContainerSpec<'a> {
    /// Image reference to run.
    pub image: &'a str,
    /// Container name (`devbox-<workspace>`).
    pub name: &'a str,
    /// Host-side port bound to the container's SSH port.
    pub host_ssh_port: u16,
    /// Environment variables.
    pub env: Vec<(String, String)>,
    /// Named volume for persistent storage.
    pub volume_name: &'a str,
    /// Mount point of the volume inside the container.
    pub volume_mount: &'a str,
    /// CPU quota in daemon units (100000 = 1 CPU), if limited.
    pub cpu_quota: Option<i64>,
    /// Memory limit in bytes, if limited.
    pub memory_bytes: Option<i64>,
    /// Extra Linux capabilities to grant.
    pub add_capabilities: Vec<&'static str>,
    /// Host devices to map into the container (same path on both sides).
    pub add_devices: Vec<&'static str>,
}

/// An image as reported by the daemon.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Daemon-assigned image id.
    pub id: String,
    /// Image size in bytes.
    pub size_bytes: u64,
}

/// Outcome of an image removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRemoval {
    /// The image was removed.
    Removed,
    /// The image was already gone (idempotent success).
    NotFound,
}

/// Captured output of a command executed inside a container.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Process exit code, or -1 when the daemon did not report one.
    pub exit_code: i64,
    /// Combined stdout/stderr output.
    pub output: String,
}

/// Point-in-time resource counters for a running container.
#[derive(Debug, Clone, Copy)]
pub struct ContainerMetrics {
    /// CPU usage as a percentage of one host CPU times online CPUs.
    pub cpu_percent: f64,
    /// Memory usage in bytes.
    pub memory_usage: u64,
    /// Memory limit in bytes.
    pub memory_limit: u64,
}

/// Lazily-produced log lines; possibly infinite when following.
///
/// The caller drives the stream and decides when to stop (e.g. on Ctrl-C).
/// Producing the stream performs no mutations, so cancellation is always safe.
pub type LogStream = futures_util::stream::BoxStream<'static, Result<String>>;

// ── Container Runtime Gateway ─────────────────────────────────────────────────

/// The gateway to the external container daemon.
///
/// A thin synchronous facade over the daemon API. The daemon is the only
/// place a workspace is "real"; the registry is the only place it is
/// "known". Implementations map the daemon's not-found responses to `None`
/// or [`ImageRemoval::NotFound`] and every other rejection to a typed
/// [`crate::domain::DaemonError`].
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// Look up a container by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon cannot be queried.
    async fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>>;

    /// List all containers (running or not) whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon cannot be queried.
    async fn list_containers(&self, prefix: &str) -> Result<Vec<ContainerInfo>>;

    /// Create and start a container, then re-inspect it.
    ///
    /// Returns the daemon's view of the running container so callers can
    /// persist daemon-confirmed state (creation timestamp in particular).
    ///
    /// # Errors
    ///
    /// Returns an error if creation or start is rejected (including name
    /// conflicts — uniqueness is daemon-enforced).
    async fn run_container(&self, spec: &ContainerSpec<'_>) -> Result<ContainerInfo>;

    /// Start a stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the operation.
    async fn start_container(&self, name: &str) -> Result<()>;

    /// Stop a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the operation.
    async fn stop_container(&self, name: &str) -> Result<()>;

    /// Pause a running container, preserving process state.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the operation.
    async fn pause_container(&self, name: &str) -> Result<()>;

    /// Unpause a paused container.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the operation.
    async fn unpause_container(&self, name: &str) -> Result<()>;

    /// Remove a stopped container. Volumes are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the operation.
    async fn remove_container(&self, name: &str) -> Result<()>;

    /// Commit a container's filesystem state to a new image `repo:tag`,
    /// carrying `message` as the image comment.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit is rejected or the committed image
    /// cannot be resolved afterwards.
    async fn commit_container(
        &self,
        name: &str,
        repo: &str,
        tag: &str,
        message: &str,
    ) -> Result<ImageInfo>;

    /// Execute a command inside a running container and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the exec cannot be created or started.
    async fn exec(&self, name: &str, command: &[&str]) -> Result<ExecResult>;

    /// Fetch point-in-time resource counters for a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon cannot produce stats.
    async fn stats(&self, name: &str) -> Result<ContainerMetrics>;

    /// Stream log lines from a container.
    ///
    /// With `follow`, the stream is unbounded until cancelled by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the log stream cannot be opened.
    async fn logs(&self, name: &str, tail: Option<u32>, follow: bool) -> Result<LogStream>;

    /// Look up an image by reference (tag or id).
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon cannot be queried.
    async fn get_image(&self, reference: &str) -> Result<Option<ImageInfo>>;

    /// Pull an image, reporting incremental progress through `reporter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails.
    async fn pull_image(&self, reference: &str, reporter: &dyn ProgressReporter) -> Result<()>;

    /// Remove an image. Already-gone is reported, not raised.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the removal for any other
    /// reason (e.g. the image is in use).
    async fn remove_image(&self, reference: &str, force: bool) -> Result<ImageRemoval>;

    /// Look up a named volume, returning its name when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon cannot be queried.
    async fn get_volume(&self, name: &str) -> Result<Option<String>>;

    /// Create a named volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the creation.
    async fn create_volume(&self, name: &str) -> Result<()>;
}

// ── Registry Ports ────────────────────────────────────────────────────────────

/// Durable workspace records plus the reserved remote-access credential.
///
/// Read-modify-write with no locking; concurrent invocations of the tool can
/// race and lose updates (documented constraint on callers).
pub trait WorkspaceStore {
    /// Load a workspace record by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or parsed.
    fn get(&self, name: &str) -> Result<Option<WorkspaceRecord>>;

    /// Persist a workspace record, replacing any existing entry of the same
    /// name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn save(&self, record: &WorkspaceRecord) -> Result<()>;

    /// Remove a workspace record. Removing an absent record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn remove(&self, name: &str) -> Result<()>;

    /// All workspace records, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or parsed.
    fn list(&self) -> Result<Vec<WorkspaceRecord>>;

    /// The stored remote-access auth key, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or parsed.
    fn tailscale_key(&self) -> Result<Option<String>>;

    /// Store the remote-access auth key under the reserved registry key.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn set_tailscale_key(&self, auth_key: &str) -> Result<()>;

    /// Clear the stored remote-access auth key.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn clear_tailscale_key(&self) -> Result<()>;
}

/// Durable snapshot records, stored separately from workspace records.
pub trait SnapshotStore {
    /// Load a snapshot record by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or parsed.
    fn get(&self, name: &str) -> Result<Option<SnapshotRecord>>;

    /// Persist a snapshot record.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn save(&self, record: &SnapshotRecord) -> Result<()>;

    /// Remove a snapshot record. Removing an absent record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn remove(&self, name: &str) -> Result<()>;

    /// All snapshot records, in registry order.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or parsed.
    fn list(&self) -> Result<Vec<SnapshotRecord>>;
}

// ── SSH Key Port ──────────────────────────────────────────────────────────────

/// Resolves the local SSH public key used for the container's login path.
#[allow(async_fn_in_trait)]
pub trait SshKeys {
    /// Return the user's SSH public key, generating a fresh keypair as a
    /// one-time bootstrap when none is discoverable.
    ///
    /// Deterministic given the same local key-store state.
    ///
    /// # Errors
    ///
    /// Returns an error if no key exists and one cannot be generated.
    async fn ensure_public_key(&self) -> Result<String>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync and object-safe — the gateway
/// streams pull progress through `&dyn ProgressReporter`.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_status_parse_round_trips() {
        for status in [
            ContainerStatus::Created,
            ContainerStatus::Running,
            ContainerStatus::Paused,
            ContainerStatus::Restarting,
            ContainerStatus::Removing,
            ContainerStatus::Exited,
            ContainerStatus::Dead,
        ] {
            assert_eq!(ContainerStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_container_status_parse_unknown() {
        assert_eq!(ContainerStatus::parse("warp-speed"), ContainerStatus::Unknown);
        assert_eq!(ContainerStatus::parse(""), ContainerStatus::Unknown);
    }

    #[test]
    fn test_container_status_display_matches_daemon_strings() {
        assert_eq!(ContainerStatus::Running.to_string(), "running");
        assert_eq!(ContainerStatus::Paused.to_string(), "paused");
    }
}
