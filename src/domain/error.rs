//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Workspace errors ──────────────────────────────────────────────────────────

/// Errors related to workspace lifecycle and identity.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(
        "Workspace '{0}' not found.\n\
         \n\
         Try:\n\
         \x20 devbox list              - see all workspaces\n\
         \x20 devbox up --name {0}     - create it"
    )]
    NotFound(String),

    #[error("Invalid workspace name '{0}': must match ^[a-z0-9]([a-z0-9-]{{0,61}}[a-z0-9])?$")]
    InvalidName(String),

    #[error("Invalid CPU limit '{0}': expected a positive number of CPUs, e.g. \"4\" or \"1.5\"")]
    InvalidCpuLimit(String),

    #[error("Invalid memory limit '{0}': expected <number>[b|k|m|g], e.g. \"8g\"")]
    InvalidMemoryLimit(String),
}

// ── Snapshot errors ───────────────────────────────────────────────────────────

/// Errors related to snapshot capture and restore.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(
        "Snapshot '{0}' not found.\n\
         \n\
         List existing snapshots with: devbox snapshot list"
    )]
    NotFound(String),

    #[error(
        "Snapshot '{0}' already exists.\n\
         \n\
         Pick another name, or delete it first: devbox snapshot delete {0}"
    )]
    AlreadyExists(String),

    #[error(
        "Backing image for snapshot '{name}' is missing ({tag}).\n\
         The image may have been removed outside devbox.\n\
         \n\
         Clear the stale record with: devbox snapshot delete {name}"
    )]
    ImageMissing { name: String, tag: String },
}

// ── Daemon errors ─────────────────────────────────────────────────────────────

/// Errors raised by the container daemon gateway.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(
        "Cannot reach the container daemon: {0}\n\
         \n\
         Is Docker running? Start it and retry."
    )]
    Unavailable(String),

    #[error("Container daemon rejected the operation: {0}")]
    Api(String),
}

// ── Remote access errors ──────────────────────────────────────────────────────

/// Errors related to remote-access (Tailscale) configuration.
#[derive(Debug, Error)]
pub enum RemoteAccessError {
    #[error(
        "Invalid auth key: must start with 'tskey-'.\n\
         Get one at: https://login.tailscale.com/admin/settings/keys"
    )]
    InvalidAuthKey,

    #[error(
        "Tailscale is enabled but no auth key is configured.\n\
         Configure one with: devbox tailscale setup <auth-key>"
    )]
    KeyNotConfigured,
}
