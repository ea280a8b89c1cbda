//! Workspace domain types and pure validation functions.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! All functions take data in and return data out.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::WorkspaceError;

/// Prefix shared by every container devbox manages.
pub const CONTAINER_PREFIX: &str = "devbox-";

/// Suffix of the persistent home volume derived from the workspace name.
pub const VOLUME_SUFFIX: &str = "-storage";

/// Mount point of the persistent volume inside the container.
pub const HOME_MOUNT: &str = "/home/developer";

/// User account inside workspace containers.
pub const CONTAINER_USER: &str = "developer";

/// SSH port inside workspace containers.
pub const CONTAINER_SSH_PORT: u16 = 22;

/// Quota units the daemon uses for one full CPU.
const CPU_QUOTA_PERIOD: f64 = 100_000.0;

/// Workspace record persisted to `~/.devbox/workspaces.json`.
///
/// Holds only configuration fixed at creation time. Live state (status,
/// resource usage) is never stored; it is re-fetched from the daemon on
/// every read because daemon state can change outside devbox's control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Workspace name (unique key, stable for the workspace's lifetime).
    pub name: String,
    /// Derived container name (`devbox-<name>`).
    pub container_name: String,
    /// Host-side SSH port bound at creation. Immutable once the container
    /// exists; changing it requires recreation.
    pub port: u16,
    /// Template the workspace was created from, or `"snapshot"` when restored.
    pub template: String,
    /// Creation timestamp as reported by the daemon, not the client clock.
    pub created_at: DateTime<Utc>,
    /// Snapshot this workspace was restored from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_source: Option<String>,
}

/// Derive the container name for a workspace.
#[must_use]
pub fn container_name(workspace: &str) -> String {
    format!("{CONTAINER_PREFIX}{workspace}")
}

/// Derive the persistent volume name for a workspace.
#[must_use]
pub fn volume_name(workspace: &str) -> String {
    format!("{CONTAINER_PREFIX}{workspace}{VOLUME_SUFFIX}")
}

/// Recover the workspace name from a managed container name.
///
/// Returns `None` for containers devbox does not manage.
#[must_use]
pub fn workspace_name_from_container(container: &str) -> Option<&str> {
    container.strip_prefix(CONTAINER_PREFIX)
}

/// Validates a workspace name.
///
/// A valid name is 1-63 characters of lowercase alphanumerics and hyphens,
/// starting and ending with an alphanumeric. This alphabet also guarantees a
/// name can never collide with the registry's reserved `_tailscale` key.
///
/// # Errors
///
/// Returns an error if the name doesn't match the expected format.
pub fn validate_workspace_name(name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return Err(WorkspaceError::InvalidName(name.to_string()).into());
    }
    let interior_ok = bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    let ends_ok = bytes[0] != b'-' && bytes[bytes.len() - 1] != b'-';
    if !interior_ok || !ends_ok {
        return Err(WorkspaceError::InvalidName(name.to_string()).into());
    }
    Ok(())
}

/// Convert a fractional CPU count (e.g. `"4"`, `"1.5"`) to daemon quota units.
///
/// # Errors
///
/// Returns an error if the value is not a positive finite number.
#[allow(clippy::cast_possible_truncation)]
pub fn cpu_quota(cpus: &str) -> Result<i64> {
    let parsed: f64 = cpus
        .trim()
        .parse()
        .map_err(|_| WorkspaceError::InvalidCpuLimit(cpus.to_string()))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(WorkspaceError::InvalidCpuLimit(cpus.to_string()).into());
    }
    let quota = (parsed * CPU_QUOTA_PERIOD) as i64;
    Ok(quota)
}

/// Parse a memory limit string (`"8g"`, `"512m"`, `"1024"`) into bytes.
///
/// Accepts an optional single-letter suffix `b`/`k`/`m`/`g`, case-insensitive.
/// A bare number is taken as bytes.
///
/// # Errors
///
/// Returns an error if the string is empty, non-numeric, or carries an
/// unknown suffix.
pub fn parse_memory_limit(limit: &str) -> Result<i64> {
    let trimmed = limit.trim();
    let invalid = || WorkspaceError::InvalidMemoryLimit(limit.to_string());

    let (digits, multiplier) = match trimmed.chars().last() {
        Some(c) if c.is_ascii_digit() => (trimmed, 1i64),
        Some(c) => {
            let head = &trimmed[..trimmed.len() - c.len_utf8()];
            let mult = match c.to_ascii_lowercase() {
                'b' => 1,
                'k' => 1024,
                'm' => 1024 * 1024,
                'g' => 1024 * 1024 * 1024,
                _ => return Err(invalid().into()),
            };
            (head, mult)
        }
        None => return Err(invalid().into()),
    };

    let value: i64 = digits.parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Err(invalid().into());
    }
    value.checked_mul(multiplier).map_or_else(|| Err(invalid().into()), Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_applies_prefix() {
        assert_eq!(container_name("api"), "devbox-api");
    }

    #[test]
    fn test_volume_name_applies_prefix_and_suffix() {
        assert_eq!(volume_name("api"), "devbox-api-storage");
    }

    #[test]
    fn test_workspace_name_from_container_round_trips() {
        assert_eq!(workspace_name_from_container("devbox-api"), Some("api"));
        assert_eq!(workspace_name_from_container("other-api"), None);
    }

    #[test]
    fn test_validate_workspace_name_accepts_typical_names() {
        assert!(validate_workspace_name("api").is_ok());
        assert!(validate_workspace_name("my-project-2").is_ok());
        assert!(validate_workspace_name("x").is_ok());
    }

    #[test]
    fn test_validate_workspace_name_rejects_bad_names() {
        assert!(validate_workspace_name("").is_err());
        assert!(validate_workspace_name("My-Project").is_err());
        assert!(validate_workspace_name("under_score").is_err());
        assert!(validate_workspace_name("-leading").is_err());
        assert!(validate_workspace_name("trailing-").is_err());
        assert!(validate_workspace_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_workspace_name_rejects_reserved_key_shape() {
        // The registry stores remote-access config under "_tailscale";
        // the name alphabet must make that key unreachable.
        assert!(validate_workspace_name("_tailscale").is_err());
    }

    #[test]
    fn test_cpu_quota_whole_and_fractional() {
        assert_eq!(cpu_quota("4").expect("quota"), 400_000);
        assert_eq!(cpu_quota("1.5").expect("quota"), 150_000);
        assert_eq!(cpu_quota("0.5").expect("quota"), 50_000);
    }

    #[test]
    fn test_cpu_quota_rejects_non_positive_and_garbage() {
        assert!(cpu_quota("0").is_err());
        assert!(cpu_quota("-1").is_err());
        assert!(cpu_quota("lots").is_err());
        assert!(cpu_quota("inf").is_err());
    }

    #[test]
    fn test_parse_memory_limit_suffixes() {
        assert_eq!(parse_memory_limit("1024").expect("bytes"), 1024);
        assert_eq!(parse_memory_limit("512b").expect("bytes"), 512);
        assert_eq!(parse_memory_limit("4k").expect("bytes"), 4096);
        assert_eq!(parse_memory_limit("8m").expect("bytes"), 8 * 1024 * 1024);
        assert_eq!(parse_memory_limit("8g").expect("bytes"), 8 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit("8G").expect("bytes"), 8 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_memory_limit_rejects_malformed() {
        assert!(parse_memory_limit("").is_err());
        assert!(parse_memory_limit("8t").is_err());
        assert!(parse_memory_limit("g").is_err());
        assert!(parse_memory_limit("-8g").is_err());
        assert!(parse_memory_limit("0").is_err());
    }

    #[test]
    fn test_workspace_record_serde_round_trip() {
        let record = WorkspaceRecord {
            name: "api".to_string(),
            container_name: container_name("api"),
            port: 2222,
            template: "base".to_string(),
            created_at: Utc::now(),
            snapshot_source: None,
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(
            !json.contains("snapshot_source"),
            "absent lineage must not serialize: {json}"
        );
        let back: WorkspaceRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.name, "api");
        assert_eq!(back.port, 2222);
        assert!(back.snapshot_source.is_none());
    }
}
