//! Snapshot domain types and naming rules.
//!
//! Pure data module; the commit/restore orchestration lives in
//! `application::services::snapshots`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image repository all snapshot commits are tagged under.
pub const SNAPSHOT_REPO: &str = "devbox-snapshot";

/// Author recorded on committed snapshot images.
pub const SNAPSHOT_AUTHOR: &str = "DevBox CLI";

/// Template value recorded on workspaces restored from a snapshot.
pub const RESTORED_TEMPLATE: &str = "snapshot";

/// Suffix of the default workspace name used by restore.
pub const RESTORED_SUFFIX: &str = "-restored";

/// Snapshot record persisted to `~/.devbox/snapshots.json`.
///
/// `exists` and size are deliberately not stored: the backing image can be
/// removed outside devbox at any time, so liveness is recomputed on every
/// listing ([`SnapshotListing`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Snapshot name (unique key).
    pub name: String,
    /// Source workspace name at capture time. Not a live reference — the
    /// workspace may have been deleted since.
    pub workspace: String,
    /// Capture timestamp (client clock; this is metadata on the action).
    pub created_at: DateTime<Utc>,
    /// Free-text annotation. Truncated for display only, never in storage.
    #[serde(default)]
    pub message: String,
    /// Identifier of the committed image.
    pub image_id: String,
    /// Unique image tag (`devbox-snapshot:<name>`).
    pub image_tag: String,
    /// Source container status observed at commit time (diagnostic only).
    pub container_state: String,
}

/// A snapshot record joined with daemon-side liveness, as produced by
/// `snapshot list`.
#[derive(Debug, Clone)]
pub struct SnapshotListing {
    pub record: SnapshotRecord,
    /// Whether the backing image is still present in the daemon.
    pub exists: bool,
    /// Size of the backing image, or 0 when it is gone.
    pub size_bytes: u64,
}

/// Generate the default snapshot name for a workspace.
///
/// Second-level granularity; two captures within the same second collide,
/// which the create path reports as an error rather than overwriting.
#[must_use]
pub fn default_snapshot_name(workspace: &str, now: DateTime<Utc>) -> String {
    format!("{workspace}-{}", now.format("%Y%m%d-%H%M%S"))
}

/// Derive the image tag for a snapshot name.
#[must_use]
pub fn snapshot_image_tag(snapshot: &str) -> String {
    format!("{SNAPSHOT_REPO}:{snapshot}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_snapshot_name_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 6, 14, 30, 5).single().expect("timestamp");
        assert_eq!(default_snapshot_name("api", at), "api-20260806-143005");
    }

    #[test]
    fn test_default_snapshot_name_differs_across_seconds() {
        let first = Utc.with_ymd_and_hms(2026, 8, 6, 14, 30, 5).single().expect("timestamp");
        let second = first + chrono::Duration::seconds(1);
        assert_ne!(
            default_snapshot_name("api", first),
            default_snapshot_name("api", second)
        );
    }

    #[test]
    fn test_snapshot_image_tag_uses_shared_repo() {
        assert_eq!(
            snapshot_image_tag("api-20260806-143005"),
            "devbox-snapshot:api-20260806-143005"
        );
    }

    #[test]
    fn test_snapshot_record_serde_round_trip() {
        let record = SnapshotRecord {
            name: "api-20260806-143005".to_string(),
            workspace: "api".to_string(),
            created_at: Utc::now(),
            message: "before refactor".to_string(),
            image_id: "sha256:abc123".to_string(),
            image_tag: snapshot_image_tag("api-20260806-143005"),
            container_state: "running".to_string(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let back: SnapshotRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.name, record.name);
        assert_eq!(back.workspace, "api");
        assert_eq!(back.image_tag, "devbox-snapshot:api-20260806-143005");
    }

    #[test]
    fn test_snapshot_record_message_defaults_empty() {
        let json = r#"{
            "name": "api-20260806-143005",
            "workspace": "api",
            "created_at": "2026-08-06T14:30:05Z",
            "image_id": "sha256:abc123",
            "image_tag": "devbox-snapshot:api-20260806-143005",
            "container_state": "running"
        }"#;
        let record: SnapshotRecord = serde_json::from_str(json).expect("deserialize");
        assert_eq!(record.message, "");
    }
}
