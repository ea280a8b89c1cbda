//! Registry persistence — workspace and snapshot records as JSON files.
//!
//! Both registries live under `~/.devbox/` as human-inspectable pretty
//! JSON. Every operation is an unlocked read-modify-write of the whole
//! file: concurrent invocations of the tool can race and lose updates.
//! That gap is a documented constraint on callers, not solved here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::ports::{SnapshotStore, WorkspaceStore};
use crate::domain::snapshot::SnapshotRecord;
use crate::domain::workspace::WorkspaceRecord;

/// Directory under the user's home holding all devbox state.
pub const STATE_DIR: &str = ".devbox";

fn state_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(STATE_DIR))
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading registry file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing registry file {}", path.display()))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value).context("serializing registry")?;
    std::fs::write(path, &content)
        .with_context(|| format!("writing registry file {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", path.display()))?;
    }
    Ok(())
}

// ── Workspace registry ────────────────────────────────────────────────────────

/// On-disk layout of `workspaces.json`: workspace name → record, plus the
/// reserved `_tailscale` key for remote-access credentials. Workspace name
/// validation excludes underscores, so the reserved key can never collide
/// with a record.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkspaceFile {
    #[serde(rename = "_tailscale", default, skip_serializing_if = "Option::is_none")]
    tailscale: Option<TailscaleConfig>,
    #[serde(flatten)]
    workspaces: BTreeMap<String, WorkspaceRecord>,
}

/// Remote-access credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TailscaleConfig {
    auth_key: String,
}

/// Workspace registry backed by `~/.devbox/workspaces.json`.
pub struct WorkspaceRegistry {
    path: PathBuf,
}

impl WorkspaceRegistry {
    /// Create a registry using the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(state_dir()?.join("workspaces.json")))
    }

    /// Create a registry with an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<WorkspaceFile> {
        load_json(&self.path)
    }

    fn store(&self, file: &WorkspaceFile) -> Result<()> {
        save_json(&self.path, file)
    }
}

impl WorkspaceStore for WorkspaceRegistry {
    fn get(&self, name: &str) -> Result<Option<WorkspaceRecord>> {
        Ok(self.load()?.workspaces.get(name).cloned())
    }

    fn save(&self, record: &WorkspaceRecord) -> Result<()> {
        let mut file = self.load()?;
        file.workspaces.insert(record.name.clone(), record.clone());
        self.store(&file)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut file = self.load()?;
        if file.workspaces.remove(name).is_some() {
            self.store(&file)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<WorkspaceRecord>> {
        Ok(self.load()?.workspaces.into_values().collect())
    }

    fn tailscale_key(&self) -> Result<Option<String>> {
        Ok(self.load()?.tailscale.map(|t| t.auth_key))
    }

    fn set_tailscale_key(&self, auth_key: &str) -> Result<()> {
        let mut file = self.load()?;
        file.tailscale = Some(TailscaleConfig {
            auth_key: auth_key.to_string(),
        });
        self.store(&file)
    }

    fn clear_tailscale_key(&self) -> Result<()> {
        let mut file = self.load()?;
        if file.tailscale.take().is_some() {
            self.store(&file)?;
        }
        Ok(())
    }
}

// ── Snapshot registry ─────────────────────────────────────────────────────────

/// Snapshot registry backed by `~/.devbox/snapshots.json` — a plain
/// mapping of snapshot name → record, kept separate from workspace records.
pub struct SnapshotRegistry {
    path: PathBuf,
}

impl SnapshotRegistry {
    /// Create a registry using the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(state_dir()?.join("snapshots.json")))
    }

    /// Create a registry with an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<BTreeMap<String, SnapshotRecord>> {
        load_json(&self.path)
    }
}

impl SnapshotStore for SnapshotRegistry {
    fn get(&self, name: &str) -> Result<Option<SnapshotRecord>> {
        Ok(self.load()?.get(name).cloned())
    }

    fn save(&self, record: &SnapshotRecord) -> Result<()> {
        let mut records = self.load()?;
        records.insert(record.name.clone(), record.clone());
        save_json(&self.path, &records)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut records = self.load()?;
        if records.remove(name).is_some() {
            save_json(&self.path, &records)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<SnapshotRecord>> {
        Ok(self.load()?.into_values().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::domain::container_name;
    use crate::domain::snapshot::snapshot_image_tag;

    fn record(name: &str) -> WorkspaceRecord {
        WorkspaceRecord {
            name: name.to_string(),
            container_name: container_name(name),
            port: 2222,
            template: "base".to_string(),
            created_at: Utc::now(),
            snapshot_source: None,
        }
    }

    fn snapshot(name: &str) -> SnapshotRecord {
        SnapshotRecord {
            name: name.to_string(),
            workspace: "api".to_string(),
            created_at: Utc::now(),
            message: String::new(),
            image_id: "sha256:abc".to_string(),
            image_tag: snapshot_image_tag(name),
            container_state: "running".to_string(),
        }
    }

    fn workspace_registry(dir: &TempDir) -> WorkspaceRegistry {
        WorkspaceRegistry::with_path(dir.path().join("workspaces.json"))
    }

    fn snapshot_registry(dir: &TempDir) -> SnapshotRegistry {
        SnapshotRegistry::with_path(dir.path().join("snapshots.json"))
    }

    #[test]
    fn test_workspace_registry_empty_when_no_file() {
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        assert!(registry.get("api").expect("get").is_none());
        assert!(registry.list().expect("list").is_empty());
    }

    #[test]
    fn test_workspace_registry_save_load_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        registry.save(&record("api")).expect("save");

        let loaded = registry.get("api").expect("get").expect("present");
        assert_eq!(loaded.container_name, "devbox-api");
        assert_eq!(loaded.port, 2222);
    }

    #[test]
    fn test_workspace_registry_remove_then_get_is_none() {
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        registry.save(&record("api")).expect("save");
        registry.remove("api").expect("remove");
        assert!(registry.get("api").expect("get").is_none());
    }

    #[test]
    fn test_workspace_registry_remove_absent_is_noop() {
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        assert!(registry.remove("ghost").is_ok());
    }

    #[test]
    fn test_workspace_registry_corrupt_file_is_error_not_reset() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("workspaces.json");
        std::fs::write(&path, b"not valid json").expect("write");
        let registry = WorkspaceRegistry::with_path(path);
        assert!(registry.list().is_err(), "corrupt registry must surface an error");
    }

    #[test]
    fn test_workspace_registry_reserved_key_is_not_a_workspace() {
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        registry.set_tailscale_key("tskey-secret").expect("set");
        registry.save(&record("api")).expect("save");

        let names: Vec<String> = registry
            .list()
            .expect("list")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["api"], "_tailscale must not appear as a workspace");
        assert_eq!(
            registry.tailscale_key().expect("key").as_deref(),
            Some("tskey-secret")
        );
    }

    #[test]
    fn test_workspace_registry_file_layout_is_name_to_record() {
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        registry.save(&record("api")).expect("save");
        registry.set_tailscale_key("tskey-secret").expect("set");

        let raw = std::fs::read_to_string(dir.path().join("workspaces.json")).expect("read");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("parse");
        assert!(json.get("api").is_some(), "record keyed by name: {raw}");
        assert!(json.get("_tailscale").is_some(), "reserved key present: {raw}");
    }

    #[test]
    fn test_workspace_registry_clear_tailscale_key() {
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        registry.set_tailscale_key("tskey-secret").expect("set");
        registry.clear_tailscale_key().expect("clear");
        assert!(registry.tailscale_key().expect("key").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_registry_files_are_mode_600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().expect("tempdir");
        let registry = workspace_registry(&dir);
        registry.save(&record("api")).expect("save");
        let perms = std::fs::metadata(dir.path().join("workspaces.json"))
            .expect("metadata")
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }

    #[test]
    fn test_snapshot_registry_round_trip_and_remove() {
        let dir = TempDir::new().expect("tempdir");
        let registry = snapshot_registry(&dir);
        registry.save(&snapshot("golden")).expect("save");

        let loaded = registry.get("golden").expect("get").expect("present");
        assert_eq!(loaded.image_tag, "devbox-snapshot:golden");

        registry.remove("golden").expect("remove");
        assert!(registry.get("golden").expect("get").is_none());
    }

    #[test]
    fn test_snapshot_registry_is_separate_from_workspaces() {
        let dir = TempDir::new().expect("tempdir");
        let workspaces = workspace_registry(&dir);
        let snapshots = snapshot_registry(&dir);
        workspaces.save(&record("api")).expect("save ws");
        snapshots.save(&snapshot("golden")).expect("save snap");

        assert!(dir.path().join("workspaces.json").exists());
        assert!(dir.path().join("snapshots.json").exists());
        assert!(workspaces.get("golden").expect("get").is_none());
        assert!(snapshots.get("api").expect("get").is_none());
    }

    #[test]
    fn test_snapshot_registry_save_creates_parent_directory() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("deep").join("snapshots.json");
        let registry = SnapshotRegistry::with_path(nested.clone());
        registry.save(&snapshot("golden")).expect("save");
        assert!(nested.exists());
    }
}
