//! Shared test doubles for service tests.
//!
//! `FakeRuntime` models the daemon's container/image/volume state
//! transitions in memory, including the filesystem contents that commit
//! and restore carry between containers and images, so lifecycle and
//! snapshot round-trip properties can be asserted without a real daemon.

#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)] // helpers are shared across service test modules

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt as _;

use crate::application::ports::{
    ContainerInfo, ContainerMetrics, ContainerRuntime, ContainerSpec, ContainerStatus, ExecResult,
    ImageInfo, ImageRemoval, LogStream, ProgressReporter, SnapshotStore, SshKeys, WorkspaceStore,
};
use crate::domain::error::DaemonError;
use crate::domain::snapshot::SnapshotRecord;
use crate::domain::workspace::WorkspaceRecord;
use crate::domain::{container_name, volume_name};

/// Owned copy of the last `ContainerSpec` passed to `run_container`.
#[derive(Debug, Clone)]
pub struct RecordedSpec {
    pub image: String,
    pub name: String,
    pub host_ssh_port: u16,
    pub env: Vec<(String, String)>,
    pub volume_name: String,
    pub cpu_quota: Option<i64>,
    pub memory_bytes: Option<i64>,
    pub add_capabilities: Vec<String>,
    pub add_devices: Vec<String>,
}

struct FakeContainer {
    info: ContainerInfo,
    files: BTreeMap<String, String>,
}

struct FakeImage {
    info: ImageInfo,
    files: BTreeMap<String, String>,
}

/// In-memory daemon double. Single-threaded, like the tests that use it.
pub struct FakeRuntime {
    containers: RefCell<HashMap<String, FakeContainer>>,
    images: RefCell<HashMap<String, FakeImage>>,
    volumes: RefCell<HashMap<String, BTreeMap<String, String>>>,
    pulls: Cell<u32>,
    sequence: Cell<i64>,
    fail_remove_container: Cell<bool>,
    fail_remove_image: Cell<bool>,
    exec_response: RefCell<Option<ExecResult>>,
    last_spec: RefCell<Option<RecordedSpec>>,
    log_lines: RefCell<Vec<String>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            containers: RefCell::new(HashMap::new()),
            images: RefCell::new(HashMap::new()),
            volumes: RefCell::new(HashMap::new()),
            pulls: Cell::new(0),
            sequence: Cell::new(0),
            fail_remove_container: Cell::new(false),
            fail_remove_image: Cell::new(false),
            exec_response: RefCell::new(None),
            last_spec: RefCell::new(None),
            log_lines: RefCell::new(Vec::new()),
        }
    }

    /// The fixed daemon clock: creation timestamp of the nth resource.
    /// Deliberately far from `Utc::now()` so tests can tell daemon-reported
    /// time apart from the client clock.
    pub fn daemon_timestamp(sequence: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("timestamp")
            + chrono::Duration::seconds(sequence)
    }

    fn next_sequence(&self) -> i64 {
        let next = self.sequence.get() + 1;
        self.sequence.set(next);
        next
    }

    pub fn container_count(&self) -> usize {
        self.containers.borrow().len()
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.borrow().contains_key(name)
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.images.borrow().contains_key(reference)
    }

    pub fn drop_image(&self, reference: &str) {
        self.images.borrow_mut().remove(reference);
    }

    pub fn pull_count(&self) -> u32 {
        self.pulls.get()
    }

    pub fn set_exec_response(&self, response: ExecResult) {
        *self.exec_response.borrow_mut() = Some(response);
    }

    pub fn set_log_lines(&self, lines: &[&str]) {
        *self.log_lines.borrow_mut() = lines.iter().map(ToString::to_string).collect();
    }

    pub fn last_spec(&self) -> Option<RecordedSpec> {
        self.last_spec.borrow().clone()
    }

    pub fn fail_remove_container(&self) {
        self.fail_remove_container.set(true);
    }

    pub fn fail_remove_image(&self) {
        self.fail_remove_image.set(true);
    }

    /// Insert a container directly, bypassing `run_container`.
    pub fn seed_container(&self, name: &str, status: ContainerStatus) -> ContainerInfo {
        let sequence = self.next_sequence();
        let info = ContainerInfo {
            id: format!("ctr{sequence:04}"),
            name: name.to_string(),
            status,
            created_at: Self::daemon_timestamp(sequence),
        };
        self.containers.borrow_mut().insert(
            name.to_string(),
            FakeContainer {
                info: info.clone(),
                files: BTreeMap::new(),
            },
        );
        info
    }

    pub fn write_container_file(&self, container: &str, path: &str, content: &str) {
        self.containers
            .borrow_mut()
            .get_mut(container)
            .expect("container present")
            .files
            .insert(path.to_string(), content.to_string());
    }

    pub fn read_container_file(&self, container: &str, path: &str) -> Option<String> {
        self.containers
            .borrow()
            .get(container)?
            .files
            .get(path)
            .cloned()
    }

    pub fn write_volume_file(&self, volume: &str, path: &str, content: &str) {
        self.volumes
            .borrow_mut()
            .entry(volume.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    pub fn read_volume_file(&self, volume: &str, path: &str) -> Option<String> {
        self.volumes.borrow().get(volume)?.get(path).cloned()
    }

    fn api_error(message: impl Into<String>) -> anyhow::Error {
        DaemonError::Api(message.into()).into()
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        Ok(self.containers.borrow().get(name).map(|c| c.info.clone()))
    }

    async fn list_containers(&self, prefix: &str) -> Result<Vec<ContainerInfo>> {
        let mut infos: Vec<ContainerInfo> = self
            .containers
            .borrow()
            .values()
            .filter(|c| c.info.name.starts_with(prefix))
            .map(|c| c.info.clone())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn run_container(&self, spec: &ContainerSpec<'_>) -> Result<ContainerInfo> {
        if self.containers.borrow().contains_key(spec.name) {
            return Err(Self::api_error(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }
        let files = self
            .images
            .borrow()
            .get(spec.image)
            .map(|i| i.files.clone())
            .ok_or_else(|| Self::api_error(format!("No such image: {}", spec.image)))?;
        self.volumes
            .borrow_mut()
            .entry(spec.volume_name.to_string())
            .or_default();

        *self.last_spec.borrow_mut() = Some(RecordedSpec {
            image: spec.image.to_string(),
            name: spec.name.to_string(),
            host_ssh_port: spec.host_ssh_port,
            env: spec.env.clone(),
            volume_name: spec.volume_name.to_string(),
            cpu_quota: spec.cpu_quota,
            memory_bytes: spec.memory_bytes,
            add_capabilities: spec.add_capabilities.iter().map(ToString::to_string).collect(),
            add_devices: spec.add_devices.iter().map(ToString::to_string).collect(),
        });

        let sequence = self.next_sequence();
        let info = ContainerInfo {
            id: format!("ctr{sequence:04}"),
            name: spec.name.to_string(),
            status: ContainerStatus::Running,
            created_at: Self::daemon_timestamp(sequence),
        };
        self.containers
            .borrow_mut()
            .insert(spec.name.to_string(), FakeContainer { info: info.clone(), files });
        Ok(info)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| Self::api_error(format!("No such container: {name}")))?;
        container.info.status = ContainerStatus::Running;
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| Self::api_error(format!("No such container: {name}")))?;
        container.info.status = ContainerStatus::Exited;
        Ok(())
    }

    async fn pause_container(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| Self::api_error(format!("No such container: {name}")))?;
        if container.info.status != ContainerStatus::Running {
            return Err(Self::api_error(format!("Container {name} is not running")));
        }
        container.info.status = ContainerStatus::Paused;
        Ok(())
    }

    async fn unpause_container(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| Self::api_error(format!("No such container: {name}")))?;
        if container.info.status != ContainerStatus::Paused {
            return Err(Self::api_error(format!("Container {name} is not paused")));
        }
        container.info.status = ContainerStatus::Running;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        if self.fail_remove_container.get() {
            return Err(Self::api_error("device or resource busy"));
        }
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .get(name)
            .ok_or_else(|| Self::api_error(format!("No such container: {name}")))?;
        if container.info.status == ContainerStatus::Running {
            return Err(Self::api_error(format!(
                "cannot remove running container {name}"
            )));
        }
        containers.remove(name);
        Ok(())
    }

    async fn commit_container(
        &self,
        name: &str,
        repo: &str,
        tag: &str,
        _message: &str,
    ) -> Result<ImageInfo> {
        let files = self
            .containers
            .borrow()
            .get(name)
            .map(|c| c.files.clone())
            .ok_or_else(|| Self::api_error(format!("No such container: {name}")))?;
        let sequence = self.next_sequence();
        let info = ImageInfo {
            id: format!("sha256:fake{sequence:04}"),
            size_bytes: 42_000_000,
        };
        self.images
            .borrow_mut()
            .insert(format!("{repo}:{tag}"), FakeImage { info: info.clone(), files });
        Ok(info)
    }

    async fn exec(&self, name: &str, _command: &[&str]) -> Result<ExecResult> {
        if !self.containers.borrow().contains_key(name) {
            return Err(Self::api_error(format!("No such container: {name}")));
        }
        Ok(self.exec_response.borrow().clone().unwrap_or(ExecResult {
            exit_code: 1,
            output: String::new(),
        }))
    }

    async fn stats(&self, name: &str) -> Result<ContainerMetrics> {
        if !self.containers.borrow().contains_key(name) {
            return Err(Self::api_error(format!("No such container: {name}")));
        }
        Ok(ContainerMetrics {
            cpu_percent: 12.5,
            memory_usage: 256 * 1024 * 1024,
            memory_limit: 8 * 1024 * 1024 * 1024,
        })
    }

    async fn logs(&self, name: &str, tail: Option<u32>, _follow: bool) -> Result<LogStream> {
        if !self.containers.borrow().contains_key(name) {
            return Err(Self::api_error(format!("No such container: {name}")));
        }
        let lines = self.log_lines.borrow().clone();
        let skip = tail.map_or(0, |t| lines.len().saturating_sub(t as usize));
        Ok(futures_util::stream::iter(lines.into_iter().skip(skip).map(Ok)).boxed())
    }

    async fn get_image(&self, reference: &str) -> Result<Option<ImageInfo>> {
        Ok(self.images.borrow().get(reference).map(|i| i.info.clone()))
    }

    async fn pull_image(&self, reference: &str, reporter: &dyn ProgressReporter) -> Result<()> {
        reporter.step("Downloading");
        self.pulls.set(self.pulls.get() + 1);
        let sequence = self.next_sequence();
        self.images.borrow_mut().insert(
            reference.to_string(),
            FakeImage {
                info: ImageInfo {
                    id: format!("sha256:pulled{sequence:04}"),
                    size_bytes: 100_000_000,
                },
                files: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn remove_image(&self, reference: &str, _force: bool) -> Result<ImageRemoval> {
        if self.fail_remove_image.get() {
            return Err(Self::api_error(format!("image {reference} is in use")));
        }
        if self.images.borrow_mut().remove(reference).is_some() {
            Ok(ImageRemoval::Removed)
        } else {
            Ok(ImageRemoval::NotFound)
        }
    }

    async fn get_volume(&self, name: &str) -> Result<Option<String>> {
        Ok(self.volumes.borrow().contains_key(name).then(|| name.to_string()))
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        self.volumes.borrow_mut().entry(name.to_string()).or_default();
        Ok(())
    }
}

impl SshKeys for FakeRuntime {
    async fn ensure_public_key(&self) -> Result<String> {
        Ok("ssh-ed25519 AAAAC3TESTKEY dev@host".to_string())
    }
}

/// No-op progress reporter for tests.
pub struct ReporterStub;

impl ProgressReporter for ReporterStub {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, _: &str) {}
}

/// In-memory workspace store.
pub struct FakeWorkspaceStore {
    records: RefCell<BTreeMap<String, WorkspaceRecord>>,
    tailscale: RefCell<Option<String>>,
}

impl FakeWorkspaceStore {
    pub fn new() -> Self {
        Self {
            records: RefCell::new(BTreeMap::new()),
            tailscale: RefCell::new(None),
        }
    }
}

impl WorkspaceStore for FakeWorkspaceStore {
    fn get(&self, name: &str) -> Result<Option<WorkspaceRecord>> {
        Ok(self.records.borrow().get(name).cloned())
    }

    fn save(&self, record: &WorkspaceRecord) -> Result<()> {
        self.records
            .borrow_mut()
            .insert(record.name.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.records.borrow_mut().remove(name);
        Ok(())
    }

    fn list(&self) -> Result<Vec<WorkspaceRecord>> {
        Ok(self.records.borrow().values().cloned().collect())
    }

    fn tailscale_key(&self) -> Result<Option<String>> {
        Ok(self.tailscale.borrow().clone())
    }

    fn set_tailscale_key(&self, auth_key: &str) -> Result<()> {
        *self.tailscale.borrow_mut() = Some(auth_key.to_string());
        Ok(())
    }

    fn clear_tailscale_key(&self) -> Result<()> {
        *self.tailscale.borrow_mut() = None;
        Ok(())
    }
}

/// In-memory snapshot store.
pub struct FakeSnapshotStore {
    records: RefCell<BTreeMap<String, SnapshotRecord>>,
}

impl FakeSnapshotStore {
    pub fn new() -> Self {
        Self {
            records: RefCell::new(BTreeMap::new()),
        }
    }
}

impl SnapshotStore for FakeSnapshotStore {
    fn get(&self, name: &str) -> Result<Option<SnapshotRecord>> {
        Ok(self.records.borrow().get(name).cloned())
    }

    fn save(&self, record: &SnapshotRecord) -> Result<()> {
        self.records
            .borrow_mut()
            .insert(record.name.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.records.borrow_mut().remove(name);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SnapshotRecord>> {
        Ok(self.records.borrow().values().cloned().collect())
    }
}

/// Seed a running workspace: container, volume, and registry record.
pub fn running_workspace(runtime: &FakeRuntime, store: &FakeWorkspaceStore, name: &str) {
    let container = container_name(name);
    let info = runtime.seed_container(&container, ContainerStatus::Running);
    runtime
        .volumes
        .borrow_mut()
        .entry(volume_name(name))
        .or_default();
    store
        .save(&WorkspaceRecord {
            name: name.to_string(),
            container_name: container,
            port: 2222,
            template: "base".to_string(),
            created_at: info.created_at,
            snapshot_source: None,
        })
        .expect("save record");
}
