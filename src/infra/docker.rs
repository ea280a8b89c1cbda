//! Docker daemon gateway — bollard-backed implementation of `ContainerRuntime`.
//!
//! The daemon is treated as an unreliable remote dependency: connection
//! problems surface as `DaemonError::Unavailable` (raised at construction,
//! before any operation state is touched), 404 responses become `None` or
//! idempotent outcomes, and every other rejection becomes
//! `DaemonError::Api` carrying the daemon's own message.

use std::collections::HashMap;

use anyhow::{Context, Result};
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, Stats, StatsOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{CommitContainerOptions, CreateImageOptions, RemoveImageOptions};
use bollard::models::{
    ContainerStateStatusEnum, ContainerSummary, DeviceMapping, HostConfig, PortBinding,
    RestartPolicy, RestartPolicyNameEnum,
};
use chrono::{DateTime, TimeZone as _, Utc};
use futures_util::StreamExt;

use crate::application::ports::{
    ContainerInfo, ContainerMetrics, ContainerRuntime, ContainerSpec, ContainerStatus, ExecResult,
    ImageInfo, ImageRemoval, LogStream, ProgressReporter,
};
use crate::domain::error::DaemonError;
use crate::domain::snapshot::SNAPSHOT_AUTHOR;

/// Port key for the container-side SSH port.
const SSH_PORT_KEY: &str = "22/tcp";

/// Seconds the daemon waits before killing on stop.
const STOP_TIMEOUT_SECS: i64 = 10;

/// Gateway to the local Docker daemon.
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connect to the local daemon and verify it responds.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Unavailable`] when the daemon cannot be
    /// reached — before any operation state is touched.
    pub async fn connect() -> Result<Self> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| DaemonError::Unavailable(e.to_string()))?;
        client
            .ping()
            .await
            .map_err(|e| DaemonError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }
}

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn map_daemon_err(err: bollard::errors::Error) -> anyhow::Error {
    match err {
        bollard::errors::Error::DockerResponseServerError { message, .. } => {
            DaemonError::Api(message).into()
        }
        other => DaemonError::Unavailable(other.to_string()).into(),
    }
}

/// Parse the daemon's RFC3339 creation timestamp.
fn parse_created(created: Option<&str>) -> Result<DateTime<Utc>> {
    let raw = created.context("daemon reported no creation time")?;
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("parsing daemon creation time '{raw}'"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn status_from_state(state: Option<ContainerStateStatusEnum>) -> ContainerStatus {
    match state {
        Some(ContainerStateStatusEnum::CREATED) => ContainerStatus::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerStatus::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerStatus::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerStatus::Removing,
        Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerStatus::Dead,
        _ => ContainerStatus::Unknown,
    }
}

fn info_from_summary(summary: &ContainerSummary) -> Option<ContainerInfo> {
    let name = summary
        .names
        .as_ref()?
        .first()
        .map(|n| n.trim_start_matches('/').to_string())?;
    let created_at = summary
        .created
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    Some(ContainerInfo {
        id: summary.id.clone().unwrap_or_default(),
        name,
        status: ContainerStatus::parse(summary.state.as_deref().unwrap_or_default()),
        created_at,
    })
}

/// CPU usage as a percentage, from delta counters.
fn cpu_percent(cpu_delta: f64, system_delta: f64, online_cpus: f64) -> f64 {
    if system_delta > 0.0 && cpu_delta > 0.0 {
        (cpu_delta / system_delta) * online_cpus * 100.0
    } else {
        0.0
    }
}

fn metrics_from_stats(stats: &Stats) -> ContainerMetrics {
    #[allow(clippy::cast_precision_loss)]
    let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64
        - stats.precpu_stats.cpu_usage.total_usage as f64;
    #[allow(clippy::cast_precision_loss)]
    let system_delta = stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
        - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
    #[allow(clippy::cast_precision_loss)]
    let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(1) as f64;
    ContainerMetrics {
        cpu_percent: cpu_percent(cpu_delta, system_delta, online_cpus),
        memory_usage: stats.memory_stats.usage.unwrap_or(0),
        memory_limit: stats.memory_stats.limit.unwrap_or(0),
    }
}

fn log_chunk_to_string(output: LogOutput) -> String {
    match output {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => String::from_utf8_lossy(&message).to_string(),
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        match self.client.inspect_container(name, None).await {
            Ok(inspect) => {
                let status = status_from_state(inspect.state.and_then(|s| s.status));
                Ok(Some(ContainerInfo {
                    id: inspect.id.unwrap_or_default(),
                    name: inspect
                        .name
                        .map_or_else(|| name.to_string(), |n| n.trim_start_matches('/').to_string()),
                    status,
                    created_at: parse_created(inspect.created.as_deref())?,
                }))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(map_daemon_err(e)),
        }
    }

    async fn list_containers(&self, prefix: &str) -> Result<Vec<ContainerInfo>> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![prefix.to_string()]);
        let summaries = self
            .client
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(map_daemon_err)?;

        // The daemon's name filter is a substring match; keep prefix matches only.
        let mut infos: Vec<ContainerInfo> = summaries
            .iter()
            .filter_map(info_from_summary)
            .filter(|info| info.name.starts_with(prefix))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn run_container(&self, spec: &ContainerSpec<'_>) -> Result<ContainerInfo> {
        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            SSH_PORT_KEY.to_string(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_ssh_port.to_string()),
            }]),
        );
        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(SSH_PORT_KEY.to_string(), HashMap::new());

        let devices: Vec<DeviceMapping> = spec
            .add_devices
            .iter()
            .map(|path| DeviceMapping {
                path_on_host: Some((*path).to_string()),
                path_in_container: Some((*path).to_string()),
                cgroup_permissions: Some("rwm".to_string()),
            })
            .collect();

        let host_config = HostConfig {
            binds: Some(vec![format!("{}:{}", spec.volume_name, spec.volume_mount)]),
            port_bindings: Some(port_bindings),
            memory: spec.memory_bytes,
            cpu_quota: spec.cpu_quota,
            cap_add: (!spec.add_capabilities.is_empty())
                .then(|| spec.add_capabilities.iter().map(ToString::to_string).collect()),
            devices: (!devices.is_empty()).then_some(devices),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.to_string()),
            env: Some(env),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        self.client
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.to_string(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(map_daemon_err)?;
        self.client
            .start_container(spec.name, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_daemon_err)?;

        // Re-inspect so callers persist daemon-confirmed state.
        self.get_container(spec.name)
            .await?
            .with_context(|| format!("container '{}' vanished after start", spec.name))
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.client
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_daemon_err)
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.client
            .stop_container(name, Some(StopContainerOptions { t: STOP_TIMEOUT_SECS }))
            .await
            .map_err(map_daemon_err)
    }

    async fn pause_container(&self, name: &str) -> Result<()> {
        self.client.pause_container(name).await.map_err(map_daemon_err)
    }

    async fn unpause_container(&self, name: &str) -> Result<()> {
        self.client.unpause_container(name).await.map_err(map_daemon_err)
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.client
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: false,
                    v: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_daemon_err)
    }

    async fn commit_container(
        &self,
        name: &str,
        repo: &str,
        tag: &str,
        message: &str,
    ) -> Result<ImageInfo> {
        self.client
            .commit_container(
                CommitContainerOptions {
                    container: name.to_string(),
                    repo: repo.to_string(),
                    tag: tag.to_string(),
                    comment: message.to_string(),
                    author: SNAPSHOT_AUTHOR.to_string(),
                    pause: true,
                    changes: None,
                },
                Config::<String>::default(),
            )
            .await
            .map_err(map_daemon_err)?;

        // Resolve the committed image through the same read path callers use.
        let reference = format!("{repo}:{tag}");
        self.get_image(&reference)
            .await?
            .with_context(|| format!("committed image '{reference}' not found"))
    }

    async fn exec(&self, name: &str, command: &[&str]) -> Result<ExecResult> {
        let exec = self
            .client
            .create_exec(
                name,
                CreateExecOptions {
                    cmd: Some(command.iter().map(ToString::to_string).collect()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(map_daemon_err)?;

        let mut collected = String::new();
        match self
            .client
            .start_exec(&exec.id, None)
            .await
            .map_err(map_daemon_err)?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    collected.push_str(&log_chunk_to_string(chunk.map_err(map_daemon_err)?));
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .client
            .inspect_exec(&exec.id)
            .await
            .map_err(map_daemon_err)?;
        Ok(ExecResult {
            exit_code: inspect.exit_code.unwrap_or(-1),
            output: collected,
        })
    }

    async fn stats(&self, name: &str) -> Result<ContainerMetrics> {
        let mut stream = self.client.stats(
            name,
            Some(StatsOptions {
                stream: false,
                one_shot: false,
            }),
        );
        let stats = stream
            .next()
            .await
            .context("daemon returned no stats")?
            .map_err(map_daemon_err)?;
        Ok(metrics_from_stats(&stats))
    }

    async fn logs(&self, name: &str, tail: Option<u32>, follow: bool) -> Result<LogStream> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.map_or_else(|| "all".to_string(), |t| t.to_string()),
            follow,
            ..Default::default()
        };
        let stream = self
            .client
            .logs(name, Some(options))
            .map(|entry| entry.map(log_chunk_to_string).map_err(map_daemon_err));
        Ok(stream.boxed())
    }

    async fn get_image(&self, reference: &str) -> Result<Option<ImageInfo>> {
        match self.client.inspect_image(reference).await {
            Ok(inspect) => Ok(Some(ImageInfo {
                id: inspect.id.unwrap_or_default(),
                size_bytes: inspect.size.unwrap_or(0).max(0).unsigned_abs(),
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(map_daemon_err(e)),
        }
    }

    async fn pull_image(&self, reference: &str, reporter: &dyn ProgressReporter) -> Result<()> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };
        let mut stream = self.client.create_image(Some(options), None, None);
        let mut last_status = String::new();
        while let Some(progress) = stream.next().await {
            let progress = progress.map_err(map_daemon_err)?;
            if let Some(status) = progress.status
                && status != last_status
            {
                reporter.step(&status);
                last_status = status;
            }
        }
        Ok(())
    }

    async fn remove_image(&self, reference: &str, force: bool) -> Result<ImageRemoval> {
        match self
            .client
            .remove_image(
                reference,
                Some(RemoveImageOptions {
                    force,
                    ..Default::default()
                }),
                None,
            )
            .await
        {
            Ok(_) => Ok(ImageRemoval::Removed),
            Err(e) if is_not_found(&e) => Ok(ImageRemoval::NotFound),
            Err(e) => Err(map_daemon_err(e)),
        }
    }

    async fn get_volume(&self, name: &str) -> Result<Option<String>> {
        match self.client.inspect_volume(name).await {
            Ok(volume) => Ok(Some(volume.name)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(map_daemon_err(e)),
        }
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        self.client
            .create_volume(bollard::volume::CreateVolumeOptions {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .map_err(map_daemon_err)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn server_error(status_code: u16) -> bollard::errors::Error {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_is_not_found_matches_only_404() {
        assert!(is_not_found(&server_error(404)));
        assert!(!is_not_found(&server_error(409)));
        assert!(!is_not_found(&server_error(500)));
    }

    #[test]
    fn test_map_daemon_err_preserves_daemon_message() {
        let err = map_daemon_err(server_error(409));
        assert!(err.to_string().contains("boom"), "daemon message lost: {err}");
        assert!(
            err.to_string().contains("rejected"),
            "should be an API rejection: {err}"
        );
    }

    #[test]
    fn test_parse_created_accepts_daemon_format() {
        let parsed = parse_created(Some("2026-08-06T14:30:05.123456789Z")).expect("parse");
        let expected = Utc
            .with_ymd_and_hms(2026, 8, 6, 14, 30, 5)
            .single()
            .expect("timestamp");
        assert_eq!(parsed.timestamp(), expected.timestamp());
    }

    #[test]
    fn test_parse_created_rejects_missing_or_garbage() {
        assert!(parse_created(None).is_err());
        assert!(parse_created(Some("yesterday")).is_err());
    }

    #[test]
    fn test_status_from_state_maps_daemon_enum() {
        assert_eq!(
            status_from_state(Some(ContainerStateStatusEnum::RUNNING)),
            ContainerStatus::Running
        );
        assert_eq!(
            status_from_state(Some(ContainerStateStatusEnum::PAUSED)),
            ContainerStatus::Paused
        );
        assert_eq!(status_from_state(None), ContainerStatus::Unknown);
    }

    #[test]
    fn test_cpu_percent_scales_by_online_cpus() {
        let percent = cpu_percent(50.0, 100.0, 4.0);
        assert!((percent - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cpu_percent_zero_when_no_delta() {
        assert!(cpu_percent(0.0, 100.0, 4.0).abs() < f64::EPSILON);
        assert!(cpu_percent(50.0, 0.0, 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_info_from_summary_trims_leading_slash() {
        let summary = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/devbox-api".to_string()]),
            state: Some("running".to_string()),
            created: Some(1_700_000_000),
            ..Default::default()
        };
        let info = info_from_summary(&summary).expect("info");
        assert_eq!(info.name, "devbox-api");
        assert_eq!(info.status, ContainerStatus::Running);
    }
}
