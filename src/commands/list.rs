//! `devbox list` — all workspaces, live and recorded.
//!
//! Shows the union of registry records and daemon containers: containers
//! unknown to the registry appear as orphans, and records whose container
//! is gone stay visible marked missing. Dangling references are surfaced
//! for the user to clean up, never silently deleted by this read path.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::{ContainerInfo, ContainerRuntime, WorkspaceStore};
use crate::domain::workspace::CONTAINER_PREFIX;
use crate::domain::{WorkspaceRecord, workspace_name_from_container};
use crate::infra::docker::DockerRuntime;

/// One row of the listing.
struct Row {
    name: String,
    status: String,
    port: String,
    template: String,
}

/// Run `devbox list`.
///
/// # Errors
///
/// Returns an error if the daemon or the registry cannot be read.
pub async fn run(app: &AppContext) -> Result<()> {
    let runtime = DockerRuntime::connect().await?;
    let containers = runtime.list_containers(CONTAINER_PREFIX).await?;
    let records = app.workspaces.list()?;

    let rows = merge(&containers, &records);
    let ctx = &app.output;
    if rows.is_empty() {
        ctx.info("No workspaces found");
        ctx.kv("Create one", "devbox up");
        return Ok(());
    }

    ctx.header("Workspaces");
    if !ctx.quiet {
        println!("  {:<24} {:<12} {:>6}  {}", "NAME", "STATUS", "PORT", "TEMPLATE");
        for row in rows {
            println!(
                "  {:<24} {:<12} {:>6}  {}",
                row.name, row.status, row.port, row.template
            );
        }
        println!();
    }
    ctx.kv("Connect", "devbox connect <name>");
    Ok(())
}

/// Join daemon containers with registry records by workspace name.
fn merge(containers: &[ContainerInfo], records: &[WorkspaceRecord]) -> Vec<Row> {
    let mut by_name: BTreeMap<String, Row> = BTreeMap::new();

    for info in containers {
        let Some(name) = workspace_name_from_container(&info.name) else {
            continue;
        };
        by_name.insert(
            name.to_string(),
            Row {
                name: name.to_string(),
                status: info.status.to_string(),
                port: "-".to_string(),
                template: "-".to_string(),
            },
        );
    }

    for record in records {
        match by_name.get_mut(&record.name) {
            Some(row) => {
                row.port = record.port.to_string();
                row.template.clone_from(&record.template);
            }
            None => {
                // Dangling record: container is gone but the record remains.
                by_name.insert(
                    record.name.clone(),
                    Row {
                        name: record.name.clone(),
                        status: "missing".to_string(),
                        port: record.port.to_string(),
                        template: record.template.clone(),
                    },
                );
            }
        }
    }

    by_name.into_values().collect()
}
