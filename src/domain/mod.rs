//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod error;
pub mod snapshot;
pub mod template;
pub mod workspace;

#[allow(unused_imports)]
pub use error::{DaemonError, RemoteAccessError, SnapshotError, WorkspaceError};
#[allow(unused_imports)]
pub use snapshot::{SnapshotListing, SnapshotRecord, default_snapshot_name, snapshot_image_tag};
#[allow(unused_imports)]
pub use template::{Template, image_for_template, templates};
#[allow(unused_imports)]
pub use workspace::{
    WorkspaceRecord, container_name, cpu_quota, parse_memory_limit, validate_workspace_name,
    volume_name, workspace_name_from_container,
};
