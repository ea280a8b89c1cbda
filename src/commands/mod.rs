//! Command implementations

pub mod connect;
pub mod down;
pub mod list;
pub mod logs;
pub mod snapshot;
pub mod status;
pub mod tailscale;
pub mod templates;
pub mod up;
pub mod version;

use anyhow::{Context, Result};

/// Resolve an optional workspace name, falling back to the current
/// directory's basename (the detector-less default).
///
/// # Errors
///
/// Returns an error if no name is given and the current directory name
/// cannot be determined.
pub(crate) fn resolve_name(explicit: Option<&str>) -> Result<String> {
    if let Some(name) = explicit {
        return Ok(name.to_string());
    }
    let cwd = std::env::current_dir().context("determining current directory")?;
    cwd.file_name()
        .and_then(|n| n.to_str())
        .map(ToString::to_string)
        .context("cannot derive a workspace name from the current directory; pass --name")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_name_prefers_explicit() {
        assert_eq!(resolve_name(Some("api")).expect("name"), "api");
    }

    #[test]
    fn test_resolve_name_falls_back_to_directory_basename() {
        let name = resolve_name(None).expect("name");
        assert!(!name.is_empty());
    }
}
