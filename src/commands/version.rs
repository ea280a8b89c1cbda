//! `devbox version` — version information.

use anyhow::Result;

use crate::app::AppContext;
use crate::domain::template::DEFAULT_IMAGE;

/// Run `devbox version`.
///
/// # Errors
///
/// This function currently cannot fail; the `Result` keeps the handler
/// signature uniform.
pub fn run(app: &AppContext) -> Result<()> {
    let ctx = &app.output;
    ctx.header("DevBox CLI");
    ctx.kv("Version", env!("CARGO_PKG_VERSION"));
    ctx.kv("Default image", DEFAULT_IMAGE);
    Ok(())
}
