//! `devbox templates` — the static template catalog.

use anyhow::Result;

use crate::app::AppContext;
use crate::domain::templates;

/// Run `devbox templates`.
///
/// # Errors
///
/// This function currently cannot fail; the `Result` keeps the handler
/// signature uniform.
pub fn run(app: &AppContext) -> Result<()> {
    let ctx = &app.output;
    ctx.header("Available Templates");
    if !ctx.quiet {
        println!("  {:<12} {:<22} {}", "ID", "NAME", "DESCRIPTION");
        for template in templates() {
            println!(
                "  {:<12} {:<22} {}",
                template.id, template.name, template.description
            );
        }
        println!();
    }
    ctx.kv("Use", "devbox up --template <id>");
    Ok(())
}
