//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::AppContext;
use crate::commands;

/// Containerized development workspaces with snapshots
#[derive(Parser)]
#[command(
    name = "devbox",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or resume a development workspace
    Up(commands::up::UpArgs),

    /// Pause a workspace, or remove it with --remove
    Down(commands::down::DownArgs),

    /// List all workspaces
    List,

    /// Show live resource usage for a workspace
    Status(commands::status::StatusArgs),

    /// Show workspace logs
    Logs(commands::logs::LogsArgs),

    /// Connect to a workspace via VS Code or SSH
    Connect(commands::connect::ConnectArgs),

    /// List available workspace templates
    Templates,

    /// Manage workspace snapshots
    #[command(subcommand)]
    Snapshot(commands::snapshot::SnapshotCommand),

    /// Manage Tailscale remote access
    #[command(subcommand)]
    Tailscale(commands::tailscale::TailscaleCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            quiet,
            no_color,
            command,
        } = self;
        let app = AppContext::new(no_color, quiet)?;
        match command {
            Command::Up(args) => commands::up::run(&args, &app).await,
            Command::Down(args) => commands::down::run(&args, &app).await,
            Command::List => commands::list::run(&app).await,
            Command::Status(args) => commands::status::run(&args, &app).await,
            Command::Logs(args) => commands::logs::run(&args, &app).await,
            Command::Connect(args) => commands::connect::run(&args, &app).await,
            Command::Templates => commands::templates::run(&app),
            Command::Snapshot(command) => commands::snapshot::run(command, &app).await,
            Command::Tailscale(command) => commands::tailscale::run(command, &app).await,
            Command::Version => commands::version::run(&app),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_up_with_flags() {
        let cli = Cli::try_parse_from([
            "devbox", "up", "--name", "api", "--port", "2300", "--template", "rust",
        ])
        .expect("parse");
        let Command::Up(args) = cli.command else {
            panic!("expected Up");
        };
        assert_eq!(args.name.as_deref(), Some("api"));
        assert_eq!(args.port, 2300);
        assert_eq!(args.template, "rust");
        assert!(!args.tailscale);
    }

    #[test]
    fn test_cli_parses_snapshot_subcommands() {
        let cli = Cli::try_parse_from([
            "devbox", "snapshot", "create", "api", "--name", "golden", "-m", "v1",
        ])
        .expect("parse");
        let Command::Snapshot(commands::snapshot::SnapshotCommand::Create(args)) = cli.command
        else {
            panic!("expected snapshot create");
        };
        assert_eq!(args.workspace, "api");
        assert_eq!(args.name.as_deref(), Some("golden"));
        assert_eq!(args.message, "v1");
    }

    #[test]
    fn test_cli_defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["devbox", "up"]).expect("parse");
        let Command::Up(args) = cli.command else {
            panic!("expected Up");
        };
        assert_eq!(args.port, 2222);
        assert_eq!(args.cpu, "4");
        assert_eq!(args.memory, "8g");
        assert_eq!(args.template, "base");
    }

    #[test]
    fn test_cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["devbox"]).is_err());
    }
}
