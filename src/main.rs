//! DevBox CLI - containerized development workspaces with snapshots

use clap::Parser;

use devbox_cli::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
