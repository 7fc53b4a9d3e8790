//! Binary entry point: parses the CLI, wires `tracing-subscriber`, runs the
//! requested subcommand, and maps its result onto spec.md §6's exit codes.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = vpcp::Cli::parse();
    if let Err(err) = vpcp::run(cli).await {
        tracing::error!(error = %err, "vpcp exited with an error");
        std::process::exit(err.exit_code());
    }
}
