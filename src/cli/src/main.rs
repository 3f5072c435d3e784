//! Regferry CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use regferry_cli::commands::{dispatch, Cli};

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout may carry an archive or a blob.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
