//! `regferry layer` subcommands — Work with individual layer blobs.

use clap::{Args, Subcommand};
use regferry_core::FerryConfig;
use regferry_transfer::{download_blob, Digest};

use crate::report::CliReporter;

/// Work with layer blobs.
#[derive(Args)]
pub struct LayerArgs {
    #[command(subcommand)]
    pub command: LayerCommand,
}

/// Layer subcommands.
#[derive(Subcommand)]
pub enum LayerCommand {
    /// Write a blob's raw (still compressed) bytes to stdout
    Pull(PullArgs),
}

#[derive(Args)]
pub struct PullArgs {
    /// Repository the blob belongs to (e.g., "alpine:3.19")
    pub image: String,

    /// Blob digest (e.g., "sha256:4abcf2...")
    pub digest: String,
}

pub async fn execute(
    args: LayerArgs,
    config: FerryConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        LayerCommand::Pull(args) => pull(args, config).await,
    }
}

async fn pull(args: PullArgs, config: FerryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let reference = super::parse_reference(&args.image)?;
    let digest = Digest::parse(&args.digest)?;
    let registry = super::registry(&config);

    let mut stdout = tokio::io::stdout();
    download_blob(
        registry.as_ref(),
        &CliReporter::stderr(),
        config.integrity,
        &reference,
        &digest,
        &mut stdout,
    )
    .await?;
    Ok(())
}
