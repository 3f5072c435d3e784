//! `regferry copy` command — Copy an image to another reference.

use std::sync::Arc;

use clap::Args;
use regferry_core::FerryConfig;
use regferry_transfer::ImageCopier;

use crate::output::short_digest;
use crate::report::CliReporter;

#[derive(Args)]
pub struct CopyArgs {
    /// Source image reference (e.g., "docker.io/library/alpine:3.19")
    pub source: String,

    /// Destination image reference (e.g., "ghcr.io/org/alpine:3.19")
    pub target: String,

    /// Only print the pushed manifest URL
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(
    args: CopyArgs,
    config: FerryConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = super::parse_reference(&args.source)?;
    let target = super::parse_reference(&args.target)?;

    let copier =
        ImageCopier::new(super::registry(&config)).with_reporter(Arc::new(CliReporter::stderr()));

    if !args.quiet {
        eprintln!("Copying {} to {}...", source, target);
    }
    let summary = copier.copy(&source, &target).await?;

    if args.quiet {
        println!("{}", summary.manifest_url);
    } else {
        eprintln!(
            "Copied config {} and {} layer(s)",
            short_digest(&summary.config),
            summary.layers.len()
        );
        println!("{}", summary.manifest_url);
    }
    Ok(())
}
