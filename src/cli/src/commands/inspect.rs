//! `regferry inspect` command — Print an image configuration as JSON.

use std::sync::Arc;

use clap::Args;
use regferry_core::FerryConfig;
use regferry_transfer::ImageInspector;

use crate::report::CliReporter;

#[derive(Args)]
pub struct InspectArgs {
    /// Image reference to inspect
    pub image: String,
}

pub async fn execute(
    args: InspectArgs,
    config: FerryConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let reference = super::parse_reference(&args.image)?;

    let inspector = ImageInspector::new(super::registry(&config))
        .with_reporter(Arc::new(CliReporter::stderr()))
        .with_integrity(config.integrity);
    let image_config = inspector.inspect(&reference).await?;

    println!("{}", serde_json::to_string_pretty(&image_config)?);
    Ok(())
}
