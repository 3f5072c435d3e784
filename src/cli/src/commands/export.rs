//! `regferry export` command — Export an image as a `docker load` archive.
//!
//! The archive goes to stdout, or to a file given with `-o`. File output is
//! written to a temporary file next to the destination and renamed into
//! place once the export has succeeded.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use regferry_core::FerryConfig;
use regferry_transfer::{ExportSummary, ImageExporter, ImageReference};
use tokio::io::AsyncWriteExt;

use crate::output::{format_bytes, short_digest};
use crate::report::CliReporter;

#[derive(Args)]
pub struct ExportArgs {
    /// Image reference to export (e.g., "nginx:1.25")
    pub image: String,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn execute(
    args: ExportArgs,
    config: FerryConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let reference = super::parse_reference(&args.image)?;
    let exporter = ImageExporter::new(super::registry(&config))
        .with_reporter(Arc::new(CliReporter::stderr()))
        .with_config(config);

    let summary = match &args.output {
        Some(path) => export_to_file(&exporter, &reference, path).await?,
        None => {
            if std::io::stdout().is_terminal() {
                return Err(
                    "Refusing to write an archive to a terminal; use -o or redirect stdout".into(),
                );
            }
            let mut stdout = tokio::io::stdout();
            let summary = exporter.export(&reference, &mut stdout).await?;
            stdout.flush().await?;
            summary
        }
    };

    eprintln!(
        "Exported {} ({} layer(s), config {}, {})",
        summary.repo_tag,
        summary.layers.len(),
        short_digest(&summary.config_digest),
        format_bytes(summary.archive_size)
    );
    Ok(())
}

/// Export into a temporary file beside `path`, then rename it into place.
async fn export_to_file(
    exporter: &ImageExporter,
    reference: &ImageReference,
    path: &Path,
) -> Result<ExportSummary, Box<dyn std::error::Error>> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".regferry-export-")
        .suffix(".tar")
        .tempfile_in(dir)
        .map_err(|e| format!("Failed to create temp file in {}: {e}", dir.display()))?;

    let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
    let summary = exporter.export(reference, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    temp.persist(path)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e.error))?;
    Ok(summary)
}
