//! Registry-to-registry image copy.

use std::sync::Arc;

use regferry_core::error::Result;
use regferry_core::{BlobKind, Reporter, TracingReporter, TransferEvent};

use crate::oci::{Digest, ImageReference, Registry};

/// Outcome of a successful copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySummary {
    /// Config blob digest
    pub config: Digest,
    /// Layer blob digests, in manifest order
    pub layers: Vec<Digest>,
    /// Location of the pushed manifest
    pub manifest_url: String,
}

/// Copies images between repositories, blob by blob.
///
/// The destination manifest is pushed only after the config and every
/// layer blob have been copied, so the target never references a blob it
/// does not hold. Blobs copied before a failure are left in place.
pub struct ImageCopier {
    registry: Arc<dyn Registry>,
    reporter: Arc<dyn Reporter>,
}

impl ImageCopier {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub async fn copy(
        &self,
        source: &ImageReference,
        target: &ImageReference,
    ) -> Result<CopySummary> {
        let manifest = self.registry.fetch_manifest(source).await?;
        let config = manifest.config_descriptor()?;
        let layers = manifest.layers()?;

        self.reporter.report(&TransferEvent::CopyStarted {
            source: source.to_string(),
            target: target.to_string(),
        });

        self.copy_blob(source, target, &config.digest, BlobKind::Config)
            .await?;
        for layer in &layers {
            self.copy_blob(source, target, &layer.digest, BlobKind::Layer)
                .await?;
        }

        let manifest_url = self.registry.push_manifest(target, &manifest).await?;
        tracing::info!(
            source = %source,
            target = %target,
            layers = layers.len(),
            "Copied image"
        );
        self.reporter.report(&TransferEvent::ManifestPushed {
            target: target.to_string(),
        });

        Ok(CopySummary {
            config: config.digest,
            layers: layers.into_iter().map(|l| l.digest).collect(),
            manifest_url,
        })
    }

    async fn copy_blob(
        &self,
        source: &ImageReference,
        target: &ImageReference,
        digest: &Digest,
        kind: BlobKind,
    ) -> Result<()> {
        self.registry.copy_blob(source, target, digest).await?;
        self.reporter.report(&TransferEvent::BlobCopied {
            kind,
            digest: digest.to_string(),
        });
        Ok(())
    }
}
