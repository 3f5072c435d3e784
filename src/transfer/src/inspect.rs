//! Image configuration lookup.

use std::sync::Arc;

use regferry_core::error::Result;
use regferry_core::{IntegrityPolicy, Reporter, TracingReporter};
use tokio::io::AsyncReadExt;

use crate::integrity::verify_digest;
use crate::oci::{media_types, Digest, ImageConfig, ImageManifest, ImageReference, Registry};

/// Fetch, verify and decode the configuration blob of `manifest`.
pub(crate) async fn fetch_config(
    registry: &dyn Registry,
    reporter: &dyn Reporter,
    policy: IntegrityPolicy,
    reference: &ImageReference,
    manifest: &ImageManifest,
) -> Result<ImageConfig> {
    let descriptor = manifest.config_descriptor()?;
    let mut blob = registry
        .fetch_blob(reference, &descriptor.digest, media_types::CONFIG_MEDIA_TYPES)
        .await?;
    let mut data = Vec::new();
    blob.reader.read_to_end(&mut data).await?;

    let calculated = Digest::from_bytes(descriptor.digest.algorithm(), &data);
    verify_digest(
        policy,
        reporter,
        "image config",
        &descriptor.digest,
        &calculated,
    )?;

    ImageConfig::from_json(&data)
}

/// Reads the configuration of remote images.
pub struct ImageInspector {
    registry: Arc<dyn Registry>,
    reporter: Arc<dyn Reporter>,
    integrity: IntegrityPolicy,
}

impl ImageInspector {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            reporter: Arc::new(TracingReporter),
            integrity: IntegrityPolicy::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_integrity(mut self, integrity: IntegrityPolicy) -> Self {
        self.integrity = integrity;
        self
    }

    /// Decode the image configuration at `reference`.
    pub async fn inspect(&self, reference: &ImageReference) -> Result<ImageConfig> {
        let manifest = self.registry.fetch_manifest(reference).await?;
        fetch_config(
            self.registry.as_ref(),
            self.reporter.as_ref(),
            self.integrity,
            reference,
            &manifest,
        )
        .await
    }
}
