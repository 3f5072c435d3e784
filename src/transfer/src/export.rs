//! Export of a remote image into a `docker load` archive.
//!
//! Registries serve compressed layers addressed by the digest of the
//! compressed bytes, while the archive format keys layers by the digest of
//! the uncompressed tar (the diff ID). Every layer is therefore downloaded,
//! decompressed and re-hashed, and the image configuration is rewritten
//! with the recomputed diff IDs before the archive is packaged.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use regferry_core::error::{FerryError, Result};
use regferry_core::{FerryConfig, Reporter, TracingReporter, TransferEvent};
use tokio::io::AsyncWrite;
use tokio_util::io::SyncIoBridge;

use crate::inspect::fetch_config;
use crate::integrity::verify_digest;
use crate::oci::archive::{self, ArchiveManifestEntry, WorkDir, LAYER_TAR, MANIFEST_FILE};
use crate::oci::{decompress_to_file, Descriptor, DiffId, Digest, ImageReference, Registry};

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Digest of the rewritten configuration, which names `<hex>.json`
    pub config_digest: Digest,
    /// Recomputed diff IDs, in manifest layer order
    pub diff_ids: Vec<DiffId>,
    /// Archive paths of the layer tars, in manifest layer order
    pub layers: Vec<String>,
    /// Name the image is tagged with in the archive
    pub repo_tag: String,
    /// Bytes written to the output
    pub archive_size: u64,
}

/// A layer that has been decompressed and moved to its final location.
#[derive(Debug, Clone)]
struct ExportedLayer {
    diff_id: DiffId,
    path: String,
}

/// Builds `docker load` archives from registry images.
pub struct ImageExporter {
    registry: Arc<dyn Registry>,
    reporter: Arc<dyn Reporter>,
    config: FerryConfig,
}

impl ImageExporter {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            reporter: Arc::new(TracingReporter),
            config: FerryConfig::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_config(mut self, config: FerryConfig) -> Self {
        self.config = config;
        self
    }

    /// Export `reference` as an uncompressed tar archive written to `out`.
    ///
    /// Nothing is written to `out` until every layer has been staged. The
    /// staging directory is removed on return, whether or not the export
    /// succeeded.
    pub async fn export<W: AsyncWrite + Unpin>(
        &self,
        reference: &ImageReference,
        out: &mut W,
    ) -> Result<ExportSummary> {
        let repo_tag = reference.common_name();
        if repo_tag.is_empty() {
            return Err(FerryError::NotFound(format!(
                "no image name for {}; a tag is required to export",
                reference
            )));
        }

        let work = WorkDir::create(self.config.work_dir.as_deref())?;
        self.reporter.report(&TransferEvent::ExportStarted {
            reference: reference.to_string(),
            work_dir: work.path().display().to_string(),
        });

        let manifest = self.registry.fetch_manifest(reference).await?;
        let layers = manifest.layers()?;
        let mut config = fetch_config(
            self.registry.as_ref(),
            self.reporter.as_ref(),
            self.config.integrity,
            reference,
            &manifest,
        )
        .await?;
        let created = config.created_time();

        let mut slots: Vec<Option<ExportedLayer>> = vec![None; layers.len()];
        for (index, descriptor) in layers.iter().enumerate() {
            let staging = work.layer_staging(index)?;
            let layer = self
                .export_layer(&work, reference, index, descriptor, &staging, created)
                .await?;
            slots[index] = Some(layer);
        }

        let mut entry = ArchiveManifestEntry {
            config: String::new(),
            repo_tags: vec![repo_tag.clone()],
            layers: Vec::with_capacity(slots.len()),
        };
        let mut diff_ids = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let layer = slot
                .ok_or_else(|| FerryError::Other(format!("layer {} was not exported", index)))?;
            diff_ids.push(layer.diff_id);
            entry.layers.push(layer.path);
        }
        config.rootfs.set_diff_ids(&diff_ids);

        let config_json = config.to_json()?;
        let config_digest = Digest::from_bytes(self.config.digest_algorithm, &config_json);
        entry.config = format!("{}.json", config_digest.encoded());
        work.write_file(&entry.config, &config_json, created)?;
        self.reporter.report(&TransferEvent::ConfigWritten {
            digest: config_digest.to_string(),
        });

        let manifest_json = serde_json::to_vec(&[&entry])?;
        work.write_file(MANIFEST_FILE, &manifest_json, UNIX_EPOCH)?;

        let archive_size =
            archive::stream_archive(work.path().to_path_buf(), entry.clone(), out).await?;

        tracing::info!(
            reference = %reference,
            layers = entry.layers.len(),
            size = archive_size,
            "Exported image"
        );
        self.reporter.report(&TransferEvent::ExportFinished {
            reference: reference.to_string(),
            layers: entry.layers.len(),
        });

        Ok(ExportSummary {
            config_digest,
            diff_ids,
            layers: entry.layers,
            repo_tag,
            archive_size,
        })
    }

    /// Download, decompress and commit one layer.
    async fn export_layer(
        &self,
        work: &WorkDir,
        reference: &ImageReference,
        index: usize,
        descriptor: &Descriptor,
        staging: &Path,
        created: SystemTime,
    ) -> Result<ExportedLayer> {
        tracing::debug!(index, digest = %descriptor.digest, "Fetching layer");
        let blob = self
            .registry
            .fetch_blob(reference, &descriptor.digest, &[descriptor.media_type.as_str()])
            .await?;

        let src = SyncIoBridge::new(blob.reader);
        let dest = staging.join(LAYER_TAR);
        let blob_algorithm = descriptor.digest.algorithm();
        let diff_algorithm = self.config.digest_algorithm;
        let layer = tokio::task::spawn_blocking(move || {
            decompress_to_file(src, &dest, blob_algorithm, diff_algorithm)
        })
        .await
        .map_err(|e| FerryError::Other(format!("layer {} task failed: {}", index, e)))??;

        verify_digest(
            self.config.integrity,
            self.reporter.as_ref(),
            &format!("layer {}", index),
            &descriptor.digest,
            &layer.blob_digest,
        )?;

        let path = work.commit_layer(staging, &layer.diff_id, created)?;
        self.reporter.report(&TransferEvent::LayerExported {
            index,
            blob_digest: descriptor.digest.to_string(),
            diff_id: layer.diff_id.to_string(),
            size: layer.size,
        });

        Ok(ExportedLayer {
            diff_id: layer.diff_id,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::test_support::RecordingReporter;
    use crate::oci::layers::test_support::{gzip, tar_bytes};
    use crate::oci::{media_types, ImageManifest, MemoryRegistry};
    use regferry_core::DigestAlgorithm;

    fn image(registry: &MemoryRegistry, reference: &ImageReference, layers: &[Vec<u8>]) {
        let config = registry.put_blob(
            reference,
            br#"{"created":"2024-01-01T00:00:00Z","rootfs":{"type":"layers","diff_ids":[]}}"#,
            media_types::OCI_CONFIG,
        );
        let descriptors: Vec<_> = layers
            .iter()
            .map(|l| registry.put_blob(reference, l, media_types::OCI_LAYER_TAR_GZIP))
            .collect();
        registry
            .put_manifest(reference, ImageManifest::from_parts(&config, &descriptors))
            .unwrap();
    }

    #[tokio::test]
    async fn test_export_reports_progress() {
        let registry = Arc::new(MemoryRegistry::new());
        let reference = ImageReference::parse("registry.local/app:v1").unwrap();
        let tar = tar_bytes(&[("etc/motd", b"hi\n")]);
        image(&registry, &reference, &[gzip(&tar)]);
        let reporter = Arc::new(RecordingReporter::default());

        let mut out: Vec<u8> = Vec::new();
        let summary = ImageExporter::new(registry)
            .with_reporter(reporter.clone())
            .export(&reference, &mut out)
            .await
            .unwrap();

        assert_eq!(summary.repo_tag, "registry.local/app:v1");
        assert_eq!(
            summary.diff_ids[0].digest(),
            &Digest::from_bytes(DigestAlgorithm::Sha256, &tar)
        );
        assert_eq!(summary.archive_size, out.len() as u64);

        let events = reporter.events.lock();
        assert!(matches!(events.first(), Some(TransferEvent::ExportStarted { .. })));
        assert!(matches!(
            events.iter().find(|e| matches!(e, TransferEvent::LayerExported { .. })),
            Some(TransferEvent::LayerExported { index: 0, .. })
        ));
        assert!(matches!(
            events.last(),
            Some(TransferEvent::ExportFinished { layers: 1, .. })
        ));
        assert!(!events.iter().any(|e| e.is_warning()));
    }

    #[tokio::test]
    async fn test_export_sha512_names() {
        let registry = Arc::new(MemoryRegistry::new());
        let reference = ImageReference::parse("registry.local/app:v1").unwrap();
        image(&registry, &reference, &[gzip(&tar_bytes(&[("a", b"a")]))]);
        let config = FerryConfig {
            digest_algorithm: DigestAlgorithm::Sha512,
            ..Default::default()
        };

        let summary = ImageExporter::new(registry)
            .with_config(config)
            .export(&reference, &mut Vec::<u8>::new())
            .await
            .unwrap();
        assert_eq!(summary.config_digest.algorithm(), DigestAlgorithm::Sha512);
        assert_eq!(summary.diff_ids[0].encoded().len(), 128);
        assert!(summary.layers[0].starts_with(summary.diff_ids[0].encoded()));
    }

    #[tokio::test]
    async fn test_export_without_tag_touches_nothing() {
        let registry = Arc::new(MemoryRegistry::new());
        let digest = Digest::from_bytes(DigestAlgorithm::Sha256, b"manifest");
        let reference = ImageReference::parse(&format!("registry.local/app@{}", digest)).unwrap();
        let reporter = Arc::new(RecordingReporter::default());

        let mut out: Vec<u8> = Vec::new();
        let err = ImageExporter::new(registry)
            .with_reporter(reporter.clone())
            .export(&reference, &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, FerryError::NotFound(_)));
        assert!(out.is_empty());
        assert!(reporter.events.lock().is_empty());
    }
}
