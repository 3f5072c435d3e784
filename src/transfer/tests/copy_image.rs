//! Copy tests against an in-memory registry.

use std::sync::Arc;

use regferry_core::FerryError;
use regferry_transfer::oci::{media_types, Descriptor};
use regferry_transfer::{ImageCopier, ImageManifest, ImageReference, MemoryRegistry};

struct Source {
    registry: Arc<MemoryRegistry>,
    source: ImageReference,
    config: Descriptor,
    layers: Vec<Descriptor>,
}

fn source_image() -> Source {
    let registry = Arc::new(MemoryRegistry::new());
    let source = ImageReference::parse("registry.local/base/alpine:3.19").unwrap();
    let config = registry.put_blob(&source, br#"{"os":"linux"}"#, media_types::OCI_CONFIG);
    let layers: Vec<_> = [
        b"layer one".as_slice(),
        b"layer two".as_slice(),
        b"layer three".as_slice(),
    ]
    .iter()
    .map(|data| registry.put_blob(&source, data, media_types::OCI_LAYER_TAR_GZIP))
    .collect();
    registry
        .put_manifest(&source, ImageManifest::from_parts(&config, &layers))
        .unwrap();
    Source {
        registry,
        source,
        config,
        layers,
    }
}

#[tokio::test]
async fn test_copy_transfers_blobs_then_manifest() {
    let src = source_image();
    let target = ImageReference::parse("mirror.local/base/alpine:3.19").unwrap();

    let summary = ImageCopier::new(src.registry.clone())
        .copy(&src.source, &target)
        .await
        .unwrap();

    assert_eq!(summary.config, src.config.digest);
    assert_eq!(
        summary.layers,
        src.layers.iter().map(|l| l.digest.clone()).collect::<Vec<_>>()
    );
    assert!(src.registry.has_blob(&target, &src.config.digest));
    for layer in &src.layers {
        assert!(src.registry.has_blob(&target, &layer.digest));
    }
    assert_eq!(src.registry.pushed_manifests(), vec![target.to_string()]);

    let pushed = src.registry.manifest(&target).unwrap();
    assert_eq!(
        pushed.to_json().unwrap(),
        src.registry.manifest(&src.source).unwrap().to_json().unwrap()
    );
    assert!(summary.manifest_url.contains("mirror.local"));
}

#[tokio::test]
async fn test_failed_layer_copy_never_pushes_manifest() {
    let src = source_image();
    let target = ImageReference::parse("mirror.local/base/alpine:3.19").unwrap();
    src.registry.fail_copy(&src.layers[1].digest);

    let err = ImageCopier::new(src.registry.clone())
        .copy(&src.source, &target)
        .await
        .unwrap_err();

    assert!(matches!(err, FerryError::RegistryError { .. }));
    assert!(src.registry.pushed_manifests().is_empty());
    assert!(src.registry.manifest(&target).is_none());
    // Blobs copied before the failure stay behind.
    assert!(src.registry.has_blob(&target, &src.layers[0].digest));
    assert!(!src.registry.has_blob(&target, &src.layers[2].digest));
}

#[tokio::test]
async fn test_failed_config_copy_touches_no_layer() {
    let src = source_image();
    let target = ImageReference::parse("mirror.local/base/alpine:3.19").unwrap();
    src.registry.fail_copy(&src.config.digest);

    let result = ImageCopier::new(src.registry.clone())
        .copy(&src.source, &target)
        .await;

    assert!(result.is_err());
    for layer in &src.layers {
        assert!(!src.registry.has_blob(&target, &layer.digest));
    }
    assert!(src.registry.pushed_manifests().is_empty());
}

#[tokio::test]
async fn test_copy_within_one_registry() {
    let src = source_image();
    let target = ImageReference::parse("registry.local/mirror/alpine:latest").unwrap();

    ImageCopier::new(src.registry.clone())
        .copy(&src.source, &target)
        .await
        .unwrap();
    assert!(src.registry.manifest(&target).is_some());
}
