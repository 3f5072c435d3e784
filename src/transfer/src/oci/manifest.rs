//! Read-only model over a fetched image manifest.
//!
//! Partial implementation of the OCI image manifest / Docker v2 schema2
//! format: only the config descriptor and the ordered layer list matter to
//! the transfer pipelines.

use oci_distribution::manifest::{OciDescriptor, OciImageManifest};
use regferry_core::error::{FerryError, Result};

use super::digest::Digest;

pub mod media_types {
    pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

    pub const DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
    pub const OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";

    pub const DOCKER_LAYER_TAR_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
    pub const OCI_LAYER_TAR: &str = "application/vnd.oci.image.layer.v1.tar";
    pub const OCI_LAYER_TAR_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
    pub const OCI_LAYER_TAR_ZSTD: &str = "application/vnd.oci.image.layer.v1.tar+zstd";

    /// Media types accepted when fetching an image configuration blob.
    pub const CONFIG_MEDIA_TYPES: &[&str] = &[DOCKER_CONFIG, OCI_CONFIG];
}

/// A blob reference inside a manifest.
///
/// `digest` is the registry's transport digest: for layers this is the
/// digest of the compressed blob, never of the decompressed tar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub digest: Digest,
    pub media_type: String,
    pub size: u64,
}

impl Descriptor {
    pub fn new(digest: Digest, media_type: impl Into<String>, size: u64) -> Self {
        Self {
            digest,
            media_type: media_type.into(),
            size,
        }
    }

    fn from_oci(desc: &OciDescriptor) -> Result<Self> {
        let digest = Digest::parse(&desc.digest)?;
        let size = u64::try_from(desc.size).map_err(|_| {
            FerryError::SerializationError(format!(
                "negative size {} for blob {}",
                desc.size, desc.digest
            ))
        })?;
        Ok(Self {
            digest,
            media_type: desc.media_type.clone(),
            size,
        })
    }

    pub(crate) fn to_oci(&self) -> OciDescriptor {
        OciDescriptor {
            media_type: self.media_type.clone(),
            digest: self.digest.to_string(),
            size: self.size as i64,
            ..Default::default()
        }
    }
}

/// A single-platform image manifest.
#[derive(Debug, Clone)]
pub struct ImageManifest {
    inner: OciImageManifest,
}

impl ImageManifest {
    pub fn new(inner: OciImageManifest) -> Self {
        Self { inner }
    }

    /// Build an OCI manifest from a config descriptor and ordered layers.
    pub fn from_parts(config: &Descriptor, layers: &[Descriptor]) -> Self {
        Self::new(OciImageManifest {
            schema_version: 2,
            media_type: Some(media_types::OCI_MANIFEST.to_string()),
            config: config.to_oci(),
            layers: layers.iter().map(Descriptor::to_oci).collect(),
            ..Default::default()
        })
    }

    /// Parse a manifest document, rejecting image indexes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        if let Some(mt) = value.get("mediaType").and_then(|v| v.as_str()) {
            if mt == media_types::OCI_INDEX || mt == media_types::DOCKER_MANIFEST_LIST {
                return Err(FerryError::UnsupportedManifest(format!(
                    "manifest lists are not supported ({})",
                    mt
                )));
            }
        }
        if value.get("manifests").is_some() {
            return Err(FerryError::UnsupportedManifest(
                "manifest lists are not supported".to_string(),
            ));
        }
        Ok(Self::new(serde_json::from_value(value)?))
    }

    /// Serialized manifest bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.inner)?)
    }

    /// Media type declared by the manifest, defaulting to the OCI type.
    pub fn media_type(&self) -> &str {
        self.inner
            .media_type
            .as_deref()
            .unwrap_or(media_types::OCI_MANIFEST)
    }

    /// Descriptor of the image configuration blob.
    pub fn config_descriptor(&self) -> Result<Descriptor> {
        Descriptor::from_oci(&self.inner.config)
    }

    /// Layer descriptors in application order (base layer first).
    pub fn layers(&self) -> Result<Vec<Descriptor>> {
        self.inner.layers.iter().map(Descriptor::from_oci).collect()
    }

    pub fn as_oci(&self) -> &OciImageManifest {
        &self.inner
    }
}

impl From<OciImageManifest> for ImageManifest {
    fn from(inner: OciImageManifest) -> Self {
        Self::new(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regferry_core::DigestAlgorithm;

    fn digest(data: &[u8]) -> Digest {
        Digest::from_bytes(DigestAlgorithm::Sha256, data)
    }

    #[test]
    fn test_from_parts_preserves_layer_order() {
        let config = Descriptor::new(digest(b"config"), media_types::OCI_CONFIG, 6);
        let layers = vec![
            Descriptor::new(digest(b"base"), media_types::OCI_LAYER_TAR_GZIP, 4),
            Descriptor::new(digest(b"app"), media_types::OCI_LAYER_TAR_GZIP, 3),
        ];
        let manifest = ImageManifest::from_parts(&config, &layers);
        assert_eq!(manifest.config_descriptor().unwrap(), config);
        assert_eq!(manifest.layers().unwrap(), layers);
        assert_eq!(manifest.media_type(), media_types::OCI_MANIFEST);
    }

    #[test]
    fn test_from_json_docker_schema2() {
        let json = format!(
            r#"{{
                "schemaVersion": 2,
                "mediaType": "{}",
                "config": {{"mediaType": "{}", "size": 7, "digest": "{}"}},
                "layers": [{{"mediaType": "{}", "size": 32, "digest": "{}"}}]
            }}"#,
            media_types::DOCKER_MANIFEST,
            media_types::DOCKER_CONFIG,
            digest(b"config"),
            media_types::DOCKER_LAYER_TAR_GZIP,
            digest(b"layer"),
        );
        let manifest = ImageManifest::from_json(json.as_bytes()).unwrap();
        assert_eq!(manifest.media_type(), media_types::DOCKER_MANIFEST);
        let layers = manifest.layers().unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].size, 32);
        assert_eq!(layers[0].digest, digest(b"layer"));
    }

    #[test]
    fn test_from_json_rejects_index() {
        let json = format!(
            r#"{{"schemaVersion": 2, "mediaType": "{}", "manifests": []}}"#,
            media_types::OCI_INDEX
        );
        let result = ImageManifest::from_json(json.as_bytes());
        assert!(matches!(result, Err(FerryError::UnsupportedManifest(_))));
    }

    #[test]
    fn test_bad_layer_digest_is_an_error() {
        let mut oci = ImageManifest::from_parts(
            &Descriptor::new(digest(b"c"), media_types::OCI_CONFIG, 1),
            &[],
        )
        .as_oci()
        .clone();
        oci.layers.push(OciDescriptor {
            digest: "sha256:nothex".to_string(),
            ..Default::default()
        });
        assert!(ImageManifest::new(oci).layers().is_err());
    }
}
