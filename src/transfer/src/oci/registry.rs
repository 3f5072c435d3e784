//! Registry accessor: manifest and blob operations against a container registry.
//!
//! [`Registry`] is the seam the copy, export and inspect pipelines are written
//! against. [`RegistryClient`] implements it with the `oci-distribution` crate
//! (Docker Hub, GHCR, any distribution-spec registry).

use async_trait::async_trait;
use futures::TryStreamExt;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::OciDistributionError;
use oci_distribution::manifest::{OciDescriptor, OciManifest};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};
use regferry_core::error::{FerryError, Result};
use regferry_core::{FerryConfig, Protocol};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use super::digest::Digest;
use super::manifest::ImageManifest;
use super::reference::ImageReference;

/// Byte stream of a blob as served by the registry (still compressed for layers).
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// A blob being downloaded.
pub struct Blob {
    /// Content stream
    pub reader: BlobReader,
    /// Digest that was requested
    pub digest: Digest,
}

/// Manifest and blob operations the transfer pipelines consume.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch the single-platform image manifest at `reference`.
    async fn fetch_manifest(&self, reference: &ImageReference) -> Result<ImageManifest>;

    /// Open a blob of the repository named by `reference`.
    ///
    /// An empty `accepted_media_types` accepts any type.
    async fn fetch_blob(
        &self,
        reference: &ImageReference,
        digest: &Digest,
        accepted_media_types: &[&str],
    ) -> Result<Blob>;

    /// Make the blob `digest` of `source` available in `target`'s repository.
    async fn copy_blob(
        &self,
        source: &ImageReference,
        target: &ImageReference,
        digest: &Digest,
    ) -> Result<()>;

    /// Push `manifest` to `reference`, returning the manifest's location.
    async fn push_manifest(
        &self,
        reference: &ImageReference,
        manifest: &ImageManifest,
    ) -> Result<String>;
}

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Plain HTTP for every registry, or only for `http_registries`.
fn client_protocol(config: &FerryConfig) -> ClientProtocol {
    match config.protocol {
        Protocol::Http => ClientProtocol::Http,
        Protocol::Https if config.http_registries.is_empty() => ClientProtocol::Https,
        Protocol::Https => ClientProtocol::HttpsExcept(config.http_registries.clone()),
    }
}

/// [`Registry`] implementation over the OCI distribution HTTP API.
pub struct RegistryClient {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryClient {
    /// Create a client with anonymous authentication over HTTPS.
    pub fn new() -> Self {
        Self::with_auth(RegistryAuth::anonymous())
    }

    /// Create a client with the given authentication over HTTPS.
    pub fn with_auth(auth: RegistryAuth) -> Self {
        Self::from_config(&FerryConfig::default(), auth)
    }

    /// Create a client honoring the protocol settings of `config`.
    pub fn from_config(config: &FerryConfig, auth: RegistryAuth) -> Self {
        let client = Client::new(ClientConfig {
            protocol: client_protocol(config),
            ..Default::default()
        });
        Self { client, auth }
    }

    async fn authenticate(
        &self,
        oci_ref: &Reference,
        reference: &ImageReference,
        operation: RegistryOperation,
    ) -> Result<()> {
        self.client
            .auth(oci_ref, &self.auth.to_oci_auth(), operation)
            .await
            .map_err(|e| registry_error(reference, "Failed to authenticate", e))?;
        Ok(())
    }

    /// Mount `digest` from the source repository when both live on one registry.
    async fn try_mount(
        &self,
        source: &Reference,
        target: &Reference,
        target_ref: &ImageReference,
        digest: &Digest,
    ) -> bool {
        match self
            .client
            .mount_blob(target, source, &digest.to_string())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    target = %target_ref,
                    digest = %digest,
                    error = %e,
                    "Cross-repository mount failed, falling back to upload"
                );
                false
            }
        }
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn fetch_manifest(&self, reference: &ImageReference) -> Result<ImageManifest> {
        let oci_ref = to_oci_reference(reference)?;

        tracing::debug!(reference = %reference, "Fetching manifest");
        let (manifest, digest) = self
            .client
            .pull_manifest(&oci_ref, &self.auth.to_oci_auth())
            .await
            .map_err(|e| match e {
                OciDistributionError::ImageManifestNotFoundError(_) => {
                    FerryError::NotFound(format!("manifest for {}", reference))
                }
                other => registry_error(reference, "Failed to pull manifest", other),
            })?;

        match manifest {
            OciManifest::Image(image) => {
                tracing::debug!(reference = %reference, digest = %digest, "Fetched manifest");
                Ok(ImageManifest::new(image))
            }
            OciManifest::ImageIndex(_) => Err(FerryError::UnsupportedManifest(format!(
                "{} is a manifest list; reference a single platform by digest",
                reference
            ))),
        }
    }

    async fn fetch_blob(
        &self,
        reference: &ImageReference,
        digest: &Digest,
        accepted_media_types: &[&str],
    ) -> Result<Blob> {
        let oci_ref = to_oci_reference(reference)?;
        self.authenticate(&oci_ref, reference, RegistryOperation::Pull)
            .await?;

        tracing::debug!(
            reference = %reference,
            digest = %digest,
            accept = ?accepted_media_types,
            "Fetching blob"
        );
        let descriptor = OciDescriptor {
            digest: digest.to_string(),
            media_type: accepted_media_types.first().copied().unwrap_or_default().to_string(),
            ..Default::default()
        };
        let stream = self
            .client
            .pull_blob_stream(&oci_ref, &descriptor)
            .await
            .map_err(|e| registry_error(reference, &format!("Failed to pull blob {}", digest), e))?;

        Ok(Blob {
            reader: Box::new(StreamReader::new(Box::pin(
                stream.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
            ))),
            digest: digest.clone(),
        })
    }

    async fn copy_blob(
        &self,
        source: &ImageReference,
        target: &ImageReference,
        digest: &Digest,
    ) -> Result<()> {
        let source_ref = to_oci_reference(source)?;
        let target_ref = to_oci_reference(target)?;
        self.authenticate(&target_ref, target, RegistryOperation::Push)
            .await?;

        if source.registry == target.registry
            && self.try_mount(&source_ref, &target_ref, target, digest).await
        {
            tracing::debug!(digest = %digest, target = %target, "Mounted blob");
            return Ok(());
        }

        self.authenticate(&source_ref, source, RegistryOperation::Pull)
            .await?;
        let descriptor = OciDescriptor {
            digest: digest.to_string(),
            ..Default::default()
        };
        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&source_ref, &descriptor, &mut data)
            .await
            .map_err(|e| registry_error(source, &format!("Failed to pull blob {}", digest), e))?;

        self.client
            .push_blob(&target_ref, &data, &digest.to_string())
            .await
            .map_err(|e| registry_error(target, &format!("Failed to push blob {}", digest), e))?;

        tracing::debug!(digest = %digest, size = data.len(), target = %target, "Uploaded blob");
        Ok(())
    }

    async fn push_manifest(
        &self,
        reference: &ImageReference,
        manifest: &ImageManifest,
    ) -> Result<String> {
        let oci_ref = to_oci_reference(reference)?;
        self.authenticate(&oci_ref, reference, RegistryOperation::Push)
            .await?;

        let url = self
            .client
            .push_manifest(&oci_ref, &OciManifest::Image(manifest.as_oci().clone()))
            .await
            .map_err(|e| registry_error(reference, "Failed to push manifest", e))?;

        tracing::debug!(reference = %reference, url = %url, "Pushed manifest");
        Ok(url)
    }
}

fn registry_error(
    reference: &ImageReference,
    context: &str,
    err: OciDistributionError,
) -> FerryError {
    FerryError::RegistryError {
        registry: reference.registry.clone(),
        message: format!("{}: {}", context, err),
    }
}

/// Convert an ImageReference to an oci-distribution Reference.
fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
    let ref_str = reference.full_reference();
    ref_str.parse::<Reference>().map_err(|e| {
        FerryError::InvalidReference(format!("Invalid OCI reference '{}': {}", ref_str, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";

    #[test]
    fn test_client_protocol() {
        let mut config = FerryConfig::default();
        assert!(matches!(client_protocol(&config), ClientProtocol::Https));

        config.http_registries = vec!["localhost:5000".to_string()];
        match client_protocol(&config) {
            ClientProtocol::HttpsExcept(hosts) => assert_eq!(hosts, config.http_registries),
            _ => panic!("expected per-registry http"),
        }

        config.protocol = Protocol::Http;
        assert!(matches!(client_protocol(&config), ClientProtocol::Http));
    }

    #[test]
    fn test_registry_auth_anonymous() {
        let auth = RegistryAuth::anonymous();
        assert!(auth.username.is_none());
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_registry_auth_basic() {
        let auth = RegistryAuth::basic("user", "pass");
        assert_eq!(auth.username, Some("user".to_string()));
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Basic(_, _)));
    }

    #[test]
    fn test_to_oci_reference_with_tag() {
        let r = ImageReference::parse("ghcr.io/org/app:v0.1.0").unwrap();
        let oci_ref = to_oci_reference(&r).unwrap();
        assert_eq!(oci_ref.to_string(), "ghcr.io/org/app:v0.1.0");
    }

    #[test]
    fn test_to_oci_reference_with_digest() {
        let r = ImageReference::parse(&format!("ghcr.io/org/app@{}", DIGEST)).unwrap();
        let oci_ref = to_oci_reference(&r).unwrap();
        assert_eq!(oci_ref.digest(), Some(DIGEST));
    }

    #[test]
    fn test_to_oci_reference_docker_hub() {
        let r = ImageReference::parse("nginx").unwrap();
        let oci_ref = to_oci_reference(&r).unwrap();
        assert_eq!(oci_ref.repository(), "library/nginx");
        assert_eq!(oci_ref.tag(), Some("latest"));
    }
}
