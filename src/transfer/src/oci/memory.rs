//! In-process registry.
//!
//! Holds manifests and blobs in memory behind the [`Registry`] trait. Used to
//! exercise the pipelines without a network, including injected failures.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use regferry_core::error::{FerryError, Result};
use regferry_core::DigestAlgorithm;

use super::digest::Digest;
use super::manifest::{Descriptor, ImageManifest};
use super::reference::ImageReference;
use super::registry::{Blob, Registry};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    media_type: String,
}

#[derive(Debug, Default)]
struct Repository {
    manifests: HashMap<String, ImageManifest>,
    blobs: HashMap<Digest, StoredBlob>,
}

/// Registry that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    repositories: Mutex<HashMap<String, Repository>>,
    failing_copies: Mutex<HashSet<Digest>>,
    failing_fetches: Mutex<HashSet<Digest>>,
    pushed: Mutex<Vec<String>>,
}

fn repository_key(reference: &ImageReference) -> String {
    format!("{}/{}", reference.registry, reference.repository)
}

fn manifest_key(reference: &ImageReference) -> Result<String> {
    match (&reference.digest, &reference.tag) {
        (Some(digest), _) => Ok(digest.to_string()),
        (None, Some(tag)) => Ok(tag.clone()),
        (None, None) => Err(FerryError::InvalidReference(format!(
            "{} has neither tag nor digest",
            reference
        ))),
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob under its sha256 digest and return its descriptor.
    pub fn put_blob(
        &self,
        reference: &ImageReference,
        data: &[u8],
        media_type: &str,
    ) -> Descriptor {
        let digest = Digest::from_bytes(DigestAlgorithm::Sha256, data);
        self.put_blob_as(reference, digest, data, media_type)
    }

    /// Store a blob under an arbitrary digest, whether or not it matches.
    pub fn put_blob_as(
        &self,
        reference: &ImageReference,
        digest: Digest,
        data: &[u8],
        media_type: &str,
    ) -> Descriptor {
        let mut repos = self.repositories.lock();
        repos
            .entry(repository_key(reference))
            .or_default()
            .blobs
            .insert(
                digest.clone(),
                StoredBlob {
                    data: data.to_vec(),
                    media_type: media_type.to_string(),
                },
            );
        Descriptor::new(digest, media_type, data.len() as u64)
    }

    /// Store a manifest at the reference's tag and at its own digest.
    pub fn put_manifest(&self, reference: &ImageReference, manifest: ImageManifest) -> Result<Digest> {
        let digest = Digest::from_bytes(DigestAlgorithm::Sha256, &manifest.to_json()?);
        let mut repos = self.repositories.lock();
        let repo = repos.entry(repository_key(reference)).or_default();
        repo.manifests
            .insert(manifest_key(reference)?, manifest.clone());
        repo.manifests.insert(digest.to_string(), manifest);
        Ok(digest)
    }

    pub fn manifest(&self, reference: &ImageReference) -> Option<ImageManifest> {
        let key = manifest_key(reference).ok()?;
        self.repositories
            .lock()
            .get(&repository_key(reference))?
            .manifests
            .get(&key)
            .cloned()
    }

    pub fn has_blob(&self, reference: &ImageReference, digest: &Digest) -> bool {
        self.repositories
            .lock()
            .get(&repository_key(reference))
            .map_or(false, |repo| repo.blobs.contains_key(digest))
    }

    /// Make every later copy of `digest` fail.
    pub fn fail_copy(&self, digest: &Digest) {
        self.failing_copies.lock().insert(digest.clone());
    }

    /// Make every later fetch of `digest` fail.
    pub fn fail_fetch(&self, digest: &Digest) {
        self.failing_fetches.lock().insert(digest.clone());
    }

    /// References manifests were pushed to, in push order.
    pub fn pushed_manifests(&self) -> Vec<String> {
        self.pushed.lock().clone()
    }

    fn blob(&self, reference: &ImageReference, digest: &Digest) -> Result<StoredBlob> {
        self.repositories
            .lock()
            .get(&repository_key(reference))
            .and_then(|repo| repo.blobs.get(digest).cloned())
            .ok_or_else(|| FerryError::NotFound(format!("blob {} in {}", digest, reference)))
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn fetch_manifest(&self, reference: &ImageReference) -> Result<ImageManifest> {
        self.manifest(reference)
            .ok_or_else(|| FerryError::NotFound(format!("manifest for {}", reference)))
    }

    async fn fetch_blob(
        &self,
        reference: &ImageReference,
        digest: &Digest,
        accepted_media_types: &[&str],
    ) -> Result<Blob> {
        if self.failing_fetches.lock().contains(digest) {
            return Err(FerryError::RegistryError {
                registry: reference.registry.clone(),
                message: format!("injected fetch failure for {}", digest),
            });
        }
        let blob = self.blob(reference, digest)?;
        if !accepted_media_types.is_empty()
            && !accepted_media_types.contains(&blob.media_type.as_str())
        {
            return Err(FerryError::NotFound(format!(
                "blob {} with media type in {:?} (stored as {})",
                digest, accepted_media_types, blob.media_type
            )));
        }
        Ok(Blob {
            reader: Box::new(std::io::Cursor::new(blob.data)),
            digest: digest.clone(),
        })
    }

    async fn copy_blob(
        &self,
        source: &ImageReference,
        target: &ImageReference,
        digest: &Digest,
    ) -> Result<()> {
        if self.failing_copies.lock().contains(digest) {
            return Err(FerryError::RegistryError {
                registry: target.registry.clone(),
                message: format!("injected copy failure for {}", digest),
            });
        }
        let blob = self.blob(source, digest)?;
        self.put_blob_as(target, digest.clone(), &blob.data, &blob.media_type);
        Ok(())
    }

    async fn push_manifest(
        &self,
        reference: &ImageReference,
        manifest: &ImageManifest,
    ) -> Result<String> {
        let digest = self.put_manifest(reference, manifest.clone())?;
        self.pushed.lock().push(reference.to_string());
        Ok(format!(
            "memory://{}/v2/{}/manifests/{}",
            reference.registry, reference.repository, digest
        ))
    }
}
