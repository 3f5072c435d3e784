//! OCI image reference parsing.
//!
//! Parses image references like `ghcr.io/org/app:v1.0` into structured components.

use regferry_core::error::{FerryError, Result};

use super::digest::Digest;

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Namespace Docker Hub uses for single-component repositories.
const OFFICIAL_NAMESPACE: &str = "library/";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "org/app")
    pub repository: String,
    /// Tag (e.g., "latest", "v1.0")
    pub tag: Option<String>,
    /// Manifest digest
    pub digest: Option<Digest>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `nginx:1.25` → docker.io/library/nginx:1.25
    /// - `myuser/myimage` → docker.io/myuser/myimage:latest
    /// - `localhost:5000/app` → localhost:5000/app:latest
    /// - `ghcr.io/org/image@sha256:abc...` → ghcr.io/org/image@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(FerryError::InvalidReference(
                "Empty image reference".to_string(),
            ));
        }

        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name, digest)) => {
                let digest = Digest::parse(digest).map_err(|e| {
                    FerryError::InvalidReference(format!("'{}': {}", reference, e))
                })?;
                (name, Some(digest))
            }
            None => (reference, None),
        };

        // A tag colon can only appear after the last slash; a colon before
        // any slash followed by digits only is a registry port.
        let last_segment_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_segment_start..].rfind(':') {
            Some(colon) => {
                let colon = last_segment_start + colon;
                let tag = &name_tag[colon + 1..];
                let is_port = last_segment_start == 0 && tag.chars().all(|c| c.is_ascii_digit());
                if is_port {
                    (name_tag, None)
                } else {
                    (&name_tag[..colon], Some(tag.to_string()))
                }
            }
            None => (name_tag, None),
        };

        if tag.as_deref() == Some("") {
            return Err(FerryError::InvalidReference(format!(
                "Empty tag in reference '{}'",
                reference
            )));
        }

        let (registry, repository) = Self::split_registry_repository(name)?;

        // Apply default tag if no tag and no digest
        let tag = if tag.is_none() && digest.is_none() {
            Some(DEFAULT_TAG.to_string())
        } else {
            tag
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Split a name into registry and repository components.
    fn split_registry_repository(name: &str) -> Result<(String, String)> {
        // The first component is a registry if it looks like a hostname
        if let Some((first, rest)) = name.split_once('/') {
            if first.contains('.') || first.contains(':') || first == "localhost" {
                if rest.is_empty() {
                    return Err(FerryError::InvalidReference(format!(
                        "Empty repository in reference '{}'",
                        name
                    )));
                }
                return Ok((first.to_string(), rest.to_string()));
            }
        }

        if name.is_empty() || name.split('/').any(str::is_empty) {
            return Err(FerryError::InvalidReference(format!(
                "Malformed repository in reference '{}'",
                name
            )));
        }

        let repository = if name.contains('/') {
            name.to_string()
        } else {
            format!("{}{}", OFFICIAL_NAMESPACE, name)
        };

        Ok((DEFAULT_REGISTRY.to_string(), repository))
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(&digest.to_string());
        }
        s
    }

    /// Human-facing `name:tag` for the image, as loaders list it.
    ///
    /// Docker Hub names are shortened (`nginx:latest`). References that
    /// carry only a digest have no common name and return an empty string.
    pub fn common_name(&self) -> String {
        let Some(tag) = self.tag.as_deref() else {
            return String::new();
        };
        if self.repository.is_empty() {
            return String::new();
        }
        if self.registry == DEFAULT_REGISTRY {
            let repo = self
                .repository
                .strip_prefix(OFFICIAL_NAMESPACE)
                .unwrap_or(&self.repository);
            format!("{}:{}", repo, tag)
        } else {
            format!("{}/{}:{}", self.registry, self.repository, tag)
        }
    }

    /// The same repository at another tag or digest.
    pub fn with_digest(&self, digest: Digest) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: None,
            digest: Some(digest),
        }
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";

    #[test]
    fn test_parse_simple_name() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, Some("latest".to_string()));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_name_with_tag() {
        let r = ImageReference::parse("nginx:1.25").unwrap();
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, Some("1.25".to_string()));
    }

    #[test]
    fn test_parse_user_repo() {
        let r = ImageReference::parse("myuser/myimage:v1.0").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "myuser/myimage");
        assert_eq!(r.tag, Some("v1.0".to_string()));
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = ImageReference::parse("localhost:5000/app").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "app");
        assert_eq!(r.tag, Some("latest".to_string()));

        let r = ImageReference::parse("myregistry.io:5000/team/app:v1").unwrap();
        assert_eq!(r.registry, "myregistry.io:5000");
        assert_eq!(r.repository, "team/app");
        assert_eq!(r.tag, Some("v1".to_string()));
    }

    #[test]
    fn test_parse_digest_only() {
        let r = ImageReference::parse(&format!("ghcr.io/org/app@{}", DIGEST)).unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "org/app");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest.unwrap().to_string(), DIGEST);
    }

    #[test]
    fn test_parse_tag_and_digest() {
        let r = ImageReference::parse(&format!("ghcr.io/org/app:v1@{}", DIGEST)).unwrap();
        assert_eq!(r.tag, Some("v1".to_string()));
        assert!(r.digest.is_some());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse("   ").is_err());
        assert!(ImageReference::parse("nginx@invaliddigest").is_err());
        assert!(ImageReference::parse("nginx:").is_err());
        assert!(ImageReference::parse("ghcr.io/").is_err());
        assert!(ImageReference::parse("org//app").is_err());
    }

    #[test]
    fn test_full_reference() {
        let r = ImageReference::parse("nginx:1.25").unwrap();
        assert_eq!(r.to_string(), "docker.io/library/nginx:1.25");
        let r = ImageReference::parse(&format!("ghcr.io/org/app:v1@{}", DIGEST)).unwrap();
        assert_eq!(r.full_reference(), format!("ghcr.io/org/app:v1@{}", DIGEST));
    }

    #[test]
    fn test_common_name() {
        assert_eq!(
            ImageReference::parse("nginx").unwrap().common_name(),
            "nginx:latest"
        );
        assert_eq!(
            ImageReference::parse("myuser/tool:2").unwrap().common_name(),
            "myuser/tool:2"
        );
        assert_eq!(
            ImageReference::parse("ghcr.io/org/app:v1").unwrap().common_name(),
            "ghcr.io/org/app:v1"
        );
        assert_eq!(
            ImageReference::parse(&format!("ghcr.io/org/app@{}", DIGEST))
                .unwrap()
                .common_name(),
            ""
        );
    }

    #[test]
    fn test_with_digest() {
        let r = ImageReference::parse("ghcr.io/org/app:v1").unwrap();
        let pinned = r.with_digest(Digest::parse(DIGEST).unwrap());
        assert_eq!(pinned.to_string(), format!("ghcr.io/org/app@{}", DIGEST));
    }
}
