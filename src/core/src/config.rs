use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FerryError, Result};

/// Environment variable overriding [`FerryConfig::digest_algorithm`].
pub const ENV_DIGEST_ALGORITHM: &str = "REGFERRY_DIGEST_ALGORITHM";
/// Environment variable overriding [`FerryConfig::integrity`].
pub const ENV_INTEGRITY: &str = "REGFERRY_INTEGRITY";
/// Environment variable overriding [`FerryConfig::work_dir`].
pub const ENV_WORK_DIR: &str = "REGFERRY_WORK_DIR";

/// Hash algorithm used for content digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Name as it appears in a digest string prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex encoding of a digest under this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DigestAlgorithm {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(FerryError::ConfigError(format!(
                "unknown digest algorithm: '{}' (supported: sha256, sha512)",
                s
            ))),
        }
    }
}

/// What to do when fetched content does not hash to its declared digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
    /// Report the mismatch and keep going.
    #[default]
    Warn,
    /// Abort the operation.
    Enforce,
}

impl std::str::FromStr for IntegrityPolicy {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "warn" => Ok(Self::Warn),
            "enforce" => Ok(Self::Enforce),
            _ => Err(FerryError::ConfigError(format!(
                "unknown integrity policy: '{}' (supported: warn, enforce)",
                s
            ))),
        }
    }
}

/// Registry transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Https,
    Http,
}

/// Regferry configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    /// Algorithm for recomputed layer and config digests
    pub digest_algorithm: DigestAlgorithm,

    /// Handling of digest mismatches on fetched blobs
    pub integrity: IntegrityPolicy,

    /// Default registry protocol
    pub protocol: Protocol,

    /// Registries always reached over plain HTTP
    pub http_registries: Vec<String>,

    /// Parent directory for export staging directories
    pub work_dir: Option<PathBuf>,
}

impl FerryConfig {
    /// Default config file location (`~/.regferry/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".regferry").join("config.yaml"))
    }

    /// Load the config file at the default location (if any) and apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            FerryError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&data)?)
    }

    /// Apply `REGFERRY_*` environment variable overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(alg) = lookup(ENV_DIGEST_ALGORITHM) {
            self.digest_algorithm = alg.parse()?;
        }
        if let Some(policy) = lookup(ENV_INTEGRITY) {
            self.integrity = policy.parse()?;
        }
        if let Some(dir) = lookup(ENV_WORK_DIR) {
            self.work_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = FerryConfig::default();
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(config.integrity, IntegrityPolicy::Warn);
        assert_eq!(config.protocol, Protocol::Https);
        assert!(config.work_dir.is_none());
    }

    #[test]
    fn test_from_file_partial() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            "integrity: enforce\nhttp_registries:\n  - localhost:5000\n",
        )
        .unwrap();

        let config = FerryConfig::from_file(&path).unwrap();
        assert_eq!(config.integrity, IntegrityPolicy::Enforce);
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.http_registries, vec!["localhost:5000".to_string()]);
    }

    #[test]
    fn test_from_file_missing() {
        let result = FerryConfig::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(FerryError::ConfigError(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DIGEST_ALGORITHM, "sha512"),
            (ENV_INTEGRITY, "enforce"),
            (ENV_WORK_DIR, "/var/tmp/ferry"),
        ]
        .into_iter()
        .collect();

        let mut config = FerryConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha512);
        assert_eq!(config.integrity, IntegrityPolicy::Enforce);
        assert_eq!(config.work_dir, Some(PathBuf::from("/var/tmp/ferry")));
    }

    #[test]
    fn test_bad_override() {
        let mut config = FerryConfig::default();
        let result = config.apply_overrides(|k| {
            (k == ENV_DIGEST_ALGORITHM).then(|| "md5".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_digest_algorithm_parse() {
        assert_eq!("sha256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(DigestAlgorithm::Sha512.to_string(), "sha512");
        assert_eq!(DigestAlgorithm::Sha512.hex_len(), 128);
        assert!("SHA1".parse::<DigestAlgorithm>().is_err());
    }
}
