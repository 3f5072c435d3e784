use thiserror::Error;

/// Broad classification of a [`FerryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The reference could not be parsed or resolved to a usable name
    Resolution,
    /// A manifest, blob or name was not found
    NotFound,
    /// Content did not hash to its declared digest
    Integrity,
    /// Filesystem, network or stream failure
    Io,
    /// JSON or YAML encode/decode failure
    Encoding,
}

/// Regferry error types
#[derive(Error, Debug)]
pub enum FerryError {
    /// Malformed or unresolvable image reference
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Manifest, blob or image name not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed digest string
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// Downloaded content does not match its declared digest
    #[error("Digest mismatch for {subject}: expected {expected}, calculated {found}")]
    DigestMismatch {
        subject: String,
        expected: String,
        found: String,
    },

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },

    /// Manifest kind that the transfer pipeline does not handle
    #[error("Unsupported manifest: {0}")]
    UnsupportedManifest(String),

    /// Layer decompression failed
    #[error("Decompression error: {0}")]
    DecompressionError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl FerryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FerryError::InvalidReference(_) | FerryError::ConfigError(_) => ErrorKind::Resolution,
            FerryError::NotFound(_) => ErrorKind::NotFound,
            FerryError::DigestMismatch { .. } => ErrorKind::Integrity,
            FerryError::InvalidDigest(_)
            | FerryError::SerializationError(_)
            | FerryError::UnsupportedManifest(_) => ErrorKind::Encoding,
            FerryError::RegistryError { .. }
            | FerryError::DecompressionError(_)
            | FerryError::IoError(_)
            | FerryError::Other(_) => ErrorKind::Io,
        }
    }
}

impl From<serde_json::Error> for FerryError {
    fn from(err: serde_json::Error) -> Self {
        FerryError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for FerryError {
    fn from(err: serde_yaml::Error) -> Self {
        FerryError::SerializationError(err.to_string())
    }
}

/// Result type alias for regferry operations
pub type Result<T> = std::result::Result<T, FerryError>;
