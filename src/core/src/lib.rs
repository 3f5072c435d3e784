//! Regferry Core - Foundational Types
//!
//! Error taxonomy, configuration and the transfer event reporter shared by
//! the transfer engine and the command-line front end.

pub mod config;
pub mod error;
pub mod event;

// Re-export commonly used types
pub use config::{DigestAlgorithm, FerryConfig, IntegrityPolicy, Protocol};
pub use error::{ErrorKind, FerryError, Result};
pub use event::{BlobKind, EventEmitter, NoopReporter, Reporter, TracingReporter, TransferEvent};

/// Regferry version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
