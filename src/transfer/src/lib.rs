//! Regferry transfer engine.
//!
//! Copies images between registries and exports them as `docker load`
//! archives:
//!
//! - [`ImageCopier`]: blob-by-blob copy, manifest pushed last
//! - [`ImageExporter`]: download, decompress and re-hash layers into an archive
//! - [`ImageInspector`]: fetch and decode an image configuration
//!
//! All of them work against the [`Registry`] trait; [`RegistryClient`] talks
//! to real registries and [`MemoryRegistry`] keeps everything in process.

pub mod blob;
pub mod copy;
pub mod export;
pub mod inspect;
pub mod integrity;
pub mod oci;

pub use blob::download_blob;
pub use copy::{CopySummary, ImageCopier};
pub use export::{ExportSummary, ImageExporter};
pub use inspect::ImageInspector;
pub use integrity::verify_digest;
pub use oci::{
    DiffId, Digest, ImageConfig, ImageManifest, ImageReference, MemoryRegistry, Registry,
    RegistryAuth, RegistryClient,
};
