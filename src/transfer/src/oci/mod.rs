//! OCI image model and registry access.

pub mod archive;
pub mod digest;
pub mod image;
pub mod layers;
pub mod manifest;
pub mod memory;
pub mod reference;
pub mod registry;

pub use archive::{ArchiveManifestEntry, WorkDir};
pub use digest::{DiffId, Digest, Digester, HashingReader};
pub use image::{ImageConfig, RootFs};
pub use layers::{decompress_to_file, Compression, DecompressedLayer};
pub use manifest::{media_types, Descriptor, ImageManifest};
pub use memory::MemoryRegistry;
pub use reference::ImageReference;
pub use registry::{Blob, BlobReader, Registry, RegistryAuth, RegistryClient};
