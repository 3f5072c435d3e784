//! Docker archive layout: staging directory and tar packaging.
//!
//! The legacy `docker load` format is a plain tar containing:
//!
//! ```text
//! manifest.json                 [{"Config": ..., "RepoTags": [...], "Layers": [...]}]
//! <config-digest-hex>.json      image configuration
//! <diff-id-hex>/layer.tar       one uncompressed tar per layer
//! ```

use std::fs::{File, FileTimes};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regferry_core::error::{FerryError, Result};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::digest::DiffId;

/// Name of the archive manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Name of the tar file inside each layer directory.
pub const LAYER_TAR: &str = "layer.tar";

/// One image entry of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifestEntry {
    #[serde(rename = "Config")]
    pub config: String,
    #[serde(rename = "RepoTags")]
    pub repo_tags: Vec<String>,
    #[serde(rename = "Layers")]
    pub layers: Vec<String>,
}

/// Scoped staging directory for one export.
///
/// Removed with everything in it when dropped, whichever way the export ends.
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh staging directory under `parent` (or the system temp dir).
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("regferry-export-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| FerryError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to create temp directory: {}", e),
        )))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create the provisional directory for layer `index`.
    pub fn layer_staging(&self, index: usize) -> Result<PathBuf> {
        let path = self.path().join(format!("layer-{}", index));
        std::fs::create_dir(&path)?;
        Ok(path)
    }

    /// Move a finished staging directory to its content-derived name.
    ///
    /// Returns the archive-relative path of the layer tar. When an identical
    /// layer was already committed the staging copy is discarded.
    pub fn commit_layer(&self, staging: &Path, diff_id: &DiffId, mtime: SystemTime) -> Result<String> {
        let final_dir = self.path().join(diff_id.encoded());
        if final_dir.exists() {
            std::fs::remove_dir_all(staging)?;
        } else {
            std::fs::rename(staging, &final_dir)?;
            set_mtime(&final_dir.join(LAYER_TAR), mtime)?;
            set_mtime(&final_dir, mtime)?;
        }
        Ok(format!("{}/{}", diff_id.encoded(), LAYER_TAR))
    }

    /// Write a top-level file and stamp it with `mtime`.
    pub fn write_file(&self, name: &str, data: &[u8], mtime: SystemTime) -> Result<PathBuf> {
        let path = self.path().join(name);
        super::layers::write_synced(&path, data)?;
        set_mtime(&path, mtime)?;
        Ok(path)
    }
}

/// Set access and modification time of a file or directory.
pub fn set_mtime(path: &Path, time: SystemTime) -> Result<()> {
    let file = File::open(path)?;
    file.set_times(FileTimes::new().set_accessed(time).set_modified(time))?;
    Ok(())
}

/// Write the archive rooted at `root` as an uncompressed tar.
///
/// Entries are emitted in a fixed order: the config file, each distinct layer
/// directory with its tar, then `manifest.json`. Names are relative to `root`.
pub fn write_archive<W: Write>(root: &Path, entry: &ArchiveManifestEntry, out: W) -> Result<W> {
    let mut builder = tar::Builder::new(out);
    builder.follow_symlinks(false);

    builder.append_path_with_name(root.join(&entry.config), &entry.config)?;

    let mut seen = std::collections::HashSet::new();
    for layer in &entry.layers {
        if !seen.insert(layer.as_str()) {
            continue;
        }
        let dir = layer
            .split_once('/')
            .map(|(dir, _)| dir)
            .ok_or_else(|| FerryError::Other(format!("Malformed layer path '{}'", layer)))?;
        builder.append_dir(dir, root.join(dir))?;
        builder.append_path_with_name(root.join(layer), layer)?;
    }

    builder.append_path_with_name(root.join(MANIFEST_FILE), MANIFEST_FILE)?;

    Ok(builder.into_inner()?)
}

/// Stream the archive rooted at `root` into an async sink.
///
/// The tar encoder runs on a blocking thread writing into an in-memory pipe
/// that this task drains into `out`. Returns the number of bytes written.
pub async fn stream_archive<W: AsyncWrite + Unpin>(
    root: PathBuf,
    entry: ArchiveManifestEntry,
    out: &mut W,
) -> Result<u64> {
    let (tx, mut rx) = tokio::io::duplex(64 * 1024);
    let dest = tokio_util::io::SyncIoBridge::new(tx);
    let writer = tokio::task::spawn_blocking(move || {
        let mut dest = write_archive(&root, &entry, dest)?;
        dest.flush()?;
        Ok::<_, FerryError>(())
    });
    let copier = tokio::io::copy(&mut rx, out);
    let (written, copied) = tokio::join!(writer, copier);
    let copied = copied?;
    written.map_err(|e| FerryError::Other(format!("archive task failed: {}", e)))??;
    out.flush().await?;
    Ok(copied)
}
