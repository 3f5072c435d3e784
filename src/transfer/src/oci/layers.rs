//! Layer decompression.
//!
//! Turns a registry layer blob (gzip, bzip2, xz, zstd or plain tar) into an
//! uncompressed tar file in a single streaming pass, hashing both the
//! compressed input and the decompressed output along the way.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use regferry_core::error::{FerryError, Result};
use regferry_core::DigestAlgorithm;

use super::digest::{DiffId, Digest, HashingReader};

/// Compression format of a layer blob, detected from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

/// Longest magic number among the supported formats (xz).
const MAGIC_LEN: u64 = 6;

impl Compression {
    /// Detect the compression format from the first bytes of a stream.
    pub fn detect(header: &[u8]) -> Self {
        const GZIP: &[u8] = &[0x1f, 0x8b, 0x08];
        const BZIP2: &[u8] = b"BZh";
        const XZ: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
        const ZSTD: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

        if header.starts_with(GZIP) {
            Self::Gzip
        } else if header.starts_with(BZIP2) {
            Self::Bzip2
        } else if header.starts_with(XZ) {
            Self::Xz
        } else if header.starts_with(ZSTD) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    fn decoder<'a, R: BufRead + 'a>(&self, src: R) -> Result<Box<dyn Read + 'a>> {
        let r: Box<dyn Read + 'a> = match self {
            Self::None => Box::new(src),
            Self::Gzip => Box::new(flate2::bufread::MultiGzDecoder::new(src)),
            Self::Bzip2 => Box::new(bzip2::bufread::MultiBzDecoder::new(src)),
            Self::Xz => Box::new(xz2::bufread::XzDecoder::new_multi_decoder(src)),
            Self::Zstd => Box::new(
                zstd::stream::read::Decoder::with_buffer(src)
                    .map_err(|e| FerryError::DecompressionError(format!("zstd: {}", e)))?,
            ),
        };
        Ok(r)
    }
}

/// Result of decompressing one layer blob to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressedLayer {
    /// Digest of the decompressed tar stream
    pub diff_id: DiffId,
    /// Digest of the blob as received, under the algorithm it was declared with
    pub blob_digest: Digest,
    /// Detected compression
    pub compression: Compression,
    /// Bytes received from the registry
    pub compressed_size: u64,
    /// Bytes written to the tar file
    pub size: u64,
}

/// Decompress `src` into a new file at `dest`.
///
/// `blob_algorithm` hashes the raw input (to check it against the
/// descriptor), `diff_algorithm` hashes the decompressed output.
pub fn decompress_to_file(
    src: impl Read,
    dest: &Path,
    blob_algorithm: DigestAlgorithm,
    diff_algorithm: DigestAlgorithm,
) -> Result<DecompressedLayer> {
    let decompress_err =
        |e: std::io::Error| FerryError::DecompressionError(format!("{}: {}", dest.display(), e));

    let mut source = HashingReader::new(src, blob_algorithm);

    // A single read may return fewer bytes than the magic number.
    let mut header = Vec::with_capacity(MAGIC_LEN as usize);
    (&mut source)
        .take(MAGIC_LEN)
        .read_to_end(&mut header)
        .map_err(decompress_err)?;
    let compression = Compression::detect(&header);
    let mut compressed = BufReader::new(Cursor::new(header).chain(&mut source));

    let mut out = BufWriter::new(File::create(dest)?);
    let (diff_digester, size) = {
        let decoder = compression.decoder(&mut compressed)?;
        let mut tar = HashingReader::new(decoder, diff_algorithm);
        std::io::copy(&mut tar, &mut out).map_err(decompress_err)?;
        tar.finish()
    };
    out.into_inner()
        .map_err(|e| FerryError::IoError(e.into_error()))?
        .sync_all()?;

    // Anything after the end of the compressed stream still belongs to the blob.
    std::io::copy(&mut compressed, &mut std::io::sink()).map_err(decompress_err)?;
    drop(compressed);
    let (blob_digester, compressed_size) = source.finish();

    Ok(DecompressedLayer {
        diff_id: diff_digester.finish_diff_id(),
        blob_digest: blob_digester.finish(),
        compression,
        compressed_size,
        size,
    })
}

/// Write `data` to `path`, fsync'd.
pub(crate) fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
