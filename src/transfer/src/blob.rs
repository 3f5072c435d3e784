//! Raw blob download.

use regferry_core::error::Result;
use regferry_core::{IntegrityPolicy, Reporter};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::integrity::verify_digest;
use crate::oci::{Digest, Digester, ImageReference, Registry};

/// Copy the blob `digest` of `reference` verbatim into `out`.
///
/// Bytes are hashed as they pass through and checked against `digest` once
/// the stream ends. Returns the number of bytes written.
pub async fn download_blob<W: AsyncWrite + Unpin>(
    registry: &dyn Registry,
    reporter: &dyn Reporter,
    policy: IntegrityPolicy,
    reference: &ImageReference,
    digest: &Digest,
    out: &mut W,
) -> Result<u64> {
    let mut blob = registry.fetch_blob(reference, digest, &[]).await?;
    let mut digester = Digester::new(digest.algorithm());
    let mut buf = vec![0u8; 64 * 1024];
    let mut written = 0u64;

    loop {
        let n = blob.reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        digester.update(&buf[..n]);
        out.write_all(&buf[..n]).await?;
        written += n as u64;
    }
    out.flush().await?;

    tracing::debug!(digest = %digest, size = written, "Downloaded blob");
    verify_digest(
        policy,
        reporter,
        &format!("blob {}", digest),
        digest,
        &digester.finish(),
    )?;
    Ok(written)
}
