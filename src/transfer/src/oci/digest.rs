//! Content digests.
//!
//! Two digest spaces meet in an exported image: the registry addresses a
//! layer by the digest of its *compressed* blob, while the image config's
//! `rootfs.diff_ids` and the docker archive address it by the digest of the
//! *decompressed* tar stream. [`Digest`] is the plain value; [`DiffId`] is
//! only ever produced by hashing decompressed bytes (or read back from a
//! config document), so the two cannot be mixed up by accident.

use std::io::{Read, Write};

use regferry_core::error::{FerryError, Result};
use regferry_core::DigestAlgorithm;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256, Sha512};

/// A content digest, `<algorithm>:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    encoded: String,
}

impl Digest {
    /// Parse a digest string such as `sha256:e3b0c442...`.
    pub fn parse(s: &str) -> Result<Self> {
        let (alg, hex) = s
            .split_once(':')
            .ok_or_else(|| FerryError::InvalidDigest(format!("'{}': expected algorithm:hex", s)))?;
        let algorithm: DigestAlgorithm = alg
            .parse()
            .map_err(|_| FerryError::InvalidDigest(format!("'{}': unsupported algorithm", s)))?;
        if hex.len() != algorithm.hex_len()
            || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(FerryError::InvalidDigest(format!(
                "'{}': expected {} lowercase hex characters",
                s,
                algorithm.hex_len()
            )));
        }
        Ok(Self {
            algorithm,
            encoded: hex.to_string(),
        })
    }

    /// Digest of an in-memory buffer.
    pub fn from_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut digester = Digester::new(algorithm);
        digester.update(data);
        digester.finish()
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The hex portion, without the algorithm prefix.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.encoded)
    }
}

impl std::str::FromStr for Digest {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Digest of a layer's decompressed tar stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffId(Digest);

impl DiffId {
    pub fn digest(&self) -> &Digest {
        &self.0
    }

    pub fn encoded(&self) -> &str {
        self.0.encoded()
    }
}

impl std::fmt::Display for DiffId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Incremental hasher producing a [`Digest`].
pub struct Digester {
    hasher: Hasher,
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let hasher = match algorithm {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        };
        Self { hasher }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.hasher {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finish(self) -> Digest {
        let (algorithm, encoded) = match self.hasher {
            Hasher::Sha256(h) => (DigestAlgorithm::Sha256, hex::encode(h.finalize())),
            Hasher::Sha512(h) => (DigestAlgorithm::Sha512, hex::encode(h.finalize())),
        };
        Digest { algorithm, encoded }
    }

    /// Finish as the diff ID of the decompressed bytes that were hashed.
    pub fn finish_diff_id(self) -> DiffId {
        DiffId(self.finish())
    }
}

impl Write for Digester {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reader that hashes everything read through it.
pub struct HashingReader<R> {
    inner: R,
    digester: Digester,
    count: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R, algorithm: DigestAlgorithm) -> Self {
        Self {
            inner,
            digester: Digester::new(algorithm),
            count: 0,
        }
    }

    /// Number of bytes read so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Consume the reader, returning the digest and byte count of what was read.
    pub fn finish(self) -> (Digester, u64) {
        (self.digester, self.count)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digester.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}
