//! File digest computation and verification (MD5, SHA-1, CRC32/IEEE).
//!
//! Digests are computed on demand after a transfer completes or when an
//! existing file is checked, never inline with the download path.

use md5::Md5;
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestKind {
    Md5,
    Sha1,
    Crc32,
}

impl DigestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestKind::Md5 => "md5",
            DigestKind::Sha1 => "sha1",
            DigestKind::Crc32 => "crc32",
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestKind {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestKind::Md5),
            "sha1" | "sha-1" => Ok(DigestKind::Sha1),
            "crc32" => Ok(DigestKind::Crc32),
            _ => Err(ChecksumError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// A checksum value plus the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub kind: DigestKind,
    /// Hex value as published by the server.
    pub value: String,
}

impl ExpectedDigest {
    pub fn new(kind: DigestKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("unsupported hash type: {0}")]
    UnsupportedAlgorithm(String),
    #[error("open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

enum Hasher {
    Md5(Md5),
    Sha1(Sha1),
    Crc32(crc32fast::Hasher),
}

impl Hasher {
    fn new(kind: DigestKind) -> Self {
        match kind {
            DigestKind::Md5 => Hasher::Md5(Md5::new()),
            DigestKind::Sha1 => Hasher::Sha1(Sha1::new()),
            DigestKind::Crc32 => Hasher::Crc32(crc32fast::Hasher::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Crc32(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => hex::encode(h.finalize()),
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Crc32(h) => hex::encode(h.finalize().to_be_bytes()),
        }
    }
}

/// Compute the digest of a file and return it as lowercase hex.
/// CRC32 is rendered as 8 hex digits, big-endian, the way the archive publishes it.
pub fn digest_path(path: &Path, kind: DigestKind) -> Result<String, ChecksumError> {
    let mut f = File::open(path).map_err(|source| ChecksumError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Hasher::new(kind);
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match f.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(ChecksumError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Returns whether the file at `path` matches `expected`.
/// The expected value is lowercased before the comparison.
pub fn verify(path: &Path, expected: &ExpectedDigest) -> Result<bool, ChecksumError> {
    let computed = digest_path(path, expected.kind)?;
    Ok(computed == expected.value.trim().to_ascii_lowercase())
}

/// Like [`verify`] but takes the algorithm by name; unknown names are an error.
pub fn verify_named(path: &Path, algorithm: &str, expected: &str) -> Result<bool, ChecksumError> {
    let kind: DigestKind = algorithm.parse()?;
    verify(path, &ExpectedDigest::new(kind, expected))
}
