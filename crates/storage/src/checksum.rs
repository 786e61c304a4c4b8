//! Content digests for deduplication
//!
//! A [`Checksum`] is the lowercase hex digest of a byte buffer. It is the
//! dedup key of the offset table: two snapshots with the same checksum are
//! stored once. Correctness of storage therefore assumes no collisions, which
//! is why SHA-256 is the default. XXH3 is available for callers that prefer
//! speed and accept a non-cryptographic key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use xxhash_rust::xxh3::xxh3_64;

/// Digest algorithm used for checksums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    /// SHA-256, 64 hex characters (default)
    #[default]
    Sha256,
    /// XXH3-64, 16 hex characters
    Xxh3,
}

impl ChecksumAlgorithm {
    /// Length of the hex digest
    pub fn hex_len(self) -> usize {
        match self {
            ChecksumAlgorithm::Sha256 => 64,
            ChecksumAlgorithm::Xxh3 => 16,
        }
    }

    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Xxh3 => "xxh3",
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            "xxh3" => Ok(ChecksumAlgorithm::Xxh3),
            other => Err(format!(
                "unknown checksum algorithm '{}', expected \"sha256\" or \"xxh3\"",
                other
            )),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hex digest of a byte buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Digest `bytes` with `algorithm`
    pub fn compute(algorithm: ChecksumAlgorithm, bytes: &[u8]) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => {
                let digest = Sha256::digest(bytes);
                Checksum(hex(&digest))
            }
            ChecksumAlgorithm::Xxh3 => Checksum(format!("{:016x}", xxh3_64(bytes))),
        }
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the digest has the length and alphabet `algorithm` produces
    pub fn is_well_formed(&self, algorithm: ChecksumAlgorithm) -> bool {
        self.0.len() == algorithm.hex_len()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}
