// Hash utilities for acquisition hash verification
//
// MD5 and SHA-1 are the algorithms EWF stores in its hash/digest sections;
// SHA-256 is offered for examiner-side fingerprints.

use md5::Md5;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Name as used in acquisition metadata keys ("MD5", "SHA1")
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
        }
    }

    /// Get expected hash length in hex characters
    pub fn hash_length(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    /// Parse algorithm name (case-insensitive)
    fn from_str(algorithm: &str) -> Result<Self, Self::Err> {
        match algorithm.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(format!(
                "Unsupported hash algorithm: '{}'. Supported: md5, sha1, sha256",
                algorithm
            )),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Streaming Hasher - Unified interface for incremental hashing
// =============================================================================

/// Incremental hasher over one of the supported algorithms
pub enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
        }
    }

    /// Update the hash with more data
    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => Digest::update(h, data),
            StreamingHasher::Sha1(h) => Digest::update(h, data),
            StreamingHasher::Sha256(h) => Digest::update(h, data),
        }
    }

    /// Finalize and return the hash as a lowercase hex string
    pub fn finalize(self) -> String {
        match self {
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Compute hash of data using specified algorithm (one-shot, for small data)
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compare two hashes (case-insensitive, surrounding whitespace ignored)
pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
    hash1.trim().eq_ignore_ascii_case(hash2.trim())
}
