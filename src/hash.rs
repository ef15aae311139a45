// src/hash.rs

//! Content hashing for fingerprints and plan identity
//!
//! - **SHA-256**: lock file digests and plan hashes (stable, collision resistant)
//! - **XXH128**: source tree fingerprints (fast, many files)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;
use xxhash_rust::xxh3::Xxh3;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Xxh128,
}

impl HashAlgorithm {
    /// Hash output length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Xxh128 => 16,
        }
    }

    #[inline]
    pub const fn hex_len(&self) -> usize {
        self.output_len() * 2
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Xxh128 => "xxh128",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "xxh128" | "xxh3" => Ok(Self::Xxh128),
            _ => Err(format!("unknown hash algorithm: {}", s)),
        }
    }
}

/// A hash value with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest
    pub value: String,
}

impl Hash {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Format as a prefixed string (e.g., "sha256:abc123...")
    pub fn to_prefixed_string(&self) -> String {
        format!("{}:{}", self.algorithm.name(), self.value)
    }

    /// First `len` hex characters, used for directory names and log lines
    pub fn short(&self, len: usize) -> &str {
        &self.value[..len.min(self.value.len())]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Incremental hasher over any supported algorithm
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: HasherState,
}

enum HasherState {
    Sha256(Sha256),
    Xxh128(Box<Xxh3>),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Xxh128 => HasherState::Xxh128(Box::new(Xxh3::new())),
        };
        Self { algorithm, state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(hasher) => hasher.update(data),
            HasherState::Xxh128(hasher) => hasher.update(data),
        }
    }

    /// Feed a length-prefixed field so adjacent fields cannot run together
    pub fn update_field(&mut self, data: &[u8]) {
        self.update(&(data.len() as u64).to_le_bytes());
        self.update(data);
    }

    pub fn finalize(self) -> Hash {
        let value = match self.state {
            HasherState::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            HasherState::Xxh128(hasher) => format!("{:032x}", hasher.digest128()),
        };
        Hash {
            algorithm: self.algorithm,
            value,
        }
    }
}

/// Compute hash of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Hash {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Stream a reader into `hasher`
pub fn update_from_reader<R: Read>(hasher: &mut Hasher, reader: &mut R) -> io::Result<u64> {
    let mut buffer = [0u8; 8192];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hash() {
        let hash = hash_bytes(HashAlgorithm::Sha256, b"Hello, World!");
        assert_eq!(hash.algorithm, HashAlgorithm::Sha256);
        assert_eq!(
            hash.value,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_xxh128_length() {
        let hash = hash_bytes(HashAlgorithm::Xxh128, b"Hello, World!");
        assert_eq!(hash.value.len(), HashAlgorithm::Xxh128.hex_len());
    }

    #[test]
    fn test_streaming_matches_oneshot() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Xxh128] {
            let mut hasher = Hasher::new(algorithm);
            hasher.update(b"Hello, ");
            hasher.update(b"World!");
            assert_eq!(hasher.finalize(), hash_bytes(algorithm, b"Hello, World!"));
        }
    }

    #[test]
    fn test_update_field_separates_boundaries() {
        let mut a = Hasher::new(HashAlgorithm::Sha256);
        a.update_field(b"ab");
        a.update_field(b"c");

        let mut b = Hasher::new(HashAlgorithm::Sha256);
        b.update_field(b"a");
        b.update_field(b"bc");

        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_prefixed_and_short() {
        let hash = hash_bytes(HashAlgorithm::Sha256, b"x");
        assert!(hash.to_prefixed_string().starts_with("sha256:"));
        assert_eq!(hash.short(8).len(), 8);
        assert_eq!(hash.short(1000), hash.as_str());
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("SHA256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert_eq!("xxh3".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Xxh128));
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }
}
