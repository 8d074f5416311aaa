//! Content-addressed file hashing.
//!
//! SHA-256 is the primary hash: it keys the scan cache and is the hash
//! external scanner APIs understand. BLAKE3 can be enabled additionally
//! for fast local deduplication.

use crate::core::error::ScanError;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;

/// Hashes of one file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHash {
    /// SHA-256 hash (hex), always computed; the content address.
    pub sha256: String,

    /// BLAKE3 hash (hex), optional fast hash for local dedup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
}

impl FileHash {
    /// Returns the primary (SHA-256) hash.
    pub fn primary(&self) -> &str {
        &self.sha256
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.sha256)
    }
}

/// Computes file hashes in a single pass.
///
/// # Examples
///
/// ```rust
/// use vaultscan::core::FileHasher;
///
/// // Default: SHA-256 only
/// let hasher = FileHasher::new();
/// let hash = hasher.hash_bytes(b"family photo");
/// assert_eq!(hash.sha256.len(), 64);
///
/// // With BLAKE3 for local dedup
/// let hasher = FileHasher::new().with_blake3(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileHasher {
    compute_blake3: bool,
}

impl FileHasher {
    /// Creates a new `FileHasher` with default settings (SHA-256 only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables BLAKE3 computation.
    pub fn with_blake3(mut self, enabled: bool) -> Self {
        self.compute_blake3 = enabled;
        self
    }

    /// Computes hashes from in-memory bytes.
    pub fn hash_bytes(&self, data: &[u8]) -> FileHash {
        let mut sha = Sha256::new();
        sha.update(data);
        let sha256 = hex::encode(sha.finalize());

        let blake3 = self
            .compute_blake3
            .then(|| blake3::hash(data).to_hex().to_string());

        FileHash { sha256, blake3 }
    }

    /// Computes hashes from a synchronous reader in a single streaming pass.
    pub fn hash_reader<R: Read>(&self, reader: &mut R) -> Result<FileHash, ScanError> {
        let mut sha = Sha256::new();
        let mut b3 = self.compute_blake3.then(blake3::Hasher::new);

        let mut buffer = [0u8; 64 * 1024];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }

            let chunk = &buffer[..bytes_read];
            sha.update(chunk);
            if let Some(ref mut h) = b3 {
                h.update(chunk);
            }
        }

        Ok(FileHash {
            sha256: hex::encode(sha.finalize()),
            blake3: b3.map(|h| h.finalize().to_hex().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_sha256_only() {
        let hasher = FileHasher::new();
        let hash = hasher.hash_bytes(b"hello world");

        // Well-known SHA-256 of "hello world"
        assert_eq!(
            hash.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(hash.blake3, None);
    }

    #[test]
    fn hash_bytes_with_blake3() {
        let hasher = FileHasher::new().with_blake3(true);
        let hash = hasher.hash_bytes(b"hello world");

        assert!(!hash.sha256.is_empty());
        assert!(hash.blake3.is_some());
    }

    #[test]
    fn hash_reader_matches_hash_bytes() {
        let hasher = FileHasher::new().with_blake3(true);
        let data = vec![0xABu8; 200 * 1024]; // spans multiple read chunks

        let from_bytes = hasher.hash_bytes(&data);
        let from_reader = hasher.hash_reader(&mut data.as_slice()).unwrap();

        assert_eq!(from_bytes, from_reader);
    }

    #[test]
    fn hash_display_uses_primary() {
        let hash = FileHasher::new().hash_bytes(b"x");
        assert!(format!("{hash}").starts_with("sha256:"));
        assert_eq!(hash.primary(), hash.sha256);
    }
}
