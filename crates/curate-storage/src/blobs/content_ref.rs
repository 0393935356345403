//! Content hashes for stored blobs

use serde::{Deserialize, Serialize};

/// BLAKE3 digest and size of a blob's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    /// BLAKE3 hash of the content
    pub hash: [u8; 32],
    /// Size of the content in bytes
    pub size: u64,
}

impl ContentRef {
    pub fn new(hash: [u8; 32], size: u64) -> Self {
        Self { hash, size }
    }

    /// Compute a content reference from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self {
            hash: *hash.as_bytes(),
            size: data.len() as u64,
        }
    }

    /// Get the hash as a hex string
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Get a short hash for display (first 8 chars)
    pub fn short_hash(&self) -> String {
        hex::encode(&self.hash[..4])
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentRef({}, {} bytes)", self.short_hash(), self.size)
    }
}
