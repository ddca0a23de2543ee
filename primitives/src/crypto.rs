//! Hash functions for the sparse Merkle tree.
//!
//! The tree is generic over a [`TreeHasher`]; the hash algorithm is a
//! pluggable primitive. SHA-256 is the default, BLAKE3 is available for
//! deployments that prefer it. All hashing is deterministic.

use crate::types::Hash;

/// A 32-byte digest function used for key paths and node hashes.
pub trait TreeHasher: Send + Sync + 'static {
    /// Short name, recorded in logs.
    const NAME: &'static str;

    /// Hash `data` to 32 bytes.
    fn digest(data: &[u8]) -> Hash;

    /// Hash the concatenation of `parts` without allocating.
    fn digest_parts(parts: &[&[u8]]) -> Hash;
}

/// SHA-256 tree hasher (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl TreeHasher for Sha256Hasher {
    const NAME: &'static str = "sha256";

    fn digest(data: &[u8]) -> Hash {
        hash_sha256(data)
    }

    fn digest_parts(parts: &[&[u8]]) -> Hash {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        hash
    }
}

/// BLAKE3 tree hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl TreeHasher for Blake3Hasher {
    const NAME: &'static str = "blake3";

    fn digest(data: &[u8]) -> Hash {
        hash_blake3(data)
    }

    fn digest_parts(parts: &[&[u8]]) -> Hash {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        *hasher.finalize().as_bytes()
    }
}

/// Compute BLAKE3 hash of the input data.
pub fn hash_blake3(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Compute SHA-256 hash of the input data.
pub fn hash_sha256(data: &[u8]) -> Hash {
    use sha2::Digest;
    let result = sha2::Sha256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}
