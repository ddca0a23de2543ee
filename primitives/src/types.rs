//! Core type aliases and constants for the SMT store.
//!
//! These types are shared by the tree engine, the store façade, and anything
//! that reports committed state (e.g. a status endpoint reading `CommitId`).

use serde::{Deserialize, Serialize};

/// 32-byte hash used for tree nodes, key paths, and root commitments.
pub type Hash = [u8; 32];

/// Committed version number (monotonically increasing).
pub type Version = i64;

/// Hash of an empty subtree, and the root of an empty tree.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Length in bits of a key path through the tree.
pub const PATH_BITS: usize = 256;

/// Identifies one committed snapshot: the version and the root hash frozen
/// at that version.
///
/// `CommitId::default()` (version 0, zero hash) is returned before anything
/// has been committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId {
    pub version: Version,
    pub hash: Hash,
}

impl CommitId {
    pub fn new(version: Version, hash: Hash) -> Self {
        Self { version, hash }
    }

    /// Returns true if this is the "nothing committed yet" sentinel.
    pub fn is_zero(&self) -> bool {
        self.version == 0 && self.hash == ZERO_HASH
    }
}

impl core::fmt::Display for CommitId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CommitId{{{}:{}}}", self.version, hash_to_hex(&self.hash))
    }
}

/// Convert a `Hash` to a hex string for display purposes.
pub fn hash_to_hex(hash: &Hash) -> String {
    use core::fmt::Write;
    let mut s = String::with_capacity(66);
    s.push_str("0x");
    for byte in hash {
        let _ = write!(s, "{:02x}", byte);
    }
    s
}

/// Returns bit `index` of `path`, most significant bit first.
///
/// Bit 0 decides the branch taken at the root.
pub fn path_bit(path: &Hash, index: usize) -> bool {
    let byte = path[index / 8];
    (byte >> (7 - (index % 8))) & 1 == 1
}

/// Number of leading bits shared by two paths.
pub fn common_prefix_bits(a: &Hash, b: &Hash) -> usize {
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = x ^ y;
        if diff != 0 {
            return i * 8 + diff.leading_zeros() as usize;
        }
    }
    PATH_BITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_to_hex() {
        let hash = [0xab; 32];
        let hex = hash_to_hex(&hash);
        assert_eq!(hex.len(), 66); // "0x" + 64 hex chars
        assert!(hex.starts_with("0x"));
        assert!(hex[2..].chars().all(|c| c == 'a' || c == 'b'));
    }

    #[test]
    fn test_commit_id_zero() {
        assert!(CommitId::default().is_zero());
        assert!(!CommitId::new(1, ZERO_HASH).is_zero());
        assert!(!CommitId::new(0, [1u8; 32]).is_zero());
    }

    #[test]
    fn test_path_bit_msb_first() {
        let mut path = ZERO_HASH;
        path[0] = 0b1000_0001;
        assert!(path_bit(&path, 0));
        assert!(!path_bit(&path, 1));
        assert!(path_bit(&path, 7));
        assert!(!path_bit(&path, 8));
    }

    #[test]
    fn test_common_prefix_bits() {
        let a = ZERO_HASH;
        assert_eq!(common_prefix_bits(&a, &a), PATH_BITS);

        let mut b = ZERO_HASH;
        b[0] = 0b0010_0000;
        assert_eq!(common_prefix_bits(&a, &b), 2);

        let mut c = ZERO_HASH;
        c[3] = 0x01;
        assert_eq!(common_prefix_bits(&a, &c), 31);
    }
}
