//! Membership and non-membership proofs for the sparse Merkle tree.
//!
//! A proof lists the sibling hashes met while walking from the root towards
//! the key's path, top-down, plus the leaf found at the end of that walk (if
//! any). The verifier rebuilds the root from the bottom up.
//!
//! Three shapes are possible:
//! - membership: the walk ends at the key's own leaf
//! - non-membership, empty: the walk ends at an empty subtree
//! - non-membership, other leaf: the walk ends at a leaf for a different
//!   path that shares the walked prefix

use serde::{Deserialize, Serialize};

use crate::crypto::TreeHasher;
use crate::merkle::{branch_hash, leaf_hash};
use crate::types::{common_prefix_bits, path_bit, Hash, PATH_BITS, ZERO_HASH};

/// The leaf found at the bottom of a proof walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLeaf {
    pub path: Hash,
    pub value_hash: Hash,
}

/// A sparse Merkle proof for a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseMerkleProof {
    /// Sibling hashes from the root downwards; `siblings[d]` is the sibling
    /// at depth `d`.
    pub siblings: Vec<Hash>,
    /// Leaf reached at depth `siblings.len()`, or `None` for an empty subtree.
    pub leaf: Option<ProofLeaf>,
}

impl SparseMerkleProof {
    /// Verify this proof against `root`.
    ///
    /// `value = Some(v)` checks that `key` maps to `v`; `value = None` checks
    /// that `key` is absent.
    pub fn verify<H: TreeHasher>(&self, root: &Hash, key: &[u8], value: Option<&[u8]>) -> bool {
        let depth = self.siblings.len();
        if depth > PATH_BITS {
            return false;
        }
        let path = H::digest(key);

        let mut current = match (value, &self.leaf) {
            (Some(v), leaf) => {
                let value_hash = H::digest(v);
                if let Some(leaf) = leaf {
                    if leaf.path != path || leaf.value_hash != value_hash {
                        return false;
                    }
                }
                leaf_hash::<H>(&path, &value_hash)
            }
            (None, None) => ZERO_HASH,
            (None, Some(leaf)) => {
                // The other leaf must sit on our path, otherwise it says
                // nothing about our key.
                if leaf.path == path || common_prefix_bits(&leaf.path, &path) < depth {
                    return false;
                }
                leaf_hash::<H>(&leaf.path, &leaf.value_hash)
            }
        };

        for (d, sibling) in self.siblings.iter().enumerate().rev() {
            current = if path_bit(&path, d) {
                branch_hash::<H>(sibling, &current)
            } else {
                branch_hash::<H>(&current, sibling)
            };
        }

        current == *root
    }

    /// Returns true if this proof ends at a leaf for `key`'s own path.
    pub fn is_membership<H: TreeHasher>(&self, key: &[u8]) -> bool {
        matches!(&self.leaf, Some(leaf) if leaf.path == H::digest(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Hasher;

    #[test]
    fn test_empty_tree_non_membership() {
        let proof = SparseMerkleProof {
            siblings: Vec::new(),
            leaf: None,
        };
        assert!(proof.verify::<Sha256Hasher>(&ZERO_HASH, b"anything", None));
        assert!(!proof.verify::<Sha256Hasher>(&ZERO_HASH, b"anything", Some(b"v")));
    }

    #[test]
    fn test_single_leaf_membership() {
        let path = Sha256Hasher::digest(b"k");
        let value_hash = Sha256Hasher::digest(b"v");
        let root = leaf_hash::<Sha256Hasher>(&path, &value_hash);
        let proof = SparseMerkleProof {
            siblings: Vec::new(),
            leaf: Some(ProofLeaf { path, value_hash }),
        };
        assert!(proof.is_membership::<Sha256Hasher>(b"k"));
        assert!(proof.verify::<Sha256Hasher>(&root, b"k", Some(b"v")));
        assert!(!proof.verify::<Sha256Hasher>(&root, b"k", Some(b"w")));
        assert!(!proof.verify::<Sha256Hasher>(&root, b"k", None));
    }

    #[test]
    fn test_oversized_proof_rejected() {
        let proof = SparseMerkleProof {
            siblings: vec![ZERO_HASH; PATH_BITS + 1],
            leaf: None,
        };
        assert!(!proof.verify::<Sha256Hasher>(&ZERO_HASH, b"k", None));
    }
}
