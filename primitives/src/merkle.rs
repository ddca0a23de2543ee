//! Persistent sparse Merkle tree for deterministic state root computation.
//!
//! Every key is addressed by `path = H(key)`, a 256-bit path from the root.
//! Subtrees with no keys hash to `ZERO_HASH`. A leaf sits at the shallowest
//! depth at which no other key shares its path prefix, so a branch never has
//! a (leaf, empty) or (empty, empty) pair of children. That shape is unique
//! for a given key set, which makes the root a pure function of the
//! key→value mapping regardless of update order.
//!
//! Hashes:
//! ```text
//! leaf   = H(0x00 || path || H(value))
//! branch = H(0x01 || left || right)
//! empty  = 32 zero bytes
//! ```
//!
//! Nodes are content-addressed and written through a [`NodeStore`]. Updates
//! only ever add nodes, so any earlier root stays readable as long as its
//! nodes have not been garbage-collected by the owner of the store.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::codec::{decode_node, encode_node, BRANCH_TAG, LEAF_TAG};
use crate::crypto::{Sha256Hasher, TreeHasher};
use crate::error::{TreeError, TreeResult};
use crate::proof::{ProofLeaf, SparseMerkleProof};
use crate::types::{common_prefix_bits, path_bit, Hash, PATH_BITS, ZERO_HASH};

/// A stored tree node. Empty subtrees are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf { path: Hash, value: Vec<u8> },
    Branch { left: Hash, right: Hash },
}

/// Content-addressed storage for encoded tree nodes.
pub trait NodeStore {
    /// Fetch the encoded node stored under `hash`.
    fn get_node(&self, hash: &Hash) -> TreeResult<Option<Vec<u8>>>;

    /// Store an encoded node under its hash. Storing the same node twice
    /// must be harmless.
    fn put_node(&mut self, hash: &Hash, encoded: Vec<u8>) -> TreeResult<()>;
}

/// In-memory node store for tests and ephemeral trees.
#[derive(Debug, Clone, Default)]
pub struct MemNodeStore {
    nodes: BTreeMap<Hash, Vec<u8>>,
}

impl MemNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct nodes stored.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeStore for MemNodeStore {
    fn get_node(&self, hash: &Hash) -> TreeResult<Option<Vec<u8>>> {
        Ok(self.nodes.get(hash).cloned())
    }

    fn put_node(&mut self, hash: &Hash, encoded: Vec<u8>) -> TreeResult<()> {
        self.nodes.insert(*hash, encoded);
        Ok(())
    }
}

/// Hash a leaf node: H(LEAF_TAG || path || value_hash)
pub fn leaf_hash<H: TreeHasher>(path: &Hash, value_hash: &Hash) -> Hash {
    H::digest_parts(&[&[LEAF_TAG], path, value_hash])
}

/// Hash a branch node: H(BRANCH_TAG || left || right)
pub fn branch_hash<H: TreeHasher>(left: &Hash, right: &Hash) -> Hash {
    H::digest_parts(&[&[BRANCH_TAG], left, right])
}

/// Sparse Merkle tree over a [`NodeStore`].
///
/// The tree tracks one working root. Reads and proofs can also be served for
/// any other root whose nodes are still in the store (`get_at`, `prove_at`).
#[derive(Debug)]
pub struct SparseMerkleTree<S, H = Sha256Hasher> {
    store: S,
    root: Hash,
    _hasher: PhantomData<H>,
}

impl<S: NodeStore, H: TreeHasher> SparseMerkleTree<S, H> {
    /// Create an empty tree writing into `store`.
    pub fn new(store: S) -> Self {
        Self::import(store, ZERO_HASH)
    }

    /// Reattach to a tree previously persisted in `store` under `root`.
    ///
    /// No nodes are read until the first operation.
    pub fn import(store: S, root: Hash) -> Self {
        Self {
            store,
            root,
            _hasher: PhantomData,
        }
    }

    /// Current working root.
    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Look up a value by key at the working root.
    pub fn get(&self, key: &[u8]) -> TreeResult<Option<Vec<u8>>> {
        self.get_at(&self.root, key)
    }

    /// Look up a value by key under an arbitrary root.
    pub fn get_at(&self, root: &Hash, key: &[u8]) -> TreeResult<Option<Vec<u8>>> {
        let path = H::digest(key);
        let mut current = *root;
        let mut depth = 0;
        loop {
            match self.load(&current)? {
                None => return Ok(None),
                Some(Node::Leaf {
                    path: leaf_path,
                    value,
                }) => return Ok((leaf_path == path).then_some(value)),
                Some(Node::Branch { left, right }) => {
                    if depth >= PATH_BITS {
                        return Err(TreeError::Codec("branch below maximum depth".into()));
                    }
                    current = if path_bit(&path, depth) { right } else { left };
                    depth += 1;
                }
            }
        }
    }

    /// Insert or overwrite `key`. Returns the new root.
    ///
    /// An empty value is treated as a deletion, matching the empty-subtree
    /// convention.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> TreeResult<Hash> {
        let value = (!value.is_empty()).then_some(value);
        self.apply(key, value)
    }

    /// Remove `key`. Removing an absent key leaves the root unchanged.
    pub fn delete(&mut self, key: &[u8]) -> TreeResult<Hash> {
        self.apply(key, None)
    }

    /// Build a proof for `key` at the working root.
    pub fn prove(&self, key: &[u8]) -> TreeResult<SparseMerkleProof> {
        self.prove_at(&self.root, key)
    }

    /// Build a proof for `key` under an arbitrary root.
    pub fn prove_at(&self, root: &Hash, key: &[u8]) -> TreeResult<SparseMerkleProof> {
        let path = H::digest(key);
        let mut siblings = Vec::new();
        let mut current = *root;

        let leaf = loop {
            match self.load(&current)? {
                None => break None,
                Some(Node::Leaf {
                    path: leaf_path,
                    value,
                }) => {
                    break Some(ProofLeaf {
                        path: leaf_path,
                        value_hash: H::digest(&value),
                    })
                }
                Some(Node::Branch { left, right }) => {
                    let depth = siblings.len();
                    if depth >= PATH_BITS {
                        return Err(TreeError::Codec("branch below maximum depth".into()));
                    }
                    if path_bit(&path, depth) {
                        siblings.push(left);
                        current = right;
                    } else {
                        siblings.push(right);
                        current = left;
                    }
                }
            }
        };

        Ok(SparseMerkleProof { siblings, leaf })
    }

    fn apply(&mut self, key: &[u8], value: Option<&[u8]>) -> TreeResult<Hash> {
        let path = H::digest(key);
        let root = self.apply_at(self.root, &path, value, 0)?;
        self.root = root;
        Ok(root)
    }

    fn apply_at(
        &mut self,
        current: Hash,
        path: &Hash,
        value: Option<&[u8]>,
        depth: usize,
    ) -> TreeResult<Hash> {
        match self.load(&current)? {
            None => match value {
                Some(v) => self.put_leaf(path, v),
                None => Ok(ZERO_HASH),
            },
            Some(Node::Leaf {
                path: leaf_path, ..
            }) => {
                if leaf_path == *path {
                    return match value {
                        Some(v) => self.put_leaf(path, v),
                        None => Ok(ZERO_HASH),
                    };
                }
                match value {
                    // Different key lives here; ours is already absent.
                    None => Ok(current),
                    Some(v) => {
                        let new_leaf = self.put_leaf(path, v)?;
                        self.split(depth, (&leaf_path, current), (path, new_leaf))
                    }
                }
            }
            Some(Node::Branch { left, right }) => {
                if depth >= PATH_BITS {
                    return Err(TreeError::Codec("branch below maximum depth".into()));
                }
                let (new_left, new_right) = if path_bit(path, depth) {
                    (left, self.apply_at(right, path, value, depth + 1)?)
                } else {
                    (self.apply_at(left, path, value, depth + 1)?, right)
                };
                if new_left == left && new_right == right {
                    return Ok(current);
                }
                self.join(new_left, new_right)
            }
        }
    }

    /// Build the subtree holding two leaves whose paths first differ below
    /// `depth`.
    fn split(&mut self, depth: usize, old: (&Hash, Hash), new: (&Hash, Hash)) -> TreeResult<Hash> {
        let (old_path, old_hash) = old;
        let (new_path, new_hash) = new;
        let shared = common_prefix_bits(old_path, new_path);

        let mut node = if path_bit(new_path, shared) {
            self.put_branch(old_hash, new_hash)?
        } else {
            self.put_branch(new_hash, old_hash)?
        };
        for d in (depth..shared).rev() {
            node = if path_bit(new_path, d) {
                self.put_branch(ZERO_HASH, node)?
            } else {
                self.put_branch(node, ZERO_HASH)?
            };
        }
        Ok(node)
    }

    /// Combine two children, floating a lone leaf up so the shape stays
    /// canonical after deletions.
    fn join(&mut self, left: Hash, right: Hash) -> TreeResult<Hash> {
        match (left == ZERO_HASH, right == ZERO_HASH) {
            (true, true) => Ok(ZERO_HASH),
            (true, false) if self.is_leaf(&right)? => Ok(right),
            (false, true) if self.is_leaf(&left)? => Ok(left),
            _ => self.put_branch(left, right),
        }
    }

    fn is_leaf(&self, hash: &Hash) -> TreeResult<bool> {
        Ok(matches!(self.load(hash)?, Some(Node::Leaf { .. })))
    }

    fn load(&self, hash: &Hash) -> TreeResult<Option<Node>> {
        if *hash == ZERO_HASH {
            return Ok(None);
        }
        let encoded = self
            .store
            .get_node(hash)?
            .ok_or(TreeError::MissingNode(*hash))?;
        decode_node(&encoded).map(Some)
    }

    fn put_leaf(&mut self, path: &Hash, value: &[u8]) -> TreeResult<Hash> {
        let hash = leaf_hash::<H>(path, &H::digest(value));
        let node = Node::Leaf {
            path: *path,
            value: value.to_vec(),
        };
        self.store.put_node(&hash, encode_node(&node))?;
        Ok(hash)
    }

    fn put_branch(&mut self, left: Hash, right: Hash) -> TreeResult<Hash> {
        let hash = branch_hash::<H>(&left, &right);
        self.store
            .put_node(&hash, encode_node(&Node::Branch { left, right }))?;
        Ok(hash)
    }
}
