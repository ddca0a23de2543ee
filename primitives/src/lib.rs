//! `smtstore-primitives`: hash types, codec, and sparse Merkle tree for the
//! SMT store.
//!
//! This crate provides the pieces the store builds on:
//!
//! - [`types`]: `Hash`, `Version`, `CommitId`, path bit helpers
//! - [`crypto`]: the pluggable [`TreeHasher`] (SHA-256 default, BLAKE3)
//! - [`merkle`]: the persistent [`SparseMerkleTree`] over a [`NodeStore`]
//! - [`proof`]: membership / non-membership [`SparseMerkleProof`]s
//! - [`codec`]: deterministic binary encoding of nodes and proofs

pub mod types;
pub mod error;
pub mod crypto;
pub mod codec;
pub mod merkle;
pub mod proof;

// Re-export commonly used types at the crate root for convenience.
pub use types::{hash_to_hex, CommitId, Hash, Version, ZERO_HASH};
pub use error::{TreeError, TreeResult};
pub use crypto::{Blake3Hasher, Sha256Hasher, TreeHasher};
pub use merkle::{MemNodeStore, Node, NodeStore, SparseMerkleTree};
pub use proof::{ProofLeaf, SparseMerkleProof};
