//! Error types for the sparse Merkle tree engine.

use crate::types::{hash_to_hex, Hash};

/// Errors raised by the tree engine and its node store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A node referenced by a parent is not present in the node store.
    /// Either the root was never persisted here or storage is corrupt.
    #[error("missing tree node {}", hash_to_hex(.0))]
    MissingNode(Hash),

    /// Node or proof bytes could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The underlying node store failed.
    #[error("node store error: {0}")]
    Store(String),
}

/// Convenience result type for tree operations.
pub type TreeResult<T> = core::result::Result<T, TreeError>;
