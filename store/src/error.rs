//! Error types for the SMT store.
//!
//! Usage errors (empty keys, empty values, reading an exhausted iterator)
//! are programmer errors and panic at the call site. Everything here is a
//! recoverable, per-call condition: backend reads, tree reads, and the
//! versioning/query surface.

use smtstore_primitives::{TreeError, Version};

/// Failure reported by a [`KvBackend`](crate::backend::KvBackend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backend error: {0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Top-level error type for the store crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The persistent backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The tree engine failed (missing node, undecodable node).
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// The requested height was never committed or has been pruned.
    #[error("version {requested} is not available (latest committed: {latest})")]
    VersionUnavailable { requested: Version, latest: Version },

    /// `set_initial_version` was called after the first commit.
    #[error("initial version must be set before the first commit (latest committed: {0})")]
    InitialVersionAfterCommit(Version),

    /// A version number outside the accepted range.
    #[error("invalid version {0}")]
    InvalidVersion(Version),

    /// Query path not served by this store.
    #[error("unknown query path {0:?}")]
    UnknownQueryPath(String),

    /// Malformed query request.
    #[error("invalid query request: {0}")]
    InvalidRequest(String),

    /// The capability exists in the interface but is not supported here.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),

    /// Commit metadata read back from the backend is malformed.
    #[error("corrupt commit metadata: {0}")]
    CorruptMetadata(String),
}

impl StoreError {
    /// Returns true for the "height not available" condition, as opposed to
    /// a missing key (which is not an error at all).
    pub fn is_version_unavailable(&self) -> bool {
        matches!(self, Self::VersionUnavailable { .. })
    }
}

/// Convenience result type for the store crate.
pub type StoreResult<T> = core::result::Result<T, StoreError>;
