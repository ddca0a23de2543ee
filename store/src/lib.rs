//! `smtstore`: a verifiable, versioned key-value store committed by a sparse
//! Merkle tree.
//!
//! The tree proves membership and non-membership of any key but cannot
//! enumerate keys in order; a separate iteration index supplies ordered
//! scans. Both live in one [`KvBackend`] alongside the commit metadata.
//!
//! - [`SmtStore`]: get/set/delete/iterate, commit, query
//! - [`KvStore`] / [`KvIterator`]: the interface shared by every layer
//! - [`CacheKv`]: write-buffering overlay flushed on `write()`
//! - [`TraceKv`]: records each access as a JSON line
//! - [`MemDb`]: in-memory `KvBackend`
//! - [`PruningOptions`] / [`StoreConfig`]: retention and open-time options
//! - [`StoreError`]: recoverable errors; usage errors panic
//!
//! The tree engine, hashers and proofs come from `smtstore-primitives`.

pub mod backend;
pub mod cachekv;
pub mod config;
pub mod error;
pub mod index;
pub mod iterator;
pub mod keys;
pub mod kv;
pub mod memdb;
pub mod nodes;
pub mod overlay;
pub mod pruning;
pub mod query;
pub mod store;
pub mod tracekv;
pub mod version;

// Re-export commonly used types at the crate root.
pub use backend::KvBackend;
pub use cachekv::CacheKv;
pub use config::StoreConfig;
pub use error::{BackendError, StoreError, StoreResult};
pub use iterator::{collect_pairs, IteratorState, KvIterator, StoreIterator};
pub use kv::KvStore;
pub use memdb::MemDb;
pub use pruning::{PruningOptions, PruningStrategy};
pub use query::{QueryRequest, QueryResponse};
pub use store::{SmtStore, StoreType};
pub use tracekv::{TraceContext, TraceKv, TraceOperation};

pub use smtstore_primitives::{CommitId, Hash, Version};
