//! Persistent key-value backend abstraction.
//!
//! `KvBackend` is the durable substrate the store writes into. Three logical
//! key spaces share one backend (see [`keys`](crate::keys)): tree nodes,
//! iteration index entries, and commit metadata.
//!
//! Implementations:
//! - [`MemDb`](crate::memdb::MemDb) (this crate): in-memory `BTreeMap`
//! - any durable ordered KV engine, wrapped to this trait by the embedder

use std::ops::Bound;
use std::sync::Arc;

use crate::error::BackendError;

/// Ordered byte-key → byte-value storage.
///
/// Methods take `&self`; implementations provide their own interior
/// synchronization and must be safe to call from several threads.
pub trait KvBackend: Send + Sync {
    /// Get the value stored under `key`, `Ok(None)` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError>;

    /// Check if `key` exists.
    ///
    /// Default implementation uses `get()`, but backends may optimize this.
    fn has(&self, key: &[u8]) -> Result<bool, BackendError> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite `key`.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), BackendError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), BackendError>;

    /// Return the first entry inside `(lower, upper)` in key order, or the
    /// last one when `reverse` is set.
    ///
    /// Empty or inverted bounds yield `Ok(None)`.
    fn seek(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, BackendError>;
}

impl<B: KvBackend + ?Sized> KvBackend for Arc<B> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> Result<bool, BackendError> {
        (**self).has(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), BackendError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), BackendError> {
        (**self).delete(key)
    }

    fn seek(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, BackendError> {
        (**self).seek(lower, upper, reverse)
    }
}

/// Returns true if no key can satisfy both bounds.
pub fn bounds_are_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_empty() {
        let a: &[u8] = b"a";
        let b: &[u8] = b"b";
        assert!(!bounds_are_empty(Bound::Included(a), Bound::Excluded(b)));
        assert!(!bounds_are_empty(Bound::Included(a), Bound::Included(a)));
        assert!(bounds_are_empty(Bound::Included(a), Bound::Excluded(a)));
        assert!(bounds_are_empty(Bound::Excluded(a), Bound::Included(a)));
        assert!(bounds_are_empty(Bound::Included(b), Bound::Excluded(a)));
        assert!(!bounds_are_empty(Bound::Unbounded, Bound::Excluded(a)));
        assert!(!bounds_are_empty(Bound::Excluded(b), Bound::Unbounded));
    }
}
