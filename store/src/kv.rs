//! The key-value interface shared by every store layer.
//!
//! `SmtStore` implements it over the tree, `CacheKv` over a write buffer,
//! and `TraceKv` as a pass-through that records operations. Layers compose
//! by owning their parent: `CacheKv<TraceKv<&SmtStore>>` is a traced,
//! buffered view of a store.

use crate::iterator::KvIterator;

/// Byte-keyed store with ordered iteration.
///
/// Keys must be non-empty and `set` values must be non-empty; violations
/// panic.
pub trait KvStore {
    /// Value stored under `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Returns true if `key` has a value.
    fn has(&self, key: &[u8]) -> bool;

    fn set(&self, key: &[u8], value: &[u8]);

    /// Remove `key`. Removing an absent key is a no-op.
    fn delete(&self, key: &[u8]);

    /// Ascending iterator over `[start, end)`. `None` means unbounded.
    fn iterator<'a>(&'a self, start: Option<&[u8]>, end: Option<&[u8]>)
        -> Box<dyn KvIterator + 'a>;

    /// Descending iterator over `[start, end)`.
    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> bool {
        (**self).has(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) {
        (**self).delete(key)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        (**self).iterator(start, end)
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        (**self).reverse_iterator(start, end)
    }
}

/// Panics on an empty key.
pub fn assert_valid_key(key: &[u8]) {
    assert!(!key.is_empty(), "key is empty");
}

/// Panics on an empty value.
pub fn assert_valid_value(value: &[u8]) {
    assert!(!value.is_empty(), "value is empty");
}
