//! Ordered iteration over the store.
//!
//! [`KvIterator`] is the cursor interface shared by every store layer
//! (`SmtStore`, `CacheKv`, `TraceKv`). [`StoreIterator`] is the base
//! implementation: it walks the iteration index and resolves each value
//! through the tree when asked.
//!
//! Lifecycle: an iterator starts positioned on the first entry of its domain
//! (`valid() == true`) or already exhausted. `next()` moves forward until the
//! domain is consumed. `close()` ends it for good.
//!
//! CONTRACT: no writes may happen within an iterator's domain while it is
//! open, except through a `CacheKv` layered on top.

use std::ops::Bound;
use std::sync::Arc;

use smtstore_primitives::TreeHasher;
use tracing::warn;

use crate::backend::KvBackend;
use crate::index::{end_bound, start_bound};
use crate::store::Shared;

/// A cursor over `[start, end)` in ascending or descending key order.
pub trait KvIterator {
    /// The `[start, end)` domain this iterator was created over.
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>);

    /// Returns true while the iterator is positioned on an entry.
    fn valid(&self) -> bool;

    /// Move to the next entry. A no-op once the iterator is exhausted or
    /// closed.
    fn next(&mut self);

    /// Current key. Panics if `valid()` is false.
    fn key(&self) -> &[u8];

    /// Current value. Panics if `valid()` is false.
    fn value(&self) -> Vec<u8>;

    /// Release the iterator. Idempotent; `valid()` is false afterwards.
    fn close(&mut self);
}

/// Drain an iterator into `(key, value)` pairs and close it.
pub fn collect_pairs(iter: &mut dyn KvIterator) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut pairs = Vec::new();
    while iter.valid() {
        pairs.push((iter.key().to_vec(), iter.value()));
        iter.next();
    }
    iter.close();
    pairs
}

/// Where a [`StoreIterator`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    Valid,
    Exhausted,
    Closed,
}

/// Iterator over an [`SmtStore`](crate::store::SmtStore).
///
/// Holds no lock between calls. Each `next()` re-seeks the index just past
/// the current key, and each `value()` reads the tree under the store's read
/// lock.
pub struct StoreIterator<B, H> {
    shared: Arc<Shared<B, H>>,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    reverse: bool,
    current: Option<Vec<u8>>,
    state: IteratorState,
}

impl<B: KvBackend, H: TreeHasher> StoreIterator<B, H> {
    pub(crate) fn new(
        shared: Arc<Shared<B, H>>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Self {
        let mut iter = Self {
            shared,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            reverse,
            current: None,
            state: IteratorState::Exhausted,
        };
        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                warn!(
                    start = %hex::encode(s),
                    end = %hex::encode(e),
                    "iterator start is not below end; iterator is empty"
                );
                return iter;
            }
        }
        iter.advance();
        iter
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    fn advance(&mut self) {
        let start = self.start.as_deref();
        let end = self.end.as_deref();
        let (lower, upper) = match (&self.current, self.reverse) {
            (None, _) => (start_bound(start), end_bound(end)),
            (Some(last), false) => (Bound::Excluded(last.as_slice()), end_bound(end)),
            (Some(last), true) => (start_bound(start), Bound::Excluded(last.as_slice())),
        };
        // No error channel here; a silently truncated range would be worse
        // than failing loudly.
        let hit = match self.shared.index.seek(lower, upper, self.reverse) {
            Ok(hit) => hit,
            Err(err) => panic!("smt store: iteration index scan failed: {}", err),
        };
        match hit {
            Some(key) => {
                self.current = Some(key);
                self.state = IteratorState::Valid;
            }
            None => {
                self.current = None;
                self.state = IteratorState::Exhausted;
            }
        }
    }
}

impl<B: KvBackend, H: TreeHasher> KvIterator for StoreIterator<B, H> {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.state == IteratorState::Valid
    }

    fn next(&mut self) {
        if self.state == IteratorState::Valid {
            self.advance();
        }
    }

    fn key(&self) -> &[u8] {
        match (&self.state, &self.current) {
            (IteratorState::Valid, Some(key)) => key,
            (state, _) => panic!("smt store: key() called on {:?} iterator", state),
        }
    }

    fn value(&self) -> Vec<u8> {
        let key = self.key();
        let state = self.shared.state.read();
        match state.tree.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => panic!(
                "smt store: index entry {} has no value in the tree",
                hex::encode(key)
            ),
            Err(err) => panic!(
                "smt store: tree read failed for {}: {}",
                hex::encode(key),
                err
            ),
        }
    }

    fn close(&mut self) {
        self.current = None;
        self.state = IteratorState::Closed;
    }
}
