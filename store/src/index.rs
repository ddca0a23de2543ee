//! Iteration index: the ordered set of live keys.
//!
//! The tree addresses keys by hash path, so it cannot enumerate them in key
//! order. The index keeps one empty backend record per live key under
//! `INDEX_PREFIX`, and the backend's ordered seek provides enumeration.
//! The store mutates the index only while holding its write lock, right
//! after the matching tree mutation succeeded.

use std::ops::Bound;
use std::sync::Arc;

use crate::backend::KvBackend;
use crate::error::BackendError;
use crate::keys::{index_key, prefix_end, INDEX_PREFIX};

#[derive(Debug)]
pub struct IterationIndex<B> {
    backend: Arc<B>,
}

impl<B: KvBackend> IterationIndex<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn mark_present(&self, key: &[u8]) -> Result<(), BackendError> {
        self.backend.set(&index_key(key), &[])
    }

    pub fn mark_absent(&self, key: &[u8]) -> Result<(), BackendError> {
        self.backend.delete(&index_key(key))
    }

    pub fn has(&self, key: &[u8]) -> Result<bool, BackendError> {
        self.backend.has(&index_key(key))
    }

    /// First live key inside `(lower, upper)`, or the last one when
    /// `reverse` is set. Bounds are expressed in original-key space.
    pub fn seek(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Option<Vec<u8>>, BackendError> {
        let lower = match lower {
            Bound::Included(k) => Bound::Included(index_key(k)),
            Bound::Excluded(k) => Bound::Excluded(index_key(k)),
            Bound::Unbounded => Bound::Included(INDEX_PREFIX.to_vec()),
        };
        let upper = match upper {
            Bound::Included(k) => Bound::Included(index_key(k)),
            Bound::Excluded(k) => Bound::Excluded(index_key(k)),
            Bound::Unbounded => match prefix_end(INDEX_PREFIX) {
                Some(end) => Bound::Excluded(end),
                None => Bound::Unbounded,
            },
        };

        let hit = self
            .backend
            .seek(borrow_bound(&lower), borrow_bound(&upper), reverse)?;
        Ok(hit.map(|(k, _)| k[INDEX_PREFIX.len()..].to_vec()))
    }

    /// Collect every live key in `[start, end)` in order.
    pub fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Result<Vec<Vec<u8>>, BackendError> {
        let mut keys = Vec::new();
        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let (lower, upper) = match (&cursor, reverse) {
                (Some(last), false) => (Bound::Excluded(last.as_slice()), end_bound(end)),
                (Some(last), true) => (start_bound(start), Bound::Excluded(last.as_slice())),
                (None, _) => (start_bound(start), end_bound(end)),
            };
            match self.seek(lower, upper, reverse)? {
                Some(key) => {
                    keys.push(key.clone());
                    cursor = Some(key);
                }
                None => return Ok(keys),
            }
        }
    }
}

pub(crate) fn start_bound(start: Option<&[u8]>) -> Bound<&[u8]> {
    start.map_or(Bound::Unbounded, Bound::Included)
}

pub(crate) fn end_bound(end: Option<&[u8]>) -> Bound<&[u8]> {
    end.map_or(Bound::Unbounded, Bound::Excluded)
}

fn borrow_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
