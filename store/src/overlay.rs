//! Write buffer for the caching overlay.
//!
//! Buffers sets and deletes made through a [`CacheKv`](crate::cachekv::CacheKv)
//! and makes them visible to reads through the same overlay. On `write()`
//! the buffered operations are flushed to the parent store in key order; on
//! `discard()` they are dropped.

use std::collections::BTreeMap;
use std::ops::Bound;

/// Buffered writes: key → Some(value) for sets, key → None for deletions.
///
/// Uses `BTreeMap` so flushes and range snapshots come out in key order.
#[derive(Debug, Clone, Default)]
pub struct WriteBuffer {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    /// Total bytes buffered (keys + values).
    total_bytes: u64,
}

/// Result of looking up a key in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Buffered {
    /// Key was set in the buffer with this value.
    Found(Vec<u8>),
    /// Key was deleted in the buffer.
    Deleted,
    /// Key has not been touched; the caller checks the parent store.
    NotBuffered,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a set. A previous set or delete of the same key is replaced.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.forget_bytes(&key);
        self.total_bytes = self
            .total_bytes
            .saturating_add((key.len() + value.len()) as u64);
        self.writes.insert(key, Some(value));
    }

    /// Buffer a delete.
    ///
    /// Subsequent reads for this key will return `Deleted` rather than
    /// falling through to the parent store.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.forget_bytes(&key);
        // Deletion still counts the key bytes
        self.total_bytes = self.total_bytes.saturating_add(key.len() as u64);
        self.writes.insert(key, None);
    }

    pub fn get(&self, key: &[u8]) -> Buffered {
        match self.writes.get(key) {
            Some(Some(value)) => Buffered::Found(value.clone()),
            Some(None) => Buffered::Deleted,
            None => Buffered::NotBuffered,
        }
    }

    /// Copy of the buffered entries in `[start, end)`, in iteration order.
    pub fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                return Vec::new();
            }
        }
        let lower = start.map_or(Bound::Unbounded, Bound::Included);
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
        let range = self.writes.range::<[u8], _>((lower, upper));
        let entries = range.map(|(k, v)| (k.clone(), v.clone()));
        if reverse {
            entries.rev().collect()
        } else {
            entries.collect()
        }
    }

    /// Take all buffered writes, leaving the buffer empty.
    ///
    /// Iteration order of the returned map is sorted by key.
    pub fn take(&mut self) -> BTreeMap<Vec<u8>, Option<Vec<u8>>> {
        self.total_bytes = 0;
        std::mem::take(&mut self.writes)
    }

    /// Clear all buffered writes.
    pub fn clear(&mut self) {
        self.writes.clear();
        self.total_bytes = 0;
    }

    /// Number of keys touched (set or deleted).
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn forget_bytes(&mut self, key: &[u8]) {
        if let Some(prev) = self.writes.get(key) {
            let prev_bytes = key.len() as u64 + prev.as_ref().map_or(0, |v| v.len() as u64);
            self.total_bytes = self.total_bytes.saturating_sub(prev_bytes);
        }
    }
}
