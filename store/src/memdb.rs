//! In-memory backend.
//!
//! `MemDb` implements `KvBackend` using a `BTreeMap` for deterministic key
//! ordering. Useful for tests and for ephemeral stores where durability is
//! not required.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::backend::{bounds_are_empty, KvBackend};
use crate::error::BackendError;

/// In-memory backend backed by `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemDb {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemDb {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries across all key spaces.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Number of entries whose key starts with `prefix`.
    pub fn count_prefix(&self, prefix: &[u8]) -> usize {
        self.data
            .read()
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .count()
    }
}

impl KvBackend for MemDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> Result<bool, BackendError> {
        Ok(self.data.read().contains_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), BackendError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), BackendError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn seek(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, BackendError> {
        if bounds_are_empty(lower, upper) {
            return Ok(None);
        }
        let data = self.data.read();
        let mut range = data.range::<[u8], _>((lower, upper));
        let entry = if reverse {
            range.next_back()
        } else {
            range.next()
        };
        Ok(entry.map(|(k, v)| (k.clone(), v.clone())))
    }
}
