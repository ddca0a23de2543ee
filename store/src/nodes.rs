//! Tree node storage inside the shared backend.

use std::sync::Arc;

use smtstore_primitives::{Hash, NodeStore, TreeError, TreeResult};

use crate::backend::KvBackend;
use crate::keys::node_key;

/// [`NodeStore`] that keeps encoded nodes under `NODE_PREFIX` in a
/// [`KvBackend`].
#[derive(Debug)]
pub struct BackendNodes<B> {
    backend: Arc<B>,
}

impl<B> BackendNodes<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

impl<B: KvBackend> NodeStore for BackendNodes<B> {
    fn get_node(&self, hash: &Hash) -> TreeResult<Option<Vec<u8>>> {
        self.backend
            .get(&node_key(hash))
            .map_err(|e| TreeError::Store(e.to_string()))
    }

    fn put_node(&mut self, hash: &Hash, encoded: Vec<u8>) -> TreeResult<()> {
        self.backend
            .set(&node_key(hash), &encoded)
            .map_err(|e| TreeError::Store(e.to_string()))
    }
}
