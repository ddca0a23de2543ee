//! The store façade.
//!
//! `SmtStore` composes the sparse Merkle tree, the iteration index and the
//! version log over one shared backend. A single `RwLock` orders every
//! operation:
//!
//! - `set` / `delete` / `commit` hold the write lock across the tree update,
//!   the index update and the metadata write, so readers never observe the
//!   tree and the index out of step.
//! - `get` / `has` / `query` / iterator value reads hold the read lock.
//!
//! Storage write failures panic: once the tree has moved, a half-applied
//! mutation cannot be reported back as a recoverable error.

use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smtstore_primitives::{
    hash_to_hex, CommitId, Hash, Sha256Hasher, SparseMerkleTree, TreeHasher, Version,
};
use tracing::{debug, error, info};

use crate::backend::KvBackend;
use crate::cachekv::CacheKv;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::index::IterationIndex;
use crate::iterator::{KvIterator, StoreIterator};
use crate::kv::{assert_valid_key, assert_valid_value, KvStore};
use crate::nodes::BackendNodes;
use crate::pruning::PruningOptions;
use crate::tracekv::{TraceContext, TraceKv};
use crate::version::VersionLog;

/// State shared between a store and its iterators.
pub(crate) struct Shared<B, H> {
    pub(crate) backend: Arc<B>,
    pub(crate) index: IterationIndex<B>,
    pub(crate) state: RwLock<TreeState<B, H>>,
}

/// Everything guarded by the store lock.
pub(crate) struct TreeState<B, H> {
    pub(crate) tree: SparseMerkleTree<BackendNodes<B>, H>,
    pub(crate) versions: VersionLog,
    pub(crate) pruning: PruningOptions,
}

/// Kind of store behind a handle, for callers that mount several kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreType {
    Smt,
}

/// A verifiable, versioned key-value store.
///
/// Cloning is cheap and yields another handle to the same store.
pub struct SmtStore<B, H = Sha256Hasher> {
    pub(crate) shared: Arc<Shared<B, H>>,
}

impl<B, H> Clone for SmtStore<B, H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: KvBackend> SmtStore<B> {
    /// Open `backend` with the default configuration and SHA-256 hashing.
    pub fn new(backend: B) -> StoreResult<Self> {
        Self::open(backend, StoreConfig::default())
    }

    /// Open `backend` with SHA-256 hashing.
    pub fn open(backend: B, config: StoreConfig) -> StoreResult<Self> {
        Self::open_with_hasher(backend, config)
    }
}

impl<B: KvBackend, H: TreeHasher> SmtStore<B, H> {
    /// Open `backend`, restoring any commits and working state it holds.
    ///
    /// The hasher must match the one the backend was written with.
    pub fn open_with_hasher(backend: B, config: StoreConfig) -> StoreResult<Self> {
        let backend = Arc::new(backend);
        let mut versions = VersionLog::load(backend.as_ref())?;
        if config.initial_version != 0 {
            if versions.has_commits() {
                debug!(
                    initial_version = config.initial_version,
                    latest = versions.latest().version,
                    "store already has commits; ignoring configured initial version"
                );
            } else {
                versions.set_initial_version(backend.as_ref(), config.initial_version)?;
            }
        }

        let root = match VersionLog::load_working_root(backend.as_ref())? {
            Some(root) => root,
            None => versions.latest().hash,
        };
        info!(
            hasher = H::NAME,
            latest = versions.latest().version,
            retained = versions.versions().len(),
            root = %hash_to_hex(&root),
            "opened smt store"
        );

        let tree = SparseMerkleTree::import(BackendNodes::new(Arc::clone(&backend)), root);
        let index = IterationIndex::new(Arc::clone(&backend));
        Ok(Self {
            shared: Arc::new(Shared {
                backend,
                index,
                state: RwLock::new(TreeState {
                    tree,
                    versions,
                    pruning: config.pruning,
                }),
            }),
        })
    }

    /// Value stored under `key`, or `None` if absent.
    ///
    /// A storage failure is logged and reported as absence; use
    /// [`try_get`](Self::try_get) to tell the two apart.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => {
                error!(key = %hex::encode(key), %err, "store read failed; reporting key as absent");
                None
            }
        }
    }

    /// Like [`get`](Self::get), but surfaces storage failures.
    pub fn try_get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        assert_valid_key(key);
        let state = self.shared.state.read();
        Ok(state.tree.get(key)?)
    }

    pub fn has(&self, key: &[u8]) -> bool {
        assert_valid_key(key);
        let _state = self.shared.state.read();
        match self.shared.index.has(key) {
            Ok(present) => present,
            Err(err) => {
                error!(key = %hex::encode(key), %err, "index read failed; reporting key as absent");
                false
            }
        }
    }

    pub fn set(&self, key: &[u8], value: &[u8]) {
        assert_valid_key(key);
        assert_valid_value(value);
        let mut state = self.shared.state.write();
        let before = state.tree.root();
        let root = match state.tree.update(key, value) {
            Ok(root) => root,
            Err(err) => panic!("smt store: tree update failed for {}: {}", hex::encode(key), err),
        };
        if root == before {
            return;
        }
        if let Err(err) = self.shared.index.mark_present(key) {
            panic!("smt store: index insert failed for {}: {}", hex::encode(key), err);
        }
        self.save_working_root(&root);
    }

    /// Remove `key`. Removing an absent key changes nothing.
    pub fn delete(&self, key: &[u8]) {
        assert_valid_key(key);
        let mut state = self.shared.state.write();
        let before = state.tree.root();
        let root = match state.tree.delete(key) {
            Ok(root) => root,
            Err(err) => panic!("smt store: tree delete failed for {}: {}", hex::encode(key), err),
        };
        if root == before {
            return;
        }
        if let Err(err) = self.shared.index.mark_absent(key) {
            panic!("smt store: index removal failed for {}: {}", hex::encode(key), err);
        }
        self.save_working_root(&root);
    }

    /// Ascending iterator over `[start, end)`.
    pub fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> StoreIterator<B, H> {
        StoreIterator::new(Arc::clone(&self.shared), start, end, false)
    }

    /// Descending iterator over `[start, end)`.
    pub fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StoreIterator<B, H> {
        StoreIterator::new(Arc::clone(&self.shared), start, end, true)
    }

    /// Buffered view of this store. Writes reach the store on
    /// [`CacheKv::write`].
    pub fn cache_wrap(&self) -> CacheKv<&Self> {
        CacheKv::new(self)
    }

    /// Buffered view whose reads and flushed writes are traced to `writer`
    /// as JSON lines, tagged with `context`.
    pub fn cache_wrap_with_trace<W>(&self, writer: W, context: TraceContext) -> CacheKv<TraceKv<&Self>>
    where
        W: Write + Send + 'static,
    {
        CacheKv::new(TraceKv::new(self, writer, context))
    }

    /// Commit the working root as the next version.
    pub fn commit(&self) -> CommitId {
        let mut state = self.shared.state.write();
        let backend = self.shared.backend.as_ref();
        let Some(version) = state.versions.next_version() else {
            panic!(
                "smt store: version space exhausted after version {}",
                state.versions.latest().version
            );
        };
        let root = state.tree.root();
        let id = match state.versions.record(backend, version, root) {
            Ok(id) => id,
            Err(err) => panic!("smt store: failed to record version {}: {}", version, err),
        };

        let pruning = state.pruning;
        if pruning.is_due(version) {
            match state.versions.prune(backend, &pruning) {
                Ok(removed) if !removed.is_empty() => {
                    debug!(version, removed = ?removed, "pruned versions")
                }
                Ok(_) => {}
                Err(err) => panic!("smt store: pruning at version {} failed: {}", version, err),
            }
        }

        debug!(version, root = %hash_to_hex(&root), "committed");
        id
    }

    /// The most recent commit, or the zero id before the first commit.
    pub fn last_commit_id(&self) -> CommitId {
        self.shared.state.read().versions.latest()
    }

    /// Make the first commit use `version`. Only allowed before any commit.
    pub fn set_initial_version(&self, version: Version) -> StoreResult<()> {
        let mut state = self.shared.state.write();
        state
            .versions
            .set_initial_version(self.shared.backend.as_ref(), version)
    }

    pub fn set_pruning(&self, opts: PruningOptions) {
        self.shared.state.write().pruning = opts;
    }

    pub fn get_pruning(&self) -> PruningOptions {
        self.shared.state.read().pruning
    }

    /// Root of the uncommitted working state.
    pub fn working_hash(&self) -> Hash {
        self.shared.state.read().tree.root()
    }

    /// Returns true if `version` was committed and has not been pruned.
    pub fn version_exists(&self, version: Version) -> bool {
        self.shared.state.read().versions.contains(version)
    }

    /// Retained versions in ascending order.
    pub fn available_versions(&self) -> Vec<Version> {
        self.shared.state.read().versions.versions()
    }

    pub fn store_type(&self) -> StoreType {
        StoreType::Smt
    }

    /// Caller holds the write lock.
    fn save_working_root(&self, root: &Hash) {
        if let Err(err) = VersionLog::save_working_root(self.shared.backend.as_ref(), root) {
            panic!("smt store: failed to persist working root: {}", err);
        }
    }
}

impl<B: KvBackend, H: TreeHasher> KvStore for SmtStore<B, H> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        SmtStore::get(self, key)
    }

    fn has(&self, key: &[u8]) -> bool {
        SmtStore::has(self, key)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        SmtStore::set(self, key, value)
    }

    fn delete(&self, key: &[u8]) {
        SmtStore::delete(self, key)
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        Box::new(SmtStore::iterator(self, start, end))
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        Box::new(SmtStore::reverse_iterator(self, start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::collect_pairs;
    use crate::memdb::MemDb;
    use smtstore_primitives::{Blake3Hasher, ZERO_HASH};

    fn new_store() -> SmtStore<MemDb> {
        SmtStore::new(MemDb::new()).unwrap()
    }

    #[test]
    fn test_set_get_has() {
        let store = new_store();
        store.set(b"key", b"value");
        assert_eq!(store.get(b"key"), Some(b"value".to_vec()));
        assert!(store.has(b"key"));
        assert_eq!(store.get(b"other"), None);
        assert!(!store.has(b"other"));
    }

    #[test]
    fn test_delete() {
        let store = new_store();
        store.set(b"key", b"value");
        store.delete(b"key");
        assert_eq!(store.get(b"key"), None);
        assert!(!store.has(b"key"));
        assert_eq!(store.working_hash(), ZERO_HASH);
    }

    #[test]
    fn test_delete_absent_keeps_root() {
        let store = new_store();
        store.set(b"a", b"1");
        let root = store.working_hash();
        store.delete(b"missing");
        assert_eq!(store.working_hash(), root);
    }

    #[test]
    fn test_overwrite_same_value_keeps_root() {
        let store = new_store();
        store.set(b"a", b"1");
        let root = store.working_hash();
        store.set(b"a", b"1");
        assert_eq!(store.working_hash(), root);
        store.set(b"a", b"2");
        assert_ne!(store.working_hash(), root);
    }

    #[test]
    #[should_panic(expected = "key is empty")]
    fn test_empty_key_panics() {
        new_store().set(b"", b"v");
    }

    #[test]
    #[should_panic(expected = "value is empty")]
    fn test_empty_value_panics() {
        new_store().set(b"k", b"");
    }

    #[test]
    #[should_panic(expected = "key is empty")]
    fn test_get_empty_key_panics() {
        new_store().get(b"");
    }

    #[test]
    fn test_commit_versions() {
        let store = new_store();
        assert!(store.last_commit_id().is_zero());

        store.set(b"a", b"1");
        let first = store.commit();
        assert_eq!(first.version, 1);
        assert_eq!(first.hash, store.working_hash());

        let second = store.commit();
        assert_eq!(second.version, 2);
        assert_eq!(second.hash, first.hash);
        assert_eq!(store.last_commit_id(), second);
        assert_eq!(store.available_versions(), vec![1, 2]);
    }

    #[test]
    fn test_initial_version() {
        let store = new_store();
        store.set_initial_version(10).unwrap();
        assert_eq!(store.commit().version, 10);
        assert_eq!(store.commit().version, 11);
        assert!(store.set_initial_version(20).is_err());
    }

    #[test]
    #[should_panic(expected = "version space exhausted")]
    fn test_commit_after_max_version_panics() {
        let store = new_store();
        store.set_initial_version(Version::MAX).unwrap();
        assert_eq!(store.commit().version, Version::MAX);
        store.commit();
    }

    #[test]
    fn test_exhausted_commit_leaves_log_intact() {
        let store = new_store();
        store.set_initial_version(Version::MAX).unwrap();
        let last = store.commit();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| store.commit()));
        assert!(result.is_err());
        assert_eq!(store.last_commit_id(), last);
        assert_eq!(store.available_versions(), vec![Version::MAX]);
    }

    #[test]
    fn test_initial_version_from_config() {
        let config = StoreConfig::default().with_initial_version(5);
        let store = SmtStore::open(MemDb::new(), config).unwrap();
        assert_eq!(store.commit().version, 5);
    }

    #[test]
    fn test_pruning_setting() {
        let store = new_store();
        assert_eq!(store.get_pruning(), PruningOptions::default());
        store.set_pruning(PruningOptions::nothing().with_interval(1));
        for _ in 0..3 {
            store.commit();
        }
        assert_eq!(store.available_versions(), vec![3]);
        assert!(!store.version_exists(2));
        assert!(store.version_exists(3));
    }

    #[test]
    fn test_iterator_through_trait_object() {
        let store = new_store();
        store.set(b"b", b"2");
        store.set(b"a", b"1");
        let kv: &dyn KvStore = &store;
        let mut iter = kv.iterator(None, None);
        assert_eq!(
            collect_pairs(iter.as_mut()),
            vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn test_blake3_store_differs_from_sha256() {
        let sha = new_store();
        let blake: SmtStore<MemDb, Blake3Hasher> =
            SmtStore::open_with_hasher(MemDb::new(), StoreConfig::default()).unwrap();
        sha.set(b"k", b"v");
        blake.set(b"k", b"v");
        assert_eq!(blake.get(b"k"), Some(b"v".to_vec()));
        assert_ne!(sha.working_hash(), blake.working_hash());
    }

    #[test]
    fn test_has_waits_for_writer() {
        use std::sync::mpsc;
        use std::time::Duration;

        let store = new_store();
        store.set(b"k", b"v");
        let guard = store.shared.state.write();

        let (tx, rx) = mpsc::channel();
        let reader = {
            let store = store.clone();
            std::thread::spawn(move || tx.send(store.has(b"k")).unwrap())
        };
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        drop(guard);
        assert!(rx.recv().unwrap());
        reader.join().unwrap();
    }

    #[test]
    fn test_store_type() {
        assert_eq!(new_store().store_type(), StoreType::Smt);
        assert_eq!(serde_json::to_value(StoreType::Smt).unwrap(), "smt");
    }

    #[test]
    fn test_clone_shares_state() {
        let store = new_store();
        let handle = store.clone();
        handle.set(b"k", b"v");
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
    }
}
