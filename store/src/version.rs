//! Commit metadata: the version log.
//!
//! The log mirrors the `META_PREFIX` key space in memory. Every mutation is
//! written through to the backend before the in-memory copy changes, so a
//! failed write leaves the log as it was.

use std::collections::BTreeMap;
use std::ops::Bound;

use smtstore_primitives::{CommitId, Hash, Version, ZERO_HASH};

use crate::backend::KvBackend;
use crate::error::{StoreError, StoreResult};
use crate::keys::{
    decode_version, encode_version, prefix_end, version_key, INITIAL_VERSION_KEY, LATEST_KEY,
    VERSION_PREFIX, WORKING_ROOT_KEY,
};
use crate::pruning::PruningOptions;

/// Retained versions and the latest commit.
#[derive(Debug, Clone, Default)]
pub struct VersionLog {
    versions: BTreeMap<Version, Hash>,
    latest: CommitId,
    initial_version: Version,
}

impl VersionLog {
    /// Read the log back from `backend`. An empty backend yields an empty log.
    pub fn load<B: KvBackend>(backend: &B) -> StoreResult<Self> {
        let mut versions = BTreeMap::new();
        let upper = prefix_end(VERSION_PREFIX);
        let upper = match &upper {
            Some(end) => Bound::Excluded(end.as_slice()),
            None => Bound::Unbounded,
        };
        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let lower = match &cursor {
                Some(last) => Bound::Excluded(last.as_slice()),
                None => Bound::Included(VERSION_PREFIX),
            };
            let Some((key, root)) = backend.seek(lower, upper, false)? else {
                break;
            };
            let version = decode_version(&key[VERSION_PREFIX.len()..]).ok_or_else(|| {
                StoreError::CorruptMetadata(format!("version key {}", hex::encode(&key)))
            })?;
            versions.insert(version, decode_hash(&root)?);
            cursor = Some(key);
        }

        let latest = match backend.get(LATEST_KEY)? {
            Some(bytes) => {
                let version = decode_version(&bytes)
                    .ok_or_else(|| StoreError::CorruptMetadata("latest version".into()))?;
                let hash = versions.get(&version).copied().ok_or_else(|| {
                    StoreError::CorruptMetadata(format!("no root recorded for latest version {}", version))
                })?;
                CommitId::new(version, hash)
            }
            None => CommitId::default(),
        };

        let initial_version = match backend.get(INITIAL_VERSION_KEY)? {
            Some(bytes) => decode_version(&bytes)
                .ok_or_else(|| StoreError::CorruptMetadata("initial version".into()))?,
            None => 0,
        };

        Ok(Self {
            versions,
            latest,
            initial_version,
        })
    }

    /// Persisted working root, if any set/delete has happened since the
    /// backend was created.
    pub fn load_working_root<B: KvBackend>(backend: &B) -> StoreResult<Option<Hash>> {
        match backend.get(WORKING_ROOT_KEY)? {
            Some(bytes) => Ok(Some(decode_hash(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_working_root<B: KvBackend>(backend: &B, root: &Hash) -> StoreResult<()> {
        backend.set(WORKING_ROOT_KEY, root)?;
        Ok(())
    }

    pub fn latest(&self) -> CommitId {
        self.latest
    }

    /// Returns true once any version has been committed.
    pub fn has_commits(&self) -> bool {
        self.latest.version > 0
    }

    pub fn initial_version(&self) -> Version {
        self.initial_version
    }

    pub fn set_initial_version<B: KvBackend>(
        &mut self,
        backend: &B,
        version: Version,
    ) -> StoreResult<()> {
        if self.has_commits() {
            return Err(StoreError::InitialVersionAfterCommit(self.latest.version));
        }
        if version < 0 {
            return Err(StoreError::InvalidVersion(version));
        }
        backend.set(INITIAL_VERSION_KEY, &encode_version(version))?;
        self.initial_version = version;
        Ok(())
    }

    /// Version the next commit will be assigned, or `None` once the latest
    /// commit sits at `Version::MAX`.
    pub fn next_version(&self) -> Option<Version> {
        if !self.has_commits() && self.initial_version > 0 {
            Some(self.initial_version)
        } else {
            self.latest.version.checked_add(1)
        }
    }

    /// Persist `(version → root)` and advance the latest pointer.
    pub fn record<B: KvBackend>(
        &mut self,
        backend: &B,
        version: Version,
        root: Hash,
    ) -> StoreResult<CommitId> {
        backend.set(&version_key(version), &root)?;
        backend.set(LATEST_KEY, &encode_version(version))?;
        self.versions.insert(version, root);
        self.latest = CommitId::new(version, root);
        Ok(self.latest)
    }

    /// Root committed at `version`, if that version is retained.
    pub fn root_at(&self, version: Version) -> Option<Hash> {
        self.versions.get(&version).copied()
    }

    pub fn contains(&self, version: Version) -> bool {
        self.versions.contains_key(&version)
    }

    /// Retained versions in ascending order.
    pub fn versions(&self) -> Vec<Version> {
        self.versions.keys().copied().collect()
    }

    /// Drop every version record `opts` does not retain. Returns the removed
    /// versions.
    pub fn prune<B: KvBackend>(
        &mut self,
        backend: &B,
        opts: &PruningOptions,
    ) -> StoreResult<Vec<Version>> {
        let latest = self.latest.version;
        let doomed: Vec<Version> = self
            .versions
            .keys()
            .copied()
            .filter(|&v| !opts.retains(v, latest))
            .collect();
        for &version in &doomed {
            backend.delete(&version_key(version))?;
            self.versions.remove(&version);
        }
        Ok(doomed)
    }
}

fn decode_hash(bytes: &[u8]) -> StoreResult<Hash> {
    if bytes.len() != ZERO_HASH.len() {
        return Err(StoreError::CorruptMetadata(format!(
            "root hash of {} bytes",
            bytes.len()
        )));
    }
    let mut hash = ZERO_HASH;
    hash.copy_from_slice(bytes);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::META_PREFIX;
    use crate::memdb::MemDb;

    fn root(byte: u8) -> Hash {
        [byte; 32]
    }

    #[test]
    fn test_empty_log() {
        let db = MemDb::new();
        let log = VersionLog::load(&db).unwrap();
        assert!(!log.has_commits());
        assert!(log.latest().is_zero());
        assert_eq!(log.next_version(), Some(1));
        assert!(log.versions().is_empty());
        assert_eq!(VersionLog::load_working_root(&db).unwrap(), None);
    }

    #[test]
    fn test_record_and_reload() {
        let db = MemDb::new();
        let mut log = VersionLog::load(&db).unwrap();
        log.record(&db, 1, root(1)).unwrap();
        log.record(&db, 2, root(2)).unwrap();
        VersionLog::save_working_root(&db, &root(9)).unwrap();

        let reloaded = VersionLog::load(&db).unwrap();
        assert_eq!(reloaded.latest(), CommitId::new(2, root(2)));
        assert_eq!(reloaded.versions(), vec![1, 2]);
        assert_eq!(reloaded.root_at(1), Some(root(1)));
        assert_eq!(reloaded.next_version(), Some(3));
        assert_eq!(VersionLog::load_working_root(&db).unwrap(), Some(root(9)));
    }

    #[test]
    fn test_initial_version() {
        let db = MemDb::new();
        let mut log = VersionLog::load(&db).unwrap();
        assert_eq!(
            log.set_initial_version(&db, -1),
            Err(StoreError::InvalidVersion(-1))
        );
        log.set_initial_version(&db, 100).unwrap();
        assert_eq!(log.next_version(), Some(100));

        log.record(&db, 100, root(1)).unwrap();
        assert_eq!(log.next_version(), Some(101));
        assert_eq!(
            log.set_initial_version(&db, 5),
            Err(StoreError::InitialVersionAfterCommit(100))
        );
        assert_eq!(VersionLog::load(&db).unwrap().initial_version(), 100);
    }

    #[test]
    fn test_initial_version_zero_keeps_default() {
        let db = MemDb::new();
        let mut log = VersionLog::load(&db).unwrap();
        log.set_initial_version(&db, 0).unwrap();
        assert_eq!(log.next_version(), Some(1));
    }

    #[test]
    fn test_no_version_after_max() {
        let db = MemDb::new();
        let mut log = VersionLog::load(&db).unwrap();
        log.set_initial_version(&db, Version::MAX).unwrap();
        assert_eq!(log.next_version(), Some(Version::MAX));

        log.record(&db, Version::MAX, root(1)).unwrap();
        assert!(log.has_commits());
        assert_eq!(log.next_version(), None);
        assert_eq!(VersionLog::load(&db).unwrap().next_version(), None);
    }

    #[test]
    fn test_prune_removes_records() {
        let db = MemDb::new();
        let mut log = VersionLog::load(&db).unwrap();
        for v in 1..=5 {
            log.record(&db, v, root(v as u8)).unwrap();
        }
        let removed = log.prune(&db, &PruningOptions::keep_recent(2)).unwrap();
        assert_eq!(removed, vec![1, 2, 3]);
        assert_eq!(log.versions(), vec![4, 5]);
        assert!(!log.contains(1));

        let reloaded = VersionLog::load(&db).unwrap();
        assert_eq!(reloaded.versions(), vec![4, 5]);
    }

    #[test]
    fn test_corrupt_latest_pointer() {
        let db = MemDb::new();
        db.set(LATEST_KEY, &encode_version(3)).unwrap();
        let err = VersionLog::load(&db).unwrap_err();
        assert!(matches!(err, StoreError::CorruptMetadata(_)));
        assert_eq!(db.count_prefix(META_PREFIX), 1);
    }
}
