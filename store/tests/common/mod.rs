//! Shared test helpers for integration tests.
//!
//! Provides store factories, a backend that fails on demand, a cloneable
//! trace sink, and small collection helpers used across the integration
//! test files.

#![allow(dead_code)]

use std::io::Write;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smtstore::{collect_pairs, BackendError, KvBackend, KvIterator, MemDb, SmtStore};

// ── Store Factories ──

/// Fresh store over an empty in-memory backend.
pub fn new_store() -> SmtStore<MemDb> {
    SmtStore::new(MemDb::new()).unwrap()
}

/// Store over a backend the test keeps a handle to, for reopening.
pub fn shared_store() -> (Arc<MemDb>, SmtStore<Arc<MemDb>>) {
    let db = Arc::new(MemDb::new());
    let store = SmtStore::new(db.clone()).unwrap();
    (db, store)
}

/// Store pre-populated with `pairs`.
pub fn store_with(pairs: &[(&[u8], &[u8])]) -> SmtStore<MemDb> {
    let store = new_store();
    for (k, v) in pairs {
        store.set(k, v);
    }
    store
}

// ── Collection Helpers ──

pub fn to_pairs(items: &[(&[u8], &[u8])]) -> Vec<(Vec<u8>, Vec<u8>)> {
    items.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect()
}

/// Drain a boxed iterator.
pub fn drain(mut iter: Box<dyn KvIterator + '_>) -> Vec<(Vec<u8>, Vec<u8>)> {
    collect_pairs(iter.as_mut())
}

/// Keys only, in iteration order.
pub fn drain_keys(mut iter: impl KvIterator) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    while iter.valid() {
        keys.push(iter.key().to_vec());
        iter.next();
    }
    iter.close();
    keys
}

// ── Failing Backend ──

/// `MemDb` wrapper whose reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyDb {
    inner: MemDb,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::new("injected read failure"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::new("injected write failure"));
        }
        Ok(())
    }
}

impl KvBackend for FlakyDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        self.check_read()?;
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), BackendError> {
        self.check_write()?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), BackendError> {
        self.check_write()?;
        self.inner.delete(key)
    }

    fn seek(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, BackendError> {
        self.check_read()?;
        self.inner.seek(lower, upper, reverse)
    }
}

// ── Trace Sink ──

/// Cloneable in-memory writer; every clone appends to the same buffer.
#[derive(Clone, Default)]
pub struct TraceSink(Arc<Mutex<Vec<u8>>>);

impl TraceSink {
    /// Parsed JSON lines written so far.
    pub fn records(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// The `operation` field of every record.
    pub fn operations(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|r| r["operation"].as_str().unwrap().to_string())
            .collect()
    }
}

impl Write for TraceSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
