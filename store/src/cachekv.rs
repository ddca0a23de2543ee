//! Caching overlay.
//!
//! `CacheKv` buffers sets and deletes in memory on top of any [`KvStore`].
//! Reads through the overlay see its own buffered writes first. Nothing
//! reaches the parent until [`CacheKv::write`] flushes the buffer in key
//! order; [`CacheKv::discard`] drops it instead.
//!
//! Because the parent is untouched until the flush, writing through the
//! overlay while one of its iterators is open is safe: an iterator merges
//! the parent's iterator with a snapshot of the buffer taken when it was
//! created.

use std::cmp::Ordering;
use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::iterator::KvIterator;
use crate::kv::{assert_valid_key, assert_valid_value, KvStore};
use crate::overlay::{Buffered, WriteBuffer};

/// Write-buffering view of a parent store.
pub struct CacheKv<S> {
    parent: S,
    buffer: Mutex<WriteBuffer>,
}

impl<S: KvStore> CacheKv<S> {
    pub fn new(parent: S) -> Self {
        Self {
            parent,
            buffer: Mutex::new(WriteBuffer::new()),
        }
    }

    pub fn parent(&self) -> &S {
        &self.parent
    }

    /// Flush buffered writes to the parent in ascending key order and clear
    /// the buffer.
    pub fn write(&self) {
        let writes = self.buffer.lock().take();
        if writes.is_empty() {
            return;
        }
        debug!(keys = writes.len(), "flushing cache overlay");
        for (key, value) in writes {
            match value {
                Some(value) => self.parent.set(&key, &value),
                None => self.parent.delete(&key),
            }
        }
    }

    /// Drop all buffered writes.
    pub fn discard(&self) {
        self.buffer.lock().clear();
    }

    /// Number of keys with a buffered write.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Bytes of buffered keys and values.
    pub fn pending_bytes(&self) -> u64 {
        self.buffer.lock().total_bytes()
    }

    /// Nested overlay on top of this one.
    pub fn cache_wrap(&self) -> CacheKv<&Self> {
        CacheKv::new(self)
    }

    fn merged<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Box<dyn KvIterator + 'a> {
        let parent = if reverse {
            self.parent.reverse_iterator(start, end)
        } else {
            self.parent.iterator(start, end)
        };
        let buffered = self.buffer.lock().range(start, end, reverse);
        Box::new(CacheIterator::new(parent, buffered, start, end, reverse))
    }
}

impl<S: KvStore> KvStore for CacheKv<S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        assert_valid_key(key);
        let buffered = self.buffer.lock().get(key);
        match buffered {
            Buffered::Found(value) => Some(value),
            Buffered::Deleted => None,
            Buffered::NotBuffered => self.parent.get(key),
        }
    }

    fn has(&self, key: &[u8]) -> bool {
        assert_valid_key(key);
        let buffered = self.buffer.lock().get(key);
        match buffered {
            Buffered::Found(_) => true,
            Buffered::Deleted => false,
            Buffered::NotBuffered => self.parent.has(key),
        }
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        assert_valid_key(key);
        assert_valid_value(value);
        self.buffer.lock().set(key.to_vec(), value.to_vec());
    }

    fn delete(&self, key: &[u8]) {
        assert_valid_key(key);
        self.buffer.lock().delete(key.to_vec());
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        self.merged(start, end, false)
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        self.merged(start, end, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Parent,
    Buffer,
}

enum Step {
    Done,
    Use(Source),
    SkipTombstone,
    Shadowed,
}

/// Merges a parent iterator with a buffer snapshot. On equal keys the
/// buffered entry wins; buffered deletions hide the parent's entry.
struct CacheIterator<'a> {
    parent: Box<dyn KvIterator + 'a>,
    buffer: VecDeque<(Vec<u8>, Option<Vec<u8>>)>,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    reverse: bool,
    source: Option<Source>,
}

impl<'a> CacheIterator<'a> {
    fn new(
        parent: Box<dyn KvIterator + 'a>,
        buffer: Vec<(Vec<u8>, Option<Vec<u8>>)>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> Self {
        let mut iter = Self {
            parent,
            buffer: buffer.into(),
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            reverse,
            source: None,
        };
        iter.settle();
        iter
    }

    /// Position `source` on the next visible entry.
    fn settle(&mut self) {
        loop {
            let step = {
                let parent_key = self.parent.valid().then(|| self.parent.key());
                match (parent_key, self.buffer.front()) {
                    (None, None) => Step::Done,
                    (Some(_), None) => Step::Use(Source::Parent),
                    (None, Some((_, None))) => Step::SkipTombstone,
                    (None, Some((_, Some(_)))) => Step::Use(Source::Buffer),
                    (Some(parent_key), Some((buffer_key, value))) => {
                        let order = if self.reverse {
                            parent_key.cmp(buffer_key.as_slice())
                        } else {
                            buffer_key.as_slice().cmp(parent_key)
                        };
                        match (order, value) {
                            (Ordering::Equal, _) => Step::Shadowed,
                            (Ordering::Less, None) => Step::SkipTombstone,
                            (Ordering::Less, Some(_)) => Step::Use(Source::Buffer),
                            (Ordering::Greater, _) => Step::Use(Source::Parent),
                        }
                    }
                }
            };
            match step {
                Step::Done => {
                    self.source = None;
                    return;
                }
                Step::Use(source) => {
                    self.source = Some(source);
                    return;
                }
                Step::SkipTombstone => {
                    self.buffer.pop_front();
                }
                Step::Shadowed => self.parent.next(),
            }
        }
    }
}

impl KvIterator for CacheIterator<'_> {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.source.is_some()
    }

    fn next(&mut self) {
        match self.source {
            Some(Source::Parent) => self.parent.next(),
            Some(Source::Buffer) => {
                self.buffer.pop_front();
            }
            None => return,
        }
        self.settle();
    }

    fn key(&self) -> &[u8] {
        match (self.source, self.buffer.front()) {
            (Some(Source::Parent), _) => self.parent.key(),
            (Some(Source::Buffer), Some((key, _))) => key.as_slice(),
            _ => panic!("cache overlay: key() called on an invalid iterator"),
        }
    }

    fn value(&self) -> Vec<u8> {
        match (self.source, self.buffer.front()) {
            (Some(Source::Parent), _) => self.parent.value(),
            (Some(Source::Buffer), Some((_, Some(value)))) => value.clone(),
            _ => panic!("cache overlay: value() called on an invalid iterator"),
        }
    }

    fn close(&mut self) {
        self.parent.close();
        self.buffer.clear();
        self.source = None;
    }
}
