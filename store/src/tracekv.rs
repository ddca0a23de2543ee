//! Tracing wrapper: records every read and write as a JSON line.
//!
//! Each traced operation produces one line:
//!
//! ```text
//! {"operation":"write","key":"6b6579","value":"76616c7565","metadata":{"block":7}}
//! ```
//!
//! Keys and values are hex encoded. `has` is not traced. A failure to write
//! a trace line is logged and otherwise ignored; tracing never changes the
//! outcome of a store operation.

use std::collections::BTreeMap;
use std::io::Write;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

use crate::iterator::KvIterator;
use crate::kv::KvStore;

/// Metadata attached to every trace line.
pub type TraceContext = BTreeMap<String, serde_json::Value>;

/// Kind of traced access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceOperation {
    Read,
    Write,
    Delete,
    IterKey,
    IterValue,
}

#[derive(Serialize)]
struct TraceRecord<'a> {
    operation: TraceOperation,
    key: String,
    value: String,
    metadata: &'a TraceContext,
}

struct Tracer {
    writer: Mutex<Box<dyn Write + Send>>,
    context: TraceContext,
}

impl Tracer {
    fn record(&self, operation: TraceOperation, key: &[u8], value: Option<&[u8]>) {
        let record = TraceRecord {
            operation,
            key: hex::encode(key),
            value: value.map(hex::encode).unwrap_or_default(),
            metadata: &self.context,
        };
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(err) => {
                error!(%err, "failed to encode trace record");
                return;
            }
        };
        line.push(b'\n');

        let mut writer = self.writer.lock();
        if let Err(err) = writer.write_all(&line).and_then(|_| writer.flush()) {
            error!(%err, ?operation, "failed to write trace record");
        }
    }
}

/// A [`KvStore`] that forwards to `parent` and traces each access.
pub struct TraceKv<S> {
    parent: S,
    tracer: Tracer,
}

impl<S: KvStore> TraceKv<S> {
    pub fn new<W: Write + Send + 'static>(parent: S, writer: W, context: TraceContext) -> Self {
        Self {
            parent,
            tracer: Tracer {
                writer: Mutex::new(Box::new(writer)),
                context,
            },
        }
    }

    pub fn parent(&self) -> &S {
        &self.parent
    }

    pub fn context(&self) -> &TraceContext {
        &self.tracer.context
    }
}

impl<S: KvStore> KvStore for TraceKv<S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let value = self.parent.get(key);
        self.tracer
            .record(TraceOperation::Read, key, value.as_deref());
        value
    }

    fn has(&self, key: &[u8]) -> bool {
        self.parent.has(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        self.tracer.record(TraceOperation::Write, key, Some(value));
        self.parent.set(key, value);
    }

    fn delete(&self, key: &[u8]) {
        self.tracer.record(TraceOperation::Delete, key, None);
        self.parent.delete(key);
    }

    fn iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        Box::new(TraceIterator {
            inner: self.parent.iterator(start, end),
            tracer: &self.tracer,
        })
    }

    fn reverse_iterator<'a>(
        &'a self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Box<dyn KvIterator + 'a> {
        Box::new(TraceIterator {
            inner: self.parent.reverse_iterator(start, end),
            tracer: &self.tracer,
        })
    }
}

struct TraceIterator<'a> {
    inner: Box<dyn KvIterator + 'a>,
    tracer: &'a Tracer,
}

impl KvIterator for TraceIterator<'_> {
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        self.inner.domain()
    }

    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn key(&self) -> &[u8] {
        let key = self.inner.key();
        self.tracer.record(TraceOperation::IterKey, key, None);
        key
    }

    fn value(&self) -> Vec<u8> {
        let value = self.inner.value();
        self.tracer
            .record(TraceOperation::IterValue, self.inner.key(), Some(&value));
        value
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::collect_pairs;
    use crate::memdb::MemDb;
    use crate::store::SmtStore;
    use std::sync::Arc;

    /// Cloneable writer so tests can read back what was traced.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    fn context() -> TraceContext {
        let mut ctx = TraceContext::new();
        ctx.insert("block".into(), serde_json::json!(7));
        ctx
    }

    #[test]
    fn test_trace_read_write_delete() {
        let store = SmtStore::new(MemDb::new()).unwrap();
        let buf = SharedBuf::default();
        let traced = TraceKv::new(&store, buf.clone(), context());

        traced.set(b"key", b"value");
        assert_eq!(traced.get(b"key"), Some(b"value".to_vec()));
        assert!(traced.has(b"key"));
        traced.delete(b"key");
        assert_eq!(traced.get(b"key"), None);

        let lines = buf.lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            serde_json::json!({
                "operation": "write",
                "key": "6b6579",
                "value": "76616c7565",
                "metadata": { "block": 7 }
            })
        );
        assert_eq!(lines[1]["operation"], "read");
        assert_eq!(lines[1]["value"], "76616c7565");
        assert_eq!(lines[2]["operation"], "delete");
        assert_eq!(lines[2]["value"], "");
        assert_eq!(lines[3]["operation"], "read");
        assert_eq!(lines[3]["value"], "");
    }

    #[test]
    fn test_trace_iteration() {
        let store = SmtStore::new(MemDb::new()).unwrap();
        store.set(b"a", b"1");
        let buf = SharedBuf::default();
        let traced = TraceKv::new(&store, buf.clone(), TraceContext::new());

        let mut iter = traced.iterator(None, None);
        let pairs = collect_pairs(iter.as_mut());
        assert_eq!(pairs, vec![(b"a".to_vec(), b"1".to_vec())]);

        let ops: Vec<String> = buf
            .lines()
            .iter()
            .map(|l| l["operation"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ops, vec!["iterKey", "iterValue"]);
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_trace_failure_does_not_affect_store() {
        let store = SmtStore::new(MemDb::new()).unwrap();
        let traced = TraceKv::new(&store, BrokenWriter, TraceContext::new());
        traced.set(b"k", b"v");
        assert_eq!(traced.get(b"k"), Some(b"v".to_vec()));
    }
}
