//! In-memory key-value store.
//!
//! An ephemeral store used in tests and as the reference implementation of
//! the store contract. Handles are cheap clones sharing the same map;
//! values are defensively copied at the boundary in both directions.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;

use super::kv::{Batch, KeyValueStore, KeyValueWriter, StoreError};

type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;

/// An ephemeral key-value store backed by a hash map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// `None` once the store has been closed.
    inner: Arc<RwLock<Option<FastHashMap<Vec<u8>, Vec<u8>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(FastHashMap::with_hasher(FxBuildHasher)))),
        }
    }

    /// Closes the store; every operation afterwards fails with `Closed`.
    pub fn close(&self) {
        *self.inner.write() = None;
    }

    /// The number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.read().as_ref().map_or(0, |db| db.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    type Batch = MemoryBatch;

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        let guard = self.inner.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(db.contains_key(key))
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        let guard = self.inner.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        db.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        let db = guard.as_mut().ok_or(StoreError::Closed)?;
        db.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        let db = guard.as_mut().ok_or(StoreError::Closed)?;
        db.remove(key);
        Ok(())
    }

    fn new_batch(&self) -> MemoryBatch {
        MemoryBatch {
            store: self.clone(),
            ops: Vec::new(),
            size: 0,
        }
    }
}

/// A queued store operation.
#[derive(Clone, Debug)]
struct BatchOp {
    key: Vec<u8>,
    value: Vec<u8>,
    delete: bool,
}

/// A write batch over a `MemoryStore`. All queued operations are applied
/// under a single lock acquisition on `write`.
pub struct MemoryBatch {
    store: MemoryStore,
    ops: Vec<BatchOp>,
    size: usize,
}

impl KeyValueWriter for MemoryBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.size += key.len() + value.len();
        self.ops.push(BatchOp {
            key: key.to_vec(),
            value: value.to_vec(),
            delete: false,
        });
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.size += key.len();
        self.ops.push(BatchOp {
            key: key.to_vec(),
            value: Vec::new(),
            delete: true,
        });
        Ok(())
    }
}

impl Batch for MemoryBatch {
    fn value_size(&self) -> usize {
        self.size
    }

    fn write(&mut self) -> Result<(), StoreError> {
        let mut guard = self.store.inner.write();
        let db = guard.as_mut().ok_or(StoreError::Closed)?;
        for op in &self.ops {
            if op.delete {
                db.remove(&op.key);
            } else {
                db.insert(op.key.clone(), op.value.clone());
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.ops.clear();
        self.size = 0;
    }

    fn replay<W: KeyValueWriter>(&self, writer: &mut W) -> Result<(), StoreError> {
        for op in &self.ops {
            if op.delete {
                writer.delete(&op.key)?;
            } else {
                writer.put(&op.key, &op.value)?;
            }
        }
        Ok(())
    }
}
