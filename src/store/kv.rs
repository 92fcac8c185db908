//! Key-value store contracts.
//!
//! The trie database is written against these traits only; any byte-level
//! store with batch writes can back it. Keys under the trie keyspace are
//! always 32-byte node hashes and values are canonical node encodings.

use thiserror::Error;

/// The amount of queued key+value bytes after which a batch should be
/// flushed in one write.
pub const IDEAL_BATCH_SIZE: usize = 100 * 1024;

/// Store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("database closed")]
    Closed,
}

/// Write access to a key-value sink. Implemented by batches and by the
/// commit-time uncacher that replayed batches are drained into.
pub trait KeyValueWriter {
    /// Inserts the given value into the sink.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Removes the key from the sink.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;
}

/// A write-only buffer that commits its changes to the host store when
/// `write` is called. A batch cannot be used concurrently.
pub trait Batch: KeyValueWriter {
    /// The amount of data queued up for writing.
    fn value_size(&self) -> usize;

    /// Flushes any accumulated data to the store.
    fn write(&mut self) -> Result<(), StoreError>;

    /// Resets the batch for reuse.
    fn reset(&mut self);

    /// Re-issues the queued operations into the given writer.
    fn replay<W: KeyValueWriter>(&self, writer: &mut W) -> Result<(), StoreError>;
}

/// A byte-level key-value store with batch writes.
pub trait KeyValueStore: Send + Sync {
    type Batch: Batch;

    /// Retrieves whether a key is present in the store.
    fn has(&self, key: &[u8]) -> Result<bool, StoreError>;

    /// Retrieves the value of the given key.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Inserts the given value into the store.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Removes the key from the store.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Creates a write-only buffer that accumulates changes until `write`.
    fn new_batch(&self) -> Self::Batch;
}
