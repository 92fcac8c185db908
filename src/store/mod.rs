//! Storage layer.
//!
//! The byte-level key-value store contracts, an in-memory reference store,
//! and the trie database that caches dirty nodes between trie commits and
//! the disk store.

mod account;
mod kv;
mod memory;
mod trie_db;

pub use account::{Account, EMPTY_CODE_HASH};
pub use kv::{Batch, KeyValueStore, KeyValueWriter, StoreError, IDEAL_BATCH_SIZE};
pub use memory::{MemoryBatch, MemoryStore};
pub use trie_db::{TrieDb, TrieDbError};
