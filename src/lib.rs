//! # mpt_db
//!
//! An authenticated, persistent key-value index built on a Merkle Patricia
//! Trie. Every structural node is content-addressed by the Keccak-256 hash of
//! its serialized form and the trie as a whole is identified by its root hash.
//!
//! ## Architecture
//!
//! The library is split into two major components:
//!
//! 1. **Trie** - An in-memory tree supporting get/update/delete/hash/commit
//!    with lazy loading of absent subtrees from a backing store
//! 2. **TrieDb** - A dirty-node cache between the trie and a flat key-value
//!    store, tracking cross-generation references and flushing with a
//!    two-phase (write-then-uncache) commit
//!
//! ## Modules
//!
//! - `data` - Nibble key codec
//! - `merkle` - Node model, RLP codec, hashing and commit machinery
//! - `store` - Key-value store contracts and the trie database

pub mod data;
pub mod merkle;
pub mod store;

pub use merkle::{MergedNodeSet, Node, NodeSet, Trie, TrieError, TrieId, EMPTY_ROOT};
pub use store::{KeyValueStore, MemoryStore, StoreError, TrieDb};
