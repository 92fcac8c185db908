//! The trie engine.
//!
//! Node model, canonical RLP codec, hashing pipeline and commit machinery for
//! the Merkle Patricia Trie.

mod committer;
pub mod decode;
mod hasher;
mod node;
mod node_set;
pub mod rlp_decode;
mod rlp_encode;
mod tracker;
mod trie;

#[cfg(test)]
mod tests;

pub use decode::{decode_node, DecodeError};
pub use node::{keccak256, FullNode, Node, NodeFlag, ShortNode, EMPTY_ROOT, HASH_SIZE};
pub use node_set::{DuplicateOwnerError, Leaf, MemoryNode, MergedNodeSet, NodeSet};
pub use rlp_encode::RlpEncoder;
pub use trie::{MissingNodeError, Trie, TrieError, TrieId};
