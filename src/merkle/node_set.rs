//! Commit output sets.
//!
//! A `NodeSet` is the dirty output of one trie commit: path-keyed updates in
//! insertion order, path-keyed deletions with their previous blobs, and
//! optionally the terminal leaves. A `MergedNodeSet` groups the sets of
//! several tries (one per owner) for a single `TrieDb::update`.

use hashbrown::HashMap;
use primitive_types::H256;
use rustc_hash::FxBuildHasher;
use thiserror::Error;

use super::node::Node;

type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;

/// A terminal value node together with the hash of its parent, used to link
/// storage tries to their owning account nodes.
#[derive(Clone, Debug)]
pub struct Leaf {
    /// Raw blob of the leaf value.
    pub blob: Vec<u8>,
    /// The hash of the parent node.
    pub parent: H256,
}

/// A collapsed trie node together with its hash.
#[derive(Clone, Debug)]
pub struct MemoryNode {
    /// Node hash, computed over the encoded value.
    pub hash: H256,
    /// The collapsed node.
    pub node: Node,
}

/// An updated node paired with its previous on-disk blob, if it had one.
#[derive(Clone, Debug)]
struct NodeWithPrev {
    mem: MemoryNode,
    prev: Option<Vec<u8>>,
}

/// All dirty nodes collected during one commit, keyed by node path.
///
/// Not safe for concurrent use.
#[derive(Debug)]
pub struct NodeSet {
    owner: H256,
    /// Paths of updated nodes in insertion order.
    order: Vec<Vec<u8>>,
    nodes: FastHashMap<Vec<u8>, NodeWithPrev>,
    deletes: FastHashMap<Vec<u8>, Vec<u8>>,
    leaves: Vec<Leaf>,
}

impl NodeSet {
    /// Creates an empty node set for the given trie. The owner is zero for
    /// the account trie and the owning account hash for storage tries.
    pub fn new(owner: H256) -> Self {
        Self {
            owner,
            order: Vec::new(),
            nodes: FastHashMap::with_hasher(FxBuildHasher),
            deletes: FastHashMap::with_hasher(FxBuildHasher),
            leaves: Vec::new(),
        }
    }

    /// The identifier of the trie this set belongs to.
    pub fn owner(&self) -> H256 {
        self.owner
    }

    /// Marks a node as updated (newly inserted or modified), carrying its
    /// previous on-disk blob when it had one.
    pub(crate) fn mark_updated(&mut self, path: Vec<u8>, mem: MemoryNode, prev: Option<Vec<u8>>) {
        self.order.push(path.clone());
        self.nodes.insert(path, NodeWithPrev { mem, prev });
    }

    /// Marks a node as deleted, with the blob it had on disk.
    pub(crate) fn mark_deleted(&mut self, path: &[u8], prev: Vec<u8>) {
        self.deletes.insert(path.to_vec(), prev);
    }

    /// Collects a terminal leaf.
    pub(crate) fn add_leaf(&mut self, leaf: Leaf) {
        self.leaves.push(leaf);
    }

    /// Iterates the updated nodes in insertion order.
    pub fn updates(&self) -> impl Iterator<Item = (&[u8], &MemoryNode, Option<&[u8]>)> {
        self.order.iter().filter_map(|path| {
            self.nodes
                .get(path)
                .map(|n| (path.as_slice(), &n.mem, n.prev.as_deref()))
        })
    }

    /// Iterates the deleted paths with their previous blobs.
    pub fn deletes(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.deletes.iter().map(|(p, b)| (p.as_slice(), b.as_slice()))
    }

    /// The collected leaves.
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Returns true if the set records no changes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.deletes.is_empty()
    }
}

/// `MergedNodeSet::merge` was called twice for one owner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate trie for owner {0:x}")]
pub struct DuplicateOwnerError(pub H256);

/// A merged dirty node set for a group of tries.
#[derive(Debug, Default)]
pub struct MergedNodeSet {
    sets: FastHashMap<H256, NodeSet>,
}

impl MergedNodeSet {
    pub fn new() -> Self {
        Self {
            sets: FastHashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Creates a merged set holding a single node set.
    pub fn from_set(set: NodeSet) -> Self {
        let mut merged = Self::new();
        // A fresh set cannot collide.
        let _ = merged.merge(set);
        merged
    }

    /// Adds a trie's node set, rejecting a second set for the same owner.
    pub fn merge(&mut self, other: NodeSet) -> Result<(), DuplicateOwnerError> {
        if self.sets.contains_key(&other.owner) {
            return Err(DuplicateOwnerError(other.owner));
        }
        self.sets.insert(other.owner, other);
        Ok(())
    }

    /// Consumes the merged set, handing out the per-owner sets.
    pub(crate) fn into_sets(self) -> FastHashMap<H256, NodeSet> {
        self.sets
    }
}
