//! Subtree hashing.
//!
//! The hasher collapses a dirty subtree into its hash-addressed form. Each
//! call returns `(hashed, cached)`: the reference the parent should store
//! (a hash, or the collapsed node itself when its encoding is below 32 bytes
//! and must be embedded), and the original node with its cache flag updated
//! for installing back into the tree.

use std::mem;

use parking_lot::Mutex;
use primitive_types::H256;
use rayon::prelude::*;

use super::node::{keccak256, FullNode, Node, ShortNode, HASH_SIZE};
use super::rlp_encode::RlpEncoder;
use crate::data::nibbles::hex_to_compact;

/// Branch children are hashed on the rayon pool when more than this many
/// slots are populated.
const PARALLEL_CHILDREN: usize = 8;

/// Upper bound on pooled scratch encoders.
const POOL_CAPACITY: usize = 32;

/// Shared pool of scratch encoders, so repeated hashing reuses allocations.
static ENCODER_POOL: Mutex<Vec<RlpEncoder>> = Mutex::new(Vec::new());

/// Collapses nodes into their hash-addressed form.
pub(crate) struct Hasher {
    enc: RlpEncoder,
    parallel: bool,
}

impl Hasher {
    /// Creates a hasher, reusing a pooled scratch encoder when available.
    pub fn new(parallel: bool) -> Self {
        let enc = ENCODER_POOL
            .lock()
            .pop()
            .unwrap_or_else(|| RlpEncoder::with_capacity(512));
        Self { enc, parallel }
    }

    /// Collapses `n` and returns `(hashed, cached)`.
    ///
    /// With `force` set the node is hashed even when its encoding is smaller
    /// than a hash; this is used for the root, which is always addressed by
    /// digest.
    pub fn hash(&mut self, n: Node, force: bool) -> (Node, Node) {
        // A cached hash is authoritative, mutation always clears it.
        if let Some(hash) = n.cached_hash() {
            return (Node::Hash(hash), n);
        }
        match n {
            Node::Short(sn) => {
                let (collapsed, mut cached) = self.hash_short_children(*sn);
                let hashed = self.short_node_to_hash(collapsed, force);
                cached.flags.hash = match &hashed {
                    Node::Hash(h) => Some(*h),
                    _ => None,
                };
                (hashed, Node::Short(Box::new(cached)))
            }
            Node::Full(fnode) => {
                let (collapsed, mut cached) = self.hash_full_children(*fnode);
                let hashed = self.full_node_to_hash(collapsed, force);
                cached.flags.hash = match &hashed {
                    Node::Hash(h) => Some(*h),
                    _ => None,
                };
                (hashed, Node::Full(Box::new(cached)))
            }
            // Value nodes are embedded by their parent as-is.
            other => (other.clone(), other),
        }
    }

    /// Collapses the child of a short node, producing the compact-keyed copy
    /// to encode and the hex-keyed copy to keep in the tree.
    fn hash_short_children(&mut self, n: ShortNode) -> (ShortNode, ShortNode) {
        let ShortNode { key, val, flags } = n;
        let (collapsed_val, cached_val) = match val {
            val @ (Node::Short(_) | Node::Full(_)) => self.hash(val, false),
            other => (other.clone(), other),
        };
        let collapsed = ShortNode {
            key: hex_to_compact(&key),
            val: collapsed_val,
            flags: Default::default(),
        };
        let cached = ShortNode { key, val: cached_val, flags };
        (collapsed, cached)
    }

    /// Collapses the children of a full node.
    fn hash_full_children(&mut self, n: FullNode) -> (FullNode, FullNode) {
        let FullNode { mut children, flags } = n;
        let mut collapsed: [Option<Node>; 17] = Default::default();
        let mut cached: [Option<Node>; 17] = Default::default();

        let populated = children[..16].iter().filter(|c| c.is_some()).count();
        if self.parallel && populated > PARALLEL_CHILDREN {
            let tasks: Vec<(usize, Node)> = children[..16]
                .iter_mut()
                .enumerate()
                .filter_map(|(i, slot)| slot.take().map(|child| (i, child)))
                .collect();
            let results: Vec<(usize, Node, Node)> = tasks
                .into_par_iter()
                .map(|(i, child)| {
                    let mut hasher = Hasher::new(false);
                    let (hashed, kept) = hasher.hash(child, false);
                    (i, hashed, kept)
                })
                .collect();
            for (i, hashed, kept) in results {
                collapsed[i] = Some(hashed);
                cached[i] = Some(kept);
            }
        } else {
            for i in 0..16 {
                if let Some(child) = children[i].take() {
                    let (hashed, kept) = self.hash(child, false);
                    collapsed[i] = Some(hashed);
                    cached[i] = Some(kept);
                }
            }
        }
        collapsed[16] = children[16].take();
        cached[16] = collapsed[16].clone();

        (
            FullNode {
                children: collapsed,
                flags: Default::default(),
            },
            FullNode {
                children: cached,
                flags,
            },
        )
    }

    /// Encodes a collapsed short node; returns the node itself when it must
    /// be embedded, its digest otherwise.
    fn short_node_to_hash(&mut self, n: ShortNode, force: bool) -> Node {
        let node = Node::Short(Box::new(n));
        self.enc.clear();
        node.encode_to(&mut self.enc);
        if self.enc.len() < HASH_SIZE && !force {
            return node;
        }
        Node::Hash(self.hash_data())
    }

    /// Encodes a collapsed full node; returns the node itself when it must
    /// be embedded, its digest otherwise.
    fn full_node_to_hash(&mut self, n: FullNode, force: bool) -> Node {
        let node = Node::Full(Box::new(n));
        self.enc.clear();
        node.encode_to(&mut self.enc);
        if self.enc.len() < HASH_SIZE && !force {
            return node;
        }
        Node::Hash(self.hash_data())
    }

    fn hash_data(&self) -> H256 {
        H256(keccak256(self.enc.as_bytes()))
    }
}

impl Drop for Hasher {
    fn drop(&mut self) {
        // Return the scratch encoder to the pool, error paths included.
        let mut enc = mem::take(&mut self.enc);
        enc.clear();
        let mut pool = ENCODER_POOL.lock();
        if pool.len() < POOL_CAPACITY {
            pool.push(enc);
        }
    }
}
