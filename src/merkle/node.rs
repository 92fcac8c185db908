//! Trie node model.
//!
//! Four node variants make up the in-memory tree. `Short` and `Full` are the
//! structural kinds and carry a cache flag; `Hash` stands for a subtree that
//! has not been materialized from the store; `Value` holds raw value bytes
//! and only ever appears in slot 16 of a full node or as the child of a
//! terminated short node.

use primitive_types::H256;
use tiny_keccak::{Hasher, Keccak};

use super::rlp_encode::RlpEncoder;

/// Hash size (Keccak-256).
pub const HASH_SIZE: usize = 32;

/// The empty trie root hash, keccak256 of the RLP empty string.
pub const EMPTY_ROOT: H256 = H256([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
]);

/// Caching metadata carried by structural nodes.
///
/// When `hash` is present it is the authoritative digest of the node's
/// current content; every mutation replaces the flag with a dirty one so a
/// stale hash can never be observed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeFlag {
    /// Cached hash of the node, if it has been computed.
    pub hash: Option<H256>,
    /// Whether the node has changes that must be written to the database.
    pub dirty: bool,
}

impl NodeFlag {
    /// The flag value for a newly created or freshly mutated node.
    pub fn dirty() -> Self {
        Self {
            hash: None,
            dirty: true,
        }
    }

    /// The flag value for a node decoded from a stored blob.
    pub fn decoded(hash: Option<H256>) -> Self {
        Self { hash, dirty: false }
    }
}

/// A node carrying a key segment and a single child.
///
/// Acts as an extension when the child is structural and as a leaf when the
/// key is terminated and the child is an inline value. In-memory keys are hex
/// nibbles; collapsed (hashed) copies carry compact-encoded keys.
#[derive(Clone, Debug)]
pub struct ShortNode {
    pub key: Vec<u8>,
    pub val: Node,
    pub flags: NodeFlag,
}

/// A 17-slot branch node. Slots 0-15 dispatch on the next nibble, slot 16
/// holds the value for a key terminating here.
#[derive(Clone, Debug)]
pub struct FullNode {
    pub children: [Option<Node>; 17],
    pub flags: NodeFlag,
}

impl FullNode {
    /// Creates a branch with no children and a dirty flag.
    pub fn empty() -> Self {
        Self {
            children: Default::default(),
            flags: NodeFlag::dirty(),
        }
    }
}

/// A node in the Merkle Patricia Trie.
#[derive(Clone, Debug)]
pub enum Node {
    /// Key segment plus one child.
    Short(Box<ShortNode>),
    /// 17-slot branch.
    Full(Box<FullNode>),
    /// The digest of a subtree not currently materialized in memory.
    Hash(H256),
    /// Raw value bytes.
    Value(Vec<u8>),
}

impl Node {
    /// Creates a short node with a dirty flag.
    pub fn short(key: Vec<u8>, val: Node) -> Self {
        Node::Short(Box::new(ShortNode {
            key,
            val,
            flags: NodeFlag::dirty(),
        }))
    }

    /// Returns the cache flag as `(hash, dirty)`.
    ///
    /// Hash references report their own digest as clean; value nodes are
    /// always embedded in their parent and report dirty with no hash.
    pub fn cache(&self) -> (Option<H256>, bool) {
        match self {
            Node::Short(n) => (n.flags.hash, n.flags.dirty),
            Node::Full(n) => (n.flags.hash, n.flags.dirty),
            Node::Hash(h) => (Some(*h), false),
            Node::Value(_) => (None, true),
        }
    }

    /// The cached hash of a structural node, if one has been computed.
    pub fn cached_hash(&self) -> Option<H256> {
        match self {
            Node::Short(n) => n.flags.hash,
            Node::Full(n) => n.flags.hash,
            Node::Hash(h) => Some(*h),
            Node::Value(_) => None,
        }
    }

    /// RLP encodes the node into the given encoder.
    ///
    /// Only collapsed nodes may be encoded: short keys must already be in
    /// compact form and structural children must have been reduced to hash
    /// references or embedded (< 32 byte) nodes.
    pub fn encode_to(&self, encoder: &mut RlpEncoder) {
        match self {
            Node::Short(n) => {
                encoder.encode_list(|e| {
                    e.encode_bytes(&n.key);
                    n.val.encode_to(e);
                });
            }
            Node::Full(n) => {
                encoder.encode_list(|e| {
                    for child in n.children.iter() {
                        match child {
                            Some(c) => c.encode_to(e),
                            None => e.encode_empty(),
                        }
                    }
                });
            }
            Node::Hash(h) => encoder.encode_bytes(h.as_bytes()),
            Node::Value(v) => encoder.encode_bytes(v),
        }
    }

    /// RLP encodes the node into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = RlpEncoder::with_capacity(64);
        self.encode_to(&mut encoder);
        encoder.into_bytes()
    }
}

/// Structural equality; cache flags are not compared.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Short(a), Node::Short(b)) => a.key == b.key && a.val == b.val,
            (Node::Full(a), Node::Full(b)) => a.children == b.children,
            (Node::Hash(a), Node::Hash(b)) => a == b,
            (Node::Value(a), Node::Value(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Node {}

/// Computes the Keccak-256 hash of data.
pub fn keccak256(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; HASH_SIZE];
    hasher.finalize(&mut hash);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::nibbles::hex_to_compact;

    #[test]
    fn empty_root_constant() {
        // Empty trie root is keccak256(RLP("")).
        assert_eq!(H256(keccak256(&[0x80])), EMPTY_ROOT);
    }

    #[test]
    fn encode_collapsed_leaf() {
        let node = Node::short(hex_to_compact(&[1, 2, 3, 16]), Node::Value(b"val".to_vec()));
        let encoded = node.encode();
        // [compact("123" terminated), "val"]
        assert_eq!(encoded, vec![0xc7, 0x82, 0x31, 0x23, 0x83, b'v', b'a', b'l']);
    }

    #[test]
    fn encode_full_node_empty_slots() {
        let node = Node::Full(Box::new(FullNode::empty()));
        // 17 empty items.
        assert_eq!(node.encode(), {
            let mut expected = vec![0xd1];
            expected.extend([0x80; 17]);
            expected
        });
    }

    #[test]
    fn encode_hash_reference() {
        let h = H256::repeat_byte(0xab);
        let mut full = FullNode::empty();
        full.children[3] = Some(Node::Hash(h));
        let encoded = Node::Full(Box::new(full)).encode();
        assert_eq!(encoded[4], 0xa0); // 32-byte string header
        assert_eq!(&encoded[5..37], h.as_bytes());
    }

    #[test]
    fn structural_equality_ignores_flags() {
        let a = Node::Short(Box::new(ShortNode {
            key: vec![1, 2],
            val: Node::Value(vec![9]),
            flags: NodeFlag::dirty(),
        }));
        let b = Node::Short(Box::new(ShortNode {
            key: vec![1, 2],
            val: Node::Value(vec![9]),
            flags: NodeFlag::decoded(Some(H256::zero())),
        }));
        assert_eq!(a, b);
    }

    #[test]
    fn cache_flags() {
        let (h, dirty) = Node::Hash(H256::repeat_byte(1)).cache();
        assert_eq!(h, Some(H256::repeat_byte(1)));
        assert!(!dirty);

        let (h, dirty) = Node::short(vec![16], Node::Value(vec![1])).cache();
        assert_eq!(h, None);
        assert!(dirty);
    }
}
