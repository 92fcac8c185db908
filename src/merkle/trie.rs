//! The Merkle Patricia Trie.
//!
//! A `Trie` sits on top of a `TrieDb` and supports retrieval, insertion and
//! deletion with lazy loading of absent subtrees. Whenever the trie performs
//! a commit, the generated nodes are gathered and returned in a `NodeSet`;
//! committing consumes the trie, and callers re-open it with the new root
//! against the updated database.
//!
//! A trie is not safe for concurrent use.

use std::mem;

use primitive_types::H256;
use thiserror::Error;

use super::committer::Committer;
use super::decode::{decode_node, DecodeError};
use super::hasher::Hasher;
use super::node::{FullNode, Node, NodeFlag, ShortNode, EMPTY_ROOT};
use super::node_set::NodeSet;
use super::tracker::Tracker;
use crate::data::nibbles::{key_to_hex, prefix_len};
use crate::store::{KeyValueStore, StoreError, TrieDb};

/// Mutation count above which hashing recurses on the rayon pool.
const PARALLEL_HASH_THRESHOLD: usize = 100;

/// The identifier for uniquely addressing a trie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrieId {
    /// The owning trie: zero for the account trie, the account hash for a
    /// storage trie.
    pub owner: H256,
    /// The root hash of the trie.
    pub root: H256,
}

impl TrieId {
    /// An identifier for the top-level (account) trie with the given root.
    pub fn new(root: H256) -> Self {
        Self {
            owner: H256::zero(),
            root,
        }
    }

    /// An identifier for the storage trie of the given account.
    pub fn storage(owner: H256, root: H256) -> Self {
        Self { owner, root }
    }
}

/// Errors surfaced by trie operations.
#[derive(Error, Debug)]
pub enum TrieError {
    #[error(transparent)]
    MissingNode(#[from] Box<MissingNodeError>),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A hash reference could not be resolved from the store.
#[derive(Error, Debug)]
#[error("missing trie node {hash:x} (owner {owner:x}) at path {path:02x?}")]
pub struct MissingNodeError {
    pub owner: H256,
    pub hash: H256,
    pub path: Vec<u8>,
    #[source]
    pub cause: Option<StoreError>,
}

/// A Merkle Patricia Trie over a backing trie database.
pub struct Trie<'db, S: KeyValueStore> {
    pub(crate) root: Option<Node>,
    owner: H256,
    reader: &'db TrieDb<S>,
    tracker: Tracker,
    /// Mutations since the last hashing operation; drives the decision to
    /// hash branch children in parallel.
    unhashed: usize,
}

impl<'db, S: KeyValueStore> std::fmt::Debug for Trie<'db, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("root", &self.root)
            .field("owner", &self.owner)
            .field("tracker", &self.tracker)
            .field("unhashed", &self.unhashed)
            .finish()
    }
}

impl<'db, S: KeyValueStore> Trie<'db, S> {
    /// Creates a trie with the provided identifier over the given database.
    ///
    /// A zero or empty-trie root yields an empty trie; any other root must be
    /// resolvable through the database or a missing-node error is returned.
    pub fn new(id: TrieId, db: &'db TrieDb<S>) -> Result<Self, TrieError> {
        let mut trie = Self {
            root: None,
            owner: id.owner,
            reader: db,
            tracker: Tracker::new(),
            unhashed: 0,
        };
        if !id.root.is_zero() && id.root != EMPTY_ROOT {
            let root = trie.resolve_and_track(id.root, &[])?;
            trie.root = Some(root);
        }
        Ok(trie)
    }

    /// Creates an empty trie over the given database.
    pub fn new_empty(db: &'db TrieDb<S>) -> Self {
        Self {
            root: None,
            owner: H256::zero(),
            reader: db,
            tracker: Tracker::new(),
            unhashed: 0,
        }
    }

    /// Retrieves the value stored under `key`, or `None` when the key is not
    /// present.
    ///
    /// Subtrees resolved from the store along the way are spliced into the
    /// in-memory tree. The returned bytes must be treated as read-only.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        let k = key_to_hex(key);
        let root = self.root.take();
        let (root, res) = self.get_at(root, &k, 0);
        self.root = root;
        res
    }

    /// Associates `key` with `value`. An empty value is equivalent to
    /// deleting the key.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        if value.is_empty() {
            return self.delete(key);
        }
        self.unhashed += 1;
        let k = key_to_hex(key);
        let root = self.root.take();
        let mut prefix = Vec::with_capacity(k.len());
        let (root, res) = self.insert_at(root, &mut prefix, &k, Node::Value(value.to_vec()));
        self.root = root;
        res.map(drop)
    }

    /// Removes `key` from the trie, reducing nodes on the way up to keep the
    /// tree in minimal form.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), TrieError> {
        self.unhashed += 1;
        let k = key_to_hex(key);
        let root = self.root.take();
        let mut prefix = Vec::with_capacity(k.len());
        let (root, res) = self.delete_at(root, &mut prefix, &k);
        self.root = root;
        res.map(drop)
    }

    /// Returns the root hash of the trie, `EMPTY_ROOT` for an empty tree.
    /// Does not write to the database.
    pub fn hash(&mut self) -> H256 {
        let Some(root) = self.root.take() else {
            return EMPTY_ROOT;
        };
        let mut hasher = Hasher::new(self.unhashed >= PARALLEL_HASH_THRESHOLD);
        let (hashed, cached) = hasher.hash(root, true);
        self.unhashed = 0;
        self.root = Some(cached);
        match hashed {
            Node::Hash(h) => h,
            _ => unreachable!("root hashing is forced"),
        }
    }

    /// Hashes the trie and collects every dirty node into a `NodeSet`,
    /// consuming the trie. Re-open with the returned root to keep operating
    /// on the new generation.
    pub fn commit(mut self, collect_leaf: bool) -> Result<(H256, NodeSet), TrieError> {
        let root_hash = self.hash();
        let mut nodes = NodeSet::new(self.owner);
        let Some(root) = self.root.take() else {
            // The tree is empty; only tracked deletions can remain.
            for path in self.tracker.delete_list() {
                if let Some(prev) = self.tracker.origin(path) {
                    if !prev.is_empty() {
                        nodes.mark_deleted(path, prev.to_vec());
                    }
                }
            }
            return Ok((EMPTY_ROOT, nodes));
        };
        let committer = Committer::new(nodes, &self.tracker, collect_leaf);
        let (_, nodes) = committer.commit(root)?;
        Ok((root_hash, nodes))
    }

    /// Loads a node from the store and records its blob with the tracker as
    /// the node's original value.
    fn resolve_and_track(&mut self, hash: H256, prefix: &[u8]) -> Result<Node, TrieError> {
        let blob = self.reader.node_blob(hash).map_err(|err| {
            Box::new(MissingNodeError {
                owner: self.owner,
                hash,
                path: prefix.to_vec(),
                cause: Some(err),
            })
        })?;
        self.tracker.on_read(prefix, blob.clone());
        Ok(decode_node(Some(hash), &blob)?)
    }

    /// Recursive lookup. Takes the node by value and hands it back alongside
    /// the result, so resolved subtrees are spliced in and the tree is intact
    /// on every path, errors included.
    fn get_at(
        &mut self,
        n: Option<Node>,
        key: &[u8],
        pos: usize,
    ) -> (Option<Node>, Result<Option<Vec<u8>>, TrieError>) {
        match n {
            None => (None, Ok(None)),
            Some(Node::Value(v)) => {
                let value = v.clone();
                (Some(Node::Value(v)), Ok(Some(value)))
            }
            Some(Node::Short(mut sn)) => {
                if key.len() - pos < sn.key.len() || key[pos..pos + sn.key.len()] != sn.key[..] {
                    // Key not present in the trie.
                    return (Some(Node::Short(sn)), Ok(None));
                }
                let child = mem::replace(&mut sn.val, Node::Value(Vec::new()));
                let (child, res) = self.get_at(Some(child), key, pos + sn.key.len());
                if let Some(child) = child {
                    sn.val = child;
                }
                (Some(Node::Short(sn)), res)
            }
            Some(Node::Full(mut fnode)) => {
                let idx = key[pos] as usize;
                let child = fnode.children[idx].take();
                let (child, res) = self.get_at(child, key, pos + 1);
                fnode.children[idx] = child;
                (Some(Node::Full(fnode)), res)
            }
            Some(Node::Hash(hash)) => {
                let resolved = match self.resolve_and_track(hash, &key[..pos]) {
                    Ok(node) => node,
                    Err(err) => return (Some(Node::Hash(hash)), Err(err)),
                };
                self.get_at(Some(resolved), key, pos)
            }
        }
    }

    /// Recursive insertion. `prefix` is the consumed path from the root,
    /// `key` the remaining suffix. Returns the replacement node and whether
    /// anything changed.
    fn insert_at(
        &mut self,
        n: Option<Node>,
        prefix: &mut Vec<u8>,
        key: &[u8],
        value: Node,
    ) -> (Option<Node>, Result<bool, TrieError>) {
        if key.is_empty() {
            return match n {
                Some(Node::Value(old)) => {
                    let dirty = !matches!(&value, Node::Value(new) if *new == old);
                    (Some(value), Ok(dirty))
                }
                _ => (Some(value), Ok(true)),
            };
        }
        match n {
            Some(Node::Short(sn)) => {
                let matchlen = prefix_len(key, &sn.key);
                // The whole short key matches: keep this node and descend.
                if matchlen == sn.key.len() {
                    let mut sn = sn;
                    let plen = prefix.len();
                    prefix.extend_from_slice(&key[..matchlen]);
                    let child = mem::replace(&mut sn.val, Node::Value(Vec::new()));
                    let (child, res) = self.insert_at(Some(child), prefix, &key[matchlen..], value);
                    prefix.truncate(plen);
                    match child {
                        Some(child) => sn.val = child,
                        None => unreachable!("insertion cannot remove a node"),
                    }
                    return match res {
                        Ok(true) => {
                            sn.flags = NodeFlag::dirty();
                            (Some(Node::Short(sn)), Ok(true))
                        }
                        other => (Some(Node::Short(sn)), other),
                    };
                }
                // Otherwise branch out at the index where the keys diverge.
                let ShortNode { key: skey, val, .. } = *sn;
                let mut branch = FullNode::empty();
                let plen = prefix.len();

                prefix.extend_from_slice(&skey[..matchlen + 1]);
                branch.children[skey[matchlen] as usize] =
                    Some(self.make_subtree(prefix, &skey[matchlen + 1..], val));
                prefix.truncate(plen);

                prefix.extend_from_slice(&key[..matchlen + 1]);
                branch.children[key[matchlen] as usize] =
                    Some(self.make_subtree(prefix, &key[matchlen + 1..], value));
                prefix.truncate(plen);

                let branch = Node::Full(Box::new(branch));
                // The branch replaces this short node directly when the keys
                // diverge at the first nibble.
                if matchlen == 0 {
                    return (Some(branch), Ok(true));
                }
                prefix.extend_from_slice(&key[..matchlen]);
                self.tracker.on_insert(prefix);
                prefix.truncate(plen);
                (Some(Node::short(key[..matchlen].to_vec(), branch)), Ok(true))
            }
            Some(Node::Full(mut fnode)) => {
                let idx = key[0] as usize;
                let plen = prefix.len();
                prefix.push(key[0]);
                let child = fnode.children[idx].take();
                let (child, res) = self.insert_at(child, prefix, &key[1..], value);
                prefix.truncate(plen);
                fnode.children[idx] = child;
                match res {
                    Ok(true) => {
                        fnode.flags = NodeFlag::dirty();
                        (Some(Node::Full(fnode)), Ok(true))
                    }
                    other => (Some(Node::Full(fnode)), other),
                }
            }
            None => (Some(self.make_subtree(prefix, key, value)), Ok(true)),
            Some(Node::Hash(hash)) => {
                // Part of the trie is not loaded yet. Load the node and
                // insert into it, leaving the resolved path in the tree.
                let resolved = match self.resolve_and_track(hash, prefix) {
                    Ok(node) => node,
                    Err(err) => return (Some(Node::Hash(hash)), Err(err)),
                };
                self.insert_at(Some(resolved), prefix, key, value)
            }
            Some(n @ Node::Value(_)) => {
                unreachable!("invalid node at insert: {n:?}")
            }
        }
    }

    /// Builds the subtree for a key suffix below a fresh branch slot. An
    /// empty suffix yields the value itself; otherwise a new short node is
    /// created and tracked. Value nodes are never tracked since they are
    /// always embedded in their parent.
    fn make_subtree(&mut self, prefix: &[u8], key: &[u8], value: Node) -> Node {
        if key.is_empty() {
            return value;
        }
        self.tracker.on_insert(prefix);
        Node::short(key.to_vec(), value)
    }

    /// Recursive deletion, simplifying nodes on the way up to keep the trie
    /// in its minimal form.
    fn delete_at(
        &mut self,
        n: Option<Node>,
        prefix: &mut Vec<u8>,
        key: &[u8],
    ) -> (Option<Node>, Result<bool, TrieError>) {
        match n {
            Some(Node::Short(sn)) => {
                let matchlen = prefix_len(key, &sn.key);
                if matchlen < sn.key.len() {
                    // Mismatch, nothing to delete.
                    return (Some(Node::Short(sn)), Ok(false));
                }
                if matchlen == key.len() {
                    // The matched short node is deleted entirely.
                    self.tracker.on_delete(prefix);
                    return (None, Ok(true));
                }
                // The key is longer than the short key. Remove the remaining
                // suffix from the subtrie; the child can never vanish since
                // the subtrie holds at least two other values.
                let ShortNode {
                    key: skey,
                    val,
                    flags,
                } = *sn;
                let plen = prefix.len();
                prefix.extend_from_slice(&key[..skey.len()]);
                let (child, res) = self.delete_at(Some(val), prefix, &key[skey.len()..]);
                prefix.truncate(plen);
                match res {
                    Ok(true) => match child {
                        Some(Node::Short(csn)) => {
                            // Deleting reduced the subtrie to another short
                            // node. Merge the two into one to avoid a
                            // short/short chain; the child's own database
                            // entry is absorbed by the merge.
                            prefix.extend_from_slice(&skey);
                            self.tracker.on_delete(prefix);
                            prefix.truncate(plen);
                            let mut merged = skey;
                            merged.extend_from_slice(&csn.key);
                            (Some(Node::short(merged, csn.val)), Ok(true))
                        }
                        Some(child) => (Some(Node::short(skey, child)), Ok(true)),
                        None => unreachable!("short node subtrie cannot vanish"),
                    },
                    other => {
                        let Some(val) = child else {
                            unreachable!("unchanged delete hands the node back")
                        };
                        (
                            Some(Node::Short(Box::new(ShortNode {
                                key: skey,
                                val,
                                flags,
                            }))),
                            other,
                        )
                    }
                }
            }
            Some(Node::Full(mut fnode)) => {
                let idx = key[0] as usize;

                // Resolve the would-be surviving sibling up front, so the
                // reduction below never fails after the tree was mutated.
                if let Err(err) = self.resolve_lone_sibling(&mut fnode, idx, prefix) {
                    return (Some(Node::Full(fnode)), Err(err));
                }

                let plen = prefix.len();
                prefix.push(key[0]);
                let child = fnode.children[idx].take();
                let (child, res) = self.delete_at(child, prefix, &key[1..]);
                prefix.truncate(plen);
                fnode.children[idx] = child;
                match res {
                    Ok(true) => {}
                    other => return (Some(Node::Full(fnode)), other),
                }
                fnode.flags = NodeFlag::dirty();

                // The branch held at least two children before the delete;
                // if the slot is still occupied it cannot be reduced.
                if fnode.children[idx].is_some() {
                    return (Some(Node::Full(fnode)), Ok(true));
                }
                // Count the remaining children: `pos` ends up holding the
                // single occupied slot, or -2 when two or more remain.
                let mut pos: i32 = -1;
                for (i, child) in fnode.children.iter().enumerate() {
                    if child.is_some() {
                        if pos == -1 {
                            pos = i as i32;
                        } else {
                            pos = -2;
                            break;
                        }
                    }
                }
                if pos >= 0 {
                    let pos = pos as usize;
                    if pos != 16 {
                        // If the remaining entry is a short node, it replaces
                        // the branch and gets the missing nibble tacked onto
                        // the front of its key; its old database entry is
                        // absorbed into the parent.
                        match fnode.children[pos].take() {
                            Some(Node::Short(csn)) => {
                                prefix.push(pos as u8);
                                self.tracker.on_delete(prefix);
                                prefix.truncate(plen);
                                let mut merged = vec![pos as u8];
                                merged.extend_from_slice(&csn.key);
                                return (Some(Node::short(merged, csn.val)), Ok(true));
                            }
                            child => fnode.children[pos] = child,
                        }
                    }
                    // Otherwise the branch shrinks to a one-nibble short
                    // node carrying the child.
                    let Some(child) = fnode.children[pos].take() else {
                        unreachable!("occupied slot vanished during reduction")
                    };
                    return (Some(Node::short(vec![pos as u8], child)), Ok(true));
                }
                // Still at least two children, no reduction.
                (Some(Node::Full(fnode)), Ok(true))
            }
            Some(Node::Value(_)) => (None, Ok(true)),
            None => (None, Ok(false)),
            Some(Node::Hash(hash)) => {
                // Part of the trie is not loaded yet. Load the node and
                // delete from it, leaving the resolved path in the tree.
                let resolved = match self.resolve_and_track(hash, prefix) {
                    Ok(node) => node,
                    Err(err) => return (Some(Node::Hash(hash)), Err(err)),
                };
                self.delete_at(Some(resolved), prefix, key)
            }
        }
    }

    /// When the branch holds exactly two children and a delete below `idx`
    /// could leave a lone hash-reference sibling, materialize that sibling
    /// now. This keeps the post-delete reduction infallible.
    fn resolve_lone_sibling(
        &mut self,
        fnode: &mut FullNode,
        idx: usize,
        prefix: &mut Vec<u8>,
    ) -> Result<(), TrieError> {
        let occupied: Vec<usize> = fnode
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.is_some().then_some(i))
            .collect();
        if occupied.len() != 2 {
            return Ok(());
        }
        let Some(&pos) = occupied.iter().find(|&&i| i != idx) else {
            return Ok(());
        };
        if pos == 16 {
            return Ok(());
        }
        if let Some(Node::Hash(hash)) = &fnode.children[pos] {
            let hash = *hash;
            let plen = prefix.len();
            prefix.push(pos as u8);
            let resolved = self.resolve_and_track(hash, prefix);
            prefix.truncate(plen);
            fnode.children[pos] = Some(resolved?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn new_db() -> TrieDb<MemoryStore> {
        TrieDb::new(MemoryStore::new())
    }

    #[test]
    fn empty_trie_hash() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        assert_eq!(trie.hash(), EMPTY_ROOT);
    }

    #[test]
    fn single_update_and_get() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);

        let key = [0u8; 32];
        trie.update(&key, b"test").unwrap();
        assert_eq!(trie.get(&key).unwrap().as_deref(), Some(&b"test"[..]));
    }

    #[test]
    fn get_missing_returns_none() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"present", b"value").unwrap();
        assert_eq!(trie.get(b"absent").unwrap(), None);
    }

    #[test]
    fn overwrite_changes_hash() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"key", b"one").unwrap();
        let h1 = trie.hash();
        trie.update(b"key", b"two").unwrap();
        let h2 = trie.hash();
        assert_ne!(h1, h2);
        assert_eq!(trie.get(b"key").unwrap().as_deref(), Some(&b"two"[..]));
    }

    #[test]
    fn branch_split_shapes_tree() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"cat", b"1").unwrap();
        trie.update(b"car", b"2").unwrap();

        // "cat" and "car" share the first five nibbles; the root becomes a
        // short node over that prefix pointing at a branch on 't'/'r' lows.
        let Some(Node::Short(sn)) = &trie.root else {
            panic!("expected short root")
        };
        assert_eq!(sn.key, key_to_hex(b"cat")[..5].to_vec());
        let Node::Full(branch) = &sn.val else {
            panic!("expected branch under root")
        };
        assert!(branch.children[4].is_some()); // 't' & 0x0f
        assert!(branch.children[2].is_some()); // 'r' & 0x0f

        assert_eq!(trie.get(b"cat").unwrap().as_deref(), Some(&b"1"[..]));
        assert_eq!(trie.get(b"car").unwrap().as_deref(), Some(&b"2"[..]));
    }

    #[test]
    fn delete_merges_short_nodes() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"cat", b"1").unwrap();
        trie.update(b"car", b"2").unwrap();
        trie.delete(b"cat").unwrap();

        // The branch collapses back into a single short node spelling the
        // whole remaining key.
        let Some(Node::Short(sn)) = &trie.root else {
            panic!("expected short root")
        };
        assert_eq!(sn.key, key_to_hex(b"car"));
        assert_eq!(sn.val, Node::Value(b"2".to_vec()));
        assert_eq!(trie.get(b"car").unwrap().as_deref(), Some(&b"2"[..]));
        assert_eq!(trie.get(b"cat").unwrap(), None);
    }

    #[test]
    fn delete_restores_unmapped() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"other", b"stays").unwrap();
        let before = trie.hash();

        trie.update(b"key", b"value").unwrap();
        trie.delete(b"key").unwrap();
        assert_eq!(trie.get(b"key").unwrap(), None);
        assert_eq!(trie.hash(), before);
    }

    #[test]
    fn delete_everything_yields_empty_root() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"a", b"1").unwrap();
        trie.update(b"b", b"2").unwrap();
        trie.delete(b"a").unwrap();
        trie.delete(b"b").unwrap();
        assert_eq!(trie.hash(), EMPTY_ROOT);
    }

    #[test]
    fn hash_is_order_independent() {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0u8..32)
            .map(|i| (vec![i, i ^ 0x5a, i.wrapping_mul(7)], vec![i; 3]))
            .collect();

        let db = new_db();
        let mut forward = Trie::new_empty(&db);
        for (k, v) in &pairs {
            forward.update(k, v).unwrap();
        }
        let mut backward = Trie::new_empty(&db);
        for (k, v) in pairs.iter().rev() {
            backward.update(k, v).unwrap();
        }
        assert_eq!(forward.hash(), backward.hash());
    }

    #[test]
    fn update_with_empty_value_deletes() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"key", b"value").unwrap();
        trie.update(b"key", b"").unwrap();
        assert_eq!(trie.get(b"key").unwrap(), None);
        assert_eq!(trie.hash(), EMPTY_ROOT);
    }

    #[test]
    fn missing_root_fails_to_open() {
        let db = new_db();
        let bogus = H256::repeat_byte(0x99);
        let err = Trie::new(TrieId::new(bogus), &db).unwrap_err();
        let TrieError::MissingNode(missing) = err else {
            panic!("expected missing node error")
        };
        assert_eq!(missing.hash, bogus);
        assert_eq!(missing.path, Vec::<u8>::new());
    }

    #[test]
    fn zero_and_empty_root_open_empty() {
        let db = new_db();
        let mut a = Trie::new(TrieId::new(H256::zero()), &db).unwrap();
        let mut b = Trie::new(TrieId::new(EMPTY_ROOT), &db).unwrap();
        assert_eq!(a.hash(), EMPTY_ROOT);
        assert_eq!(b.hash(), EMPTY_ROOT);
    }

    #[test]
    fn commit_returns_hash_and_nodes() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        trie.update(b"doge", b"coin").unwrap();
        trie.update(b"dog", b"puppy").unwrap();

        let (root, set) = trie.commit(false).unwrap();
        assert_ne!(root, EMPTY_ROOT);
        assert!(!set.is_empty());
        assert_eq!(set.owner(), H256::zero());
    }

    #[test]
    fn commit_empty_trie() {
        let db = new_db();
        let trie = Trie::new_empty(&db);
        let (root, set) = trie.commit(false).unwrap();
        assert_eq!(root, EMPTY_ROOT);
        assert!(set.is_empty());
    }

    #[test]
    fn commit_collects_leaves() {
        let db = new_db();
        let mut trie = Trie::new_empty(&db);
        // Values above the embedding threshold, so the leaves get their own
        // hashes and parents.
        trie.update(b"k1", &[0x11; 40]).unwrap();
        trie.update(b"k2", &[0x22; 40]).unwrap();

        let (_, set) = trie.commit(true).unwrap();
        let mut blobs: Vec<&[u8]> = set.leaves().iter().map(|l| l.blob.as_slice()).collect();
        blobs.sort();
        assert_eq!(blobs, vec![&[0x11; 40][..], &[0x22; 40][..]]);
    }
}
