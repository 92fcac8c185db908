//! The trie database.
//!
//! `TrieDb` is an intermediate layer between the trie and the disk store: it
//! accumulates the dirty nodes of committed trie generations, tracks the
//! reference graph between them, and flushes reachable subgraphs to disk with
//! a two-phase commit. Data is written out in a batch first and entries are
//! uncached only after the write lands, so readers always find a node either
//! in the dirty cache or in the store.

use hashbrown::HashMap;
use parking_lot::RwLock;
use primitive_types::H256;
use rustc_hash::FxBuildHasher;
use thiserror::Error;
use tracing::{debug, trace};

use super::account::Account;
use super::kv::{Batch, KeyValueStore, KeyValueWriter, StoreError, IDEAL_BATCH_SIZE};
use super::memory::MemoryStore;
use crate::merkle::{DecodeError, MergedNodeSet, Node, EMPTY_ROOT, HASH_SIZE};

type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;

/// Errors surfaced by `TrieDb::update` and `TrieDb::commit`.
#[derive(Error, Debug)]
pub enum TrieDbError {
    /// A leaf of the account trie did not decode as an account record.
    #[error("account decode failed: {0}")]
    Account(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A dirty trie node and its place in the reference graph and flush-list.
struct CachedNode {
    /// The collapsed node, `None` only for the metaroot sentinel.
    node: Option<Node>,
    /// Number of cached entries referencing this one, plus external pins.
    parents: u32,
    /// Multi-set of outgoing references added through `reference`.
    children: FastHashMap<H256, u16>,
    /// Previous node in the flush-list.
    flush_prev: H256,
    /// Next node in the flush-list.
    flush_next: H256,
}

impl CachedNode {
    fn new(node: Node) -> Self {
        Self {
            node: Some(node),
            parents: 0,
            children: FastHashMap::with_hasher(FxBuildHasher),
            flush_prev: H256::zero(),
            flush_next: H256::zero(),
        }
    }

    /// The sentinel entry seeded at the zero hash; its children map holds
    /// the currently pinned roots.
    fn sentinel() -> Self {
        Self {
            node: None,
            parents: 0,
            children: FastHashMap::with_hasher(FxBuildHasher),
            flush_prev: H256::zero(),
            flush_next: H256::zero(),
        }
    }

    /// The canonical encoding of the cached node.
    fn rlp(&self) -> Option<Vec<u8>> {
        self.node.as_ref().map(Node::encode)
    }

    /// Invokes `f` for every child: first the explicitly referenced ones,
    /// then the hash references reachable inside the cached node itself.
    fn for_children(&self, f: &mut impl FnMut(H256)) {
        for child in self.children.keys() {
            f(*child);
        }
        if let Some(node) = &self.node {
            gather_children(node, f);
        }
    }
}

/// Walks a collapsed node, yielding the hash references it embeds.
fn gather_children(n: &Node, f: &mut impl FnMut(H256)) {
    match n {
        Node::Short(sn) => gather_children(&sn.val, f),
        Node::Full(fnode) => {
            for child in fnode.children[..16].iter().flatten() {
                gather_children(child, f);
            }
        }
        Node::Hash(h) => f(*h),
        Node::Value(_) => {}
    }
}

/// The lock-guarded interior of the trie database.
struct DirtyCache {
    /// Dirty nodes keyed by hash, seeded with the sentinel entry.
    dirties: FastHashMap<H256, CachedNode>,
    /// Flush-list head; zero when the list is empty.
    oldest: H256,
    /// Flush-list tail.
    newest: H256,
}

/// A dirty-node cache between trie commits and a persistent store.
pub struct TrieDb<S: KeyValueStore> {
    disk: S,
    inner: RwLock<DirtyCache>,
}

impl TrieDb<MemoryStore> {
    /// Creates a trie database over a fresh in-memory store.
    pub fn new_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: KeyValueStore> TrieDb<S> {
    /// Creates a trie database to hold ephemeral trie content before it is
    /// written out to the given store. All cache misses hit the store.
    pub fn new(disk: S) -> Self {
        let mut dirties = FastHashMap::with_hasher(FxBuildHasher);
        dirties.insert(H256::zero(), CachedNode::sentinel());
        Self {
            disk,
            inner: RwLock::new(DirtyCache {
                dirties,
                oldest: H256::zero(),
                newest: H256::zero(),
            }),
        }
    }

    /// The backing store.
    pub fn disk(&self) -> &S {
        &self.disk
    }

    /// Retrieves the encoded blob of the node with the given hash, from the
    /// dirty cache if present, from the store otherwise.
    pub fn node_blob(&self, hash: H256) -> Result<Vec<u8>, StoreError> {
        // The metaroot is not a real node.
        if hash.is_zero() {
            return Err(StoreError::NotFound);
        }
        {
            let cache = self.inner.read();
            if let Some(entry) = cache.dirties.get(&hash) {
                if let Some(blob) = entry.rlp() {
                    return Ok(blob);
                }
            }
        }
        let enc = self.disk.get(hash.as_bytes())?;
        if enc.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(enc)
    }

    /// Retrieves the decoded node with the given hash, or `None` when it is
    /// neither cached nor stored (or fails to decode).
    pub fn node(&self, hash: H256) -> Option<Node> {
        if hash.is_zero() {
            return None;
        }
        {
            let cache = self.inner.read();
            if let Some(entry) = cache.dirties.get(&hash) {
                if let Some(node) = &entry.node {
                    return Some(node.clone());
                }
            }
        }
        let enc = self.disk.get(hash.as_bytes()).ok()?;
        crate::merkle::decode_node(Some(hash), &enc).ok()
    }

    /// The hashes of all nodes currently in the dirty cache. Expensive;
    /// meant for validating internal state in tests.
    pub fn nodes(&self) -> Vec<H256> {
        let cache = self.inner.read();
        cache
            .dirties
            .keys()
            .filter(|hash| !hash.is_zero())
            .copied()
            .collect()
    }

    /// Inserts the dirty nodes of the provided merged set into the cache and
    /// links account tries with their storage tries.
    ///
    /// Within one tree children are inserted before parents, and storage
    /// tries are flushed before the account trie, so every node can link up
    /// with children already present in the cache.
    pub fn update(&self, nodes: MergedNodeSet) -> Result<(), TrieDbError> {
        let mut cache = self.inner.write();

        let mut sets = nodes.into_sets();
        let account_set = sets.remove(&H256::zero());
        for set in sets.values() {
            for (_, mem, _) in set.updates() {
                cache.insert(mem.hash, mem.node.clone());
            }
        }
        let Some(set) = account_set else {
            return Ok(());
        };
        for (_, mem, _) in set.updates() {
            cache.insert(mem.hash, mem.node.clone());
        }
        // Link up the account trie and storage tries through the leaves.
        for leaf in set.leaves() {
            let account = Account::decode(&leaf.blob)?;
            if account.storage_root != EMPTY_ROOT {
                cache.reference(account.storage_root, leaf.parent);
            }
        }
        debug!(dirty = cache.dirties.len() - 1, "merged node sets into trie database");
        Ok(())
    }

    /// Adds a reference from `parent` to `child`; with a zero parent the
    /// child is pinned as a root.
    pub fn reference(&self, child: H256, parent: H256) {
        let mut cache = self.inner.write();
        cache.reference(child, parent);
    }

    /// Drops the external pin on a root, removing every cache entry whose
    /// reference count falls to zero.
    pub fn dereference(&self, root: H256) {
        // The metaroot itself cannot be dereferenced.
        if root.is_zero() {
            return;
        }
        let mut cache = self.inner.write();
        cache.dereference(root, H256::zero());
        trace!(?root, remaining = cache.dirties.len() - 1, "dereferenced trie root");
    }

    /// Writes the subgraph reachable from `node` out to disk, child first,
    /// removing flushed entries from the dirty cache.
    ///
    /// This is a non-synchronized mutator: concurrent readers are fine, but
    /// callers must not run two commits (or a commit and an update) at once.
    pub fn commit(&self, node: H256) -> Result<(), TrieDbError> {
        let mut batch = self.disk.new_batch();

        self.commit_node(node, &mut batch)?;
        // Trie mostly committed to disk, flush any batch leftovers.
        batch.write()?;
        let mut cache = self.inner.write();
        batch.replay(&mut Cleaner { cache: &mut cache })?;
        batch.reset();
        debug!(root = ?node, remaining = cache.dirties.len() - 1, "committed trie nodes");
        Ok(())
    }

    /// Commits a single node and its dirty children.
    fn commit_node(&self, hash: H256, batch: &mut S::Batch) -> Result<(), TrieDbError> {
        // Gather the entry under the read lock; the traversal itself runs
        // without it so readers are never blocked for a whole commit.
        let (children, blob) = {
            let cache = self.inner.read();
            // Absent entries were committed previously.
            let Some(entry) = cache.dirties.get(&hash) else {
                return Ok(());
            };
            let Some(blob) = entry.rlp() else {
                return Ok(());
            };
            let mut children = Vec::new();
            entry.for_children(&mut |child| children.push(child));
            (children, blob)
        };
        for child in children {
            self.commit_node(child, batch)?;
        }
        batch.put(hash.as_bytes(), &blob)?;
        // If we've reached an optimal batch size, flush and start over.
        if batch.value_size() >= IDEAL_BATCH_SIZE {
            batch.write()?;
            let mut cache = self.inner.write();
            batch.replay(&mut Cleaner { cache: &mut cache })?;
            batch.reset();
        }
        Ok(())
    }
}

impl DirtyCache {
    /// Inserts a collapsed node into the cache and appends it to the
    /// flush-list. Idempotent for hashes already present.
    fn insert(&mut self, hash: H256, node: Node) {
        if self.dirties.contains_key(&hash) {
            return;
        }
        let mut entry = CachedNode::new(node);
        entry.flush_prev = self.newest;

        // Wire up the reference counts of children already in the cache.
        let mut referenced = Vec::new();
        entry.for_children(&mut |child| referenced.push(child));
        for child in referenced {
            if let Some(existing) = self.dirties.get_mut(&child) {
                existing.parents += 1;
            }
        }

        self.dirties.insert(hash, entry);
        // An empty flush-list adopts the node as both endpoints.
        if self.oldest.is_zero() {
            self.oldest = hash;
            self.newest = hash;
        } else {
            if let Some(prev) = self.dirties.get_mut(&self.newest) {
                prev.flush_next = hash;
            }
            self.newest = hash;
        }
    }

    /// Records a parent-to-child reference. Interior nodes are referenced at
    /// most once per parent; only roots (parent zero) may pick up duplicate
    /// references.
    fn reference(&mut self, child: H256, parent: H256) {
        // If the child is not cached, it is a node pulled from disk; skip.
        if !self.dirties.contains_key(&child) {
            return;
        }
        let Some(parent_entry) = self.dirties.get_mut(&parent) else {
            return;
        };
        if parent_entry.children.contains_key(&child) && !parent.is_zero() {
            return;
        }
        *parent_entry.children.entry(child).or_insert(0) += 1;
        if let Some(child_entry) = self.dirties.get_mut(&child) {
            child_entry.parents += 1;
        }
    }

    /// Removes a parent-to-child reference, deleting the child and
    /// cascading when its reference count drops to zero.
    fn dereference(&mut self, child: H256, parent: H256) {
        if let Some(parent_entry) = self.dirties.get_mut(&parent) {
            if let Some(count) = parent_entry.children.get_mut(&child) {
                *count -= 1;
                if *count == 0 {
                    parent_entry.children.remove(&child);
                }
            }
        }
        // If the child does not exist, it is a previously committed node.
        let Some(entry) = self.dirties.get_mut(&child) else {
            return;
        };
        if entry.parents > 0 {
            // A node pulled from disk can be reinjected as a new node (short
            // node split into full, then reverted) with no parents; don't
            // underflow on it.
            entry.parents -= 1;
        }
        if entry.parents == 0 {
            self.splice_out(child);
            let mut children = Vec::new();
            if let Some(entry) = self.dirties.get(&child) {
                entry.for_children(&mut |hash| children.push(hash));
            }
            for hash in children {
                self.dereference(hash, child);
            }
            self.dirties.remove(&child);
        }
    }

    /// Unlinks an entry from the flush-list in O(1).
    ///
    /// List emptiness is defined by `oldest` alone: removing the only
    /// element leaves `newest` dangling, and `insert` resets both endpoints
    /// when it finds `oldest` zeroed.
    fn splice_out(&mut self, hash: H256) {
        let (prev, next) = match self.dirties.get(&hash) {
            Some(entry) => (entry.flush_prev, entry.flush_next),
            None => return,
        };
        if hash == self.oldest {
            self.oldest = next;
            if let Some(entry) = self.dirties.get_mut(&next) {
                entry.flush_prev = H256::zero();
            }
        } else if hash == self.newest {
            self.newest = prev;
            if let Some(entry) = self.dirties.get_mut(&prev) {
                entry.flush_next = H256::zero();
            }
        } else {
            if let Some(entry) = self.dirties.get_mut(&prev) {
                entry.flush_next = next;
            }
            if let Some(entry) = self.dirties.get_mut(&next) {
                entry.flush_prev = prev;
            }
        }
    }
}

/// A batch replay target that uncaches instead of writing.
///
/// This is the post-processing half of the two-phase commit: once a batch
/// has landed on disk it is replayed into the cleaner, which drops each
/// persisted entry from the dirty cache and flush-list. Uncaching only what
/// was actually written keeps the cache consistent under partial flushes.
struct Cleaner<'a> {
    cache: &'a mut DirtyCache,
}

impl KeyValueWriter for Cleaner<'_> {
    fn put(&mut self, key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
        if key.len() != HASH_SIZE {
            return Ok(());
        }
        let hash = H256::from_slice(key);
        // If the node no longer exists, we're done on this path.
        if !self.cache.dirties.contains_key(&hash) {
            return Ok(());
        }
        self.cache.splice_out(hash);
        self.cache.dirties.remove(&hash);
        Ok(())
    }

    fn delete(&mut self, _key: &[u8]) -> Result<(), StoreError> {
        unreachable!("commit replay never issues deletes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::{MemoryNode, NodeSet, Trie};

    fn committed_set(pairs: &[(&[u8], &[u8])], db: &TrieDb<MemoryStore>) -> (H256, NodeSet) {
        let mut trie = Trie::new_empty(db);
        for (key, value) in pairs {
            trie.update(key, value).unwrap();
        }
        trie.commit(false).unwrap()
    }

    #[test]
    fn node_blob_prefers_dirty_cache() {
        let db = TrieDb::new_memory();
        let (root, set) = committed_set(&[(b"dog", b"puppy"), (b"horse", b"stallion")], &db);
        db.update(MergedNodeSet::from_set(set)).unwrap();

        // Nothing on disk yet, the blob must come from the cache.
        assert!(db.disk().is_empty());
        assert!(!db.node_blob(root).unwrap().is_empty());
        assert!(db.node(root).is_some());
    }

    #[test]
    fn zero_hash_is_never_found() {
        let db = TrieDb::new_memory();
        assert_eq!(db.node_blob(H256::zero()), Err(StoreError::NotFound));
        assert!(db.node(H256::zero()).is_none());
    }

    #[test]
    fn commit_moves_nodes_to_disk() {
        let db = TrieDb::new_memory();
        let (root, set) = committed_set(&[(b"dog", b"puppy"), (b"doge", b"coin")], &db);
        db.update(MergedNodeSet::from_set(set)).unwrap();
        assert!(!db.nodes().is_empty());

        db.commit(root).unwrap();
        assert!(db.nodes().is_empty());
        assert_eq!(db.disk().get(root.as_bytes()).unwrap().is_empty(), false);
        // Blobs remain reachable through the database after the flush.
        assert!(!db.node_blob(root).unwrap().is_empty());
    }

    #[test]
    fn commit_is_idempotent() {
        let db = TrieDb::new_memory();
        let (root, set) = committed_set(&[(b"a", b"1"), (b"b", b"2")], &db);
        db.update(MergedNodeSet::from_set(set)).unwrap();

        db.commit(root).unwrap();
        let disk_len = db.disk().len();
        db.commit(root).unwrap();
        assert_eq!(db.disk().len(), disk_len);
        assert!(db.nodes().is_empty());
    }

    #[test]
    fn insert_links_existing_children() {
        let db = TrieDb::new_memory();
        // Two keys forcing a short root above a branch with two hashed
        // leaves; children land in the cache before their parents.
        let (root, set) = committed_set(
            &[(b"dog", &[0x11; 40]), (b"dot", &[0x22; 40])],
            &db,
        );
        db.update(MergedNodeSet::from_set(set)).unwrap();

        let cache = db.inner.read();
        let root_entry = cache.dirties.get(&root).unwrap();
        let mut children = Vec::new();
        root_entry.for_children(&mut |h| children.push(h));
        for child in children {
            assert!(cache.dirties.get(&child).unwrap().parents > 0);
        }
    }

    #[test]
    fn flush_list_orders_children_before_parents() {
        let db = TrieDb::new_memory();
        let (root, set) = committed_set(&[(b"dog", &[0x11; 40]), (b"dot", &[0x22; 40])], &db);
        db.update(MergedNodeSet::from_set(set)).unwrap();

        let cache = db.inner.read();
        // The root is inserted last, so it sits at the flush-list tail.
        assert_eq!(cache.newest, root);
        // Walk oldest to newest and check the chain is consistent.
        let mut cursor = cache.oldest;
        let mut walked = 0;
        while !cursor.is_zero() {
            walked += 1;
            cursor = cache.dirties.get(&cursor).unwrap().flush_next;
        }
        assert_eq!(walked, cache.dirties.len() - 1);
    }

    #[test]
    fn dereference_drops_unpinned_generation() {
        let db = TrieDb::new_memory();
        let (root, set) = committed_set(&[(b"dog", &[0x11; 40]), (b"dot", &[0x22; 40])], &db);
        db.update(MergedNodeSet::from_set(set)).unwrap();

        db.reference(root, H256::zero());
        assert!(!db.nodes().is_empty());

        db.dereference(root);
        assert!(db.nodes().is_empty());
        // The flush-list is empty again.
        let cache = db.inner.read();
        assert!(cache.oldest.is_zero());
    }

    #[test]
    fn update_rejects_bad_account_leaf() {
        let db = TrieDb::new_memory();
        let mut set = NodeSet::new(H256::zero());
        let node = Node::Value(vec![1]);
        set.mark_updated(
            vec![1],
            MemoryNode {
                hash: H256::repeat_byte(1),
                node,
            },
            None,
        );
        set.add_leaf(crate::merkle::Leaf {
            blob: vec![0xff, 0x00],
            parent: H256::repeat_byte(1),
        });
        let err = db.update(MergedNodeSet::from_set(set)).unwrap_err();
        assert!(matches!(err, TrieDbError::Account(_)));
    }
}
