//! Change tracking.
//!
//! The tracker records structural mutations at node-path granularity,
//! separately from value writes, so the committer can tell paths that are new
//! in memory apart from paths that existed on disk and are now gone. It is a
//! plain value owned by its trie.

use hashbrown::{HashMap, HashSet};
use rustc_hash::FxBuildHasher;

type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;
type FastHashSet<T> = HashSet<T, FxBuildHasher>;

/// Per-mutation record of inserted and deleted structural node paths, plus
/// the original blobs of nodes loaded from the store.
#[derive(Clone, Debug, Default)]
pub(crate) struct Tracker {
    inserts: FastHashSet<Vec<u8>>,
    deletes: FastHashSet<Vec<u8>>,
    origins: FastHashMap<Vec<u8>, Vec<u8>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a newly inserted structural node. A path already in the
    /// deletion set is a resurrected node and counts as untouched.
    pub fn on_insert(&mut self, path: &[u8]) {
        if self.deletes.remove(path) {
            return;
        }
        self.inserts.insert(path.to_vec());
    }

    /// Tracks a deleted structural node. A path already in the insertion set
    /// never existed outside memory and counts as untouched.
    pub fn on_delete(&mut self, path: &[u8]) {
        if self.inserts.remove(path) {
            return;
        }
        self.deletes.insert(path.to_vec());
    }

    /// Caches the original blob of a node loaded from the store.
    pub fn on_read(&mut self, path: &[u8], blob: Vec<u8>) {
        self.origins.insert(path.to_vec(), blob);
    }

    /// The original on-disk blob recorded for a path, if any.
    pub fn origin(&self, path: &[u8]) -> Option<&[u8]> {
        self.origins.get(path).map(Vec::as_slice)
    }

    /// The tracked deleted paths.
    pub fn delete_list(&self) -> impl Iterator<Item = &[u8]> {
        self.deletes.iter().map(Vec::as_slice)
    }

    /// Clears all tracked state.
    pub fn reset(&mut self) {
        self.inserts.clear();
        self.deletes.clear();
        self.origins.clear();
    }
}
