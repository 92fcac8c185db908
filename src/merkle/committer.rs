//! Commit collection.
//!
//! The committer walks a hashed, dirty trie and turns it into a `NodeSet`:
//! every dirty node large enough to live under its own hash becomes an
//! update entry, dirty nodes embedded into their parent become deletions when
//! they previously existed on disk, and tracked deletions are folded in at
//! the end.

use std::mem;

use super::node::{FullNode, Node, ShortNode};
use super::node_set::{Leaf, MemoryNode, NodeSet};
use super::tracker::Tracker;
use super::trie::TrieError;
use crate::data::nibbles::hex_to_compact;

pub(crate) struct Committer<'a> {
    nodes: NodeSet,
    tracker: &'a Tracker,
    collect_leaf: bool,
}

impl<'a> Committer<'a> {
    pub fn new(nodes: NodeSet, tracker: &'a Tracker, collect_leaf: bool) -> Self {
        Self {
            nodes,
            tracker,
            collect_leaf,
        }
    }

    /// Collapses the (already hashed) root into a hash node and returns it
    /// along with the collected node set.
    pub fn commit(mut self, root: Node) -> Result<(Node, NodeSet), TrieError> {
        let mut path = Vec::new();
        let hashed = self.commit_node(&mut path, root)?;
        self.finish_deletes();
        Ok((hashed, self.nodes))
    }

    /// Folds the tracker's deletions into the set. Only nodes that existed
    /// on disk count; a node that was embedded in its parent was never a
    /// database entry, so removing it is a no-op for the store.
    fn finish_deletes(&mut self) {
        for path in self.tracker.delete_list() {
            if let Some(prev) = self.tracker.origin(path) {
                if !prev.is_empty() {
                    self.nodes.mark_deleted(path, prev.to_vec());
                }
            }
        }
    }

    /// Collapses a node down into a hash or embedded reference.
    fn commit_node(&mut self, path: &mut Vec<u8>, n: Node) -> Result<Node, TrieError> {
        // Clean subtrees keep their cached reference.
        if let (Some(hash), false) = n.cache() {
            return Ok(Node::Hash(hash));
        }
        match n {
            Node::Short(mut sn) => {
                // Only a full-node child needs recursion; anything else is
                // already a hash reference or an inline value.
                if matches!(sn.val, Node::Full(_)) {
                    path.extend_from_slice(&sn.key);
                    let child = mem::replace(&mut sn.val, Node::Value(Vec::new()));
                    sn.val = self.commit_node(path, child)?;
                    path.truncate(path.len() - sn.key.len());
                }
                let collapsed = ShortNode {
                    key: hex_to_compact(&sn.key),
                    val: sn.val,
                    flags: sn.flags,
                };
                Ok(self.store(path, Node::Short(Box::new(collapsed))))
            }
            Node::Full(mut fnode) => {
                self.commit_children(path, &mut fnode)?;
                Ok(self.store(path, Node::Full(fnode)))
            }
            Node::Hash(h) => Ok(Node::Hash(h)),
            // Nil and value nodes are never committed directly.
            Node::Value(_) => unreachable!("value node cannot be committed"),
        }
    }

    /// Collapses the children of a full node in place.
    fn commit_children(&mut self, path: &mut Vec<u8>, n: &mut FullNode) -> Result<(), TrieError> {
        for i in 0..16 {
            let Some(child) = n.children[i].take() else {
                continue;
            };
            // Hashed children keep their reference; note a child in range
            // [0, 15] can never be a value node.
            if let Node::Hash(h) = child {
                n.children[i] = Some(Node::Hash(h));
                continue;
            }
            path.push(i as u8);
            let committed = self.commit_node(path, child)?;
            path.pop();
            n.children[i] = Some(committed);
        }
        // Slot 16 holds the value, if any, and stays as-is.
        Ok(())
    }

    /// Records a collapsed node in the set and returns the reference its
    /// parent should store.
    fn store(&mut self, path: &[u8], collapsed: Node) -> Node {
        let (hash, _) = collapsed.cache();

        let Some(hash) = hash else {
            // The node is embedded in its parent. If it was a database entry
            // before, the embedding swallows it; that is a deletion from the
            // store's perspective.
            if let Some(prev) = self.tracker.origin(path) {
                if !prev.is_empty() {
                    self.nodes.mark_deleted(path, prev.to_vec());
                }
            }
            return collapsed;
        };

        // Collect the leaf if requested; values only ever live in short
        // nodes whose key is terminated.
        if self.collect_leaf {
            if let Node::Short(sn) = &collapsed {
                if let Node::Value(val) = &sn.val {
                    self.nodes.add_leaf(Leaf {
                        blob: val.clone(),
                        parent: hash,
                    });
                }
            }
        }

        let prev = self
            .tracker
            .origin(path)
            .filter(|blob| !blob.is_empty())
            .map(<[u8]>::to_vec);
        self.nodes.mark_updated(
            path.to_vec(),
            MemoryNode {
                hash,
                node: collapsed,
            },
            prev,
        );
        Node::Hash(hash)
    }
}
