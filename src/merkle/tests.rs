//! Property-based tests for the trie engine.

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use crate::data::nibbles::{compact_to_hex, hex_to_compact, key_to_hex};
    use crate::merkle::decode::decode_node;
    use crate::merkle::node::EMPTY_ROOT;
    use crate::merkle::{Node, Trie};
    use crate::store::{MemoryStore, TrieDb};

    proptest! {
        #[test]
        fn trie_deterministic_root(
            entries in proptest::collection::vec(
                (proptest::collection::vec(any::<u8>(), 1..32),
                 proptest::collection::vec(any::<u8>(), 1..64)),
                1..20
            )
        ) {
            let db1 = TrieDb::new(MemoryStore::new());
            let db2 = TrieDb::new(MemoryStore::new());
            let mut trie1 = Trie::new_empty(&db1);
            let mut trie2 = Trie::new_empty(&db2);

            // Insert in original order.
            for (key, value) in &entries {
                trie1.update(key, value).unwrap();
            }

            // Insert in reverse order.
            for (key, value) in entries.iter().rev() {
                trie2.update(key, value).unwrap();
            }

            // Root hashes should be the same.
            prop_assert_eq!(trie1.hash(), trie2.hash());
        }

        #[test]
        fn trie_insert_get(
            key in proptest::collection::vec(any::<u8>(), 1..32),
            value in proptest::collection::vec(any::<u8>(), 1..64)
        ) {
            let db = TrieDb::new(MemoryStore::new());
            let mut trie = Trie::new_empty(&db);
            trie.update(&key, &value).unwrap();

            prop_assert_eq!(trie.get(&key).unwrap(), Some(value));
        }

        #[test]
        fn trie_delete_returns_empty_root(
            key in proptest::collection::vec(any::<u8>(), 1..32),
            value in proptest::collection::vec(any::<u8>(), 1..64)
        ) {
            let db = TrieDb::new(MemoryStore::new());
            let mut trie = Trie::new_empty(&db);
            trie.update(&key, &value).unwrap();
            trie.delete(&key).unwrap();

            prop_assert_eq!(trie.hash(), EMPTY_ROOT);
            prop_assert_eq!(trie.get(&key).unwrap(), None);
        }

        #[test]
        fn trie_distinct_keys_roundtrip(
            entries in proptest::collection::btree_map(
                proptest::collection::vec(any::<u8>(), 1..16),
                proptest::collection::vec(any::<u8>(), 1..32),
                1..24
            )
        ) {
            let db = TrieDb::new(MemoryStore::new());
            let mut trie = Trie::new_empty(&db);
            for (key, value) in &entries {
                trie.update(key, value).unwrap();
            }
            for (key, value) in &entries {
                let got = trie.get(key).unwrap();
                prop_assert_eq!(got.as_deref(), Some(value.as_slice()));
            }
        }

        #[test]
        fn nibble_codec_roundtrip(key in proptest::collection::vec(any::<u8>(), 0..40)) {
            let hex = key_to_hex(&key);
            prop_assert_eq!(compact_to_hex(&hex_to_compact(&hex)), hex.clone());
            // compact(hex(compact(x))) == compact(x)
            let compact = hex_to_compact(&hex);
            prop_assert_eq!(hex_to_compact(&compact_to_hex(&compact)), compact);
        }

        #[test]
        fn node_encoding_roundtrip(
            key in proptest::collection::vec(any::<u8>(), 1..16),
            value in proptest::collection::vec(any::<u8>(), 1..48)
        ) {
            // A collapsed leaf decodes back to its hex-keyed form.
            let hex = key_to_hex(&key);
            let collapsed = Node::short(hex_to_compact(&hex), Node::Value(value.clone()));
            let decoded = decode_node(None, &collapsed.encode()).unwrap();
            prop_assert_eq!(decoded, Node::short(hex, Node::Value(value)));
        }
    }
}
