//! Performance benchmarks for mpt_db
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mpt_db::merkle::{keccak256, MergedNodeSet, Trie};
use mpt_db::store::TrieDb;

/// Deterministic well-distributed keys.
fn make_pairs(count: u32) -> Vec<([u8; 32], Vec<u8>)> {
    (0..count)
        .map(|i| {
            let key = keccak256(&i.to_be_bytes());
            (key, vec![(i % 251) as u8; 40])
        })
        .collect()
}

/// Benchmark trie insertion and hashing.
fn bench_trie(c: &mut Criterion) {
    let mut group = c.benchmark_group("Trie");

    for size in [100u32, 1000, 5000].iter() {
        let pairs = make_pairs(*size);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("update", size), size, |b, _| {
            b.iter(|| {
                let db = TrieDb::new_memory();
                let mut trie = Trie::new_empty(&db);
                for (key, value) in &pairs {
                    trie.update(black_box(key), black_box(value)).unwrap();
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("update_hash", size), size, |b, _| {
            b.iter(|| {
                let db = TrieDb::new_memory();
                let mut trie = Trie::new_empty(&db);
                for (key, value) in &pairs {
                    trie.update(key, value).unwrap();
                }
                black_box(trie.hash())
            })
        });
    }

    group.finish();
}

/// Benchmark the full write path: commit, merge, flush to the store.
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("TrieDb");

    for size in [1000u32, 5000].iter() {
        let pairs = make_pairs(*size);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("commit_flush", size), size, |b, _| {
            b.iter(|| {
                let db = TrieDb::new_memory();
                let mut trie = Trie::new_empty(&db);
                for (key, value) in &pairs {
                    trie.update(key, value).unwrap();
                }
                let (root, nodes) = trie.commit(false).unwrap();
                db.update(MergedNodeSet::from_set(nodes)).unwrap();
                db.commit(root).unwrap();
                black_box(root)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_trie, bench_commit);
criterion_main!(benches);
