use criterion::{Criterion, criterion_group, criterion_main};
use docs_rag::store::{SimilarityMeasure, VectorStore};
use std::hint::black_box;

const DIMENSION: usize = 384;

/// Deterministic pseudo-random vector so runs are comparable
fn vector(seed: usize) -> Vec<f32> {
    let mut state = seed as u64 ^ 0x9E37_79B9_7F4A_7C15;
    (0..DIMENSION)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 2_000) as f32 / 1_000.0 - 1.0
        })
        .collect()
}

fn populated(records: usize) -> VectorStore {
    let mut store = VectorStore::new();
    for i in 0..records {
        store
            .insert(format!("chunk {}", i), vector(i))
            .expect("uniform dimension");
    }
    store
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let query = vector(usize::MAX / 3);

    for records in [1_000, 10_000] {
        let store = populated(records);
        c.bench_function(&format!("cosine_top3_{}", records), |b| {
            b.iter(|| {
                store
                    .search(black_box(&query), 3, SimilarityMeasure::Cosine)
                    .expect("matching dimension")
            })
        });
    }

    let store = populated(10_000);
    c.bench_function("euclidean_top10_10000", |b| {
        b.iter(|| {
            store
                .search(black_box(&query), 10, SimilarityMeasure::Euclidean)
                .expect("matching dimension")
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
