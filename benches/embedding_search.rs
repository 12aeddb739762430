//! Cosine-similarity search throughput over the embedding storage
//! contract (spec §4.3), across a range of corpus sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use krai_benches::TokioExecutor;
use krai_core::storage::{EmbeddingSearchFilter, InMemoryStorageBackend, StorageBackend};
use krai_core::types::{Embedding, OwnerKind};
use uuid::Uuid;

const DIMENSION: usize = 384;

fn fake_vector(seed: u64) -> Vec<f32> {
    (0..DIMENSION)
        .map(|i| (((seed.wrapping_add(i as u64)) % 1000) as f32) / 1000.0)
        .collect()
}

async fn seeded_backend(corpus_size: usize) -> InMemoryStorageBackend {
    let backend = InMemoryStorageBackend::new();
    let embeddings: Vec<Embedding> = (0..corpus_size)
        .map(|i| Embedding {
            id: Uuid::new_v4(),
            owner_kind: OwnerKind::Chunk,
            owner_id: Uuid::new_v4(),
            model_name: "bench-model".to_string(),
            dimension: DIMENSION,
            vector: fake_vector(i as u64),
        })
        .collect();
    backend.upsert_embeddings(embeddings).await.unwrap();
    backend
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("embedding_search");
    for &corpus_size in &[100usize, 1_000, 5_000] {
        let backend = futures::executor::block_on(seeded_backend(corpus_size));
        let query = fake_vector(42);

        group.bench_with_input(
            BenchmarkId::from_parameter(corpus_size),
            &corpus_size,
            |b, _| {
                b.to_async(TokioExecutor).iter(|| async {
                    let results = backend
                        .search_embeddings(black_box(&query), EmbeddingSearchFilter::default(), 10)
                        .await
                        .unwrap();
                    black_box(results);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_search);
criterion_main!(benches);
