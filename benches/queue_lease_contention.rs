//! Throughput of `ProcessingQueue::lease` under contention from several
//! concurrent workers pulling from the same stage (spec §5 worker pool).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use krai_benches::TokioExecutor;
use krai_core::queue::ProcessingQueue;
use krai_core::storage::{InMemoryStorageBackend, StorageBackend};
use krai_core::types::{QueueConfig, Stage};
use std::sync::Arc;

async fn seed_queue(worker_count: usize) -> ProcessingQueue {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
    let queue = ProcessingQueue::new(Arc::clone(&storage), QueueConfig::default());
    for _ in 0..(worker_count * 4) {
        queue
            .enqueue(uuid::Uuid::new_v4(), Stage::TextExtraction, 0)
            .await
            .unwrap();
    }
    queue
}

fn benchmark_lease(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_lease_contention");
    for &worker_count in &[1usize, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(worker_count),
            &worker_count,
            |b, &worker_count| {
                b.to_async(TokioExecutor).iter(|| async {
                    let queue = Arc::new(seed_queue(worker_count).await);
                    let handles: Vec<_> = (0..worker_count)
                        .map(|i| {
                            let queue = Arc::clone(&queue);
                            tokio::spawn(async move {
                                let worker_id = format!("bench-worker-{i}");
                                let mut leased = 0;
                                while let Some(item) = queue
                                    .lease(&worker_id, &[Stage::TextExtraction])
                                    .await
                                    .unwrap()
                                {
                                    queue.complete(item.item.id).await.unwrap();
                                    leased += 1;
                                }
                                leased
                            })
                        })
                        .collect();
                    let total: usize = futures::future::join_all(handles)
                        .await
                        .into_iter()
                        .map(Result::unwrap)
                        .sum();
                    black_box(total);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_lease);
criterion_main!(benches);
