//! Processing queue contract tests (spec §4.4/§8 invariant 3), chunk
//! linkage (spec §8 scenario S6), and the transient-failure-with-recovery
//! retry path (spec §8 scenario S5), exercised directly against
//! [`krai_core::storage::InMemoryStorageBackend`].

use krai_core::error::Error;
use krai_core::queue::ProcessingQueue;
use krai_core::storage::{InMemoryStorageBackend, StorageBackend};
use krai_core::types::{QueueConfig, Stage};
use std::sync::Arc;
use uuid::Uuid;

fn queue_over(storage: Arc<dyn StorageBackend>) -> ProcessingQueue {
    ProcessingQueue::new(storage, QueueConfig::default())
}

#[tokio::test]
async fn enqueue_is_idempotent_per_document_and_stage() {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
    let queue = queue_over(Arc::clone(&storage));
    let document_id = Uuid::new_v4();

    let first = queue.enqueue(document_id, Stage::TextExtraction, 0).await.unwrap();
    let second = queue.enqueue(document_id, Stage::TextExtraction, 0).await.unwrap();

    assert_eq!(first, second, "a pending item for the same (document, stage) must not duplicate");
}

#[tokio::test]
async fn leased_items_are_not_handed_to_a_second_worker_until_complete() {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
    let queue = queue_over(Arc::clone(&storage));
    let document_id = Uuid::new_v4();
    queue.enqueue(document_id, Stage::Classification, 0).await.unwrap();

    let leased = queue
        .lease("worker-a", &[Stage::Classification])
        .await
        .unwrap()
        .expect("one item should be available");
    assert_eq!(leased.item.document_id, document_id);

    let nothing_left = queue.lease("worker-b", &[Stage::Classification]).await.unwrap();
    assert!(nothing_left.is_none(), "a leased item must not be leasable again");

    queue.complete(leased.item.id).await.unwrap();
}

#[tokio::test]
async fn a_transiently_failed_item_is_retried_and_recovers() {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
    let mut config = QueueConfig::default();
    config.retry_policy.backoff_base_ms = 0;
    config.retry_policy.jitter_ms = 0;
    let queue = ProcessingQueue::new(Arc::clone(&storage), config);
    let document_id = Uuid::new_v4();
    queue.enqueue(document_id, Stage::Enrichment, 0).await.unwrap();

    let first_attempt = queue
        .lease("worker-1", &[Stage::Enrichment])
        .await
        .unwrap()
        .expect("the enqueued item should be leasable");
    let timeout = Error::ExternalServiceTimeout { service: "video-metadata".to_string() };
    queue.fail(&first_attempt.item, &timeout, None).await.unwrap();

    let retry_attempt = queue
        .lease("worker-2", &[Stage::Enrichment])
        .await
        .unwrap()
        .expect("a transiently-failed item must become leasable again once its backoff elapses");
    assert_eq!(retry_attempt.item.id, first_attempt.item.id);
    assert_eq!(retry_attempt.item.attempts, 2);

    queue.complete(retry_attempt.item.id).await.unwrap();
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn ingest_is_rejected_once_the_queue_is_saturated() {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
    let config = QueueConfig { max_queue_size: 2, ..QueueConfig::default() };
    let queue = ProcessingQueue::new(Arc::clone(&storage), config);

    queue.enqueue(Uuid::new_v4(), Stage::TextExtraction, 0).await.unwrap();
    queue.enqueue(Uuid::new_v4(), Stage::TextExtraction, 0).await.unwrap();

    let err = queue.enqueue(Uuid::new_v4(), Stage::TextExtraction, 0).await.unwrap_err();
    assert!(matches!(err, krai_core::error::Error::QueueSaturated { .. }));
}

#[tokio::test]
async fn chunk_prep_backfills_error_code_chunk_ids_by_page() {
    let storage = InMemoryStorageBackend::new();
    let document = test_utils::sample_document("manual.pdf", krai_core::types::DocumentType::ServiceManual);
    let document_id = storage.create_document(document).await.unwrap();
    let manufacturer = test_utils::sample_manufacturer("Konica Minolta");

    let mut error_code_100 = test_utils::sample_error_code(document_id, manufacturer.id, "C1000", 0.9);
    error_code_100.page_number = 100;
    let mut error_code_120 = test_utils::sample_error_code(document_id, manufacturer.id, "C1200", 0.9);
    error_code_120.page_number = 120;
    let error_code_100_id = error_code_100.id;
    let error_code_120_id = error_code_120.id;
    storage
        .batch_insert_error_codes(vec![error_code_100, error_code_120])
        .await
        .unwrap();

    let chunk_for_page_100 = krai_core::types::Chunk {
        id: Uuid::new_v4(),
        document_id,
        ordinal: 0,
        page_number: 100,
        section_hierarchy: vec![],
        section_level: 0,
        text: "chunk covering page 100".to_string(),
        previous_chunk_id: None,
        next_chunk_id: None,
    };
    let chunk_for_page_120 = krai_core::types::Chunk {
        id: Uuid::new_v4(),
        document_id,
        ordinal: 1,
        page_number: 120,
        section_hierarchy: vec![],
        section_level: 0,
        text: "chunk covering page 120".to_string(),
        previous_chunk_id: None,
        next_chunk_id: None,
    };
    let chunk_100_id = chunk_for_page_100.id;
    let chunk_120_id = chunk_for_page_120.id;
    storage
        .upsert_chunks(document_id, vec![chunk_for_page_100, chunk_for_page_120])
        .await
        .unwrap();

    // The stage runner's chunk_prep post-pass: for each error code, find
    // the chunk whose page matches and link it.
    for code in storage.list_error_codes(document_id).await.unwrap() {
        let chunks = storage.list_chunks(document_id).await.unwrap();
        if let Some(chunk) = chunks.iter().find(|c| c.page_number == code.page_number) {
            storage.set_error_code_chunk(code.id, chunk.id).await.unwrap();
        }
    }

    let codes = storage.list_error_codes(document_id).await.unwrap();
    let code_100 = codes.iter().find(|c| c.id == error_code_100_id).unwrap();
    let code_120 = codes.iter().find(|c| c.id == error_code_120_id).unwrap();
    assert_eq!(code_100.chunk_id, Some(chunk_100_id));
    assert_eq!(code_120.chunk_id, Some(chunk_120_id));
}
