//! In-memory [`StorageBackend`] and [`BlobStore`] for tests and offline
//! development, mirroring [`crate::embeddings::DeterministicEmbeddingProvider`]'s
//! role: a deterministic stand-in so `krai-core`'s own test suite (and
//! downstream adapter crates' contract tests) never needs a real database.

use super::backend::{DocumentPatch, EmbeddingMatch, EmbeddingSearchFilter, StorageBackend};
use super::blob::{BlobKey, BlobStore};
use crate::embeddings::cosine_similarity;
use crate::error::{Error, Result};
use crate::types::{
    Chunk, Document, Embedding, ErrorCode, Image, Link, Manufacturer, OwnerKind, PipelineError,
    PipelineErrorStatus, Product, ProductSeries, QueueItem, QueueItemStatus, Stage, StageStatus,
    Video,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct State {
    documents: HashMap<Uuid, Document>,
    documents_by_hash: HashMap<String, Uuid>,
    manufacturers: HashMap<Uuid, Manufacturer>,
    manufacturers_by_name: HashMap<String, Uuid>,
    product_series: HashMap<(Uuid, String), ProductSeries>,
    products: HashMap<(Uuid, String), Product>,
    chunks: HashMap<Uuid, Vec<Chunk>>,
    embeddings: Vec<Embedding>,
    error_codes: HashMap<Uuid, Vec<ErrorCode>>,
    images: HashMap<Uuid, Vec<Image>>,
    videos: HashMap<Uuid, Vec<Video>>,
    links: HashMap<Uuid, Vec<Link>>,
    queue: Vec<QueueItem>,
    stage_statuses: HashMap<(Uuid, Stage), StageStatus>,
    pipeline_errors: Vec<PipelineError>,
}

/// A single-process, mutex-guarded [`StorageBackend`]. Not meant for
/// production scale; it exists so engine-level logic (the queue, stage
/// runner, orchestrator) can be exercised without a real adapter crate.
#[derive(Default)]
pub struct InMemoryStorageBackend {
    state: Mutex<State>,
}

impl InMemoryStorageBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorageBackend {
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.state.lock().documents.get(&id).cloned())
    }

    async fn create_document(&self, document: Document) -> Result<Uuid> {
        let mut state = self.state.lock();
        if let Some(existing) = state.documents_by_hash.get(&document.file_hash).copied() {
            return Err(Error::DuplicateDocument {
                file_hash: document.file_hash,
                existing_id: existing,
            });
        }
        let id = document.id;
        state.documents_by_hash.insert(document.file_hash.clone(), id);
        state.documents.insert(id, document);
        Ok(id)
    }

    async fn find_document_by_hash(&self, file_hash: &str) -> Result<Option<Document>> {
        let state = self.state.lock();
        Ok(state
            .documents_by_hash
            .get(file_hash)
            .and_then(|id| state.documents.get(id))
            .cloned())
    }

    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> Result<()> {
        let mut state = self.state.lock();
        let document = state
            .documents
            .get_mut(&id)
            .ok_or(Error::DocumentMissing { document_id: id })?;
        if let Some(status) = patch.processing_status {
            document.processing_status = status;
        }
        if let Some(stage) = patch.current_stage {
            document.current_stage = stage;
        }
        if let Some(manufacturer_id) = patch.manufacturer_id {
            document.manufacturer_id = Some(manufacturer_id);
        }
        if let Some(language) = patch.language {
            document.language = Some(language);
        }
        if let Some(page_count) = patch.page_count {
            document.page_count = Some(page_count);
        }
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn ensure_manufacturer(&self, name: &str, pattern_key: &str) -> Result<Manufacturer> {
        let mut state = self.state.lock();
        let normalized = Manufacturer::normalize(name);
        if let Some(id) = state.manufacturers_by_name.get(&normalized).copied() {
            return Ok(state.manufacturers[&id].clone());
        }
        let manufacturer = Manufacturer::new(name.to_string(), pattern_key.to_string());
        state
            .manufacturers_by_name
            .insert(normalized, manufacturer.id);
        state
            .manufacturers
            .insert(manufacturer.id, manufacturer.clone());
        Ok(manufacturer)
    }

    async fn get_manufacturer(&self, id: Uuid) -> Result<Option<Manufacturer>> {
        Ok(self.state.lock().manufacturers.get(&id).cloned())
    }

    async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>> {
        Ok(self.state.lock().manufacturers.values().cloned().collect())
    }

    async fn ensure_product_series(&self, manufacturer_id: Uuid, name: &str) -> Result<ProductSeries> {
        let mut state = self.state.lock();
        let key = (manufacturer_id, name.to_string());
        if let Some(series) = state.product_series.get(&key) {
            return Ok(series.clone());
        }
        let series = ProductSeries {
            id: Uuid::new_v4(),
            manufacturer_id,
            name: name.to_string(),
        };
        state.product_series.insert(key, series.clone());
        Ok(series)
    }

    async fn upsert_product(&self, product: Product) -> Result<Uuid> {
        let mut state = self.state.lock();
        let key = (product.manufacturer_id, product.model_number.clone());
        let id = state.products.get(&key).map_or(product.id, |existing| existing.id);
        let mut product = product;
        product.id = id;
        state.products.insert(key, product);
        Ok(id)
    }

    async fn list_products(&self, manufacturer_id: Uuid) -> Result<Vec<Product>> {
        Ok(self
            .state
            .lock()
            .products
            .values()
            .filter(|p| p.manufacturer_id == manufacturer_id)
            .cloned()
            .collect())
    }

    async fn upsert_chunks(&self, document_id: Uuid, chunks: Vec<Chunk>) -> Result<()> {
        self.state.lock().chunks.insert(document_id, chunks);
        Ok(())
    }

    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        Ok(self
            .state
            .lock()
            .chunks
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>> {
        Ok(self
            .state
            .lock()
            .chunks
            .values()
            .flatten()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn upsert_embeddings(&self, embeddings: Vec<Embedding>) -> Result<()> {
        let mut state = self.state.lock();
        for embedding in embeddings {
            if !embedding.has_consistent_dimension() {
                return Err(Error::EmbeddingDimensionMismatch {
                    configured: embedding.dimension,
                    actual: embedding.vector.len(),
                });
            }
            state.embeddings.retain(|e| {
                !(e.owner_kind == embedding.owner_kind
                    && e.owner_id == embedding.owner_id
                    && e.model_name == embedding.model_name)
            });
            state.embeddings.push(embedding);
        }
        Ok(())
    }

    async fn embedded_owner_ids(&self, owner_kind: OwnerKind, model_name: &str) -> Result<Vec<Uuid>> {
        Ok(self
            .state
            .lock()
            .embeddings
            .iter()
            .filter(|e| e.owner_kind == owner_kind && e.model_name == model_name)
            .map(|e| e.owner_id)
            .collect())
    }

    async fn search_embeddings(
        &self,
        query_vector: &[f32],
        filter: EmbeddingSearchFilter,
        k: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        let state = self.state.lock();
        let mut matches: Vec<EmbeddingMatch> = state
            .embeddings
            .iter()
            .filter(|e| {
                filter
                    .model_name
                    .as_ref()
                    .is_none_or(|m| *m == e.model_name)
                    && filter.owner_kind.is_none_or(|k| k == e.owner_kind)
                    && e.vector.len() == query_vector.len()
            })
            .map(|e| EmbeddingMatch {
                owner_kind: e.owner_kind,
                owner_id: e.owner_id,
                similarity: cosine_similarity(query_vector, &e.vector),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.owner_id.cmp(&b.owner_id))
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn batch_insert_error_codes(&self, records: Vec<ErrorCode>) -> Result<()> {
        for record in &records {
            if record.manufacturer_id.is_nil() {
                return Err(Error::ManufacturerMissing {
                    document_id: record.document_id,
                    stage: Stage::ErrorCodeExtraction,
                });
            }
        }
        let mut state = self.state.lock();
        for record in records {
            state.error_codes.entry(record.document_id).or_default().push(record);
        }
        Ok(())
    }

    async fn list_error_codes(&self, document_id: Uuid) -> Result<Vec<ErrorCode>> {
        Ok(self
            .state
            .lock()
            .error_codes
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_error_code_chunk(&self, error_code_id: Uuid, chunk_id: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        for codes in state.error_codes.values_mut() {
            if let Some(code) = codes.iter_mut().find(|c| c.id == error_code_id) {
                code.chunk_id = Some(chunk_id);
                return Ok(());
            }
        }
        Ok(())
    }

    async fn upsert_images(&self, images: Vec<Image>) -> Result<()> {
        let mut state = self.state.lock();
        for image in images {
            state.images.entry(image.document_id).or_default().push(image);
        }
        Ok(())
    }

    async fn list_images(&self, document_id: Uuid) -> Result<Vec<Image>> {
        Ok(self.state.lock().images.get(&document_id).cloned().unwrap_or_default())
    }

    async fn upsert_videos(&self, videos: Vec<Video>) -> Result<()> {
        let mut state = self.state.lock();
        for video in videos {
            state.videos.entry(video.document_id).or_default().push(video);
        }
        Ok(())
    }

    async fn upsert_links(&self, links: Vec<Link>) -> Result<()> {
        let mut state = self.state.lock();
        for link in links {
            state.links.entry(link.document_id).or_default().push(link);
        }
        Ok(())
    }

    async fn enqueue(&self, item: QueueItem) -> Result<Uuid> {
        let mut state = self.state.lock();
        let already_active = state.queue.iter().any(|existing| {
            existing.document_id == item.document_id
                && existing.stage == item.stage
                && matches!(existing.status, QueueItemStatus::Pending | QueueItemStatus::Leased)
        });
        if already_active {
            let existing = state
                .queue
                .iter()
                .find(|e| e.document_id == item.document_id && e.stage == item.stage)
                .expect("checked above");
            return Ok(existing.id);
        }
        let id = item.id;
        state.queue.push(item);
        Ok(id)
    }

    async fn find_active_queue_item(&self, document_id: Uuid, stage: Stage) -> Result<Option<QueueItem>> {
        Ok(self
            .state
            .lock()
            .queue
            .iter()
            .find(|q| {
                q.document_id == document_id
                    && q.stage == stage
                    && matches!(q.status, QueueItemStatus::Pending | QueueItemStatus::Leased)
            })
            .cloned())
    }

    async fn lease_next(
        &self,
        worker_id: &str,
        stages_filter: &[Stage],
        ttl: chrono::Duration,
    ) -> Result<Option<QueueItem>> {
        let mut state = self.state.lock();
        let now = Utc::now();
        let candidate_id = state
            .queue
            .iter()
            .filter(|q| {
                let leasable = q.status == QueueItemStatus::Pending
                    || (q.status == QueueItemStatus::Retrying
                        && q.lease_deadline.is_some_and(|not_before| not_before <= now));
                leasable && (stages_filter.is_empty() || stages_filter.contains(&q.stage))
            })
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.enqueued_at.cmp(&a.enqueued_at))
            })
            .map(|q| q.id);

        let Some(id) = candidate_id else {
            return Ok(None);
        };
        let item = state.queue.iter_mut().find(|q| q.id == id).expect("found above");
        item.status = QueueItemStatus::Leased;
        item.lease_deadline = Some(now + ttl);
        item.leased_by = Some(worker_id.to_string());
        item.started_at.get_or_insert(now);
        item.attempts += 1;
        Ok(Some(item.clone()))
    }

    async fn complete_queue_item(&self, item_id: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        let item = state
            .queue
            .iter_mut()
            .find(|q| q.id == item_id)
            .ok_or(Error::QueueItemMissing { item_id })?;
        item.status = QueueItemStatus::Completed;
        item.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_queue_item(
        &self,
        item_id: Uuid,
        error: &str,
        status: QueueItemStatus,
        retry_not_before: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let item = state
            .queue
            .iter_mut()
            .find(|q| q.id == item_id)
            .ok_or(Error::QueueItemMissing { item_id })?;
        item.status = status;
        item.last_error = Some(error.to_string());
        if status == QueueItemStatus::Retrying {
            item.lease_deadline = retry_not_before;
            item.leased_by = None;
        }
        if status == QueueItemStatus::Failed {
            item.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn extend_lease(&self, item_id: Uuid, ttl: chrono::Duration) -> Result<()> {
        let mut state = self.state.lock();
        let item = state
            .queue
            .iter_mut()
            .find(|q| q.id == item_id)
            .ok_or(Error::QueueItemMissing { item_id })?;
        item.lease_deadline = Some(Utc::now() + ttl);
        Ok(())
    }

    async fn reclaim_expired_leases(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.lock();
        let mut reclaimed = 0;
        for item in &mut state.queue {
            if item.status == QueueItemStatus::Leased
                && item.lease_deadline.is_some_and(|deadline| deadline < now)
            {
                item.status = QueueItemStatus::Pending;
                item.lease_deadline = None;
                item.leased_by = None;
                item.attempts += 1;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn count_pending_queue_items(&self) -> Result<usize> {
        Ok(self
            .state
            .lock()
            .queue
            .iter()
            .filter(|q| q.status == QueueItemStatus::Pending)
            .count())
    }

    async fn get_stage_status(&self, document_id: Uuid, stage: Stage) -> Result<Option<StageStatus>> {
        Ok(self.state.lock().stage_statuses.get(&(document_id, stage)).cloned())
    }

    async fn upsert_stage_status(&self, status: StageStatus) -> Result<()> {
        self.state
            .lock()
            .stage_statuses
            .insert((status.document_id, status.stage), status);
        Ok(())
    }

    async fn list_stage_statuses(&self, document_id: Uuid) -> Result<Vec<StageStatus>> {
        let state = self.state.lock();
        let mut statuses: Vec<StageStatus> = state
            .stage_statuses
            .values()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect();
        statuses.sort_by_key(|s| Stage::ALL.iter().position(|st| *st == s.stage).unwrap_or(usize::MAX));
        Ok(statuses)
    }

    async fn reset_stage_statuses(&self, document_id: Uuid, from_stage: Option<Stage>) -> Result<()> {
        let mut state = self.state.lock();
        let from_index = from_stage
            .and_then(|s| Stage::ALL.iter().position(|st| *st == s))
            .unwrap_or(0);
        for (index, stage) in Stage::ALL.iter().enumerate() {
            if index >= from_index {
                state
                    .stage_statuses
                    .insert((document_id, *stage), StageStatus::not_started(document_id, *stage));
            }
        }
        Ok(())
    }

    async fn record_pipeline_error(&self, error: PipelineError) -> Result<Uuid> {
        let mut state = self.state.lock();
        let id = error.id;
        state.pipeline_errors.push(error);
        Ok(id)
    }

    async fn list_pipeline_errors(
        &self,
        stage: Option<Stage>,
        status: Option<PipelineErrorStatus>,
    ) -> Result<Vec<PipelineError>> {
        Ok(self
            .state
            .lock()
            .pipeline_errors
            .iter()
            .filter(|e| stage.is_none_or(|s| e.stage == s))
            .filter(|e| status.is_none_or(|s| e.status == s))
            .cloned()
            .collect())
    }

    async fn execute(&self, _query: &str, _params: &[String]) -> Result<u64> {
        Ok(0)
    }
}

/// A single-process, mutex-guarded [`BlobStore`] backed by an in-memory
/// map; content-addressing is the caller's responsibility (this store
/// just keys on whatever `(bucket, key)` it's given).
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &BlobKey, data: Vec<u8>) -> Result<()> {
        self.objects
            .lock()
            .insert((key.bucket.clone(), key.key.clone()), data);
        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .get(&(key.bucket.clone(), key.key.clone()))
            .cloned()
            .ok_or_else(|| Error::CorruptBlob {
                bucket: key.bucket.clone(),
                key: key.key.clone(),
                reason: "not found".to_string(),
            })
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .contains_key(&(key.bucket.clone(), key.key.clone())))
    }

    async fn delete(&self, key: &BlobKey) -> Result<()> {
        self.objects.lock().remove(&(key.bucket.clone(), key.key.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentType, ProcessingStatus};

    fn sample_document() -> Document {
        Document::new("manual.pdf".to_string(), "hash-1".to_string(), 1024, DocumentType::ServiceManual)
    }

    #[tokio::test]
    async fn duplicate_file_hash_is_rejected() {
        let storage = InMemoryStorageBackend::new();
        let doc = sample_document();
        let id = storage.create_document(doc.clone()).await.unwrap();
        let mut dup = sample_document();
        dup.id = Uuid::new_v4();
        let err = storage.create_document(dup).await.unwrap_err();
        match err {
            Error::DuplicateDocument { existing_id, .. } => assert_eq!(existing_id, id),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ensure_manufacturer_is_case_insensitive() {
        let storage = InMemoryStorageBackend::new();
        let a = storage.ensure_manufacturer("Konica Minolta", "konica_minolta").await.unwrap();
        let b = storage.ensure_manufacturer("konica minolta", "konica_minolta").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn error_codes_require_manufacturer_id() {
        let storage = InMemoryStorageBackend::new();
        let mut code = ErrorCode {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            manufacturer_id: Uuid::nil(),
            product_id: None,
            chunk_id: None,
            error_code: "C9402".to_string(),
            error_description: None,
            solution_text: None,
            page_number: 1,
            confidence_score: 0.9,
            severity_level: None,
            requires_technician: None,
            requires_parts: None,
            context_text: None,
            metadata: serde_json::Value::Null,
        };
        let err = storage.batch_insert_error_codes(vec![code.clone()]).await.unwrap_err();
        assert!(matches!(err, Error::ManufacturerMissing { .. }));
        code.manufacturer_id = Uuid::new_v4();
        assert!(storage.batch_insert_error_codes(vec![code]).await.is_ok());
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_on_document_and_stage() {
        let storage = InMemoryStorageBackend::new();
        let document_id = Uuid::new_v4();
        let first = storage
            .enqueue(QueueItem::new(document_id, Stage::TextExtraction, 0, 3))
            .await
            .unwrap();
        let second = storage
            .enqueue(QueueItem::new(document_id, Stage::TextExtraction, 0, 3))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.count_pending_queue_items().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lease_next_picks_highest_priority() {
        let storage = InMemoryStorageBackend::new();
        let low = QueueItem::new(Uuid::new_v4(), Stage::TextExtraction, 0, 3);
        let high = QueueItem::new(Uuid::new_v4(), Stage::TextExtraction, 5, 3);
        storage.enqueue(low).await.unwrap();
        storage.enqueue(high.clone()).await.unwrap();
        let leased = storage
            .lease_next("worker-1", &[], chrono::Duration::seconds(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(leased.document_id, high.document_id);
        assert_eq!(leased.attempts, 1);
    }

    #[tokio::test]
    async fn blob_round_trip() {
        let store = InMemoryBlobStore::new();
        let key = BlobKey::new("documents", "sha256/abc/manual.pdf");
        store.put(&key, b"%PDF-1.4".to_vec()).await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), b"%PDF-1.4");
        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
    }
}
