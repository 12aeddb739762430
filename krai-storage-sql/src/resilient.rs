//! Circuit-breaker wrapper around any [`StorageBackend`], so a flaky
//! connection fails fast instead of queuing up retries on a dead
//! database (spec §5 resilience: storage outages must not cascade into
//! runner-wide stalls).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use krai_core::error::Result;
use krai_core::storage::backend::{DocumentPatch, EmbeddingMatch, EmbeddingSearchFilter, StorageBackend};
use krai_core::storage::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use krai_core::types::{
    Chunk, Document, Embedding, ErrorCode, Image, Link, Manufacturer, OwnerKind, PipelineError,
    PipelineErrorStatus, Product, ProductSeries, QueueItem, QueueItemStatus, Stage, StageStatus,
    Video,
};
use std::sync::Arc;
use uuid::Uuid;

/// Wraps an inner [`StorageBackend`] so every call goes through a shared
/// [`CircuitBreaker`]. Trips after `config.failure_threshold` consecutive
/// failures and rejects new calls with `Error::CircuitBreakerOpen` until
/// `config.timeout` has passed.
pub struct ResilientStorageBackend {
    inner: Arc<dyn StorageBackend>,
    circuit_breaker: CircuitBreaker,
}

impl ResilientStorageBackend {
    #[must_use]
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(inner, CircuitBreakerConfig::default())
    }

    #[must_use]
    pub fn with_config(inner: Arc<dyn StorageBackend>, config: CircuitBreakerConfig) -> Self {
        Self { inner, circuit_breaker: CircuitBreaker::new(config) }
    }
}

#[async_trait]
impl StorageBackend for ResilientStorageBackend {
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        self.circuit_breaker.call(|| self.inner.get_document(id)).await
    }

    async fn create_document(&self, document: Document) -> Result<Uuid> {
        self.circuit_breaker.call(|| self.inner.create_document(document.clone())).await
    }

    async fn find_document_by_hash(&self, file_hash: &str) -> Result<Option<Document>> {
        self.circuit_breaker.call(|| self.inner.find_document_by_hash(file_hash)).await
    }

    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.update_document(id, patch.clone())).await
    }

    async fn ensure_manufacturer(&self, name: &str, pattern_key: &str) -> Result<Manufacturer> {
        self.circuit_breaker.call(|| self.inner.ensure_manufacturer(name, pattern_key)).await
    }

    async fn get_manufacturer(&self, id: Uuid) -> Result<Option<Manufacturer>> {
        self.circuit_breaker.call(|| self.inner.get_manufacturer(id)).await
    }

    async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>> {
        self.circuit_breaker.call(|| self.inner.list_manufacturers()).await
    }

    async fn ensure_product_series(&self, manufacturer_id: Uuid, name: &str) -> Result<ProductSeries> {
        self.circuit_breaker.call(|| self.inner.ensure_product_series(manufacturer_id, name)).await
    }

    async fn upsert_product(&self, product: Product) -> Result<Uuid> {
        self.circuit_breaker.call(|| self.inner.upsert_product(product.clone())).await
    }

    async fn list_products(&self, manufacturer_id: Uuid) -> Result<Vec<Product>> {
        self.circuit_breaker.call(|| self.inner.list_products(manufacturer_id)).await
    }

    async fn upsert_chunks(&self, document_id: Uuid, chunks: Vec<Chunk>) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.upsert_chunks(document_id, chunks.clone())).await
    }

    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        self.circuit_breaker.call(|| self.inner.list_chunks(document_id)).await
    }

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>> {
        self.circuit_breaker.call(|| self.inner.get_chunk(id)).await
    }

    async fn upsert_embeddings(&self, embeddings: Vec<Embedding>) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.upsert_embeddings(embeddings.clone())).await
    }

    async fn embedded_owner_ids(&self, owner_kind: OwnerKind, model_name: &str) -> Result<Vec<Uuid>> {
        self.circuit_breaker.call(|| self.inner.embedded_owner_ids(owner_kind, model_name)).await
    }

    async fn search_embeddings(
        &self,
        query_vector: &[f32],
        filter: EmbeddingSearchFilter,
        k: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        self.circuit_breaker
            .call(|| self.inner.search_embeddings(query_vector, filter.clone(), k))
            .await
    }

    async fn batch_insert_error_codes(&self, records: Vec<ErrorCode>) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.batch_insert_error_codes(records.clone())).await
    }

    async fn list_error_codes(&self, document_id: Uuid) -> Result<Vec<ErrorCode>> {
        self.circuit_breaker.call(|| self.inner.list_error_codes(document_id)).await
    }

    async fn set_error_code_chunk(&self, error_code_id: Uuid, chunk_id: Uuid) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.set_error_code_chunk(error_code_id, chunk_id)).await
    }

    async fn upsert_images(&self, images: Vec<Image>) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.upsert_images(images.clone())).await
    }

    async fn list_images(&self, document_id: Uuid) -> Result<Vec<Image>> {
        self.circuit_breaker.call(|| self.inner.list_images(document_id)).await
    }

    async fn upsert_videos(&self, videos: Vec<Video>) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.upsert_videos(videos.clone())).await
    }

    async fn upsert_links(&self, links: Vec<Link>) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.upsert_links(links.clone())).await
    }

    async fn enqueue(&self, item: QueueItem) -> Result<Uuid> {
        self.circuit_breaker.call(|| self.inner.enqueue(item.clone())).await
    }

    async fn find_active_queue_item(&self, document_id: Uuid, stage: Stage) -> Result<Option<QueueItem>> {
        self.circuit_breaker.call(|| self.inner.find_active_queue_item(document_id, stage)).await
    }

    async fn lease_next(
        &self,
        worker_id: &str,
        stages_filter: &[Stage],
        ttl: chrono::Duration,
    ) -> Result<Option<QueueItem>> {
        self.circuit_breaker.call(|| self.inner.lease_next(worker_id, stages_filter, ttl)).await
    }

    async fn complete_queue_item(&self, item_id: Uuid) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.complete_queue_item(item_id)).await
    }

    async fn fail_queue_item(
        &self,
        item_id: Uuid,
        error: &str,
        status: QueueItemStatus,
        retry_not_before: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.circuit_breaker
            .call(|| self.inner.fail_queue_item(item_id, error, status, retry_not_before))
            .await
    }

    async fn extend_lease(&self, item_id: Uuid, ttl: chrono::Duration) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.extend_lease(item_id, ttl)).await
    }

    async fn reclaim_expired_leases(&self, now: DateTime<Utc>) -> Result<usize> {
        self.circuit_breaker.call(|| self.inner.reclaim_expired_leases(now)).await
    }

    async fn count_pending_queue_items(&self) -> Result<usize> {
        self.circuit_breaker.call(|| self.inner.count_pending_queue_items()).await
    }

    async fn get_stage_status(&self, document_id: Uuid, stage: Stage) -> Result<Option<StageStatus>> {
        self.circuit_breaker.call(|| self.inner.get_stage_status(document_id, stage)).await
    }

    async fn upsert_stage_status(&self, status: StageStatus) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.upsert_stage_status(status.clone())).await
    }

    async fn list_stage_statuses(&self, document_id: Uuid) -> Result<Vec<StageStatus>> {
        self.circuit_breaker.call(|| self.inner.list_stage_statuses(document_id)).await
    }

    async fn reset_stage_statuses(&self, document_id: Uuid, from_stage: Option<Stage>) -> Result<()> {
        self.circuit_breaker.call(|| self.inner.reset_stage_statuses(document_id, from_stage)).await
    }

    async fn record_pipeline_error(&self, error: PipelineError) -> Result<Uuid> {
        self.circuit_breaker.call(|| self.inner.record_pipeline_error(error.clone())).await
    }

    async fn list_pipeline_errors(
        &self,
        stage: Option<Stage>,
        status: Option<PipelineErrorStatus>,
    ) -> Result<Vec<PipelineError>> {
        self.circuit_breaker.call(|| self.inner.list_pipeline_errors(stage, status)).await
    }

    async fn execute(&self, query: &str, params: &[String]) -> Result<u64> {
        self.circuit_breaker.call(|| self.inner.execute(query, params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krai_core::storage::memory::InMemoryStorageBackend;
    use krai_core::types::{Document, DocumentType, ProcessingStatus};

    fn sample_document() -> Document {
        Document {
            id: Uuid::new_v4(),
            filename: "manual.pdf".to_string(),
            file_hash: "deadbeef".to_string(),
            file_size: 1024,
            document_type: DocumentType::ServiceManual,
            manufacturer_id: None,
            language: None,
            page_count: None,
            processing_status: ProcessingStatus::Pending,
            current_stage: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            uploaded_by: None,
        }
    }

    #[tokio::test]
    async fn delegates_successful_calls_through_closed_circuit() {
        let inner = Arc::new(InMemoryStorageBackend::new());
        let resilient = ResilientStorageBackend::new(inner);

        let doc = sample_document();
        let id = resilient.create_document(doc.clone()).await.unwrap();
        let fetched = resilient.get_document(id).await.unwrap();
        assert_eq!(fetched.unwrap().file_hash, doc.file_hash);
    }
}
