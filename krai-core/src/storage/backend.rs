//! Relational storage contract (spec §4.3): documents and everything an
//! ingest run attaches to them, plus vector similarity search over
//! embeddings. One method family per entity; batch writes for a single
//! stage invocation are expected to be one transaction (`upsert_chunks`,
//! `batch_insert_error_codes`) so a mid-batch failure rolls back cleanly
//! without touching prior stages' data.

use crate::error::Result;
use crate::types::{
    Chunk, Document, DocumentType, Embedding, ErrorCode, Image, Link, Manufacturer,
    PipelineError, ProcessingStatus, Product, ProductSeries, QueueItem, QueueItemStatus, Stage,
    StageState, StageStatus, Video,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Partial update to a [`Document`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub processing_status: Option<ProcessingStatus>,
    pub current_stage: Option<Option<Stage>>,
    pub manufacturer_id: Option<Uuid>,
    pub language: Option<String>,
    pub page_count: Option<u32>,
}

/// One embedding's similarity score against a query vector, as returned
/// by [`StorageBackend::search_embeddings`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatch {
    pub owner_kind: crate::types::OwnerKind,
    pub owner_id: Uuid,
    pub similarity: f32,
}

/// Narrows an embedding search to a `model_name` and optional owner kind;
/// an empty filter searches across everything with a matching dimension.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingSearchFilter {
    pub model_name: Option<String>,
    pub owner_kind: Option<crate::types::OwnerKind>,
}

/// Storage backend for the relational entity set: documents, products,
/// manufacturers, chunks, embeddings, error codes, images, videos, links,
/// the processing queue, stage status, and pipeline errors.
///
/// All operations are async so both networked (libSQL) and local
/// (embedded/in-memory) implementations fit the same interface.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ---- Documents ----

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Fails with [`crate::error::Error::DuplicateDocument`] if a document
    /// with the same `file_hash` already exists, unless `force_reprocess`
    /// is set by the caller (the orchestrator decides this, not storage).
    async fn create_document(&self, document: Document) -> Result<Uuid>;

    async fn find_document_by_hash(&self, file_hash: &str) -> Result<Option<Document>>;

    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> Result<()>;

    // ---- Manufacturers & products ----

    /// Case-insensitive upsert keyed on normalized `name`; returns the
    /// existing id if already present, otherwise inserts and returns a
    /// new one. Must be atomic under concurrent callers (spec §5).
    async fn ensure_manufacturer(&self, name: &str, pattern_key: &str) -> Result<Manufacturer>;

    async fn get_manufacturer(&self, id: Uuid) -> Result<Option<Manufacturer>>;

    async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>>;

    async fn ensure_product_series(&self, manufacturer_id: Uuid, name: &str) -> Result<ProductSeries>;

    /// Upsert keyed on `(manufacturer_id, model_number)`.
    async fn upsert_product(&self, product: Product) -> Result<Uuid>;

    async fn list_products(&self, manufacturer_id: Uuid) -> Result<Vec<Product>>;

    // ---- Chunks ----

    /// Replaces all chunks for `document_id` atomically, preserving the
    /// doubly-linked-list invariant (spec §8 invariant 2).
    async fn upsert_chunks(&self, document_id: Uuid, chunks: Vec<Chunk>) -> Result<()>;

    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>>;

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>>;

    // ---- Embeddings ----

    async fn upsert_embeddings(&self, embeddings: Vec<Embedding>) -> Result<()>;

    /// Owner ids already embedded with `model_name`, used by the embedding
    /// stage to skip already-covered items (spec §8 idempotence).
    async fn embedded_owner_ids(
        &self,
        owner_kind: crate::types::OwnerKind,
        model_name: &str,
    ) -> Result<Vec<Uuid>>;

    /// Cosine-similarity search; results sorted descending by similarity,
    /// ties broken by id.
    async fn search_embeddings(
        &self,
        query_vector: &[f32],
        filter: EmbeddingSearchFilter,
        k: usize,
    ) -> Result<Vec<EmbeddingMatch>>;

    // ---- Error codes ----

    /// Atomic; rejects any record with a null `manufacturer_id` (spec §8
    /// invariant 1) before writing any of the batch.
    async fn batch_insert_error_codes(&self, records: Vec<ErrorCode>) -> Result<()>;

    async fn list_error_codes(&self, document_id: Uuid) -> Result<Vec<ErrorCode>>;

    /// Back-fills `chunk_id` on error codes after `chunk_prep` completes
    /// (spec §4.2.5 "chunk linkage (deferred)" / scenario S6).
    async fn set_error_code_chunk(&self, error_code_id: Uuid, chunk_id: Uuid) -> Result<()>;

    // ---- Images, videos, links ----

    async fn upsert_images(&self, images: Vec<Image>) -> Result<()>;

    async fn list_images(&self, document_id: Uuid) -> Result<Vec<Image>>;

    async fn upsert_videos(&self, videos: Vec<Video>) -> Result<()>;

    async fn upsert_links(&self, links: Vec<Link>) -> Result<()>;

    // ---- Processing queue ----

    async fn enqueue(&self, item: QueueItem) -> Result<Uuid>;

    /// `(document_id, stage)` currently `pending` or `leased`, used to
    /// enforce the queue's idempotency key (spec §8 invariant 3).
    async fn find_active_queue_item(&self, document_id: Uuid, stage: Stage) -> Result<Option<QueueItem>>;

    /// Highest-priority leasable item among `stages_filter` (or any stage
    /// if empty), leased to `worker_id` for `ttl`. A `pending` item is
    /// always leasable; a `retrying` item is leasable once `now` has
    /// passed its `lease_deadline` (the retry backoff set by
    /// `fail_queue_item`). Returns `None` if nothing is available.
    async fn lease_next(
        &self,
        worker_id: &str,
        stages_filter: &[Stage],
        ttl: chrono::Duration,
    ) -> Result<Option<QueueItem>>;

    async fn complete_queue_item(&self, item_id: Uuid) -> Result<()>;

    /// Move `item_id` to `status`. When `status` is `retrying`,
    /// `retry_not_before` must be `Some` and is stored as the item's
    /// `lease_deadline` so `lease_next` knows when the backoff elapses.
    async fn fail_queue_item(
        &self,
        item_id: Uuid,
        error: &str,
        status: QueueItemStatus,
        retry_not_before: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn extend_lease(&self, item_id: Uuid, ttl: chrono::Duration) -> Result<()>;

    /// Leases past `lease_deadline` are returned to `pending` with
    /// incremented `attempts`; returns how many were reclaimed.
    async fn reclaim_expired_leases(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn count_pending_queue_items(&self) -> Result<usize>;

    // ---- Stage tracker ----

    async fn get_stage_status(&self, document_id: Uuid, stage: Stage) -> Result<Option<StageStatus>>;

    async fn upsert_stage_status(&self, status: StageStatus) -> Result<()>;

    async fn list_stage_statuses(&self, document_id: Uuid) -> Result<Vec<StageStatus>>;

    /// Resets a document's stages back to [`StageState::NotStarted`],
    /// starting at `from_stage` (inclusive) if given, or all stages
    /// otherwise. Used by `reprocess_stage`/`reprocess_document`.
    async fn reset_stage_statuses(&self, document_id: Uuid, from_stage: Option<Stage>) -> Result<()>;

    // ---- Pipeline errors ----

    async fn record_pipeline_error(&self, error: PipelineError) -> Result<Uuid>;

    async fn list_pipeline_errors(
        &self,
        stage: Option<Stage>,
        status: Option<crate::types::PipelineErrorStatus>,
    ) -> Result<Vec<PipelineError>>;

    // ---- Migrations ----

    /// Adapter-agnostic escape hatch for schema migrations; not used by
    /// engine logic directly.
    async fn execute(&self, query: &str, params: &[String]) -> Result<u64>;
}

/// Constructs the document-type enum discriminant used by
/// `create_document` callers outside this crate (kept here, not on
/// `Document`, so the storage contract stays the single place that
/// enumerates the columns it persists).
#[must_use]
pub fn supported_document_types() -> &'static [DocumentType] {
    &[
        DocumentType::ServiceManual,
        DocumentType::PartsCatalog,
        DocumentType::TechnicalBulletin,
        DocumentType::CpmdDatabase,
        DocumentType::UserManual,
        DocumentType::InstallationGuide,
        DocumentType::TroubleshootingGuide,
    ]
}
