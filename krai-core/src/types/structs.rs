//! Entity records comprising the data model: documents and everything an
//! ingest run attaches to them.

use super::enums::{
    DocumentType, ImageType, OwnerKind, PipelineErrorStatus, ProcessingStatus, QueueItemStatus,
    Stage, StageState, ValidationStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An uploaded document and its top-level processing state.
///
/// Created on ingest; mutated only by the orchestrator and stage runner;
/// never deleted by the engine (soft-retained for audit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub file_hash: String,
    pub file_size: u64,
    pub document_type: DocumentType,
    pub manufacturer_id: Option<Uuid>,
    pub language: Option<String>,
    pub page_count: Option<u32>,
    pub processing_status: ProcessingStatus,
    pub current_stage: Option<Stage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub uploaded_by: Option<String>,
}

impl Document {
    #[must_use]
    pub fn new(filename: String, file_hash: String, file_size: u64, document_type: DocumentType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            filename,
            file_hash,
            file_size,
            document_type,
            manufacturer_id: None,
            language: None,
            page_count: None,
            processing_status: ProcessingStatus::Pending,
            current_stage: None,
            created_at: now,
            updated_at: now,
            uploaded_by: None,
        }
    }
}

/// A manufacturer, shared across documents/products/error codes.
///
/// Created on demand by the extractor layer on first encounter; never
/// mutated by extractors after creation. `name` comparisons for resolution
/// are case-insensitive, but the stored value preserves original casing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: Uuid,
    pub name: String,
    pub pattern_key: String,
    pub contact_email: Option<String>,
    pub contact_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Manufacturer {
    #[must_use]
    pub fn new(name: String, pattern_key: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            pattern_key,
            contact_email: None,
            contact_url: None,
            created_at: Utc::now(),
        }
    }

    /// Normalized key used for case-insensitive lookup/upsert.
    #[must_use]
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

/// A product line grouping within a manufacturer (e.g., a copier series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSeries {
    pub id: Uuid,
    pub manufacturer_id: Uuid,
    pub name: String,
}

/// A specific product model. `(manufacturer_id, model_number)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub manufacturer_id: Uuid,
    pub model_number: String,
    pub series_id: Option<Uuid>,
    pub product_type: String,
    pub specifications: Value,
    pub oem_manufacturer_id: Option<Uuid>,
}

/// A contiguous span of a document's text. Chunks of a document form a
/// doubly-linked list in reading order; `(document_id, ordinal)` is
/// unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub ordinal: u32,
    pub page_number: u32,
    pub section_hierarchy: Vec<String>,
    pub section_level: u32,
    pub text: String,
    pub previous_chunk_id: Option<Uuid>,
    pub next_chunk_id: Option<Uuid>,
}

/// A fixed-length embedding vector for a chunk, image, or table.
/// `(owner_kind, owner_id, model_name)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub id: Uuid,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub model_name: String,
    pub dimension: usize,
    pub vector: Vec<f32>,
}

impl Embedding {
    /// Validate `vector.len() == dimension`, the invariant the storage
    /// adapter must enforce before insert.
    #[must_use]
    pub fn has_consistent_dimension(&self) -> bool {
        self.vector.len() == self.dimension
    }
}

/// A single error/fault code extracted from a document page.
///
/// `manufacturer_id` is never null; `confidence_score` must be
/// `>= rules.min_confidence` for the manufacturer that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCode {
    pub id: Uuid,
    pub document_id: Uuid,
    pub manufacturer_id: Uuid,
    pub product_id: Option<Uuid>,
    pub chunk_id: Option<Uuid>,
    pub error_code: String,
    pub error_description: Option<String>,
    pub solution_text: Option<String>,
    pub page_number: u32,
    pub confidence_score: f32,
    pub severity_level: Option<String>,
    pub requires_technician: Option<bool>,
    pub requires_parts: Option<bool>,
    pub context_text: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub document_id: Uuid,
    pub page_number: u32,
    pub image_type: ImageType,
    pub blob_bucket: String,
    pub blob_key: String,
    pub context_text: Option<String>,
    pub ocr_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub document_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub duration_secs: Option<u32>,
    pub validation_status: ValidationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub document_id: Uuid,
    pub url: String,
    pub link_type: String,
    pub validation_status: ValidationStatus,
}

/// A durable work token `(document_id, stage)` with lease semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub stage: Stage,
    pub priority: i32,
    pub status: QueueItemStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub lease_deadline: Option<DateTime<Utc>>,
    pub leased_by: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueueItem {
    #[must_use]
    pub fn new(document_id: Uuid, stage: Stage, priority: i32, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            stage,
            priority,
            status: QueueItemStatus::Pending,
            attempts: 0,
            max_attempts,
            lease_deadline: None,
            leased_by: None,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    /// The idempotency key enforcing at-most-one-in-flight per document+stage.
    #[must_use]
    pub fn idempotency_key(&self) -> (Uuid, Stage) {
        (self.document_id, self.stage)
    }
}

/// Per-(document, stage) state, timings, and retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatus {
    pub document_id: Uuid,
    pub stage: Stage,
    pub state: StageState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl StageStatus {
    #[must_use]
    pub fn not_started(document_id: Uuid, stage: Stage) -> Self {
        Self {
            document_id,
            stage,
            state: StageState::NotStarted,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error_kind: None,
            error_message: None,
            retry_count: 0,
        }
    }
}

/// An operator-facing record describing a stage failure with remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineError {
    pub id: Uuid,
    pub document_id: Uuid,
    pub stage: Stage,
    pub error_kind: String,
    pub error_message: String,
    pub severity: String,
    pub status: PipelineErrorStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

/// Aggregate per-document progress view returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProgress {
    pub document_id: Uuid,
    pub stages: Vec<StageStatus>,
    pub completed_stages: usize,
    pub total_stages: usize,
}

impl DocumentProgress {
    #[must_use]
    pub fn fraction_complete(&self) -> f32 {
        if self.total_stages == 0 {
            0.0
        } else {
            self.completed_stages as f32 / self.total_stages as f32
        }
    }
}
