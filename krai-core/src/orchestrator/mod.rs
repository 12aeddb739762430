//! Document Processor / Orchestrator (spec §4.6): the entry point the
//! ingest API, reprocess tooling, and CLI all call into. Owns none of the
//! stage logic itself — it creates/duplicates/resets `Document` rows and
//! hands work to the [`crate::queue::ProcessingQueue`]; the
//! [`crate::runner::StageRunner`] worker pool does the rest.

use crate::error::{Error, Result};
use crate::queue::ProcessingQueue;
use crate::security::audit::{self, AuditContext, AuditLogger};
use crate::stage::StageTracker;
use crate::storage::{BlobKey, BlobStore, StorageBackend};
use crate::types::{Document, DocumentProgress, DocumentType, IngestStatus, Stage};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Caller-supplied knobs for one `ingest` call.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub language: Option<String>,
    pub force_reprocess: bool,
    pub uploaded_by: Option<String>,
}

/// Result of one `ingest` call, matching spec §6's ingest API response
/// shape (`document_id`, `status`, `metadata`).
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub document_id: Uuid,
    pub status: IngestStatus,
    pub file_hash: String,
}

/// Entry point for ingesting, reprocessing, and querying the status of
/// documents. Cheap to clone (holds only `Arc`s and value types).
#[derive(Clone)]
pub struct DocumentProcessor {
    storage: Arc<dyn StorageBackend>,
    blob_store: Arc<dyn BlobStore>,
    queue: ProcessingQueue,
    tracker: StageTracker,
    audit: AuditLogger,
}

impl DocumentProcessor {
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        blob_store: Arc<dyn BlobStore>,
        queue: ProcessingQueue,
        tracker: StageTracker,
        audit: AuditLogger,
    ) -> Self {
        Self { storage, blob_store, queue, tracker, audit }
    }

    /// Ingest a new blob. Duplicates (same `file_hash`) return the
    /// existing document id with `status=duplicate` unless
    /// `options.force_reprocess` is set, in which case every stage is
    /// reset and `text_extraction` is re-enqueued on the existing document
    /// (spec §4.6 step 1).
    ///
    /// # Errors
    /// Returns [`Error::QueueSaturated`] if the processing queue is at its
    /// configured watermark.
    pub async fn ingest(
        &self,
        blob: Vec<u8>,
        filename: String,
        document_type: DocumentType,
        options: IngestOptions,
    ) -> Result<IngestOutcome> {
        let file_hash = hex_sha256(&blob);

        if let Some(existing) = self.storage.find_document_by_hash(&file_hash).await? {
            if !options.force_reprocess {
                return Ok(IngestOutcome {
                    document_id: existing.id,
                    status: IngestStatus::Duplicate,
                    file_hash,
                });
            }
            self.tracker.reset(existing.id, None).await?;
            self.queue.enqueue(existing.id, Stage::TextExtraction, 0).await?;
            self.audit.log(audit::document_ingested(&AuditContext::system(), existing.id, &filename, &file_hash));
            return Ok(IngestOutcome {
                document_id: existing.id,
                status: IngestStatus::Reprocessing,
                file_hash,
            });
        }

        let mut document = Document::new(filename.clone(), file_hash.clone(), blob.len() as u64, document_type);
        document.language = options.language;
        document.uploaded_by = options.uploaded_by;
        let document_id = self.storage.create_document(document).await?;

        let blob_key = BlobKey::original(&file_hash, &filename);
        self.blob_store.put(&blob_key, blob).await?;

        // Upload completes synchronously — there is no I/O-bound work left
        // once the blob write above succeeds, so queuing it would only add
        // lease latency ahead of the first real stage.
        self.tracker.start(document_id, Stage::Upload).await?;
        self.tracker.complete(document_id, Stage::Upload).await?;

        self.queue.enqueue(document_id, Stage::TextExtraction, 0).await?;
        self.audit.log(audit::document_ingested(&AuditContext::system(), document_id, &filename, &file_hash));

        Ok(IngestOutcome { document_id, status: IngestStatus::New, file_hash })
    }

    /// Reset one stage to `not_started` and re-enqueue it, leaving earlier
    /// stages' results intact (spec §4.6).
    pub async fn reprocess_stage(&self, document_id: Uuid, stage: Stage) -> Result<()> {
        self.storage
            .get_document(document_id)
            .await?
            .ok_or(Error::DocumentMissing { document_id })?;
        self.tracker.reset(document_id, Some(stage)).await?;
        self.queue.enqueue(document_id, stage, 0).await?;
        self.audit.log(audit::queue_item_requeued(&AuditContext::system(), document_id, stage, "manual reprocess_stage"));
        Ok(())
    }

    /// Reset every stage and re-enqueue from `text_extraction` (spec
    /// §4.6); `upload` is left `not_started` but is never re-queued since
    /// its only responsibility — verifying the blob exists — would just
    /// repeat work `text_extraction` already depends on succeeding.
    pub async fn reprocess_document(&self, document_id: Uuid) -> Result<()> {
        self.storage
            .get_document(document_id)
            .await?
            .ok_or(Error::DocumentMissing { document_id })?;
        self.tracker.reset(document_id, None).await?;
        self.queue.enqueue(document_id, Stage::TextExtraction, 0).await?;
        self.audit.log(audit::queue_item_requeued(
            &AuditContext::system(),
            document_id,
            Stage::TextExtraction,
            "manual reprocess_document",
        ));
        Ok(())
    }

    /// Per-stage status plus aggregate progress (spec §4.6).
    pub async fn get_status(&self, document_id: Uuid) -> Result<DocumentProgress> {
        self.storage
            .get_document(document_id)
            .await?
            .ok_or(Error::DocumentMissing { document_id })?;
        self.tracker.progress(document_id).await
    }
}

fn hex_sha256(blob: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ProcessingQueue;
    use crate::storage::{InMemoryBlobStore, InMemoryStorageBackend};
    use crate::types::QueueConfig;

    fn processor() -> DocumentProcessor {
        let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
        let blob_store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let queue = ProcessingQueue::new(Arc::clone(&storage), QueueConfig::default());
        let tracker = StageTracker::new(Arc::clone(&storage));
        DocumentProcessor::new(storage, blob_store, queue, tracker, AuditLogger::disabled())
    }

    #[tokio::test]
    async fn ingest_creates_a_new_document_and_enqueues_text_extraction() {
        let processor = processor();
        let outcome = processor
            .ingest(b"hello".to_vec(), "manual.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.status, IngestStatus::New);
        assert_eq!(processor.queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_ingest_returns_existing_id_without_enqueuing() {
        let processor = processor();
        let first = processor
            .ingest(b"hello".to_vec(), "manual.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
            .await
            .unwrap();
        let second = processor
            .ingest(b"hello".to_vec(), "manual-copy.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(second.status, IngestStatus::Duplicate);
        assert_eq!(second.document_id, first.document_id);
        assert_eq!(processor.queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn force_reprocess_on_duplicate_resets_and_requeues() {
        let processor = processor();
        let first = processor
            .ingest(b"hello".to_vec(), "manual.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
            .await
            .unwrap();
        processor.queue.lease("worker-1", &[]).await.unwrap();

        let options = IngestOptions { force_reprocess: true, ..Default::default() };
        let second = processor
            .ingest(b"hello".to_vec(), "manual.pdf".to_string(), DocumentType::ServiceManual, options)
            .await
            .unwrap();
        assert_eq!(second.status, IngestStatus::Reprocessing);
        assert_eq!(second.document_id, first.document_id);
    }

    #[tokio::test]
    async fn get_status_on_unknown_document_fails() {
        let processor = processor();
        let err = processor.get_status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::DocumentMissing { .. }));
    }
}
