//! Stage Runner (spec §4.5): the worker pool that leases queue items and
//! dispatches each to the extractor for its stage. Generalizes the
//! teacher's fixed-pipeline worker loop to a `HandlerTable` keyed by
//! [`Stage`] so every stage — including ones the teacher never had — goes
//! through the same lease/run/persist/advance cycle.

mod handlers;

pub use handlers::{
    ChunkPrepHandler, ClassificationHandler, EmbeddingHandler, EnrichmentHandler,
    ErrorCodeExtractionHandler, ImageProcessingHandler, MetadataExtractionHandler,
    SearchIndexingHandler, TextExtractionHandler, UploadHandler,
};

use crate::embeddings::EmbeddingService;
use crate::error::{Error, Result};
use crate::extract::{ImageBackend, MetadataProvider, OcrProvider, PdfTextBackend};
use crate::pattern::PatternRegistry;
use crate::queue::{LeasedItem, ProcessingQueue};
use crate::security::audit::{self, AuditContext, AuditLogger};
use crate::stage::StageTracker;
use crate::storage::{BlobStore, DocumentPatch, StorageBackend};
use crate::types::{EngineConfig, ProcessingStatus, QueueConfig, Stage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Everything a [`StageHandler`] needs to read or write. Cheap to clone
/// (every field is an `Arc` or a small value type); one instance is built
/// once and shared across the whole worker pool.
#[derive(Clone)]
pub struct RunnerContext {
    pub storage: Arc<dyn StorageBackend>,
    pub blob_store: Arc<dyn BlobStore>,
    pub patterns: PatternRegistry,
    pub pdf_backend: Arc<dyn PdfTextBackend>,
    pub image_backend: Arc<ImageBackend>,
    pub ocr_provider: Option<Arc<dyn OcrProvider>>,
    pub metadata_provider: Arc<dyn MetadataProvider>,
    pub embedding_service: Arc<EmbeddingService>,
    pub engine_config: EngineConfig,
}

/// Outcome of one [`StageHandler::run`] call. `Skipped` is the
/// `error_code_extraction`-with-no-manufacturer case (spec §4.2.5) and any
/// future stage that can legitimately decide it has nothing to do.
pub enum StageOutcome {
    Completed,
    CompletedWithWarning { error_kind: String, message: String },
    Skipped { reason: String },
}

/// One stage's extractor, uniformly invocable by document id. Handlers
/// re-derive any upstream pure-function output they need (page text,
/// classification hints) from the original blob rather than reading a
/// cached pipeline artifact — there is no intermediate storage table for
/// it, and every extractor is cheap and deterministic to re-run.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome>;
}

/// Dispatch table mapping each [`Stage`] to its handler.
pub struct HandlerTable {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl HandlerTable {
    #[must_use]
    pub fn new() -> Self {
        let mut handlers: HashMap<Stage, Arc<dyn StageHandler>> = HashMap::new();
        handlers.insert(Stage::Upload, Arc::new(UploadHandler));
        handlers.insert(Stage::TextExtraction, Arc::new(TextExtractionHandler));
        handlers.insert(Stage::ImageProcessing, Arc::new(ImageProcessingHandler));
        handlers.insert(Stage::Classification, Arc::new(ClassificationHandler));
        handlers.insert(Stage::MetadataExtraction, Arc::new(MetadataExtractionHandler));
        handlers.insert(Stage::ErrorCodeExtraction, Arc::new(ErrorCodeExtractionHandler));
        handlers.insert(Stage::ChunkPrep, Arc::new(ChunkPrepHandler));
        handlers.insert(Stage::Enrichment, Arc::new(EnrichmentHandler));
        handlers.insert(Stage::Embedding, Arc::new(EmbeddingHandler));
        handlers.insert(Stage::SearchIndexing, Arc::new(SearchIndexingHandler));
        Self { handlers }
    }

    #[must_use]
    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&stage).cloned()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker pool driving the queue. Construct one, then [`Self::spawn`] it
/// `worker_count` times; each task loops lease -> run -> advance until the
/// process shuts down.
#[derive(Clone)]
pub struct StageRunner {
    ctx: RunnerContext,
    queue: ProcessingQueue,
    tracker: StageTracker,
    audit: AuditLogger,
    handlers: Arc<HandlerTable>,
    queue_config: QueueConfig,
}

impl StageRunner {
    #[must_use]
    pub fn new(
        ctx: RunnerContext,
        queue: ProcessingQueue,
        tracker: StageTracker,
        audit: AuditLogger,
        queue_config: QueueConfig,
    ) -> Self {
        Self {
            ctx,
            queue,
            tracker,
            audit,
            handlers: Arc::new(HandlerTable::new()),
            queue_config,
        }
    }

    /// Spawn `self.queue_config.worker_count` tasks, each polling the
    /// queue until cancelled. Callers own the returned handles; dropping
    /// them does not stop the workers (they run detached).
    #[must_use]
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.queue_config.worker_count.max(1))
            .map(|i| {
                let runner = Arc::clone(self);
                let worker_id = format!("worker-{i}");
                tokio::spawn(async move { runner.worker_loop(worker_id).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: String) {
        let report_metrics = worker_id == "worker-0";
        loop {
            match self.queue.lease(&worker_id, &[]).await {
                Ok(Some(leased)) => self.process(leased).await,
                Ok(None) => {
                    if report_metrics {
                        self.queue.telemetry().log_metrics().await;
                    }
                    tokio::time::sleep(Duration::from_millis(self.queue_config.poll_interval_ms)).await;
                }
                Err(error) => {
                    tracing::error!(%error, worker = %worker_id, "queue lease failed");
                    tokio::time::sleep(Duration::from_millis(self.queue_config.poll_interval_ms)).await;
                }
            }
        }
    }

    #[tracing::instrument(skip(self, leased), fields(document_id = %leased.item.document_id, stage = %leased.item.stage))]
    async fn process(&self, leased: LeasedItem) {
        let item = leased.item;
        let document_id = item.document_id;
        let stage = item.stage;

        match self.ctx.storage.get_document(document_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let _ = self.queue.fail(&item, &Error::DocumentMissing { document_id }, None).await;
                return;
            }
            Err(error) => {
                let _ = self.queue.fail(&item, &error, None).await;
                return;
            }
        }

        match self.tracker.prerequisite_satisfied(document_id, stage).await {
            Ok(true) => {}
            Ok(false) => {
                let prerequisite = stage.prerequisite().unwrap_or(stage);
                let error = Error::PrerequisiteNotMet { document_id, stage, prerequisite };
                let _ = self.queue.fail(&item, &error, None).await;
                return;
            }
            Err(error) => {
                let _ = self.queue.fail(&item, &error, None).await;
                return;
            }
        }

        if let Err(error) = self.tracker.start(document_id, stage).await {
            tracing::error!(%error, "failed to mark stage running");
            return;
        }
        let _ = self
            .ctx
            .storage
            .update_document(
                document_id,
                DocumentPatch {
                    processing_status: Some(ProcessingStatus::Processing),
                    current_stage: Some(Some(stage)),
                    ..Default::default()
                },
            )
            .await;
        self.audit.log(audit::stage_started(&AuditContext::system(), document_id, stage));

        let Some(handler) = self.handlers.get(stage) else {
            tracing::warn!(%stage, "no handler registered for stage");
            let _ = self.tracker.complete(document_id, stage).await;
            let _ = self.queue.complete(item.id).await;
            return;
        };

        match handler.run(&self.ctx, document_id).await {
            Ok(outcome) => self.on_success(&item, document_id, stage, outcome).await,
            Err(error) => self.on_failure(&item, document_id, stage, error).await,
        }
    }

    async fn on_success(&self, item: &crate::types::QueueItem, document_id: Uuid, stage: Stage, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Completed => {
                let _ = self.tracker.complete(document_id, stage).await;
            }
            StageOutcome::CompletedWithWarning { error_kind, message } => {
                let _ = self.tracker.complete(document_id, stage).await;
                let _ = self
                    .tracker
                    .record_error(document_id, stage, &error_kind, message, "warning", 0, 0)
                    .await;
            }
            StageOutcome::Skipped { reason } => {
                tracing::debug!(%reason, "stage skipped");
                let _ = self.tracker.skip(document_id, stage).await;
            }
        }
        let _ = self.queue.complete(item.id).await;
        self.audit.log(audit::stage_completed(&AuditContext::system(), document_id, stage, 0));

        let patch = if stage.is_terminal() {
            DocumentPatch {
                processing_status: Some(ProcessingStatus::Completed),
                current_stage: Some(None),
                ..Default::default()
            }
        } else {
            DocumentPatch {
                current_stage: Some(stage.successor()),
                ..Default::default()
            }
        };
        let _ = self.ctx.storage.update_document(document_id, patch).await;

        if let Some(next) = stage.successor() {
            if let Err(error) = self.queue.enqueue(document_id, next, item.priority).await {
                tracing::warn!(%error, stage = %next, "failed to enqueue successor stage");
            }
        }
    }

    async fn on_failure(&self, item: &crate::types::QueueItem, document_id: Uuid, stage: Stage, error: Error) {
        let will_retry = self.queue.retry_policy().allows_retry(&error) && item.attempts < item.max_attempts;
        let _ = self.tracker.fail(document_id, stage, &error).await;
        let _ = self.queue.fail(item, &error, None).await;
        let severity = if will_retry { "warning" } else { "error" };
        let _ = self
            .tracker
            .record_error(
                document_id,
                stage,
                error.kind_label(),
                error.to_string(),
                severity,
                item.attempts,
                item.max_attempts,
            )
            .await;
        self.audit
            .log(audit::stage_failed(&AuditContext::system(), document_id, stage, error.kind_label(), will_retry));
        if !will_retry {
            let _ = self
                .ctx
                .storage
                .update_document(
                    document_id,
                    DocumentPatch { processing_status: Some(ProcessingStatus::Failed), ..Default::default() },
                )
                .await;
        }
    }
}
