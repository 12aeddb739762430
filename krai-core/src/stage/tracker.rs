//! Stage Tracker (spec §4.5): the `not_started -> running ->
//! {completed|failed|skipped}` state machine for one `(document, stage)`
//! pair, persisted through [`StorageBackend`]. A thin, typed layer over the
//! storage contract's stage-status methods — it owns no state of its own.

use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use crate::types::{
    DocumentProgress, PipelineError, PipelineErrorStatus, Stage, StageState, StageStatus,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct StageTracker {
    storage: Arc<dyn StorageBackend>,
}

impl StageTracker {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    async fn load(&self, document_id: Uuid, stage: Stage) -> Result<StageStatus> {
        Ok(self
            .storage
            .get_stage_status(document_id, stage)
            .await?
            .unwrap_or_else(|| StageStatus::not_started(document_id, stage)))
    }

    /// Transition to `running`. A retry (previous state `failed`) bumps
    /// `retry_count`; a `reprocess_stage` restart (previous state
    /// `completed`) does not — only genuine failures count as retries.
    pub async fn start(&self, document_id: Uuid, stage: Stage) -> Result<()> {
        let mut status = self.load(document_id, stage).await?;
        if status.state == StageState::Failed {
            status.retry_count += 1;
        }
        status.state = StageState::Running;
        status.started_at = Some(Utc::now());
        status.completed_at = None;
        status.duration_ms = None;
        status.error_kind = None;
        status.error_message = None;
        self.storage.upsert_stage_status(status).await
    }

    pub async fn complete(&self, document_id: Uuid, stage: Stage) -> Result<()> {
        self.finish(document_id, stage, StageState::Completed, None)
            .await
    }

    pub async fn skip(&self, document_id: Uuid, stage: Stage) -> Result<()> {
        self.finish(document_id, stage, StageState::Skipped, None)
            .await
    }

    pub async fn fail(&self, document_id: Uuid, stage: Stage, error: &Error) -> Result<()> {
        self.finish(document_id, stage, StageState::Failed, Some(error))
            .await
    }

    async fn finish(
        &self,
        document_id: Uuid,
        stage: Stage,
        state: StageState,
        error: Option<&Error>,
    ) -> Result<()> {
        let mut status = self.load(document_id, stage).await?;
        let now = Utc::now();
        status.duration_ms = status
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as u64);
        status.state = state;
        status.completed_at = Some(now);
        status.error_kind = error.map(|e| e.kind_label().to_string());
        status.error_message = error.map(ToString::to_string);
        self.storage.upsert_stage_status(status).await
    }

    pub async fn status(&self, document_id: Uuid, stage: Stage) -> Result<Option<StageStatus>> {
        self.storage.get_stage_status(document_id, stage).await
    }

    /// Whether `stage`'s prerequisite (if any) has reached a terminal,
    /// non-failing state. The stage runner refuses to start a stage that
    /// fails this check (spec §5's defensive ordering guarantee) even
    /// though in normal operation it is implied by "only enqueue the
    /// successor after the predecessor completes".
    pub async fn prerequisite_satisfied(&self, document_id: Uuid, stage: Stage) -> Result<bool> {
        match stage.prerequisite() {
            None => Ok(true),
            Some(prerequisite) => {
                let status = self.storage.get_stage_status(document_id, prerequisite).await?;
                Ok(status.is_some_and(|s| s.state.counts_as_complete()))
            }
        }
    }

    pub async fn progress(&self, document_id: Uuid) -> Result<DocumentProgress> {
        let stages = self.storage.list_stage_statuses(document_id).await?;
        let completed_stages = stages.iter().filter(|s| s.state.counts_as_complete()).count();
        Ok(DocumentProgress {
            document_id,
            stages,
            completed_stages,
            total_stages: Stage::ALL.len(),
        })
    }

    /// Reset a document's stage statuses for `reprocess_stage`/
    /// `reprocess_document` (spec §4.6).
    pub async fn reset(&self, document_id: Uuid, from_stage: Option<Stage>) -> Result<()> {
        self.storage.reset_stage_statuses(document_id, from_stage).await
    }

    /// Record an operator-facing [`PipelineError`] for a permanent stage
    /// failure or a non-fatal warning (e.g. classification's
    /// `LowConfidenceWarning`, which never fails the stage itself).
    pub async fn record_error(
        &self,
        document_id: Uuid,
        stage: Stage,
        error_kind: &str,
        error_message: String,
        severity: &str,
        retry_count: u32,
        max_retries: u32,
    ) -> Result<Uuid> {
        self.storage
            .record_pipeline_error(PipelineError {
                id: Uuid::new_v4(),
                document_id,
                stage,
                error_kind: error_kind.to_string(),
                error_message,
                severity: severity.to_string(),
                status: PipelineErrorStatus::Pending,
                retry_count,
                max_retries,
                created_at: Utc::now(),
                resolved_at: None,
                resolved_by: None,
                resolution_notes: None,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorageBackend;

    fn tracker() -> StageTracker {
        StageTracker::new(Arc::new(InMemoryStorageBackend::new()))
    }

    #[tokio::test]
    async fn fresh_stage_has_no_prerequisite_block_for_upload() {
        let tracker = tracker();
        let document_id = Uuid::new_v4();
        assert!(tracker.prerequisite_satisfied(document_id, Stage::Upload).await.unwrap());
        assert!(!tracker
            .prerequisite_satisfied(document_id, Stage::TextExtraction)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn completing_a_stage_satisfies_its_successor() {
        let tracker = tracker();
        let document_id = Uuid::new_v4();
        tracker.start(document_id, Stage::TextExtraction).await.unwrap();
        tracker.complete(document_id, Stage::TextExtraction).await.unwrap();
        assert!(tracker
            .prerequisite_satisfied(document_id, Stage::ImageProcessing)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn retry_after_failure_increments_retry_count() {
        let tracker = tracker();
        let document_id = Uuid::new_v4();
        tracker.start(document_id, Stage::TextExtraction).await.unwrap();
        tracker
            .fail(
                document_id,
                Stage::TextExtraction,
                &Error::TextExtractionFailure("corrupt".into()),
            )
            .await
            .unwrap();
        tracker.start(document_id, Stage::TextExtraction).await.unwrap();
        let status = tracker.status(document_id, Stage::TextExtraction).await.unwrap().unwrap();
        assert_eq!(status.retry_count, 1);
        assert_eq!(status.state, StageState::Running);
    }

    #[tokio::test]
    async fn skipped_counts_as_complete_for_progress() {
        let tracker = tracker();
        let document_id = Uuid::new_v4();
        tracker.start(document_id, Stage::ErrorCodeExtraction).await.unwrap();
        tracker.skip(document_id, Stage::ErrorCodeExtraction).await.unwrap();
        let progress = tracker.progress(document_id).await.unwrap();
        assert_eq!(progress.completed_stages, 1);
        assert_eq!(progress.total_stages, 10);
    }
}
