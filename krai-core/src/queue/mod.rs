//! Processing Queue (spec §4.4): a durable FIFO-with-priority of
//! `(document_id, stage)` work items with lease semantics, backed by
//! [`StorageBackend`]. Idempotency — at most one `pending`/`leased` item
//! per `(document_id, stage)` — and lease reclamation are enforced at the
//! storage layer; this module is the typed, policy-aware façade over it.

use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use crate::telemetry::Telemetry;
use crate::types::{QueueConfig, QueueItem, QueueItemStatus, RetryPolicy, Stage};
use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

/// A leased unit of work, returned by [`ProcessingQueue::lease`].
#[derive(Debug, Clone)]
pub struct LeasedItem {
    pub item: QueueItem,
}

/// Typed façade over the durable queue. Cheap to clone (holds only
/// `Arc`s); the stage runner holds one instance per worker pool.
#[derive(Clone)]
pub struct ProcessingQueue {
    storage: Arc<dyn StorageBackend>,
    config: QueueConfig,
    telemetry: Telemetry,
}

impl ProcessingQueue {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, config: QueueConfig) -> Self {
        Self { storage, config, telemetry: Telemetry::new() }
    }

    /// Counters (`queue_enqueued`, `queue_leased`, `queue_completed`,
    /// `queue_retried`, `queue_failed`) and a `queue_pending` gauge for
    /// this queue instance. The stage runner's idle poll ticks log a
    /// snapshot of these through [`crate::telemetry::Telemetry::log_metrics`].
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Enqueue `(document_id, stage)` at `priority`. Idempotent: if an
    /// item for the same key is already `pending` or `leased`, returns its
    /// id instead of creating a duplicate (spec §8 invariant 3). Rejects
    /// new work once `count_pending_queue_items` reaches
    /// `config.max_queue_size` with a retryable [`Error::QueueSaturated`].
    pub async fn enqueue(&self, document_id: Uuid, stage: Stage, priority: i32) -> Result<Uuid> {
        let pending = self.storage.count_pending_queue_items().await?;
        if pending >= self.config.max_queue_size {
            return Err(Error::QueueSaturated {
                pending,
                watermark: self.config.max_queue_size,
            });
        }
        let item = QueueItem::new(document_id, stage, priority, self.config.retry_policy.max_attempts);
        let id = self.storage.enqueue(item).await?;
        self.telemetry.counter("queue_enqueued").increment();
        let pending_now = self.storage.count_pending_queue_items().await?;
        self.telemetry.gauge("queue_pending").set(pending_now as f64);
        Ok(id)
    }

    /// Reclaim any expired leases, then lease the highest-priority
    /// pending item among `stages_filter` (all stages if empty).
    pub async fn lease(&self, worker_id: &str, stages_filter: &[Stage]) -> Result<Option<LeasedItem>> {
        self.storage.reclaim_expired_leases(chrono::Utc::now()).await?;
        let ttl = Duration::seconds(i64::try_from(self.config.lease_ttl_secs).unwrap_or(i64::MAX));
        let leased = self.storage.lease_next(worker_id, stages_filter, ttl).await?;
        if leased.is_some() {
            self.telemetry.counter("queue_leased").increment();
        }
        Ok(leased.map(|item| LeasedItem { item }))
    }

    pub async fn extend_lease(&self, item_id: Uuid) -> Result<()> {
        let ttl = Duration::seconds(i64::try_from(self.config.lease_ttl_secs).unwrap_or(i64::MAX));
        self.storage.extend_lease(item_id, ttl).await
    }

    pub async fn complete(&self, item_id: Uuid) -> Result<()> {
        self.storage.complete_queue_item(item_id).await?;
        self.telemetry.counter("queue_completed").increment();
        Ok(())
    }

    /// Fail a leased item against `policy` (falling back to
    /// `config.retry_policy` if `None`): if `error` is retryable and
    /// `attempts < max_attempts`, the item moves to `retrying` with a
    /// `lease_deadline` set to `policy.delay_for_attempt(item.attempts)`
    /// from now — `lease_next` picks it back up once that backoff
    /// elapses; otherwise it moves to `failed`.
    pub async fn fail(&self, item: &QueueItem, error: &Error, policy: Option<&RetryPolicy>) -> Result<()> {
        let policy = policy.unwrap_or(&self.config.retry_policy);
        let (status, retry_not_before) = if policy.allows_retry(error) && item.attempts < item.max_attempts {
            let delay = policy.delay_for_attempt(item.attempts);
            let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
            (QueueItemStatus::Retrying, Some(chrono::Utc::now() + delay))
        } else {
            (QueueItemStatus::Failed, None)
        };
        self.storage
            .fail_queue_item(item.id, &error.to_string(), status, retry_not_before)
            .await?;
        let counter_name = if status == QueueItemStatus::Retrying { "queue_retried" } else { "queue_failed" };
        self.telemetry.counter(counter_name).increment();
        Ok(())
    }

    pub async fn find_active(&self, document_id: Uuid, stage: Stage) -> Result<Option<QueueItem>> {
        self.storage.find_active_queue_item(document_id, stage).await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.storage.count_pending_queue_items().await
    }

    /// The policy `fail` falls back to when no override is passed. Exposed
    /// so callers that need to predict the retry-vs-failed outcome ahead of
    /// calling `fail` (the stage runner, to decide whether to also record a
    /// [`crate::types::PipelineError`]) don't have to duplicate it.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorageBackend;

    fn queue() -> ProcessingQueue {
        ProcessingQueue::new(Arc::new(InMemoryStorageBackend::new()), QueueConfig::default())
    }

    #[tokio::test]
    async fn enqueue_then_lease_round_trip() {
        let queue = queue();
        let document_id = Uuid::new_v4();
        queue.enqueue(document_id, Stage::TextExtraction, 0).await.unwrap();
        let leased = queue.lease("worker-1", &[]).await.unwrap().unwrap();
        assert_eq!(leased.item.document_id, document_id);
        assert_eq!(leased.item.attempts, 1);
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_for_same_document_and_stage() {
        let queue = queue();
        let document_id = Uuid::new_v4();
        let first = queue.enqueue(document_id, Stage::TextExtraction, 0).await.unwrap();
        let second = queue.enqueue(document_id, Stage::TextExtraction, 1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queue_saturation_is_rejected() {
        let mut config = QueueConfig::default();
        config.max_queue_size = 1;
        let queue = ProcessingQueue::new(Arc::new(InMemoryStorageBackend::new()), config);
        queue.enqueue(Uuid::new_v4(), Stage::TextExtraction, 0).await.unwrap();
        let err = queue
            .enqueue(Uuid::new_v4(), Stage::TextExtraction, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QueueSaturated { .. }));
    }

    #[tokio::test]
    async fn transient_failure_under_max_attempts_retries() {
        let mut config = QueueConfig::default();
        config.retry_policy.backoff_base_ms = 0;
        config.retry_policy.jitter_ms = 0;
        let storage = Arc::new(InMemoryStorageBackend::new());
        let queue = ProcessingQueue::new(storage, config);
        let document_id = Uuid::new_v4();
        queue.enqueue(document_id, Stage::TextExtraction, 0).await.unwrap();
        let leased = queue.lease("worker-1", &[]).await.unwrap().unwrap();
        assert_eq!(leased.item.attempts, 1);

        let error = Error::ExternalServiceTimeout {
            service: "ocr".to_string(),
        };
        queue.fail(&leased.item, &error, None).await.unwrap();

        let retried = queue
            .lease("worker-2", &[])
            .await
            .unwrap()
            .expect("a retrying item with an elapsed backoff must be leasable again");
        assert_eq!(retried.item.id, leased.item.id);
        assert_eq!(retried.item.attempts, 2);
    }

    #[tokio::test]
    async fn telemetry_counters_track_the_queue_lifecycle() {
        let queue = queue();
        let document_id = Uuid::new_v4();
        queue.enqueue(document_id, Stage::TextExtraction, 0).await.unwrap();
        let leased = queue.lease("worker-1", &[]).await.unwrap().unwrap();
        queue.complete(leased.item.id).await.unwrap();

        // Counter increments happen on spawned tasks; give them a turn to land.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let summary = queue.telemetry().get_summary().await;
        assert_eq!(summary.counters.get("queue_enqueued").copied(), Some(1));
        assert_eq!(summary.counters.get("queue_leased").copied(), Some(1));
        assert_eq!(summary.counters.get("queue_completed").copied(), Some(1));
    }
}
