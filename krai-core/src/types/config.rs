//! Configuration value types for the pattern registry's extraction rules
//! and the processing queue's retry policy. Wiring these from TOML/env is
//! `krai-cli`'s job; these structs are the validated, in-memory shape.

use super::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_FACTOR, DEFAULT_CONTEXT_WINDOW_CHARS,
    DEFAULT_JITTER_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CODES_PER_PAGE, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_TEXT_WINDOW_AFTER_CHARS,
};
use serde::{Deserialize, Serialize};

/// Numeric tuning knobs for the error-code extractor, carried in the
/// manufacturer pattern file under `extraction_rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExtractionRules {
    pub min_confidence: f32,
    pub max_codes_per_page: usize,
    pub context_window_chars: usize,
    pub text_window_after_chars: usize,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_codes_per_page: DEFAULT_MAX_CODES_PER_PAGE,
            context_window_chars: DEFAULT_CONTEXT_WINDOW_CHARS,
            text_window_after_chars: DEFAULT_TEXT_WINDOW_AFTER_CHARS,
        }
    }
}

/// Retry policy governing queue item backoff and eventual failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_factor: u32,
    pub jitter_ms: u64,
    /// Error kind labels (see `Error::kind_label`) this policy will retry.
    /// Empty means "use the error's own `is_recoverable()` classification".
    pub retryable_kinds: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            jitter_ms: DEFAULT_JITTER_MS,
            retryable_kinds: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// `backoff_base_ms * backoff_factor^(attempt-1)`, jittered by up to
    /// `jitter_ms` in either direction, floored at zero. Mirrors the
    /// teacher's `RetryPolicy::calculate_delay`, generalized from a
    /// per-call loop to a per-item backoff schedule.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let exp = self
            .backoff_factor
            .saturating_pow(attempt.saturating_sub(1));
        let base = self.backoff_base_ms.saturating_mul(u64::from(exp));
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            let range = i64::try_from(self.jitter_ms).unwrap_or(i64::MAX);
            (rand::random::<f64>() - 0.5) as i64 * 2 * range / 1000
        };
        let millis = i64::try_from(base)
            .unwrap_or(i64::MAX)
            .saturating_add(jitter)
            .max(0);
        std::time::Duration::from_millis(millis as u64)
    }

    /// Whether a given error kind label should be retried under this
    /// policy. Falls back to the error's intrinsic `is_recoverable()` when
    /// `retryable_kinds` is empty.
    #[must_use]
    pub fn allows_retry(&self, error: &crate::error::Error) -> bool {
        if self.retryable_kinds.is_empty() {
            error.is_recoverable()
        } else {
            self.retryable_kinds
                .iter()
                .any(|k| k == error.kind_label())
        }
    }
}

/// Backpressure and worker-pool sizing for the processing queue, generalized
/// from the teacher's `QueueConfig` (flat FIFO + fixed worker count) to
/// carry a priority-queue watermark and lease TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub worker_count: usize,
    pub max_queue_size: usize,
    pub poll_interval_ms: u64,
    pub lease_ttl_secs: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: super::constants::DEFAULT_WORKER_COUNT,
            max_queue_size: super::constants::DEFAULT_MAX_QUEUE_SIZE,
            poll_interval_ms: super::constants::DEFAULT_POLL_INTERVAL_MS,
            lease_ttl_secs: super::constants::DEFAULT_LEASE_TTL_SECS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Default enrichment-provider rate limit and embedding dimension/model
/// expectations, the remaining "recognized configuration keys" from
/// spec.md §6 not already covered by [`QueueConfig`]/[`ExtractionRules`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub embedding_model_name: String,
    pub embedding_dimension: usize,
    pub enrichment_rate_limit_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_model_name: "krai-default-embed-v1".to_string(),
            embedding_dimension: 384,
            enrichment_rate_limit_ms: super::constants::DEFAULT_ENRICHMENT_RATE_LIMIT_MS,
        }
    }
}
