//! Validation and default-value constants shared across extractors, the
//! pattern registry, and the queue.

/// Default minimum confidence an error-code candidate must clear to be kept.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.75;

/// Default cap on accepted error codes per page.
pub const DEFAULT_MAX_CODES_PER_PAGE: usize = 15;

/// Default number of characters of context captured around a match.
pub const DEFAULT_CONTEXT_WINDOW_CHARS: usize = 200;

/// Default window scanned after a match for a solution.
pub const DEFAULT_TEXT_WINDOW_AFTER_CHARS: usize = 2500;

/// Maximum items scanned in a bulleted/numbered solution list before the
/// hard stop, regardless of other stop conditions.
pub const MAX_SOLUTION_LIST_ITEMS: usize = 15;

/// Maximum length of a "Solution:"/"Remedy:" paragraph strategy match.
pub const MAX_SOLUTION_PARAGRAPH_CHARS: usize = 1000;

/// Minimum length a list item must have to count toward the
/// "recommended action" strategy.
pub const MIN_LIST_ITEM_CHARS: usize = 15;

/// Minimum length a continuation line must have to be merged into the
/// preceding list item.
pub const MIN_CONTINUATION_CHARS: usize = 20;

/// Target chunk size in characters for the chunk extractor.
pub const DEFAULT_CHUNK_TARGET_CHARS: usize = 2000;

/// Overlap in characters between adjacent chunks.
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 200;

/// Minimum delay between requests to a single enrichment provider.
pub const DEFAULT_ENRICHMENT_RATE_LIMIT_MS: u64 = 500;

/// Default number of worker tasks in the stage runner's pool.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default backpressure watermark for pending queue items.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// Default polling interval for idle workers.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default lease time-to-live, in seconds.
pub const DEFAULT_LEASE_TTL_SECS: u64 = 300;

/// Default retry policy attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default retry backoff base in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default retry backoff multiplier.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

/// Default retry jitter in milliseconds.
pub const DEFAULT_JITTER_MS: u64 = 250;
