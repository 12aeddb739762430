#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # KRAI Core
//!
//! Stage-based ingestion and enrichment engine for technical manuals:
//! manufacturer pattern registry, per-stage extractors, storage/blob
//! contracts, a durable processing queue, the stage runner worker pool,
//! and the document processor orchestrator that ties them together.
//!
//! ## Module Organization
//!
//! - [`orchestrator`]: `ingest`/`reprocess_stage`/`reprocess_document`/
//!   `get_status` — the engine's public entry point.
//! - [`runner`]: the worker pool that leases queue items and dispatches
//!   them to per-stage handlers.
//! - [`extract`]: the deterministic extractor for each stage.
//! - [`pattern`]: the manufacturer error-code pattern registry.
//! - [`queue`]: the durable, lease-based processing queue.
//! - [`stage`]: the per-(document, stage) state machine.
//! - [`storage`]: the relational and blob storage contracts, plus
//!   in-memory implementations for tests.
//! - [`embeddings`]: the embedding provider contract and service.
//! - [`types`]: the shared entity and configuration types.
//! - [`error`]: the crate-wide error taxonomy.
//! - [`retry`]: generic retry-with-backoff execution helpers.
//! - [`telemetry`]: counters, gauges, and histograms for engine metrics.
//! - [`tracing`]: correlation ids and tracing subscriber setup.
//! - [`security`]: audit logging of ingest/reprocess/stage events.
//!
//! ## Quick Start
//!
//! ```no_run
//! use krai_core::orchestrator::{DocumentProcessor, IngestOptions};
//! use krai_core::queue::ProcessingQueue;
//! use krai_core::stage::StageTracker;
//! use krai_core::storage::{InMemoryBlobStore, InMemoryStorageBackend, StorageBackend, BlobStore};
//! use krai_core::security::audit::AuditLogger;
//! use krai_core::types::{DocumentType, QueueConfig};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
//! let blob_store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
//! let queue = ProcessingQueue::new(Arc::clone(&storage), QueueConfig::default());
//! let tracker = StageTracker::new(Arc::clone(&storage));
//! let processor = DocumentProcessor::new(storage, blob_store, queue, tracker, AuditLogger::disabled());
//!
//! let outcome = processor
//!     .ingest(b"%PDF-1.4 ...".to_vec(), "manual.pdf".to_string(), DocumentType::ServiceManual, IngestOptions::default())
//!     .await?;
//! println!("ingested {} as {:?}", outcome.document_id, outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod embeddings;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod pattern;
pub mod queue;
pub mod retry;
pub mod runner;
pub mod security;
pub mod stage;
pub mod storage;
pub mod telemetry;
pub mod tracing;
pub mod types;

pub use error::{Error, Result};
pub use orchestrator::{DocumentProcessor, IngestOptions, IngestOutcome};
pub use runner::{HandlerTable, RunnerContext, StageRunner};
