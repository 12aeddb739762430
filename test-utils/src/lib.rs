//! # Test Utilities
//!
//! Shared fixtures for `krai-core` and adapter crate tests: sample
//! documents, manufacturers, chunks, error codes, and a manufacturer
//! pattern file, plus a small end-to-end wiring helper over the
//! in-memory [`krai_core::storage`] implementations.

use chrono::Utc;
use krai_core::error::Result;
use krai_core::orchestrator::DocumentProcessor;
use krai_core::pattern::PatternRegistry;
use krai_core::queue::ProcessingQueue;
use krai_core::security::audit::AuditLogger;
use krai_core::stage::StageTracker;
use krai_core::storage::{BlobStore, InMemoryBlobStore, InMemoryStorageBackend, StorageBackend};
use krai_core::types::{
    Chunk, Document, DocumentType, ErrorCode, Manufacturer, QueueConfig, Stage,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// A document with a deterministic hash derived from `filename`, so
/// repeated calls with the same name collide the way re-uploading the
/// same file would.
#[must_use]
pub fn sample_document(filename: &str, document_type: DocumentType) -> Document {
    Document::new(
        filename.to_string(),
        format!("sha256:{:x}", md5ish(filename)),
        1024,
        document_type,
    )
}

/// A cheap, dependency-free stand-in for a content hash — good enough to
/// get distinct, stable `file_hash` values across fixture documents
/// without pulling `sha2` into `test-utils` for test data only.
fn md5ish(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ u64::from(b)).wrapping_mul(0x100000001b3)
    })
}

#[must_use]
pub fn sample_manufacturer(name: &str) -> Manufacturer {
    Manufacturer::new(name.to_string(), Manufacturer::normalize(name))
}

/// `count` chunks for `document_id`, linked in reading order.
#[must_use]
pub fn sample_chunks(document_id: Uuid, count: u32) -> Vec<Chunk> {
    let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
    (0..count)
        .map(|i| Chunk {
            id: ids[i as usize],
            document_id,
            ordinal: i,
            page_number: i + 1,
            section_hierarchy: vec!["Chapter 1".to_string()],
            section_level: 1,
            text: format!("Sample chunk text for ordinal {i}."),
            previous_chunk_id: i.checked_sub(1).map(|p| ids[p as usize]),
            next_chunk_id: ids.get(i as usize + 1).copied(),
        })
        .collect()
}

#[must_use]
pub fn sample_error_code(
    document_id: Uuid,
    manufacturer_id: Uuid,
    code: &str,
    confidence: f32,
) -> ErrorCode {
    ErrorCode {
        id: Uuid::new_v4(),
        document_id,
        manufacturer_id,
        product_id: None,
        chunk_id: None,
        error_code: code.to_string(),
        error_description: Some(format!("{code} fault condition")),
        solution_text: Some("Replace the fuser unit and power-cycle the device.".to_string()),
        page_number: 12,
        confidence_score: confidence,
        severity_level: Some("high".to_string()),
        requires_technician: Some(true),
        requires_parts: Some(true),
        context_text: Some(format!("Error {code} occurred during startup self-test.")),
        metadata: json!({}),
    }
}

/// A minimal, valid pattern-file TOML fixture for one manufacturer,
/// matching the schema in `krai_core::pattern::file`.
#[must_use]
pub fn sample_pattern_toml(manufacturer_key: &str) -> String {
    format!(
        r#"[{manufacturer_key}]
validation_regex = "^[A-Z]\\d{{3}}$"

[[{manufacturer_key}.patterns]]
regex = "[A-Z]\\d{{3}}"
category = "fault"
severity_hint = "high"
"#
    )
}

/// Wires an [`InMemoryStorageBackend`] and [`InMemoryBlobStore`] into a
/// full [`DocumentProcessor`], the same way `krai-cli`'s `initialize_engine`
/// wires the durable adapters, for tests that want the whole stack without
/// a real database or blob file.
#[must_use]
pub fn in_memory_processor() -> DocumentProcessor {
    let storage: Arc<dyn StorageBackend> = Arc::new(InMemoryStorageBackend::new());
    let blob_store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let queue = ProcessingQueue::new(Arc::clone(&storage), QueueConfig::default());
    let tracker = StageTracker::new(Arc::clone(&storage));
    DocumentProcessor::new(storage, blob_store, queue, tracker, AuditLogger::disabled())
}

/// An empty pattern registry, for tests that exercise the
/// `ManufacturerPatternNotFound` failure path.
#[must_use]
pub fn empty_pattern_registry() -> PatternRegistry {
    PatternRegistry::empty()
}

/// A pattern registry pre-loaded with one manufacturer via
/// [`sample_pattern_toml`].
pub fn pattern_registry_with(manufacturer_key: &str) -> Result<PatternRegistry> {
    let toml = sample_pattern_toml(manufacturer_key);
    PatternRegistry::load_from_str(&toml)
}

#[must_use]
pub fn utc_now_minus_seconds(secs: i64) -> chrono::DateTime<Utc> {
    Utc::now() - chrono::Duration::seconds(secs)
}

/// Every [`Stage`] in pipeline order, for tests that iterate the full
/// stage set without hardcoding the variant list.
#[must_use]
pub fn all_stages() -> [Stage; 10] {
    Stage::ALL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_document_hash_is_deterministic() {
        let a = sample_document("manual.pdf", DocumentType::ServiceManual);
        let b = sample_document("manual.pdf", DocumentType::ServiceManual);
        assert_eq!(a.file_hash, b.file_hash);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn sample_chunks_are_linked_in_order() {
        let document_id = Uuid::new_v4();
        let chunks = sample_chunks(document_id, 3);
        assert_eq!(chunks[0].previous_chunk_id, None);
        assert_eq!(chunks[0].next_chunk_id, Some(chunks[1].id));
        assert_eq!(chunks[2].next_chunk_id, None);
    }

    #[tokio::test]
    async fn in_memory_processor_ingests_a_document() {
        let processor = in_memory_processor();
        let outcome = processor
            .ingest(
                b"%PDF-1.4 fake".to_vec(),
                "manual.pdf".to_string(),
                DocumentType::ServiceManual,
                krai_core::orchestrator::IngestOptions::default(),
            )
            .await
            .unwrap();
        let progress = processor.get_status(outcome.document_id).await.unwrap();
        assert_eq!(progress.document_id, outcome.document_id);
    }

    #[test]
    fn sample_pattern_toml_parses() {
        let registry = pattern_registry_with("acme").unwrap();
        assert!(registry.list_manufacturers().contains(&"acme".to_string()));
    }
}
