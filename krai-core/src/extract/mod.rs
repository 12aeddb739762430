//! Extractors (spec §4.2): deterministic, near-pure transformers — one per
//! pipeline stage. Each takes a typed input (document + page text/images +
//! context) and returns typed outputs plus [`ExtractorMetrics`]. None of
//! them write to storage directly; the stage runner persists their output
//! in a single transaction per entity family (spec §4.3).
//!
//! External collaborators (PDF parsing, OCR, web/video metadata, real
//! embedding models) are expressed as narrow traits injected by the
//! caller, per spec §1's "accessed through narrow interfaces" framing.
//! `krai-core` ships a deterministic in-memory implementation of each for
//! tests and offline development; `krai-cli` wires real ones.

pub mod chunk;
pub mod classification;
pub mod embedding;
pub mod enrichment;
pub mod error_code;
pub mod image;
pub mod metadata;
pub mod text;

use std::time::Duration;

/// Metrics every extractor reports alongside its typed output, per spec
/// §4.2's common contract.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ExtractorMetrics {
    pub items_emitted: usize,
    pub items_rejected: usize,
    pub confidence_distribution: Vec<f32>,
    pub duration_ms: u64,
}

impl ExtractorMetrics {
    #[must_use]
    pub fn from_duration(items_emitted: usize, items_rejected: usize, duration: Duration) -> Self {
        Self {
            items_emitted,
            items_rejected,
            confidence_distribution: Vec::new(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

pub use chunk::ChunkExtractor;
pub use classification::ClassificationExtractor;
pub use embedding::EmbeddingExtractor;
pub use enrichment::{EnrichmentExtractor, HttpMetadataProvider, MetadataProvider, ProviderKind};
pub use error_code::ErrorCodeExtractor;
pub use image::{ImageBackend, ImageExtractor, OcrProvider};
pub use metadata::{ProductCandidate, ProductResolver};
pub use text::{PdfTextBackend, TextExtractionOutput, TextExtractor};
