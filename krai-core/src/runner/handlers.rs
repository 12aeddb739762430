//! Concrete [`StageHandler`] implementations, one per pipeline stage.
//!
//! None of the extractors in [`crate::extract`] read page text, images, or
//! classification hints from shared state — there is no intermediate
//! storage table for a pipeline artifact that only lives between two
//! stages. Every handler that needs upstream output re-derives it from the
//! original blob through the same deterministic extractor the upstream
//! stage used. This keeps each stage independently retryable: a failed
//! `error_code_extraction` rerun never depends on `text_extraction`'s
//! in-memory state having survived a worker restart.

use super::{RunnerContext, StageHandler, StageOutcome};
use crate::error::{Error, Result};
use crate::extract::{
    ChunkExtractor, ClassificationExtractor, EmbeddingExtractor, EnrichmentExtractor,
    ErrorCodeExtractor, ImageExtractor, ProductResolver, TextExtractor,
};
use crate::extract::embedding::EmbeddingCandidate;
use crate::extract::error_code::ErrorCodeExtractionOutcome;
use crate::storage::{BlobKey, DocumentPatch};
use crate::types::{
    Chunk, Document, ErrorCode, Image, OwnerKind, Product, Stage,
};
use async_trait::async_trait;
use uuid::Uuid;

async fn load_document(ctx: &RunnerContext, document_id: Uuid) -> Result<Document> {
    ctx.storage
        .get_document(document_id)
        .await?
        .ok_or(Error::DocumentMissing { document_id })
}

async fn load_blob(ctx: &RunnerContext, document: &Document) -> Result<Vec<u8>> {
    let key = BlobKey::original(&document.file_hash, &document.filename);
    ctx.blob_store.get(&key).await
}

/// Re-runs the text extractor against the original blob. Every stage past
/// `text_extraction` that needs page text calls this rather than reading a
/// cached copy (see module docs).
async fn load_pages(ctx: &RunnerContext, document: &Document) -> Result<Vec<(u32, String)>> {
    let blob = load_blob(ctx, document).await?;
    let extractor = TextExtractor::new(ctx.pdf_backend.clone());
    let (output, _) = extractor.extract(&blob).await?;
    Ok(output.pages)
}

/// Lowercase, underscore-joined form of a manufacturer's display name,
/// matching the `[manufacturer_key]` tables in the pattern file (spec
/// §4.1) — e.g. `"Konica Minolta"` -> `"konica_minolta"`.
fn pattern_key_for(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Verifies the original blob is present. Upload itself completes
/// synchronously inside [`crate::orchestrator::DocumentProcessor::ingest`];
/// this handler only exists so `reprocess_document` — which resets every
/// stage including `upload` — has something uniform to dispatch to.
pub struct UploadHandler;

#[async_trait]
impl StageHandler for UploadHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;
        let key = BlobKey::original(&document.file_hash, &document.filename);
        if ctx.blob_store.exists(&key).await? {
            Ok(StageOutcome::Completed)
        } else {
            Err(Error::CorruptBlob {
                bucket: key.bucket,
                key: key.key,
                reason: "original blob missing".to_string(),
            })
        }
    }
}

pub struct TextExtractionHandler;

#[async_trait]
impl StageHandler for TextExtractionHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;
        let blob = load_blob(ctx, &document).await?;
        let extractor = TextExtractor::new(ctx.pdf_backend.clone());
        let (output, _) = extractor.extract(&blob).await?;
        ctx.storage
            .update_document(
                document_id,
                DocumentPatch {
                    language: output.language,
                    page_count: Some(output.page_count),
                    ..Default::default()
                },
            )
            .await?;
        Ok(StageOutcome::Completed)
    }
}

pub struct ImageProcessingHandler;

#[async_trait]
impl StageHandler for ImageProcessingHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;
        let blob = load_blob(ctx, &document).await?;
        let page_count = document.page_count.unwrap_or(0);
        let page_numbers: Vec<u32> = (1..=page_count).collect();

        let extractor = ImageExtractor::new(ctx.image_backend.as_ref(), ctx.ocr_provider.as_deref());
        let (extracted, _) = extractor.extract(document_id, &blob, &page_numbers).await?;

        let mut images = Vec::with_capacity(extracted.len());
        for (extracted_image, bytes) in extracted {
            let key = BlobKey::new(extracted_image.blob_bucket.clone(), extracted_image.blob_key.clone());
            ctx.blob_store.put(&key, bytes).await?;
            images.push(Image {
                id: Uuid::new_v4(),
                document_id,
                page_number: extracted_image.page_number,
                image_type: extracted_image.image_type,
                blob_bucket: extracted_image.blob_bucket,
                blob_key: extracted_image.blob_key,
                context_text: extracted_image.context_text,
                ocr_text: extracted_image.ocr_text,
            });
        }
        ctx.storage.upsert_images(images).await?;
        Ok(StageOutcome::Completed)
    }
}

pub struct ClassificationHandler;

#[async_trait]
impl StageHandler for ClassificationHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;
        let pages = load_pages(ctx, &document).await?;
        let extractor = ClassificationExtractor::new();
        let (output, _) = extractor.classify(&document.filename, &pages, document.language.clone());

        if output.low_confidence_warning {
            Ok(StageOutcome::CompletedWithWarning {
                error_kind: "LowConfidenceWarning".to_string(),
                message: format!(
                    "classification confidence {:.2} for {:?} is below threshold",
                    output.confidence, output.document_type
                ),
            })
        } else {
            Ok(StageOutcome::Completed)
        }
    }
}

pub struct MetadataExtractionHandler;

#[async_trait]
impl StageHandler for MetadataExtractionHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;
        let pages = load_pages(ctx, &document).await?;

        let (classification, _) =
            ClassificationExtractor::new().classify(&document.filename, &pages, document.language.clone());
        let (candidates, _) = ProductResolver::new().resolve(&pages, classification.manufacturer_hint.as_deref());

        let mut manufacturer_id = None;
        for candidate in &candidates {
            let pattern_key = pattern_key_for(&candidate.manufacturer_name);
            let manufacturer = ctx
                .storage
                .ensure_manufacturer(&candidate.manufacturer_name, &pattern_key)
                .await?;
            manufacturer_id = Some(manufacturer.id);
            ctx.storage
                .upsert_product(Product {
                    id: Uuid::new_v4(),
                    manufacturer_id: manufacturer.id,
                    model_number: candidate.model_number.clone(),
                    series_id: None,
                    product_type: document.document_type.as_str().to_string(),
                    specifications: serde_json::json!({}),
                    oem_manufacturer_id: None,
                })
                .await?;
        }

        if manufacturer_id.is_none() {
            if let Some(hint) = classification.manufacturer_hint.as_deref() {
                let pattern_key = pattern_key_for(hint);
                let manufacturer = ctx.storage.ensure_manufacturer(hint, &pattern_key).await?;
                manufacturer_id = Some(manufacturer.id);
            }
        }

        if let Some(manufacturer_id) = manufacturer_id {
            ctx.storage
                .update_document(document_id, DocumentPatch { manufacturer_id: Some(manufacturer_id), ..Default::default() })
                .await?;
        }
        Ok(StageOutcome::Completed)
    }
}

pub struct ErrorCodeExtractionHandler;

#[async_trait]
impl StageHandler for ErrorCodeExtractionHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;

        let manufacturer_key = match document.manufacturer_id {
            Some(id) => ctx.storage.get_manufacturer(id).await?.map(|m| m.pattern_key),
            None => None,
        };

        let pages = load_pages(ctx, &document).await?;
        let extractor = ErrorCodeExtractor::new(&ctx.patterns);
        let (outcome, _) = extractor.extract(&pages, manufacturer_key.as_deref())?;

        match outcome {
            ErrorCodeExtractionOutcome::SkippedNoManufacturer => {
                Ok(StageOutcome::Skipped { reason: "no_manufacturer".to_string() })
            }
            ErrorCodeExtractionOutcome::Extracted(codes) => {
                let Some(manufacturer_id) = document.manufacturer_id else {
                    return Err(Error::ManufacturerMissing { document_id, stage: Stage::ErrorCodeExtraction });
                };
                let records: Vec<ErrorCode> = codes
                    .into_iter()
                    .map(|code| ErrorCode {
                        id: Uuid::new_v4(),
                        document_id,
                        manufacturer_id,
                        product_id: None,
                        chunk_id: None,
                        error_code: code.error_code,
                        error_description: code.error_description,
                        solution_text: code.solution_text,
                        page_number: code.page_number,
                        confidence_score: code.confidence_score,
                        severity_level: code.severity_hint,
                        requires_technician: None,
                        requires_parts: None,
                        context_text: Some(code.context_text),
                        metadata: serde_json::json!({ "category": code.category }),
                    })
                    .collect();
                ctx.storage.batch_insert_error_codes(records).await?;
                Ok(StageOutcome::Completed)
            }
        }
    }
}

pub struct ChunkPrepHandler;

#[async_trait]
impl StageHandler for ChunkPrepHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;
        let pages = load_pages(ctx, &document).await?;

        let extractor = ChunkExtractor::new();
        let (prepared, _) = extractor.extract(&pages);
        let chunks: Vec<Chunk> = prepared
            .into_iter()
            .map(|p| Chunk {
                id: p.id,
                document_id,
                ordinal: p.ordinal,
                page_number: p.page_number,
                section_hierarchy: p.section_hierarchy,
                section_level: p.section_level,
                text: p.text,
                previous_chunk_id: p.previous_chunk_id,
                next_chunk_id: p.next_chunk_id,
            })
            .collect();
        ctx.storage.upsert_chunks(document_id, chunks.clone()).await?;

        // Back-fill error_code.chunk_id now that chunks exist (spec §4.2.5
        // "chunk linkage (deferred)"); matches on page number, first chunk wins.
        let error_codes = ctx.storage.list_error_codes(document_id).await?;
        for error_code in error_codes {
            if error_code.chunk_id.is_some() {
                continue;
            }
            if let Some(chunk) = chunks.iter().find(|c| c.page_number == error_code.page_number) {
                ctx.storage.set_error_code_chunk(error_code.id, chunk.id).await?;
            }
        }
        Ok(StageOutcome::Completed)
    }
}

pub struct EnrichmentHandler;

#[async_trait]
impl StageHandler for EnrichmentHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let document = load_document(ctx, document_id).await?;
        let pages = load_pages(ctx, &document).await?;

        let extractor = EnrichmentExtractor::new(ctx.metadata_provider.clone())
            .with_rate_limit(std::time::Duration::from_millis(ctx.engine_config.enrichment_rate_limit_ms));
        let (links, videos, _) = extractor.extract(document_id, &pages).await?;
        ctx.storage.upsert_links(links).await?;
        ctx.storage.upsert_videos(videos).await?;
        Ok(StageOutcome::Completed)
    }
}

pub struct EmbeddingHandler;

#[async_trait]
impl StageHandler for EmbeddingHandler {
    async fn run(&self, ctx: &RunnerContext, document_id: Uuid) -> Result<StageOutcome> {
        let model_name = ctx.embedding_service.model_name().to_string();
        let embedded_chunks = ctx
            .storage
            .embedded_owner_ids(OwnerKind::Chunk, &model_name)
            .await?;
        let embedded_images = ctx
            .storage
            .embedded_owner_ids(OwnerKind::Image, &model_name)
            .await?;

        let mut candidates = Vec::new();
        for chunk in ctx.storage.list_chunks(document_id).await? {
            candidates.push(EmbeddingCandidate {
                owner_kind: OwnerKind::Chunk,
                owner_id: chunk.id,
                text: chunk.text,
                existing_model_names: if embedded_chunks.contains(&chunk.id) {
                    vec![model_name.clone()]
                } else {
                    Vec::new()
                },
            });
        }
        for image in ctx.storage.list_images(document_id).await? {
            let text = match (&image.ocr_text, &image.context_text) {
                (Some(ocr), Some(context)) => format!("{context}\n{ocr}"),
                (Some(ocr), None) => ocr.clone(),
                (None, Some(context)) => context.clone(),
                (None, None) => continue,
            };
            candidates.push(EmbeddingCandidate {
                owner_kind: OwnerKind::Image,
                owner_id: image.id,
                text,
                existing_model_names: if embedded_images.contains(&image.id) {
                    vec![model_name.clone()]
                } else {
                    Vec::new()
                },
            });
        }

        let extractor = EmbeddingExtractor::new(ctx.embedding_service.as_ref());
        let (embeddings, _) = extractor.extract(&candidates).await?;
        if !embeddings.is_empty() {
            ctx.storage.upsert_embeddings(embeddings).await?;
        }
        Ok(StageOutcome::Completed)
    }
}

/// The terminal stage. There is no separate search index to build — chunk
/// and image embeddings are searchable the moment `embedding` upserts them
/// through [`crate::storage::StorageBackend::search_embeddings`] — so this
/// handler only marks the pipeline complete.
pub struct SearchIndexingHandler;

#[async_trait]
impl StageHandler for SearchIndexingHandler {
    async fn run(&self, _ctx: &RunnerContext, _document_id: Uuid) -> Result<StageOutcome> {
        Ok(StageOutcome::Completed)
    }
}
