//! [`StorageBackend`] implementation over libSQL, backed by the DDL in
//! [`crate::schema`]. Row <-> entity conversion lives here; enum columns
//! round-trip through [`crate::enum_sql`], timestamps through
//! millisecond-since-epoch integers, and `Vec<f32>`/`serde_json::Value`
//! through JSON text columns.

use crate::enum_sql::{
    image_type_str, owner_kind_str, parse_image_type, parse_owner_kind, parse_pipeline_error_status,
    parse_processing_status, parse_queue_item_status, parse_stage_state, parse_validation_status,
    pipeline_error_status_str, processing_status_str, queue_item_status_str, stage_state_str,
    validation_status_str,
};
use crate::TursoStorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use krai_core::error::{Error, Result};
use krai_core::storage::backend::{DocumentPatch, EmbeddingMatch, EmbeddingSearchFilter, StorageBackend};
use krai_core::types::{
    Chunk, Document, DocumentType, Embedding, ErrorCode, Image, Link, Manufacturer, OwnerKind,
    PipelineError, Product, ProductSeries, QueueItem, QueueItemStatus, Stage, StageStatus, Video,
};
use libsql::{params, Row};
use uuid::Uuid;

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| Error::Storage(format!("invalid timestamp {ms}")))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Storage(format!("invalid uuid {s:?}: {e}")))
}

fn row_err(field: &str, e: impl std::fmt::Display) -> Error {
    Error::Storage(format!("failed to read column {field}: {e}"))
}

fn document_from_row(row: &Row) -> Result<Document> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let filename: String = row.get(1).map_err(|e| row_err("filename", e))?;
    let file_hash: String = row.get(2).map_err(|e| row_err("file_hash", e))?;
    let file_size: i64 = row.get(3).map_err(|e| row_err("file_size", e))?;
    let document_type: String = row.get(4).map_err(|e| row_err("document_type", e))?;
    let manufacturer_id: Option<String> = row.get(5).map_err(|e| row_err("manufacturer_id", e))?;
    let language: Option<String> = row.get(6).map_err(|e| row_err("language", e))?;
    let page_count: Option<i64> = row.get(7).map_err(|e| row_err("page_count", e))?;
    let processing_status: String = row.get(8).map_err(|e| row_err("processing_status", e))?;
    let current_stage: Option<String> = row.get(9).map_err(|e| row_err("current_stage", e))?;
    let created_at: i64 = row.get(10).map_err(|e| row_err("created_at", e))?;
    let updated_at: i64 = row.get(11).map_err(|e| row_err("updated_at", e))?;
    let uploaded_by: Option<String> = row.get(12).map_err(|e| row_err("uploaded_by", e))?;

    Ok(Document {
        id: parse_uuid(&id)?,
        filename,
        file_hash,
        file_size: file_size as u64,
        document_type: DocumentType::parse(&document_type)
            .ok_or_else(|| Error::Storage(format!("unknown document_type {document_type:?}")))?,
        manufacturer_id: manufacturer_id.map(|s| parse_uuid(&s)).transpose()?,
        language,
        page_count: page_count.map(|p| p as u32),
        processing_status: parse_processing_status(&processing_status)?,
        current_stage: current_stage.map(|s| Stage::parse(&s)).transpose()?.flatten(),
        created_at: from_millis(created_at)?,
        updated_at: from_millis(updated_at)?,
        uploaded_by,
    })
}

fn manufacturer_from_row(row: &Row) -> Result<Manufacturer> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let name: String = row.get(1).map_err(|e| row_err("name", e))?;
    let pattern_key: String = row.get(2).map_err(|e| row_err("pattern_key", e))?;
    let contact_email: Option<String> = row.get(3).map_err(|e| row_err("contact_email", e))?;
    let contact_url: Option<String> = row.get(4).map_err(|e| row_err("contact_url", e))?;
    let created_at: i64 = row.get(5).map_err(|e| row_err("created_at", e))?;
    Ok(Manufacturer {
        id: parse_uuid(&id)?,
        name,
        pattern_key,
        contact_email,
        contact_url,
        created_at: from_millis(created_at)?,
    })
}

fn chunk_from_row(row: &Row) -> Result<Chunk> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let document_id: String = row.get(1).map_err(|e| row_err("document_id", e))?;
    let ordinal: i64 = row.get(2).map_err(|e| row_err("ordinal", e))?;
    let page_number: i64 = row.get(3).map_err(|e| row_err("page_number", e))?;
    let section_hierarchy: String = row.get(4).map_err(|e| row_err("section_hierarchy", e))?;
    let section_level: i64 = row.get(5).map_err(|e| row_err("section_level", e))?;
    let text: String = row.get(6).map_err(|e| row_err("text", e))?;
    let previous_chunk_id: Option<String> = row.get(7).map_err(|e| row_err("previous_chunk_id", e))?;
    let next_chunk_id: Option<String> = row.get(8).map_err(|e| row_err("next_chunk_id", e))?;
    Ok(Chunk {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        ordinal: ordinal as u32,
        page_number: page_number as u32,
        section_hierarchy: serde_json::from_str(&section_hierarchy)?,
        section_level: section_level as u32,
        text,
        previous_chunk_id: previous_chunk_id.map(|s| parse_uuid(&s)).transpose()?,
        next_chunk_id: next_chunk_id.map(|s| parse_uuid(&s)).transpose()?,
    })
}

fn embedding_from_row(row: &Row) -> Result<Embedding> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let owner_kind: String = row.get(1).map_err(|e| row_err("owner_kind", e))?;
    let owner_id: String = row.get(2).map_err(|e| row_err("owner_id", e))?;
    let model_name: String = row.get(3).map_err(|e| row_err("model_name", e))?;
    let dimension: i64 = row.get(4).map_err(|e| row_err("dimension", e))?;
    let vector: String = row.get(5).map_err(|e| row_err("vector", e))?;
    Ok(Embedding {
        id: parse_uuid(&id)?,
        owner_kind: parse_owner_kind(&owner_kind)?,
        owner_id: parse_uuid(&owner_id)?,
        model_name,
        dimension: dimension as usize,
        vector: serde_json::from_str(&vector)?,
    })
}

fn error_code_from_row(row: &Row) -> Result<ErrorCode> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let document_id: String = row.get(1).map_err(|e| row_err("document_id", e))?;
    let manufacturer_id: String = row.get(2).map_err(|e| row_err("manufacturer_id", e))?;
    let product_id: Option<String> = row.get(3).map_err(|e| row_err("product_id", e))?;
    let chunk_id: Option<String> = row.get(4).map_err(|e| row_err("chunk_id", e))?;
    let error_code: String = row.get(5).map_err(|e| row_err("error_code", e))?;
    let error_description: Option<String> = row.get(6).map_err(|e| row_err("error_description", e))?;
    let solution_text: Option<String> = row.get(7).map_err(|e| row_err("solution_text", e))?;
    let page_number: i64 = row.get(8).map_err(|e| row_err("page_number", e))?;
    let confidence_score: f64 = row.get(9).map_err(|e| row_err("confidence_score", e))?;
    let severity_level: Option<String> = row.get(10).map_err(|e| row_err("severity_level", e))?;
    let requires_technician: Option<i64> = row.get(11).map_err(|e| row_err("requires_technician", e))?;
    let requires_parts: Option<i64> = row.get(12).map_err(|e| row_err("requires_parts", e))?;
    let context_text: Option<String> = row.get(13).map_err(|e| row_err("context_text", e))?;
    let metadata: String = row.get(14).map_err(|e| row_err("metadata", e))?;
    Ok(ErrorCode {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        manufacturer_id: parse_uuid(&manufacturer_id)?,
        product_id: product_id.map(|s| parse_uuid(&s)).transpose()?,
        chunk_id: chunk_id.map(|s| parse_uuid(&s)).transpose()?,
        error_code,
        error_description,
        solution_text,
        page_number: page_number as u32,
        confidence_score: confidence_score as f32,
        severity_level,
        requires_technician: requires_technician.map(|v| v != 0),
        requires_parts: requires_parts.map(|v| v != 0),
        context_text,
        metadata: serde_json::from_str(&metadata)?,
    })
}

fn image_from_row(row: &Row) -> Result<Image> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let document_id: String = row.get(1).map_err(|e| row_err("document_id", e))?;
    let page_number: i64 = row.get(2).map_err(|e| row_err("page_number", e))?;
    let image_type: String = row.get(3).map_err(|e| row_err("image_type", e))?;
    let blob_bucket: String = row.get(4).map_err(|e| row_err("blob_bucket", e))?;
    let blob_key: String = row.get(5).map_err(|e| row_err("blob_key", e))?;
    let context_text: Option<String> = row.get(6).map_err(|e| row_err("context_text", e))?;
    let ocr_text: Option<String> = row.get(7).map_err(|e| row_err("ocr_text", e))?;
    Ok(Image {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        page_number: page_number as u32,
        image_type: parse_image_type(&image_type)?,
        blob_bucket,
        blob_key,
        context_text,
        ocr_text,
    })
}

fn queue_item_from_row(row: &Row) -> Result<QueueItem> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let document_id: String = row.get(1).map_err(|e| row_err("document_id", e))?;
    let stage: String = row.get(2).map_err(|e| row_err("stage", e))?;
    let priority: i64 = row.get(3).map_err(|e| row_err("priority", e))?;
    let status: String = row.get(4).map_err(|e| row_err("status", e))?;
    let attempts: i64 = row.get(5).map_err(|e| row_err("attempts", e))?;
    let max_attempts: i64 = row.get(6).map_err(|e| row_err("max_attempts", e))?;
    let lease_deadline: Option<i64> = row.get(7).map_err(|e| row_err("lease_deadline", e))?;
    let leased_by: Option<String> = row.get(8).map_err(|e| row_err("leased_by", e))?;
    let enqueued_at: i64 = row.get(9).map_err(|e| row_err("enqueued_at", e))?;
    let started_at: Option<i64> = row.get(10).map_err(|e| row_err("started_at", e))?;
    let finished_at: Option<i64> = row.get(11).map_err(|e| row_err("finished_at", e))?;
    let last_error: Option<String> = row.get(12).map_err(|e| row_err("last_error", e))?;
    Ok(QueueItem {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        stage: Stage::parse(&stage).ok_or_else(|| Error::Storage(format!("unknown stage {stage:?}")))?,
        priority: priority as i32,
        status: parse_queue_item_status(&status)?,
        attempts: attempts as u32,
        max_attempts: max_attempts as u32,
        lease_deadline: lease_deadline.map(from_millis).transpose()?,
        leased_by,
        enqueued_at: from_millis(enqueued_at)?,
        started_at: started_at.map(from_millis).transpose()?,
        finished_at: finished_at.map(from_millis).transpose()?,
        last_error,
    })
}

fn stage_status_from_row(row: &Row) -> Result<StageStatus> {
    let document_id: String = row.get(0).map_err(|e| row_err("document_id", e))?;
    let stage: String = row.get(1).map_err(|e| row_err("stage", e))?;
    let state: String = row.get(2).map_err(|e| row_err("state", e))?;
    let started_at: Option<i64> = row.get(3).map_err(|e| row_err("started_at", e))?;
    let completed_at: Option<i64> = row.get(4).map_err(|e| row_err("completed_at", e))?;
    let duration_ms: Option<i64> = row.get(5).map_err(|e| row_err("duration_ms", e))?;
    let error_kind: Option<String> = row.get(6).map_err(|e| row_err("error_kind", e))?;
    let error_message: Option<String> = row.get(7).map_err(|e| row_err("error_message", e))?;
    let retry_count: i64 = row.get(8).map_err(|e| row_err("retry_count", e))?;
    Ok(StageStatus {
        document_id: parse_uuid(&document_id)?,
        stage: Stage::parse(&stage).ok_or_else(|| Error::Storage(format!("unknown stage {stage:?}")))?,
        state: parse_stage_state(&state)?,
        started_at: started_at.map(from_millis).transpose()?,
        completed_at: completed_at.map(from_millis).transpose()?,
        duration_ms: duration_ms.map(|d| d as u64),
        error_kind,
        error_message,
        retry_count: retry_count as u32,
    })
}

fn pipeline_error_from_row(row: &Row) -> Result<PipelineError> {
    let id: String = row.get(0).map_err(|e| row_err("id", e))?;
    let document_id: String = row.get(1).map_err(|e| row_err("document_id", e))?;
    let stage: String = row.get(2).map_err(|e| row_err("stage", e))?;
    let error_kind: String = row.get(3).map_err(|e| row_err("error_kind", e))?;
    let error_message: String = row.get(4).map_err(|e| row_err("error_message", e))?;
    let severity: String = row.get(5).map_err(|e| row_err("severity", e))?;
    let status: String = row.get(6).map_err(|e| row_err("status", e))?;
    let retry_count: i64 = row.get(7).map_err(|e| row_err("retry_count", e))?;
    let max_retries: i64 = row.get(8).map_err(|e| row_err("max_retries", e))?;
    let created_at: i64 = row.get(9).map_err(|e| row_err("created_at", e))?;
    let resolved_at: Option<i64> = row.get(10).map_err(|e| row_err("resolved_at", e))?;
    let resolved_by: Option<String> = row.get(11).map_err(|e| row_err("resolved_by", e))?;
    let resolution_notes: Option<String> = row.get(12).map_err(|e| row_err("resolution_notes", e))?;
    Ok(PipelineError {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        stage: Stage::parse(&stage).ok_or_else(|| Error::Storage(format!("unknown stage {stage:?}")))?,
        error_kind,
        error_message,
        severity,
        status: parse_pipeline_error_status(&status)?,
        retry_count: retry_count as u32,
        max_retries: max_retries as u32,
        created_at: from_millis(created_at)?,
        resolved_at: resolved_at.map(from_millis).transpose()?,
        resolved_by,
        resolution_notes,
    })
}

#[async_trait]
impl StorageBackend for TursoStorageBackend {
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, filename, file_hash, file_size, document_type, manufacturer_id, \
                 language, page_count, processing_status, current_stage, created_at, updated_at, \
                 uploaded_by FROM documents WHERE id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("get_document query failed: {e}")))?;
        match rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            Some(row) => Ok(Some(document_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_document(&self, document: Document) -> Result<Uuid> {
        if let Some(existing) = self.find_document_by_hash(&document.file_hash).await? {
            return Err(Error::DuplicateDocument {
                file_hash: document.file_hash.clone(),
                existing_id: existing.id,
            });
        }
        let conn = self.get_connection().await?;
        conn.execute(
            "INSERT INTO documents (id, filename, file_hash, file_size, document_type, \
             manufacturer_id, language, page_count, processing_status, current_stage, \
             created_at, updated_at, uploaded_by) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                document.id.to_string(),
                document.filename.clone(),
                document.file_hash.clone(),
                document.file_size as i64,
                document.document_type.as_str(),
                document.manufacturer_id.map(|id| id.to_string()),
                document.language.clone(),
                document.page_count.map(|p| p as i64),
                processing_status_str(document.processing_status),
                document.current_stage.map(Stage::as_str),
                millis(document.created_at),
                millis(document.updated_at),
                document.uploaded_by.clone(),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("insert document failed: {e}")))?;
        Ok(document.id)
    }

    async fn find_document_by_hash(&self, file_hash: &str) -> Result<Option<Document>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, filename, file_hash, file_size, document_type, manufacturer_id, \
                 language, page_count, processing_status, current_stage, created_at, updated_at, \
                 uploaded_by FROM documents WHERE file_hash = ?",
                params![file_hash.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("find_document_by_hash query failed: {e}")))?;
        match rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            Some(row) => Ok(Some(document_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_document(&self, id: Uuid, patch: DocumentPatch) -> Result<()> {
        let Some(mut document) = self.get_document(id).await? else {
            return Err(Error::DocumentMissing { document_id: id });
        };
        if let Some(status) = patch.processing_status {
            document.processing_status = status;
        }
        if let Some(stage) = patch.current_stage {
            document.current_stage = stage;
        }
        if let Some(manufacturer_id) = patch.manufacturer_id {
            document.manufacturer_id = Some(manufacturer_id);
        }
        if let Some(language) = patch.language {
            document.language = Some(language);
        }
        if let Some(page_count) = patch.page_count {
            document.page_count = Some(page_count);
        }
        document.updated_at = Utc::now();

        let conn = self.get_connection().await?;
        conn.execute(
            "UPDATE documents SET processing_status = ?, current_stage = ?, manufacturer_id = ?, \
             language = ?, page_count = ?, updated_at = ? WHERE id = ?",
            params![
                processing_status_str(document.processing_status),
                document.current_stage.map(Stage::as_str),
                document.manufacturer_id.map(|id| id.to_string()),
                document.language.clone(),
                document.page_count.map(|p| p as i64),
                millis(document.updated_at),
                id.to_string(),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("update document failed: {e}")))?;
        Ok(())
    }

    async fn ensure_manufacturer(&self, name: &str, pattern_key: &str) -> Result<Manufacturer> {
        let normalized = Manufacturer::normalize(name);
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, name, pattern_key, contact_email, contact_url, created_at \
                 FROM manufacturers WHERE normalized_name = ?",
                params![normalized.clone()],
            )
            .await
            .map_err(|e| Error::Storage(format!("ensure_manufacturer lookup failed: {e}")))?;
        if let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            return manufacturer_from_row(&row);
        }

        let manufacturer = Manufacturer::new(name.to_string(), pattern_key.to_string());
        let inserted = conn
            .execute(
                "INSERT INTO manufacturers (id, name, normalized_name, pattern_key, \
                 contact_email, contact_url, created_at) VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(normalized_name) DO NOTHING",
                params![
                    manufacturer.id.to_string(),
                    manufacturer.name.clone(),
                    normalized.clone(),
                    manufacturer.pattern_key.clone(),
                    manufacturer.contact_email.clone(),
                    manufacturer.contact_url.clone(),
                    millis(manufacturer.created_at),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("insert manufacturer failed: {e}")))?;

        if inserted == 0 {
            // Lost the race to a concurrent insert; the winner's row is authoritative.
            let mut rows = conn
                .query(
                    "SELECT id, name, pattern_key, contact_email, contact_url, created_at \
                     FROM manufacturers WHERE normalized_name = ?",
                    params![normalized],
                )
                .await
                .map_err(|e| Error::Storage(format!("ensure_manufacturer re-lookup failed: {e}")))?;
            let row = rows
                .next()
                .await
                .map_err(|e| Error::Storage(e.to_string()))?
                .ok_or_else(|| Error::Storage("manufacturer vanished after race".to_string()))?;
            return manufacturer_from_row(&row);
        }
        Ok(manufacturer)
    }

    async fn get_manufacturer(&self, id: Uuid) -> Result<Option<Manufacturer>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, name, pattern_key, contact_email, contact_url, created_at \
                 FROM manufacturers WHERE id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("get_manufacturer query failed: {e}")))?;
        match rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            Some(row) => Ok(Some(manufacturer_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, name, pattern_key, contact_email, contact_url, created_at FROM manufacturers",
                (),
            )
            .await
            .map_err(|e| Error::Storage(format!("list_manufacturers query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            out.push(manufacturer_from_row(&row)?);
        }
        Ok(out)
    }

    async fn ensure_product_series(&self, manufacturer_id: Uuid, name: &str) -> Result<ProductSeries> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, manufacturer_id, name FROM product_series WHERE manufacturer_id = ? AND name = ?",
                params![manufacturer_id.to_string(), name.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("ensure_product_series lookup failed: {e}")))?;
        if let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            let id: String = row.get(0).map_err(|e| row_err("id", e))?;
            let manufacturer_id: String = row.get(1).map_err(|e| row_err("manufacturer_id", e))?;
            let name: String = row.get(2).map_err(|e| row_err("name", e))?;
            return Ok(ProductSeries {
                id: parse_uuid(&id)?,
                manufacturer_id: parse_uuid(&manufacturer_id)?,
                name,
            });
        }
        let series = ProductSeries { id: Uuid::new_v4(), manufacturer_id, name: name.to_string() };
        conn.execute(
            "INSERT INTO product_series (id, manufacturer_id, name) VALUES (?, ?, ?) \
             ON CONFLICT(manufacturer_id, name) DO NOTHING",
            params![series.id.to_string(), manufacturer_id.to_string(), series.name.clone()],
        )
        .await
        .map_err(|e| Error::Storage(format!("insert product_series failed: {e}")))?;
        Ok(series)
    }

    async fn upsert_product(&self, product: Product) -> Result<Uuid> {
        let conn = self.get_connection().await?;
        let specifications = serde_json::to_string(&product.specifications)?;
        conn.execute(
            "INSERT INTO products (id, manufacturer_id, model_number, series_id, product_type, \
             specifications, oem_manufacturer_id) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(manufacturer_id, model_number) DO UPDATE SET \
             series_id = excluded.series_id, product_type = excluded.product_type, \
             specifications = excluded.specifications, oem_manufacturer_id = excluded.oem_manufacturer_id",
            params![
                product.id.to_string(),
                product.manufacturer_id.to_string(),
                product.model_number.clone(),
                product.series_id.map(|id| id.to_string()),
                product.product_type.clone(),
                specifications,
                product.oem_manufacturer_id.map(|id| id.to_string()),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("upsert product failed: {e}")))?;

        let mut rows = conn
            .query(
                "SELECT id FROM products WHERE manufacturer_id = ? AND model_number = ?",
                params![product.manufacturer_id.to_string(), product.model_number.clone()],
            )
            .await
            .map_err(|e| Error::Storage(format!("upsert_product id lookup failed: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
            .ok_or_else(|| Error::Storage("product vanished after upsert".to_string()))?;
        let id: String = row.get(0).map_err(|e| row_err("id", e))?;
        parse_uuid(&id)
    }

    async fn list_products(&self, manufacturer_id: Uuid) -> Result<Vec<Product>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, manufacturer_id, model_number, series_id, product_type, \
                 specifications, oem_manufacturer_id FROM products WHERE manufacturer_id = ?",
                params![manufacturer_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("list_products query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            let id: String = row.get(0).map_err(|e| row_err("id", e))?;
            let manufacturer_id: String = row.get(1).map_err(|e| row_err("manufacturer_id", e))?;
            let model_number: String = row.get(2).map_err(|e| row_err("model_number", e))?;
            let series_id: Option<String> = row.get(3).map_err(|e| row_err("series_id", e))?;
            let product_type: String = row.get(4).map_err(|e| row_err("product_type", e))?;
            let specifications: String = row.get(5).map_err(|e| row_err("specifications", e))?;
            let oem_manufacturer_id: Option<String> =
                row.get(6).map_err(|e| row_err("oem_manufacturer_id", e))?;
            out.push(Product {
                id: parse_uuid(&id)?,
                manufacturer_id: parse_uuid(&manufacturer_id)?,
                model_number,
                series_id: series_id.map(|s| parse_uuid(&s)).transpose()?,
                product_type,
                specifications: serde_json::from_str(&specifications)?,
                oem_manufacturer_id: oem_manufacturer_id.map(|s| parse_uuid(&s)).transpose()?,
            });
        }
        Ok(out)
    }

    async fn upsert_chunks(&self, document_id: Uuid, chunks: Vec<Chunk>) -> Result<()> {
        let conn = self.get_connection().await?;
        conn.execute("DELETE FROM chunks WHERE document_id = ?", params![document_id.to_string()])
            .await
            .map_err(|e| Error::Storage(format!("clearing existing chunks failed: {e}")))?;
        for chunk in chunks {
            let hierarchy = serde_json::to_string(&chunk.section_hierarchy)?;
            conn.execute(
                "INSERT INTO chunks (id, document_id, ordinal, page_number, section_hierarchy, \
                 section_level, text, previous_chunk_id, next_chunk_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    chunk.id.to_string(),
                    chunk.document_id.to_string(),
                    chunk.ordinal as i64,
                    chunk.page_number as i64,
                    hierarchy,
                    chunk.section_level as i64,
                    chunk.text.clone(),
                    chunk.previous_chunk_id.map(|id| id.to_string()),
                    chunk.next_chunk_id.map(|id| id.to_string()),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("insert chunk failed: {e}")))?;
        }
        Ok(())
    }

    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, document_id, ordinal, page_number, section_hierarchy, section_level, \
                 text, previous_chunk_id, next_chunk_id FROM chunks WHERE document_id = ? ORDER BY ordinal",
                params![document_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("list_chunks query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            out.push(chunk_from_row(&row)?);
        }
        Ok(out)
    }

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, document_id, ordinal, page_number, section_hierarchy, section_level, \
                 text, previous_chunk_id, next_chunk_id FROM chunks WHERE id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("get_chunk query failed: {e}")))?;
        match rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            Some(row) => Ok(Some(chunk_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_embeddings(&self, embeddings: Vec<Embedding>) -> Result<()> {
        let conn = self.get_connection().await?;
        for embedding in embeddings {
            if !embedding.has_consistent_dimension() {
                return Err(Error::EmbeddingDimensionMismatch {
                    configured: embedding.dimension,
                    actual: embedding.vector.len(),
                });
            }
            let vector = serde_json::to_string(&embedding.vector)?;
            conn.execute(
                "INSERT INTO embeddings (id, owner_kind, owner_id, model_name, dimension, vector) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(owner_kind, owner_id, model_name) DO UPDATE SET \
                 dimension = excluded.dimension, vector = excluded.vector",
                params![
                    embedding.id.to_string(),
                    owner_kind_str(embedding.owner_kind),
                    embedding.owner_id.to_string(),
                    embedding.model_name.clone(),
                    embedding.dimension as i64,
                    vector,
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("upsert embedding failed: {e}")))?;
        }
        Ok(())
    }

    async fn embedded_owner_ids(&self, owner_kind: OwnerKind, model_name: &str) -> Result<Vec<Uuid>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT owner_id FROM embeddings WHERE owner_kind = ? AND model_name = ?",
                params![owner_kind_str(owner_kind), model_name.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("embedded_owner_ids query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            let owner_id: String = row.get(0).map_err(|e| row_err("owner_id", e))?;
            out.push(parse_uuid(&owner_id)?);
        }
        Ok(out)
    }

    async fn search_embeddings(
        &self,
        query_vector: &[f32],
        filter: EmbeddingSearchFilter,
        k: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        // libSQL's vector index support varies by deployment target, so
        // this scans candidate rows and ranks them in-process; the
        // dimension filter keeps the scan honest even without an index.
        let conn = self.get_connection().await?;
        let (sql, bound): (&str, Vec<String>) = match (&filter.model_name, &filter.owner_kind) {
            (Some(model), Some(kind)) => (
                "SELECT owner_kind, owner_id, vector FROM embeddings WHERE model_name = ? AND owner_kind = ?",
                vec![model.clone(), owner_kind_str(*kind).to_string()],
            ),
            (Some(model), None) => (
                "SELECT owner_kind, owner_id, vector FROM embeddings WHERE model_name = ?",
                vec![model.clone()],
            ),
            (None, Some(kind)) => (
                "SELECT owner_kind, owner_id, vector FROM embeddings WHERE owner_kind = ?",
                vec![owner_kind_str(*kind).to_string()],
            ),
            (None, None) => ("SELECT owner_kind, owner_id, vector FROM embeddings", vec![]),
        };
        let mut rows = conn
            .query(sql, libsql::params_from_iter(bound))
            .await
            .map_err(|e| Error::Storage(format!("search_embeddings query failed: {e}")))?;

        let mut matches = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            let owner_kind: String = row.get(0).map_err(|e| row_err("owner_kind", e))?;
            let owner_id: String = row.get(1).map_err(|e| row_err("owner_id", e))?;
            let vector: String = row.get(2).map_err(|e| row_err("vector", e))?;
            let vector: Vec<f32> = serde_json::from_str(&vector)?;
            if vector.len() != query_vector.len() {
                continue;
            }
            matches.push(EmbeddingMatch {
                owner_kind: parse_owner_kind(&owner_kind)?,
                owner_id: parse_uuid(&owner_id)?,
                similarity: krai_core::embeddings::cosine_similarity(query_vector, &vector),
            });
        }
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.owner_id.cmp(&b.owner_id))
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn batch_insert_error_codes(&self, records: Vec<ErrorCode>) -> Result<()> {
        for record in &records {
            if record.manufacturer_id.is_nil() {
                return Err(Error::ManufacturerMissing {
                    document_id: record.document_id,
                    stage: Stage::ErrorCodeExtraction,
                });
            }
        }
        let conn = self.get_connection().await?;
        for record in records {
            let metadata = serde_json::to_string(&record.metadata)?;
            conn.execute(
                "INSERT INTO error_codes (id, document_id, manufacturer_id, product_id, chunk_id, \
                 error_code, error_description, solution_text, page_number, confidence_score, \
                 severity_level, requires_technician, requires_parts, context_text, metadata) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.id.to_string(),
                    record.document_id.to_string(),
                    record.manufacturer_id.to_string(),
                    record.product_id.map(|id| id.to_string()),
                    record.chunk_id.map(|id| id.to_string()),
                    record.error_code.clone(),
                    record.error_description.clone(),
                    record.solution_text.clone(),
                    record.page_number as i64,
                    f64::from(record.confidence_score),
                    record.severity_level.clone(),
                    record.requires_technician.map(i64::from),
                    record.requires_parts.map(i64::from),
                    record.context_text.clone(),
                    metadata,
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("insert error_code failed: {e}")))?;
        }
        Ok(())
    }

    async fn list_error_codes(&self, document_id: Uuid) -> Result<Vec<ErrorCode>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, document_id, manufacturer_id, product_id, chunk_id, error_code, \
                 error_description, solution_text, page_number, confidence_score, severity_level, \
                 requires_technician, requires_parts, context_text, metadata \
                 FROM error_codes WHERE document_id = ? ORDER BY page_number",
                params![document_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("list_error_codes query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            out.push(error_code_from_row(&row)?);
        }
        Ok(out)
    }

    async fn set_error_code_chunk(&self, error_code_id: Uuid, chunk_id: Uuid) -> Result<()> {
        let conn = self.get_connection().await?;
        conn.execute(
            "UPDATE error_codes SET chunk_id = ? WHERE id = ?",
            params![chunk_id.to_string(), error_code_id.to_string()],
        )
        .await
        .map_err(|e| Error::Storage(format!("set_error_code_chunk failed: {e}")))?;
        Ok(())
    }

    async fn upsert_images(&self, images: Vec<Image>) -> Result<()> {
        let conn = self.get_connection().await?;
        for image in images {
            conn.execute(
                "INSERT INTO images (id, document_id, page_number, image_type, blob_bucket, \
                 blob_key, context_text, ocr_text) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    image.id.to_string(),
                    image.document_id.to_string(),
                    image.page_number as i64,
                    image_type_str(image.image_type),
                    image.blob_bucket.clone(),
                    image.blob_key.clone(),
                    image.context_text.clone(),
                    image.ocr_text.clone(),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("insert image failed: {e}")))?;
        }
        Ok(())
    }

    async fn list_images(&self, document_id: Uuid) -> Result<Vec<Image>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, document_id, page_number, image_type, blob_bucket, blob_key, \
                 context_text, ocr_text FROM images WHERE document_id = ? ORDER BY page_number",
                params![document_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("list_images query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            out.push(image_from_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_videos(&self, videos: Vec<Video>) -> Result<()> {
        let conn = self.get_connection().await?;
        for video in videos {
            conn.execute(
                "INSERT INTO videos (id, document_id, url, title, duration_secs, validation_status) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    video.id.to_string(),
                    video.document_id.to_string(),
                    video.url.clone(),
                    video.title.clone(),
                    video.duration_secs.map(i64::from),
                    validation_status_str(video.validation_status),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("insert video failed: {e}")))?;
        }
        Ok(())
    }

    async fn upsert_links(&self, links: Vec<Link>) -> Result<()> {
        let conn = self.get_connection().await?;
        for link in links {
            conn.execute(
                "INSERT INTO links (id, document_id, url, link_type, validation_status) \
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    link.id.to_string(),
                    link.document_id.to_string(),
                    link.url.clone(),
                    link.link_type.clone(),
                    validation_status_str(link.validation_status),
                ],
            )
            .await
            .map_err(|e| Error::Storage(format!("insert link failed: {e}")))?;
        }
        Ok(())
    }

    async fn enqueue(&self, item: QueueItem) -> Result<Uuid> {
        if let Some(existing) = self.find_active_queue_item(item.document_id, item.stage).await? {
            return Ok(existing.id);
        }
        let conn = self.get_connection().await?;
        conn.execute(
            "INSERT INTO processing_queue (id, document_id, stage, priority, status, attempts, \
             max_attempts, lease_deadline, leased_by, enqueued_at, started_at, finished_at, last_error) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.id.to_string(),
                item.document_id.to_string(),
                item.stage.as_str(),
                i64::from(item.priority),
                queue_item_status_str(item.status),
                i64::from(item.attempts),
                i64::from(item.max_attempts),
                item.lease_deadline.map(millis),
                item.leased_by.clone(),
                millis(item.enqueued_at),
                item.started_at.map(millis),
                item.finished_at.map(millis),
                item.last_error.clone(),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("enqueue failed: {e}")))?;
        Ok(item.id)
    }

    async fn find_active_queue_item(&self, document_id: Uuid, stage: Stage) -> Result<Option<QueueItem>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, document_id, stage, priority, status, attempts, max_attempts, \
                 lease_deadline, leased_by, enqueued_at, started_at, finished_at, last_error \
                 FROM processing_queue WHERE document_id = ? AND stage = ? \
                 AND status IN ('pending', 'leased')",
                params![document_id.to_string(), stage.as_str()],
            )
            .await
            .map_err(|e| Error::Storage(format!("find_active_queue_item query failed: {e}")))?;
        match rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            Some(row) => Ok(Some(queue_item_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn lease_next(
        &self,
        worker_id: &str,
        stages_filter: &[Stage],
        ttl: chrono::Duration,
    ) -> Result<Option<QueueItem>> {
        let conn = self.get_connection().await?;
        let now = Utc::now();
        let leasable = "(status = 'pending' OR (status = 'retrying' AND lease_deadline <= ?))";
        let candidate = if stages_filter.is_empty() {
            let sql = format!(
                "SELECT id FROM processing_queue WHERE {leasable} \
                 ORDER BY priority DESC, enqueued_at ASC LIMIT 1"
            );
            conn.query(&sql, params![millis(now)]).await
        } else {
            let placeholders = stages_filter.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "SELECT id FROM processing_queue WHERE {leasable} AND stage IN ({placeholders}) \
                 ORDER BY priority DESC, enqueued_at ASC LIMIT 1"
            );
            let mut bound: Vec<String> = vec![millis(now).to_string()];
            bound.extend(stages_filter.iter().map(|s| s.as_str().to_string()));
            conn.query(&sql, libsql::params_from_iter(bound)).await
        }
        .map_err(|e| Error::Storage(format!("lease_next candidate query failed: {e}")))?;

        let mut candidate = candidate;
        let Some(row) = candidate.next().await.map_err(|e| Error::Storage(e.to_string()))? else {
            return Ok(None);
        };
        let id: String = row.get(0).map_err(|e| row_err("id", e))?;
        let deadline = now + ttl;

        conn.execute(
            &format!(
                "UPDATE processing_queue SET status = 'leased', lease_deadline = ?, leased_by = ?, \
                 started_at = COALESCE(started_at, ?), attempts = attempts + 1 \
                 WHERE id = ? AND {leasable}"
            ),
            params![
                millis(deadline),
                worker_id.to_string(),
                millis(now),
                id.clone(),
                millis(now)
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("lease_next update failed: {e}")))?;

        let mut rows = conn
            .query(
                "SELECT id, document_id, stage, priority, status, attempts, max_attempts, \
                 lease_deadline, leased_by, enqueued_at, started_at, finished_at, last_error \
                 FROM processing_queue WHERE id = ?",
                params![id],
            )
            .await
            .map_err(|e| Error::Storage(format!("lease_next re-fetch failed: {e}")))?;
        match rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            Some(row) => Ok(Some(queue_item_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn complete_queue_item(&self, item_id: Uuid) -> Result<()> {
        let conn = self.get_connection().await?;
        let affected = conn
            .execute(
                "UPDATE processing_queue SET status = 'completed', finished_at = ? WHERE id = ?",
                params![millis(Utc::now()), item_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("complete_queue_item failed: {e}")))?;
        if affected == 0 {
            return Err(Error::QueueItemMissing { item_id });
        }
        Ok(())
    }

    async fn fail_queue_item(
        &self,
        item_id: Uuid,
        error: &str,
        status: QueueItemStatus,
        retry_not_before: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.get_connection().await?;
        let affected = if status == QueueItemStatus::Retrying {
            conn.execute(
                "UPDATE processing_queue SET status = ?, last_error = ?, lease_deadline = ?, \
                 leased_by = NULL WHERE id = ?",
                params![
                    queue_item_status_str(status),
                    error.to_string(),
                    retry_not_before.map(millis),
                    item_id.to_string(),
                ],
            )
            .await
        } else {
            conn.execute(
                "UPDATE processing_queue SET status = ?, last_error = ?, finished_at = ? WHERE id = ?",
                params![
                    queue_item_status_str(status),
                    error.to_string(),
                    millis(Utc::now()),
                    item_id.to_string(),
                ],
            )
            .await
        }
        .map_err(|e| Error::Storage(format!("fail_queue_item failed: {e}")))?;
        if affected == 0 {
            return Err(Error::QueueItemMissing { item_id });
        }
        Ok(())
    }

    async fn extend_lease(&self, item_id: Uuid, ttl: chrono::Duration) -> Result<()> {
        let conn = self.get_connection().await?;
        let affected = conn
            .execute(
                "UPDATE processing_queue SET lease_deadline = ? WHERE id = ? AND status = 'leased'",
                params![millis(Utc::now() + ttl), item_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("extend_lease failed: {e}")))?;
        if affected == 0 {
            return Err(Error::QueueItemMissing { item_id });
        }
        Ok(())
    }

    async fn reclaim_expired_leases(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.get_connection().await?;
        let affected = conn
            .execute(
                "UPDATE processing_queue SET status = 'pending', lease_deadline = NULL, leased_by = NULL \
                 WHERE status = 'leased' AND lease_deadline < ?",
                params![millis(now)],
            )
            .await
            .map_err(|e| Error::Storage(format!("reclaim_expired_leases failed: {e}")))?;
        Ok(affected as usize)
    }

    async fn count_pending_queue_items(&self) -> Result<usize> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM processing_queue WHERE status = 'pending'", ())
            .await
            .map_err(|e| Error::Storage(format!("count_pending_queue_items failed: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
            .ok_or_else(|| Error::Storage("COUNT(*) returned no rows".to_string()))?;
        let count: i64 = row.get(0).map_err(|e| row_err("count", e))?;
        Ok(count as usize)
    }

    async fn get_stage_status(&self, document_id: Uuid, stage: Stage) -> Result<Option<StageStatus>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT document_id, stage, state, started_at, completed_at, duration_ms, \
                 error_kind, error_message, retry_count FROM stage_status \
                 WHERE document_id = ? AND stage = ?",
                params![document_id.to_string(), stage.as_str()],
            )
            .await
            .map_err(|e| Error::Storage(format!("get_stage_status query failed: {e}")))?;
        match rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            Some(row) => Ok(Some(stage_status_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_stage_status(&self, status: StageStatus) -> Result<()> {
        let conn = self.get_connection().await?;
        conn.execute(
            "INSERT INTO stage_status (document_id, stage, state, started_at, completed_at, \
             duration_ms, error_kind, error_message, retry_count) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(document_id, stage) DO UPDATE SET state = excluded.state, \
             started_at = excluded.started_at, completed_at = excluded.completed_at, \
             duration_ms = excluded.duration_ms, error_kind = excluded.error_kind, \
             error_message = excluded.error_message, retry_count = excluded.retry_count",
            params![
                status.document_id.to_string(),
                status.stage.as_str(),
                stage_state_str(status.state),
                status.started_at.map(millis),
                status.completed_at.map(millis),
                status.duration_ms.map(|d| d as i64),
                status.error_kind.clone(),
                status.error_message.clone(),
                i64::from(status.retry_count),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("upsert_stage_status failed: {e}")))?;
        Ok(())
    }

    async fn list_stage_statuses(&self, document_id: Uuid) -> Result<Vec<StageStatus>> {
        let conn = self.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT document_id, stage, state, started_at, completed_at, duration_ms, \
                 error_kind, error_message, retry_count FROM stage_status WHERE document_id = ?",
                params![document_id.to_string()],
            )
            .await
            .map_err(|e| Error::Storage(format!("list_stage_statuses query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            out.push(stage_status_from_row(&row)?);
        }
        Ok(out)
    }

    async fn reset_stage_statuses(&self, document_id: Uuid, from_stage: Option<Stage>) -> Result<()> {
        let conn = self.get_connection().await?;
        let stages: Vec<Stage> = match from_stage {
            Some(from) => Stage::ALL.into_iter().skip_while(|s| *s != from).collect(),
            None => Stage::ALL.to_vec(),
        };
        for stage in stages {
            conn.execute(
                "INSERT INTO stage_status (document_id, stage, state, started_at, completed_at, \
                 duration_ms, error_kind, error_message, retry_count) \
                 VALUES (?, ?, 'not_started', NULL, NULL, NULL, NULL, NULL, 0) \
                 ON CONFLICT(document_id, stage) DO UPDATE SET state = 'not_started', \
                 started_at = NULL, completed_at = NULL, duration_ms = NULL, error_kind = NULL, \
                 error_message = NULL",
                params![document_id.to_string(), stage.as_str()],
            )
            .await
            .map_err(|e| Error::Storage(format!("reset_stage_statuses failed: {e}")))?;
        }
        Ok(())
    }

    async fn record_pipeline_error(&self, error: PipelineError) -> Result<Uuid> {
        let conn = self.get_connection().await?;
        conn.execute(
            "INSERT INTO pipeline_errors (id, document_id, stage, error_kind, error_message, \
             severity, status, retry_count, max_retries, created_at, resolved_at, resolved_by, \
             resolution_notes) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                error.id.to_string(),
                error.document_id.to_string(),
                error.stage.as_str(),
                error.error_kind.clone(),
                error.error_message.clone(),
                error.severity.clone(),
                pipeline_error_status_str(error.status),
                i64::from(error.retry_count),
                i64::from(error.max_retries),
                millis(error.created_at),
                error.resolved_at.map(millis),
                error.resolved_by.clone(),
                error.resolution_notes.clone(),
            ],
        )
        .await
        .map_err(|e| Error::Storage(format!("record_pipeline_error failed: {e}")))?;
        Ok(error.id)
    }

    async fn list_pipeline_errors(
        &self,
        stage: Option<Stage>,
        status: Option<krai_core::types::PipelineErrorStatus>,
    ) -> Result<Vec<PipelineError>> {
        let conn = self.get_connection().await?;
        let mut sql = "SELECT id, document_id, stage, error_kind, error_message, severity, status, \
                       retry_count, max_retries, created_at, resolved_at, resolved_by, resolution_notes \
                       FROM pipeline_errors WHERE 1 = 1"
            .to_string();
        let mut bound: Vec<String> = Vec::new();
        if let Some(stage) = stage {
            sql.push_str(" AND stage = ?");
            bound.push(stage.as_str().to_string());
        }
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            bound.push(pipeline_error_status_str(status).to_string());
        }
        sql.push_str(" ORDER BY created_at DESC");
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(bound))
            .await
            .map_err(|e| Error::Storage(format!("list_pipeline_errors query failed: {e}")))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Storage(e.to_string()))? {
            out.push(pipeline_error_from_row(&row)?);
        }
        Ok(out)
    }

    async fn execute(&self, query: &str, params: &[String]) -> Result<u64> {
        let conn = self.get_connection().await?;
        conn.execute(query, libsql::params_from_iter(params.to_vec()))
            .await
            .map_err(|e| Error::Storage(format!("execute failed: {e}")))
    }
}
