//! DDL for the relational entity set (spec §3). One constant per table,
//! applied in dependency order by [`crate::TursoStorageBackend::initialize_schema`].
//! `audit_log` is not modeled here: [`krai_core::security::audit::AuditLogger`]
//! writes to stdout/stderr/file, never through [`krai_core::storage::StorageBackend`].

pub const CREATE_DOCUMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY NOT NULL,
    filename TEXT NOT NULL,
    file_hash TEXT NOT NULL UNIQUE,
    file_size INTEGER NOT NULL,
    document_type TEXT NOT NULL,
    manufacturer_id TEXT,
    language TEXT,
    page_count INTEGER,
    processing_status TEXT NOT NULL,
    current_stage TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    uploaded_by TEXT
)
"#;

pub const CREATE_DOCUMENTS_HASH_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_file_hash ON documents(file_hash)
"#;

pub const CREATE_MANUFACTURERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS manufacturers (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL UNIQUE,
    pattern_key TEXT NOT NULL,
    contact_email TEXT,
    contact_url TEXT,
    created_at INTEGER NOT NULL
)
"#;

pub const CREATE_PRODUCT_SERIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS product_series (
    id TEXT PRIMARY KEY NOT NULL,
    manufacturer_id TEXT NOT NULL,
    name TEXT NOT NULL,
    UNIQUE(manufacturer_id, name)
)
"#;

pub const CREATE_PRODUCTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY NOT NULL,
    manufacturer_id TEXT NOT NULL,
    model_number TEXT NOT NULL,
    series_id TEXT,
    product_type TEXT NOT NULL,
    specifications TEXT NOT NULL,
    oem_manufacturer_id TEXT,
    UNIQUE(manufacturer_id, model_number)
)
"#;

pub const CREATE_CHUNKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    page_number INTEGER NOT NULL,
    section_hierarchy TEXT NOT NULL,
    section_level INTEGER NOT NULL,
    text TEXT NOT NULL,
    previous_chunk_id TEXT,
    next_chunk_id TEXT,
    UNIQUE(document_id, ordinal)
)
"#;

pub const CREATE_CHUNKS_DOCUMENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, ordinal)
"#;

pub const CREATE_EMBEDDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS embeddings (
    id TEXT PRIMARY KEY NOT NULL,
    owner_kind TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    model_name TEXT NOT NULL,
    dimension INTEGER NOT NULL,
    vector TEXT NOT NULL,
    UNIQUE(owner_kind, owner_id, model_name)
)
"#;

pub const CREATE_EMBEDDINGS_MODEL_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model_name, owner_kind)
"#;

pub const CREATE_ERROR_CODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS error_codes (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL,
    manufacturer_id TEXT NOT NULL,
    product_id TEXT,
    chunk_id TEXT,
    error_code TEXT NOT NULL,
    error_description TEXT,
    solution_text TEXT,
    page_number INTEGER NOT NULL,
    confidence_score REAL NOT NULL,
    severity_level TEXT,
    requires_technician INTEGER,
    requires_parts INTEGER,
    context_text TEXT,
    metadata TEXT NOT NULL
)
"#;

pub const CREATE_ERROR_CODES_DOCUMENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_error_codes_document ON error_codes(document_id, page_number)
"#;

pub const CREATE_IMAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS images (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL,
    page_number INTEGER NOT NULL,
    image_type TEXT NOT NULL,
    blob_bucket TEXT NOT NULL,
    blob_key TEXT NOT NULL,
    context_text TEXT,
    ocr_text TEXT
)
"#;

pub const CREATE_IMAGES_DOCUMENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_images_document ON images(document_id)
"#;

pub const CREATE_VIDEOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT,
    duration_secs INTEGER,
    validation_status TEXT NOT NULL
)
"#;

pub const CREATE_LINKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS links (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL,
    url TEXT NOT NULL,
    link_type TEXT NOT NULL,
    validation_status TEXT NOT NULL
)
"#;

pub const CREATE_PROCESSING_QUEUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS processing_queue (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    priority INTEGER NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    max_attempts INTEGER NOT NULL,
    lease_deadline INTEGER,
    leased_by TEXT,
    enqueued_at INTEGER NOT NULL,
    started_at INTEGER,
    finished_at INTEGER,
    last_error TEXT
)
"#;

/// Enforces spec §8 invariant 3 (at most one `pending`/`leased` item per
/// `(document_id, stage)`) as a partial unique index rather than in
/// application code, so the guarantee holds even under concurrent writers.
pub const CREATE_QUEUE_ACTIVE_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_active_unique
ON processing_queue(document_id, stage)
WHERE status IN ('pending', 'leased')
"#;

pub const CREATE_QUEUE_LEASE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_queue_pending_priority
ON processing_queue(status, priority DESC, enqueued_at ASC)
"#;

pub const CREATE_STAGE_STATUS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stage_status (
    document_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    state TEXT NOT NULL,
    started_at INTEGER,
    completed_at INTEGER,
    duration_ms INTEGER,
    error_kind TEXT,
    error_message TEXT,
    retry_count INTEGER NOT NULL,
    PRIMARY KEY (document_id, stage)
)
"#;

pub const CREATE_PIPELINE_ERRORS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pipeline_errors (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    error_kind TEXT NOT NULL,
    error_message TEXT NOT NULL,
    severity TEXT NOT NULL,
    status TEXT NOT NULL,
    retry_count INTEGER NOT NULL,
    max_retries INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    resolved_at INTEGER,
    resolved_by TEXT,
    resolution_notes TEXT
)
"#;

pub const CREATE_PIPELINE_ERRORS_STAGE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_pipeline_errors_stage ON pipeline_errors(stage, status)
"#;

/// All DDL statements, in an order that respects informal foreign-key
/// dependencies (no `FOREIGN KEY` constraints are declared — libSQL
/// enforces them poorly across the embedded-replica/remote split the
/// spec's deployments use, so referential integrity is the orchestrator's
/// job, not the schema's).
pub const ALL_STATEMENTS: &[&str] = &[
    CREATE_DOCUMENTS_TABLE,
    CREATE_DOCUMENTS_HASH_INDEX,
    CREATE_MANUFACTURERS_TABLE,
    CREATE_PRODUCT_SERIES_TABLE,
    CREATE_PRODUCTS_TABLE,
    CREATE_CHUNKS_TABLE,
    CREATE_CHUNKS_DOCUMENT_INDEX,
    CREATE_EMBEDDINGS_TABLE,
    CREATE_EMBEDDINGS_MODEL_INDEX,
    CREATE_ERROR_CODES_TABLE,
    CREATE_ERROR_CODES_DOCUMENT_INDEX,
    CREATE_IMAGES_TABLE,
    CREATE_IMAGES_DOCUMENT_INDEX,
    CREATE_VIDEOS_TABLE,
    CREATE_LINKS_TABLE,
    CREATE_PROCESSING_QUEUE_TABLE,
    CREATE_QUEUE_ACTIVE_INDEX,
    CREATE_QUEUE_LEASE_INDEX,
    CREATE_STAGE_STATUS_TABLE,
    CREATE_PIPELINE_ERRORS_TABLE,
    CREATE_PIPELINE_ERRORS_STAGE_INDEX,
];
