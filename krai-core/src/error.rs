//! Error taxonomy for the ingestion and enrichment pipeline.
//!
//! Every variant here is one of the five kind families from the error
//! handling design: input, precondition, transient, data, internal. The
//! stage runner classifies failures by matching on this enum rather than on
//! inspecting message strings, and `is_recoverable()` drives the retry
//! policy in [`crate::retry`] and the processing queue.

use crate::types::Stage;
use uuid::Uuid;

/// Result type alias used throughout `krai-core` and its adapter crates.
pub type Result<T> = std::result::Result<T, Error>;

/// A single remediation option offered to an operator for an actionable
/// precondition error.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    pub summary: String,
    pub detail: Option<String>,
}

impl Remediation {
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Error kinds for the ingestion engine.
///
/// Variants are grouped by family in source order: input, precondition,
/// transient, data, internal. `is_recoverable()` reflects exactly that
/// grouping and is the single source of truth the queue's retry logic
/// consults — it must never diverge from the family a variant was added
/// under.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ---- Input errors (non-retryable) ----
    #[error("document with file_hash {file_hash} already exists as {existing_id}")]
    DuplicateDocument {
        file_hash: String,
        existing_id: Uuid,
    },

    #[error("unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    #[error("blob {bucket}/{key} is corrupt or unreadable: {reason}")]
    CorruptBlob {
        bucket: String,
        key: String,
        reason: String,
    },

    // ---- Precondition errors (non-retryable, actionable) ----
    #[error("no error-code patterns for manufacturer {manufacturer_name:?}")]
    ManufacturerPatternNotFound {
        manufacturer_name: String,
        stage: Stage,
        remediations: Vec<Remediation>,
        rebrand_hints: Vec<String>,
        fuzzy_suggestions: Vec<String>,
    },

    #[error("document {document_id} has no resolvable manufacturer at stage {stage:?}")]
    ManufacturerMissing { document_id: Uuid, stage: Stage },

    #[error("embedding dimension mismatch: configured {configured}, got {actual}")]
    EmbeddingDimensionMismatch { configured: usize, actual: usize },

    // ---- Transient errors (retryable) ----
    #[error("external service timed out: {service}")]
    ExternalServiceTimeout { service: String },

    #[error("external service unavailable: {service}: {reason}")]
    ExternalServiceUnavailable { service: String, reason: String },

    #[error("queue saturated: {pending} pending items >= watermark {watermark}")]
    QueueSaturated { pending: usize, watermark: usize },

    #[error("lease expired for queue item {item_id}")]
    LeaseExpired { item_id: Uuid },

    #[error("storage backend error: {0}")]
    Storage(String),

    #[error("circuit breaker open for {service}")]
    CircuitBreakerOpen { service: String },

    #[error("blob store error: {0}")]
    BlobStore(String),

    // ---- Data errors (non-retryable, surfaced) ----
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("pattern snapshot invalid: {0}")]
    PatternSnapshotInvalid(String),

    #[error("document {document_id} not found")]
    DocumentMissing { document_id: Uuid },

    #[error("queue item {item_id} not found")]
    QueueItemMissing { item_id: Uuid },

    #[error("text extraction failed: {0}")]
    TextExtractionFailure(String),

    #[error("stage {stage:?} prerequisite {prerequisite:?} not completed for document {document_id}")]
    PrerequisiteNotMet {
        document_id: Uuid,
        stage: Stage,
        prerequisite: Stage,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("pattern file error: {0}")]
    PatternFile(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // ---- Internal errors (fatal) ----
    #[error("unexpected internal error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl Error {
    /// Whether the stage runner/queue should retry this error with backoff.
    ///
    /// This is the single classification point referenced throughout the
    /// pipeline; extractors never decide retryability themselves.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ExternalServiceTimeout { .. }
                | Error::ExternalServiceUnavailable { .. }
                | Error::QueueSaturated { .. }
                | Error::LeaseExpired { .. }
                | Error::Storage(_)
                | Error::CircuitBreakerOpen { .. }
                | Error::BlobStore(_)
        )
    }

    /// Whether this is an actionable precondition error that should render
    /// as a framed, multi-line, remediation-bearing message rather than a
    /// one-line summary.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Error::ManufacturerPatternNotFound { .. }
                | Error::ManufacturerMissing { .. }
                | Error::EmbeddingDimensionMismatch { .. }
        )
    }

    /// Stable kind label used in `PipelineError.error_kind` and structured
    /// logging fields.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Error::DuplicateDocument { .. } => "DuplicateDocument",
            Error::UnsupportedDocumentType(_) => "UnsupportedDocumentType",
            Error::CorruptBlob { .. } => "CorruptBlob",
            Error::ManufacturerPatternNotFound { .. } => "ManufacturerPatternNotFound",
            Error::ManufacturerMissing { .. } => "ManufacturerMissing",
            Error::EmbeddingDimensionMismatch { .. } => "EmbeddingDimensionMismatch",
            Error::ExternalServiceTimeout { .. } => "ExternalServiceTimeout",
            Error::ExternalServiceUnavailable { .. } => "ExternalServiceUnavailable",
            Error::QueueSaturated { .. } => "QueueSaturated",
            Error::LeaseExpired { .. } => "LeaseExpired",
            Error::Storage(_) => "StorageError",
            Error::CircuitBreakerOpen { .. } => "CircuitBreakerOpen",
            Error::BlobStore(_) => "BlobStoreError",
            Error::ValidationError(_) => "ValidationError",
            Error::PatternSnapshotInvalid(_) => "PatternSnapshotInvalid",
            Error::DocumentMissing { .. } => "DocumentMissing",
            Error::QueueItemMissing { .. } => "QueueItemMissing",
            Error::TextExtractionFailure(_) => "TextExtractionFailure",
            Error::PrerequisiteNotMet { .. } => "PrerequisiteNotMet",
            Error::Configuration(_) => "ConfigurationError",
            Error::Serialization(_) => "SerializationError",
            Error::PatternFile(_) => "PatternFileError",
            Error::Io(_) => "IoError",
            Error::Unexpected(_) => "Unexpected",
        }
    }
}

/// Rendering wrapper around an [`Error`] producing the two user-visible
/// shapes the error handling design distinguishes: a framed multi-line
/// message for actionable precondition errors, and a single-line summary
/// plus a log-lookup id for everything else.
pub struct RenderedError<'a> {
    error: &'a Error,
    log_id: Uuid,
}

impl<'a> RenderedError<'a> {
    #[must_use]
    pub fn new(error: &'a Error, log_id: Uuid) -> Self {
        Self { error, log_id }
    }
}

impl std::fmt::Display for RenderedError<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.error {
            Error::ManufacturerPatternNotFound {
                manufacturer_name,
                stage,
                remediations,
                rebrand_hints,
                fuzzy_suggestions,
            } => {
                writeln!(f, "+-- error-code patterns unavailable " )?;
                writeln!(f, "| manufacturer: {manufacturer_name}")?;
                writeln!(f, "| stage: {stage:?}")?;
                writeln!(f, "| cause: no pattern set has been registered for this manufacturer key")?;
                writeln!(f, "| remediation:")?;
                for (i, r) in remediations.iter().enumerate() {
                    writeln!(f, "|   {}. {}", i + 1, r.summary)?;
                }
                if !rebrand_hints.is_empty() {
                    writeln!(f, "| known rebrands: {}", rebrand_hints.join(", "))?;
                }
                if !fuzzy_suggestions.is_empty() {
                    writeln!(f, "| did you mean: {}", fuzzy_suggestions.join(", "))?;
                }
                write!(f, "+--")
            }
            Error::ManufacturerMissing { document_id, stage } => {
                writeln!(f, "+-- manufacturer could not be resolved")?;
                writeln!(f, "| document: {document_id}")?;
                writeln!(f, "| stage: {stage:?}")?;
                writeln!(f, "| cause: no manufacturer hint was produced by classification")?;
                writeln!(f, "| remediation:")?;
                writeln!(f, "|   1. reprocess_stage after correcting classification")?;
                write!(f, "+--")
            }
            Error::EmbeddingDimensionMismatch { configured, actual } => {
                writeln!(f, "+-- embedding dimension mismatch")?;
                writeln!(f, "| configured dimension: {configured}")?;
                writeln!(f, "| provider returned: {actual}")?;
                writeln!(f, "| remediation:")?;
                writeln!(f, "|   1. align embedding.dimension with the configured model")?;
                write!(f, "+--")
            }
            other => write!(f, "{other} (id={})", self.log_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_recoverable() {
        let err = Error::ExternalServiceTimeout {
            service: "video-metadata".into(),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn precondition_kinds_are_not_recoverable() {
        let err = Error::ManufacturerMissing {
            document_id: Uuid::new_v4(),
            stage: Stage::ErrorCodeExtraction,
        };
        assert!(!err.is_recoverable());
        assert!(err.is_actionable());
    }

    #[test]
    fn rendered_actionable_error_is_framed() {
        let err = Error::ManufacturerPatternNotFound {
            manufacturer_name: "UTAX".into(),
            stage: Stage::ErrorCodeExtraction,
            remediations: vec![
                Remediation::new("copy from existing manufacturer"),
                Remediation::new("interactive creation"),
            ],
            rebrand_hints: vec!["UTAX -> Kyocera".into()],
            fuzzy_suggestions: vec![],
        };
        let rendered = RenderedError::new(&err, Uuid::new_v4()).to_string();
        assert!(rendered.contains("UTAX"));
        assert!(rendered.contains("Kyocera"));
    }

    #[test]
    fn rendered_other_error_is_single_line_plus_id() {
        let id = Uuid::new_v4();
        let err = Error::Storage("connection reset".into());
        let rendered = RenderedError::new(&err, id).to_string();
        assert!(rendered.contains(&id.to_string()));
        assert_eq!(rendered.lines().count(), 1);
    }

    #[test]
    fn kind_label_is_stable() {
        assert_eq!(
            Error::DuplicateDocument {
                file_hash: "abc".into(),
                existing_id: Uuid::new_v4(),
            }
            .kind_label(),
            "DuplicateDocument"
        );
    }
}
