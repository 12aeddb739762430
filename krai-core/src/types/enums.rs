//! Closed enumerations from the data model and stage pipeline.

use serde::{Deserialize, Serialize};

/// Recognized document categories. New kinds are a schema change, not a
/// runtime extension point — extractors match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    ServiceManual,
    PartsCatalog,
    TechnicalBulletin,
    CpmdDatabase,
    UserManual,
    InstallationGuide,
    TroubleshootingGuide,
}

impl DocumentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceManual => "service_manual",
            Self::PartsCatalog => "parts_catalog",
            Self::TechnicalBulletin => "technical_bulletin",
            Self::CpmdDatabase => "cpmd_database",
            Self::UserManual => "user_manual",
            Self::InstallationGuide => "installation_guide",
            Self::TroubleshootingGuide => "troubleshooting_guide",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "service_manual" => Self::ServiceManual,
            "parts_catalog" => Self::PartsCatalog,
            "technical_bulletin" => Self::TechnicalBulletin,
            "cpmd_database" => Self::CpmdDatabase,
            "user_manual" => Self::UserManual,
            "installation_guide" => Self::InstallationGuide,
            "troubleshooting_guide" => Self::TroubleshootingGuide,
            _ => return None,
        })
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level document lifecycle status (distinct from per-stage state,
/// see [`StageState`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Result status returned from the ingest API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    New,
    Duplicate,
    Reprocessing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Raster,
    Svg,
    VectorGraphic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Unchecked,
    Ok,
    Broken,
    Redirected,
}

/// Owner of an embedding row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Chunk,
    Image,
    Table,
}

/// Status of a [`crate::types::QueueItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Leased,
    Completed,
    Failed,
    Retrying,
}

/// Per-(document, stage) state machine value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    NotStarted,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StageState {
    /// Whether progress accounting should treat this state as done.
    #[must_use]
    pub fn counts_as_complete(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineErrorStatus {
    Pending,
    Retrying,
    Resolved,
}

/// The fixed, ordered pipeline stages. The order of these variants *is*
/// the canonical stage order; `Stage::ALL` must never be reordered without
/// updating every prerequisite check that relies on array position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    TextExtraction,
    ImageProcessing,
    Classification,
    MetadataExtraction,
    ErrorCodeExtraction,
    ChunkPrep,
    Enrichment,
    Embedding,
    SearchIndexing,
}

impl Stage {
    /// Canonical pipeline order, upload first.
    pub const ALL: [Stage; 10] = [
        Stage::Upload,
        Stage::TextExtraction,
        Stage::ImageProcessing,
        Stage::Classification,
        Stage::MetadataExtraction,
        Stage::ErrorCodeExtraction,
        Stage::ChunkPrep,
        Stage::Enrichment,
        Stage::Embedding,
        Stage::SearchIndexing,
    ];

    /// Stable wire identifier, matching spec.md's literal stage strings
    /// (notably `chunk_prep`, not `chunking`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::TextExtraction => "text_extraction",
            Self::ImageProcessing => "image_processing",
            Self::Classification => "classification",
            Self::MetadataExtraction => "metadata_extraction",
            Self::ErrorCodeExtraction => "error_code_extraction",
            Self::ChunkPrep => "chunk_prep",
            Self::Enrichment => "enrichment",
            Self::Embedding => "embedding",
            Self::SearchIndexing => "search_indexing",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == s)
    }

    /// The stage immediately preceding this one in the fixed order, if any.
    #[must_use]
    pub fn prerequisite(self) -> Option<Stage> {
        let idx = Self::ALL.iter().position(|&s| s == self)?;
        idx.checked_sub(1).map(|i| Self::ALL[i])
    }

    /// The stage immediately following this one in the fixed order, if any.
    /// `search_indexing` is terminal.
    #[must_use]
    pub fn successor(self) -> Option<Stage> {
        let idx = Self::ALL.iter().position(|&s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.successor().is_none()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        assert_eq!(Stage::Upload.successor(), Some(Stage::TextExtraction));
        assert_eq!(
            Stage::ErrorCodeExtraction.prerequisite(),
            Some(Stage::MetadataExtraction)
        );
        assert!(Stage::SearchIndexing.is_terminal());
    }

    #[test]
    fn stage_round_trips_through_wire_string() {
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
    }

    #[test]
    fn document_type_round_trips() {
        for dt in [
            DocumentType::ServiceManual,
            DocumentType::CpmdDatabase,
            DocumentType::TroubleshootingGuide,
        ] {
            assert_eq!(DocumentType::parse(dt.as_str()), Some(dt));
        }
    }
}
