// ============================================================================
// Data model: entities (structs.rs), closed enumerations (enums.rs),
// validation/default constants (constants.rs), and the configuration
// value types the pattern registry and queue consume (config.rs).
// ============================================================================

pub mod config;
pub mod constants;
pub mod enums;
pub mod structs;

pub use config::{EngineConfig, ExtractionRules, QueueConfig, RetryPolicy};
pub use constants::*;
pub use enums::{
    DocumentType, ImageType, IngestStatus, OwnerKind, PipelineErrorStatus, ProcessingStatus,
    QueueItemStatus, Stage, StageState, ValidationStatus,
};
pub use structs::{
    Chunk, Document, DocumentProgress, Embedding, ErrorCode, Image, Link, Manufacturer,
    PipelineError, Product, ProductSeries, QueueItem, StageStatus, Video,
};

#[cfg(test)]
mod tests;
