//! Command implementations. Each handler borrows the wired-up
//! [`crate::config::Engine`] and does nothing but parse arguments, call
//! into `krai-core`, and format the result — all processing logic lives
//! in the engine.

mod ingest;
mod patterns;
mod status;

pub use ingest::{handle_ingest, IngestArgs};
pub use patterns::{handle_create_patterns, handle_list_patterns, CreatePatternsArgs};
pub use status::{
    handle_reprocess_document, handle_reprocess_stage, handle_status, ReprocessDocumentArgs,
    ReprocessStageArgs, StatusArgs,
};

use krai_core::types::{DocumentType, Stage};

/// `clap` value parser for [`DocumentType`] — the type has no `ValueEnum`
/// derive in `krai-core` since its variant set is a data-model concern,
/// not a CLI one.
pub fn parse_document_type(s: &str) -> Result<DocumentType, String> {
    DocumentType::parse(s).ok_or_else(|| {
        format!(
            "unrecognized document type {s:?}; expected one of: service_manual, parts_catalog, \
             technical_bulletin, cpmd_database, user_manual, installation_guide, troubleshooting_guide"
        )
    })
}

/// `clap` value parser for [`Stage`].
pub fn parse_stage(s: &str) -> Result<Stage, String> {
    Stage::parse(s).ok_or_else(|| {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        format!("unrecognized stage {s:?}; expected one of: {}", names.join(", "))
    })
}
