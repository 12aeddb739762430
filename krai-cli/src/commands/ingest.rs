use crate::config::Engine;
use crate::output::{Output, OutputFormat};
use clap::Args;
use krai_core::orchestrator::IngestOptions;
use krai_core::types::DocumentType;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Path to the file to ingest.
    pub file: PathBuf,

    /// Document category, e.g. service_manual, parts_catalog, cpmd_database.
    #[arg(long, value_parser = super::parse_document_type)]
    pub document_type: DocumentType,

    /// BCP-47 language tag of the document's primary text.
    #[arg(long)]
    pub language: Option<String>,

    /// Who (or what automation) submitted this upload.
    #[arg(long)]
    pub uploaded_by: Option<String>,

    /// Reset and re-run every stage even if this file was already ingested.
    #[arg(long)]
    pub force_reprocess: bool,
}

#[derive(Serialize)]
struct IngestReport {
    document_id: String,
    status: String,
    file_hash: String,
}

impl Output for IngestReport {
    fn write_human<W: Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "document_id: {}", self.document_id)?;
        writeln!(writer, "status:      {}", self.status)?;
        writeln!(writer, "file_hash:   {}", self.file_hash)?;
        Ok(())
    }
}

pub async fn handle_ingest(args: IngestArgs, engine: &Engine, format: OutputFormat) -> anyhow::Result<()> {
    let blob = std::fs::read(&args.file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", args.file.display()))?;
    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let options = IngestOptions {
        language: args.language,
        force_reprocess: args.force_reprocess,
        uploaded_by: args.uploaded_by,
    };

    let outcome = engine
        .processor
        .ingest(blob, filename, args.document_type, options)
        .await?;

    let report = IngestReport {
        document_id: outcome.document_id.to_string(),
        status: format!("{:?}", outcome.status).to_lowercase(),
        file_hash: outcome.file_hash,
    };
    format.print_output(&report)
}
