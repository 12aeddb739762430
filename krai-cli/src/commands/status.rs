use crate::config::Engine;
use crate::output::{Output, OutputFormat};
use clap::Args;
use krai_core::types::{DocumentProgress, Stage};
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub document_id: Uuid,
}

#[derive(Args, Debug)]
pub struct ReprocessStageArgs {
    pub document_id: Uuid,

    #[arg(value_parser = super::parse_stage)]
    pub stage: Stage,
}

#[derive(Args, Debug)]
pub struct ReprocessDocumentArgs {
    pub document_id: Uuid,
}

#[derive(Serialize)]
struct StatusReport {
    document_id: String,
    completed_stages: usize,
    total_stages: usize,
    fraction_complete: f32,
    stages: Vec<StageReport>,
}

#[derive(Serialize)]
struct StageReport {
    stage: String,
    state: String,
    retry_count: u32,
    error_kind: Option<String>,
}

impl From<&DocumentProgress> for StatusReport {
    fn from(progress: &DocumentProgress) -> Self {
        Self {
            document_id: progress.document_id.to_string(),
            completed_stages: progress.completed_stages,
            total_stages: progress.total_stages,
            fraction_complete: progress.fraction_complete(),
            stages: progress
                .stages
                .iter()
                .map(|s| StageReport {
                    stage: s.stage.as_str().to_string(),
                    state: format!("{:?}", s.state).to_lowercase(),
                    retry_count: s.retry_count,
                    error_kind: s.error_kind.clone(),
                })
                .collect(),
        }
    }
}

impl Output for StatusReport {
    fn write_human<W: Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "document {}", self.document_id)?;
        writeln!(
            writer,
            "progress: {}/{} stages ({:.0}%)",
            self.completed_stages,
            self.total_stages,
            self.fraction_complete * 100.0
        )?;
        for stage in &self.stages {
            let retry = if stage.retry_count > 0 {
                format!(" (retries: {})", stage.retry_count)
            } else {
                String::new()
            };
            let error = stage
                .error_kind
                .as_ref()
                .map(|k| format!(" [{k}]"))
                .unwrap_or_default();
            writeln!(writer, "  {:<20} {}{}{}", stage.stage, stage.state, retry, error)?;
        }
        Ok(())
    }
}

pub async fn handle_status(args: StatusArgs, engine: &Engine, format: OutputFormat) -> anyhow::Result<()> {
    let progress = engine.processor.get_status(args.document_id).await?;
    format.print_output(&StatusReport::from(&progress))
}

pub async fn handle_reprocess_stage(
    args: ReprocessStageArgs,
    engine: &Engine,
) -> anyhow::Result<()> {
    engine
        .processor
        .reprocess_stage(args.document_id, args.stage)
        .await?;
    println!("requeued {} at stage {}", args.document_id, args.stage.as_str());
    Ok(())
}

pub async fn handle_reprocess_document(
    args: ReprocessDocumentArgs,
    engine: &Engine,
) -> anyhow::Result<()> {
    engine.processor.reprocess_document(args.document_id).await?;
    println!("reset and requeued {} from text_extraction", args.document_id);
    Ok(())
}
