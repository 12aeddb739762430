use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod errors;
mod output;

use commands::{
    handle_create_patterns, handle_ingest, handle_list_patterns, handle_reprocess_document,
    handle_reprocess_stage, handle_status, CreatePatternsArgs, IngestArgs, ReprocessDocumentArgs,
    ReprocessStageArgs, StatusArgs,
};
use config::{initialize_engine, Config};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "krai")]
#[command(about = "Document ingestion and enrichment engine CLI")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format; overrides the config file's `cli.default_format`.
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and enqueue it for processing.
    Ingest(IngestArgs),
    /// Show per-stage status and overall progress for a document.
    Status(StatusArgs),
    /// Reset and re-run a single stage on an already-ingested document.
    ReprocessStage(ReprocessStageArgs),
    /// Reset every stage and re-run from `text_extraction`.
    ReprocessDocument(ReprocessDocumentArgs),
    /// Create a manufacturer error-code pattern set.
    CreatePatterns(CreatePatternsArgs),
    /// List manufacturers with registered error-code patterns.
    ListPatterns,
    /// Generate a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completion { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "krai", &mut std::io::stdout());
        return Ok(());
    }

    let filter = if cli.verbose { "krai_cli=debug,krai_core=debug,info" } else { "info" };
    krai_core::tracing::init_tracing(Some(filter));

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;
    let format = cli.format.unwrap_or_else(|| parse_default_format(&config.cli.default_format));
    let engine = initialize_engine(&config).await?;

    match cli.command {
        Commands::Ingest(args) => handle_ingest(args, &engine, format).await,
        Commands::Status(args) => handle_status(args, &engine, format).await,
        Commands::ReprocessStage(args) => handle_reprocess_stage(args, &engine).await,
        Commands::ReprocessDocument(args) => handle_reprocess_document(args, &engine).await,
        Commands::CreatePatterns(args) => handle_create_patterns(args, &engine).await,
        Commands::ListPatterns => handle_list_patterns(&engine).await,
        Commands::Completion { .. } => unreachable!("handled before engine initialization"),
    }
}

fn parse_default_format(s: &str) -> OutputFormat {
    match s {
        "json" => OutputFormat::Json,
        "yaml" => OutputFormat::Yaml,
        _ => OutputFormat::Human,
    }
}
