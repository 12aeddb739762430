//! Config file loading and storage backend wiring.

use anyhow::Context;
use krai_core::pattern::PatternRegistry;
use krai_core::queue::ProcessingQueue;
use krai_core::security::audit::AuditLogger;
use krai_core::stage::StageTracker;
use krai_core::storage::{BlobStore, StorageBackend};
use krai_core::types::QueueConfig;
use krai_core::DocumentProcessor;
use krai_storage_blob::RedbBlobStore;
use krai_storage_sql::TursoStorageBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub patterns: PatternsConfig,
    pub cli: CliConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// libSQL connection url, e.g. `file:./krai.db` or `libsql://...`.
    pub url: String,
    /// Auth token for a remote Turso database; empty for local files.
    pub auth_token: String,
    /// Path to the redb blob store database file.
    pub blob_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// Path to the manufacturer error-code pattern TOML file.
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub default_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "file:./krai.db".to_string(),
                auth_token: String::new(),
                blob_path: "./krai-blobs.redb".to_string(),
            },
            patterns: PatternsConfig {
                file_path: "./patterns.toml".to_string(),
            },
            cli: CliConfig {
                default_format: "human".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the first
    /// default location found, falling back to [`Config::default`].
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file: {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("failed to parse config file: {}", path.display()))
            }
            None => {
                for candidate in default_config_paths() {
                    if candidate.exists() {
                        return Self::load(Some(&candidate));
                    }
                }
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("database.url must be set");
        }
        if self.database.blob_path.is_empty() {
            anyhow::bail!("database.blob_path must be set");
        }
        match self.cli.default_format.as_str() {
            "human" | "json" | "yaml" => {}
            _ => anyhow::bail!("cli.default_format must be 'human', 'json', or 'yaml'"),
        }
        Ok(())
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("krai.toml"), PathBuf::from(".krai.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("krai").join("config.toml"));
    }
    paths
}

/// Everything a command handler needs to talk to the engine.
pub struct Engine {
    pub processor: DocumentProcessor,
    pub registry: PatternRegistry,
    pub patterns_path: PathBuf,
}

/// Wire up storage, the pattern registry, and the orchestrator from
/// `config`. Loads the pattern file if present; an absent pattern file is
/// not an error here (individual stages fail loudly when they need a
/// manufacturer's patterns and find none).
pub async fn initialize_engine(config: &Config) -> anyhow::Result<Engine> {
    let sql = TursoStorageBackend::new(&config.database.url, &config.database.auth_token)
        .await
        .context("failed to open the relational storage backend")?;
    sql.initialize_schema()
        .await
        .context("failed to initialize schema")?;
    let storage: Arc<dyn StorageBackend> = Arc::new(sql);

    let blob_path = PathBuf::from(&config.database.blob_path);
    let blob_store: Arc<dyn BlobStore> = Arc::new(
        RedbBlobStore::new(&blob_path)
            .await
            .context("failed to open the blob store")?,
    );

    let queue = ProcessingQueue::new(Arc::clone(&storage), QueueConfig::default());
    let tracker = StageTracker::new(Arc::clone(&storage));
    let processor = DocumentProcessor::new(storage, blob_store, queue, tracker, AuditLogger::disabled());

    let patterns_path = PathBuf::from(&config.patterns.file_path);
    let registry = if patterns_path.exists() {
        let contents = std::fs::read_to_string(&patterns_path)
            .with_context(|| format!("failed to read pattern file: {}", patterns_path.display()))?;
        PatternRegistry::load_from_str(&contents).context("pattern file failed validation")?
    } else {
        PatternRegistry::empty()
    };

    Ok(Engine { processor, registry, patterns_path })
}
