#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # krai-storage-sql
//!
//! libSQL/Turso implementation of [`krai_core::storage::StorageBackend`]
//! (spec §4.3): documents, manufacturers, products, chunks, embeddings,
//! error codes, images, videos, links, the processing queue, stage
//! status, and pipeline errors, all in one database.
//!
//! ```no_run
//! use krai_storage_sql::TursoStorageBackend;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = TursoStorageBackend::new("file:krai.db", "").await?;
//! storage.initialize_schema().await?;
//! # Ok(())
//! # }
//! ```

mod enum_sql;
pub mod pool;
pub mod resilient;
mod schema;
mod storage;

pub use pool::{ConnectionPool, PoolConfig, PoolStatistics};
pub use resilient::ResilientStorageBackend;

use krai_core::error::{Error, Result};
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::info;

/// Retry/pooling knobs independent of connection URL.
#[derive(Debug, Clone)]
pub struct TursoConfig {
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub enable_pooling: bool,
}

impl Default for TursoConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 5000,
            enable_pooling: true,
        }
    }
}

/// libSQL-backed [`krai_core::storage::StorageBackend`]. Cheap to clone
/// (an `Arc<Database>` plus an optional pool).
pub struct TursoStorageBackend {
    db: Arc<Database>,
    pool: Option<Arc<ConnectionPool>>,
    config: TursoConfig,
}

impl TursoStorageBackend {
    /// `url` is one of `libsql://...` (remote, requires `token`), `file:path`
    /// (local file), or `:memory:`. Only these protocols are accepted —
    /// `http(s)://` is rejected to avoid an accidentally-unauthenticated
    /// connection to a Turso database.
    pub async fn new(url: &str, token: &str) -> Result<Self> {
        Self::with_config(url, token, TursoConfig::default()).await
    }

    pub async fn with_config(url: &str, token: &str, config: TursoConfig) -> Result<Self> {
        info!(url, "connecting to libSQL database");

        if !url.starts_with("libsql://") && !url.starts_with("file:") && url != ":memory:" {
            return Err(Error::Configuration(format!(
                "unsupported database url {url:?}: expected libsql://, file:, or :memory:"
            )));
        }
        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::Configuration(
                "authentication token required for remote libsql:// connections".to_string(),
            ));
        }

        let db = if let Some(remote) = url.strip_prefix("libsql://") {
            Builder::new_remote(format!("libsql://{remote}"), token.to_string())
                .build()
                .await
                .map_err(|e| Error::Storage(format!("failed to connect to {url}: {e}")))?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path)
                .build()
                .await
                .map_err(|e| Error::Storage(format!("failed to open {url}: {e}")))?
        };
        let db = Arc::new(db);

        let pool = if config.enable_pooling {
            Some(Arc::new(ConnectionPool::new(Arc::clone(&db), PoolConfig::default()).await?))
        } else {
            None
        };

        Ok(Self { db, pool, config })
    }

    /// Build from an already-open [`libsql::Database`]; used by tests and
    /// by callers that manage the connection lifecycle themselves.
    pub fn from_database(db: Database) -> Self {
        Self { db: Arc::new(db), pool: None, config: TursoConfig::default() }
    }

    async fn get_connection(&self) -> Result<Connection> {
        if let Some(pool) = &self.pool {
            pool.get().await?.into_inner()
        } else {
            self.db.connect().map_err(|e| Error::Storage(format!("failed to get connection: {e}")))
        }
    }

    /// Creates every table/index in [`schema::ALL_STATEMENTS`] if absent.
    /// Idempotent — safe to call on every process start.
    pub async fn initialize_schema(&self) -> Result<()> {
        let conn = self.get_connection().await?;
        conn.execute("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| Error::Storage(format!("failed to set WAL mode: {e}")))?;
        for statement in schema::ALL_STATEMENTS {
            self.execute_with_retry(&conn, statement).await?;
        }
        Ok(())
    }

    pub(crate) async fn execute_with_retry(&self, conn: &Connection, sql: &str) -> Result<u64> {
        let retry_config = krai_core::retry::RetryConfig::new()
            .with_max_retries(self.config.max_retries)
            .with_base_delay(std::time::Duration::from_millis(self.config.retry_base_delay_ms))
            .with_max_delay(std::time::Duration::from_millis(self.config.retry_max_delay_ms));
        let mut policy = krai_core::retry::RetryPolicy::with_config(retry_config);
        policy
            .execute(|| async {
                conn.execute(sql, ())
                    .await
                    .map_err(|e| Error::Storage(format!("schema statement failed: {e}")))
            })
            .await
    }

    pub async fn pool_statistics(&self) -> Option<PoolStatistics> {
        match &self.pool {
            Some(pool) => Some(pool.statistics().await),
            None => None,
        }
    }
}
