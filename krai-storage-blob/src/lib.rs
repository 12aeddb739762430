#![allow(clippy::excessive_nesting)]

//! # krai-storage-blob
//!
//! redb embedded backend for the engine's content-addressed [`BlobStore`]
//! contract (spec §6): original uploads, rasterized page images, and
//! derived artifacts, addressed by `(bucket, key)`.
//!
//! A single redb table holds every bucket, keyed by `"<bucket>/<key>"` —
//! buckets are an addressing convention, not separate physical tables,
//! since the engine never needs to enumerate or bulk-operate on a bucket
//! as a unit.
//!
//! ## Example
//!
//! ```no_run
//! use krai_storage_blob::RedbBlobStore;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = RedbBlobStore::new(Path::new("./blobs.redb")).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use krai_core::error::{Error, Result};
use krai_core::storage::{BlobKey, BlobStore};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const BLOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");

/// Timeout for a single redb operation (spawn_blocking never normally
/// blocks this long; a hang here means the underlying disk is wedged).
const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a blocking redb operation on the blocking pool, bounded by
/// [`DB_OPERATION_TIMEOUT`].
async fn with_db_timeout<T, F>(operation: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(DB_OPERATION_TIMEOUT, tokio::task::spawn_blocking(operation)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::BlobStore(format!("task join error: {join_err}"))),
        Err(_) => Err(Error::BlobStore(format!(
            "blob store operation timed out after {DB_OPERATION_TIMEOUT:?}"
        ))),
    }
}

fn table_key(key: &BlobKey) -> String {
    format!("{}/{}", key.bucket, key.key)
}

/// redb-backed [`BlobStore`]. Cloning is cheap (an `Arc<Database>`
/// internally); the typical deployment shares one instance across all
/// stage-runner workers.
#[derive(Clone)]
pub struct RedbBlobStore {
    db: Arc<Database>,
}

impl RedbBlobStore {
    /// Open (creating if absent) a redb database at `path` and ensure the
    /// blob table exists.
    pub async fn new(path: &Path) -> Result<Self> {
        info!("opening blob store at {}", path.display());
        let path_buf = path.to_path_buf();
        let db = with_db_timeout(move || {
            Database::create(&path_buf)
                .map_err(|e| Error::BlobStore(format!("failed to open blob database: {e}")))
        })
        .await?;
        let store = Self { db: Arc::new(db) };
        store.initialize_table().await?;
        Ok(store)
    }

    async fn initialize_table(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::BlobStore(format!("failed to begin write transaction: {e}")))?;
            {
                let _ = write_txn
                    .open_table(BLOBS_TABLE)
                    .map_err(|e| Error::BlobStore(format!("failed to open blobs table: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::BlobStore(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl BlobStore for RedbBlobStore {
    async fn put(&self, key: &BlobKey, data: Vec<u8>) -> Result<()> {
        let db = Arc::clone(&self.db);
        let table_key_str = table_key(key);
        debug!(key = %table_key_str, bytes = data.len(), "put blob");
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::BlobStore(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(BLOBS_TABLE)
                    .map_err(|e| Error::BlobStore(format!("failed to open blobs table: {e}")))?;
                table
                    .insert(table_key_str.as_str(), data.as_slice())
                    .map_err(|e| Error::BlobStore(format!("failed to insert blob: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::BlobStore(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>> {
        let db = Arc::clone(&self.db);
        let table_key_str = table_key(key);
        let bucket = key.bucket.clone();
        let raw_key = key.key.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::BlobStore(format!("failed to begin read transaction: {e}")))?;
            let table = read_txn
                .open_table(BLOBS_TABLE)
                .map_err(|e| Error::BlobStore(format!("failed to open blobs table: {e}")))?;
            let value = table
                .get(table_key_str.as_str())
                .map_err(|e| Error::BlobStore(format!("failed to read blob: {e}")))?;
            value
                .map(|v| v.value().to_vec())
                .ok_or_else(|| Error::CorruptBlob {
                    bucket: bucket.clone(),
                    key: raw_key.clone(),
                    reason: "blob was never put or has been deleted".to_string(),
                })
        })
        .await
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let table_key_str = table_key(key);
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::BlobStore(format!("failed to begin read transaction: {e}")))?;
            let table = read_txn
                .open_table(BLOBS_TABLE)
                .map_err(|e| Error::BlobStore(format!("failed to open blobs table: {e}")))?;
            Ok(table
                .get(table_key_str.as_str())
                .map_err(|e| Error::BlobStore(format!("failed to read blob: {e}")))?
                .is_some())
        })
        .await
    }

    async fn delete(&self, key: &BlobKey) -> Result<()> {
        let db = Arc::clone(&self.db);
        let table_key_str = table_key(key);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::BlobStore(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(BLOBS_TABLE)
                    .map_err(|e| Error::BlobStore(format!("failed to open blobs table: {e}")))?;
                table
                    .remove(table_key_str.as_str())
                    .map_err(|e| Error::BlobStore(format!("failed to remove blob: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::BlobStore(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krai_core::storage::blob::buckets;

    async fn store() -> RedbBlobStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.redb");
        let store = RedbBlobStore::new(&path).await.unwrap();
        std::mem::forget(dir); // keep the tempdir alive for the store's lifetime in the test
        store
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = store().await;
        let key = BlobKey::new(buckets::DOCUMENTS, "sha256/abc/manual.pdf");
        store.put(&key, b"%PDF-1.4".to_vec()).await.unwrap();
        let data = store.get(&key).await.unwrap();
        assert_eq!(data, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn get_missing_key_is_corrupt_blob() {
        let store = store().await;
        let key = BlobKey::new(buckets::DOCUMENTS, "sha256/missing/x.pdf");
        let err = store.get(&key).await.unwrap_err();
        assert!(matches!(err, Error::CorruptBlob { .. }));
    }

    #[tokio::test]
    async fn exists_reflects_put_and_delete() {
        let store = store().await;
        let key = BlobKey::new(buckets::DOCUMENT_IMAGES, "doc-1/p1/raster.png");
        assert!(!store.exists(&key).await.unwrap());
        store.put(&key, vec![1, 2, 3]).await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_not_an_error() {
        let store = store().await;
        let key = BlobKey::new(buckets::ERROR_IMAGES, "doc-1/p2/crop.png");
        store.delete(&key).await.unwrap();
    }
}
