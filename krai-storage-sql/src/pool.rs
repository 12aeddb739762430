//! Connection pool for libSQL connections.
//!
//! libSQL's `Database` is already a connection factory; this pool adds a
//! concurrency limit via semaphore, optional health checks, and checkout
//! statistics so the adapter degrades predictably under load rather than
//! opening unbounded connections per request.

use krai_core::error::{Error, Result};
use libsql::{Connection, Database};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub connection_timeout: Duration,
    pub enable_health_check: bool,
    pub health_check_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_secs(5),
            enable_health_check: true,
            health_check_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolStatistics {
    pub total_created: usize,
    pub total_health_checks_passed: usize,
    pub total_health_checks_failed: usize,
    pub active_connections: usize,
    pub total_wait_time_ms: u64,
    pub total_checkouts: usize,
    pub avg_wait_time_ms: u64,
}

impl PoolStatistics {
    fn update_averages(&mut self) {
        if self.total_checkouts > 0 {
            self.avg_wait_time_ms = self.total_wait_time_ms / self.total_checkouts as u64;
        }
    }
}

/// A checked-out connection; releases its semaphore permit on drop.
#[derive(Debug)]
pub struct PooledConnection {
    connection: Option<Connection>,
    _permit: OwnedSemaphorePermit,
    stats: Arc<RwLock<PoolStatistics>>,
}

impl PooledConnection {
    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn into_inner(mut self) -> Result<Connection> {
        self.connection
            .take()
            .ok_or_else(|| Error::Storage("connection already taken".to_string()))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let mut stats = self.stats.write();
        if stats.active_connections > 0 {
            stats.active_connections -= 1;
        }
    }
}

/// Semaphore-bounded pool of libSQL connections.
pub struct ConnectionPool {
    db: Arc<Database>,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    stats: Arc<RwLock<PoolStatistics>>,
}

impl ConnectionPool {
    pub async fn new(db: Arc<Database>, config: PoolConfig) -> Result<Self> {
        info!(max_connections = config.max_connections, "creating connection pool");
        let semaphore = Arc::new(Semaphore::new(config.max_connections));
        let stats = Arc::new(RwLock::new(PoolStatistics::default()));
        let pool = Self { db, config, semaphore, stats };
        pool.validate_database().await?;
        Ok(pool)
    }

    async fn validate_database(&self) -> Result<()> {
        let conn = self
            .db
            .connect()
            .map_err(|e| Error::Storage(format!("failed to connect: {e}")))?;
        conn.query("SELECT 1", ())
            .await
            .map_err(|e| Error::Storage(format!("database validation failed: {e}")))?;
        Ok(())
    }

    async fn create_connection(&self) -> Result<Connection> {
        let conn = self
            .db
            .connect()
            .map_err(|e| Error::Storage(format!("failed to create connection: {e}")))?;
        self.stats.write().total_created += 1;
        Ok(conn)
    }

    /// Acquire a connection, waiting up to `config.connection_timeout` for
    /// a semaphore permit. Validates health when `enable_health_check`.
    pub async fn get(&self) -> Result<PooledConnection> {
        let start = Instant::now();

        let owned_permit_fut = self.semaphore.clone().acquire_owned();
        let permit = tokio::time::timeout(self.config.connection_timeout, owned_permit_fut)
            .await
            .map_err(|_| {
                Error::Storage(format!(
                    "connection pool timeout after {:?}: max {} connections in use",
                    self.config.connection_timeout, self.config.max_connections
                ))
            })?
            .map_err(|e| Error::Storage(format!("failed to acquire connection permit: {e}")))?;

        let wait_time = start.elapsed();
        let conn = self.create_connection().await?;

        if self.config.enable_health_check {
            if let Err(e) = self.validate_connection_health(&conn).await {
                self.stats.write().total_health_checks_failed += 1;
                return Err(e);
            }
            self.stats.write().total_health_checks_passed += 1;
        }

        {
            let mut stats = self.stats.write();
            stats.total_checkouts += 1;
            stats.total_wait_time_ms += wait_time.as_millis() as u64;
            stats.active_connections += 1;
            stats.update_averages();
        }

        debug!(?wait_time, active = self.stats.read().active_connections, "connection acquired");

        Ok(PooledConnection { connection: Some(conn), _permit: permit, stats: Arc::clone(&self.stats) })
    }

    async fn validate_connection_health(&self, conn: &Connection) -> Result<()> {
        tokio::time::timeout(self.config.health_check_timeout, conn.query("SELECT 1", ()))
            .await
            .map_err(|_| Error::Storage("connection health check timeout".to_string()))?
            .map_err(|e| Error::Storage(format!("connection health check failed: {e}")))?;
        Ok(())
    }

    pub async fn statistics(&self) -> PoolStatistics {
        self.stats.read().clone()
    }

    pub async fn utilization(&self) -> f32 {
        let stats = self.stats.read();
        if self.config.max_connections == 0 {
            return 0.0;
        }
        stats.active_connections as f32 / self.config.max_connections as f32
    }

    pub async fn has_capacity(&self) -> bool {
        let stats = self.stats.read();
        stats.active_connections < self.config.max_connections
    }

    /// Waits (up to 30s) for active connections to drain before returning.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down connection pool");
        let shutdown_timeout = Duration::from_secs(30);
        let start = Instant::now();
        while start.elapsed() < shutdown_timeout {
            if self.stats.read().active_connections == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let remaining = self.stats.read().active_connections;
        if remaining > 0 {
            warn!(remaining, "shutdown completed with connections still checked out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn memory_pool(max_connections: usize) -> ConnectionPool {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let config = PoolConfig { max_connections, ..PoolConfig::default() };
        ConnectionPool::new(Arc::new(db), config).await.unwrap()
    }

    #[tokio::test]
    async fn checkout_and_drop_releases_capacity() {
        let pool = memory_pool(2).await;
        assert!(pool.has_capacity().await);
        let conn = pool.get().await.unwrap();
        assert_eq!(pool.statistics().await.active_connections, 1);
        drop(conn);
        assert_eq!(pool.statistics().await.active_connections, 0);
    }

    #[tokio::test]
    async fn checkout_beyond_capacity_times_out() {
        let mut config = PoolConfig { max_connections: 1, ..PoolConfig::default() };
        config.connection_timeout = Duration::from_millis(50);
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let pool = ConnectionPool::new(Arc::new(db), config).await.unwrap();
        let _held = pool.get().await.unwrap();
        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
