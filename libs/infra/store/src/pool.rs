//! [libs/infra/store/src/pool.rs]
//! Connection pool sized for ~20 concurrent holders. Reads are
//! lock-free and run in parallel with one writer; an acquire that would
//! exceed the cap waits briefly rather than silently dropping the caller.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use libsql::{Connection, Database};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::errors::StoreError;

pub const DEFAULT_POOL_SIZE: usize = 20;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct StorePool {
    database: Arc<Database>,
    permits: Arc<Semaphore>,
}

pub struct PooledConnection {
    connection: Connection,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        &self.connection
    }
}

impl StorePool {
    pub fn new(database: Arc<Database>, size: usize) -> Self {
        Self {
            database,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    /// Waits for a free slot (up to `ACQUIRE_TIMEOUT`) then opens a fresh
    /// connection. Never silently drops a caller: timeout surfaces as
    /// `StoreError::Busy` so the API layer can map it to `StorageBusy`.
    pub async fn acquire(&self) -> Result<PooledConnection, StoreError> {
        let permit = tokio::time::timeout(ACQUIRE_TIMEOUT, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| {
                warn!("⚠️ [POOL_FAULT]: acquire timed out, pool saturated");
                StoreError::Busy
            })?
            .expect("pool semaphore is never closed");

        let connection = self
            .database
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(PooledConnection {
            connection,
            _permit: permit,
        })
    }

    /// Single-file consistent snapshot via the vendor's `VACUUM INTO` —
    /// a hot copy of the live database. `dest_path` must not already
    /// exist; SQLite refuses to overwrite it.
    pub async fn backup_to(&self, dest_path: &str) -> Result<(), StoreError> {
        let conn = self.acquire().await?;
        let sql = format!("VACUUM INTO '{}'", dest_path.replace('\'', "''"));
        conn.execute(&sql, ()).await.map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
