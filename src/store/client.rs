// libsql connection wrapper for the durable session store
//
// One local database file holds sessions, chunks, and recovery tasks. All
// higher-level operations go through the execute/query helpers here so
// error mapping stays in one place.

use std::path::PathBuf;

use libsql::{Builder, Connection, Database};
use thiserror::Error;

/// Errors from the embedded database.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("failed to open session store: {0}")]
    Open(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("store constraint violated: {0}")]
    Constraint(String),
}

/// Handle to the embedded SQLite database backing session persistence.
pub struct SessionStore {
    conn: Connection,
    // The database handle owns the underlying file; keep it alive for as
    // long as the connection is in use.
    _db: Database,
}

impl SessionStore {
    /// Open (or create) the store under `db_dir`.
    pub async fn new(db_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&db_dir).map_err(|e| StoreError::Open(e.to_string()))?;
        let db_path = db_dir.join("sessions.db");
        crate::info!("[store] opening session store at {}", db_path.display());
        Self::open(db_path.to_string_lossy().as_ref()).await
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:").await
    }

    async fn open(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;
        let conn = db.connect().map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn, _db: db })
    }

    /// Execute a statement, returning the number of affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<u64, StoreError> {
        self.conn.execute(sql, params).await.map_err(map_libsql_error)
    }

    /// Run a query and hand back the row cursor.
    pub async fn query(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<libsql::Rows, StoreError> {
        self.conn.query(sql, params).await.map_err(map_libsql_error)
    }
}

fn map_libsql_error(e: libsql::Error) -> StoreError {
    let message = e.to_string();
    if message.contains("UNIQUE") || message.contains("constraint") {
        StoreError::Constraint(message)
    } else {
        StoreError::Query(message)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
