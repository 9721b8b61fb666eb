// Database schema definitions and migration system
//
// Defines the SQLite tables for session continuity data and a versioned
// migration path for future schema changes.

use super::client::{SessionStore, StoreError};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQL statements to create all tables (each as a separate string)
const CREATE_TABLES: &[&str] = &[
    // One row per recording session; at most one row has is_active = 1
    r#"CREATE TABLE IF NOT EXISTS recording_session (
        session_id TEXT PRIMARY KEY,
        start_time INTEGER NOT NULL,
        status TEXT NOT NULL,
        paused_accumulated_ms INTEGER NOT NULL DEFAULT 0,
        last_chunk_index INTEGER NOT NULL DEFAULT 0,
        output_directory TEXT NOT NULL,
        base_file_name TEXT NOT NULL,
        audio_source TEXT NOT NULL,
        pause_reason TEXT,
        last_activity INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )"#,
    // Physical capture segments belonging to a session
    r#"CREATE TABLE IF NOT EXISTS audio_chunk (
        chunk_id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        file_path TEXT NOT NULL,
        start_time INTEGER NOT NULL,
        end_time INTEGER,
        duration_ms INTEGER NOT NULL DEFAULT 0,
        file_size_bytes INTEGER NOT NULL DEFAULT 0,
        is_complete INTEGER NOT NULL DEFAULT 0,
        needs_merging INTEGER NOT NULL DEFAULT 1,
        FOREIGN KEY (session_id) REFERENCES recording_session(session_id) ON DELETE CASCADE
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_audio_chunk_session_index
       ON audio_chunk(session_id, chunk_index)"#,
    // Deferred repair work queued for abandoned sessions
    r#"CREATE TABLE IF NOT EXISTS recovery_task (
        task_id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        task_type TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        created_at INTEGER NOT NULL,
        completed_at INTEGER,
        error_message TEXT,
        retry_count INTEGER NOT NULL DEFAULT 0,
        max_retries INTEGER NOT NULL DEFAULT 3
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_recovery_task_status ON recovery_task(status)"#,
];

/// Initialize the database schema.
///
/// Creates all tables if they don't exist and runs any pending migrations.
/// Called once during engine startup after the store is opened.
pub async fn initialize_schema(store: &SessionStore) -> Result<(), StoreError> {
    store
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            (),
        )
        .await?;

    let current_version = get_schema_version(store).await?;

    if current_version == 0 {
        crate::info!("[store] initializing schema (version {})", SCHEMA_VERSION);
        for statement in CREATE_TABLES {
            store.execute(statement, ()).await?;
        }
        set_schema_version(store, SCHEMA_VERSION).await?;
    } else if current_version < SCHEMA_VERSION {
        crate::info!(
            "[store] migrating schema from version {} to {}",
            current_version,
            SCHEMA_VERSION
        );
        run_migrations(store, current_version, SCHEMA_VERSION).await?;
    } else {
        crate::debug!("[store] schema is up to date (version {})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database.
/// Returns 0 if the schema_version table holds no row yet.
async fn get_schema_version(store: &SessionStore) -> Result<i32, StoreError> {
    let mut rows = store
        .query("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1", ())
        .await?;

    match rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
        Some(row) => {
            let version: i32 = row.get(0).map_err(|e| StoreError::Query(e.to_string()))?;
            Ok(version)
        }
        None => Ok(0),
    }
}

async fn set_schema_version(store: &SessionStore, version: i32) -> Result<(), StoreError> {
    store
        .execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            libsql::params![version],
        )
        .await?;
    Ok(())
}

/// Run migrations from one version to another.
async fn run_migrations(
    store: &SessionStore,
    from_version: i32,
    to_version: i32,
) -> Result<(), StoreError> {
    for version in (from_version + 1)..=to_version {
        match version {
            _ => {
                crate::debug!("[store] no migration needed for version {}", version);
            }
        }
        set_schema_version(store, version).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
