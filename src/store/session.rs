// Session and chunk persistence using libsql
//
// Every state-machine transition is written through here before it becomes
// externally observable, so the table contents are always good enough to
// recover from after a crash.

use std::str::FromStr;

use libsql::params;

use super::client::{SessionStore, StoreError};
use crate::session::model::{
    AudioChunk, AudioSourceKind, PauseReason, RecordingSession, SessionStatus,
};

impl SessionStore {
    /// Insert a freshly started session.
    pub async fn insert_session(&self, session: &RecordingSession) -> Result<(), StoreError> {
        self.execute(
            r#"INSERT INTO recording_session
               (session_id, start_time, status, paused_accumulated_ms, last_chunk_index,
                output_directory, base_file_name, audio_source, pause_reason, last_activity, is_active)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                session.session_id.clone(),
                session.start_time_ms,
                session.status.as_str(),
                session.paused_accumulated_ms,
                session.last_chunk_index,
                session.output_directory.clone(),
                session.base_file_name.clone(),
                session.audio_source.as_str(),
                session.pause_reason.map(|r| r.as_str()),
                session.last_activity_ms,
                session.is_active as i32
            ],
        )
        .await?;
        Ok(())
    }

    /// Record a status transition, together with the pause reason shown to
    /// the UI (the most significant one when several are active).
    pub async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        pause_reason: Option<PauseReason>,
        last_activity_ms: i64,
    ) -> Result<(), StoreError> {
        self.execute(
            r#"UPDATE recording_session
               SET status = ?1, pause_reason = ?2, last_activity = ?3
               WHERE session_id = ?4"#,
            params![
                status.as_str(),
                pause_reason.map(|r| r.as_str()),
                last_activity_ms,
                session_id
            ],
        )
        .await?;
        Ok(())
    }

    /// Persist accumulated pause time for elapsed-time reconstruction.
    pub async fn update_paused_accumulated(
        &self,
        session_id: &str,
        paused_accumulated_ms: i64,
    ) -> Result<(), StoreError> {
        self.execute(
            "UPDATE recording_session SET paused_accumulated_ms = ?1 WHERE session_id = ?2",
            params![paused_accumulated_ms, session_id],
        )
        .await?;
        Ok(())
    }

    /// Advance the highest chunk index created for a session.
    pub async fn update_last_chunk_index(
        &self,
        session_id: &str,
        last_chunk_index: i64,
    ) -> Result<(), StoreError> {
        self.execute(
            "UPDATE recording_session SET last_chunk_index = ?1 WHERE session_id = ?2",
            params![last_chunk_index, session_id],
        )
        .await?;
        Ok(())
    }

    /// Refresh the liveness timestamp without any other change.
    pub async fn touch_session(
        &self,
        session_id: &str,
        last_activity_ms: i64,
    ) -> Result<(), StoreError> {
        self.execute(
            "UPDATE recording_session SET last_activity = ?1 WHERE session_id = ?2",
            params![last_activity_ms, session_id],
        )
        .await?;
        Ok(())
    }

    /// Drop the active flag once the session has been merged or discarded.
    /// An inactive session is invisible to crash recovery.
    pub async fn deactivate_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.execute(
            "UPDATE recording_session SET is_active = 0 WHERE session_id = ?1",
            params![session_id],
        )
        .await?;
        Ok(())
    }

    pub async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<RecordingSession>, StoreError> {
        let mut rows = self
            .query(
                "SELECT * FROM recording_session WHERE session_id = ?1",
                params![session_id],
            )
            .await?;
        match rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            Some(row) => Ok(Some(session_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Sessions still marked active, oldest first. After a clean shutdown
    /// this is empty; anything here at startup was abandoned by a crash.
    pub async fn get_active_sessions(&self) -> Result<Vec<RecordingSession>, StoreError> {
        let mut rows = self
            .query(
                "SELECT * FROM recording_session WHERE is_active = 1 ORDER BY start_time ASC",
                (),
            )
            .await?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            sessions.push(session_from_row(&row)?);
        }
        Ok(sessions)
    }

    /// Insert a chunk row the moment its file is opened.
    pub async fn insert_chunk(&self, chunk: &AudioChunk) -> Result<(), StoreError> {
        self.execute(
            r#"INSERT INTO audio_chunk
               (chunk_id, session_id, chunk_index, file_path, start_time, end_time,
                duration_ms, file_size_bytes, is_complete, needs_merging)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                chunk.chunk_id.clone(),
                chunk.session_id.clone(),
                chunk.chunk_index,
                chunk.file_path.clone(),
                chunk.start_time_ms,
                chunk.end_time_ms,
                chunk.duration_ms,
                chunk.file_size_bytes,
                chunk.is_complete as i32,
                chunk.needs_merging as i32
            ],
        )
        .await?;
        Ok(())
    }

    /// Seal a chunk once its file is finalized on disk.
    pub async fn complete_chunk(
        &self,
        chunk_id: &str,
        end_time_ms: i64,
        duration_ms: i64,
        file_size_bytes: i64,
    ) -> Result<(), StoreError> {
        self.execute(
            r#"UPDATE audio_chunk
               SET end_time = ?1, duration_ms = ?2, file_size_bytes = ?3, is_complete = 1
               WHERE chunk_id = ?4"#,
            params![end_time_ms, duration_ms, file_size_bytes, chunk_id],
        )
        .await?;
        Ok(())
    }

    /// All chunks of a session in playback order.
    pub async fn chunks_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<AudioChunk>, StoreError> {
        let mut rows = self
            .query(
                "SELECT * FROM audio_chunk WHERE session_id = ?1 ORDER BY chunk_index ASC",
                params![session_id],
            )
            .await?;
        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            chunks.push(chunk_from_row(&row)?);
        }
        Ok(chunks)
    }

    /// Chunks whose files were never finalized (at most one per session).
    pub async fn incomplete_chunks(
        &self,
        session_id: &str,
    ) -> Result<Vec<AudioChunk>, StoreError> {
        let mut rows = self
            .query(
                r#"SELECT * FROM audio_chunk
                   WHERE session_id = ?1 AND is_complete = 0
                   ORDER BY chunk_index ASC"#,
                params![session_id],
            )
            .await?;
        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            chunks.push(chunk_from_row(&row)?);
        }
        Ok(chunks)
    }

    /// Mark a whole session's chunks as merged.
    pub async fn clear_needs_merging(&self, session_id: &str) -> Result<(), StoreError> {
        self.execute(
            "UPDATE audio_chunk SET needs_merging = 0 WHERE session_id = ?1",
            params![session_id],
        )
        .await?;
        Ok(())
    }

    /// Remove a session and everything hanging off it: chunk rows and
    /// recovery tasks included.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.execute(
            "DELETE FROM recovery_task WHERE session_id = ?1",
            params![session_id],
        )
        .await?;
        self.execute(
            "DELETE FROM audio_chunk WHERE session_id = ?1",
            params![session_id],
        )
        .await?;
        self.execute(
            "DELETE FROM recording_session WHERE session_id = ?1",
            params![session_id],
        )
        .await?;
        crate::debug!("[store] deleted session {} and its rows", session_id);
        Ok(())
    }

    /// Purge inactive sessions (and their chunks) whose last activity is
    /// older than `cutoff_ms`.
    pub async fn delete_stale_sessions(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        self.execute(
            r#"DELETE FROM audio_chunk WHERE session_id IN
               (SELECT session_id FROM recording_session
                WHERE is_active = 0 AND last_activity < ?1)"#,
            params![cutoff_ms],
        )
        .await?;
        self.execute(
            "DELETE FROM recording_session WHERE is_active = 0 AND last_activity < ?1",
            params![cutoff_ms],
        )
        .await
    }
}

fn session_from_row(row: &libsql::Row) -> Result<RecordingSession, StoreError> {
    let status: String = row.get(2).map_err(query_err)?;
    let audio_source: String = row.get(7).map_err(query_err)?;
    let pause_reason: Option<String> = row.get(8).map_err(query_err)?;
    let is_active: i64 = row.get(10).map_err(query_err)?;
    Ok(RecordingSession {
        session_id: row.get(0).map_err(query_err)?,
        start_time_ms: row.get(1).map_err(query_err)?,
        status: SessionStatus::from_str(&status).map_err(|e| StoreError::Query(e.to_string()))?,
        paused_accumulated_ms: row.get(3).map_err(query_err)?,
        last_chunk_index: row.get(4).map_err(query_err)?,
        output_directory: row.get(5).map_err(query_err)?,
        base_file_name: row.get(6).map_err(query_err)?,
        audio_source: AudioSourceKind::from_str(&audio_source)
            .map_err(|e| StoreError::Query(e.to_string()))?,
        pause_reason: pause_reason
            .map(|r| PauseReason::from_str(&r))
            .transpose()
            .map_err(|e| StoreError::Query(e.to_string()))?,
        last_activity_ms: row.get(9).map_err(query_err)?,
        is_active: is_active != 0,
    })
}

fn chunk_from_row(row: &libsql::Row) -> Result<AudioChunk, StoreError> {
    let is_complete: i64 = row.get(8).map_err(query_err)?;
    let needs_merging: i64 = row.get(9).map_err(query_err)?;
    Ok(AudioChunk {
        chunk_id: row.get(0).map_err(query_err)?,
        session_id: row.get(1).map_err(query_err)?,
        chunk_index: row.get(2).map_err(query_err)?,
        file_path: row.get(3).map_err(query_err)?,
        start_time_ms: row.get(4).map_err(query_err)?,
        end_time_ms: row.get(5).map_err(query_err)?,
        duration_ms: row.get(6).map_err(query_err)?,
        file_size_bytes: row.get(7).map_err(query_err)?,
        is_complete: is_complete != 0,
        needs_merging: needs_merging != 0,
    })
}

pub(super) fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
