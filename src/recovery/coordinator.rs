// Startup crash recovery
//
// Any session still marked active when the engine boots was abandoned by
// a crash. The coordinator turns each one into durable repair tasks,
// then drains the task queue with bounded retries and exponential
// backoff. Every task re-run is idempotent, so a crash during recovery
// itself only costs time.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::audio::merger::{self, MergeError};
use crate::config::RecorderConfig;
use crate::events::{EngineEvent, RecoveryPayload};
use crate::session::model::{now_ms, AudioChunk, RecordingSession, SessionStatus, TaskStatus, TaskType};
use crate::store::{SessionStore, StoreError};

/// Outcome of one recovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryReport {
    pub sessions_recovered: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
}

pub struct RecoveryCoordinator {
    store: Arc<SessionStore>,
    config: RecorderConfig,
    events: Option<broadcast::Sender<EngineEvent>>,
}

impl RecoveryCoordinator {
    pub fn new(store: Arc<SessionStore>, config: RecorderConfig) -> Self {
        Self { store, config, events: None }
    }

    /// Announce the recovery outcome on an engine event stream, typically
    /// the one handed out by `Recorder::event_sink`.
    pub fn with_events(mut self, events: broadcast::Sender<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Full startup pass: requeue tasks stranded by a crash mid-recovery,
    /// queue repair work for every abandoned session, drain the queue,
    /// then purge data past the retention window.
    pub async fn recover(&self) -> Result<RecoveryReport, StoreError> {
        let stranded = self.store.requeue_stranded_tasks().await?;
        if stranded > 0 {
            crate::info!("[recovery] requeued {} task(s) stranded in progress", stranded);
        }

        let sessions = self.store.get_active_sessions().await?;
        if sessions.is_empty() && stranded == 0 {
            crate::debug!("[recovery] no abandoned sessions found");
        }
        for session in &sessions {
            self.queue_repairs(session).await?;
        }

        let mut report = self.drain_tasks().await?;
        report.sessions_recovered = sessions.len();

        self.purge_stale().await?;
        crate::info!(
            "[recovery] done: {} session(s), {} task(s) completed, {} failed",
            report.sessions_recovered,
            report.tasks_completed,
            report.tasks_failed
        );
        if let Some(events) = &self.events {
            let _ = events.send(EngineEvent::RecoveryCompleted(RecoveryPayload {
                sessions_recovered: report.sessions_recovered,
                tasks_completed: report.tasks_completed,
                tasks_failed: report.tasks_failed,
            }));
        }
        Ok(report)
    }

    async fn queue_repairs(&self, session: &RecordingSession) -> Result<(), StoreError> {
        if self.store.has_open_tasks(&session.session_id).await? {
            crate::debug!(
                "[recovery] session {} already has open tasks",
                session.session_id
            );
            return Ok(());
        }
        crate::info!(
            "[recovery] session {} was abandoned in status {}",
            session.session_id,
            session.status.as_str()
        );
        let max_retries = self.config.recovery.max_retries;
        let incomplete = self.store.incomplete_chunks(&session.session_id).await?;
        if !incomplete.is_empty() {
            self.store
                .enqueue_task(&session.session_id, TaskType::FinalizeChunk, max_retries)
                .await?;
        }
        let chunks = self.store.chunks_for_session(&session.session_id).await?;
        if chunks.is_empty() {
            self.store
                .enqueue_task(&session.session_id, TaskType::Cleanup, max_retries)
                .await?;
        } else {
            self.store
                .enqueue_task(&session.session_id, TaskType::MergeChunks, max_retries)
                .await?;
        }
        Ok(())
    }

    /// Run pending tasks until the queue is empty, backing off between
    /// passes that saw retryable failures.
    async fn drain_tasks(&self) -> Result<RecoveryReport, StoreError> {
        let mut report = RecoveryReport::default();
        let mut failed_passes: u32 = 0;
        loop {
            let tasks = self.store.pending_tasks().await?;
            if tasks.is_empty() {
                return Ok(report);
            }
            let mut retry_pending = false;
            for task in tasks {
                self.store.mark_task_in_progress(&task.task_id).await?;
                match self.execute_task(&task).await {
                    Ok(()) => {
                        self.store.mark_task_completed(&task.task_id).await?;
                        report.tasks_completed += 1;
                    }
                    Err(message) => {
                        crate::warn!(
                            "[recovery] {} task {} failed (attempt {}): {}",
                            task.task_type.as_str(),
                            task.task_id,
                            task.retry_count + 1,
                            message
                        );
                        let updated = self.store.mark_task_failed(&task.task_id, &message).await?;
                        if updated.status == TaskStatus::Failed {
                            report.tasks_failed += 1;
                        } else {
                            retry_pending = true;
                        }
                    }
                }
            }
            if retry_pending {
                failed_passes += 1;
                let backoff =
                    self.config.recovery.base_backoff() * 2u32.pow((failed_passes - 1).min(5));
                crate::debug!("[recovery] backing off {:?} before retry pass", backoff);
                tokio::time::sleep(backoff).await;
            }
        }
    }

    async fn execute_task(
        &self,
        task: &crate::session::model::RecoveryTask,
    ) -> Result<(), String> {
        match task.task_type {
            TaskType::FinalizeChunk => self.finalize_chunks(&task.session_id).await,
            TaskType::MergeChunks => self.merge_session(&task.session_id).await,
            TaskType::Cleanup => self.cleanup_session(&task.session_id).await,
        }
    }

    /// Seal chunk rows whose files were being written at crash time.
    /// Duration is estimated from file size at the assumed bitrate.
    async fn finalize_chunks(&self, session_id: &str) -> Result<(), String> {
        let incomplete = self
            .store
            .incomplete_chunks(session_id)
            .await
            .map_err(|e| e.to_string())?;
        for chunk in incomplete {
            let (size, duration_ms) = match std::fs::metadata(&chunk.file_path) {
                Ok(m) => {
                    let size = m.len();
                    (size as i64, merger::estimate_duration_ms(size) as i64)
                }
                Err(_) => {
                    crate::warn!(
                        "[recovery] chunk file missing, sealing empty: {}",
                        chunk.file_path
                    );
                    (0, 0)
                }
            };
            self.store
                .complete_chunk(
                    &chunk.chunk_id,
                    chunk.start_time_ms + duration_ms,
                    duration_ms,
                    size,
                )
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Merge a crashed session's chunks into its final output file and
    /// retire the session. Safe to run again after a partial failure.
    async fn merge_session(&self, session_id: &str) -> Result<(), String> {
        let session = self
            .store
            .get_session(session_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("session {} not found", session_id))?;
        if !session.is_active {
            crate::debug!("[recovery] session {} already retired", session_id);
            return Ok(());
        }

        // Merge order needs every chunk sealed; do it here too so this
        // task does not depend on a FinalizeChunk ordering guarantee.
        self.finalize_chunks(session_id).await?;

        let chunks = self
            .store
            .chunks_for_session(session_id)
            .await
            .map_err(|e| e.to_string())?;
        if chunks.is_empty() {
            // Nothing recorded; retiring the session here keeps an empty
            // crash artifact from being re-queued on every startup.
            self.retire_session(&session, &chunks).await?;
            return Ok(());
        }

        let merged = session.merged_output_path(&self.config.chunks.extension);
        if merged.exists() && chunks.iter().all(|c| !c.needs_merging) {
            self.retire_session(&session, &chunks).await?;
            return Ok(());
        }

        let inputs: Vec<PathBuf> = chunks.iter().map(|c| PathBuf::from(&c.file_path)).collect();
        match merger::merge_files(&inputs, &merged) {
            Ok(()) => {
                self.store
                    .clear_needs_merging(session_id)
                    .await
                    .map_err(|e| e.to_string())?;
                self.retire_session(&session, &chunks).await?;
                crate::info!(
                    "[recovery] session {} merged into {}",
                    session_id,
                    merged.display()
                );
                Ok(())
            }
            Err(MergeError::NoInput) => {
                self.retire_session(&session, &chunks).await?;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Delete leftover chunk files and the session's database rows.
    async fn cleanup_session(&self, session_id: &str) -> Result<(), String> {
        if self
            .store
            .get_session(session_id)
            .await
            .map_err(|e| e.to_string())?
            .is_none()
        {
            return Ok(());
        }
        let chunks = self
            .store
            .chunks_for_session(session_id)
            .await
            .map_err(|e| e.to_string())?;
        for chunk in &chunks {
            if let Err(e) = std::fs::remove_file(&chunk.file_path) {
                crate::debug!("[recovery] could not delete {}: {}", chunk.file_path, e);
            }
        }
        self.store
            .delete_session(session_id)
            .await
            .map_err(|e| e.to_string())
    }

    async fn retire_session(
        &self,
        session: &RecordingSession,
        chunks: &[AudioChunk],
    ) -> Result<(), String> {
        for chunk in chunks {
            if let Err(e) = std::fs::remove_file(&chunk.file_path) {
                crate::debug!("[recovery] could not delete {}: {}", chunk.file_path, e);
            }
        }
        self.store
            .update_session_status(&session.session_id, SessionStatus::Stopped, None, now_ms())
            .await
            .map_err(|e| e.to_string())?;
        self.store
            .deactivate_session(&session.session_id)
            .await
            .map_err(|e| e.to_string())
    }

    /// Retention sweep: drop inactive sessions and terminal tasks older
    /// than the configured window.
    async fn purge_stale(&self) -> Result<(), StoreError> {
        let cutoff_ms = now_ms() - self.config.recovery.retention_hours * 60 * 60 * 1000;
        let sessions = self.store.delete_stale_sessions(cutoff_ms).await?;
        let tasks = self.store.delete_stale_tasks(cutoff_ms).await?;
        if sessions > 0 || tasks > 0 {
            crate::info!(
                "[recovery] purged {} stale session(s) and {} stale task(s)",
                sessions,
                tasks
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
