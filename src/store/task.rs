// Recovery task queue persistence
//
// Tasks move Pending -> InProgress -> Completed/Failed. A Failed task goes
// back to Pending while retry budget remains; the retry counter only ever
// grows, so a task can never run more than max_retries times.

use std::str::FromStr;

use libsql::params;
use uuid::Uuid;

use super::client::{SessionStore, StoreError};
use super::session::query_err;
use crate::session::model::{now_ms, RecoveryTask, TaskStatus, TaskType};

impl SessionStore {
    /// Queue a new task for a session. Returns the stored row.
    pub async fn enqueue_task(
        &self,
        session_id: &str,
        task_type: TaskType,
        max_retries: i64,
    ) -> Result<RecoveryTask, StoreError> {
        let task = RecoveryTask {
            task_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            task_type,
            status: TaskStatus::Pending,
            created_ms: now_ms(),
            completed_ms: None,
            error_message: None,
            retry_count: 0,
            max_retries,
        };
        self.execute(
            r#"INSERT INTO recovery_task
               (task_id, session_id, task_type, status, created_at, completed_at,
                error_message, retry_count, max_retries)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                task.task_id.clone(),
                task.session_id.clone(),
                task.task_type.as_str(),
                task.status.as_str(),
                task.created_ms,
                task.completed_ms,
                task.error_message.clone(),
                task.retry_count,
                task.max_retries
            ],
        )
        .await?;
        crate::debug!(
            "[store] queued {} task {} for session {}",
            task.task_type.as_str(),
            task.task_id,
            task.session_id
        );
        Ok(task)
    }

    /// Whether a session already has queued or running tasks. Used to
    /// avoid double-queuing when recovery itself was interrupted.
    pub async fn has_open_tasks(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut rows = self
            .query(
                r#"SELECT COUNT(*) FROM recovery_task
                   WHERE session_id = ?1 AND status IN ('PENDING', 'IN_PROGRESS')"#,
                params![session_id],
            )
            .await?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => {
                let count: i64 = row.get(0).map_err(query_err)?;
                Ok(count > 0)
            }
            None => Ok(false),
        }
    }

    /// Pending tasks in creation order.
    pub async fn pending_tasks(&self) -> Result<Vec<RecoveryTask>, StoreError> {
        let mut rows = self
            .query(
                "SELECT * FROM recovery_task WHERE status = 'PENDING' ORDER BY created_at ASC",
                (),
            )
            .await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            tasks.push(task_from_row(&row)?);
        }
        Ok(tasks)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<RecoveryTask>, StoreError> {
        let mut rows = self
            .query("SELECT * FROM recovery_task WHERE task_id = ?1", params![task_id])
            .await?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(task_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Claim a task before executing it. Any task left InProgress at
    /// startup belongs to a crashed run and is requeued by the coordinator.
    pub async fn mark_task_in_progress(&self, task_id: &str) -> Result<(), StoreError> {
        self.execute(
            "UPDATE recovery_task SET status = 'IN_PROGRESS' WHERE task_id = ?1",
            params![task_id],
        )
        .await?;
        Ok(())
    }

    pub async fn mark_task_completed(&self, task_id: &str) -> Result<(), StoreError> {
        self.execute(
            r#"UPDATE recovery_task
               SET status = 'COMPLETED', completed_at = ?1, error_message = NULL
               WHERE task_id = ?2"#,
            params![now_ms(), task_id],
        )
        .await?;
        Ok(())
    }

    /// Record a failed attempt. The task returns to Pending while retry
    /// budget remains, otherwise it stays Failed for inspection.
    pub async fn mark_task_failed(
        &self,
        task_id: &str,
        error_message: &str,
    ) -> Result<RecoveryTask, StoreError> {
        self.execute(
            r#"UPDATE recovery_task
               SET retry_count = retry_count + 1, error_message = ?1,
                   status = CASE WHEN retry_count + 1 < max_retries
                                 THEN 'PENDING' ELSE 'FAILED' END,
                   completed_at = CASE WHEN retry_count + 1 < max_retries
                                       THEN NULL ELSE ?2 END
               WHERE task_id = ?3"#,
            params![error_message, now_ms(), task_id],
        )
        .await?;
        match self.get_task(task_id).await? {
            Some(task) => Ok(task),
            None => Err(StoreError::Query(format!("task {} vanished during update", task_id))),
        }
    }

    /// Requeue tasks stranded InProgress by a crash mid-recovery.
    pub async fn requeue_stranded_tasks(&self) -> Result<u64, StoreError> {
        self.execute(
            "UPDATE recovery_task SET status = 'PENDING' WHERE status = 'IN_PROGRESS'",
            (),
        )
        .await
    }

    /// Purge terminal tasks older than `cutoff_ms`.
    pub async fn delete_stale_tasks(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        self.execute(
            r#"DELETE FROM recovery_task
               WHERE status IN ('COMPLETED', 'FAILED') AND created_at < ?1"#,
            params![cutoff_ms],
        )
        .await
    }
}

fn task_from_row(row: &libsql::Row) -> Result<RecoveryTask, StoreError> {
    let task_type: String = row.get(2).map_err(query_err)?;
    let status: String = row.get(3).map_err(query_err)?;
    Ok(RecoveryTask {
        task_id: row.get(0).map_err(query_err)?,
        session_id: row.get(1).map_err(query_err)?,
        task_type: TaskType::from_str(&task_type).map_err(|e| StoreError::Query(e.to_string()))?,
        status: TaskStatus::from_str(&status).map_err(|e| StoreError::Query(e.to_string()))?,
        created_ms: row.get(4).map_err(query_err)?,
        completed_ms: row.get(5).map_err(query_err)?,
        error_message: row.get(6).map_err(query_err)?,
        retry_count: row.get(7).map_err(query_err)?,
        max_retries: row.get(8).map_err(query_err)?,
    })
}

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;
