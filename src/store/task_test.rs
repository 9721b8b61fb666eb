use crate::session::model::{TaskStatus, TaskType};
use crate::store::{initialize_schema, SessionStore};

async fn setup_store() -> SessionStore {
    let store = SessionStore::in_memory().await.expect("open store");
    initialize_schema(&store).await.expect("init schema");
    store
}

#[tokio::test]
async fn test_enqueue_and_list_pending() {
    let store = setup_store().await;
    let t1 = store
        .enqueue_task("s1", TaskType::FinalizeChunk, 3)
        .await
        .expect("enqueue");
    let t2 = store
        .enqueue_task("s1", TaskType::MergeChunks, 3)
        .await
        .expect("enqueue");
    assert_eq!(t1.status, TaskStatus::Pending);
    assert_eq!(t1.retry_count, 0);

    let pending = store.pending_tasks().await.expect("pending");
    assert_eq!(pending.len(), 2);
    let ids: Vec<&str> = pending.iter().map(|t| t.task_id.as_str()).collect();
    assert!(ids.contains(&t1.task_id.as_str()));
    assert!(ids.contains(&t2.task_id.as_str()));
}

#[tokio::test]
async fn test_complete_lifecycle() {
    let store = setup_store().await;
    let task = store
        .enqueue_task("s1", TaskType::MergeChunks, 3)
        .await
        .expect("enqueue");

    store.mark_task_in_progress(&task.task_id).await.expect("claim");
    let claimed = store.get_task(&task.task_id).await.expect("get").expect("present");
    assert_eq!(claimed.status, TaskStatus::InProgress);
    assert!(store.pending_tasks().await.expect("pending").is_empty());

    store.mark_task_completed(&task.task_id).await.expect("complete");
    let done = store.get_task(&task.task_id).await.expect("get").expect("present");
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_ms.is_some());
    assert!(done.error_message.is_none());
}

#[tokio::test]
async fn test_failure_requeues_until_budget_exhausted() {
    let store = setup_store().await;
    let task = store
        .enqueue_task("s1", TaskType::MergeChunks, 3)
        .await
        .expect("enqueue");

    // First two failures go back to Pending
    let after_first = store
        .mark_task_failed(&task.task_id, "disk full")
        .await
        .expect("fail 1");
    assert_eq!(after_first.status, TaskStatus::Pending);
    assert_eq!(after_first.retry_count, 1);
    assert_eq!(after_first.error_message.as_deref(), Some("disk full"));

    let after_second = store
        .mark_task_failed(&task.task_id, "disk full")
        .await
        .expect("fail 2");
    assert_eq!(after_second.status, TaskStatus::Pending);
    assert_eq!(after_second.retry_count, 2);

    // Third failure exhausts the budget: terminal, no fourth attempt
    let after_third = store
        .mark_task_failed(&task.task_id, "disk full")
        .await
        .expect("fail 3");
    assert_eq!(after_third.status, TaskStatus::Failed);
    assert_eq!(after_third.retry_count, 3);
    assert!(after_third.completed_ms.is_some());
    assert!(!after_third.can_retry());
    assert!(store.pending_tasks().await.expect("pending").is_empty());
}

#[tokio::test]
async fn test_requeue_stranded_tasks() {
    let store = setup_store().await;
    let task = store
        .enqueue_task("s1", TaskType::FinalizeChunk, 3)
        .await
        .expect("enqueue");
    store.mark_task_in_progress(&task.task_id).await.expect("claim");

    let requeued = store.requeue_stranded_tasks().await.expect("requeue");
    assert_eq!(requeued, 1);
    let pending = store.pending_tasks().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].task_id, task.task_id);
}

#[tokio::test]
async fn test_has_open_tasks() {
    let store = setup_store().await;
    assert!(!store.has_open_tasks("s1").await.expect("check"));

    let task = store
        .enqueue_task("s1", TaskType::Cleanup, 3)
        .await
        .expect("enqueue");
    assert!(store.has_open_tasks("s1").await.expect("check"));
    assert!(!store.has_open_tasks("s2").await.expect("check"));

    store.mark_task_in_progress(&task.task_id).await.expect("claim");
    assert!(store.has_open_tasks("s1").await.expect("check"));

    store.mark_task_completed(&task.task_id).await.expect("complete");
    assert!(!store.has_open_tasks("s1").await.expect("check"));
}

#[tokio::test]
async fn test_delete_stale_tasks_only_touches_terminal_rows() {
    let store = setup_store().await;
    let done = store
        .enqueue_task("s1", TaskType::MergeChunks, 3)
        .await
        .expect("enqueue");
    store.mark_task_completed(&done.task_id).await.expect("complete");
    let open = store
        .enqueue_task("s2", TaskType::MergeChunks, 3)
        .await
        .expect("enqueue");

    let cutoff = crate::session::model::now_ms() + 1000;
    let deleted = store.delete_stale_tasks(cutoff).await.expect("purge");
    assert_eq!(deleted, 1);
    assert!(store.get_task(&done.task_id).await.expect("get").is_none());
    assert!(store.get_task(&open.task_id).await.expect("get").is_some());
}
