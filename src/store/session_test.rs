use crate::session::model::{
    now_ms, AudioChunk, AudioSourceKind, PauseReason, RecordingSession, SessionStatus,
};
use crate::store::{initialize_schema, SessionStore};

async fn setup_store() -> SessionStore {
    let store = SessionStore::in_memory().await.expect("open store");
    initialize_schema(&store).await.expect("init schema");
    store
}

fn sample_session(id: &str) -> RecordingSession {
    let now = now_ms();
    RecordingSession {
        session_id: id.to_string(),
        start_time_ms: now,
        status: SessionStatus::Recording,
        paused_accumulated_ms: 0,
        last_chunk_index: 0,
        output_directory: "/tmp/rec".to_string(),
        base_file_name: format!("meeting_{}", id),
        audio_source: AudioSourceKind::Microphone,
        pause_reason: None,
        last_activity_ms: now,
        is_active: true,
    }
}

fn sample_chunk(session_id: &str, index: i64) -> AudioChunk {
    AudioChunk {
        chunk_id: format!("{}-c{}", session_id, index),
        session_id: session_id.to_string(),
        chunk_index: index,
        file_path: format!("/tmp/rec/meeting_{}_{}.m4a", session_id, index),
        start_time_ms: now_ms(),
        end_time_ms: None,
        duration_ms: 0,
        file_size_bytes: 0,
        is_complete: false,
        needs_merging: true,
    }
}

#[tokio::test]
async fn test_session_round_trip() {
    let store = setup_store().await;
    let session = sample_session("s1");
    store.insert_session(&session).await.expect("insert");

    let loaded = store
        .get_session("s1")
        .await
        .expect("get")
        .expect("present");
    assert_eq!(loaded, session);
    assert!(store.get_session("nope").await.expect("get").is_none());
}

#[tokio::test]
async fn test_status_update_round_trips_pause_reason() {
    let store = setup_store().await;
    store.insert_session(&sample_session("s1")).await.expect("insert");

    store
        .update_session_status("s1", SessionStatus::Paused, Some(PauseReason::Call), now_ms())
        .await
        .expect("update");
    let loaded = store.get_session("s1").await.expect("get").expect("present");
    assert_eq!(loaded.status, SessionStatus::Paused);
    assert_eq!(loaded.pause_reason, Some(PauseReason::Call));

    store
        .update_session_status("s1", SessionStatus::Recording, None, now_ms())
        .await
        .expect("update");
    let loaded = store.get_session("s1").await.expect("get").expect("present");
    assert_eq!(loaded.status, SessionStatus::Recording);
    assert_eq!(loaded.pause_reason, None);
}

#[tokio::test]
async fn test_active_sessions_excludes_deactivated() {
    let store = setup_store().await;
    store.insert_session(&sample_session("s1")).await.expect("insert");
    store.insert_session(&sample_session("s2")).await.expect("insert");

    store.deactivate_session("s1").await.expect("deactivate");
    let active = store.get_active_sessions().await.expect("list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].session_id, "s2");
}

#[tokio::test]
async fn test_paused_accumulated_and_chunk_index_updates() {
    let store = setup_store().await;
    store.insert_session(&sample_session("s1")).await.expect("insert");

    store.update_paused_accumulated("s1", 4200).await.expect("update");
    store.update_last_chunk_index("s1", 7).await.expect("update");

    let loaded = store.get_session("s1").await.expect("get").expect("present");
    assert_eq!(loaded.paused_accumulated_ms, 4200);
    assert_eq!(loaded.last_chunk_index, 7);
}

#[tokio::test]
async fn test_chunk_lifecycle() {
    let store = setup_store().await;
    store.insert_session(&sample_session("s1")).await.expect("insert");
    store.insert_chunk(&sample_chunk("s1", 0)).await.expect("chunk 0");
    store.insert_chunk(&sample_chunk("s1", 1)).await.expect("chunk 1");

    let incomplete = store.incomplete_chunks("s1").await.expect("incomplete");
    assert_eq!(incomplete.len(), 2);

    store
        .complete_chunk("s1-c0", now_ms(), 30_000, 480_000)
        .await
        .expect("complete");
    let incomplete = store.incomplete_chunks("s1").await.expect("incomplete");
    assert_eq!(incomplete.len(), 1);
    assert_eq!(incomplete[0].chunk_index, 1);

    let all = store.chunks_for_session("s1").await.expect("all");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].chunk_index, 0);
    assert!(all[0].is_complete);
    assert_eq!(all[0].duration_ms, 30_000);
    assert_eq!(all[0].file_size_bytes, 480_000);
    assert!(all[0].end_time_ms.is_some());
    assert!(!all[1].is_complete);
}

#[tokio::test]
async fn test_clear_needs_merging() {
    let store = setup_store().await;
    store.insert_session(&sample_session("s1")).await.expect("insert");
    store.insert_chunk(&sample_chunk("s1", 0)).await.expect("chunk");

    store.clear_needs_merging("s1").await.expect("clear");
    let all = store.chunks_for_session("s1").await.expect("all");
    assert!(!all[0].needs_merging);
}

#[tokio::test]
async fn test_delete_session_cascades_to_chunks_and_tasks() {
    let store = setup_store().await;
    store.insert_session(&sample_session("s1")).await.expect("insert");
    store.insert_chunk(&sample_chunk("s1", 0)).await.expect("chunk");
    let task = store
        .enqueue_task("s1", crate::session::model::TaskType::Cleanup, 3)
        .await
        .expect("enqueue");
    store.insert_session(&sample_session("s2")).await.expect("insert");
    store.insert_chunk(&sample_chunk("s2", 0)).await.expect("chunk");

    store.delete_session("s1").await.expect("delete");

    assert!(store.get_session("s1").await.expect("get").is_none());
    assert!(store.chunks_for_session("s1").await.expect("chunks").is_empty());
    assert!(store.get_task(&task.task_id).await.expect("get").is_none());
    // Unrelated sessions are untouched
    assert!(store.get_session("s2").await.expect("get").is_some());
    assert_eq!(store.chunks_for_session("s2").await.expect("chunks").len(), 1);
}

#[tokio::test]
async fn test_delete_stale_sessions_keeps_active_and_recent() {
    let store = setup_store().await;
    let mut old_inactive = sample_session("old");
    old_inactive.is_active = false;
    old_inactive.last_activity_ms = 1_000;
    store.insert_session(&old_inactive).await.expect("insert");
    store.insert_chunk(&sample_chunk("old", 0)).await.expect("chunk");

    let mut old_active = sample_session("held");
    old_active.last_activity_ms = 1_000;
    store.insert_session(&old_active).await.expect("insert");

    store.insert_session(&sample_session("fresh")).await.expect("insert");
    store.deactivate_session("fresh").await.expect("deactivate");

    let deleted = store.delete_stale_sessions(now_ms() - 1000).await.expect("purge");
    assert_eq!(deleted, 1);
    assert!(store.get_session("old").await.expect("get").is_none());
    assert!(store.chunks_for_session("old").await.expect("chunks").is_empty());
    // Still active or recently touched rows survive
    assert!(store.get_session("held").await.expect("get").is_some());
    assert!(store.get_session("fresh").await.expect("get").is_some());
}
