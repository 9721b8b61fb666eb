use super::*;
use std::path::Path;

#[test]
fn test_chunk_file_naming() {
    assert_eq!(chunk_file_name("meeting_x", 0, "m4a"), "meeting_x_0.m4a");
    assert_eq!(chunk_file_name("meeting_x", 12, "wav"), "meeting_x_12.wav");
    assert_eq!(
        chunk_path(Path::new("/out"), "meeting_x", 3, "m4a"),
        Path::new("/out/meeting_x_3.m4a")
    );
}

#[test]
fn test_tracker_indices_are_contiguous_from_zero() {
    let mut tracker = new_tracker();
    for expected in 0..4 {
        let chunk = tracker.open_next();
        assert_eq!(chunk.chunk_index, expected);
        assert!(!chunk.is_complete);
        assert!(chunk.needs_merging);
        assert!(chunk.file_path.ends_with(&format!("meeting_x_{}.m4a", expected)));
        tracker.close_current(100).expect("close");
    }
    assert_eq!(tracker.last_index(), 3);
}

#[test]
fn test_at_most_one_chunk_open() {
    let mut tracker = new_tracker();
    assert!(tracker.open_path().is_none());
    let chunk = tracker.open_next();
    assert_eq!(tracker.open_index(), Some(0));
    assert_eq!(
        tracker.open_path().map(|p| p.to_string_lossy().into_owned()),
        Some(chunk.file_path.clone())
    );
    let closed = tracker.close_current(2048).expect("close");
    assert_eq!(closed.chunk_id, chunk.chunk_id);
    assert_eq!(closed.file_size_bytes, 2048);
    assert!(closed.duration_ms >= 0);
    assert!(tracker.open_path().is_none());
    // Closing again is a no-op
    assert!(tracker.close_current(0).is_none());
}

#[test]
fn test_all_paths_in_order() {
    let mut tracker = new_tracker();
    tracker.open_next();
    tracker.close_current(1).expect("close");
    tracker.open_next();
    tracker.close_current(1).expect("close");
    let paths = tracker.all_paths();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("meeting_x_0.m4a"));
    assert!(paths[1].ends_with("meeting_x_1.m4a"));
}

fn new_tracker() -> ChunkTracker {
    ChunkTracker::new(
        "s1".to_string(),
        std::path::PathBuf::from("/out"),
        "meeting_x".to_string(),
        "m4a".to_string(),
    )
}
