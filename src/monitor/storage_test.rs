use super::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct FixedProbe {
    free: AtomicU64,
    total: u64,
}

impl FreeSpaceProbe for FixedProbe {
    fn free_bytes(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.free.load(Ordering::SeqCst))
    }

    fn total_bytes(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.total)
    }
}

fn monitor_with_mb(mb: u64, config: crate::config::StorageConfig) -> (StorageMonitor, Arc<FixedProbe>) {
    let probe = Arc::new(FixedProbe {
        free: AtomicU64::new(mb * 1024 * 1024),
        total: 1000 * 1024 * 1024,
    });
    let monitor = StorageMonitor::with_probe(probe.clone(), config, PathBuf::from("/tmp"));
    (monitor, probe)
}

#[test]
fn test_classification_thresholds() {
    let (monitor, _) = monitor_with_mb(0, crate::config::StorageConfig::default());
    assert_eq!(monitor.classify(20), StorageStatus::Critical);
    assert_eq!(monitor.classify(24), StorageStatus::Critical);
    assert_eq!(monitor.classify(25), StorageStatus::Low);
    assert_eq!(monitor.classify(49), StorageStatus::Low);
    assert_eq!(monitor.classify(50), StorageStatus::Warning);
    assert_eq!(monitor.classify(99), StorageStatus::Warning);
    assert_eq!(monitor.classify(100), StorageStatus::Sufficient);
    assert_eq!(monitor.classify(5000), StorageStatus::Sufficient);
}

#[test]
fn test_start_threshold() {
    let (monitor, _) = monitor_with_mb(0, crate::config::StorageConfig::default());
    assert!(!monitor.can_start(40));
    assert!(!monitor.can_start(49));
    assert!(monitor.can_start(50));
    assert!(monitor.can_start(500));
}

#[test]
fn test_available_mb_converts_bytes() {
    let (monitor, _) = monitor_with_mb(75, crate::config::StorageConfig::default());
    assert_eq!(monitor.available_mb().expect("probe"), 75);
}

#[test]
fn test_info_reports_capacity_and_estimate() {
    let (monitor, _) = monitor_with_mb(250, crate::config::StorageConfig::default());
    let info = monitor.info().expect("probe");
    assert_eq!(info.total_mb, 1000);
    assert_eq!(info.available_mb, 250);
    assert_eq!(info.used_mb, 750);
    assert_eq!(info.used_percentage(), 75);
    // ~1 MB of encoded audio per minute
    assert_eq!(info.estimated_recording_minutes(), 250);
}

#[test]
fn test_info_handles_zero_capacity() {
    let probe = Arc::new(FixedProbe { free: AtomicU64::new(0), total: 0 });
    let monitor = StorageMonitor::with_probe(
        probe,
        crate::config::StorageConfig::default(),
        PathBuf::from("/tmp"),
    );
    let info = monitor.info().expect("probe");
    assert_eq!(info.used_percentage(), 0);
    assert_eq!(info.estimated_recording_minutes(), 0);
}

#[tokio::test]
async fn test_run_reports_level_changes_only() {
    let config = crate::config::StorageConfig { poll_interval_ms: 5, ..Default::default() };
    let (monitor, probe) = monitor_with_mb(200, config);
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let handle = tokio::spawn(async move { monitor.run(tx).await });

    let first = rx.recv().await.expect("first sample");
    assert_eq!(first.status, StorageStatus::Sufficient);
    assert_eq!(first.available_mb, 200);

    // Same level again produces no update; dropping to Low does.
    probe.free.store(30 * 1024 * 1024, Ordering::SeqCst);
    let second = rx.recv().await.expect("level change");
    assert_eq!(second.status, StorageStatus::Low);
    assert_eq!(second.available_mb, 30);

    probe.free.store(10 * 1024 * 1024, Ordering::SeqCst);
    let third = rx.recv().await.expect("critical");
    assert_eq!(third.status, StorageStatus::Critical);

    drop(rx);
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("monitor must exit once the receiver is gone")
        .expect("monitor task");
}

#[tokio::test]
async fn test_run_exits_when_receiver_dropped_at_steady_level() {
    let config = crate::config::StorageConfig { poll_interval_ms: 5, ..Default::default() };
    let (monitor, _) = monitor_with_mb(200, config);
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let handle = tokio::spawn(async move { monitor.run(tx).await });

    rx.recv().await.expect("first sample");
    // No further level changes happen; dropping the receiver alone must
    // still shut the task down.
    drop(rx);
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("monitor must exit once the receiver is gone")
        .expect("monitor task");
}
