// Free-space monitoring
//
// A background task samples free space in the output directory on a fixed
// cadence and reports level changes to the engine. Level thresholds come
// from StorageConfig; probing goes through a trait so tests can script the
// numbers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::StorageConfig;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Free-space level, most severe last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StorageStatus {
    Sufficient,
    Warning,
    Low,
    Critical,
}

/// One observation from the background monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUpdate {
    pub status: StorageStatus,
    pub available_mb: u64,
}

/// Capacity summary of the volume holding the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub total_mb: u64,
    pub available_mb: u64,
    pub used_mb: u64,
}

/// Rough encoded output rate used for remaining-time estimates.
const RECORDING_MB_PER_MIN: u64 = 1;

impl StorageInfo {
    pub fn used_percentage(&self) -> u8 {
        if self.total_mb == 0 {
            return 0;
        }
        ((self.used_mb * 100) / self.total_mb).min(100) as u8
    }

    /// Approximate minutes of recording the free space can hold.
    pub fn estimated_recording_minutes(&self) -> u64 {
        self.available_mb / RECORDING_MB_PER_MIN
    }
}

/// Source of free-space figures for a directory.
pub trait FreeSpaceProbe: Send + Sync {
    fn free_bytes(&self, path: &Path) -> std::io::Result<u64>;
    fn total_bytes(&self, path: &Path) -> std::io::Result<u64>;
}

/// statvfs-backed probe for the real filesystem.
#[cfg(unix)]
pub struct StatvfsProbe;

#[cfg(unix)]
fn statvfs_for(path: &Path) -> std::io::Result<libc::statvfs> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(stat)
}

#[cfg(unix)]
impl FreeSpaceProbe for StatvfsProbe {
    fn free_bytes(&self, path: &Path) -> std::io::Result<u64> {
        // f_bavail: blocks available to unprivileged processes.
        let stat = statvfs_for(path)?;
        Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
    }

    fn total_bytes(&self, path: &Path) -> std::io::Result<u64> {
        let stat = statvfs_for(path)?;
        Ok(stat.f_blocks as u64 * stat.f_frsize as u64)
    }
}

/// Periodic free-space watcher for the recording output directory.
pub struct StorageMonitor {
    probe: Arc<dyn FreeSpaceProbe>,
    config: StorageConfig,
    path: PathBuf,
}

impl StorageMonitor {
    #[cfg(unix)]
    pub fn new(config: StorageConfig, path: PathBuf) -> Self {
        Self::with_probe(Arc::new(StatvfsProbe), config, path)
    }

    pub fn with_probe(probe: Arc<dyn FreeSpaceProbe>, config: StorageConfig, path: PathBuf) -> Self {
        Self { probe, config, path }
    }

    /// Classify an availability figure against the configured thresholds.
    pub fn classify(&self, available_mb: u64) -> StorageStatus {
        if available_mb < self.config.critical_mb {
            StorageStatus::Critical
        } else if available_mb < self.config.low_mb {
            StorageStatus::Low
        } else if available_mb < self.config.warning_mb {
            StorageStatus::Warning
        } else {
            StorageStatus::Sufficient
        }
    }

    /// Current free space in the watched directory, in megabytes.
    pub fn available_mb(&self) -> std::io::Result<u64> {
        Ok(self.probe.free_bytes(&self.path)? / BYTES_PER_MB)
    }

    /// Capacity summary of the watched volume.
    pub fn info(&self) -> std::io::Result<StorageInfo> {
        let available_mb = self.probe.free_bytes(&self.path)? / BYTES_PER_MB;
        let total_mb = self.probe.total_bytes(&self.path)? / BYTES_PER_MB;
        Ok(StorageInfo {
            total_mb,
            available_mb,
            used_mb: total_mb.saturating_sub(available_mb),
        })
    }

    /// Whether a new session may start given the current free space.
    pub fn can_start(&self, available_mb: u64) -> bool {
        available_mb >= self.config.min_start_mb
    }

    /// Poll until the receiver side is dropped, reporting every level
    /// change. The first successful sample is always reported.
    pub async fn run(&self, tx: mpsc::Sender<StorageUpdate>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last: Option<StorageStatus> = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => {
                    crate::debug!("[storage] receiver gone, monitor exiting");
                    return;
                }
            }
            let available_mb = match self.available_mb() {
                Ok(mb) => mb,
                Err(e) => {
                    crate::warn!("[storage] free-space probe failed: {}", e);
                    continue;
                }
            };
            let status = self.classify(available_mb);
            if last == Some(status) {
                continue;
            }
            crate::info!("[storage] level changed to {:?} ({}MB free)", status, available_mb);
            last = Some(status);
            if tx.send(StorageUpdate { status, available_mb }).await.is_err() {
                crate::debug!("[storage] receiver gone, monitor exiting");
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
