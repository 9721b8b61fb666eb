// Engine configuration
//
// All knobs have code defaults so a partial JSON document (or no document
// at all) produces a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration for the recording engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory that receives chunk files and merged recordings.
    pub output_dir: PathBuf,
    /// Prefix for generated base file names (`{prefix}_{timestamp}`).
    pub base_prefix: String,
    pub storage: StorageConfig,
    pub chunks: ChunkConfig,
    pub timer: TimerConfig,
    pub silence: SilenceConfig,
    pub recovery: RecoveryConfig,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            base_prefix: "meeting".to_string(),
            storage: StorageConfig::default(),
            chunks: ChunkConfig::default(),
            timer: TimerConfig::default(),
            silence: SilenceConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl RecorderConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// absent fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }
}

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, String),
    #[error("failed to parse config {0}: {1}")]
    Parse(PathBuf, String),
}

fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("tapedeck").join("recordings"))
        .unwrap_or_else(|| PathBuf::from("recordings"))
}

/// Free-space thresholds and sampling cadence, in megabytes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Minimum free space required to start a new session.
    pub min_start_mb: u64,
    /// Below this the status is Warning.
    pub warning_mb: u64,
    /// Below this the status is Low and advisories are emitted.
    pub low_mb: u64,
    /// Below this an active session is force-stopped.
    pub critical_mb: u64,
    /// Sampling interval for the background monitor, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            min_start_mb: 50,
            warning_mb: 100,
            low_mb: 50,
            critical_mb: 25,
            poll_interval_ms: 10_000,
        }
    }
}

impl StorageConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Chunked-capture parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Rollover interval: a new chunk file is started this often.
    pub chunk_duration_ms: u64,
    /// Container extension for chunk files and the merged output.
    pub extension: String,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_duration_ms: 30_000,
            extension: "m4a".to_string(),
        }
    }
}

impl ChunkConfig {
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_millis(self.chunk_duration_ms)
    }
}

/// Elapsed-time publication cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub tick_interval_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { tick_interval_ms: 500 }
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Advisory silence detection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    /// Normalized RMS level below which a frame counts as silent.
    pub rms_threshold: f32,
    /// Consecutive silent seconds before a warning fires.
    pub warning_secs: u32,
    /// Minimum seconds between repeated warnings.
    pub cooldown_secs: u32,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.015,
            warning_secs: 10,
            cooldown_secs: 5,
        }
    }
}

/// Crash-recovery retry policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Attempts per task before it is left Failed.
    pub max_retries: i64,
    /// Base delay for exponential backoff between retry passes, in
    /// milliseconds.
    pub base_backoff_ms: u64,
    /// Inactive sessions and terminal tasks older than this are purged.
    pub retention_hours: i64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 15_000,
            retention_hours: 24,
        }
    }
}

impl RecoveryConfig {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
