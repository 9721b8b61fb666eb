// Durable data model for sessions, chunks, and recovery tasks
//
// Enum fields round-trip through as_str()/FromStr because the store keeps
// them as TEXT columns. Timestamps are Unix epoch milliseconds.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A TEXT column held a value no enum variant matches.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {what}: {value}")]
pub struct UnknownValue {
    pub what: &'static str,
    pub value: String,
}

/// Authoritative status of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Recording,
    Paused,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Recording => "RECORDING",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Stopped => "STOPPED",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECORDING" => Ok(SessionStatus::Recording),
            "PAUSED" => Ok(SessionStatus::Paused),
            "STOPPED" => Ok(SessionStatus::Stopped),
            other => Err(UnknownValue { what: "session status", value: other.to_string() }),
        }
    }
}

/// Why a session is currently paused. Several reasons may be active at
/// once; the session resumes only when all of them have cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PauseReason {
    Call,
    AudioFocus,
    User,
}

impl PauseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseReason::Call => "CALL",
            PauseReason::AudioFocus => "AUDIO_FOCUS",
            PauseReason::User => "USER",
        }
    }
}

impl FromStr for PauseReason {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CALL" => Ok(PauseReason::Call),
            "AUDIO_FOCUS" => Ok(PauseReason::AudioFocus),
            "USER" => Ok(PauseReason::User),
            other => Err(UnknownValue { what: "pause reason", value: other.to_string() }),
        }
    }
}

/// Device-level audio source requested from the capture collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioSourceKind {
    /// Default microphone path.
    Microphone,
    /// Tuned for voice calls where the platform offers it.
    VoiceCommunication,
    /// Raw, unprocessed input.
    Unprocessed,
}

impl AudioSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioSourceKind::Microphone => "MIC",
            AudioSourceKind::VoiceCommunication => "VOICE_COMMUNICATION",
            AudioSourceKind::Unprocessed => "UNPROCESSED",
        }
    }
}

impl FromStr for AudioSourceKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MIC" => Ok(AudioSourceKind::Microphone),
            "VOICE_COMMUNICATION" => Ok(AudioSourceKind::VoiceCommunication),
            "UNPROCESSED" => Ok(AudioSourceKind::Unprocessed),
            other => Err(UnknownValue { what: "audio source", value: other.to_string() }),
        }
    }
}

/// One logical, possibly multi-chunk recording session.
///
/// At most one row is `is_active` at any time; the flag drops when the
/// session is merged or explicitly discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    pub session_id: String,
    pub start_time_ms: i64,
    pub status: SessionStatus,
    pub paused_accumulated_ms: i64,
    pub last_chunk_index: i64,
    pub output_directory: String,
    pub base_file_name: String,
    pub audio_source: AudioSourceKind,
    pub pause_reason: Option<PauseReason>,
    pub last_activity_ms: i64,
    pub is_active: bool,
}

impl RecordingSession {
    /// Path of the merged output file for this session.
    pub fn merged_output_path(&self, extension: &str) -> PathBuf {
        PathBuf::from(&self.output_directory)
            .join(format!("{}.{}", self.base_file_name, extension))
    }
}

/// One physical capture segment belonging to a session.
///
/// Immutable once complete, except for the `needs_merging` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub chunk_id: String,
    pub session_id: String,
    pub chunk_index: i64,
    pub file_path: String,
    pub start_time_ms: i64,
    pub end_time_ms: Option<i64>,
    pub duration_ms: i64,
    pub file_size_bytes: i64,
    pub is_complete: bool,
    pub needs_merging: bool,
}

/// Kind of deferred repair work a recovery task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskType {
    FinalizeChunk,
    MergeChunks,
    Cleanup,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FinalizeChunk => "FINALIZE_CHUNK",
            TaskType::MergeChunks => "MERGE_CHUNKS",
            TaskType::Cleanup => "CLEANUP",
        }
    }
}

impl FromStr for TaskType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FINALIZE_CHUNK" => Ok(TaskType::FinalizeChunk),
            "MERGE_CHUNKS" => Ok(TaskType::MergeChunks),
            "CLEANUP" => Ok(TaskType::Cleanup),
            other => Err(UnknownValue { what: "task type", value: other.to_string() }),
        }
    }
}

/// Recovery task lifecycle. Transitions only move forward; a Failed task
/// may be re-marked Pending while retry budget remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(UnknownValue { what: "task status", value: other.to_string() }),
        }
    }
}

/// A durable unit of deferred repair work for an abandoned session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryTask {
    pub task_id: String,
    pub session_id: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub created_ms: i64,
    pub completed_ms: Option<i64>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub max_retries: i64,
}

impl RecoveryTask {
    /// Whether another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// User-visible result of a completed session. Held in memory only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingItem {
    pub file_path: PathBuf,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Current epoch time in milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
