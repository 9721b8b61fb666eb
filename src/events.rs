// Engine events for frontend notification
// Defines the broadcast payloads the UI layer subscribes to

use serde::Serialize;

use crate::audio::device::InputRoute;
use crate::monitor::storage::StorageStatus;
use crate::session::model::{PauseReason, RecordingItem};

/// Event names as constants for consistency
pub mod event_names {
    pub const RECORDING_STARTED: &str = "recording_started";
    pub const RECORDING_PAUSED: &str = "recording_paused";
    pub const RECORDING_RESUMED: &str = "recording_resumed";
    pub const RECORDING_STOPPED: &str = "recording_stopped";
    pub const RECORDING_DISCARDED: &str = "recording_discarded";
    pub const RECORDING_FORCE_STOPPED: &str = "recording_force_stopped";
    pub const CHUNK_ROLLED: &str = "chunk_rolled";
    pub const ELAPSED_TICK: &str = "elapsed_tick";
    pub const STORAGE_STATUS_CHANGED: &str = "storage_status_changed";
    pub const SILENCE_WARNING: &str = "silence_warning";
    pub const INPUT_ROUTE_CHANGED: &str = "input_route_changed";
    pub const RECOVERY_COMPLETED: &str = "recovery_completed";
    pub const RECORDING_ERROR: &str = "recording_error";
}

/// Everything the engine announces over its broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    RecordingStarted(RecordingStartedPayload),
    RecordingPaused(RecordingPausedPayload),
    RecordingResumed(SessionPayload),
    RecordingStopped(RecordingStoppedPayload),
    RecordingDiscarded(SessionPayload),
    RecordingForceStopped(ForceStoppedPayload),
    ChunkRolled(ChunkRolledPayload),
    ElapsedTick(ElapsedPayload),
    StorageStatusChanged(StoragePayload),
    SilenceWarning(SilencePayload),
    InputRouteChanged(RoutePayload),
    RecoveryCompleted(RecoveryPayload),
    RecordingError(ErrorPayload),
}

impl EngineEvent {
    /// Stable event name for logging and frontend dispatch.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::RecordingStarted(_) => event_names::RECORDING_STARTED,
            EngineEvent::RecordingPaused(_) => event_names::RECORDING_PAUSED,
            EngineEvent::RecordingResumed(_) => event_names::RECORDING_RESUMED,
            EngineEvent::RecordingStopped(_) => event_names::RECORDING_STOPPED,
            EngineEvent::RecordingDiscarded(_) => event_names::RECORDING_DISCARDED,
            EngineEvent::RecordingForceStopped(_) => event_names::RECORDING_FORCE_STOPPED,
            EngineEvent::ChunkRolled(_) => event_names::CHUNK_ROLLED,
            EngineEvent::ElapsedTick(_) => event_names::ELAPSED_TICK,
            EngineEvent::StorageStatusChanged(_) => event_names::STORAGE_STATUS_CHANGED,
            EngineEvent::SilenceWarning(_) => event_names::SILENCE_WARNING,
            EngineEvent::InputRouteChanged(_) => event_names::INPUT_ROUTE_CHANGED,
            EngineEvent::RecoveryCompleted(_) => event_names::RECOVERY_COMPLETED,
            EngineEvent::RecordingError(_) => event_names::RECORDING_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStartedPayload {
    pub session_id: String,
    pub output_directory: String,
    pub base_file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPausedPayload {
    pub session_id: String,
    pub reason: PauseReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStoppedPayload {
    pub session_id: String,
    pub item: RecordingItem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceStoppedPayload {
    pub session_id: String,
    pub available_mb: u64,
    /// Present when the cut-short session still produced playable audio.
    pub item: Option<RecordingItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRolledPayload {
    pub session_id: String,
    pub chunk_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElapsedPayload {
    pub session_id: String,
    /// Recorded time excluding paused stretches.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePayload {
    pub status: StorageStatus,
    pub available_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SilencePayload {
    pub silent_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePayload {
    pub route: InputRoute,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPayload {
    pub sessions_recovered: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
