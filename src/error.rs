// Top-level error taxonomy for the recording engine
//
// Transient interruptions (calls, focus loss, device swaps) are handled
// inside the state machine and never appear here; these variants cover the
// conditions a caller can actually observe.

use thiserror::Error;

use crate::audio::device::CaptureError;
use crate::session::model::PauseReason;
use crate::store::client::StoreError;

/// Errors surfaced through the public recorder API.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Not enough free space to start a new recording session.
    #[error("insufficient storage: {available_mb}MB available, {required_mb}MB required")]
    InsufficientStorage { available_mb: u64, required_mb: u64 },

    /// The capture device could not be opened or driven.
    #[error("capture device unavailable: {0}")]
    Device(#[from] CaptureError),

    /// The requested command is not valid in the current status.
    #[error("invalid transition: {requested} while {from}")]
    InvalidTransition { from: &'static str, requested: &'static str },

    /// Resume was requested while interrupt reasons are still active.
    /// The session stays paused until every reason clears.
    #[error("resume blocked, pause reasons still active: {}", format_reasons(.reasons))]
    ResumeBlocked { reasons: Vec<PauseReason> },

    /// Chunk files could not be merged into the final recording. A
    /// recovery task has been queued to finish the job later.
    #[error("failed to finalize recording: {0}")]
    Finalize(String),

    /// The durable session store rejected a write.
    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    /// The state machine task is no longer running.
    #[error("recorder is shut down")]
    ChannelClosed,
}

fn format_reasons(reasons: &[PauseReason]) -> String {
    reasons
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
