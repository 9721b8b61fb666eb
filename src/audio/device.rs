// Audio collaborator interfaces and input-route model
//
// The capture and playback facilities are platform collaborators; traits
// here define the contract the engine drives. Route selection follows a
// fixed priority: Bluetooth > wired > USB > built-in microphone.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::session::model::AudioSourceKind;

/// Errors from the capture collaborator.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("failed to open capture session: {0}")]
    Open(String),
    #[error("capture backend error: {0}")]
    Backend(String),
    #[error("no capture session is open")]
    NotOpen,
    #[error("in-place pause not supported by this device")]
    Unsupported,
}

/// Result of applying a new input route to an open capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteApplied {
    /// The device rewired itself without interrupting capture.
    InPlace,
    /// The capture session must be stopped and reopened for the route to
    /// take effect.
    NeedsRestart,
}

/// One physical capture session writing into one output file.
///
/// The engine guarantees at most one open session per device at any time.
pub trait CaptureDevice: Send {
    /// Begin capturing into `output_path`.
    fn open(&mut self, output_path: &Path, source: AudioSourceKind) -> Result<(), CaptureError>;

    /// Whether the device can pause in place without closing the file.
    fn supports_pause(&self) -> bool {
        false
    }

    /// Pause the open session in place.
    fn pause(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported)
    }

    /// Resume an in-place-paused session.
    fn resume(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported)
    }

    /// Stop and finalize the open session, returning the final file size
    /// in bytes.
    fn stop(&mut self) -> Result<u64, CaptureError>;

    /// Request a different physical input for the open session.
    fn set_input_route(&mut self, _route: &InputRoute) -> Result<RouteApplied, CaptureError> {
        Ok(RouteApplied::NeedsRestart)
    }
}

/// Playback collaborator: plays one file at a time.
pub trait PlaybackDevice: Send {
    /// Start playing `path`; `on_complete` fires when playback finishes
    /// on its own.
    fn play(&mut self, path: &Path, on_complete: Box<dyn FnOnce() + Send>) -> Result<(), PlaybackError>;

    /// Stop any current playback.
    fn stop(&mut self);
}

#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    #[error("failed to play {0}: {1}")]
    Open(String, String),
}

/// Kind of physical input device, ordered by selection priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputDeviceKind {
    BluetoothHeadset,
    WiredHeadset,
    UsbHeadset,
    BuiltinMic,
}

impl InputDeviceKind {
    /// Lower is preferred.
    fn priority(&self) -> u8 {
        match self {
            InputDeviceKind::BluetoothHeadset => 0,
            InputDeviceKind::WiredHeadset => 1,
            InputDeviceKind::UsbHeadset => 2,
            InputDeviceKind::BuiltinMic => 3,
        }
    }
}

/// A concrete input device as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputRoute {
    pub kind: InputDeviceKind,
    pub name: String,
}

impl InputRoute {
    pub fn builtin() -> Self {
        Self {
            kind: InputDeviceKind::BuiltinMic,
            name: "Built-in Microphone".to_string(),
        }
    }
}

/// Pick the best input among the currently present devices.
///
/// Falls back to the built-in microphone when the list is empty.
pub fn best_route(present: &[InputRoute]) -> InputRoute {
    present
        .iter()
        .min_by_key(|r| r.kind.priority())
        .cloned()
        .unwrap_or_else(InputRoute::builtin)
}

#[cfg(test)]
#[path = "device_test.rs"]
mod tests;
