// Recording session continuity engine
//
// Keeps a recording session alive across phone calls, audio-focus loss,
// device swaps, and storage pressure; persists every transition so a
// crashed session can be repaired and merged on the next start.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod recovery;
pub mod session;
pub mod store;

// Re-export log macros for use throughout the crate
pub use log::{debug, error, info, trace, warn};

pub use config::RecorderConfig;
pub use error::RecorderError;
pub use events::EngineEvent;
pub use recovery::{RecoveryCoordinator, RecoveryReport};
pub use session::machine::{EnginePhase, Recorder, Signal, StateSnapshot};
pub use session::model::{AudioSourceKind, PauseReason, RecordingItem, SessionStatus};
pub use store::{initialize_schema, SessionStore};
