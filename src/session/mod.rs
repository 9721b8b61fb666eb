pub mod chunk;
pub mod machine;
pub mod model;

pub use machine::{EnginePhase, Recorder, Signal, StateSnapshot};
pub use model::{
    AudioChunk, AudioSourceKind, PauseReason, RecordingItem, RecordingSession, RecoveryTask,
    SessionStatus, TaskStatus, TaskType,
};
