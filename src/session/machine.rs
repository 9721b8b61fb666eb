// Session state machine
//
// A single task owns all mutable session state. Commands from the public
// handle and interrupt signals from the platform arrive over channels and
// are applied strictly in arrival order; every transition is written to
// the store before it becomes observable through events or the snapshot.
//
// Pausing is reason-based: a call, an audio-focus loss, and an explicit
// user pause each contribute one reason, and capture resumes only when
// the reason set is empty again. A critical storage signal bypasses the
// reason set entirely and force-stops the session, keeping whatever audio
// exists.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audio::device::{CaptureDevice, InputRoute, RouteApplied};
use crate::audio::merger::{self, MergeError};
use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::events::{
    ChunkRolledPayload, ElapsedPayload, EngineEvent, ErrorPayload, ForceStoppedPayload,
    RecordingPausedPayload, RecordingStartedPayload, RecordingStoppedPayload, RoutePayload,
    SessionPayload, SilencePayload, StoragePayload,
};
use crate::monitor::storage::{StorageMonitor, StorageStatus, StorageUpdate};
use crate::session::chunk::ChunkTracker;
use crate::session::model::{
    now_ms, AudioSourceKind, PauseReason, RecordingItem, RecordingSession, SessionStatus, TaskType,
};
use crate::store::SessionStore;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 16;
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// Interrupt signals fed in by the platform integration layer.
#[derive(Debug, Clone)]
pub enum Signal {
    CallStarted,
    CallEnded,
    FocusLost,
    FocusGained,
    /// Input device change. Bursts of consecutive route changes are
    /// coalesced and only the latest is applied.
    RouteChanged(InputRoute),
    Storage(StorageUpdate),
    /// Sustained-silence advisory from the silence monitor.
    Silence(u32),
}

/// Coarse phase for the state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnginePhase {
    Idle,
    Recording,
    Paused,
}

/// Last published engine state, available without round-tripping a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub phase: EnginePhase,
    pub session_id: Option<String>,
    /// Recorded time excluding paused stretches.
    pub elapsed_ms: u64,
    pub pause_reasons: Vec<PauseReason>,
    /// Recordings completed since the engine started.
    pub completed_recordings: usize,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            phase: EnginePhase::Idle,
            session_id: None,
            elapsed_ms: 0,
            pause_reasons: Vec::new(),
            completed_recordings: 0,
        }
    }
}

impl StateSnapshot {
    /// Elapsed time as `MM:SS` for display.
    pub fn formatted_elapsed(&self) -> String {
        let total_secs = self.elapsed_ms / 1000;
        format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
    }
}

enum Command {
    Start { source: AudioSourceKind, reply: oneshot::Sender<Result<String, RecorderError>> },
    Pause { reply: oneshot::Sender<Result<(), RecorderError>> },
    Resume { reply: oneshot::Sender<Result<(), RecorderError>> },
    Stop { reply: oneshot::Sender<Result<RecordingItem, RecorderError>> },
    Discard { reply: oneshot::Sender<Result<(), RecorderError>> },
}

/// Public handle to the recording engine. Cloneable; all clones talk to
/// the same state-machine task.
#[derive(Clone)]
pub struct Recorder {
    cmd_tx: mpsc::Sender<Command>,
    signal_tx: mpsc::Sender<Signal>,
    events: broadcast::Sender<EngineEvent>,
    state_rx: watch::Receiver<StateSnapshot>,
}

impl Recorder {
    /// Spawn the engine task and the storage monitor feeding it.
    pub fn spawn(
        config: RecorderConfig,
        store: Arc<SessionStore>,
        device: Box<dyn CaptureDevice>,
        storage: Arc<StorageMonitor>,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(StateSnapshot::default());

        let (monitor_tx, mut monitor_rx) = mpsc::channel(8);
        let monitor = storage.clone();
        tokio::spawn(async move { monitor.run(monitor_tx).await });
        let forward = signal_tx.clone();
        tokio::spawn(async move {
            while let Some(update) = monitor_rx.recv().await {
                if forward.send(Signal::Storage(update)).await.is_err() {
                    break;
                }
            }
        });

        let task = EngineTask {
            config,
            store,
            device,
            storage,
            cmd_rx,
            signal_rx,
            events: events.clone(),
            state_tx,
            active: None,
            next_rollover: None,
            completed_recordings: 0,
        };
        let handle = tokio::spawn(task.run());

        (Recorder { cmd_tx, signal_tx, events, state_rx }, handle)
    }

    /// Start a new recording session; returns its id.
    pub async fn start(&self, source: AudioSourceKind) -> Result<String, RecorderError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start { source, reply: tx }).await?;
        rx.await.map_err(|_| RecorderError::ChannelClosed)?
    }

    /// Pause the active session on the user's behalf.
    pub async fn pause(&self) -> Result<(), RecorderError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Pause { reply: tx }).await?;
        rx.await.map_err(|_| RecorderError::ChannelClosed)?
    }

    /// Clear the user pause. Fails with `ResumeBlocked` while interrupt
    /// reasons are still active.
    pub async fn resume(&self) -> Result<(), RecorderError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Resume { reply: tx }).await?;
        rx.await.map_err(|_| RecorderError::ChannelClosed)?
    }

    /// Stop the active session, merge its chunks, and return the result.
    pub async fn stop(&self) -> Result<RecordingItem, RecorderError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop { reply: tx }).await?;
        rx.await.map_err(|_| RecorderError::ChannelClosed)?
    }

    /// Abandon the active session and delete its chunk files.
    pub async fn discard(&self) -> Result<(), RecorderError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Discard { reply: tx }).await?;
        rx.await.map_err(|_| RecorderError::ChannelClosed)?
    }

    /// Channel for platform interrupt signals.
    pub fn signals(&self) -> mpsc::Sender<Signal> {
        self.signal_tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Publisher side of the event stream, for components that announce
    /// on the same channel (startup recovery, platform glue).
    pub fn event_sink(&self) -> broadcast::Sender<EngineEvent> {
        self.events.clone()
    }

    pub fn state(&self) -> watch::Receiver<StateSnapshot> {
        self.state_rx.clone()
    }

    async fn send(&self, cmd: Command) -> Result<(), RecorderError> {
        self.cmd_tx.send(cmd).await.map_err(|_| RecorderError::ChannelClosed)
    }
}

struct ActiveSession {
    session: RecordingSession,
    tracker: ChunkTracker,
    reasons: BTreeSet<PauseReason>,
    pause_started_ms: Option<i64>,
    /// Rollover time left when the chunk was frozen by an in-place pause.
    rollover_remaining: Option<std::time::Duration>,
    in_place_paused: bool,
}

struct EngineTask {
    config: RecorderConfig,
    store: Arc<SessionStore>,
    device: Box<dyn CaptureDevice>,
    storage: Arc<StorageMonitor>,
    cmd_rx: mpsc::Receiver<Command>,
    signal_rx: mpsc::Receiver<Signal>,
    events: broadcast::Sender<EngineEvent>,
    state_tx: watch::Sender<StateSnapshot>,
    active: Option<ActiveSession>,
    next_rollover: Option<Instant>,
    completed_recordings: usize,
}

impl EngineTask {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.timer.tick_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut signals_open = true;

        loop {
            let rollover_at = self.next_rollover;
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                sig = self.signal_rx.recv(), if signals_open => match sig {
                    Some(sig) => self.handle_signal(sig).await,
                    None => signals_open = false,
                },
                _ = tokio::time::sleep_until(rollover_at.unwrap_or_else(Instant::now)),
                    if rollover_at.is_some() =>
                {
                    self.roll_chunk().await;
                }
                _ = ticker.tick(), if self.active.is_some() => {
                    self.publish_tick().await;
                }
            }
        }

        if let Some(active) = &self.active {
            crate::warn!(
                "[engine] shutting down with session {} still active; startup recovery will finish it",
                active.session.session_id
            );
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { source, reply } => {
                let _ = reply.send(self.do_start(source).await);
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.do_pause_user().await);
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.do_resume_user().await);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.do_stop().await);
            }
            Command::Discard { reply } => {
                let _ = reply.send(self.do_discard().await);
            }
        }
    }

    async fn handle_signal(&mut self, sig: Signal) {
        match sig {
            Signal::RouteChanged(route) => {
                // Device swaps arrive in bursts (e.g. Bluetooth connect
                // knocking out the wired route); apply only the latest.
                let mut latest = route;
                let mut follow = None;
                loop {
                    match self.signal_rx.try_recv() {
                        Ok(Signal::RouteChanged(next)) => latest = next,
                        Ok(other) => {
                            follow = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                self.apply_route(latest).await;
                if let Some(sig) = follow {
                    self.dispatch_signal(sig).await;
                }
            }
            other => self.dispatch_signal(other).await,
        }
    }

    async fn dispatch_signal(&mut self, sig: Signal) {
        match sig {
            Signal::CallStarted => self.signal_pause(PauseReason::Call).await,
            Signal::CallEnded => self.signal_clear(PauseReason::Call).await,
            Signal::FocusLost => self.signal_pause(PauseReason::AudioFocus).await,
            Signal::FocusGained => self.signal_clear(PauseReason::AudioFocus).await,
            Signal::Storage(update) => self.handle_storage(update).await,
            Signal::Silence(silent_secs) => {
                self.emit(EngineEvent::SilenceWarning(SilencePayload { silent_secs }));
            }
            Signal::RouteChanged(route) => self.apply_route(route).await,
        }
    }

    async fn do_start(&mut self, source: AudioSourceKind) -> Result<String, RecorderError> {
        if let Some(active) = &self.active {
            return Err(RecorderError::InvalidTransition {
                from: active.session.status.as_str(),
                requested: "start",
            });
        }

        match self.storage.available_mb() {
            Ok(available_mb) => {
                if !self.storage.can_start(available_mb) {
                    return Err(RecorderError::InsufficientStorage {
                        available_mb,
                        required_mb: self.config.storage.min_start_mb,
                    });
                }
            }
            Err(e) => {
                // Cannot tell how much space there is; let the background
                // monitor catch real pressure once recording runs.
                crate::warn!("[engine] free-space probe failed before start: {}", e);
            }
        }

        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| RecorderError::Finalize(e.to_string()))?;

        let started_ms = now_ms();
        let session_id = uuid::Uuid::new_v4().to_string();
        let base_file_name = format!(
            "{}_{}",
            self.config.base_prefix,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let session = RecordingSession {
            session_id: session_id.clone(),
            start_time_ms: started_ms,
            status: SessionStatus::Recording,
            paused_accumulated_ms: 0,
            last_chunk_index: 0,
            output_directory: self.config.output_dir.to_string_lossy().into_owned(),
            base_file_name: base_file_name.clone(),
            audio_source: source,
            pause_reason: None,
            last_activity_ms: started_ms,
            is_active: true,
        };
        self.store.insert_session(&session).await?;

        let mut tracker = ChunkTracker::new(
            session_id.clone(),
            self.config.output_dir.clone(),
            base_file_name.clone(),
            self.config.chunks.extension.clone(),
        );
        let chunk = tracker.open_next();
        self.store.insert_chunk(&chunk).await?;
        if let Err(e) = self.device.open(std::path::Path::new(&chunk.file_path), source) {
            // Session row stays behind but inactive, so it neither blocks
            // the next start nor triggers recovery.
            self.store.deactivate_session(&session_id).await?;
            return Err(RecorderError::Device(e));
        }

        self.next_rollover = Some(Instant::now() + self.config.chunks.chunk_duration());
        self.active = Some(ActiveSession {
            session,
            tracker,
            reasons: BTreeSet::new(),
            pause_started_ms: None,
            rollover_remaining: None,
            in_place_paused: false,
        });

        crate::info!("[engine] session {} started ({})", session_id, base_file_name);
        self.emit(EngineEvent::RecordingStarted(RecordingStartedPayload {
            session_id: session_id.clone(),
            output_directory: self.config.output_dir.to_string_lossy().into_owned(),
            base_file_name,
        }));
        self.publish_state();
        Ok(session_id)
    }

    async fn do_pause_user(&mut self) -> Result<(), RecorderError> {
        let mut active = match self.active.take() {
            Some(a) => a,
            None => {
                return Err(RecorderError::InvalidTransition { from: "IDLE", requested: "pause" })
            }
        };
        let result = self.add_reason(&mut active, PauseReason::User).await;
        self.active = Some(active);
        result
    }

    async fn do_resume_user(&mut self) -> Result<(), RecorderError> {
        let mut active = match self.active.take() {
            Some(a) => a,
            None => {
                return Err(RecorderError::InvalidTransition { from: "IDLE", requested: "resume" })
            }
        };
        let result = self.clear_reason(&mut active, PauseReason::User, true).await;
        self.active = Some(active);
        result
    }

    async fn signal_pause(&mut self, reason: PauseReason) {
        let mut active = match self.active.take() {
            Some(a) => a,
            None => {
                crate::debug!("[engine] {} interrupt with no session, ignored", reason.as_str());
                return;
            }
        };
        if let Err(e) = self.add_reason(&mut active, reason).await {
            crate::error!("[engine] failed to apply {} pause: {}", reason.as_str(), e);
        }
        self.active = Some(active);
    }

    async fn signal_clear(&mut self, reason: PauseReason) {
        let mut active = match self.active.take() {
            Some(a) => a,
            None => return,
        };
        if let Err(e) = self.clear_reason(&mut active, reason, false).await {
            crate::error!("[engine] failed to clear {} pause: {}", reason.as_str(), e);
        }
        self.active = Some(active);
    }

    /// Add a pause reason, physically pausing capture when it is the
    /// first one.
    async fn add_reason(
        &mut self,
        active: &mut ActiveSession,
        reason: PauseReason,
    ) -> Result<(), RecorderError> {
        if active.reasons.contains(&reason) {
            return Ok(());
        }
        let was_recording = active.reasons.is_empty();
        active.reasons.insert(reason);

        if was_recording {
            if self.device.supports_pause() {
                self.device.pause()?;
                active.in_place_paused = true;
                active.rollover_remaining = self
                    .next_rollover
                    .map(|at| at.saturating_duration_since(Instant::now()));
            } else {
                self.close_open_chunk(active).await?;
            }
            self.next_rollover = None;
            active.pause_started_ms = Some(now_ms());
            active.session.status = SessionStatus::Paused;
        }

        let display = active.reasons.iter().next().copied();
        active.session.pause_reason = display;
        self.store
            .update_session_status(
                &active.session.session_id,
                SessionStatus::Paused,
                display,
                now_ms(),
            )
            .await?;

        if was_recording {
            crate::info!(
                "[engine] session {} paused ({})",
                active.session.session_id,
                reason.as_str()
            );
            self.emit(EngineEvent::RecordingPaused(RecordingPausedPayload {
                session_id: active.session.session_id.clone(),
                reason,
            }));
        }
        self.publish_state_for(active);
        Ok(())
    }

    /// Remove a pause reason; capture resumes only when the set empties.
    /// A user resume with interrupt reasons still active clears the user
    /// reason but reports `ResumeBlocked`.
    async fn clear_reason(
        &mut self,
        active: &mut ActiveSession,
        reason: PauseReason,
        user_initiated: bool,
    ) -> Result<(), RecorderError> {
        if !active.reasons.remove(&reason) {
            if user_initiated {
                return Err(RecorderError::InvalidTransition {
                    from: active.session.status.as_str(),
                    requested: "resume",
                });
            }
            return Ok(());
        }

        if !active.reasons.is_empty() {
            let remaining: Vec<PauseReason> = active.reasons.iter().copied().collect();
            let display = active.reasons.iter().next().copied();
            active.session.pause_reason = display;
            self.store
                .update_session_status(
                    &active.session.session_id,
                    SessionStatus::Paused,
                    display,
                    now_ms(),
                )
                .await?;
            self.publish_state_for(active);
            if user_initiated {
                return Err(RecorderError::ResumeBlocked { reasons: remaining });
            }
            return Ok(());
        }

        let now = now_ms();
        if let Some(paused_at) = active.pause_started_ms.take() {
            active.session.paused_accumulated_ms += (now - paused_at).max(0);
            self.store
                .update_paused_accumulated(
                    &active.session.session_id,
                    active.session.paused_accumulated_ms,
                )
                .await?;
        }

        if active.in_place_paused {
            self.device.resume()?;
            active.in_place_paused = false;
            let remaining = active
                .rollover_remaining
                .take()
                .unwrap_or_else(|| self.config.chunks.chunk_duration());
            self.next_rollover = Some(Instant::now() + remaining);
        } else {
            self.open_next_chunk(active).await?;
            self.next_rollover = Some(Instant::now() + self.config.chunks.chunk_duration());
        }

        active.session.status = SessionStatus::Recording;
        active.session.pause_reason = None;
        self.store
            .update_session_status(&active.session.session_id, SessionStatus::Recording, None, now)
            .await?;

        crate::info!("[engine] session {} resumed", active.session.session_id);
        self.emit(EngineEvent::RecordingResumed(SessionPayload {
            session_id: active.session.session_id.clone(),
        }));
        self.publish_state_for(active);
        Ok(())
    }

    async fn do_stop(&mut self) -> Result<RecordingItem, RecorderError> {
        let mut active = match self.active.take() {
            Some(a) => a,
            None => {
                return Err(RecorderError::InvalidTransition { from: "IDLE", requested: "stop" })
            }
        };
        self.next_rollover = None;

        match self.finalize_session(&mut active).await {
            Ok(item) => {
                crate::info!("[engine] session {} stopped", active.session.session_id);
                self.completed_recordings += 1;
                self.emit(EngineEvent::RecordingStopped(RecordingStoppedPayload {
                    session_id: active.session.session_id.clone(),
                    item: item.clone(),
                }));
                self.publish_state();
                Ok(item)
            }
            Err(e) => {
                self.emit(EngineEvent::RecordingError(ErrorPayload {
                    session_id: active.session.session_id.clone(),
                    message: e.to_string(),
                }));
                self.publish_state();
                Err(e)
            }
        }
    }

    async fn do_discard(&mut self) -> Result<(), RecorderError> {
        let mut active = match self.active.take() {
            Some(a) => a,
            None => {
                return Err(RecorderError::InvalidTransition { from: "IDLE", requested: "discard" })
            }
        };
        self.next_rollover = None;

        if active.tracker.open_path().is_some() {
            if let Err(e) = self.device.stop() {
                crate::warn!("[engine] capture stop during discard failed: {}", e);
            }
            active.tracker.close_current(0);
        }

        let session_id = active.session.session_id.clone();
        let chunks = self.store.chunks_for_session(&session_id).await?;
        for chunk in &chunks {
            if let Err(e) = std::fs::remove_file(&chunk.file_path) {
                crate::debug!("[engine] could not delete {}: {}", chunk.file_path, e);
            }
        }
        self.store
            .update_session_status(&session_id, SessionStatus::Stopped, None, now_ms())
            .await?;
        self.store.deactivate_session(&session_id).await?;

        crate::info!("[engine] session {} discarded", session_id);
        self.emit(EngineEvent::RecordingDiscarded(SessionPayload { session_id }));
        self.publish_state();
        Ok(())
    }

    /// Close the open chunk, merge everything, and deactivate the session.
    /// On merge failure a MergeChunks task is queued and the session stays
    /// active so startup recovery can finish the job.
    async fn finalize_session(
        &mut self,
        active: &mut ActiveSession,
    ) -> Result<RecordingItem, RecorderError> {
        let now = now_ms();
        if let Some(paused_at) = active.pause_started_ms.take() {
            active.session.paused_accumulated_ms += (now - paused_at).max(0);
            self.store
                .update_paused_accumulated(
                    &active.session.session_id,
                    active.session.paused_accumulated_ms,
                )
                .await?;
        }
        if active.tracker.open_path().is_some() {
            if let Err(e) = self.close_open_chunk(active).await {
                crate::warn!("[engine] closing final chunk failed: {}", e);
            }
        }

        let session_id = active.session.session_id.clone();
        let chunks = self.store.chunks_for_session(&session_id).await?;
        let inputs: Vec<PathBuf> = chunks.iter().map(|c| PathBuf::from(&c.file_path)).collect();
        let merged = active.session.merged_output_path(&self.config.chunks.extension);

        match merger::merge_files(&inputs, &merged) {
            Ok(()) => {
                self.store.clear_needs_merging(&session_id).await?;
                self.store
                    .update_session_status(&session_id, SessionStatus::Stopped, None, now_ms())
                    .await?;
                self.store.deactivate_session(&session_id).await?;
                for chunk in &chunks {
                    if let Err(e) = std::fs::remove_file(&chunk.file_path) {
                        crate::debug!("[engine] could not delete {}: {}", chunk.file_path, e);
                    }
                }
                let elapsed_ms = session_elapsed_ms(&active.session, None);
                Ok(RecordingItem {
                    file_path: merged,
                    name: active.session.base_file_name.clone(),
                    created_at: chrono::DateTime::from_timestamp_millis(
                        active.session.start_time_ms,
                    )
                    .unwrap_or_else(chrono::Utc::now),
                    duration_secs: elapsed_ms / 1000,
                })
            }
            Err(MergeError::NoInput) => {
                // No usable audio was ever captured; do not leave a session
                // behind for recovery to chew on, and do not hand the
                // caller an empty recording.
                for chunk in &chunks {
                    if let Err(e) = std::fs::remove_file(&chunk.file_path) {
                        crate::debug!("[engine] could not delete {}: {}", chunk.file_path, e);
                    }
                }
                self.store
                    .update_session_status(&session_id, SessionStatus::Stopped, None, now_ms())
                    .await?;
                self.store.deactivate_session(&session_id).await?;
                Err(RecorderError::Finalize("no audio captured".to_string()))
            }
            Err(e) => {
                crate::error!("[engine] merge failed for session {}: {}", session_id, e);
                self.store
                    .update_session_status(&session_id, SessionStatus::Stopped, None, now_ms())
                    .await?;
                self.store
                    .enqueue_task(&session_id, TaskType::MergeChunks, self.config.recovery.max_retries)
                    .await?;
                Err(RecorderError::Finalize(e.to_string()))
            }
        }
    }

    async fn handle_storage(&mut self, update: StorageUpdate) {
        self.emit(EngineEvent::StorageStatusChanged(StoragePayload {
            status: update.status,
            available_mb: update.available_mb,
        }));
        if update.status != StorageStatus::Critical {
            return;
        }
        let mut active = match self.active.take() {
            Some(a) => a,
            None => return,
        };
        self.next_rollover = None;
        crate::warn!(
            "[engine] critical storage ({}MB), force-stopping session {}",
            update.available_mb,
            active.session.session_id
        );

        let session_id = active.session.session_id.clone();
        let item = match self.finalize_session(&mut active).await {
            Ok(item) => {
                self.completed_recordings += 1;
                Some(item)
            }
            Err(e) => {
                crate::error!("[engine] force-stop finalize failed: {}", e);
                None
            }
        };
        self.emit(EngineEvent::RecordingForceStopped(ForceStoppedPayload {
            session_id,
            available_mb: update.available_mb,
            item,
        }));
        self.publish_state();
    }

    async fn apply_route(&mut self, route: InputRoute) {
        crate::info!("[engine] input route changed to {}", route.name);
        self.emit(EngineEvent::InputRouteChanged(RoutePayload { route: route.clone() }));

        let mut active = match self.active.take() {
            Some(a) => a,
            None => return,
        };
        if active.session.status == SessionStatus::Recording {
            match self.device.set_input_route(&route) {
                Ok(RouteApplied::InPlace) => {}
                Ok(RouteApplied::NeedsRestart) => {
                    // Restart capture on a chunk boundary so no audio is
                    // lost outside the device switch itself.
                    let result = async {
                        self.close_open_chunk(&mut active).await?;
                        self.open_next_chunk(&mut active).await
                    }
                    .await;
                    match result {
                        Ok(()) => {
                            self.next_rollover =
                                Some(Instant::now() + self.config.chunks.chunk_duration());
                        }
                        Err(e) => {
                            crate::error!("[engine] chunk restart for route change failed: {}", e)
                        }
                    }
                }
                Err(e) => crate::warn!("[engine] route change rejected by device: {}", e),
            }
        }
        self.active = Some(active);
    }

    async fn roll_chunk(&mut self) {
        let mut active = match self.active.take() {
            Some(a) => a,
            None => return,
        };
        if active.session.status != SessionStatus::Recording {
            self.active = Some(active);
            return;
        }
        let result = async {
            self.close_open_chunk(&mut active).await?;
            self.open_next_chunk(&mut active).await
        }
        .await;
        match result {
            Ok(()) => {
                self.next_rollover = Some(Instant::now() + self.config.chunks.chunk_duration());
                let chunk_index = active.tracker.last_index();
                crate::debug!(
                    "[engine] session {} rolled to chunk {}",
                    active.session.session_id,
                    chunk_index
                );
                self.emit(EngineEvent::ChunkRolled(ChunkRolledPayload {
                    session_id: active.session.session_id.clone(),
                    chunk_index,
                }));
            }
            Err(e) => {
                crate::error!("[engine] chunk rollover failed: {}", e);
                self.next_rollover = Some(Instant::now() + self.config.chunks.chunk_duration());
            }
        }
        self.active = Some(active);
    }

    async fn close_open_chunk(&mut self, active: &mut ActiveSession) -> Result<(), RecorderError> {
        if active.tracker.open_path().is_none() {
            return Ok(());
        }
        let size = self.device.stop()?;
        if let Some(closed) = active.tracker.close_current(size as i64) {
            self.store
                .complete_chunk(
                    &closed.chunk_id,
                    closed.end_time_ms,
                    closed.duration_ms,
                    closed.file_size_bytes,
                )
                .await?;
        }
        Ok(())
    }

    async fn open_next_chunk(&mut self, active: &mut ActiveSession) -> Result<(), RecorderError> {
        let chunk = active.tracker.open_next();
        self.store.insert_chunk(&chunk).await?;
        self.device
            .open(std::path::Path::new(&chunk.file_path), active.session.audio_source)?;
        active.session.last_chunk_index = chunk.chunk_index;
        self.store
            .update_last_chunk_index(&active.session.session_id, chunk.chunk_index)
            .await?;
        Ok(())
    }

    async fn publish_tick(&mut self) {
        let active = match self.active.take() {
            Some(a) => a,
            None => return,
        };
        if let Err(e) = self
            .store
            .touch_session(&active.session.session_id, now_ms())
            .await
        {
            crate::warn!("[engine] liveness heartbeat failed: {}", e);
        }
        if active.session.status == SessionStatus::Recording {
            self.emit(EngineEvent::ElapsedTick(ElapsedPayload {
                session_id: active.session.session_id.clone(),
                elapsed_ms: session_elapsed_ms(&active.session, active.pause_started_ms),
            }));
        }
        self.publish_state_for(&active);
        self.active = Some(active);
    }

    fn emit(&self, event: EngineEvent) {
        crate::trace!("[engine] emit {}", event.name());
        let _ = self.events.send(event);
    }

    fn publish_state(&self) {
        let snapshot = match &self.active {
            Some(active) => snapshot_for(active, self.completed_recordings),
            None => StateSnapshot {
                completed_recordings: self.completed_recordings,
                ..StateSnapshot::default()
            },
        };
        let _ = self.state_tx.send(snapshot);
    }

    fn publish_state_for(&self, active: &ActiveSession) {
        let _ = self.state_tx.send(snapshot_for(active, self.completed_recordings));
    }
}

fn snapshot_for(active: &ActiveSession, completed_recordings: usize) -> StateSnapshot {
    StateSnapshot {
        phase: match active.session.status {
            SessionStatus::Recording => EnginePhase::Recording,
            SessionStatus::Paused => EnginePhase::Paused,
            SessionStatus::Stopped => EnginePhase::Idle,
        },
        session_id: Some(active.session.session_id.clone()),
        elapsed_ms: session_elapsed_ms(&active.session, active.pause_started_ms),
        pause_reasons: active.reasons.iter().copied().collect(),
        completed_recordings,
    }
}

/// Recorded time excluding paused stretches, including a pause still in
/// progress.
fn session_elapsed_ms(session: &RecordingSession, pause_started_ms: Option<i64>) -> u64 {
    let now = now_ms();
    let in_progress = pause_started_ms.map(|p| (now - p).max(0)).unwrap_or(0);
    let elapsed = now - session.start_time_ms - session.paused_accumulated_ms - in_progress;
    elapsed.max(0) as u64
}

#[cfg(test)]
#[path = "machine_test.rs"]
mod tests;
