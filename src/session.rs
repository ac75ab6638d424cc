//! Game session controller – one state machine per open game card.
//!
//! ## Phases
//!
//! ```text
//! AcquiringCamera ──(any camera outcome)──▶ Ready ──start()──▶ Playing
//!        ▲                                    ▲                   │
//!        └── new session only                 └──── replay() ── Complete
//! ```
//!
//! The session owns the content definition, the camera stream, and whichever
//! of the sandbox instance / simulation engine the definition selects.  No
//! phase may skip cleanup: [`GameSession::close`] stops the engine, tears
//! down the sandbox and releases the camera from any phase.

use crate::camera::{CameraOutcome, CameraStream};
use crate::protocol::{BridgeEnvelope, BridgeMessage, OriginToken};
use crate::sandbox::{SandboxInstance, SandboxPolicy};
use crate::simulation::{HitEvent, Ray, SceneSnapshot, SimulationEngine};
use crate::types::{
    CameraStatus, ContentDefinition, SessionConfig, SessionPhase, SessionStats,
};
use log::{debug, warn};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Fired exactly once per playthrough with the final score.
pub type CompleteCallback = Box<dyn FnMut(f64) + Send>;
/// Fired on every accepted score change, for live HUD display.
pub type ScoreCallback = Box<dyn FnMut(f64) + Send>;
/// Fired for free-form named events from embedded content.
pub type EventCallback = Box<dyn FnMut(&str, &serde_json::Value) + Send>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation requires phase {expected}, session is {actual}")]
    WrongPhase {
        expected: SessionPhase,
        actual: SessionPhase,
    },
    #[error("session already closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which execution backend the playthrough runs on.
enum Mode {
    Idle,
    Procedural(SimulationEngine),
    Raw(SandboxInstance),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct GameSession {
    definition: ContentDefinition,
    config: SessionConfig,
    policy: SandboxPolicy,
    phase: SessionPhase,
    camera_status: CameraStatus,
    camera: Option<CameraStream>,
    mode: Mode,
    score: f64,
    time_remaining: f32,
    tick_count: u64,
    content_failed: bool,
    completion_reported: bool,
    closed: bool,
    on_complete: Option<CompleteCallback>,
    on_score: Option<ScoreCallback>,
    on_event: Option<EventCallback>,
}

impl GameSession {
    pub fn new(definition: ContentDefinition, config: SessionConfig) -> Self {
        let time_remaining = match &definition {
            ContentDefinition::Simulated(game) => game.duration_seconds,
            ContentDefinition::RawContent { .. } => config.raw_duration_seconds,
        };
        Self {
            definition,
            config,
            policy: SandboxPolicy::default(),
            phase: SessionPhase::AcquiringCamera,
            camera_status: CameraStatus::Pending,
            camera: None,
            mode: Mode::Idle,
            score: 0.0,
            time_remaining,
            tick_count: 0,
            content_failed: false,
            completion_reported: false,
            closed: false,
            on_complete: None,
            on_score: None,
            on_event: None,
        }
    }

    pub fn with_policy(mut self, policy: SandboxPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_on_complete(&mut self, callback: CompleteCallback) {
        self.on_complete = Some(callback);
    }

    pub fn set_on_score(&mut self, callback: ScoreCallback) {
        self.on_score = Some(callback);
    }

    pub fn set_on_event(&mut self, callback: EventCallback) {
        self.on_event = Some(callback);
    }

    // -----------------------------------------------------------------------
    // Camera lifecycle
    // -----------------------------------------------------------------------

    /// Feed the camera resolution in.  Every outcome – granted, denied or
    /// unavailable – moves an acquiring session to `Ready`; a session closed
    /// while the request was in flight stops the late stream immediately.
    pub fn resolve_camera(&mut self, outcome: CameraOutcome) {
        if self.closed {
            if let CameraOutcome::Granted(stream) = outcome {
                stream.release();
            }
            return;
        }

        self.camera_status = outcome.status();
        if let CameraOutcome::Granted(stream) = outcome {
            self.camera = Some(stream);
        }

        if self.phase == SessionPhase::AcquiringCamera {
            self.phase = SessionPhase::Ready;
        }
        debug!(
            "camera resolved: status={:?} phase={}",
            self.camera_status, self.phase
        );
    }

    // -----------------------------------------------------------------------
    // Start / replay
    // -----------------------------------------------------------------------

    /// Explicit start action: `Ready → Playing`.  Procedural definitions get
    /// a fresh engine; raw definitions a fresh sandbox instance (any
    /// previous one is torn down first, so exactly one is ever live).
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.phase != SessionPhase::Ready {
            return Err(SessionError::WrongPhase {
                expected: SessionPhase::Ready,
                actual: self.phase,
            });
        }

        self.dismount();
        self.score = 0.0;
        self.content_failed = false;

        match &self.definition {
            ContentDefinition::Simulated(game) => {
                self.time_remaining = game.duration_seconds;
                self.mode = Mode::Procedural(SimulationEngine::new(
                    game.clone(),
                    self.config.seed,
                    self.config.sound_enabled,
                ));
            }
            ContentDefinition::RawContent { source } => {
                self.time_remaining = self.config.raw_duration_seconds;
                let instance = SandboxInstance::mount(source, &self.policy);
                // Contained failure: play on with the banner up.
                self.content_failed = instance.load_failed();
                self.mode = Mode::Raw(instance);
            }
        }

        self.phase = SessionPhase::Playing;
        Ok(())
    }

    /// `Complete → Ready` without re-requesting the camera.
    pub fn replay(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.phase != SessionPhase::Complete {
            return Err(SessionError::WrongPhase {
                expected: SessionPhase::Complete,
                actual: self.phase,
            });
        }

        self.phase = SessionPhase::Ready;
        self.score = 0.0;
        self.content_failed = false;
        self.completion_reported = false;
        self.time_remaining = match &self.definition {
            ContentDefinition::Simulated(game) => game.duration_seconds,
            ContentDefinition::RawContent { .. } => self.config.raw_duration_seconds,
        };
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the playthrough.  Only meaningful while `Playing`; other
    /// phases are a no-op so the driver loop never needs phase checks.
    pub fn tick(&mut self, dt: f32) {
        if self.phase != SessionPhase::Playing || self.closed {
            return;
        }
        let dt = dt.max(0.0);
        self.tick_count += 1;

        match &mut self.mode {
            Mode::Procedural(engine) => {
                let report = engine.tick(dt);
                let score = engine.score();
                self.time_remaining = engine.time_remaining();
                if score != self.score {
                    self.score = score;
                    if let Some(cb) = self.on_score.as_mut() {
                        cb(score);
                    }
                }
                if report.completed {
                    let final_score = engine.score();
                    self.finish(final_score);
                }
            }
            Mode::Raw(instance) => {
                let envelopes = instance.drain(self.tick_count);
                for envelope in envelopes {
                    self.apply_bridge(envelope);
                }
                if self.phase != SessionPhase::Playing {
                    return;
                }
                self.time_remaining = (self.time_remaining - dt).max(0.0);
                if self.time_remaining <= 0.0 {
                    let final_score = self.score;
                    self.finish(final_score);
                }
            }
            Mode::Idle => {}
        }
    }

    /// Resolve a pointer event against the procedural engine.
    pub fn pointer_hit(&mut self, ray: Ray) -> Option<HitEvent> {
        if self.phase != SessionPhase::Playing || self.closed {
            return None;
        }
        let Mode::Procedural(engine) = &mut self.mode else {
            return None;
        };
        let hit = engine.pointer_hit(ray)?;
        self.score = hit.score_after;
        if let Some(cb) = self.on_score.as_mut() {
            cb(self.score);
        }
        Some(hit)
    }

    // -----------------------------------------------------------------------
    // Bridge messages
    // -----------------------------------------------------------------------

    /// Apply one message from the isolation boundary.  Messages tagged with
    /// anything but the live instance's origin are discarded without
    /// touching state; so is everything arriving after close.
    pub fn handle_bridge(&mut self, envelope: BridgeEnvelope) {
        if self.closed {
            debug!("bridge message after close discarded");
            return;
        }
        self.apply_bridge(envelope);
    }

    fn apply_bridge(&mut self, envelope: BridgeEnvelope) {
        let Mode::Raw(instance) = &self.mode else {
            warn!("bridge message without a mounted sandbox discarded");
            return;
        };
        if envelope.origin != *instance.origin() {
            warn!(
                "bridge message from foreign origin {} discarded",
                envelope.origin
            );
            return;
        }

        match envelope.message {
            BridgeMessage::Score { value } => {
                if self.phase != SessionPhase::Playing {
                    return;
                }
                // Score is monotonic within a playing phase.
                if value < self.score {
                    debug!("score regression {} < {} discarded", value, self.score);
                    return;
                }
                if value != self.score {
                    self.score = value;
                    if let Some(cb) = self.on_score.as_mut() {
                        cb(value);
                    }
                }
            }
            BridgeMessage::Complete { final_score } => {
                if self.phase == SessionPhase::Complete {
                    debug!("duplicate complete message ignored");
                    return;
                }
                if self.phase != SessionPhase::Playing {
                    return;
                }
                self.score = final_score;
                self.finish(final_score);
            }
            BridgeMessage::Event { name, payload } => {
                if let Some(cb) = self.on_event.as_mut() {
                    cb(&name, &payload);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    fn finish(&mut self, final_score: f64) {
        if self.phase == SessionPhase::Complete {
            return;
        }
        self.phase = SessionPhase::Complete;
        self.score = final_score;
        if !self.completion_reported {
            self.completion_reported = true;
            if let Some(cb) = self.on_complete.as_mut() {
                cb(final_score);
            }
        }
        debug!("session complete: final_score={final_score}");
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    /// Tear everything down, from any phase.  Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.dismount();
        if let Some(stream) = self.camera.take() {
            stream.release();
        }
        debug!("session closed in phase {}", self.phase);
    }

    fn dismount(&mut self) {
        if let Mode::Raw(instance) = &mut self.mode {
            instance.teardown();
        }
        self.mode = Mode::Idle;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn time_remaining(&self) -> f32 {
        self.time_remaining
    }

    pub fn camera_status(&self) -> CameraStatus {
        self.camera_status
    }

    /// Non-blocking "couldn't load" banner for raw content.
    pub fn content_failed(&self) -> bool {
        self.content_failed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Origin of the live sandbox instance, if raw content is mounted.
    pub fn sandbox_origin(&self) -> Option<&OriginToken> {
        match &self.mode {
            Mode::Raw(instance) => Some(instance.origin()),
            _ => None,
        }
    }

    /// Whether the playthrough currently meets its win threshold
    /// (procedural games only; never ends the run early).
    pub fn winning(&self) -> bool {
        match &self.mode {
            Mode::Procedural(engine) => engine.winning(),
            _ => false,
        }
    }

    /// Render-ready frame, for procedural playthroughs.
    pub fn scene(&self) -> Option<SceneSnapshot> {
        match &self.mode {
            Mode::Procedural(engine) => Some(engine.snapshot()),
            _ => None,
        }
    }

    pub fn stats(&self) -> SessionStats {
        let active_objects = match &self.mode {
            Mode::Procedural(engine) => engine.active_objects(),
            _ => 0,
        };
        SessionStats {
            phase: self.phase,
            score: self.score,
            time_remaining: self.time_remaining,
            camera_status: self.camera_status,
            active_objects,
            total_ticks: self.tick_count,
            content_failed: self.content_failed,
        }
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        self.close();
    }
}
