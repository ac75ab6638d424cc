//! Embedded mini-game host.
//!
//! Runs third-party interactive content inside a larger content feed without
//! letting it compromise the host: untrusted script bundles execute in an
//! isolated sandbox, procedural AR mini-games run on a tick-driven
//! simulation engine, and both report gameplay telemetry upward through one
//! typed bridge protocol.
//!
//! ## Architecture
//!
//! ```text
//! SessionRunner   (runner.rs)     ← async tick driver
//!   └── GameSession  (session.rs) ← phase state machine, one per card
//!         ├── SandboxInstance  (sandbox.rs)    ← raw-content games
//!         ├── SimulationEngine (simulation.rs) ← procedural games
//!         └── CameraAcquisition (camera.rs)    ← permission lifecycle
//! ```
//!
//! Messages crossing the isolation boundary are defined in `protocol.rs`;
//! anything not matching that closed schema – or tagged with the wrong
//! origin – is dropped before it can touch session state.

// Protocol and core types are always available (no host feature needed).
pub mod protocol;
pub mod types;

// Host-side modules require the `host` feature.
#[cfg(feature = "host")]
pub mod camera;
#[cfg(feature = "host")]
pub mod runner;
#[cfg(feature = "host")]
pub mod sandbox;
#[cfg(feature = "host")]
pub mod session;
#[cfg(feature = "host")]
pub mod simulation;

// Convenience re-exports (host only)
#[cfg(feature = "host")]
pub use camera::{CameraAcquisition, CameraOutcome, CameraProvider, CameraStream, NoCameraProvider};
#[cfg(feature = "host")]
pub use runner::{RunnerConfig, SessionRunner};
#[cfg(feature = "host")]
pub use sandbox::{SandboxInstance, SandboxPolicy};
#[cfg(feature = "host")]
pub use session::{GameSession, SessionError};
#[cfg(feature = "host")]
pub use simulation::{Ray, SimulationEngine, MAX_ACTIVE_OBJECTS, SCORE_PER_HIT};
pub use protocol::{BridgeEnvelope, BridgeMessage, OriginToken, ProtocolError};
pub use types::{
    CameraStatus, ContentDefinition, SessionConfig, SessionPhase, SessionStats,
    SimulatedGameConfig,
};
