//! Async driver – ticks a [`GameSession`] at a fixed rate until the
//! playthrough completes or a shutdown signal arrives.
//!
//! The session itself is synchronous; this is the only place where the
//! cooperative per-frame loop and the two suspending operations (camera
//! acquisition, shutdown) live.  The lock is held only long enough to tick,
//! never across an await.

use crate::camera::CameraAcquisition;
use crate::session::GameSession;
use crate::types::SessionPhase;
use anyhow::Result;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Tick rate in Hz.
    pub tick_rate_hz: f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { tick_rate_hz: 30.0 }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Wraps a [`GameSession`] and drives it to completion.
///
/// Call [`SessionRunner::run`] inside a Tokio task.  A value sent on the
/// shutdown channel closes the session mid-run and cancels the next
/// scheduled tick.
pub struct SessionRunner {
    config: RunnerConfig,
    session: Arc<Mutex<GameSession>>,
    camera: CameraAcquisition,
}

impl SessionRunner {
    pub fn new(
        config: RunnerConfig,
        session: Arc<Mutex<GameSession>>,
        camera: CameraAcquisition,
    ) -> Self {
        Self {
            config,
            session,
            camera,
        }
    }

    /// Acquire the camera, issue the start action, then tick until the
    /// session completes.  Returns the final score (the score at close time
    /// if shut down early).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<f64> {
        let outcome = self.camera.request().await;
        self.session.lock().resolve_camera(outcome);

        self.session.lock().start()?;
        info!("session started, ticking at {:.0}Hz", self.config.tick_rate_hz);

        let dt = 1.0 / self.config.tick_rate_hz;
        let mut timer = tokio::time::interval(std::time::Duration::from_secs_f32(dt));

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    // Hold the lock only long enough to tick.
                    let (phase, score) = {
                        let mut session = self.session.lock();
                        session.tick(dt);
                        (session.phase(), session.score())
                    };
                    if phase == SessionPhase::Complete {
                        return Ok(score);
                    }
                }
                _ = shutdown.changed() => {
                    info!("shutdown requested, closing session");
                    let mut session = self.session.lock();
                    let score = session.score();
                    session.close();
                    return Ok(score);
                }
            }
        }
    }
}
