//! Camera acquisition – platform permission prompt and stream lifecycle.
//!
//! The platform side (a real device prompt, a test stub, …) plugs in behind
//! [`CameraProvider`].  [`CameraAcquisition`] wraps every request in a
//! timeout so a stalled prompt can never suspend the caller forever: the
//! three-way [`CameraOutcome`] is the only thing that crosses this boundary,
//! never an error.

use crate::types::CameraStatus;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one permission request.  Denial and absence of hardware are
/// ordinary outcomes, not failures – the session plays on with a static
/// fallback background.
#[derive(Debug)]
pub enum CameraOutcome {
    Granted(CameraStream),
    Denied,
    Unavailable,
}

impl CameraOutcome {
    pub fn status(&self) -> CameraStatus {
        match self {
            CameraOutcome::Granted(_) => CameraStatus::Granted,
            CameraOutcome::Denied => CameraStatus::Denied,
            CameraOutcome::Unavailable => CameraStatus::Unavailable,
        }
    }
}

// ---------------------------------------------------------------------------
// Stream handle
// ---------------------------------------------------------------------------

/// Live video feed handle owned by the session for its lifetime.
///
/// `release()` stops the underlying feed exactly once; further calls and the
/// eventual `Drop` are no-ops.
pub struct CameraStream {
    label: String,
    released: Arc<AtomicBool>,
}

impl CameraStream {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop the feed.  Double-release is a no-op, not an error.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!("camera stream '{}' released", self.label);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Shared view of the release flag, for tests observing teardown.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("label", &self.label)
            .field("released", &self.is_released())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Platform entry point for opening a camera feed.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    /// Trigger the permission prompt and resolve its outcome.  May suspend
    /// while the user decides; must not panic.
    async fn open(&self) -> CameraOutcome;
}

/// Provider for platforms (or headless runs) without any camera hardware.
pub struct NoCameraProvider;

#[async_trait]
impl CameraProvider for NoCameraProvider {
    async fn open(&self) -> CameraOutcome {
        CameraOutcome::Unavailable
    }
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// Default ceiling on how long a permission prompt may stay unanswered.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(20);

/// Bounded-time wrapper around a [`CameraProvider`].
pub struct CameraAcquisition {
    provider: Arc<dyn CameraProvider>,
    timeout: Duration,
}

impl CameraAcquisition {
    pub fn new(provider: Arc<dyn CameraProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_PROMPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request the feed.  Always resolves: a prompt that never answers is
    /// classified `Unavailable` once the timeout elapses.
    pub async fn request(&self) -> CameraOutcome {
        match tokio::time::timeout(self.timeout, self.provider.open()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "camera prompt unanswered after {:?}, treating as unavailable",
                    self.timeout
                );
                CameraOutcome::Unavailable
            }
        }
    }
}
