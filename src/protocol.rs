//! Host ↔ sandbox bridge protocol.
//!
//! This module owns **every message that crosses the isolation boundary**
//! between embedded content and the host session.
//!
//! ## Design rules
//!
//! 1. Every message is `Serialize + Deserialize` with snake_case JSON.
//! 2. The sender origin travels on the envelope, attached by the transport —
//!    an origin claimed inside a payload is never trusted.
//! 3. The message set is closed and append-only: unknown `kind` values are
//!    dropped by the receiver, never errors, so older and newer embedded
//!    content keep working.
//! 4. Numeric fields are validated on receipt; non-finite or negative scores
//!    are rejected by construction, not by checks scattered at call sites.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Origin token
// ---------------------------------------------------------------------------

/// Opaque, unpredictable identity of one sandbox instance.
///
/// Two instances never share a token; a message tagged with a stale or
/// foreign token is discarded without touching session state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OriginToken(String);

impl OriginToken {
    /// Wrap an externally-generated token (tests, replay tooling).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "host")]
impl OriginToken {
    /// Freshly random 128-bit token, hex-encoded.
    pub fn generate() -> Self {
        Self(format!("origin-{:032x}", rand::random::<u128>()))
    }
}

impl std::fmt::Display for OriginToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The closed set of messages embedded content can send upward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Live score update for HUD display.
    Score { value: f64 },
    /// The playthrough finished with this final score.  Idempotent at the
    /// receiver: only the first valid one per session has an effect.
    Complete { final_score: f64 },
    /// Free-form named event with an arbitrary JSON payload.
    Event {
        name: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl BridgeMessage {
    /// Decode from already-parsed JSON.  Unknown `kind` or malformed fields
    /// come back as an error the caller logs and drops.
    pub fn decode(value: &serde_json::Value) -> Result<Self, ProtocolError> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or(ProtocolError::MissingKind)?;

        match kind {
            "score" | "complete" | "event" => {
                let msg: BridgeMessage = serde_json::from_value(value.clone())
                    .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
                msg.validate()?;
                Ok(msg)
            }
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }

    /// Reject shapes that parse but are semantically invalid.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            BridgeMessage::Score { value } => check_score(*value),
            BridgeMessage::Complete { final_score } => check_score(*final_score),
            BridgeMessage::Event { name, .. } => {
                if name.is_empty() {
                    Err(ProtocolError::InvalidPayload("empty event name".into()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

fn check_score(value: f64) -> Result<(), ProtocolError> {
    if !value.is_finite() {
        Err(ProtocolError::NonFiniteValue(value))
    } else if value < 0.0 {
        Err(ProtocolError::NegativeValue(value))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Every message crossing the bridge is wrapped in this envelope.
///
/// `origin` is attached by the transport, out-of-band of the payload.
/// `frame` is the host tick at which the transport accepted the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeEnvelope {
    pub origin: OriginToken,
    pub frame: u64,
    pub message: BridgeMessage,
}

impl BridgeEnvelope {
    pub fn new(origin: OriginToken, frame: u64, message: BridgeMessage) -> Self {
        Self {
            origin,
            frame,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an incoming bridge message was rejected.  Rejection is always a drop
/// on the receiving side, never a host-level failure.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("message has no `kind` field")]
    MissingKind,
    #[error("unknown message kind `{0}`")]
    UnknownKind(String),
    #[error("malformed payload: {0}")]
    InvalidPayload(String),
    #[error("non-finite score value {0}")]
    NonFiniteValue(f64),
    #[error("negative score value {0}")]
    NegativeValue(f64),
}
