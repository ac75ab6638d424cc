//! Sandbox host controller – isolated execution of untrusted inline scripts.
//!
//! ## Isolation contract
//!
//! Every [`SandboxInstance`] gets its own script engine with:
//! - a fresh, unpredictable [`OriginToken`] distinct from the host and from
//!   every other instance,
//! - zero module resolution: content cannot import code or reach the network
//!   or filesystem, because no such API exists inside the engine,
//! - hard resource ceilings ([`SandboxPolicy`]) that abort runaway scripts,
//! - exactly three injected host functions – `report_score(n)`,
//!   `report_complete(n)` and `report_event(name, payload)` – whose only
//!   effect is to queue a [`BridgeMessage`] in the instance outbox.
//!
//! Parse errors, runtime errors and exhausted budgets are contained: the
//! instance flags `load_failed` and nothing propagates to the host.

use crate::protocol::{BridgeEnvelope, BridgeMessage, OriginToken};
use log::{debug, warn};
use parking_lot::Mutex;
use rhai::{Dynamic, Engine};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Resource ceilings applied to one sandbox instance.
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    /// Abstract operation budget for the whole script run.
    pub max_operations: u64,
    /// Call-stack depth ceiling.
    pub max_call_levels: usize,
    /// Longest string the script may build.
    pub max_string_size: usize,
    /// Largest array the script may build.
    pub max_array_size: usize,
    /// Largest object map the script may build.
    pub max_map_size: usize,
    /// Expression nesting ceiling (globals and functions alike).
    pub max_expr_depth: usize,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 32,
            max_string_size: 64 * 1024,
            max_array_size: 4_096,
            max_map_size: 1_024,
            max_expr_depth: 64,
        }
    }
}

impl SandboxPolicy {
    /// Tighter ceilings for content from unknown publishers.
    pub fn strict() -> Self {
        Self {
            max_operations: 200_000,
            max_call_levels: 16,
            max_string_size: 16 * 1024,
            max_array_size: 1_024,
            max_map_size: 256,
            max_expr_depth: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// Instance
// ---------------------------------------------------------------------------

/// One isolated execution context for a raw-content game.
///
/// Created when a raw definition is opened, destroyed when the session
/// closes or the content is swapped.  Exactly one live instance per open
/// session.
pub struct SandboxInstance {
    origin: OriginToken,
    outbox: Arc<Mutex<Vec<BridgeMessage>>>,
    load_failed: bool,
    torn_down: bool,
    // Dropped on teardown; the script only runs once, at mount.
    engine: Option<Engine>,
}

impl SandboxInstance {
    /// Build the isolated engine, inject the bridge surface, and execute the
    /// inline script.  A failing script yields a live instance with
    /// `load_failed()` set – mounting itself cannot fail.
    pub fn mount(source: &str, policy: &SandboxPolicy) -> Self {
        let origin = OriginToken::generate();
        let outbox: Arc<Mutex<Vec<BridgeMessage>>> = Arc::new(Mutex::new(Vec::new()));

        let mut engine = Engine::new();
        engine.set_max_operations(policy.max_operations);
        engine.set_max_call_levels(policy.max_call_levels);
        engine.set_max_string_size(policy.max_string_size);
        engine.set_max_array_size(policy.max_array_size);
        engine.set_max_map_size(policy.max_map_size);
        engine.set_max_expr_depths(policy.max_expr_depth, policy.max_expr_depth);
        // No module resolution: `import` cannot load code from anywhere.
        engine.set_max_modules(0);

        register_bridge_surface(&mut engine, &outbox);

        let load_failed = match engine.run(source) {
            Ok(()) => false,
            Err(e) => {
                // Contained: the host only ever sees the banner flag.
                warn!("sandbox {origin}: content failed to load: {e}");
                true
            }
        };

        debug!(
            "mounted sandbox {origin} (load_failed={load_failed}, queued={})",
            outbox.lock().len()
        );

        Self {
            origin,
            outbox,
            load_failed,
            torn_down: false,
            engine: Some(engine),
        }
    }

    pub fn origin(&self) -> &OriginToken {
        &self.origin
    }

    /// Whether the inline script failed to parse or threw while running.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Move every queued message out, wrapped in envelopes tagged with this
    /// instance's origin and the accepting host frame.  Empty after
    /// teardown.
    pub fn drain(&mut self, frame: u64) -> Vec<BridgeEnvelope> {
        if self.torn_down {
            return Vec::new();
        }
        let mut queued = self.outbox.lock();
        queued
            .drain(..)
            .map(|message| BridgeEnvelope::new(self.origin.clone(), frame, message))
            .collect()
    }

    /// Release the engine and discard unread messages.  Idempotent, and safe
    /// even if the instance never finished loading.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.engine = None;
        self.outbox.lock().clear();
        debug!("tore down sandbox {}", self.origin);
    }
}

impl Drop for SandboxInstance {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ---------------------------------------------------------------------------
// Bridge surface
// ---------------------------------------------------------------------------

/// Inject the three `report_*` entry points.  Each one only queues a
/// validated [`BridgeMessage`]; invalid arguments are dropped in place, the
/// same silent-block treatment as any other policy violation.
fn register_bridge_surface(engine: &mut Engine, outbox: &Arc<Mutex<Vec<BridgeMessage>>>) {
    {
        let outbox = outbox.clone();
        engine.register_fn("report_score", move |value: f64| {
            push_checked(&outbox, BridgeMessage::Score { value });
        });
    }

    // Integer overloads: script integers are not coerced to floats.
    {
        let outbox = outbox.clone();
        engine.register_fn("report_score", move |value: i64| {
            push_checked(
                &outbox,
                BridgeMessage::Score {
                    value: value as f64,
                },
            );
        });
    }

    {
        let outbox = outbox.clone();
        engine.register_fn("report_complete", move |final_score: f64| {
            push_checked(&outbox, BridgeMessage::Complete { final_score });
        });
    }

    {
        let outbox = outbox.clone();
        engine.register_fn("report_complete", move |final_score: i64| {
            push_checked(
                &outbox,
                BridgeMessage::Complete {
                    final_score: final_score as f64,
                },
            );
        });
    }

    {
        let outbox = outbox.clone();
        engine.register_fn("report_event", move |name: &str, payload: Dynamic| {
            let payload = rhai::serde::from_dynamic::<serde_json::Value>(&payload)
                .unwrap_or(serde_json::Value::Null);
            push_checked(
                &outbox,
                BridgeMessage::Event {
                    name: name.to_string(),
                    payload,
                },
            );
        });
    }

    // Payload-less convenience overload.
    {
        let outbox = outbox.clone();
        engine.register_fn("report_event", move |name: &str| {
            push_checked(
                &outbox,
                BridgeMessage::Event {
                    name: name.to_string(),
                    payload: serde_json::Value::Null,
                },
            );
        });
    }
}

fn push_checked(outbox: &Arc<Mutex<Vec<BridgeMessage>>>, message: BridgeMessage) {
    match message.validate() {
        Ok(()) => outbox.lock().push(message),
        Err(e) => warn!("sandbox message dropped at source: {e}"),
    }
}
