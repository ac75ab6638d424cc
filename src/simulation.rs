//! Simulation engine – tick-driven object spawner, animator and hit tester
//! for procedural mini-games.
//!
//! All mutable state lives in one [`SimulationState`] aggregate owned by the
//! engine; the active-object collection is an arena-style list (push on
//! spawn, swap-remove on despawn).  Within a tick the order is fixed:
//! existing objects advance first, then at most one spawn happens, then the
//! caller presents via [`SimulationEngine::snapshot`] – a freshly spawned
//! object is never advanced in the same tick.

use crate::types::{
    Color, Difficulty, EffectKind, GameKind, GeometryDescriptor, ObjectKind, SimulatedGameConfig,
    Vec3, VisualTheme,
};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Bounds & constants
// ---------------------------------------------------------------------------

/// Hard cap on simultaneously active objects, independent of spawn rate.
pub const MAX_ACTIVE_OBJECTS: usize = 20;

/// Score awarded per successful hit.
pub const SCORE_PER_HIT: f64 = 10.0;

/// Playable volume, in view space (viewpoint looks down −z).
pub const VOLUME_MIN: Vec3 = Vec3 {
    x: -3.0,
    y: -2.5,
    z: -4.5,
};
pub const VOLUME_MAX: Vec3 = Vec3 {
    x: 3.0,
    y: 3.0,
    z: -1.5,
};

/// Where hit-test rays originate.
pub const VIEW_ORIGIN: Vec3 = Vec3 {
    x: 0.0,
    y: 0.0,
    z: 2.0,
};

// ---------------------------------------------------------------------------
// Rays
// ---------------------------------------------------------------------------

/// A pick ray from the viewpoint through a pointer position.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalized(),
        }
    }

    /// Build a ray from normalized pointer coordinates in `[-1, 1]`.
    pub fn from_pointer(nx: f32, ny: f32) -> Self {
        Self::new(VIEW_ORIGIN, Vec3::new(nx * 0.9, ny * 0.9, -1.0))
    }

    /// Nearest intersection distance with a sphere, if any.
    pub fn sphere_hit(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin.sub(center);
        let b = oc.dot(self.dir);
        let c = oc.dot(oc) - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt = disc.sqrt();
        let t = -b - sqrt;
        if t >= 0.0 {
            Some(t)
        } else {
            let t = -b + sqrt;
            (t >= 0.0).then_some(t)
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// One transient game object inside the playable volume.
#[derive(Debug, Clone)]
pub struct SimulationObject {
    pub id: u64,
    pub kind: ObjectKind,
    pub color: Color,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Current rotation around the view axis (fall-and-rotate kinds).
    pub rotation: f32,
    /// Rotation speed in rad/s.
    pub spin: f32,
    pub opacity: f32,
    /// Oscillation phase offset (hover kinds).
    pub phase: f32,
    /// Vertical anchor the hover oscillation swings around.
    pub anchor_y: f32,
    /// Simulation time at which the object entered the volume.
    pub spawned_at: f32,
    /// Whether a translucent glow duplicate is attached.
    pub glow: bool,
}

impl SimulationObject {
    pub fn hit_radius(&self) -> f32 {
        self.kind.hit_radius()
    }
}

/// Short-lived burst fragment spawned on a hit.  Self-removing once fully
/// transparent.
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Color,
    pub opacity: f32,
    /// Opacity lost per second.
    pub fade_rate: f32,
}

// ---------------------------------------------------------------------------
// Tick / hit outputs
// ---------------------------------------------------------------------------

/// What a single [`SimulationEngine::tick`] call did.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// The tick counter that produced this report.
    pub tick: u64,
    pub spawned: usize,
    pub despawned: usize,
    /// Set exactly once, on the tick where the configured duration elapses.
    pub completed: bool,
}

/// A short synthesized feedback tone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub duration_ms: u32,
}

/// Per-hit feedback the host UI should play.
#[derive(Debug, Clone, Copy)]
pub struct HitFeedback {
    pub haptic: bool,
    pub tone: Option<ToneSpec>,
}

/// Result of a pointer event that removed an object.
#[derive(Debug, Clone)]
pub struct HitEvent {
    pub object_id: u64,
    pub kind: ObjectKind,
    /// Score after the fixed per-hit increment was applied.
    pub score_after: f64,
    pub particles_spawned: usize,
    pub feedback: HitFeedback,
}

// ---------------------------------------------------------------------------
// Render snapshot
// ---------------------------------------------------------------------------

/// Translucent duplicate rendered behind a glowing object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlowSprite {
    pub scale: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSprite {
    pub id: u64,
    pub geometry: GeometryDescriptor,
    pub color: Color,
    pub position: Vec3,
    pub rotation: f32,
    pub opacity: f32,
    pub glow: Option<GlowSprite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleSprite {
    pub position: Vec3,
    pub color: Color,
    pub opacity: f32,
}

/// Render-ready view of the current frame, built after advance + spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub theme: VisualTheme,
    pub objects: Vec<ObjectSprite>,
    pub particles: Vec<ParticleSprite>,
    pub score: f64,
    pub time_remaining: f32,
    pub winning: bool,
}

// ---------------------------------------------------------------------------
// State aggregate
// ---------------------------------------------------------------------------

/// Every mutable handle of one playthrough, gathered in one place and passed
/// explicitly through the tick functions.
pub struct SimulationState {
    objects: Vec<SimulationObject>,
    particles: Vec<Particle>,
    score: f64,
    elapsed: f32,
    since_spawn: f32,
    next_id: u64,
    rng: StdRng,
}

impl SimulationState {
    fn new(seed: u64) -> Self {
        Self {
            objects: Vec::with_capacity(MAX_ACTIVE_OBJECTS),
            particles: Vec::new(),
            score: 0.0,
            elapsed: 0.0,
            since_spawn: 0.0,
            next_id: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SimulationEngine {
    config: SimulatedGameConfig,
    object_color: Color,
    speed: f32,
    /// Host mute switch, ANDed with the game's own sound flag.
    host_sound: bool,
    state: SimulationState,
    tick_count: u64,
    complete: bool,
}

impl SimulationEngine {
    pub fn new(config: SimulatedGameConfig, seed: u64, host_sound: bool) -> Self {
        let object_color = Color::from_hex(&config.object_color);
        let speed = config.difficulty.speed_factor();
        Self {
            config,
            object_color,
            speed,
            host_sound,
            state: SimulationState::new(seed),
            tick_count: 0,
            complete: false,
        }
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    /// Advance the playthrough by `dt` seconds.
    ///
    /// Order within the tick is fixed: advance existing objects (removing
    /// any that left the volume), advance particles, then spawn at most one
    /// object if the rate and cap allow it.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let dt = dt.max(0.0);
        self.tick_count += 1;

        let mut report = TickReport {
            tick: self.tick_count,
            spawned: 0,
            despawned: 0,
            completed: false,
        };

        if self.complete {
            return report;
        }

        report.despawned = advance_objects(&mut self.state, self.config.game_kind, dt);
        advance_particles(&mut self.state, dt);

        self.state.elapsed += dt;
        self.state.since_spawn += dt;

        if self.try_spawn() {
            report.spawned = 1;
        }

        if self.state.elapsed >= self.config.duration_seconds {
            self.complete = true;
            report.completed = true;
            debug!(
                "simulation complete after {} ticks: score={} target={}",
                self.tick_count, self.state.score, self.config.target_score
            );
        }

        report
    }

    fn try_spawn(&mut self) -> bool {
        let rate = self.config.spawn_rate_per_second;
        if rate <= 0.0 || self.state.since_spawn < 1.0 / rate {
            return false;
        }
        // The attempt is consumed either way: over-cap spawns are dropped,
        // never queued.
        self.state.since_spawn = 0.0;
        if self.state.objects.len() >= MAX_ACTIVE_OBJECTS {
            return false;
        }

        let object = spawn_object(
            &mut self.state,
            &self.config,
            self.object_color,
            self.speed,
        );
        self.state.objects.push(object);
        true
    }

    // -----------------------------------------------------------------------
    // Hit testing
    // -----------------------------------------------------------------------

    /// Resolve one pointer event: the nearest intersected object (if any) is
    /// removed and scored.  One removal per event, even with overlapping
    /// objects.
    pub fn pointer_hit(&mut self, ray: Ray) -> Option<HitEvent> {
        if self.complete {
            return None;
        }

        let mut nearest: Option<(usize, f32)> = None;
        for (idx, object) in self.state.objects.iter().enumerate() {
            if let Some(t) = ray.sphere_hit(object.position, object.hit_radius()) {
                if nearest.map_or(true, |(_, best)| t < best) {
                    nearest = Some((idx, t));
                }
            }
        }

        let (idx, _) = nearest?;
        let object = self.state.objects.swap_remove(idx);
        self.state.score += SCORE_PER_HIT;

        let particles_spawned = if self.config.effect_enabled(EffectKind::Particles) {
            burst_particles(&mut self.state, object.position, object.color)
        } else {
            0
        };

        let tone = (self.host_sound && self.config.sound_enabled).then(|| ToneSpec {
            frequency_hz: 620.0 + self.state.rng.gen_range(0.0..120.0),
            duration_ms: 90,
        });

        Some(HitEvent {
            object_id: object.id,
            kind: object.kind,
            score_after: self.state.score,
            particles_spawned,
            feedback: HitFeedback {
                haptic: self.config.haptic_enabled,
                tone,
            },
        })
    }

    // -----------------------------------------------------------------------
    // Win condition & accessors
    // -----------------------------------------------------------------------

    /// Evaluated continuously; reaching the target never ends the run early.
    pub fn winning(&self) -> bool {
        self.state.score >= self.config.target_score
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Won/lost is decided only at completion time.
    pub fn won(&self) -> bool {
        self.complete && self.state.score >= self.config.target_score
    }

    pub fn score(&self) -> f64 {
        self.state.score
    }

    pub fn elapsed(&self) -> f32 {
        self.state.elapsed
    }

    pub fn time_remaining(&self) -> f32 {
        (self.config.duration_seconds - self.state.elapsed).max(0.0)
    }

    pub fn active_objects(&self) -> usize {
        self.state.objects.len()
    }

    pub fn particle_count(&self) -> usize {
        self.state.particles.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Presentation
    // -----------------------------------------------------------------------

    /// Build the render-ready frame for the host UI.
    pub fn snapshot(&self) -> SceneSnapshot {
        let objects = self
            .state
            .objects
            .iter()
            .map(|o| ObjectSprite {
                id: o.id,
                geometry: o.kind.geometry(),
                color: o.color,
                position: o.position,
                rotation: o.rotation,
                opacity: o.opacity,
                glow: o.glow.then(|| GlowSprite {
                    scale: 1.3,
                    opacity: (o.opacity * 0.35).min(0.35),
                }),
            })
            .collect();

        let particles = self
            .state
            .particles
            .iter()
            .map(|p| ParticleSprite {
                position: p.position,
                color: p.color,
                opacity: p.opacity,
            })
            .collect();

        SceneSnapshot {
            theme: self.config.visual_theme,
            objects,
            particles,
            score: self.state.score,
            time_remaining: self.time_remaining(),
            winning: self.winning(),
        }
    }
}

// ---------------------------------------------------------------------------
// Motion rules
// ---------------------------------------------------------------------------

/// Advance every active object by the motion rule of its game kind and drop
/// the ones that left the volume.  Returns how many were removed.
fn advance_objects(state: &mut SimulationState, kind: GameKind, dt: f32) -> usize {
    let elapsed = state.elapsed;
    let mut removed = 0;
    let mut idx = 0;
    while idx < state.objects.len() {
        let object = &mut state.objects[idx];
        match kind {
            GameKind::Catch => {
                // Rise and fade.
                object.position = object.position.add(object.velocity.scaled(dt));
                let span = VOLUME_MAX.y - VOLUME_MIN.y;
                let progress = ((object.position.y - VOLUME_MIN.y) / span).clamp(0.0, 1.0);
                object.opacity = (1.0 - progress * 0.8).max(0.2);
            }
            GameKind::Pop => {
                // Fall and rotate.
                object.position = object.position.add(object.velocity.scaled(dt));
                object.rotation += object.spin * dt;
            }
            GameKind::Hover => {
                // Hover-oscillate with a slow lateral drift out of the volume.
                object.position.x += object.velocity.x * dt;
                object.position.y =
                    object.anchor_y + ((elapsed - object.spawned_at) * 2.0 + object.phase).sin() * 0.4;
            }
        }

        if outside_volume(object) {
            state.objects.swap_remove(idx);
            removed += 1;
        } else {
            idx += 1;
        }
    }
    removed
}

fn outside_volume(object: &SimulationObject) -> bool {
    let r = object.hit_radius();
    let p = object.position;
    p.x < VOLUME_MIN.x - r
        || p.x > VOLUME_MAX.x + r
        || p.y < VOLUME_MIN.y - r
        || p.y > VOLUME_MAX.y + r
        || p.z < VOLUME_MIN.z - r
        || p.z > VOLUME_MAX.z + r
}

fn advance_particles(state: &mut SimulationState, dt: f32) {
    for particle in &mut state.particles {
        particle.position = particle.position.add(particle.velocity.scaled(dt));
        particle.opacity -= particle.fade_rate * dt;
    }
    state.particles.retain(|p| p.opacity > 0.0);
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Create one object at an entry point biased by game kind: below the
/// volume for catch games, above for pop games, mid-volume for hover.
fn spawn_object(
    state: &mut SimulationState,
    config: &SimulatedGameConfig,
    color: Color,
    speed: f32,
) -> SimulationObject {
    let id = state.next_id;
    state.next_id += 1;

    let radius = config.object_kind.hit_radius();
    let x = state.rng.gen_range(VOLUME_MIN.x + radius..VOLUME_MAX.x - radius);
    let z = state.rng.gen_range(VOLUME_MIN.z + radius..VOLUME_MAX.z - radius);

    let (position, velocity, anchor_y) = match config.game_kind {
        GameKind::Pop => {
            let position = Vec3::new(x, VOLUME_MAX.y + radius, z);
            let fall = state.rng.gen_range(0.9..1.4) * speed;
            let drift = state.rng.gen_range(-0.2..0.2);
            (position, Vec3::new(drift, -fall, 0.0), position.y)
        }
        GameKind::Catch => {
            let position = Vec3::new(x, VOLUME_MIN.y - radius, z);
            let rise = state.rng.gen_range(0.8..1.3) * speed;
            let drift = state.rng.gen_range(-0.15..0.15);
            (position, Vec3::new(drift, rise, 0.0), position.y)
        }
        GameKind::Hover => {
            let y = state.rng.gen_range(-0.8..1.8);
            let from_left = state.rng.gen_bool(0.5);
            let entry_x = if from_left {
                VOLUME_MIN.x - radius * 0.5
            } else {
                VOLUME_MAX.x + radius * 0.5
            };
            let drift = state.rng.gen_range(0.35..0.6) * speed;
            let vx = if from_left { drift } else { -drift };
            (Vec3::new(entry_x, y, z), Vec3::new(vx, 0.0, 0.0), y)
        }
    };

    SimulationObject {
        id,
        kind: config.object_kind,
        color,
        position,
        velocity,
        rotation: 0.0,
        spin: state.rng.gen_range(-2.2..2.2),
        opacity: 1.0,
        phase: state.rng.gen_range(0.0..std::f32::consts::TAU),
        anchor_y,
        spawned_at: state.elapsed,
        glow: config.effect_enabled(EffectKind::Glow),
    }
}

// ---------------------------------------------------------------------------
// Particles
// ---------------------------------------------------------------------------

/// Outward-radiating burst at a hit position: 15–25 fragments with
/// independent velocity and fading opacity.
fn burst_particles(state: &mut SimulationState, position: Vec3, color: Color) -> usize {
    let count = state.rng.gen_range(15..=25usize);
    for _ in 0..count {
        let dir = Vec3::new(
            state.rng.gen_range(-1.0..1.0),
            state.rng.gen_range(-1.0..1.0),
            state.rng.gen_range(-1.0..1.0),
        )
        .normalized();
        let speed = state.rng.gen_range(1.2..2.6);
        state.particles.push(Particle {
            position,
            velocity: dir.scaled(speed),
            color,
            opacity: 1.0,
            fade_rate: state.rng.gen_range(1.4..2.4),
        });
    }
    count
}
