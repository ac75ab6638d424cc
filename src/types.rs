//! Core types shared across all modules.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-length copy; `zero()` stays `zero()`.
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::zero()
        } else {
            Self::new(self.x / len, self.y / len, self.z / len)
        }
    }

    pub fn scaled(&self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn add(&self, other: Vec3) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(&self, other: Vec3) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// Linear RGB color in `[0, 1]` per channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (leading `#` optional).  Anything unparseable falls
    /// back to white rather than failing the session.
    pub fn from_hex(hex: &str) -> Self {
        let s = hex.trim().trim_start_matches('#');
        if s.len() != 6 || !s.is_ascii() {
            return Self::WHITE;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&s[range], 16)
                .map(|v| v as f32 / 255.0)
                .unwrap_or(1.0)
        };
        Self::new(channel(0..2), channel(2..4), channel(4..6))
    }
}

// ---------------------------------------------------------------------------
// Content definitions
// ---------------------------------------------------------------------------

/// What a game card contains: an untrusted inline script bundle, or a
/// structured procedural-game configuration.  Immutable once a session owns
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDefinition {
    /// Arbitrary third-party script, executed only inside a sandbox.
    RawContent { source: String },
    /// Procedurally-simulated mini-game overlaid on the camera feed.
    Simulated(SimulatedGameConfig),
}

/// Which family of mini-game drives object entry and motion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Objects drop in from above and are popped before they land.
    Pop,
    /// Objects rise from below and are caught mid-air.
    Catch,
    /// Objects drift through the volume, oscillating in place.
    Hover,
}

/// Geometry family for spawned objects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Sphere,
    Ring,
    Disc,
    Cube,
    Star,
    Heart,
}

/// Parametric geometry description handed to the host renderer.
///
/// Defined once per [`ObjectKind`] so the tick loop never branches on
/// content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum GeometryDescriptor {
    Sphere {
        radius: f32,
    },
    Torus {
        radius: f32,
        tube: f32,
    },
    Disc {
        radius: f32,
    },
    Box {
        half_extent: f32,
    },
    Star {
        points: u8,
        outer: f32,
        inner: f32,
        depth: f32,
    },
    Heart {
        scale: f32,
        depth: f32,
    },
}

impl ObjectKind {
    /// Geometry lookup table: one descriptor per kind.
    pub fn geometry(&self) -> GeometryDescriptor {
        match self {
            ObjectKind::Sphere => GeometryDescriptor::Sphere { radius: 0.4 },
            ObjectKind::Ring => GeometryDescriptor::Torus {
                radius: 0.4,
                tube: 0.12,
            },
            ObjectKind::Disc => GeometryDescriptor::Disc { radius: 0.45 },
            ObjectKind::Cube => GeometryDescriptor::Box { half_extent: 0.35 },
            ObjectKind::Star => GeometryDescriptor::Star {
                points: 5,
                outer: 0.45,
                inner: 0.2,
                depth: 0.15,
            },
            ObjectKind::Heart => GeometryDescriptor::Heart {
                scale: 0.4,
                depth: 0.18,
            },
        }
    }

    /// Bounding radius used for ray hit testing.
    pub fn hit_radius(&self) -> f32 {
        match self.geometry() {
            GeometryDescriptor::Sphere { radius } => radius,
            GeometryDescriptor::Torus { radius, tube } => radius + tube,
            GeometryDescriptor::Disc { radius } => radius,
            GeometryDescriptor::Box { half_extent } => half_extent * 1.45,
            GeometryDescriptor::Star { outer, .. } => outer,
            GeometryDescriptor::Heart { scale, .. } => scale * 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    /// Multiplier applied to object velocities.
    pub fn speed_factor(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.7,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.45,
        }
    }
}

/// Pass-through styling hint for the host renderer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisualTheme {
    Classic,
    Neon,
    Pastel,
}

/// Optional visual embellishments a game definition can switch on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Translucent enlarged duplicate behind each object.
    Glow,
    /// Outward particle burst on every hit.
    Particles,
}

/// Full configuration of one procedural mini-game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedGameConfig {
    pub game_kind: GameKind,
    pub object_kind: ObjectKind,
    /// Hex color (`#rrggbb`); unparseable values render white.
    pub object_color: String,
    /// Target objects per second.  Spawns beyond the active-object cap are
    /// dropped, never queued.
    pub spawn_rate_per_second: f32,
    /// Playthrough length.  The game always runs the full duration.
    pub duration_seconds: f32,
    /// Score threshold that classifies a finished playthrough as won.
    pub target_score: f64,
    pub difficulty: Difficulty,
    pub sound_enabled: bool,
    pub haptic_enabled: bool,
    pub visual_theme: VisualTheme,
    #[serde(default)]
    pub special_effects: HashSet<EffectKind>,
}

impl Default for SimulatedGameConfig {
    fn default() -> Self {
        Self {
            game_kind: GameKind::Pop,
            object_kind: ObjectKind::Sphere,
            object_color: "#ff5a7a".into(),
            spawn_rate_per_second: 2.0,
            duration_seconds: 30.0,
            target_score: 100.0,
            difficulty: Difficulty::Normal,
            sound_enabled: true,
            haptic_enabled: true,
            visual_theme: VisualTheme::Classic,
            special_effects: HashSet::new(),
        }
    }
}

impl SimulatedGameConfig {
    pub fn effect_enabled(&self, effect: EffectKind) -> bool {
        self.special_effects.contains(&effect)
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    AcquiringCamera,
    Ready,
    Playing,
    Complete,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionPhase::AcquiringCamera => "acquiring_camera",
            SessionPhase::Ready => "ready",
            SessionPhase::Playing => "playing",
            SessionPhase::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Outcome category of the platform camera prompt.  Recomputed per session,
/// never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    Pending,
    Granted,
    Denied,
    Unavailable,
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

/// HUD-facing summary of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub phase: SessionPhase,
    pub score: f64,
    pub time_remaining: f32,
    pub camera_status: CameraStatus,
    pub active_objects: usize,
    pub total_ticks: u64,
    /// Non-blocking "couldn't load" banner for raw content.
    pub content_failed: bool,
}

/// Host-side knobs for one session, independent of the content definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Host mute switch; a game's own `sound_enabled` is ANDed with this.
    pub sound_enabled: bool,
    /// Seed for the procedural engine's rng.
    pub seed: u64,
    /// Countdown length for raw-content games, which carry no duration of
    /// their own.
    pub raw_duration_seconds: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            seed: 42,
            raw_duration_seconds: 60.0,
        }
    }
}
