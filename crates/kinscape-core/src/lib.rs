//! Core types and the simulation engine for the Kinscape data-viz.
//!
//! The engine owns every mutable entity (cultures, particles, camera) and
//! advances them one cooperative tick at a time; a rendering collaborator
//! only ever sees the read-only [`FrameSnapshot`] published after a tick.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

pub mod aggregate;
pub mod camera;
pub mod config;
pub mod culture;
pub mod engine;
pub mod layout;
pub mod particle;
pub mod sequence;

pub use camera::{Camera, CameraTarget, CameraTransform};
pub use config::{EngineConfig, ReverseExchangeMode};
pub use culture::{
    Culture, CultureKind, CultureRecord, ParticleBudget, ScopeLevel, derive_particle_counts,
};
pub use engine::{
    CultureView, Engine, FocusState, FrameSnapshot, ParticlePhase, ParticleView, TickEvents,
    TickSummary,
};
pub use particle::{
    BorderSlot, FlowAssignment, Particle, ParticleClass, ParticleState, plan_flow,
};
pub use sequence::{ExitPhase, ExitSequence};

new_key_type! {
    /// Stable handle for cultures backed by a generational slot map.
    pub struct CultureId;
}

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Ticks elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Axis-aligned 2D position in world units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Velocity in world units per tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    /// Construct a new velocity vector.
    #[must_use]
    pub const fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    /// Current speed.
    #[must_use]
    pub fn speed(self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Color expressed as hue/saturation/lightness, the semantic drivers the
/// renderer styles from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Hsl {
    /// Hue in degrees, `[0, 360)`.
    pub h: f32,
    /// Saturation, `[0, 1]`.
    pub s: f32,
    /// Lightness, `[0, 1]`.
    pub l: f32,
}

impl Hsl {
    /// Construct a color, normalizing hue into `[0, 360)` and clamping the
    /// other channels.
    #[must_use]
    pub fn new(h: f32, s: f32, l: f32) -> Self {
        Self {
            h: h.rem_euclid(360.0),
            s: s.clamp(0.0, 1.0),
            l: l.clamp(0.0, 1.0),
        }
    }
}

/// Rendering mode requested by the UI collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VisualMode {
    /// Border particles are published as visible.
    #[default]
    Bordered,
    /// Border particles stay simulated but are hidden from the snapshot.
    Borderless,
}

/// Errors raised when constructing or driving the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// An operation referenced a culture that does not exist.
    #[error("unknown culture: {0}")]
    UnknownCulture(String),
}
