//! Culture entities and the ingestion record they are built from.

use crate::{CultureId, Position, Velocity};
use kinscape_geom::PolygonSpec;
use serde::{Deserialize, Serialize};

/// Ordinal scope classification. The derive order gives
/// `Family < Local < Regional < National < Global`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub enum ScopeLevel {
    /// Household-scale culture.
    #[default]
    Family,
    /// Neighborhood or city scale.
    Local,
    /// State or district scale.
    Regional,
    /// Country scale.
    National,
    /// Worldwide scale.
    Global,
}

impl ScopeLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 5] = [
        Self::Family,
        Self::Local,
        Self::Regional,
        Self::National,
        Self::Global,
    ];
}

impl std::fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Family => "family",
            Self::Local => "local",
            Self::Regional => "regional",
            Self::National => "national",
            Self::Global => "global",
        };
        f.write_str(name)
    }
}

/// One validated ingestion row, as produced by the external data pipeline.
///
/// The engine assumes names are unique; relations are re-validated at load
/// time and invalid references dropped with a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CultureRecord {
    /// Unique display name.
    pub name: String,
    /// Peer relation names (same scope level).
    pub kinships: Vec<String>,
    /// Parent relation names (strictly higher scope level).
    pub affiliations: Vec<String>,
    /// Knowledge-stability score in `[0, 1]`.
    pub knowledge: f32,
    /// Openness score in `[0, 1]`.
    pub openness: f32,
    /// Language-distinctness score in `[0, 1]`.
    pub language: f32,
    /// Polygon side count suggested by the pipeline (re-derived after
    /// relation validation).
    pub sides: u32,
    /// Color hue in degrees.
    pub hue: f32,
    /// Scope classification.
    pub scope: ScopeLevel,
    /// Interior particle count.
    pub interior_particles: usize,
    /// Border particles per polygon edge.
    pub particles_per_edge: usize,
}

/// Particle counts derived from dataset scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleBudget {
    /// Polygon side count.
    pub sides: u32,
    /// Interior particle count.
    pub interior: usize,
    /// Border particles per edge.
    pub per_edge: usize,
    /// Total border particle count (`sides * per_edge`).
    pub border: usize,
}

impl ParticleBudget {
    /// Total particles for the culture.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.interior + self.border
    }
}

const INTERIOR_MIN: usize = 60;
const INTERIOR_MAX: usize = 220;
const EDGE_BASE: usize = 2;
const EDGE_ENERGY_BOOST: f32 = 3.0;
const MIN_TOTAL_PARTICLES: usize = 50;

/// Derive a particle budget from a culture's kinship count, openness score
/// and normalized energy, matching the upstream pipeline's formula: interior
/// scales with energy, per-edge with closedness plus a small energy boost,
/// and the total is floored at a minimum.
#[must_use]
pub fn derive_particle_counts(kinship_count: usize, openness: f32, norm_energy: f32) -> ParticleBudget {
    let openness = openness.clamp(0.0, 1.0);
    let norm_energy = norm_energy.clamp(0.0, 1.0);
    let sides = (kinship_count as u32).max(3);
    let mut interior =
        INTERIOR_MIN + (norm_energy * (INTERIOR_MAX - INTERIOR_MIN) as f32).floor() as usize;
    let per_edge = EDGE_BASE
        + ((1.0 - openness) * 5.0).floor() as usize
        + (norm_energy * EDGE_ENERGY_BOOST).floor() as usize;
    let per_edge = per_edge.max(1);
    let border = sides as usize * per_edge;
    if interior + border < MIN_TOTAL_PARTICLES {
        interior = MIN_TOTAL_PARTICLES - border;
    }
    ParticleBudget {
        sides,
        interior,
        per_edge,
        border,
    }
}

/// Circumradius assigned to a culture at scale 1, grown gently with its
/// interior particle load.
#[must_use]
pub(crate) fn base_size_for(interior: usize) -> f32 {
    28.0 + (interior as f32).sqrt() * 3.0
}

/// What a culture entity is: a dataset node, or a transient aggregate
/// standing in for a hidden higher-scope parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CultureKind {
    /// A node loaded from the dataset.
    Real {
        /// Scope classification.
        scope: ScopeLevel,
        /// Knowledge-stability score.
        knowledge: f32,
        /// Openness score.
        openness: f32,
        /// Language-distinctness score.
        language: f32,
        /// Resolved peer relations.
        kin: Vec<CultureId>,
        /// Resolved parent, if any survived validation.
        parent: Option<CultureId>,
    },
    /// A synthetic parent group synthesized by the aggregation engine.
    Synthetic {
        /// Name of the real parent this group stands in for.
        group: String,
        /// Children currently clamped inside this group.
        members: Vec<CultureId>,
    },
}

/// A polygon entity representing one dataset node or synthetic group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Culture {
    /// Display name (unique across real cultures).
    pub name: String,
    /// Base color hue in degrees.
    pub hue: f32,
    /// Polygon side count, never below 3.
    pub sides: u32,
    /// Circumradius at scale 1.
    pub size: f32,
    /// Polygon rotation.
    pub rotation: f32,
    /// Phase offset for renderer-side shape morphing.
    pub morph_offset: f32,
    /// Current position.
    pub position: Position,
    /// Current velocity.
    pub velocity: Velocity,
    /// Home anchor the layout spring pulls toward.
    pub home: Position,
    /// Manual transition target; layout forces are suspended while set.
    pub target_position: Option<Position>,
    /// Current scale.
    pub scale: f32,
    /// Scale target relaxed toward every tick.
    pub target_scale: f32,
    /// Current opacity.
    pub opacity: f32,
    /// Opacity target relaxed toward every tick.
    pub target_opacity: f32,
    /// Draw layer; higher layers draw later.
    pub layer: u8,
    /// Interior particle count seeded for this culture.
    pub interior_count: usize,
    /// Border particles per edge.
    pub per_edge_count: usize,
    /// Real node or synthetic group.
    pub kind: CultureKind,
}

impl Culture {
    /// Whether this entity is a synthetic parent group.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        matches!(self.kind, CultureKind::Synthetic { .. })
    }

    /// Scope level for real cultures.
    #[must_use]
    pub fn scope(&self) -> Option<ScopeLevel> {
        match &self.kind {
            CultureKind::Real { scope, .. } => Some(*scope),
            CultureKind::Synthetic { .. } => None,
        }
    }

    /// Resolved parent for real cultures.
    #[must_use]
    pub fn parent(&self) -> Option<CultureId> {
        match &self.kind {
            CultureKind::Real { parent, .. } => *parent,
            CultureKind::Synthetic { .. } => None,
        }
    }

    /// Resolved kin for real cultures; empty for synthetic groups.
    #[must_use]
    pub fn kin(&self) -> &[CultureId] {
        match &self.kind {
            CultureKind::Real { kin, .. } => kin,
            CultureKind::Synthetic { .. } => &[],
        }
    }

    /// Current circumradius (size scaled by the live scale).
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.size * self.scale
    }

    /// Polygon spec at the current scale.
    #[must_use]
    pub fn polygon(&self) -> PolygonSpec {
        PolygonSpec::clamped(self.sides, self.radius(), self.rotation)
    }

    /// Total border particles for this culture.
    #[must_use]
    pub const fn border_count(&self) -> usize {
        self.sides as usize * self.per_edge_count
    }

    /// Whether a manual transition currently owns this culture's position.
    #[must_use]
    pub const fn in_transition(&self) -> bool {
        self.target_position.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_order_is_ascending() {
        assert!(ScopeLevel::Family < ScopeLevel::Local);
        assert!(ScopeLevel::Local < ScopeLevel::Regional);
        assert!(ScopeLevel::Regional < ScopeLevel::National);
        assert!(ScopeLevel::National < ScopeLevel::Global);
        assert_eq!(ScopeLevel::ALL.len(), 5);
    }

    #[test]
    fn derived_counts_respect_floors() {
        let sparse = derive_particle_counts(0, 1.0, 0.0);
        assert_eq!(sparse.sides, 3);
        assert!(sparse.per_edge >= 1);
        assert!(sparse.total() >= MIN_TOTAL_PARTICLES);

        let dense = derive_particle_counts(7, 0.2, 1.0);
        assert_eq!(dense.sides, 7);
        assert_eq!(dense.border, 7 * dense.per_edge);
        assert!(dense.interior > sparse.interior);
    }

    #[test]
    fn closed_cultures_grow_thicker_borders() {
        let open = derive_particle_counts(4, 0.9, 0.5);
        let closed = derive_particle_counts(4, 0.1, 0.5);
        assert!(closed.per_edge > open.per_edge);
    }
}
