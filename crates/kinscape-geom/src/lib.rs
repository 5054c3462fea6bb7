//! Regular-polygon boundary math shared across the Kinscape workspace.
//!
//! Positions are expressed relative to the polygon centre. All angles are
//! radians; edge indices run counter-clockwise starting at `rotation`.

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use thiserror::Error;

/// Smallest polygon the engine will ever draw.
pub const MIN_SIDES: u32 = 3;
/// Smallest circumradius accepted before clamping kicks in.
pub const MIN_RADIUS: f32 = 1.0;

/// Errors emitted by the validating polygon constructor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeomError {
    /// Indicates spec values that cannot describe a polygon.
    #[error("invalid polygon spec: {0}")]
    InvalidSpec(&'static str),
}

/// A regular polygon described by side count, circumradius, and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonSpec {
    sides: u32,
    radius: f32,
    rotation: f32,
}

impl PolygonSpec {
    /// Build a spec, rejecting degenerate geometry.
    pub fn new(sides: u32, radius: f32, rotation: f32) -> Result<Self, GeomError> {
        if sides < MIN_SIDES {
            return Err(GeomError::InvalidSpec("sides must be at least 3"));
        }
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(GeomError::InvalidSpec("radius must be positive and finite"));
        }
        Ok(Self {
            sides,
            radius,
            rotation,
        })
    }

    /// Build a spec from untrusted input, clamping degenerate values to the
    /// minimum viable polygon instead of failing.
    #[must_use]
    pub fn clamped(sides: u32, radius: f32, rotation: f32) -> Self {
        let radius = if radius.is_finite() {
            radius.max(MIN_RADIUS)
        } else {
            MIN_RADIUS
        };
        Self {
            sides: sides.max(MIN_SIDES),
            radius,
            rotation,
        }
    }

    /// Number of edges.
    #[must_use]
    pub const fn sides(&self) -> u32 {
        self.sides
    }

    /// Circumradius (centre to vertex).
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Rotation of the first vertex.
    #[must_use]
    pub const fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Returns a copy with a different circumradius, clamped to viable.
    #[must_use]
    pub fn with_radius(self, radius: f32) -> Self {
        Self::clamped(self.sides, radius, self.rotation)
    }

    /// Centre-to-edge distance: `radius · cos(π / sides)`.
    #[must_use]
    pub fn apothem(&self) -> f32 {
        self.radius * (PI / self.sides as f32).cos()
    }

    /// Vertex `index` (counter-clockwise, wraps past `sides`).
    #[must_use]
    pub fn vertex(&self, index: u32) -> (f32, f32) {
        let angle = self.rotation + TAU * (index % self.sides) as f32 / self.sides as f32;
        (self.radius * angle.cos(), self.radius * angle.sin())
    }

    /// Outward unit normal of edge `index` (the edge joining vertex `index`
    /// and vertex `index + 1`).
    #[must_use]
    pub fn edge_normal(&self, index: u32) -> (f32, f32) {
        let step = TAU / self.sides as f32;
        let angle = self.rotation + step * (index % self.sides) as f32 + step * 0.5;
        (angle.cos(), angle.sin())
    }

    /// Largest signed distance from `point` to any edge plane. Values above
    /// the apothem are outside the polygon.
    #[must_use]
    pub fn max_edge_distance(&self, point: (f32, f32)) -> f32 {
        let mut max = f32::NEG_INFINITY;
        for edge in 0..self.sides {
            let (nx, ny) = self.edge_normal(edge);
            let d = point.0 * nx + point.1 * ny;
            if d > max {
                max = d;
            }
        }
        max
    }

    /// Whether `point` sits at least `margin` inside every edge.
    #[must_use]
    pub fn contains(&self, point: (f32, f32), margin: f32) -> bool {
        self.max_edge_distance(point) <= self.apothem() - margin
    }
}

/// Tunables for the two-stage containment response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryParams {
    /// Width of the damping band that precedes the hard boundary.
    pub soft_zone: f32,
    /// Distance kept between the hard boundary and the apothem.
    pub hard_margin: f32,
    /// Fraction of the outward velocity removed at full soft-zone depth.
    pub soft_damping: f32,
    /// Energy retained by the reflected velocity component.
    pub restitution: f32,
}

impl Default for BoundaryParams {
    fn default() -> Self {
        Self {
            soft_zone: 8.0,
            hard_margin: 2.0,
            soft_damping: 0.35,
            restitution: 0.5,
        }
    }
}

/// Outcome of one containment pass, mostly useful to tests and telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryContact {
    /// At least one edge damped the velocity in its soft zone.
    pub softened: bool,
    /// At least one edge clamped the position and reflected the velocity.
    pub reflected: bool,
}

/// Apply soft damping and hard clamp-and-reflect containment to a particle
/// at `pos` with velocity `vel`, both relative to the polygon centre.
///
/// Every edge is evaluated independently, so a particle near a vertex can be
/// corrected along two normals in the same call.
pub fn enforce(
    spec: &PolygonSpec,
    params: &BoundaryParams,
    pos: &mut (f32, f32),
    vel: &mut (f32, f32),
) -> BoundaryContact {
    let apothem = spec.apothem();
    let hard = (apothem - params.hard_margin).max(0.0);
    let soft_start = (hard - params.soft_zone).max(0.0);
    let mut contact = BoundaryContact::default();

    for edge in 0..spec.sides() {
        let (nx, ny) = spec.edge_normal(edge);
        let depth = pos.0 * nx + pos.1 * ny;

        if depth > hard {
            let overshoot = depth - hard;
            pos.0 -= overshoot * nx;
            pos.1 -= overshoot * ny;
            let outward = vel.0 * nx + vel.1 * ny;
            if outward > 0.0 {
                let remove = outward * (1.0 + params.restitution);
                vel.0 -= remove * nx;
                vel.1 -= remove * ny;
            }
            contact.reflected = true;
        } else if depth > soft_start && params.soft_zone > 0.0 {
            let fraction = ((depth - soft_start) / params.soft_zone).clamp(0.0, 1.0);
            let outward = vel.0 * nx + vel.1 * ny;
            if outward > 0.0 {
                let remove = outward * fraction * params.soft_damping;
                vel.0 -= remove * nx;
                vel.1 -= remove * ny;
            }
            contact.softened = true;
        }
    }

    // Sequential edge clamps can leave a residue past an acute vertex (each
    // correction re-raises the neighbouring edge's distance). Scaling toward
    // the centre shrinks every edge distance at once, so this keeps the
    // post-enforcement bound exact.
    let max_depth = spec.max_edge_distance(*pos);
    if max_depth > hard && max_depth > f32::EPSILON {
        let scale = hard / max_depth;
        pos.0 *= scale;
        pos.1 *= scale;
        contact.reflected = true;
    }

    contact
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn apothem_matches_closed_form() {
        let square = PolygonSpec::new(4, 10.0, 0.0).expect("spec");
        assert!((square.apothem() - 10.0 * (PI / 4.0).cos()).abs() < EPS);

        let hex = PolygonSpec::new(6, 5.0, 1.0).expect("spec");
        assert!((hex.apothem() - 5.0 * (PI / 6.0).cos()).abs() < EPS);
    }

    #[test]
    fn clamped_repairs_degenerate_input() {
        let spec = PolygonSpec::clamped(1, -4.0, 0.0);
        assert_eq!(spec.sides(), MIN_SIDES);
        assert!((spec.radius() - MIN_RADIUS).abs() < EPS);

        let nan = PolygonSpec::clamped(5, f32::NAN, 0.0);
        assert!((nan.radius() - MIN_RADIUS).abs() < EPS);

        assert!(PolygonSpec::new(2, 10.0, 0.0).is_err());
        assert!(PolygonSpec::new(4, 0.0, 0.0).is_err());
    }

    #[test]
    fn normals_are_unit_length_and_outward() {
        let spec = PolygonSpec::new(5, 12.0, 0.7).expect("spec");
        for edge in 0..spec.sides() {
            let (nx, ny) = spec.edge_normal(edge);
            assert!((nx * nx + ny * ny - 1.0).abs() < EPS);
            // The midpoint of the edge projects to exactly the apothem.
            let (ax, ay) = spec.vertex(edge);
            let (bx, by) = spec.vertex(edge + 1);
            let mid = ((ax + bx) * 0.5, (ay + by) * 0.5);
            assert!((mid.0 * nx + mid.1 * ny - spec.apothem()).abs() < 1e-3);
        }
    }

    #[test]
    fn hard_boundary_clamps_and_reflects() {
        let spec = PolygonSpec::new(4, 10.0, 0.0).expect("spec");
        let params = BoundaryParams::default();
        let hard = spec.apothem() - params.hard_margin;

        // Launch a point well outside the first edge, moving outward.
        let (nx, ny) = spec.edge_normal(0);
        let mut pos = (nx * (hard + 5.0), ny * (hard + 5.0));
        let mut vel = (nx * 2.0, ny * 2.0);
        let contact = enforce(&spec, &params, &mut pos, &mut vel);

        assert!(contact.reflected);
        assert!(spec.max_edge_distance(pos) <= hard + EPS);
        let outward = vel.0 * nx + vel.1 * ny;
        assert!(
            (outward + 2.0 * params.restitution).abs() < EPS,
            "outward component should reflect with energy loss, got {outward}"
        );
    }

    #[test]
    fn soft_zone_damps_without_moving_the_particle() {
        let spec = PolygonSpec::new(6, 20.0, 0.0).expect("spec");
        let params = BoundaryParams::default();
        let hard = spec.apothem() - params.hard_margin;
        let (nx, ny) = spec.edge_normal(0);

        // Halfway into the soft band, drifting outward.
        let depth = hard - params.soft_zone * 0.5;
        let mut pos = (nx * depth, ny * depth);
        let before = pos;
        let mut vel = (nx * 1.0, ny * 1.0);
        let contact = enforce(&spec, &params, &mut pos, &mut vel);

        assert!(contact.softened);
        assert!(!contact.reflected);
        assert_eq!(pos, before);
        let outward = vel.0 * nx + vel.1 * ny;
        assert!(outward < 1.0, "outward velocity should shrink");
        assert!(outward > 0.0, "soft zone never reverses velocity");
    }

    #[test]
    fn vertex_region_is_corrected_by_both_edges() {
        let spec = PolygonSpec::new(3, 10.0, 0.0).expect("spec");
        let params = BoundaryParams {
            soft_zone: 0.0,
            ..BoundaryParams::default()
        };
        // A triangle vertex pokes far past both adjacent edge planes.
        let mut pos = spec.vertex(0);
        pos.0 *= 1.5;
        pos.1 *= 1.5;
        let mut vel = (0.0, 0.0);
        enforce(&spec, &params, &mut pos, &mut vel);
        let limit = spec.apothem() - params.hard_margin;
        assert!(spec.max_edge_distance(pos) <= limit + 1e-3);
    }

    #[test]
    fn interior_points_are_untouched() {
        let spec = PolygonSpec::new(8, 15.0, 0.3).expect("spec");
        let params = BoundaryParams::default();
        let mut pos = (1.0, -2.0);
        let mut vel = (0.4, 0.4);
        let contact = enforce(&spec, &params, &mut pos, &mut vel);
        assert_eq!(contact, BoundaryContact::default());
        assert_eq!(pos, (1.0, -2.0));
        assert_eq!(vel, (0.4, 0.4));
        assert!(spec.contains(pos, 0.0));
    }
}
