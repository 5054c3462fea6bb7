//! Force-directed layout of real cultures.
//!
//! Synthetic groups never participate here; manual transitions suspend a
//! culture's forces until the transition target clears.

use crate::engine::Engine;
use crate::{CultureId, Position};
use rand::Rng;
use rayon::prelude::*;

/// Immutable per-culture data captured for the pairwise repulsion pass.
#[derive(Debug, Clone, Copy)]
struct LayoutBody {
    id: CultureId,
    x: f32,
    y: f32,
    radius: f32,
    parent: Option<CultureId>,
}

/// Whether a pair is exempt from collision repulsion: parent with its own
/// child, or siblings sharing the same parent.
fn repulsion_exempt(a: &LayoutBody, b: &LayoutBody) -> bool {
    if a.parent == Some(b.id) || b.parent == Some(a.id) {
        return true;
    }
    matches!((a.parent, b.parent), (Some(pa), Some(pb)) if pa == pb)
}

/// Repulsion force exerted on `a` by `b`, zero when their padded circles do
/// not overlap.
fn pair_repulsion(a: &LayoutBody, b: &LayoutBody, padding: f32, strength: f32) -> (f32, f32) {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dist_sq = dx * dx + dy * dy;
    let reach = a.radius + b.radius + padding;
    if dist_sq >= reach * reach {
        return (0.0, 0.0);
    }
    let dist = dist_sq.sqrt();
    let overlap = reach - dist;
    if dist <= f32::EPSILON {
        // Coincident centres: deterministic nudge along x.
        return (strength * overlap, 0.0);
    }
    let magnitude = strength * overlap;
    (dx / dist * magnitude, dy / dist * magnitude)
}

impl Engine {
    /// Apply layout forces and integrate culture motion for one tick.
    pub(crate) fn stage_layout(&mut self) {
        let config = self.config.clone();
        let centre = Position::new(config.world_width * 0.5, config.world_height * 0.5);

        let active: Vec<CultureId> = self
            .cultures
            .iter()
            .filter(|(_, c)| !c.is_synthetic() && !c.in_transition())
            .map(|(id, _)| id)
            .collect();

        // Serial force pass: brownian impulse, two-zone home spring, centre
        // attraction. These consume the engine RNG in iteration order.
        for &id in &active {
            let impulse = {
                let culture = &self.cultures[id];
                culture.velocity.speed() > config.brownian_speed_threshold
            };
            let (jx, jy) = if impulse {
                (
                    self.rng
                        .random_range(-config.brownian_impulse..=config.brownian_impulse),
                    self.rng
                        .random_range(-config.brownian_impulse..=config.brownian_impulse),
                )
            } else {
                (0.0, 0.0)
            };

            let culture = &mut self.cultures[id];
            culture.velocity.vx += jx;
            culture.velocity.vy += jy;

            let hx = culture.home.x - culture.position.x;
            let hy = culture.home.y - culture.position.y;
            let home_dist = (hx * hx + hy * hy).sqrt();
            let spring = if home_dist > config.home_radius {
                config.home_spring_strong
            } else {
                config.home_spring_weak
            };
            culture.velocity.vx += hx * spring;
            culture.velocity.vy += hy * spring;

            culture.velocity.vx += (centre.x - culture.position.x) * config.center_attraction;
            culture.velocity.vy += (centre.y - culture.position.y) * config.center_attraction;
        }

        // Pairwise repulsion, computed in parallel over an immutable snapshot
        // and applied in dense order afterwards.
        let bodies: Vec<LayoutBody> = active
            .iter()
            .map(|&id| {
                let culture = &self.cultures[id];
                LayoutBody {
                    id,
                    x: culture.position.x,
                    y: culture.position.y,
                    radius: culture.radius(),
                    parent: culture.parent(),
                }
            })
            .collect();

        let forces: Vec<(f32, f32)> = bodies
            .par_iter()
            .map(|body| {
                let mut force = (0.0f32, 0.0f32);
                for other in &bodies {
                    if other.id == body.id || repulsion_exempt(body, other) {
                        continue;
                    }
                    let (fx, fy) = pair_repulsion(
                        body,
                        other,
                        config.collision_padding,
                        config.collision_repulsion,
                    );
                    force.0 += fx;
                    force.1 += fy;
                }
                force
            })
            .collect();

        for (body, force) in bodies.iter().zip(&forces) {
            let culture = &mut self.cultures[body.id];
            culture.velocity.vx += force.0;
            culture.velocity.vy += force.1;
        }

        // Integrate: clamp, damp, zero-snap, Euler step, then containment.
        for &id in &active {
            // A hidden parent does not contain: under a scope filter the
            // aggregation stage owns the children instead.
            let parent_sphere = self.cultures[id]
                .parent()
                .and_then(|pid| self.cultures.get(pid))
                .filter(|p| match self.scope_filter {
                    None => true,
                    Some(level) => p.scope() == Some(level),
                })
                .map(|p| (p.position, p.radius()));

            let culture = &mut self.cultures[id];
            let speed = culture.velocity.speed();
            if speed > config.layout_max_speed {
                let scale = config.layout_max_speed / speed;
                culture.velocity.vx *= scale;
                culture.velocity.vy *= scale;
            }
            culture.velocity.vx *= config.layout_damping;
            culture.velocity.vy *= config.layout_damping;
            if culture.velocity.speed() < config.zero_snap_speed {
                culture.velocity.vx = 0.0;
                culture.velocity.vy = 0.0;
            }
            culture.position.x += culture.velocity.vx;
            culture.position.y += culture.velocity.vy;

            if let Some((parent_pos, parent_radius)) = parent_sphere {
                let limit = (parent_radius
                    - culture.radius() * 0.5
                    - config.parent_containment_margin)
                    .max(0.0);
                let dx = culture.position.x - parent_pos.x;
                let dy = culture.position.y - parent_pos.y;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist > limit {
                    if dist > f32::EPSILON {
                        let scale = limit / dist;
                        culture.position.x = parent_pos.x + dx * scale;
                        culture.position.y = parent_pos.y + dy * scale;
                    } else {
                        culture.position = parent_pos;
                    }
                    culture.velocity.vx *= config.containment_contact_damping;
                    culture.velocity.vy *= config.containment_contact_damping;
                }
            } else {
                let margin = config.world_margin;
                let max_x = config.world_width - margin;
                let max_y = config.world_height - margin;
                if culture.position.x < margin || culture.position.x > max_x {
                    culture.position.x = culture.position.x.clamp(margin, max_x);
                    culture.velocity.vx *= config.containment_contact_damping;
                }
                if culture.position.y < margin || culture.position.y > max_y {
                    culture.position.y = culture.position.y.clamp(margin, max_y);
                    culture.velocity.vy *= config.containment_contact_damping;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<CultureId> {
        let mut map: SlotMap<CultureId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn body(id: CultureId, x: f32, radius: f32, parent: Option<CultureId>) -> LayoutBody {
        LayoutBody {
            id,
            x,
            y: 0.0,
            radius,
            parent,
        }
    }

    #[test]
    fn parent_child_and_sibling_pairs_are_exempt() {
        let keys = ids(4);
        let parent = body(keys[0], 0.0, 40.0, None);
        let child_a = body(keys[1], 5.0, 10.0, Some(keys[0]));
        let child_b = body(keys[2], -5.0, 10.0, Some(keys[0]));
        let stranger = body(keys[3], 2.0, 10.0, None);

        assert!(repulsion_exempt(&parent, &child_a));
        assert!(repulsion_exempt(&child_a, &parent));
        assert!(repulsion_exempt(&child_a, &child_b));
        assert!(!repulsion_exempt(&child_a, &stranger));
        assert!(!repulsion_exempt(&parent, &stranger));
    }

    #[test]
    fn repulsion_is_zero_beyond_padded_reach() {
        let keys = ids(2);
        let a = body(keys[0], 0.0, 10.0, None);
        let b = body(keys[1], 50.0, 10.0, None);
        assert_eq!(pair_repulsion(&a, &b, 4.0, 0.06), (0.0, 0.0));
    }

    #[test]
    fn repulsion_points_away_and_grows_with_overlap() {
        let keys = ids(2);
        let a = body(keys[0], 0.0, 10.0, None);
        let near = body(keys[1], 12.0, 10.0, None);
        let far = body(keys[1], 20.0, 10.0, None);

        let (fx_near, _) = pair_repulsion(&a, &near, 4.0, 0.06);
        let (fx_far, _) = pair_repulsion(&a, &far, 4.0, 0.06);
        assert!(fx_near < 0.0, "a is pushed away from b on the left");
        assert!(fx_far < 0.0);
        assert!(fx_near.abs() > fx_far.abs(), "deeper overlap pushes harder");
    }
}
