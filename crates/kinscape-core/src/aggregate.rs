//! Dynamic aggregation of hidden higher-scope parents into synthetic groups.
//!
//! Runs only while a scope filter narrows visibility to one level. Synthetic
//! entities never enter the force layout; their motion is entirely the
//! centroid-follow and pairwise-separation passes below.

use crate::culture::{Culture, CultureKind};
use crate::engine::Engine;
use crate::particle::{BASE_LIGHTNESS, BASE_SATURATION, Particle, ParticleClass, ParticleState};
use crate::{CultureId, Hsl, Position, Velocity};
use ordered_float::OrderedFloat;
use rand::Rng;
use std::collections::HashMap;
use std::f32::consts::TAU;

/// Circle stand-in used for placement and separation tests.
#[derive(Debug, Clone, Copy)]
struct Obstacle {
    x: f32,
    y: f32,
    radius: f32,
}

/// Total padded overlap between a candidate circle and the obstacle set.
fn overlap_amount(x: f32, y: f32, radius: f32, padding: f32, obstacles: &[Obstacle]) -> f32 {
    let mut total = 0.0;
    for obstacle in obstacles {
        let dx = x - obstacle.x;
        let dy = y - obstacle.y;
        let dist = (dx * dx + dy * dy).sqrt();
        let reach = radius + obstacle.radius + padding;
        if dist < reach {
            total += reach - dist;
        }
    }
    total
}

impl Engine {
    /// Rebuild and maintain synthetic parent groups for the current filter.
    pub(crate) fn stage_aggregation(&mut self) {
        let Some(level) = self.scope_filter else {
            if !self.synthetic_groups.is_empty() {
                self.retire_all_synthetics();
            }
            return;
        };

        // Group cultures visible at this level by their validated parent.
        let mut groups: HashMap<String, Vec<CultureId>> = HashMap::new();
        for (id, culture) in &self.cultures {
            if culture.scope() != Some(level) {
                continue;
            }
            if let Some(parent_id) = culture.parent() {
                if let Some(parent) = self.cultures.get(parent_id) {
                    groups.entry(parent.name.clone()).or_default().push(id);
                }
            }
        }

        // Retire synthetics whose group emptied out.
        let stale: Vec<String> = self
            .synthetic_groups
            .keys()
            .filter(|name| !groups.contains_key(*name))
            .cloned()
            .collect();
        for name in stale {
            if let Some(id) = self.synthetic_groups.remove(&name) {
                self.retire_synthetic(id);
            }
        }

        // Deterministic order regardless of map iteration.
        let mut names: Vec<String> = groups.keys().cloned().collect();
        names.sort();

        for name in &names {
            let children = &groups[name];
            let size = self.config.synthetic_base_size
                + children.len() as f32 * self.config.synthetic_size_increment;

            if let Some(&existing) = self.synthetic_groups.get(name) {
                if let Some(synthetic) = self.cultures.get_mut(existing) {
                    synthetic.size = size;
                    if let CultureKind::Synthetic { members, .. } = &mut synthetic.kind {
                        *members = children.clone();
                    }
                }
            } else {
                let id = self.spawn_synthetic(name, size, children, level);
                self.synthetic_groups.insert(name.clone(), id);
                self.arrange_children(id, children);
            }
        }

        // Follow the children: recenter each synthetic on its members'
        // centroid, then separate synthetics from each other.
        let synth_ids: Vec<CultureId> = names
            .iter()
            .filter_map(|name| self.synthetic_groups.get(name).copied())
            .collect();

        for &id in &synth_ids {
            let members = match self.cultures.get(id) {
                Some(culture) => match &culture.kind {
                    CultureKind::Synthetic { members, .. } => members.clone(),
                    CultureKind::Real { .. } => continue,
                },
                None => continue,
            };
            if members.is_empty() {
                continue;
            }
            let mut cx = 0.0;
            let mut cy = 0.0;
            let mut count = 0usize;
            for member in &members {
                if let Some(child) = self.cultures.get(*member) {
                    cx += child.position.x;
                    cy += child.position.y;
                    count += 1;
                }
            }
            if count > 0 {
                let synthetic = &mut self.cultures[id];
                synthetic.position = Position::new(cx / count as f32, cy / count as f32);
            }
        }

        self.separate_synthetics(&synth_ids);

        for &id in &synth_ids {
            self.clamp_children(id);
        }
    }

    /// Remove every synthetic group (filter cleared).
    pub(crate) fn retire_all_synthetics(&mut self) {
        let ids: Vec<CultureId> = self.synthetic_groups.drain().map(|(_, id)| id).collect();
        for id in ids {
            self.retire_synthetic(id);
        }
    }

    fn retire_synthetic(&mut self, id: CultureId) {
        self.cultures.remove(id);
        self.particles.retain(|p| p.home != id);
    }

    /// Create a synthetic group entity, placed by rejection sampling against
    /// every other visible shape and seeded once with interior particles in
    /// the real parent's hue.
    fn spawn_synthetic(
        &mut self,
        parent_name: &str,
        size: f32,
        children: &[CultureId],
        level: crate::ScopeLevel,
    ) -> CultureId {
        let hue = self
            .by_name
            .get(parent_name)
            .and_then(|id| self.cultures.get(*id))
            .map_or(0.0, |parent| parent.hue);

        let mut obstacles: Vec<Obstacle> = Vec::new();
        for (_, culture) in &self.cultures {
            let visible = match &culture.kind {
                CultureKind::Real { scope, .. } => *scope == level,
                CultureKind::Synthetic { .. } => true,
            };
            if visible {
                obstacles.push(Obstacle {
                    x: culture.position.x,
                    y: culture.position.y,
                    radius: culture.radius(),
                });
            }
        }

        let margin = self.config.world_margin + size;
        let max_x = (self.config.world_width - margin).max(margin);
        let max_y = (self.config.world_height - margin).max(margin);
        let padding = self.config.placement_padding;

        let mut best: Option<(OrderedFloat<f32>, f32, f32)> = None;
        let mut position = None;
        for _ in 0..self.config.placement_attempts {
            let x = self.rng.random_range(margin..=max_x);
            let y = self.rng.random_range(margin..=max_y);
            let overlap = overlap_amount(x, y, size, padding, &obstacles);
            if overlap <= 0.0 {
                position = Some((x, y));
                break;
            }
            let key = OrderedFloat(overlap);
            if best.is_none_or(|(current, _, _)| key < current) {
                best = Some((key, x, y));
            }
        }
        let (x, y) = position
            .or(best.map(|(_, x, y)| (x, y)))
            .unwrap_or((max_x * 0.5, max_y * 0.5));

        let culture = Culture {
            name: parent_name.to_string(),
            hue,
            sides: self.config.synthetic_sides,
            size,
            rotation: 0.0,
            morph_offset: 0.0,
            position: Position::new(x, y),
            velocity: Velocity::default(),
            home: Position::new(x, y),
            target_position: None,
            scale: 1.0,
            target_scale: 1.0,
            opacity: self.config.base_opacity,
            target_opacity: self.config.base_opacity,
            layer: self.config.base_layer,
            interior_count: self.config.synthetic_particle_count,
            per_edge_count: 0,
            kind: CultureKind::Synthetic {
                group: parent_name.to_string(),
                members: children.to_vec(),
            },
        };
        let id = self.cultures.insert(culture);

        let seeded = self.config.synthetic_particle_count;
        let polygon = self.cultures[id].polygon();
        let reach = polygon.apothem() * self.config.interior_fringe_fraction;
        for _ in 0..seeded {
            let angle = self.rng.random_range(0.0..TAU);
            let radial = self.rng.random_range(0.0..reach);
            self.particles.push(Particle {
                home: id,
                culture: id,
                offset: (angle.cos() * radial, angle.sin() * radial),
                velocity: (0.0, 0.0),
                color: Hsl::new(hue, BASE_SATURATION, BASE_LIGHTNESS),
                class: ParticleClass::Interior,
                slot: None,
                state: ParticleState::Contained,
            });
        }
        id
    }

    /// Spread a group's children angularly inside the synthetic radius and
    /// re-anchor their homes there so the layout spring cooperates.
    fn arrange_children(&mut self, synthetic_id: CultureId, children: &[CultureId]) {
        let Some(synthetic) = self.cultures.get(synthetic_id) else {
            return;
        };
        let centre = synthetic.position;
        let radius = synthetic.radius();
        let count = children.len().max(1) as f32;
        for (i, &child_id) in children.iter().enumerate() {
            let Some(child) = self.cultures.get_mut(child_id) else {
                continue;
            };
            let limit = (radius
                - child.radius() * 0.5
                - self.config.parent_containment_margin)
                .max(0.0);
            let angle = TAU * i as f32 / count;
            let radial = limit * 0.6;
            let slot = Position::new(
                centre.x + angle.cos() * radial,
                centre.y + angle.sin() * radial,
            );
            child.home = slot;
            child.position = slot;
            child.velocity = Velocity::default();
        }
    }

    /// Bounded pairwise separation pass across synthetic groups.
    fn separate_synthetics(&mut self, ids: &[CultureId]) {
        let padding = self.config.placement_padding;
        for _ in 0..self.config.separation_iterations {
            let mut moved = false;
            for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    let (a_pos, a_radius) = match self.cultures.get(ids[i]) {
                        Some(c) => (c.position, c.radius()),
                        None => continue,
                    };
                    let (b_pos, b_radius) = match self.cultures.get(ids[j]) {
                        Some(c) => (c.position, c.radius()),
                        None => continue,
                    };
                    let dx = b_pos.x - a_pos.x;
                    let dy = b_pos.y - a_pos.y;
                    let dist = (dx * dx + dy * dy).sqrt();
                    let reach = a_radius + b_radius + padding;
                    if dist >= reach {
                        continue;
                    }
                    let (ux, uy) = if dist > f32::EPSILON {
                        (dx / dist, dy / dist)
                    } else {
                        (1.0, 0.0)
                    };
                    let push = (reach - dist) * 0.5;
                    if let Some(a) = self.cultures.get_mut(ids[i]) {
                        a.position.x -= ux * push;
                        a.position.y -= uy * push;
                    }
                    if let Some(b) = self.cultures.get_mut(ids[j]) {
                        b.position.x += ux * push;
                        b.position.y += uy * push;
                    }
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }
    }

    /// Clamp every member back inside its (possibly moved) synthetic parent.
    fn clamp_children(&mut self, synthetic_id: CultureId) {
        let (centre, radius, members) = match self.cultures.get(synthetic_id) {
            Some(culture) => match &culture.kind {
                CultureKind::Synthetic { members, .. } => {
                    (culture.position, culture.radius(), members.clone())
                }
                CultureKind::Real { .. } => return,
            },
            None => return,
        };
        for member in members {
            let Some(child) = self.cultures.get_mut(member) else {
                continue;
            };
            let limit = (radius
                - child.radius() * 0.5
                - self.config.parent_containment_margin)
                .max(0.0);
            let dx = child.position.x - centre.x;
            let dy = child.position.y - centre.y;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > limit {
                if dist > f32::EPSILON {
                    let scale = limit / dist;
                    child.position.x = centre.x + dx * scale;
                    child.position.y = centre.y + dy * scale;
                } else {
                    child.position = centre;
                }
                child.velocity.vx *= self.config.containment_contact_damping;
                child.velocity.vy *= self.config.containment_contact_damping;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_amount_is_zero_with_clearance() {
        let obstacles = [Obstacle {
            x: 0.0,
            y: 0.0,
            radius: 40.0,
        }];
        assert_eq!(overlap_amount(200.0, 0.0, 50.0, 10.0, &obstacles), 0.0);
        assert!(overlap_amount(60.0, 0.0, 50.0, 10.0, &obstacles) > 0.0);
    }

    #[test]
    fn overlap_amount_accumulates_across_obstacles() {
        let obstacles = [
            Obstacle {
                x: 0.0,
                y: 0.0,
                radius: 30.0,
            },
            Obstacle {
                x: 10.0,
                y: 0.0,
                radius: 30.0,
            },
        ];
        let single = overlap_amount(0.0, 0.0, 20.0, 0.0, &obstacles[..1]);
        let both = overlap_amount(0.0, 0.0, 20.0, 0.0, &obstacles);
        assert!(both > single);
    }
}
