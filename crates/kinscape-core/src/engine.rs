//! The engine: owns every mutable entity and drives the tick pipeline.

use crate::camera::{Camera, CameraTransform};
use crate::culture::{Culture, CultureKind, CultureRecord, ScopeLevel, base_size_for};
use crate::particle::{
    BASE_LIGHTNESS, BASE_SATURATION, BorderSlot, Particle, ParticleClass, ParticleState, plan_flow,
};
use crate::sequence::ExitSequence;
use crate::{CultureId, EngineConfig, EngineError, Hsl, Position, Tick, Velocity, VisualMode};
use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::f32::consts::TAU;
use std::fmt;
use tracing::warn;

/// Events emitted after processing one tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickEvents {
    /// The tick that was just processed.
    pub tick: Tick,
    /// Color exchanges applied this tick (arrivals plus deactivation flushes).
    pub exchanges_applied: usize,
    /// Whether an exit-focus sequence completed this tick.
    pub sequence_finished: bool,
}

/// Per-tick census retained in the history ring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick this summary describes.
    pub tick: Tick,
    /// Live dataset cultures.
    pub culture_count: usize,
    /// Live synthetic groups.
    pub synthetic_count: usize,
    /// Particles at rest.
    pub contained: usize,
    /// Particles waiting or blending into flow.
    pub activating: usize,
    /// Particles in directed flow.
    pub flowing: usize,
    /// Particles heading home.
    pub returning: usize,
    /// Color exchanges applied this tick.
    pub exchanges_applied: usize,
}

/// The active focus episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusState {
    /// The centred, enlarged culture.
    pub culture: CultureId,
    /// Its kin, arranged on the ring around it.
    pub kin: Vec<CultureId>,
}

/// Lifecycle tag published with each particle view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParticlePhase {
    /// At rest.
    Contained,
    /// Waiting or blending into flow.
    Activating,
    /// In directed flow.
    Flowing,
    /// Heading home.
    Returning,
}

/// Read-only culture state published per frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CultureView {
    /// Entity handle.
    pub id: CultureId,
    /// Display name.
    pub name: String,
    /// World-space x.
    pub x: f32,
    /// World-space y.
    pub y: f32,
    /// Current scale.
    pub scale: f32,
    /// Current opacity.
    pub opacity: f32,
    /// Polygon rotation.
    pub rotation: f32,
    /// Draw layer; higher draws later.
    pub layer: u8,
    /// Polygon side count.
    pub sides: u32,
    /// Current circumradius.
    pub radius: f32,
    /// Base hue in degrees.
    pub hue: f32,
    /// Whether this is a synthetic parent group.
    pub synthetic: bool,
}

/// Read-only particle state published per frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ParticleView {
    /// World-space x.
    pub x: f32,
    /// World-space y.
    pub y: f32,
    /// Current color.
    pub color: Hsl,
    /// Render size.
    pub size: f32,
    /// Whether the particle was created as a border particle.
    pub border: bool,
    /// Lifecycle tag.
    pub phase: ParticlePhase,
    /// Whether the renderer should draw it at all.
    pub visible: bool,
}

/// The read-only snapshot handed to the rendering collaborator after a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSnapshot {
    /// The tick this snapshot reflects.
    pub tick: Tick,
    /// All cultures, real and synthetic.
    pub cultures: Vec<CultureView>,
    /// All particles.
    pub particles: Vec<ParticleView>,
    /// Camera transform for coordinate conversion.
    pub camera: CameraTransform,
}

/// The simulation engine. All entity state lives here; collaborators interact
/// through the invocable operations and the per-tick [`FrameSnapshot`].
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) tick: Tick,
    pub(crate) rng: SmallRng,
    pub(crate) cultures: SlotMap<CultureId, Culture>,
    pub(crate) by_name: HashMap<String, CultureId>,
    pub(crate) particles: Vec<Particle>,
    pub(crate) focus: Option<FocusState>,
    pub(crate) scope_filter: Option<ScopeLevel>,
    pub(crate) synthetic_groups: HashMap<String, CultureId>,
    pub(crate) camera: Camera,
    pub(crate) exit_sequence: Option<ExitSequence>,
    pub(crate) visual_mode: VisualMode,
    pub(crate) history: VecDeque<TickSummary>,
    pub(crate) exchanges_applied: usize,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("tick", &self.tick)
            .field("culture_count", &self.cultures.len())
            .field("particle_count", &self.particles.len())
            .field("focus", &self.focus)
            .field("scope_filter", &self.scope_filter)
            .finish()
    }
}

impl Engine {
    /// Instantiate an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            tick: Tick::zero(),
            rng,
            cultures: SlotMap::with_key(),
            by_name: HashMap::new(),
            particles: Vec::new(),
            focus: None,
            scope_filter: None,
            synthetic_groups: HashMap::new(),
            camera: Camera::new(),
            exit_sequence: None,
            visual_mode: VisualMode::default(),
            history: VecDeque::with_capacity(history_capacity),
            exchanges_applied: 0,
        })
    }

    /// Load a validated dataset, replacing any previously loaded one.
    ///
    /// Unknown kinship/affiliation references and hierarchy violations are
    /// dropped with a warning; they never fail the load. Returns the number
    /// of cultures created.
    pub fn load_dataset(&mut self, records: &[CultureRecord]) -> usize {
        self.cultures.clear();
        self.by_name.clear();
        self.particles.clear();
        self.synthetic_groups.clear();
        self.focus = None;
        self.exit_sequence = None;

        for record in records {
            if self.by_name.contains_key(&record.name) {
                warn!(culture = %record.name, "duplicate culture name, skipping record");
                continue;
            }
            let position = self.scatter_position();
            let rotation = self.rng.random_range(0.0..TAU);
            let morph_offset = self.rng.random_range(0.0..TAU);
            let culture = Culture {
                name: record.name.clone(),
                hue: record.hue.rem_euclid(360.0),
                sides: record.sides.max(3),
                size: base_size_for(record.interior_particles),
                rotation,
                morph_offset,
                position,
                velocity: Velocity::default(),
                home: position,
                target_position: None,
                scale: self.config.base_scale,
                target_scale: self.config.base_scale,
                opacity: self.config.base_opacity,
                target_opacity: self.config.base_opacity,
                layer: self.config.base_layer,
                interior_count: record.interior_particles,
                per_edge_count: record.particles_per_edge.max(1),
                kind: CultureKind::Real {
                    scope: record.scope,
                    knowledge: record.knowledge,
                    openness: record.openness,
                    language: record.language,
                    kin: Vec::new(),
                    parent: None,
                },
            };
            let id = self.cultures.insert(culture);
            self.by_name.insert(record.name.clone(), id);
        }

        // Second pass: resolve relations now every name is known. A skipped
        // duplicate record must not reprocess the name it collided with.
        let mut resolved: HashSet<CultureId> = HashSet::new();
        for record in records {
            let Some(&id) = self.by_name.get(&record.name) else {
                continue;
            };
            if !resolved.insert(id) {
                continue;
            }
            let mut kin: Vec<CultureId> = Vec::new();
            for name in &record.kinships {
                match self.by_name.get(name) {
                    Some(&kin_id) if kin_id != id => {
                        if !kin.contains(&kin_id) {
                            kin.push(kin_id);
                        }
                    }
                    Some(_) => {}
                    None => {
                        warn!(culture = %record.name, reference = %name, "dropping unknown kinship");
                    }
                }
            }

            let mut parent: Option<CultureId> = None;
            for name in &record.affiliations {
                match self.by_name.get(name) {
                    None => {
                        warn!(culture = %record.name, reference = %name, "dropping unknown affiliation");
                    }
                    Some(&parent_id) => {
                        let parent_scope =
                            self.cultures.get(parent_id).and_then(Culture::scope);
                        if parent_scope > Some(record.scope) {
                            if parent.is_none() {
                                parent = Some(parent_id);
                            }
                        } else {
                            warn!(
                                culture = %record.name,
                                reference = %name,
                                "dropping affiliation: parent not strictly higher in scope order"
                            );
                        }
                    }
                }
            }

            let sides = (kin.len() as u32).max(3);
            let culture = &mut self.cultures[id];
            culture.sides = sides;
            if let CultureKind::Real {
                kin: slot_kin,
                parent: slot_parent,
                ..
            } = &mut culture.kind
            {
                *slot_kin = kin;
                *slot_parent = parent;
            }
        }

        // Seed in record order so seeded runs stay reproducible.
        let mut seeded: HashSet<CultureId> = HashSet::new();
        for record in records {
            if let Some(&id) = self.by_name.get(&record.name) {
                if seeded.insert(id) {
                    self.seed_culture_particles(id);
                }
            }
        }
        self.assign_border_slots();
        self.by_name.len()
    }

    /// Execute one simulation tick pipeline, returning emitted events.
    pub fn step(&mut self) -> TickEvents {
        self.tick = self.tick.next();
        self.exchanges_applied = 0;

        let world = (self.config.world_width, self.config.world_height);
        self.camera.tick(
            self.config.camera_move_rate,
            self.config.camera_epsilon,
            self.config.camera_zoom_epsilon,
            world,
        );
        self.stage_layout();
        self.stage_transitions();
        self.stage_aggregation();
        let sequence_finished = self.stage_sequence();
        self.stage_particles();

        let summary = self.summarize();
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);

        TickEvents {
            tick: self.tick,
            exchanges_applied: self.exchanges_applied,
            sequence_finished,
        }
    }

    /// Relax scale and opacity toward their targets and advance manual
    /// position transitions. Synthetic groups always hold scale 1.
    fn stage_transitions(&mut self) {
        let scale_rate = self.config.scale_relax_rate;
        let opacity_rate = self.config.opacity_relax_rate;
        let position_rate = self.config.position_transition_rate;
        for (_, culture) in self.cultures.iter_mut() {
            if culture.is_synthetic() {
                culture.scale = 1.0;
                culture.target_scale = 1.0;
            } else {
                culture.scale += (culture.target_scale - culture.scale) * scale_rate;
            }
            culture.opacity += (culture.target_opacity - culture.opacity) * opacity_rate;
            if let Some(target) = culture.target_position {
                culture.position.x += (target.x - culture.position.x) * position_rate;
                culture.position.y += (target.y - culture.position.y) * position_rate;
                culture.velocity = Velocity::default();
            }
        }
    }

    fn summarize(&self) -> TickSummary {
        let mut contained = 0usize;
        let mut activating = 0usize;
        let mut flowing = 0usize;
        let mut returning = 0usize;
        for particle in &self.particles {
            match particle.state {
                ParticleState::Contained => contained += 1,
                ParticleState::Activating { .. } => activating += 1,
                ParticleState::Flowing { .. } => flowing += 1,
                ParticleState::Returning { .. } => returning += 1,
            }
        }
        TickSummary {
            tick: self.tick,
            culture_count: self.cultures.len() - self.synthetic_groups.len(),
            synthetic_count: self.synthetic_groups.len(),
            contained,
            activating,
            flowing,
            returning,
            exchanges_applied: self.exchanges_applied,
        }
    }

    /// Publish the read-only frame snapshot for the rendering collaborator.
    #[must_use]
    pub fn snapshot(&self) -> FrameSnapshot {
        let mut cultures: Vec<CultureView> = self
            .cultures
            .iter()
            .map(|(id, culture)| CultureView {
                id,
                name: culture.name.clone(),
                x: culture.position.x,
                y: culture.position.y,
                scale: culture.scale,
                opacity: culture.opacity,
                rotation: culture.rotation,
                layer: culture.layer,
                sides: culture.sides,
                radius: culture.radius(),
                hue: culture.hue,
                synthetic: culture.is_synthetic(),
            })
            .collect();
        cultures.sort_by_key(|view| view.layer);

        let particles = self
            .particles
            .iter()
            .filter_map(|particle| {
                let culture = self.cultures.get(particle.culture)?;
                let hidden_border =
                    self.visual_mode == VisualMode::Borderless && particle.slot.is_some();
                let hidden_by_filter = match (self.scope_filter, culture.scope()) {
                    (Some(level), Some(scope)) => scope != level,
                    _ => false,
                };
                let size = if particle.is_border() {
                    self.config.border_particle_size
                } else {
                    self.config.interior_particle_size
                };
                Some(ParticleView {
                    x: culture.position.x + particle.offset.0,
                    y: culture.position.y + particle.offset.1,
                    color: particle.color,
                    size,
                    border: particle.is_border(),
                    phase: match particle.state {
                        ParticleState::Contained => ParticlePhase::Contained,
                        ParticleState::Activating { .. } => ParticlePhase::Activating,
                        ParticleState::Flowing { .. } => ParticlePhase::Flowing,
                        ParticleState::Returning { .. } => ParticlePhase::Returning,
                    },
                    visible: !hidden_border && !hidden_by_filter,
                })
            })
            .collect();

        FrameSnapshot {
            tick: self.tick,
            cultures,
            particles,
            camera: self.camera.transform(),
        }
    }

    // ----- invocable operations ---------------------------------------------

    /// Enter focus mode on `id`: centre and enlarge it, arrange kin around
    /// it, dim everyone else, and start the particle flow episode. Supersedes
    /// any running exit sequence after flushing pending exchanges.
    pub fn focus(&mut self, id: CultureId) -> Result<(), EngineError> {
        let valid = self
            .cultures
            .get(id)
            .is_some_and(|culture| !culture.is_synthetic());
        if !valid {
            return Err(EngineError::UnknownCulture(format!("{id:?}")));
        }

        self.exit_sequence = None;
        self.deactivate_flow();

        let centre = Position::new(
            self.config.world_width * 0.5,
            self.config.world_height * 0.5,
        );
        let kin: Vec<CultureId> = self.cultures[id].kin().to_vec();

        let config = self.config.clone();
        let kin_count = kin.len().max(1) as f32;
        let culture_ids: Vec<CultureId> = self.cultures.keys().collect();
        for cid in culture_ids {
            let Some(culture) = self.cultures.get_mut(cid) else {
                continue;
            };
            if culture.is_synthetic() {
                continue;
            }
            if cid == id {
                culture.target_position = Some(centre);
                culture.target_scale = config.focus_scale;
                culture.target_opacity = config.focus_opacity;
                culture.layer = config.focus_layer;
            } else if let Some(slot) = kin.iter().position(|k| *k == cid) {
                let angle = TAU * slot as f32 / kin_count;
                culture.target_position = Some(Position::new(
                    centre.x + angle.cos() * config.kin_ring_radius,
                    centre.y + angle.sin() * config.kin_ring_radius,
                ));
                culture.target_scale = config.kin_scale;
                culture.target_opacity = config.kin_opacity;
                culture.layer = config.kin_layer;
            } else {
                culture.target_position = None;
                culture.target_scale = config.dim_scale;
                culture.target_opacity = config.dim_opacity;
                culture.layer = config.dim_layer;
            }
        }

        if !kin.is_empty() {
            // Outbound flow from the focused culture toward its kin.
            let pool = self.interior_pool(id);
            let plans = plan_flow(
                &pool,
                &kin,
                config.flow_fraction,
                config.exchange_ratio,
                &mut self.rng,
            );
            self.apply_flow_plans(&plans);

            // Reverse flow from each kin culture toward the focus.
            let reverse_ratio = match config.reverse_exchange_mode {
                crate::ReverseExchangeMode::Flat => config.reverse_exchange_ratio,
                crate::ReverseExchangeMode::DividedByConnections => {
                    config.reverse_exchange_ratio / kin.len() as f32
                }
            };
            let focus_target = [id];
            for &kin_id in &kin {
                let pool = self.interior_pool(kin_id);
                let plans = plan_flow(
                    &pool,
                    &focus_target,
                    config.reverse_flow_fraction,
                    reverse_ratio,
                    &mut self.rng,
                );
                self.apply_flow_plans(&plans);
            }
        }

        self.focus = Some(FocusState { culture: id, kin });
        Ok(())
    }

    /// Leave focus mode through the phased exit sequence. No-op when neither
    /// a focus episode nor a sequence is active.
    pub fn exit_focus(&mut self) {
        if self.focus.is_none() && self.exit_sequence.is_none() {
            return;
        }
        self.deactivate_flow();
        self.focus = None;

        let config = self.config.clone();
        for (_, culture) in self.cultures.iter_mut() {
            if culture.is_synthetic() {
                continue;
            }
            culture.target_position = None;
            culture.target_scale = config.base_scale;
            culture.layer = config.base_layer;
        }
        self.exit_sequence = Some(ExitSequence::new(self.tick));
    }

    /// Narrow visibility to one scope level, or clear the filter with `None`.
    /// Ends any focus episode immediately (flushing pending exchanges).
    pub fn set_scope_filter(&mut self, level: Option<ScopeLevel>) {
        if level == self.scope_filter {
            return;
        }
        self.deactivate_flow();
        self.focus = None;
        self.exit_sequence = None;
        self.scope_filter = level;

        let config = self.config.clone();
        for (_, culture) in self.cultures.iter_mut() {
            let Some(scope) = culture.scope() else {
                continue;
            };
            culture.target_position = None;
            culture.target_scale = config.base_scale;
            culture.layer = config.base_layer;
            culture.target_opacity = match level {
                None => config.base_opacity,
                Some(filter) if scope == filter => config.base_opacity,
                Some(_) => 0.0,
            };
        }
        if level.is_none() {
            self.retire_all_synthetics();
        }
    }

    /// Pan the camera by a screen-space delta.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let world = (self.config.world_width, self.config.world_height);
        self.camera.pan(dx, dy, world);
    }

    /// Multiply the camera zoom by `factor` about the viewport centre.
    pub fn zoom_by(&mut self, factor: f32) {
        let world = (self.config.world_width, self.config.world_height);
        self.camera
            .zoom_by(factor, self.config.min_zoom, self.config.max_zoom, world);
    }

    /// Smoothly move the camera until `id` sits at the viewport centre.
    /// No-op before the viewport has been measured.
    pub fn move_camera_to(&mut self, id: CultureId) -> Result<(), EngineError> {
        let Some(culture) = self.cultures.get(id) else {
            return Err(EngineError::UnknownCulture(format!("{id:?}")));
        };
        let point = (culture.position.x, culture.position.y);
        let world = (self.config.world_width, self.config.world_height);
        if let Some(target) = self.camera.target_centred_on(point, world) {
            self.camera.move_to(target);
        }
        Ok(())
    }

    /// Record the measured viewport size.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        let world = (self.config.world_width, self.config.world_height);
        self.camera.set_viewport(width, height, world);
    }

    /// Switch between bordered and borderless rendering.
    pub fn set_visual_mode(&mut self, mode: VisualMode) {
        self.visual_mode = mode;
    }

    /// Re-scatter cultures and reset particle physical state, preserving
    /// particle colors and border/interior classes. Idempotent with respect
    /// to particle counts.
    pub fn reset_positions(&mut self) {
        self.randomize_layout();
    }

    // ----- internals --------------------------------------------------------

    /// Indices of flow-eligible particles currently contained in `culture`.
    fn interior_pool(&self, culture: CultureId) -> Vec<usize> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.culture == culture
                    && p.class == ParticleClass::Interior
                    && p.slot.is_none()
                    && p.state.is_contained()
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    fn apply_flow_plans(&mut self, plans: &[crate::particle::FlowAssignment]) {
        let max_delay = self.config.activation_delay_ticks;
        for plan in plans {
            let delay_ticks = if max_delay > 0 {
                self.rng.random_range(0..=max_delay)
            } else {
                0
            };
            let particle = &mut self.particles[plan.particle];
            particle.state = ParticleState::Activating {
                delay_ticks,
                started_at: self.tick,
                target: plan.target,
                exchange: plan.exchange.then_some(plan.target),
            };
        }
    }

    fn scatter_position(&mut self) -> Position {
        let pad = self.config.world_margin + 80.0;
        let x = self
            .rng
            .random_range(pad..=(self.config.world_width - pad).max(pad));
        let y = self
            .rng
            .random_range(pad..=(self.config.world_height - pad).max(pad));
        Position::new(x, y)
    }

    /// Seed the fixed interior and border particle sets for one culture.
    fn seed_culture_particles(&mut self, id: CultureId) {
        let Some(culture) = self.cultures.get(id) else {
            return;
        };
        let hue = culture.hue;
        let interior = culture.interior_count;
        let border = culture.border_count();
        let polygon = culture.polygon();
        let reach = polygon.apothem() * self.config.interior_fringe_fraction;

        for _ in 0..interior {
            let angle = self.rng.random_range(0.0..TAU);
            let radial = self.rng.random_range(0.0..reach.max(1.0));
            let s = BASE_SATURATION + self.rng.random_range(-0.05..=0.05);
            let l = BASE_LIGHTNESS + self.rng.random_range(-0.05..=0.05);
            self.particles.push(Particle {
                home: id,
                culture: id,
                offset: (angle.cos() * radial, angle.sin() * radial),
                velocity: (0.0, 0.0),
                color: Hsl::new(hue, s, l),
                class: ParticleClass::Interior,
                slot: None,
                state: ParticleState::Contained,
            });
        }
        for _ in 0..border {
            let s = BASE_SATURATION + self.rng.random_range(-0.05..=0.05);
            let l = BASE_LIGHTNESS + self.rng.random_range(-0.05..=0.05);
            self.particles.push(Particle {
                home: id,
                culture: id,
                offset: (0.0, 0.0),
                velocity: (0.0, 0.0),
                color: Hsl::new(hue, s, l),
                class: ParticleClass::Border,
                slot: None,
                state: ParticleState::Contained,
            });
        }
    }

    /// Hand every border slot back to a border-class particle, distributed
    /// evenly across its culture's edges, and rest them all.
    pub(crate) fn assign_border_slots(&mut self) {
        let mut counters: HashMap<CultureId, usize> = HashMap::new();
        let geometry: HashMap<CultureId, (u32, usize)> = self
            .cultures
            .iter()
            .map(|(id, c)| (id, (c.sides, c.per_edge_count.max(1))))
            .collect();

        for particle in &mut self.particles {
            if particle.class != ParticleClass::Border {
                particle.slot = None;
                continue;
            }
            let Some(&(sides, per_edge)) = geometry.get(&particle.home) else {
                particle.slot = None;
                continue;
            };
            let n = counters.entry(particle.home).or_insert(0);
            let edge = (*n / per_edge) as u32 % sides;
            let t = (*n % per_edge) as f32 / per_edge as f32 + 0.5 / per_edge as f32;
            *n += 1;
            particle.culture = particle.home;
            particle.slot = Some(BorderSlot {
                edge,
                t,
                direction: if self.rng.random_bool(0.5) { 1.0 } else { -1.0 },
                phase: self.rng.random_range(0.0..TAU),
            });
            particle.state = ParticleState::Contained;
            particle.velocity = (0.0, 0.0);
        }
    }

    /// Restore every border particle to its home edge (exit-sequence phase).
    pub(crate) fn reseat_border_particles(&mut self) {
        self.assign_border_slots();
    }

    /// Re-scatter real cultures and re-seed particle physical state while
    /// preserving every particle's color and class.
    pub(crate) fn randomize_layout(&mut self) {
        let ids: Vec<CultureId> = self
            .cultures
            .iter()
            .filter(|(_, c)| !c.is_synthetic())
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            let position = self.scatter_position();
            let culture = &mut self.cultures[id];
            culture.position = position;
            culture.home = position;
            culture.velocity = Velocity::default();
            culture.target_position = None;
        }

        let fringe = self.config.interior_fringe_fraction;
        let reaches: HashMap<CultureId, f32> = self
            .cultures
            .iter()
            .map(|(id, c)| (id, c.polygon().apothem() * fringe))
            .collect();
        for idx in 0..self.particles.len() {
            let home = self.particles[idx].home;
            let reach = reaches.get(&home).copied().unwrap_or(1.0);
            let angle = self.rng.random_range(0.0..TAU);
            let radial = self.rng.random_range(0.0..reach.max(1.0));
            let particle = &mut self.particles[idx];
            particle.culture = home;
            particle.offset = (angle.cos() * radial, angle.sin() * radial);
            particle.velocity = (0.0, 0.0);
            particle.state = ParticleState::Contained;
            particle.slot = None;
        }
        self.assign_border_slots();
    }

    // ----- accessors --------------------------------------------------------

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mutable access to the configuration (for hot edits).
    #[must_use]
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Look up a culture handle by name.
    #[must_use]
    pub fn culture_id(&self, name: &str) -> Option<CultureId> {
        self.by_name.get(name).copied()
    }

    /// Borrow a culture by handle.
    #[must_use]
    pub fn culture(&self, id: CultureId) -> Option<&Culture> {
        self.cultures.get(id)
    }

    /// Iterate over all cultures.
    pub fn cultures(&self) -> impl Iterator<Item = (CultureId, &Culture)> {
        self.cultures.iter()
    }

    /// Number of live cultures, synthetic groups included.
    #[must_use]
    pub fn culture_count(&self) -> usize {
        self.cultures.len()
    }

    /// All particles in creation order.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// The camera controller.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The active focus episode, if any.
    #[must_use]
    pub fn focus_state(&self) -> Option<&FocusState> {
        self.focus.as_ref()
    }

    /// The active scope filter, if any.
    #[must_use]
    pub const fn scope_filter(&self) -> Option<ScopeLevel> {
        self.scope_filter
    }

    /// The running exit sequence, if any.
    #[must_use]
    pub const fn exit_sequence(&self) -> Option<ExitSequence> {
        self.exit_sequence
    }

    /// The current visual mode.
    #[must_use]
    pub const fn visual_mode(&self) -> VisualMode {
        self.visual_mode
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }
}
