//! Engine configuration, validated once at construction.

use crate::EngineError;
use kinscape_geom::BoundaryParams;
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

/// How the reverse-exchange quota is derived for each connected culture.
///
/// Source datasets disagree on this, so it stays a tunable rather than a
/// hard-coded rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ReverseExchangeMode {
    /// Apply `reverse_exchange_ratio` to each connected culture's pool as-is.
    #[default]
    Flat,
    /// Divide `reverse_exchange_ratio` by the number of connected cultures.
    DividedByConnections,
}

/// Static configuration for a Kinscape engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Width of the world in world units.
    pub world_width: f32,
    /// Height of the world in world units.
    pub world_height: f32,
    /// Margin kept between parentless cultures and the world edge.
    pub world_margin: f32,
    /// Ticks per second of wall clock, used to size timed sequences.
    pub tick_rate: f32,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,

    // Layout forces (real cultures only).
    /// Magnitude of the random impulse applied while a culture is moving.
    pub brownian_impulse: f32,
    /// Speed above which the brownian impulse applies.
    pub brownian_speed_threshold: f32,
    /// Distance from home beyond which the strong spring engages.
    pub home_radius: f32,
    /// Spring constant outside `home_radius`.
    pub home_spring_strong: f32,
    /// Spring constant inside `home_radius`.
    pub home_spring_weak: f32,
    /// Constant attraction toward the world centre.
    pub center_attraction: f32,
    /// Extra clearance added to circle-overlap tests between cultures.
    pub collision_padding: f32,
    /// Repulsion strength applied to overlapping culture pairs.
    pub collision_repulsion: f32,
    /// Speed cap for culture motion.
    pub layout_max_speed: f32,
    /// Per-tick velocity damping for cultures.
    pub layout_damping: f32,
    /// Speeds below this snap to zero.
    pub zero_snap_speed: f32,
    /// Clearance kept between a child and its parent's containment radius.
    pub parent_containment_margin: f32,
    /// Velocity retained when a child touches the parent containment radius.
    pub containment_contact_damping: f32,

    // Target relaxation.
    /// Per-tick lerp factor for scale toward its target.
    pub scale_relax_rate: f32,
    /// Per-tick lerp factor for opacity toward its target.
    pub opacity_relax_rate: f32,
    /// Per-tick lerp factor for manually transitioned positions.
    pub position_transition_rate: f32,

    // Particle physics.
    /// Snapshot size for interior particles.
    pub interior_particle_size: f32,
    /// Snapshot size for border particles.
    pub border_particle_size: f32,
    /// Edge-tangent drift speed of border particles.
    pub border_drift_speed: f32,
    /// Amplitude of the perpendicular border float.
    pub border_float_amplitude: f32,
    /// Period of the perpendicular border float, in ticks.
    pub border_float_period: f32,
    /// Per-tick probability of a border/interior position swap.
    pub border_swap_probability: f32,
    /// Brownian magnitude for contained interior particles.
    pub interior_brownian: f32,
    /// Fraction of the apothem below which particles are pushed outward.
    pub interior_core_fraction: f32,
    /// Fraction of the apothem above which particles are pulled inward.
    pub interior_fringe_fraction: f32,
    /// Magnitude of the two-zone radial adjustment.
    pub radial_adjust: f32,
    /// Per-tick velocity damping for contained particles.
    pub particle_damping: f32,
    /// Soft/hard polygon containment tunables.
    pub boundary: BoundaryParams,

    // Flow episodes.
    /// Upper bound of the randomized activation delay, in ticks.
    pub activation_delay_ticks: u32,
    /// Length of the contained-to-flow blend, in ticks.
    pub activation_blend_ticks: u32,
    /// Steering force toward the flow target.
    pub flow_steering: f32,
    /// Perpendicular dispersion applied while flowing.
    pub flow_dispersion: f32,
    /// Longitudinal turbulence applied while flowing.
    pub flow_turbulence: f32,
    /// Per-tick velocity damping while flowing.
    pub flow_damping: f32,
    /// Speed cap while flowing.
    pub flow_speed_cap: f32,
    /// Distance to the target centre that counts as arrival.
    pub arrival_radius: f32,
    /// Fraction of the focused culture's interior pool that flows.
    pub flow_fraction: f32,
    /// Fraction of the interior pool marked for permanent color exchange.
    pub exchange_ratio: f32,
    /// Fraction of each connected culture's interior pool that flows back.
    pub reverse_flow_fraction: f32,
    /// Exchange ratio for the reverse flow.
    pub reverse_exchange_ratio: f32,
    /// How the reverse-exchange ratio is applied.
    pub reverse_exchange_mode: ReverseExchangeMode,
    /// Saturation jitter applied when a color exchange lands.
    pub exchange_saturation_jitter: f32,
    /// Lightness jitter applied when a color exchange lands.
    pub exchange_lightness_jitter: f32,

    // Focus presentation targets.
    /// Scale target for the focused culture.
    pub focus_scale: f32,
    /// Opacity target for the focused culture.
    pub focus_opacity: f32,
    /// Draw layer for the focused culture.
    pub focus_layer: u8,
    /// Scale target for the focused culture's kin.
    pub kin_scale: f32,
    /// Opacity target for the focused culture's kin.
    pub kin_opacity: f32,
    /// Draw layer for kin.
    pub kin_layer: u8,
    /// Scale target for unrelated cultures during focus.
    pub dim_scale: f32,
    /// Opacity target for unrelated cultures during focus.
    pub dim_opacity: f32,
    /// Draw layer for unrelated cultures during focus.
    pub dim_layer: u8,
    /// Resting scale outside focus mode.
    pub base_scale: f32,
    /// Resting opacity outside focus mode.
    pub base_opacity: f32,
    /// Resting draw layer outside focus mode.
    pub base_layer: u8,
    /// Radius of the ring kin are arranged on around a focused culture.
    pub kin_ring_radius: f32,

    // Aggregation.
    /// Base circumradius of a synthetic parent group.
    pub synthetic_base_size: f32,
    /// Circumradius added per grouped child.
    pub synthetic_size_increment: f32,
    /// Side count used for synthetic parent polygons.
    pub synthetic_sides: u32,
    /// Interior particles seeded into a new synthetic group.
    pub synthetic_particle_count: usize,
    /// Rejection-sampling attempts before the least-overlap fallback.
    pub placement_attempts: u32,
    /// Clearance required between a placed group and other shapes.
    pub placement_padding: f32,
    /// Pairwise separation iterations run across synthetic groups per tick.
    pub separation_iterations: u32,

    // Camera.
    /// Minimum zoom factor.
    pub min_zoom: f32,
    /// Maximum zoom factor.
    pub max_zoom: f32,
    /// Per-tick interpolation rate of camera move-to transitions.
    pub camera_move_rate: f32,
    /// Offset epsilon below which a camera transition snaps to target.
    pub camera_epsilon: f32,
    /// Zoom epsilon below which a camera transition snaps to target.
    pub camera_zoom_epsilon: f32,

    // Exit-focus sequencer phase lengths, in ticks.
    /// Shrink-focused phase length.
    pub exit_shrink_ticks: u32,
    /// Border-reset phase length.
    pub exit_border_reset_ticks: u32,
    /// Fade-out phase length.
    pub exit_fade_out_ticks: u32,
    /// Randomize phase length.
    pub exit_randomize_ticks: u32,
    /// Fade-in phase length.
    pub exit_fade_in_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_width: 4_000.0,
            world_height: 2_400.0,
            world_margin: 60.0,
            tick_rate: 60.0,
            rng_seed: None,
            history_capacity: 256,

            brownian_impulse: 0.18,
            brownian_speed_threshold: 0.02,
            home_radius: 90.0,
            home_spring_strong: 0.012,
            home_spring_weak: 0.0015,
            center_attraction: 0.000_4,
            collision_padding: 24.0,
            collision_repulsion: 0.06,
            layout_max_speed: 2.4,
            layout_damping: 0.92,
            zero_snap_speed: 0.005,
            parent_containment_margin: 6.0,
            containment_contact_damping: 0.6,

            scale_relax_rate: 0.08,
            opacity_relax_rate: 0.08,
            position_transition_rate: 0.06,

            interior_particle_size: 2.0,
            border_particle_size: 2.6,
            border_drift_speed: 0.35,
            border_float_amplitude: 1.8,
            border_float_period: 120.0,
            border_swap_probability: 0.000_8,
            interior_brownian: 0.08,
            interior_core_fraction: 0.25,
            interior_fringe_fraction: 0.8,
            radial_adjust: 0.02,
            particle_damping: 0.96,
            boundary: BoundaryParams::default(),

            activation_delay_ticks: 120,
            activation_blend_ticks: 45,
            flow_steering: 0.055,
            flow_dispersion: 0.35,
            flow_turbulence: 0.22,
            flow_damping: 0.95,
            flow_speed_cap: 3.2,
            arrival_radius: 14.0,
            flow_fraction: 0.5,
            exchange_ratio: 0.2,
            reverse_flow_fraction: 0.1,
            reverse_exchange_ratio: 0.2,
            reverse_exchange_mode: ReverseExchangeMode::Flat,
            exchange_saturation_jitter: 0.12,
            exchange_lightness_jitter: 0.1,

            focus_scale: 2.0,
            focus_opacity: 1.0,
            focus_layer: 3,
            kin_scale: 1.2,
            kin_opacity: 0.8,
            kin_layer: 2,
            dim_scale: 0.4,
            dim_opacity: 0.1,
            dim_layer: 0,
            base_scale: 1.0,
            base_opacity: 0.5,
            base_layer: 0,
            kin_ring_radius: 260.0,

            synthetic_base_size: 60.0,
            synthetic_size_increment: 18.0,
            synthetic_sides: 6,
            synthetic_particle_count: 48,
            placement_attempts: 24,
            placement_padding: 30.0,
            separation_iterations: 4,

            min_zoom: 0.4,
            max_zoom: 2.5,
            camera_move_rate: 0.12,
            camera_epsilon: 0.5,
            camera_zoom_epsilon: 0.005,

            exit_shrink_ticks: 60,
            exit_border_reset_ticks: 30,
            exit_fade_out_ticks: 60,
            exit_randomize_ticks: 30,
            exit_fade_in_ticks: 60,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.world_width <= 0.0 || self.world_height <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "world dimensions must be positive",
            ));
        }
        if self.world_margin < 0.0 || self.world_margin * 2.0 >= self.world_width.min(self.world_height) {
            return Err(EngineError::InvalidConfig(
                "world_margin must be non-negative and leave usable area",
            ));
        }
        if self.tick_rate <= 0.0 {
            return Err(EngineError::InvalidConfig("tick_rate must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.flow_fraction)
            || !(0.0..=1.0).contains(&self.exchange_ratio)
            || !(0.0..=1.0).contains(&self.reverse_flow_fraction)
            || !(0.0..=1.0).contains(&self.reverse_exchange_ratio)
        {
            return Err(EngineError::InvalidConfig(
                "flow and exchange fractions must lie in [0, 1]",
            ));
        }
        if self.layout_damping <= 0.0
            || self.layout_damping > 1.0
            || self.particle_damping <= 0.0
            || self.particle_damping > 1.0
            || self.flow_damping <= 0.0
            || self.flow_damping > 1.0
        {
            return Err(EngineError::InvalidConfig(
                "damping factors must lie in (0, 1]",
            ));
        }
        if self.layout_max_speed <= 0.0 || self.flow_speed_cap <= 0.0 {
            return Err(EngineError::InvalidConfig("speed caps must be positive"));
        }
        if self.arrival_radius <= 0.0 || self.kin_ring_radius <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "arrival_radius and kin_ring_radius must be positive",
            ));
        }
        if self.activation_blend_ticks == 0 {
            return Err(EngineError::InvalidConfig(
                "activation_blend_ticks must be non-zero",
            ));
        }
        if self.min_zoom <= 0.0 || self.max_zoom < self.min_zoom {
            return Err(EngineError::InvalidConfig(
                "zoom range must be positive and ordered",
            ));
        }
        if self.camera_move_rate <= 0.0 || self.camera_move_rate > 1.0 {
            return Err(EngineError::InvalidConfig(
                "camera_move_rate must lie in (0, 1]",
            ));
        }
        if self.synthetic_base_size <= 0.0
            || self.synthetic_size_increment < 0.0
            || self.synthetic_sides < 3
            || self.placement_attempts == 0
        {
            return Err(EngineError::InvalidConfig(
                "aggregation sizing must be positive, sides at least 3, attempts non-zero",
            ));
        }
        if !(0.0..1.0).contains(&self.interior_core_fraction)
            || !(self.interior_core_fraction..=1.0).contains(&self.interior_fringe_fraction)
        {
            return Err(EngineError::InvalidConfig(
                "interior zone fractions must satisfy 0 <= core < fringe <= 1",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy when no seed is set.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Total length of the exit-focus sequence, in ticks.
    #[must_use]
    pub const fn exit_sequence_ticks(&self) -> u32 {
        self.exit_shrink_ticks
            + self.exit_border_reset_ticks
            + self.exit_fade_out_ticks
            + self.exit_randomize_ticks
            + self.exit_fade_in_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().expect("default config");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = EngineConfig {
            world_width: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        config = EngineConfig {
            flow_fraction: 1.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        config = EngineConfig {
            layout_damping: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        config = EngineConfig {
            max_zoom: 0.1,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn exit_sequence_defaults_span_four_seconds() {
        let config = EngineConfig::default();
        let seconds = config.exit_sequence_ticks() as f32 / config.tick_rate;
        assert!((seconds - 4.0).abs() < 0.25, "got {seconds}s");
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        use rand::Rng;
        let config = EngineConfig {
            rng_seed: Some(99),
            ..EngineConfig::default()
        };
        let mut a = config.seeded_rng();
        let mut b = config.seeded_rng();
        let xs: Vec<u32> = (0..8).map(|_| a.random()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.random()).collect();
        assert_eq!(xs, ys);
    }
}
