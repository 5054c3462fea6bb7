//! The exit-focus choreography, expressed as an explicit phased sequencer
//! driven by elapsed ticks rather than chained deferred callbacks.

use crate::engine::Engine;
use crate::Tick;
use serde::{Deserialize, Serialize};

/// Named phases of the exit-focus sequence, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitPhase {
    /// Focused and kin cultures shrink back to resting scale.
    ShrinkFocused,
    /// Border particles are reseated on their home edges.
    ResetBorders,
    /// Every culture fades out.
    FadeOut,
    /// Positions and particle physical state are re-randomized.
    Randomize,
    /// Every culture fades back in to resting opacity.
    FadeIn,
}

impl ExitPhase {
    /// The phase that follows, or `None` after the last one.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::ShrinkFocused => Some(Self::ResetBorders),
            Self::ResetBorders => Some(Self::FadeOut),
            Self::FadeOut => Some(Self::Randomize),
            Self::Randomize => Some(Self::FadeIn),
            Self::FadeIn => None,
        }
    }
}

/// A running exit-focus sequence. Interruption-safe: superseding it simply
/// drops the value after the deactivation contract has flushed exchanges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitSequence {
    phase: ExitPhase,
    phase_started: Tick,
}

impl ExitSequence {
    /// Start a sequence in its first phase.
    #[must_use]
    pub const fn new(now: Tick) -> Self {
        Self {
            phase: ExitPhase::ShrinkFocused,
            phase_started: now,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ExitPhase {
        self.phase
    }

    /// Tick the current phase began.
    #[must_use]
    pub const fn phase_started(&self) -> Tick {
        self.phase_started
    }
}

impl Engine {
    /// Length of `phase` in ticks, from configuration.
    pub(crate) fn phase_duration(&self, phase: ExitPhase) -> u64 {
        let ticks = match phase {
            ExitPhase::ShrinkFocused => self.config.exit_shrink_ticks,
            ExitPhase::ResetBorders => self.config.exit_border_reset_ticks,
            ExitPhase::FadeOut => self.config.exit_fade_out_ticks,
            ExitPhase::Randomize => self.config.exit_randomize_ticks,
            ExitPhase::FadeIn => self.config.exit_fade_in_ticks,
        };
        u64::from(ticks)
    }

    /// Advance the exit sequence, running each phase's entry action as the
    /// clock crosses into it. Returns true when the sequence completed this
    /// tick.
    pub(crate) fn stage_sequence(&mut self) -> bool {
        let Some(sequence) = self.exit_sequence else {
            return false;
        };
        let elapsed = self.tick.since(sequence.phase_started());
        if elapsed < self.phase_duration(sequence.phase()) {
            return false;
        }

        match sequence.phase().next() {
            Some(next) => {
                self.exit_sequence = Some(ExitSequence {
                    phase: next,
                    phase_started: self.tick,
                });
                self.enter_exit_phase(next);
                false
            }
            None => {
                self.exit_sequence = None;
                self.finish_exit_sequence();
                true
            }
        }
    }

    fn enter_exit_phase(&mut self, phase: ExitPhase) {
        match phase {
            // Entry into the first phase happens in `exit_focus` itself.
            ExitPhase::ShrinkFocused => {}
            ExitPhase::ResetBorders => self.reseat_border_particles(),
            ExitPhase::FadeOut => {
                for (_, culture) in self.cultures.iter_mut() {
                    culture.target_opacity = 0.0;
                }
            }
            ExitPhase::Randomize => self.randomize_layout(),
            ExitPhase::FadeIn => {
                let opacity = self.config.base_opacity;
                let scale = self.config.base_scale;
                for (_, culture) in self.cultures.iter_mut() {
                    culture.target_opacity = opacity;
                    if !culture.is_synthetic() {
                        culture.target_scale = scale;
                    }
                }
            }
        }
    }

    /// Snap every culture to its resting presentation once the fade-in ends.
    fn finish_exit_sequence(&mut self) {
        let config = self.config.clone();
        for (_, culture) in self.cultures.iter_mut() {
            culture.target_position = None;
            culture.opacity = config.base_opacity;
            culture.target_opacity = config.base_opacity;
            culture.layer = config.base_layer;
            if !culture.is_synthetic() {
                culture.scale = config.base_scale;
                culture.target_scale = config.base_scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_chain_in_order_and_terminate() {
        let mut phase = ExitPhase::ShrinkFocused;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                ExitPhase::ShrinkFocused,
                ExitPhase::ResetBorders,
                ExitPhase::FadeOut,
                ExitPhase::Randomize,
                ExitPhase::FadeIn,
            ]
        );
    }

    #[test]
    fn sequence_records_phase_start() {
        let sequence = ExitSequence::new(Tick(42));
        assert_eq!(sequence.phase(), ExitPhase::ShrinkFocused);
        assert_eq!(sequence.phase_started(), Tick(42));
    }
}
