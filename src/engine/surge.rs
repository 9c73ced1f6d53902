use crate::constants::{
    HAZARD_DEFER_TICKS, SURGE_CYCLE_MAX_TICKS, SURGE_CYCLE_MIN_TICKS, SURGE_HOLD_TICKS,
    SURGE_MAX_HEIGHT, SURGE_RETURN_TICKS, SURGE_RISE_TICKS,
};
use crate::rng::RandomSource;
use crate::types::{SurgePayload, SurgePhase};

use super::Room;

// `Rising` covers both the climb and the dwell at full height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) enum SurgeState {
    #[default]
    Idle,
    Rising {
        elapsed: u32,
    },
    Returning {
        elapsed: u32,
    },
}

impl SurgeState {
    fn next(self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Rising { elapsed } if elapsed + 1 >= SURGE_RISE_TICKS + SURGE_HOLD_TICKS => {
                Self::Returning { elapsed: 0 }
            }
            Self::Rising { elapsed } => Self::Rising {
                elapsed: elapsed + 1,
            },
            Self::Returning { elapsed } if elapsed + 1 >= SURGE_RETURN_TICKS => Self::Idle,
            Self::Returning { elapsed } => Self::Returning {
                elapsed: elapsed + 1,
            },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(super) struct FloorSurge {
    pub(super) state: SurgeState,
    pub(super) next_trigger_frame: u64,
}

impl FloorSurge {
    pub(super) fn new(rng: &mut dyn RandomSource, now_frame: u64) -> Self {
        let mut surge = Self::default();
        surge.schedule(rng, now_frame);
        surge
    }

    fn schedule(&mut self, rng: &mut dyn RandomSource, now_frame: u64) {
        self.next_trigger_frame =
            now_frame + rng.int(SURGE_CYCLE_MIN_TICKS, SURGE_CYCLE_MAX_TICKS) as u64;
    }

    pub(super) fn is_active(&self) -> bool {
        self.state != SurgeState::Idle
    }

    // How far the fall-off line is lifted above the bottom of the view.
    pub(super) fn height(&self) -> f64 {
        match self.state {
            SurgeState::Idle => 0.0,
            SurgeState::Rising { elapsed } => {
                SURGE_MAX_HEIGHT * (elapsed as f64 / SURGE_RISE_TICKS as f64).min(1.0)
            }
            SurgeState::Returning { elapsed } => {
                SURGE_MAX_HEIGHT * (1.0 - elapsed as f64 / SURGE_RETURN_TICKS as f64).max(0.0)
            }
        }
    }

    pub(super) fn payload(&self) -> SurgePayload {
        let state = match self.state {
            SurgeState::Idle => SurgePhase::Idle,
            SurgeState::Rising { .. } => SurgePhase::Rising,
            SurgeState::Returning { .. } => SurgePhase::Returning,
        };
        SurgePayload {
            state,
            height: self.height(),
        }
    }
}

impl Room {
    pub(super) fn update_floor_surge(&mut self) {
        if self.surge.is_active() && !self.boss.is_idle() {
            self.surge.state = SurgeState::Idle;
            self.surge.schedule(self.rng.as_mut(), self.frame);
            tracing::debug!(room = %self.id, frame = self.frame, "floor surge dropped for boss");
            return;
        }
        if self.surge.is_active() {
            self.surge.state = self.surge.state.next();
            if !self.surge.is_active() {
                self.surge.schedule(self.rng.as_mut(), self.frame);
            }
            return;
        }

        if self.frame < self.surge.next_trigger_frame {
            return;
        }
        if self.rocket.is_active() || !self.boss.is_idle() || self.train.is_active() {
            self.surge.next_trigger_frame = self.frame + HAZARD_DEFER_TICKS;
            return;
        }
        self.surge.state = SurgeState::Rising { elapsed: 0 };
        tracing::debug!(room = %self.id, frame = self.frame, "floor surge rising");
    }
}
