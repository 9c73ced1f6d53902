use crate::constants::{
    MAP_WIDTH, TILE_SIZE, TRAIN_HIT_RADIUS, TRAIN_RED_TICKS, TRAIN_SEGMENTS_PER_ROW, TRAIN_SPEED,
    TRAIN_YELLOW_TICKS,
};
use crate::types::{PointView, SoundCue, TrainPayload, TrainSignal};

use super::utils::squared_distance;
use super::Room;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) enum TrainState {
    #[default]
    Off,
    Waiting,
    Yellow {
        ticks_left: u32,
    },
    Red {
        ticks_left: u32,
    },
    Crossing,
}

#[derive(Clone, Debug, Default)]
pub(super) struct CrossingTrain {
    pub(super) state: TrainState,
    target_row: Option<i32>,
    direction: i32,
    pub(super) segments: Vec<(f64, f64)>,
}

impl CrossingTrain {
    // Armed by the corridor generator when it lays down the gap rows.
    pub(super) fn arm(&mut self, target_row: i32, direction: i32) {
        self.state = TrainState::Waiting;
        self.target_row = Some(target_row);
        self.direction = direction.signum();
        self.segments.clear();
    }

    pub(super) fn is_active(&self) -> bool {
        self.state != TrainState::Off
    }

    pub(super) fn target_row(&self) -> Option<i32> {
        self.target_row.filter(|_| self.is_active())
    }

    // The target row and its two neighbours.
    pub(super) fn covers_row(&self, row: i32) -> bool {
        self.target_row()
            .is_some_and(|target| (row - target).abs() <= 1)
    }

    pub(super) fn signal(&self) -> TrainSignal {
        match self.state {
            TrainState::Off => TrainSignal::Off,
            TrainState::Waiting => TrainSignal::Waiting,
            TrainState::Yellow { .. } => TrainSignal::Yellow,
            TrainState::Red { .. } => TrainSignal::Red,
            TrainState::Crossing => TrainSignal::Crossing,
        }
    }

    pub(super) fn payload(&self) -> TrainPayload {
        TrainPayload {
            state: self.signal(),
            target_row: self.target_row(),
            direction: self.direction,
            segments: self
                .segments
                .iter()
                .map(|(x, y)| PointView { x: *x, y: *y })
                .collect(),
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    // A dense line per row, entering from the side the train travels away from.
    fn spawn_segments(&mut self, target_row: i32) {
        let arena_width = MAP_WIDTH as f64 * TILE_SIZE;
        self.segments.clear();
        for row in target_row - 1..=target_row + 1 {
            let y = row as f64 * TILE_SIZE;
            for idx in 0..TRAIN_SEGMENTS_PER_ROW {
                let offset = (idx + 1) as f64 * TILE_SIZE;
                let x = if self.direction > 0 {
                    -offset
                } else {
                    arena_width + offset
                };
                self.segments.push((x, y));
            }
        }
    }

    fn all_segments_gone(&self) -> bool {
        let arena_width = MAP_WIDTH as f64 * TILE_SIZE;
        self.segments.iter().all(|(x, _)| {
            if self.direction > 0 {
                *x > arena_width
            } else {
                *x < -TILE_SIZE
            }
        })
    }
}

impl Room {
    pub(super) fn update_train(&mut self) {
        let Some(target_row) = self.train.target_row() else {
            return;
        };
        match self.train.state {
            TrainState::Off => {}
            TrainState::Waiting => {
                if target_row as f64 * TILE_SIZE >= self.camera_y + TILE_SIZE {
                    self.train.state = TrainState::Yellow {
                        ticks_left: TRAIN_YELLOW_TICKS,
                    };
                    self.sound(SoundCue::TrainBell);
                    tracing::debug!(room = %self.id, row = target_row, "train signal yellow");
                }
            }
            TrainState::Yellow { ticks_left } => {
                self.train.state = if ticks_left <= 1 {
                    TrainState::Red {
                        ticks_left: TRAIN_RED_TICKS,
                    }
                } else {
                    TrainState::Yellow {
                        ticks_left: ticks_left - 1,
                    }
                };
            }
            TrainState::Red { ticks_left } => {
                if ticks_left <= 1 {
                    self.train.spawn_segments(target_row);
                    self.train.state = TrainState::Crossing;
                    tracing::debug!(room = %self.id, row = target_row, "train crossing");
                } else {
                    self.train.state = TrainState::Red {
                        ticks_left: ticks_left - 1,
                    };
                }
            }
            TrainState::Crossing => {
                let step = self.train.direction as f64 * TRAIN_SPEED;
                for segment in &mut self.train.segments {
                    segment.0 += step;
                }
                self.resolve_train_contacts();
                if self.train.all_segments_gone() {
                    self.train.reset();
                }
            }
        }
    }

    fn resolve_train_contacts(&mut self) {
        let radius_sq = TRAIN_HIT_RADIUS * TRAIN_HIT_RADIUS;
        let hits = |x: f64, y: f64, segments: &[(f64, f64)]| {
            segments
                .iter()
                .any(|(sx, sy)| squared_distance(x, y, *sx, *sy) < radius_sq)
        };

        for idx in 0..self.players.len() {
            let player = &self.players[idx];
            if player.is_active()
                && player.invuln_timer == 0
                && hits(player.mover.x, player.mover.y, &self.train.segments)
            {
                self.lose_life(idx);
            }
        }
        for idx in 0..self.ghosts.len() {
            let ghost = &self.ghosts[idx];
            if !ghost.dead && hits(ghost.mover.x, ghost.mover.y, &self.train.segments) {
                self.kill_ghost(idx);
            }
        }
    }
}
