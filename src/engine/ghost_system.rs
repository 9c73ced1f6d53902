use std::cmp::Ordering;

use crate::constants::{
    GHOST_COLORS, GHOST_CONTACT_RADIUS, GHOST_DESPAWN_DEPTH, GHOST_POINTS, GHOST_SPAWN_ATTEMPTS,
    GHOST_SPAWN_INTERVAL, GHOST_SPEED_FRIGHTENED, GHOST_SPEED_MAX, GHOST_SPEED_START,
    HYPER_GHOST_MULTIPLIER, MAP_WIDTH, TILE_SIZE,
};
use crate::rng::RandomSource;
use crate::types::{Direction, GhostView, RoomEvent, SoundCue};
use crate::world::TileGrid;

use super::combat::debris_burst;
use super::motion::{advance, lerp_speed, ramp_fraction, Mover};
use super::train::CrossingTrain;
use super::utils::{cell_squared_distance, shuffle, squared_distance, within_box};
use super::Room;

#[derive(Clone, Debug)]
pub(super) struct GhostInternal {
    pub(super) mover: Mover,
    pub(super) queued: Direction,
    pub(super) dead: bool,
    pub(super) color: &'static str,
}

impl GhostInternal {
    pub(super) fn new(col: i32, row: i32, color: &'static str) -> Self {
        Self {
            mover: Mover::at_cell(col, row),
            queued: Direction::None,
            dead: false,
            color,
        }
    }

    pub(super) fn view(&self) -> GhostView {
        let (vx, vy) = self.mover.velocity();
        GhostView {
            x: self.mover.x,
            y: self.mover.y,
            vx,
            vy,
            color: self.color.to_string(),
            dead: self.dead,
        }
    }
}

// Walls, plus the three train rows while the crossing is armed.
pub(super) fn ghost_blocked(grid: &TileGrid, train: &CrossingTrain, col: i32, row: i32) -> bool {
    grid.is_wall(col, row) || train.covers_row(row)
}

/// Orders the open directions out of `from`.
///
/// While moving, the reverse of `heading` is dropped unless nothing else is open. With a target the
/// candidates are sorted by squared distance from their destination cell, nearest first
/// when chasing and farthest first when fleeing; ties keep the fixed cardinal order.
/// Without a target the order is shuffled.
pub(super) fn rank_directions<F>(
    from: (i32, i32),
    heading: Direction,
    target: Option<(i32, i32)>,
    fleeing: bool,
    blocked: F,
    rng: &mut dyn RandomSource,
) -> Vec<Direction>
where
    F: Fn(i32, i32) -> bool,
{
    let destination = |dir: Direction| {
        let (dx, dy) = dir.delta();
        (from.0 + dx, from.1 + dy)
    };
    let mut candidates: Vec<Direction> = Direction::CARDINALS
        .iter()
        .copied()
        .filter(|dir| {
            let (col, row) = destination(*dir);
            !blocked(col, row)
        })
        .collect();
    if heading != Direction::None && candidates.len() > 1 {
        candidates.retain(|dir| *dir != heading.reverse());
    }

    match target {
        Some(target) => candidates.sort_by(|a, b| {
            let order: Ordering = cell_squared_distance(destination(*a), target)
                .cmp(&cell_squared_distance(destination(*b), target));
            if fleeing {
                order.reverse()
            } else {
                order
            }
        }),
        None => shuffle(&mut candidates, rng),
    }
    candidates
}

impl Room {
    pub(super) fn update_ghosts(&mut self) {
        self.spawn_ghosts();
        self.move_ghosts();
        self.resolve_ghost_contacts();

        let despawn_line = self.camera_y + GHOST_DESPAWN_DEPTH;
        self.ghosts
            .retain(|ghost| !ghost.dead && ghost.mover.y < despawn_line);
    }

    fn ghost_speed(&self) -> f64 {
        let mut speed = if self.frightened_timer > 0 {
            GHOST_SPEED_FRIGHTENED
        } else {
            lerp_speed(
                GHOST_SPEED_START,
                GHOST_SPEED_MAX,
                ramp_fraction(self.game_speed),
            )
        };
        if self.hyper_timer > 0 {
            speed *= HYPER_GHOST_MULTIPLIER;
        }
        speed
    }

    pub(super) fn spawn_ghosts(&mut self) {
        if self.camera_y >= self.next_ghost_spawn {
            return;
        }
        self.next_ghost_spawn -= GHOST_SPAWN_INTERVAL;
        if !self.options.ghost_spawning || !self.boss.is_idle() {
            return;
        }

        let row = (self.camera_y / TILE_SIZE).floor() as i32 - 2;
        let Some((col, row)) = self.pick_ghost_cell(row) else {
            tracing::debug!(room = %self.id, row, "no open cell for ghost spawn");
            return;
        };
        let color = GHOST_COLORS[self.rng.pick_index(GHOST_COLORS.len())];
        self.ghosts.push(GhostInternal::new(col, row, color));
    }

    fn pick_ghost_cell(&mut self, row: i32) -> Option<(i32, i32)> {
        let max_col = MAP_WIDTH as i32 - 3;
        for _ in 0..GHOST_SPAWN_ATTEMPTS {
            let col = self.rng.int(2, max_col);
            if !ghost_blocked(&self.grid, &self.train, col, row) {
                return Some((col, row));
            }
        }
        (row..row + 3).find_map(|scan_row| {
            (2..=max_col)
                .find(|col| !ghost_blocked(&self.grid, &self.train, *col, scan_row))
                .map(|col| (col, scan_row))
        })
    }

    fn nearest_player_cell(&self, x: f64, y: f64) -> Option<(i32, i32)> {
        self.players
            .iter()
            .filter(|player| player.is_active())
            .min_by(|a, b| {
                let da = squared_distance(x, y, a.mover.x, a.mover.y);
                let db = squared_distance(x, y, b.mover.x, b.mover.y);
                da.total_cmp(&db)
            })
            .map(|player| player.mover.cell())
    }

    fn move_ghosts(&mut self) {
        let speed = self.ghost_speed();
        let fleeing = self.frightened_timer > 0;
        for idx in 0..self.ghosts.len() {
            let at_decision = {
                let mover = &self.ghosts[idx].mover;
                mover.heading == Direction::None || mover.is_near_center(speed)
            };
            if at_decision {
                let (x, y) = (self.ghosts[idx].mover.x, self.ghosts[idx].mover.y);
                let target = self.nearest_player_cell(x, y);
                let (grid, train) = (&self.grid, &self.train);
                let ghost = &self.ghosts[idx];
                let ranked = rank_directions(
                    ghost.mover.cell(),
                    ghost.mover.heading,
                    target,
                    fleeing,
                    |col, row| ghost_blocked(grid, train, col, row),
                    self.rng.as_mut(),
                );
                self.ghosts[idx].queued = ranked.first().copied().unwrap_or(Direction::None);
            }

            let (grid, train) = (&self.grid, &self.train);
            let ghost = &mut self.ghosts[idx];
            advance(&mut ghost.mover, &mut ghost.queued, speed, |col, row| {
                ghost_blocked(grid, train, col, row)
            });
        }
    }

    fn resolve_ghost_contacts(&mut self) {
        for g in 0..self.ghosts.len() {
            for p in 0..self.players.len() {
                if self.ghosts[g].dead {
                    break;
                }
                let (ghost, player) = (&self.ghosts[g].mover, &self.players[p]);
                if !player.is_active()
                    || player.invuln_timer > 0
                    || !within_box(
                        ghost.x,
                        ghost.y,
                        player.mover.x,
                        player.mover.y,
                        GHOST_CONTACT_RADIUS,
                        GHOST_CONTACT_RADIUS,
                    )
                {
                    continue;
                }

                if self.frightened_timer > 0 {
                    let (x, y) = (ghost.x, ghost.y);
                    self.kill_ghost(g);
                    self.popup(x, y, format!("+{GHOST_POINTS}"), "#00FFFF");
                    self.players[p].stats.ghosts += 1;
                    self.award(p, GHOST_POINTS);
                } else {
                    self.lose_life(p);
                }
            }
        }
    }

    pub(super) fn kill_ghost(&mut self, idx: usize) {
        let ghost = &mut self.ghosts[idx];
        if ghost.dead {
            return;
        }
        ghost.dead = true;
        ghost.mover.halt();
        let (x, y) = (ghost.mover.x, ghost.mover.y);
        let pieces = debris_burst(x, y, ghost.color);
        self.events.push(RoomEvent::Debris { pieces });
        self.sound(SoundCue::EatGhost);
    }
}
