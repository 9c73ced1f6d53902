use crate::constants::{
    CAMERA_START_SPEED, DEATH_ANIMATION_TICKS, DOT_POINTS, HEART_BONUS_POINTS, HYPER_SPEED_TICKS,
    MAP_WIDTH, MAX_LIVES, MILESTONE_INTERVAL, PLAYER_COLORS, POWER_MODE_DURATION, POWER_POINTS,
    PVP_CONTACT_RADIUS, PVP_MODE_DURATION, RESPAWN_ATTEMPTS, RESPAWN_INVULN_TICKS,
    RESPAWN_ROW_SPREAD, RESPAWN_SAFE_DISTANCE, RESPAWN_SPEED_DAMPING, TILE_SIZE, VIEW_HEIGHT,
};
use crate::types::{DebrisPiece, Direction, GameOverSummary, RoomEvent, SoundCue, Tile};

use super::motion::Mover;
use super::utils::squared_distance;
use super::{PlayerInternal, Room};

#[derive(Clone, Copy, Debug)]
pub(super) struct Fighter {
    pub(super) aggressive: bool,
    pub(super) invulnerable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Clash {
    FirstWins,
    SecondWins,
    NoEffect,
}

// Lethal contact between two bodies. Used for player against player and player against the dashing boss.
// An aggressor beats anything that is not invulnerable; the first body is checked first.
pub(super) fn clash(first: Fighter, second: Fighter) -> Clash {
    if first.aggressive && !second.invulnerable {
        Clash::FirstWins
    } else if second.aggressive && !first.invulnerable {
        Clash::SecondWins
    } else {
        Clash::NoEffect
    }
}

pub(super) fn debris_burst(x: f64, y: f64, color: &str) -> Vec<DebrisPiece> {
    const OFFSETS: [(f64, f64); 6] = [
        (-12.0, -8.0),
        (0.0, -14.0),
        (12.0, -8.0),
        (-12.0, 8.0),
        (0.0, 14.0),
        (12.0, 8.0),
    ];
    OFFSETS
        .iter()
        .map(|(dx, dy)| DebrisPiece {
            x: x + dx,
            y: y + dy,
            color: color.to_string(),
        })
        .collect()
}

impl PlayerInternal {
    pub(super) fn fighter(&self) -> Fighter {
        Fighter {
            aggressive: self.pvp_timer > 0,
            invulnerable: self.invuln_timer > 0,
        }
    }
}

impl Room {
    pub(super) fn apply_pickup(&mut self, idx: usize) {
        let (col, row) = self.players[idx].mover.cell();
        let Some(tile) = self.grid.take_consumable(col, row) else {
            return;
        };
        self.diff.cleared.push((col as usize, row));
        let (x, y) = (self.players[idx].mover.x, self.players[idx].mover.y);

        match tile {
            Tile::Dot => {
                self.players[idx].stats.dots += 1;
                self.award(idx, DOT_POINTS);
            }
            Tile::Power => {
                self.frightened_timer = POWER_MODE_DURATION;
                self.sound(SoundCue::Power);
                self.award(idx, POWER_POINTS);
            }
            Tile::Fruit(tier) => {
                self.players[idx].stats.fruits += 1;
                self.popup(x, y, format!("+{}", tier.points()), "#FF8800");
                self.sound(SoundCue::Fruit);
                self.award(idx, tier.points());
            }
            Tile::Evil => {
                self.players[idx].pvp_timer = PVP_MODE_DURATION;
                self.popup(x, y, "EVIL MODE!", "#FF0000");
                self.sound(SoundCue::Power);
            }
            Tile::Heart => {
                if self.players[idx].lives < MAX_LIVES {
                    self.players[idx].lives += 1;
                    self.popup(x, y, "1UP", "#FF69B4");
                    self.sound(SoundCue::BonusLife);
                } else {
                    self.popup(x, y, format!("+{HEART_BONUS_POINTS}"), "#FF69B4");
                    self.award(idx, HEART_BONUS_POINTS);
                }
            }
            Tile::Empty | Tile::Wall | Tile::BossMarker => {}
        }
    }

    pub(super) fn award(&mut self, idx: usize, points: u64) {
        self.players[idx].score += points;
        self.check_milestones(idx);
    }

    fn check_milestones(&mut self, idx: usize) {
        let reached = self.players[idx].score / MILESTONE_INTERVAL;
        if reached <= self.players[idx].milestones {
            return;
        }
        let (x, y) = (self.players[idx].mover.x, self.players[idx].mover.y);
        {
            let player = &mut self.players[idx];
            let gained = reached - player.milestones;
            player.milestones = reached;
            player.lives = (player.lives as u64 + gained).min(MAX_LIVES as u64) as u32;
        }
        self.popup(x, y - TILE_SIZE, "BONUS LIFE", "#00FF00");
        self.sound(SoundCue::BonusLife);

        if reached > self.global_milestone {
            self.global_milestone = reached;
            self.hyper_timer = HYPER_SPEED_TICKS;
            let player = &mut self.players[idx];
            player.invuln_timer = player.invuln_timer.max(HYPER_SPEED_TICKS);
            self.popup(x, y, "HYPER SPEED!", "#FFFFFF");
            self.sound(SoundCue::Milestone);
        }
    }

    pub(super) fn resolve_pvp(&mut self) {
        let radius_sq = PVP_CONTACT_RADIUS * PVP_CONTACT_RADIUS;
        let count = self.players.len();
        for first in 0..count {
            for second in first + 1..count {
                let (a, b) = (&self.players[first], &self.players[second]);
                if !a.is_active() || !b.is_active() {
                    continue;
                }
                if squared_distance(a.mover.x, a.mover.y, b.mover.x, b.mover.y) >= radius_sq {
                    continue;
                }
                match clash(a.fighter(), b.fighter()) {
                    Clash::FirstWins => self.devour(first, second),
                    Clash::SecondWins => self.devour(second, first),
                    Clash::NoEffect => {}
                }
            }
        }
    }

    fn devour(&mut self, attacker: usize, victim: usize) {
        let stolen = std::mem::take(&mut self.players[victim].score);
        let (x, y) = (self.players[victim].mover.x, self.players[victim].mover.y);
        self.players[attacker].stats.players_eaten += 1;
        self.popup(x, y, "ATE PLAYER!", "#FF0000");
        self.lose_life(victim);
        self.award(attacker, stolen);
    }

    pub(super) fn lose_life(&mut self, idx: usize) {
        let player = &mut self.players[idx];
        if !player.is_active() {
            return;
        }
        player.lives = player.lives.saturating_sub(1);
        player.death_timer = DEATH_ANIMATION_TICKS;
        player.pvp_timer = 0;
        player.queued = Direction::None;
        player.mover.halt();
        player.stats.deaths += 1;
        let pieces = debris_burst(player.mover.x, player.mover.y, PLAYER_COLORS[player.color_idx]);
        self.sound(SoundCue::Death);
        self.events.push(RoomEvent::Debris { pieces });
    }

    // Runs when the death animation ends.
    pub(super) fn finish_death(&mut self, idx: usize) {
        if self.players[idx].lives > 0 {
            self.respawn(idx);
            return;
        }
        let player = &mut self.players[idx];
        player.alive = false;
        if player.game_over_sent {
            return;
        }
        player.game_over_sent = true;
        let summary = GameOverSummary {
            player_id: player.id.clone(),
            name: player.name.clone(),
            color_idx: player.color_idx,
            score: player.score,
            stats: player.stats,
            rank: None,
        };
        tracing::info!(
            room = %self.id,
            player = %summary.player_id,
            score = summary.score,
            "player out of lives"
        );
        self.game_overs.push(summary);
    }

    fn respawn(&mut self, idx: usize) {
        let (col, row) = self.pick_respawn_cell();
        let player = &mut self.players[idx];
        player.mover = Mover::at_cell(col, row);
        player.queued = Direction::None;
        player.invuln_timer = RESPAWN_INVULN_TICKS;
        player.pvp_timer = 0;
        self.game_speed = (self.game_speed * RESPAWN_SPEED_DAMPING).max(CAMERA_START_SPEED);
    }

    // Random open cell near mid-screen away from enemies; falls back to a deterministic scan.
    pub(super) fn pick_respawn_cell(&mut self) -> (i32, i32) {
        let center_row = ((self.camera_y + VIEW_HEIGHT / 2.0) / TILE_SIZE).floor() as i32;
        let max_col = MAP_WIDTH as i32 - 3;
        for _ in 0..RESPAWN_ATTEMPTS {
            let col = self.rng.int(2, max_col);
            let row = center_row + self.rng.int(-RESPAWN_ROW_SPREAD, RESPAWN_ROW_SPREAD);
            if self.is_safe_respawn_cell(col, row) {
                return (col, row);
            }
        }

        let mut open_fallback = None;
        for offset in 0..=RESPAWN_ROW_SPREAD {
            for row in [center_row - offset, center_row + offset] {
                for col in 2..=max_col {
                    if self.is_safe_respawn_cell(col, row) {
                        return (col, row);
                    }
                    if open_fallback.is_none() && !self.grid.is_wall(col, row) {
                        open_fallback = Some((col, row));
                    }
                }
            }
        }
        if let Some(cell) = open_fallback {
            return cell;
        }

        // Carve the centre pair so the row stays mirrored.
        let col = MAP_WIDTH / 2;
        let carved_left = self.grid.set(col - 1, center_row, Tile::Empty);
        let carved_right = self.grid.set(col, center_row, Tile::Empty);
        if carved_left || carved_right {
            self.diff.rows.insert(center_row);
        }
        (col as i32, center_row)
    }

    fn is_safe_respawn_cell(&self, col: i32, row: i32) -> bool {
        if self.grid.is_wall(col, row) {
            return false;
        }
        let (x, y) = (col as f64 * TILE_SIZE, row as f64 * TILE_SIZE);
        let min_sq = RESPAWN_SAFE_DISTANCE * RESPAWN_SAFE_DISTANCE;
        self.ghosts
            .iter()
            .filter(|ghost| !ghost.dead)
            .all(|ghost| squared_distance(x, y, ghost.mover.x, ghost.mover.y) >= min_sq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ghost_system::GhostInternal;
    use crate::engine::test_support::{open_rows, place_player, running_room, set_tile, view_middle_row};
    use crate::engine::RoomPhase;
    use crate::types::FruitTier;

    #[test]
    fn clash_rule_table() {
        let plain = Fighter {
            aggressive: false,
            invulnerable: false,
        };
        let aggressor = Fighter {
            aggressive: true,
            invulnerable: false,
        };
        let shielded = Fighter {
            aggressive: false,
            invulnerable: true,
        };
        assert_eq!(clash(aggressor, plain), Clash::FirstWins);
        assert_eq!(clash(plain, aggressor), Clash::SecondWins);
        assert_eq!(clash(aggressor, shielded), Clash::NoEffect);
        assert_eq!(clash(plain, plain), Clash::NoEffect);
        assert_eq!(clash(aggressor, aggressor), Clash::FirstWins);
    }

    #[test]
    fn aggressor_on_same_cell_takes_victims_score() {
        let mut room = running_room(2, 31);
        place_player(&mut room, 0, 6, 22);
        place_player(&mut room, 1, 6, 22);
        room.players[0].score = 300;
        room.players[0].pvp_timer = 100;
        room.players[1].score = 1_234;
        room.players[1].invuln_timer = 0;

        room.resolve_pvp();

        assert_eq!(room.players[0].score, 1_534);
        assert_eq!(room.players[1].score, 0);
        assert_eq!(room.players[1].death_timer, DEATH_ANIMATION_TICKS);
        assert_eq!(room.players[1].lives, MAX_LIVES - 1);
        assert_eq!(room.players[0].stats.players_eaten, 1);
    }

    #[test]
    fn invulnerable_victim_is_left_alone() {
        let mut room = running_room(2, 32);
        place_player(&mut room, 0, 6, 22);
        place_player(&mut room, 1, 6, 22);
        room.players[0].pvp_timer = 100;
        room.players[1].invuln_timer = 30;
        room.players[1].score = 50;
        room.resolve_pvp();
        assert_eq!(room.players[1].score, 50);
        assert_eq!(room.players[1].death_timer, 0);
    }

    #[test]
    fn last_life_ends_in_single_game_over() {
        let mut room = running_room(2, 33);
        room.players[0].lives = 1;
        room.players[0].score = 420;
        room.lose_life(0);
        assert_eq!(room.players[0].lives, 0);

        for _ in 0..DEATH_ANIMATION_TICKS + 60 {
            let row = view_middle_row(&room);
            place_player(&mut room, 1, 0, row);
            room.step();
        }
        assert!(!room.players[0].alive);
        assert_eq!(room.players[0].lives, 0);
        assert_eq!(room.game_overs.len(), 1);
        assert_eq!(room.game_overs[0].score, 420);
        assert_eq!(room.phase(), RoomPhase::Running);

        room.finish_death(0);
        assert_eq!(room.game_overs.len(), 1);
    }

    #[test]
    fn respawn_lands_on_open_cell_away_from_ghosts() {
        let mut room = running_room(2, 34);
        room.game_speed = 1.0;
        let middle = view_middle_row(&room);
        open_rows(&mut room, middle - 4, middle + 4);
        room.ghosts.push(GhostInternal::new(6, middle, "red"));
        room.lose_life(0);

        for _ in 0..DEATH_ANIMATION_TICKS {
            let row = view_middle_row(&room);
            place_player(&mut room, 1, 0, row);
            room.step();
        }
        let player = &room.players[0];
        assert!(player.is_active());
        assert_eq!(player.lives, MAX_LIVES - 1);
        assert_eq!(player.invuln_timer, RESPAWN_INVULN_TICKS);
        let (col, row) = player.mover.cell();
        assert!(!room.grid.is_wall(col, row));
        let ghost = &room.ghosts[0].mover;
        let distance_sq = squared_distance(player.mover.x, player.mover.y, ghost.x, ghost.y);
        // The ghost gets one move after the respawn inside the same tick.
        let slack = RESPAWN_SAFE_DISTANCE - TILE_SIZE / 2.0;
        assert!(distance_sq >= slack * slack);
        assert!(room.game_speed < 1.0);
        assert!(room.game_speed >= CAMERA_START_SPEED);
    }

    #[test]
    fn respawn_scan_falls_back_when_random_draws_fail() {
        let mut room = running_room(1, 35);
        let middle = view_middle_row(&room);
        for row in middle - RESPAWN_ROW_SPREAD..=middle + RESPAWN_ROW_SPREAD {
            for col in 1..MAP_WIDTH - 1 {
                set_tile(&mut room, col, row, Tile::Wall);
            }
        }
        set_tile(&mut room, 15, middle + 2, Tile::Dot);
        assert_eq!(room.pick_respawn_cell(), (15, middle + 2));
    }

    #[test]
    fn hearts_cap_lives_and_convert_to_points() {
        let mut room = running_room(1, 36);
        place_player(&mut room, 0, 6, 22);
        set_tile(&mut room, 6, 22, Tile::Heart);
        room.apply_pickup(0);
        assert_eq!(room.players[0].lives, MAX_LIVES);
        assert_eq!(room.players[0].score, HEART_BONUS_POINTS);

        room.players[0].lives = 1;
        set_tile(&mut room, 6, 22, Tile::Heart);
        room.apply_pickup(0);
        assert_eq!(room.players[0].lives, 2);
        assert_eq!(room.players[0].score, HEART_BONUS_POINTS);
        assert_eq!(room.diff.cleared.len(), 2);
    }

    #[test]
    fn evil_and_fruit_tiles_apply_their_effects() {
        let mut room = running_room(1, 37);
        place_player(&mut room, 0, 6, 22);
        set_tile(&mut room, 6, 22, Tile::Evil);
        room.apply_pickup(0);
        assert_eq!(room.players[0].pvp_timer, PVP_MODE_DURATION);
        assert_eq!(room.players[0].score, 0);

        set_tile(&mut room, 6, 22, Tile::Fruit(FruitTier::Orange));
        room.apply_pickup(0);
        assert_eq!(room.players[0].score, FruitTier::Orange.points());
        assert_eq!(room.players[0].stats.fruits, 1);
        assert_eq!(room.grid.get(6, 22), Tile::Empty);
    }

    #[test]
    fn first_milestone_crossing_starts_hyper_speed_once() {
        let mut room = running_room(2, 38);
        room.players[0].lives = 2;
        room.players[0].score = MILESTONE_INTERVAL - DOT_POINTS;
        room.award(0, DOT_POINTS);
        assert_eq!(room.players[0].lives, 3);
        assert_eq!(room.hyper_timer, HYPER_SPEED_TICKS);
        assert!(room.players[0].invuln_timer >= HYPER_SPEED_TICKS);

        room.hyper_timer = 5;
        room.players[1].lives = 1;
        room.players[1].score = MILESTONE_INTERVAL - 5;
        room.award(1, DOT_POINTS);
        assert_eq!(room.players[1].lives, 2);
        assert_eq!(room.hyper_timer, 5);
        assert_eq!(room.players[1].invuln_timer, 0);

        room.award(1, DOT_POINTS);
        assert_eq!(room.players[1].lives, 2);
    }

    #[test]
    fn falling_below_the_view_costs_a_life() {
        let mut room = running_room(1, 39);
        let below = ((room.camera_y + VIEW_HEIGHT) / TILE_SIZE).ceil() as i32 + 1;
        open_rows(&mut room, below, below);
        place_player(&mut room, 0, 5, below);
        room.step();
        assert_eq!(room.players[0].death_timer, DEATH_ANIMATION_TICKS);
        assert_eq!(room.players[0].lives, MAX_LIVES - 1);
    }
}
