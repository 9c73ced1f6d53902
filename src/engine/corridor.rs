use crate::constants::{
    BOSS_TRIGGER_SCORE, EVIL_SPAWN_THRESHOLD, FRUIT_ROW_CHANCE, HEART_SPAWN_THRESHOLD,
    INITIAL_BOTTOM_ROW, MAP_WIDTH, MAX_RETAINED_ROWS, PATTERN_ROWS, ROW_RETENTION_MARGIN,
    TILE_SIZE, TRAIN_GAP_ROWS, TRAIN_MAX_PATTERNS, TRAIN_MIN_PATTERNS, TRAIN_PREROLL_ROWS,
};
use crate::rng::RandomSource;
use crate::types::{MusicCue, Tile};
use crate::world::{
    boss_marker_row, boundary_row, mirror_half, pattern_code_tile, pick_fruit_tier, HalfRow, Row,
    PATTERNS,
};

use super::Room;

// Cursor state for upward row generation. Evaluated once per row, never re-entered.
#[derive(Clone, Debug, Default)]
pub(super) struct CorridorState {
    pub(super) next_row: i32,
    pattern: Option<usize>,
    pattern_row: usize,
    gap_remaining: u32,
    patterns_since_train: u32,
    train_threshold: u32,
}

impl CorridorState {
    pub(super) fn new(rng: &mut dyn RandomSource) -> Self {
        Self {
            next_row: INITIAL_BOTTOM_ROW,
            pattern: None,
            pattern_row: 0,
            gap_remaining: 0,
            patterns_since_train: 0,
            train_threshold: draw_train_threshold(rng),
        }
    }

    pub(super) fn top_generated_row(&self) -> i32 {
        self.next_row + 1
    }

    pub(super) fn clear_pattern(&mut self) {
        self.pattern = None;
        self.pattern_row = 0;
    }

    fn pattern_exhausted(&self) -> bool {
        self.pattern.is_none() || self.pattern_row >= PATTERN_ROWS
    }
}

fn draw_train_threshold(rng: &mut dyn RandomSource) -> u32 {
    rng.int(TRAIN_MIN_PATTERNS, TRAIN_MAX_PATTERNS) as u32
}

impl Room {
    pub(super) fn generate_rows_through(&mut self, top_row: i32) {
        while self.corridor.next_row >= top_row {
            let row_index = self.corridor.next_row;
            self.generate_row(row_index);
            self.corridor.next_row -= 1;
        }
    }

    #[cfg(test)]
    pub(super) fn generate_next_row(&mut self) -> i32 {
        let row_index = self.corridor.next_row;
        self.generate_rows_through(row_index);
        row_index
    }

    fn generate_row(&mut self, row_index: i32) {
        self.check_boss_trigger(row_index);
        let cells = self.next_row_cells(row_index);
        self.grid.insert_row(row_index, cells);
        self.diff.rows.insert(row_index);

        let threshold = (self.camera_y / TILE_SIZE).floor() as i32 + ROW_RETENTION_MARGIN;
        for evicted in self.grid.prune(threshold, MAX_RETAINED_ROWS) {
            self.diff.rows.remove(&evicted);
        }
    }

    fn check_boss_trigger(&mut self, row_index: i32) {
        if self.boss.encountered || !self.boss.is_idle() {
            return;
        }
        if self.best_score() < BOSS_TRIGGER_SCORE {
            return;
        }
        self.boss.begin_warning(row_index);
        self.music(MusicCue::BossWarning);
        tracing::info!(room = %self.id, row = row_index, "boss warning");
    }

    fn next_row_cells(&mut self, row_index: i32) -> Row {
        if self.boss.is_anchor(row_index) {
            return boss_marker_row();
        }
        if self.boss.holds_arena() {
            return boundary_row();
        }
        if self.corridor.gap_remaining > 0 {
            return self.emit_gap_row(row_index);
        }
        if self.train.covers_row(row_index) {
            return boundary_row();
        }

        if self.corridor.pattern_exhausted() {
            if self.train_gap_due() {
                self.corridor.clear_pattern();
                self.corridor.patterns_since_train = 0;
                self.corridor.train_threshold = draw_train_threshold(self.rng.as_mut());
                self.corridor.gap_remaining = TRAIN_GAP_ROWS;
                return self.emit_gap_row(row_index);
            }
            self.corridor.pattern = Some(self.rng.pick_index(PATTERNS.len()));
            self.corridor.pattern_row = 0;
            self.corridor.patterns_since_train += 1;
        }

        let Some(pattern_idx) = self.corridor.pattern else {
            return boundary_row();
        };
        let pattern = &PATTERNS[pattern_idx];
        let source_row = PATTERN_ROWS - 1 - self.corridor.pattern_row;
        self.corridor.pattern_row += 1;
        let fruit_row = pattern.fruit_rows.contains(&source_row);
        self.populate_row(&pattern.rows[source_row], fruit_row)
    }

    fn emit_gap_row(&mut self, row_index: i32) -> Row {
        self.corridor.gap_remaining = self.corridor.gap_remaining.saturating_sub(1);
        if self.corridor.gap_remaining == TRAIN_PREROLL_ROWS {
            let direction = if self.rng.bool(0.5) { 1 } else { -1 };
            self.train.arm(row_index, direction);
            tracing::debug!(room = %self.id, row = row_index, direction, "train armed");
        }
        boundary_row()
    }

    fn train_gap_due(&self) -> bool {
        self.options.hazards
            && self.corridor.patterns_since_train >= self.corridor.train_threshold
            && self.boss.is_idle()
            && !self.train.is_active()
            && !self.rocket.is_active()
            && !self.surge.is_active()
    }

    fn populate_row(&mut self, half: &HalfRow, fruit_row: bool) -> Row {
        let codes = mirror_half(half);
        let mut cells = [Tile::Empty; MAP_WIDTH];
        for (col, code) in codes.iter().enumerate() {
            cells[col] = match pattern_code_tile(*code) {
                Some(tile) => tile,
                None => self.roll_pellet(),
            };
        }

        if fruit_row && self.rng.bool(FRUIT_ROW_CHANCE) {
            let open: Vec<usize> = (0..MAP_WIDTH)
                .filter(|col| cells[*col] == Tile::Dot)
                .collect();
            if !open.is_empty() {
                let col = open[self.rng.pick_index(open.len())];
                let roll = self.rng.next_f32();
                cells[col] = Tile::Fruit(pick_fruit_tier(self.best_score(), roll));
            }
        }
        cells
    }

    fn roll_pellet(&mut self) -> Tile {
        let roll = self.rng.next_f32();
        if roll < EVIL_SPAWN_THRESHOLD {
            Tile::Evil
        } else if roll < HEART_SPAWN_THRESHOLD {
            Tile::Heart
        } else {
            Tile::Dot
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::engine::test_support::{place_player, running_room, running_room_with, set_tile};
    use crate::engine::boss::BossState;
    use crate::engine::train::CrossingTrain;
    use crate::engine::{Room, RoomOptions};
    use crate::rng::{FixedRng, Rng};
    use crate::types::{BossPhase, RoomEvent};
    use crate::world::is_mirrored;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn every_retained_row_is_mirrored_and_window_is_bounded(seed in any::<u32>()) {
            let mut room = Room::new("PROP1", "p1", Box::new(Rng::new(seed)), RoomOptions::default());
            for _ in 0..40 {
                let target = room.corridor.next_row - 10;
                room.generate_rows_through(target);
                prop_assert!(room.grid.len() <= MAX_RETAINED_ROWS);
            }
            for (row, cells) in room.grid.rows() {
                prop_assert!(is_mirrored(cells), "row {} is not mirrored", row);
            }
        }
    }

    #[test]
    fn pattern_rows_are_consumed_bottom_first() {
        let mut room = running_room(1, 1);
        room.rng = Box::new(FixedRng(0.999));
        room.corridor.clear_pattern();
        let row = room.generate_next_row();

        let last = PATTERNS.len() - 1;
        let expected = mirror_half(&PATTERNS[last].rows[PATTERN_ROWS - 1]);
        let cells = room.grid.row(row).expect("row generated");
        for col in 0..MAP_WIDTH {
            assert_eq!(cells[col].is_wall(), expected[col] == 1, "column {col}");
        }
        assert!(room.diff.rows.contains(&row));
    }

    #[test]
    fn crossing_power_pickup_flips_boss_warning_once() {
        let mut room = running_room(1, 21);
        room.players[0].score = 4_999;
        place_player(&mut room, 0, 6, 22);
        set_tile(&mut room, 6, 22, Tile::Power);

        room.apply_pickup(0);
        assert_eq!(room.players[0].score, 5_049);
        assert_eq!(room.players[0].lives, 3);
        assert!(room.boss.is_idle());

        let anchor = room.generate_next_row();
        assert_eq!(room.boss.phase(), BossPhase::Warning);
        assert_eq!(room.grid.row(anchor), Some(&boss_marker_row()));
        for _ in 0..5 {
            room.generate_next_row();
        }
        let warnings = room
            .events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    RoomEvent::Music {
                        cue: MusicCue::BossWarning
                    }
                )
            })
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(room.boss.phase(), BossPhase::Warning);
    }

    #[test]
    fn exhausted_train_pacing_opens_gap_and_arms_train() {
        let mut room = running_room_with(1, 8, RoomOptions::default());
        // The opening rows may already have armed a train.
        room.train = CrossingTrain::default();
        room.corridor.gap_remaining = 0;
        room.corridor.clear_pattern();
        room.corridor.patterns_since_train = room.corridor.train_threshold;
        assert!(room.train_gap_due());

        let mut generated = Vec::new();
        for _ in 0..TRAIN_GAP_ROWS {
            generated.push(room.generate_next_row());
        }
        for row in &generated {
            assert_eq!(room.grid.row(*row), Some(&boundary_row()));
        }
        let target = generated[(TRAIN_GAP_ROWS - TRAIN_PREROLL_ROWS - 1) as usize];
        assert!(room.train.is_active());
        assert_eq!(room.train.target_row(), Some(target));
        assert!(room.train.covers_row(target - 1));
        assert!(room.train.covers_row(target + 1));
        assert_eq!(room.corridor.patterns_since_train, 0);

        let next = room.generate_next_row();
        assert_ne!(room.grid.row(next), Some(&boundary_row()));
    }

    #[test]
    fn boss_held_arena_emits_boundary_rows_only() {
        let mut room = running_room(1, 4);
        room.boss.state = BossState::PreAttack { ticks_left: 30 };
        let row = room.generate_next_row();
        assert_eq!(room.grid.row(row), Some(&boundary_row()));
    }

    #[test]
    fn pellet_roll_thresholds() {
        let mut room = running_room(1, 2);
        room.rng = Box::new(FixedRng(0.0));
        assert_eq!(room.roll_pellet(), Tile::Evil);
        room.rng = Box::new(FixedRng(0.001));
        assert_eq!(room.roll_pellet(), Tile::Heart);
        room.rng = Box::new(FixedRng(0.5));
        assert_eq!(room.roll_pellet(), Tile::Dot);
    }
}
