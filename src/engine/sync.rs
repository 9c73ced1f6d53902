use std::collections::BTreeSet;

use crate::constants::TICK_RATE;
use crate::types::{FullGrid, GameOverSummary, GridPatch, RowPatch, Snapshot};

use super::{Room, RoomPhase};

// Grid changes since the last broadcast.
#[derive(Clone, Debug, Default)]
pub(super) struct PendingDiff {
    pub(super) rows: BTreeSet<i32>,
    pub(super) cleared: Vec<(usize, i32)>,
}

impl Room {
    /// Builds the periodic state broadcast and drains the pending grid diff and event queue.
    ///
    /// Rows generated since the last call travel whole; a cleared cell is only listed when its
    /// row was already known to clients and is still retained.
    pub fn build_snapshot(&mut self, timestamp: u64) -> Snapshot {
        let diff = std::mem::take(&mut self.diff);
        let rows: Vec<RowPatch> = diff
            .rows
            .iter()
            .filter_map(|row| self.grid.row_patch(*row))
            .collect();
        let cleared = diff
            .cleared
            .into_iter()
            .filter(|(_, row)| !diff.rows.contains(row) && self.grid.contains_row(*row))
            .collect();

        let countdown = match self.phase {
            RoomPhase::Countdown { ticks_left } => ticks_left as f64 / TICK_RATE as f64,
            RoomPhase::Lobby | RoomPhase::Running => 0.0,
        };

        Snapshot {
            timestamp,
            frame: self.frame,
            camera_y: self.camera_y,
            game_speed: self.game_speed,
            countdown,
            players: self.players.iter().map(|player| player.view()).collect(),
            ghosts: self.ghosts.iter().map(|ghost| ghost.view()).collect(),
            frightened_timer: self.frightened_timer,
            hyper_timer: self.hyper_timer,
            rockets: self.rocket.payload(),
            surge: self.surge.payload(),
            train: self.train.payload(),
            boss: self.boss.payload(),
            patch: GridPatch { rows, cleared },
            events: std::mem::take(&mut self.events),
        }
    }

    // Sent once when a match starts and again on a client resync request.
    pub fn build_full_grid(&self) -> FullGrid {
        FullGrid {
            rows: self
                .grid
                .rows()
                .filter_map(|(row, _)| self.grid.row_patch(row))
                .collect(),
        }
    }

    pub fn drain_game_overs(&mut self) -> Vec<GameOverSummary> {
        std::mem::take(&mut self.game_overs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::constants::{COUNTDOWN_TICKS, MAP_WIDTH, TILE_SIZE};
    use crate::engine::test_support::{pin_player, running_room, view_middle_row};
    use crate::engine::RoomOptions;
    use crate::rng::FixedRng;
    use crate::types::Tile;

    #[test]
    fn snapshot_drains_diff_and_events() {
        let mut room = running_room(1, 90);
        for _ in 0..2_000 {
            let y = room.camera_y + 400.0;
            pin_player(&mut room, 0, 0.0, y);
            room.step();
        }
        room.sound(crate::types::SoundCue::Fruit);
        let first = room.build_snapshot(1_000);
        assert!(!first.patch.rows.is_empty());
        assert!(first.events.iter().any(|event| matches!(
            event,
            crate::types::RoomEvent::Sound {
                cue: crate::types::SoundCue::Fruit
            }
        )));
        assert_eq!(first.frame, 2_000);

        let second = room.build_snapshot(1_016);
        assert!(second.patch.rows.is_empty());
        assert!(second.patch.cleared.is_empty());
        assert!(second.events.is_empty());
    }

    #[test]
    fn cleared_cells_skip_new_and_evicted_rows() {
        let mut room = running_room(1, 91);
        room.diff.rows.insert(5);
        room.diff.cleared = vec![(3, 5), (4, 22), (2, 9_999)];
        let snapshot = room.build_snapshot(0);
        assert_eq!(snapshot.patch.cleared, vec![(4, 22)]);
        assert_eq!(snapshot.patch.rows.len(), 1);
        assert_eq!(snapshot.patch.rows[0].row, 5);
    }

    #[test]
    fn countdown_is_reported_in_seconds() {
        let mut room = Room::new("CNTDN", "p1", Box::new(FixedRng(0.5)), RoomOptions::default());
        room.add_player("p1", "host").expect("seat available");
        room.start("p1").expect("host starts");
        let snapshot = room.build_snapshot(0);
        assert_eq!(snapshot.countdown, COUNTDOWN_TICKS as f64 / TICK_RATE as f64);
        assert!(snapshot.patch.rows.is_empty());
    }

    #[test]
    fn full_grid_then_patches_reproduce_the_server_grid() {
        let mut room = running_room(1, 92);
        let mut client: BTreeMap<i32, Vec<u8>> = room
            .build_full_grid()
            .rows
            .into_iter()
            .map(|patch| (patch.row, patch.cells))
            .collect();
        assert_eq!(client.len(), room.grid.len());

        for tick in 0..2_400_usize {
            // Hop across the middle row so pickups get eaten every tick.
            let col = 1 + tick % (MAP_WIDTH - 2);
            let row = view_middle_row(&room);
            pin_player(&mut room, 0, col as f64 * TILE_SIZE, row as f64 * TILE_SIZE);
            room.players[0].invuln_timer = 10;
            room.step();
            if room.should_broadcast() {
                let snapshot = room.build_snapshot(tick as u64);
                for patch in snapshot.patch.rows {
                    client.insert(patch.row, patch.cells);
                }
                for (col, row) in snapshot.patch.cleared {
                    if let Some(cells) = client.get_mut(&row) {
                        cells[col] = Tile::Empty.code();
                    }
                }
            }
        }
        let last = room.build_snapshot(2_400);
        for patch in last.patch.rows {
            client.insert(patch.row, patch.cells);
        }
        for (col, row) in last.patch.cleared {
            if let Some(cells) = client.get_mut(&row) {
                cells[col] = Tile::Empty.code();
            }
        }

        assert!(room.players[0].stats.dots > 0);
        for (row, cells) in room.grid.rows() {
            let expected: Vec<u8> = cells.iter().map(|tile| tile.code()).collect();
            assert_eq!(client.get(&row), Some(&expected), "row {row} diverged");
        }
    }

    #[test]
    fn game_overs_are_handed_out_once() {
        let mut room = running_room(1, 93);
        room.players[0].lives = 0;
        room.finish_death(0);
        assert_eq!(room.drain_game_overs().len(), 1);
        assert!(room.drain_game_overs().is_empty());
    }
}
