use crate::constants::{MAP_WIDTH, TILE_SIZE};
use crate::rng::Rng;
use crate::types::{Direction, Tile};
use crate::world::boundary_row;

use super::{Room, RoomOptions, RoomPhase};

pub(crate) fn quiet_options() -> RoomOptions {
    RoomOptions {
        ghost_spawning: false,
        hazards: false,
    }
}

// Started room with the countdown skipped. Players are p1..pN, p1 hosts.
pub(crate) fn running_room(player_count: usize, seed: u32) -> Room {
    running_room_with(player_count, seed, quiet_options())
}

pub(crate) fn running_room_with(player_count: usize, seed: u32, options: RoomOptions) -> Room {
    let mut room = Room::new("TEST1", "p1", Box::new(Rng::new(seed)), options);
    for idx in 0..player_count {
        room.add_player(&format!("p{}", idx + 1), &format!("P{}", idx + 1))
            .expect("seat available");
    }
    room.start("p1").expect("host can start");
    room.phase = RoomPhase::Running;
    room
}

// Replaces rows with side walls and an empty interior.
pub(crate) fn open_rows(room: &mut Room, first_row: i32, last_row: i32) {
    for row in first_row..=last_row {
        room.grid.insert_row(row, boundary_row());
    }
}

pub(crate) fn set_tile(room: &mut Room, col: usize, row: i32, tile: Tile) {
    if !room.grid.contains_row(row) {
        room.grid.insert_row(row, boundary_row());
    }
    assert!(col < MAP_WIDTH);
    room.grid.set(col, row, tile);
}

pub(crate) fn place_player(room: &mut Room, idx: usize, col: i32, row: i32) {
    let player = &mut room.players[idx];
    player.mover.x = col as f64 * TILE_SIZE;
    player.mover.y = row as f64 * TILE_SIZE;
    player.mover.heading = Direction::None;
    player.queued = Direction::None;
}

pub(crate) fn pin_player(room: &mut Room, idx: usize, x: f64, y: f64) {
    let player = &mut room.players[idx];
    player.mover.x = x;
    player.mover.y = y;
    player.mover.heading = Direction::None;
}

// Row index of the vertical middle of the current view.
pub(crate) fn view_middle_row(room: &Room) -> i32 {
    ((room.camera_y + 400.0) / TILE_SIZE).floor() as i32
}
