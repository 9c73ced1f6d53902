use crate::constants::{CAMERA_MAX_SPEED, CAMERA_START_SPEED, TILE_SIZE};
use crate::types::Direction;

// Pixel-space body that runs along the tile lattice.
#[derive(Clone, Debug)]
pub(super) struct Mover {
    pub(super) x: f64,
    pub(super) y: f64,
    pub(super) heading: Direction,
    pub(super) speed: f64,
}

impl Mover {
    pub(super) fn at_cell(col: i32, row: i32) -> Self {
        Self {
            x: col as f64 * TILE_SIZE,
            y: row as f64 * TILE_SIZE,
            heading: Direction::None,
            speed: 0.0,
        }
    }

    pub(super) fn cell(&self) -> (i32, i32) {
        (
            (self.x / TILE_SIZE).round() as i32,
            (self.y / TILE_SIZE).round() as i32,
        )
    }

    pub(super) fn velocity(&self) -> (f64, f64) {
        let (dx, dy) = self.heading.delta();
        (dx as f64 * self.speed, dy as f64 * self.speed)
    }

    // Within half a step of the nearest cell centre on both axes.
    pub(super) fn is_near_center(&self, speed: f64) -> bool {
        let (col, row) = self.cell();
        let tolerance = speed / 2.0;
        (self.x - col as f64 * TILE_SIZE).abs() <= tolerance
            && (self.y - row as f64 * TILE_SIZE).abs() <= tolerance
    }

    pub(super) fn snap_to(&mut self, col: i32, row: i32) {
        self.x = col as f64 * TILE_SIZE;
        self.y = row as f64 * TILE_SIZE;
    }

    pub(super) fn halt(&mut self) {
        self.heading = Direction::None;
    }
}

pub(super) fn ramp_fraction(game_speed: f64) -> f64 {
    ((game_speed - CAMERA_START_SPEED) / (CAMERA_MAX_SPEED - CAMERA_START_SPEED)).clamp(0.0, 1.0)
}

pub(super) fn lerp_speed(start: f64, max: f64, ramp: f64) -> f64 {
    start + (max - start) * ramp.clamp(0.0, 1.0)
}

// One tick of grid-snap-and-turn movement shared by players and enemies.
// A queued turn is taken at an intersection if the next cell is open; a heading into a blocked cell stops the body there.
pub(super) fn advance<F>(mover: &mut Mover, queued: &mut Direction, speed: f64, blocked: F)
where
    F: Fn(i32, i32) -> bool,
{
    mover.speed = speed;
    if mover.is_near_center(speed) {
        let (col, row) = mover.cell();
        if *queued != Direction::None {
            let (dx, dy) = queued.delta();
            if !blocked(col + dx, row + dy) {
                mover.snap_to(col, row);
                mover.heading = *queued;
                *queued = Direction::None;
            }
        }
        if mover.heading != Direction::None {
            let (dx, dy) = mover.heading.delta();
            if blocked(col + dx, row + dy) {
                mover.snap_to(col, row);
                mover.halt();
            }
        }
    }
    let (vx, vy) = mover.velocity();
    mover.x += vx;
    mover.y += vy;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walls(cells: &'static [(i32, i32)]) -> impl Fn(i32, i32) -> bool {
        move |col, row| cells.contains(&(col, row))
    }

    #[test]
    fn speed_interpolates_with_scroll_ramp() {
        assert_eq!(ramp_fraction(CAMERA_START_SPEED), 0.0);
        assert_eq!(ramp_fraction(CAMERA_MAX_SPEED), 1.0);
        assert_eq!(ramp_fraction(0.1), 0.0);
        let mid = (CAMERA_START_SPEED + CAMERA_MAX_SPEED) / 2.0;
        assert!((lerp_speed(2.0, 3.0, ramp_fraction(mid)) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn queued_turn_waits_for_intersection() {
        let mut mover = Mover::at_cell(5, 5);
        mover.heading = Direction::Right;
        mover.x += 10.0;
        let mut queued = Direction::Up;
        advance(&mut mover, &mut queued, 2.0, walls(&[]));
        assert_eq!(mover.heading, Direction::Right);
        assert_eq!(queued, Direction::Up);
        assert!((mover.x - (5.0 * TILE_SIZE + 12.0)).abs() < 1e-9);
    }

    #[test]
    fn queued_turn_snaps_and_turns_at_center() {
        let mut mover = Mover::at_cell(5, 5);
        mover.heading = Direction::Right;
        mover.x += 0.6;
        let mut queued = Direction::Up;
        advance(&mut mover, &mut queued, 2.0, walls(&[]));
        assert_eq!(mover.heading, Direction::Up);
        assert_eq!(queued, Direction::None);
        assert_eq!(mover.x, 5.0 * TILE_SIZE);
        assert_eq!(mover.y, 5.0 * TILE_SIZE - 2.0);
    }

    #[test]
    fn blocked_turn_stays_queued_and_wall_stops_motion() {
        let mut mover = Mover::at_cell(5, 5);
        mover.heading = Direction::Right;
        let mut queued = Direction::Up;
        advance(&mut mover, &mut queued, 2.0, walls(&[(5, 4), (6, 5)]));
        assert_eq!(queued, Direction::Up);
        assert_eq!(mover.heading, Direction::None);
        assert_eq!(mover.cell(), (5, 5));
        assert_eq!(mover.velocity(), (0.0, 0.0));
    }

    #[test]
    fn fractional_speed_still_hits_every_center() {
        let mut mover = Mover::at_cell(0, 0);
        mover.heading = Direction::Right;
        let mut queued = Direction::None;
        let mut centers_seen = 0;
        let speed = 2.35;
        for _ in 0..200 {
            if mover.is_near_center(speed) {
                centers_seen += 1;
            }
            advance(&mut mover, &mut queued, speed, walls(&[]));
        }
        let cells_crossed = (mover.x / TILE_SIZE).floor() as i32;
        assert!(centers_seen >= cells_crossed);
    }
}
