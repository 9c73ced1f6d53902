use crate::constants::{
    HAZARD_DEFER_TICKS, ROCKET_CYCLE_MAX_TICKS, ROCKET_CYCLE_MIN_TICKS, ROCKET_HIT_HALF_HEIGHT,
    ROCKET_HIT_HALF_WIDTH, ROCKET_SPEED, ROCKET_WARNING_TICKS, ROCKET_WAVES, ROCKET_WAVE_GAP_TICKS,
    TILE_SIZE, VIEW_HEIGHT,
};
use crate::rng::RandomSource;
use crate::types::{PointView, RocketPayload, RocketWarningView, SoundCue};

use super::utils::within_box;
use super::Room;

// Each wave lights one of these column sets. All of them are left/right symmetric.
const COLUMN_GROUPS: [[usize; 4]; 5] = [
    [2, 6, 13, 17],
    [3, 7, 12, 16],
    [1, 5, 14, 18],
    [4, 8, 11, 15],
    [2, 9, 10, 17],
];

const ROCKET_CULL_MARGIN: f64 = 2.0 * TILE_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct RocketWarning {
    pub(super) column: usize,
    pub(super) ticks_left: u32,
}

#[derive(Clone, Debug, Default)]
pub(super) struct RocketWave {
    pub(super) next_cycle_frame: u64,
    pub(super) active: bool,
    pub(super) waves_remaining: u32,
    pub(super) next_wave_frame: u64,
    pub(super) warnings: Vec<RocketWarning>,
    pub(super) rockets: Vec<(f64, f64)>,
}

impl RocketWave {
    pub(super) fn new(rng: &mut dyn RandomSource, now_frame: u64) -> Self {
        let mut wave = Self::default();
        wave.schedule(rng, now_frame);
        wave
    }

    fn schedule(&mut self, rng: &mut dyn RandomSource, now_frame: u64) {
        self.next_cycle_frame =
            now_frame + rng.int(ROCKET_CYCLE_MIN_TICKS, ROCKET_CYCLE_MAX_TICKS) as u64;
    }

    pub(super) fn is_active(&self) -> bool {
        self.active
    }

    pub(super) fn payload(&self) -> RocketPayload {
        RocketPayload {
            warnings: self
                .warnings
                .iter()
                .map(|warning| RocketWarningView {
                    column: warning.column,
                    countdown: warning.ticks_left,
                })
                .collect(),
            rockets: self
                .rockets
                .iter()
                .map(|(x, y)| PointView { x: *x, y: *y })
                .collect(),
        }
    }

    fn stand_down(&mut self) {
        self.active = false;
        self.waves_remaining = 0;
        self.warnings.clear();
        self.rockets.clear();
    }

    fn burst_finished(&self) -> bool {
        self.waves_remaining == 0 && self.warnings.is_empty() && self.rockets.is_empty()
    }
}

impl Room {
    pub(super) fn update_rocket_wave(&mut self) {
        // A burst already in the air is called off once the boss shows up.
        if self.rocket.active && !self.boss.is_idle() {
            self.rocket.stand_down();
            self.rocket.schedule(self.rng.as_mut(), self.frame);
            tracing::debug!(room = %self.id, frame = self.frame, "rocket burst called off");
            return;
        }
        if !self.rocket.active {
            if self.frame < self.rocket.next_cycle_frame {
                return;
            }
            if self.surge.is_active() || !self.boss.is_idle() || self.train.is_active() {
                self.rocket.next_cycle_frame = self.frame + HAZARD_DEFER_TICKS;
                return;
            }
            self.rocket.active = true;
            self.rocket.waves_remaining = ROCKET_WAVES;
            self.rocket.next_wave_frame = self.frame;
            tracing::debug!(room = %self.id, frame = self.frame, "rocket burst starting");
        }

        if self.rocket.waves_remaining > 0 && self.frame >= self.rocket.next_wave_frame {
            self.post_rocket_warnings();
        }

        let launch_y = self.camera_y + VIEW_HEIGHT + TILE_SIZE;
        for warning in &mut self.rocket.warnings {
            warning.ticks_left = warning.ticks_left.saturating_sub(1);
            if warning.ticks_left == 0 {
                self.rocket
                    .rockets
                    .push((warning.column as f64 * TILE_SIZE, launch_y));
            }
        }
        self.rocket.warnings.retain(|warning| warning.ticks_left > 0);

        let ceiling = self.camera_y - ROCKET_CULL_MARGIN;
        for rocket in &mut self.rocket.rockets {
            rocket.1 -= ROCKET_SPEED;
        }
        self.rocket.rockets.retain(|(_, y)| *y >= ceiling);
        self.resolve_rocket_contacts();

        if self.rocket.burst_finished() {
            self.rocket.active = false;
            self.rocket.schedule(self.rng.as_mut(), self.frame);
        }
    }

    fn post_rocket_warnings(&mut self) {
        let group = COLUMN_GROUPS[self.rng.pick_index(COLUMN_GROUPS.len())];
        self.rocket
            .warnings
            .extend(group.iter().map(|column| RocketWarning {
                column: *column,
                ticks_left: ROCKET_WARNING_TICKS,
            }));
        self.rocket.waves_remaining -= 1;
        self.rocket.next_wave_frame = self.frame + ROCKET_WAVE_GAP_TICKS;
        self.sound(SoundCue::RocketAlarm);
    }

    fn resolve_rocket_contacts(&mut self) {
        for idx in 0..self.players.len() {
            let player = &self.players[idx];
            if !player.is_active() || player.invuln_timer > 0 {
                continue;
            }
            let (px, py) = (player.mover.x, player.mover.y);
            let hit = self.rocket.rockets.iter().any(|(x, y)| {
                within_box(px, py, *x, *y, ROCKET_HIT_HALF_WIDTH, ROCKET_HIT_HALF_HEIGHT)
            });
            if hit {
                self.lose_life(idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEATH_ANIMATION_TICKS, MAX_LIVES};
    use crate::engine::boss::BossState;
    use crate::engine::surge::SurgeState;
    use crate::engine::test_support::{pin_player, place_player, running_room, running_room_with};
    use crate::engine::RoomOptions;
    use crate::types::RoomEvent;

    fn tick_hazards(room: &mut Room) {
        room.frame += 1;
        room.update_rocket_wave();
        room.update_floor_surge();
    }

    fn alarms(room: &Room) -> usize {
        room.events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    RoomEvent::Sound {
                        cue: SoundCue::RocketAlarm
                    }
                )
            })
            .count()
    }

    #[test]
    fn burst_posts_three_waves_then_goes_dormant() {
        let mut room = running_room(1, 70);
        place_player(&mut room, 0, 0, 10);
        room.rocket.next_cycle_frame = room.frame;
        room.update_rocket_wave();
        assert!(room.rocket.is_active());
        assert_eq!(room.rocket.warnings.len(), 4);
        assert_eq!(room.rocket.warnings[0].ticks_left, ROCKET_WARNING_TICKS - 1);

        for _ in 0..ROCKET_WARNING_TICKS {
            room.frame += 1;
            room.update_rocket_wave();
        }
        assert!(!room.rocket.rockets.is_empty());

        let mut ticks = 0;
        while room.rocket.is_active() {
            room.frame += 1;
            room.update_rocket_wave();
            ticks += 1;
            assert!(ticks < 1_000, "burst never finished");
        }
        assert_eq!(alarms(&room), ROCKET_WAVES as usize);
        assert!(room.rocket.next_cycle_frame >= room.frame + ROCKET_CYCLE_MIN_TICKS as u64);
        assert!(room.rocket.next_cycle_frame <= room.frame + ROCKET_CYCLE_MAX_TICKS as u64);
        assert_eq!(room.players[0].lives, MAX_LIVES);
    }

    #[test]
    fn deferred_while_floor_is_raised() {
        let mut room = running_room(1, 71);
        room.surge.state = SurgeState::Rising { elapsed: 10 };
        room.rocket.next_cycle_frame = room.frame;
        room.update_rocket_wave();
        assert!(!room.rocket.is_active());
        assert_eq!(room.rocket.next_cycle_frame, room.frame + HAZARD_DEFER_TICKS);
    }

    #[test]
    fn rocket_contact_costs_a_life_unless_invulnerable() {
        let mut room = running_room(2, 72);
        place_player(&mut room, 0, 5, 10);
        place_player(&mut room, 1, 7, 10);
        room.players[1].invuln_timer = 30;
        room.rocket.active = true;
        room.rocket.rockets = vec![
            (5.0 * TILE_SIZE, 10.0 * TILE_SIZE + ROCKET_SPEED),
            (7.0 * TILE_SIZE, 10.0 * TILE_SIZE + ROCKET_SPEED),
        ];
        room.update_rocket_wave();
        assert_eq!(room.players[0].death_timer, DEATH_ANIMATION_TICKS);
        assert_eq!(room.players[1].lives, MAX_LIVES);
    }

    #[test]
    fn rocket_and_surge_windows_never_overlap() {
        for seed in [1_u32, 7, 99, 4_242] {
            let mut room = running_room(1, seed);
            let mut surges = 0;
            let mut bursts = 0;
            for _ in 0..20_000 {
                let (rocket_before, surge_before) = (room.rocket.is_active(), room.surge.is_active());
                tick_hazards(&mut room);
                assert!(
                    !(room.rocket.is_active() && room.surge.is_active()),
                    "seed {seed}: overlap at frame {}",
                    room.frame
                );
                if !rocket_before && room.rocket.is_active() {
                    bursts += 1;
                }
                if !surge_before && room.surge.is_active() {
                    surges += 1;
                }
            }
            assert!(bursts > 0 && surges > 0, "seed {seed}: hazards never fired");
        }
    }

    #[test]
    fn boss_warning_calls_off_running_hazards() {
        let options = RoomOptions {
            ghost_spawning: false,
            hazards: true,
        };
        let mut room = running_room_with(1, 73, options);
        room.rocket.next_cycle_frame = room.frame;
        room.update_rocket_wave();
        assert!(room.rocket.is_active());
        assert!(!room.rocket.warnings.is_empty());

        room.boss.begin_warning(room.corridor.next_row);
        for _ in 0..600 {
            let y = room.camera_y + VIEW_HEIGHT / 2.0;
            pin_player(&mut room, 0, 0.0, y);
            room.players[0].invuln_timer = 10;
            room.step();
            if !room.boss.is_idle() {
                assert!(
                    !room.rocket.is_active() && !room.surge.is_active(),
                    "hazard running during {:?} at frame {}",
                    room.boss.phase(),
                    room.frame
                );
            }
        }
        assert!(room.rocket.warnings.is_empty());
        assert!(room.rocket.rockets.is_empty());

        room.boss.state = BossState::PreAttack { ticks_left: 30 };
        room.surge.state = SurgeState::Rising { elapsed: 5 };
        room.update_floor_surge();
        assert!(!room.surge.is_active());
        assert_eq!(room.surge.height(), 0.0);
        assert!(room.surge.next_trigger_frame > room.frame);
    }
}
