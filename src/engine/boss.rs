use crate::constants::{
    BOSS_BASE_OFFSET, BOSS_CHARGE_TICKS, BOSS_CONTACT_RADIUS, BOSS_DASH_SPEED,
    BOSS_DEFEAT_BONUS, BOSS_DEFEAT_DELAY_TICKS, BOSS_EDIBLE_CHANCE, BOSS_EDIBLE_POINTS,
    BOSS_ENTER_SPEED, BOSS_ERRATIC_INTERVAL, BOSS_ERRATIC_MAX_SPEED, BOSS_HP_MAX,
    BOSS_OFFSCREEN_MARGIN, BOSS_ORB_CHANCE, BOSS_ORB_POINTS, BOSS_PATROL_SPEED,
    BOSS_PRE_ATTACK_TICKS, BOSS_PROJECTILE_RADIUS, BOSS_RETURN_SPEED, BOSS_SHOOT_TICKS,
    BOSS_SHOT_INTERVAL, BOSS_SHOT_SPEED, BOSS_WARNING_TICKS, CAMERA_START_SPEED, MAP_WIDTH,
    POWER_MODE_DURATION, TILE_SIZE, VIEW_HEIGHT, WAVE_CLEAR_ROWS_PER_TICK,
};
use crate::types::{
    AttackPhase, BossPayload, BossPhase, BossProjectileView, MusicCue, ProjectileKind, RoomEvent,
    SoundCue,
};

use super::combat::{clash, debris_burst, Clash, Fighter};
use super::utils::squared_distance;
use super::Room;

const BOSS_COLOR: &str = "#B000FF";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) enum BossState {
    #[default]
    Idle,
    Warning {
        ticks_left: u32,
    },
    Entering,
    PreAttack {
        ticks_left: u32,
    },
    Active,
    Vulnerable,
    Defeated {
        ticks_left: u32,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) enum AttackState {
    #[default]
    Wait,
    Shoot {
        ticks_left: u32,
        next_shot: u32,
    },
    Charge {
        ticks_left: u32,
    },
    Dash,
    Return,
}

impl AttackState {
    fn opening_volley() -> Self {
        Self::Shoot {
            ticks_left: BOSS_SHOOT_TICKS,
            next_shot: BOSS_SHOT_INTERVAL,
        }
    }

    fn phase(self) -> AttackPhase {
        match self {
            Self::Wait => AttackPhase::Wait,
            Self::Shoot { .. } => AttackPhase::Shoot,
            Self::Charge { .. } => AttackPhase::Charge,
            Self::Dash => AttackPhase::Dash,
            Self::Return => AttackPhase::Return,
        }
    }
}

#[derive(Clone, Debug)]
pub(super) struct BossProjectile {
    pub(super) x: f64,
    pub(super) y: f64,
    pub(super) kind: ProjectileKind,
}

#[derive(Clone, Debug, Default)]
pub(super) struct Boss {
    pub(super) state: BossState,
    pub(super) attack: AttackState,
    // One encounter per match.
    pub(super) encountered: bool,
    pub(super) hp: u32,
    pub(super) x: f64,
    pub(super) y: f64,
    pub(super) base_y: f64,
    pub(super) vx: f64,
    pub(super) projectiles: Vec<BossProjectile>,
    anchor_row: Option<i32>,
    sweep_row: Option<i32>,
}

impl Boss {
    pub(super) fn is_idle(&self) -> bool {
        self.state == BossState::Idle
    }

    pub(super) fn begin_warning(&mut self, anchor_row: i32) {
        self.encountered = true;
        self.state = BossState::Warning {
            ticks_left: BOSS_WARNING_TICKS,
        };
        self.attack = AttackState::Wait;
        self.hp = BOSS_HP_MAX;
        self.anchor_row = Some(anchor_row);
        self.projectiles.clear();
    }

    pub(super) fn is_anchor(&self, row: i32) -> bool {
        self.anchor_row == Some(row)
    }

    // From the moment the boss enters until it is back to idle, new rows are bare arena.
    pub(super) fn holds_arena(&self) -> bool {
        !matches!(self.state, BossState::Idle | BossState::Warning { .. })
    }

    pub(super) fn freezes_camera(&self) -> bool {
        matches!(
            self.state,
            BossState::PreAttack { .. }
                | BossState::Active
                | BossState::Vulnerable
                | BossState::Defeated { .. }
        )
    }

    pub(super) fn phase(&self) -> BossPhase {
        match self.state {
            BossState::Idle => BossPhase::Idle,
            BossState::Warning { .. } => BossPhase::Warning,
            BossState::Entering => BossPhase::Entering,
            BossState::PreAttack { .. } => BossPhase::PreAttack,
            BossState::Active => BossPhase::Active,
            BossState::Vulnerable => BossPhase::Vulnerable,
            BossState::Defeated { .. } => BossPhase::Defeated,
        }
    }

    pub(super) fn payload(&self) -> BossPayload {
        BossPayload {
            state: self.phase(),
            attack: self.attack.phase(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            max_hp: BOSS_HP_MAX,
            projectiles: self
                .projectiles
                .iter()
                .map(|shot| BossProjectileView {
                    x: shot.x,
                    y: shot.y,
                    kind: shot.kind,
                })
                .collect(),
        }
    }

    fn patrol(&mut self) {
        let (min_x, max_x) = patrol_bounds();
        self.x += self.vx;
        if self.x <= min_x || self.x >= max_x {
            self.x = self.x.clamp(min_x, max_x);
            self.vx = -self.vx;
        }
    }

    fn set_state(&mut self, state: BossState) {
        tracing::debug!(from = ?self.phase(), to = ?state, "boss state change");
        self.state = state;
    }
}

fn patrol_bounds() -> (f64, f64) {
    (2.0 * TILE_SIZE, (MAP_WIDTH as f64 - 3.0) * TILE_SIZE)
}

fn arena_center_x() -> f64 {
    (MAP_WIDTH as f64 - 1.0) / 2.0 * TILE_SIZE
}

impl Room {
    pub(super) fn update_boss(&mut self) {
        match self.boss.state {
            BossState::Idle => {}
            BossState::Warning { ticks_left } => {
                if ticks_left <= 1 {
                    self.boss.set_state(BossState::Entering);
                    self.boss.x = arena_center_x();
                    self.boss.y = self.camera_y - BOSS_OFFSCREEN_MARGIN;
                    self.boss.vx = BOSS_PATROL_SPEED;
                    self.boss.sweep_row = self.grid.bottom_row();
                } else {
                    self.boss.state = BossState::Warning {
                        ticks_left: ticks_left - 1,
                    };
                }
            }
            BossState::Entering => {
                self.boss.y += BOSS_ENTER_SPEED;
                let swept = self.sweep_wave_clear();
                if swept && self.boss.y >= self.camera_y + BOSS_BASE_OFFSET {
                    self.boss.base_y = self.boss.y;
                    self.boss.set_state(BossState::PreAttack {
                        ticks_left: BOSS_PRE_ATTACK_TICKS,
                    });
                    self.ghosts.clear();
                    self.music(MusicCue::BossFight);
                    tracing::info!(room = %self.id, frame = self.frame, "boss fight begins");
                }
            }
            BossState::PreAttack { ticks_left } => {
                self.boss.patrol();
                if ticks_left <= 1 {
                    self.boss.set_state(BossState::Active);
                    self.boss.attack = AttackState::opening_volley();
                } else {
                    self.boss.state = BossState::PreAttack {
                        ticks_left: ticks_left - 1,
                    };
                }
            }
            BossState::Active => {
                self.update_boss_attack();
                self.update_boss_projectiles();
            }
            BossState::Vulnerable => {
                if self.frame % BOSS_ERRATIC_INTERVAL == 0 {
                    let speed = self
                        .rng
                        .int(-BOSS_ERRATIC_MAX_SPEED, BOSS_ERRATIC_MAX_SPEED);
                    self.boss.vx = speed as f64;
                }
                self.boss.patrol();
                if let Some(idx) = self.player_touching_boss() {
                    self.defeat_boss(idx);
                }
            }
            BossState::Defeated { ticks_left } => {
                if ticks_left <= 1 {
                    self.boss.set_state(BossState::Idle);
                    self.boss.attack = AttackState::Wait;
                    self.boss.anchor_row = None;
                    self.game_speed = CAMERA_START_SPEED;
                    self.corridor.clear_pattern();
                    self.music(MusicCue::Normal);
                } else {
                    self.boss.state = BossState::Defeated {
                        ticks_left: ticks_left - 1,
                    };
                }
            }
        }
    }

    // Clears consumables bottom to top, a few rows per tick. True once the sweep passed the top row.
    fn sweep_wave_clear(&mut self) -> bool {
        let top_row = self.corridor.top_generated_row();
        let Some(mut row) = self.boss.sweep_row else {
            return true;
        };
        for _ in 0..WAVE_CLEAR_ROWS_PER_TICK {
            if row < top_row {
                break;
            }
            for col in self.grid.clear_consumables(row) {
                self.diff.cleared.push((col, row));
            }
            row -= 1;
        }
        if row < top_row {
            self.boss.sweep_row = None;
            true
        } else {
            self.boss.sweep_row = Some(row);
            false
        }
    }

    fn update_boss_attack(&mut self) {
        match self.boss.attack {
            AttackState::Wait => self.boss.attack = AttackState::opening_volley(),
            AttackState::Shoot {
                ticks_left,
                next_shot,
            } => {
                self.boss.patrol();
                let next_shot = if next_shot <= 1 {
                    self.fire_boss_projectile();
                    BOSS_SHOT_INTERVAL
                } else {
                    next_shot - 1
                };
                self.boss.attack = if ticks_left <= 1 {
                    AttackState::Charge {
                        ticks_left: BOSS_CHARGE_TICKS,
                    }
                } else {
                    AttackState::Shoot {
                        ticks_left: ticks_left - 1,
                        next_shot,
                    }
                };
            }
            AttackState::Charge { ticks_left } => {
                self.boss.attack = if ticks_left <= 1 {
                    AttackState::Dash
                } else {
                    AttackState::Charge {
                        ticks_left: ticks_left - 1,
                    }
                };
            }
            AttackState::Dash => {
                self.boss.y += BOSS_DASH_SPEED;
                self.resolve_dash_contacts();
                if !matches!(self.boss.state, BossState::Active) {
                    return;
                }
                if self.boss.y > self.camera_y + VIEW_HEIGHT + BOSS_OFFSCREEN_MARGIN {
                    self.boss.y = self.camera_y - BOSS_OFFSCREEN_MARGIN;
                    self.boss.attack = AttackState::Return;
                }
            }
            AttackState::Return => {
                self.boss.y += BOSS_RETURN_SPEED;
                if self.boss.y >= self.boss.base_y {
                    self.boss.y = self.boss.base_y;
                    self.boss.attack = AttackState::opening_volley();
                }
            }
        }
    }

    fn fire_boss_projectile(&mut self) {
        let roll = self.rng.next_f32();
        let kind = if roll < BOSS_ORB_CHANCE {
            ProjectileKind::Orb
        } else if roll < BOSS_ORB_CHANCE + BOSS_EDIBLE_CHANCE {
            ProjectileKind::Edible
        } else {
            ProjectileKind::Harmful
        };
        self.boss.projectiles.push(BossProjectile {
            x: self.boss.x,
            y: self.boss.y + TILE_SIZE,
            kind,
        });
    }

    fn update_boss_projectiles(&mut self) {
        let floor = self.camera_y + VIEW_HEIGHT + TILE_SIZE;
        for shot in &mut self.boss.projectiles {
            shot.y += BOSS_SHOT_SPEED;
        }
        self.boss.projectiles.retain(|shot| shot.y <= floor);

        let radius_sq = BOSS_PROJECTILE_RADIUS * BOSS_PROJECTILE_RADIUS;
        let mut shot_idx = 0;
        while shot_idx < self.boss.projectiles.len() {
            let shot = &self.boss.projectiles[shot_idx];
            let hit = self.players.iter().position(|player| {
                player.is_active()
                    && squared_distance(player.mover.x, player.mover.y, shot.x, shot.y) < radius_sq
            });
            let Some(player_idx) = hit else {
                shot_idx += 1;
                continue;
            };
            let shot = self.boss.projectiles.remove(shot_idx);
            self.apply_boss_projectile(player_idx, &shot);
            if self.boss.state != BossState::Active {
                return;
            }
        }
    }

    fn apply_boss_projectile(&mut self, idx: usize, shot: &BossProjectile) {
        match shot.kind {
            ProjectileKind::Harmful => {
                if self.players[idx].invuln_timer == 0 {
                    self.lose_life(idx);
                }
            }
            ProjectileKind::Edible => {
                self.popup(shot.x, shot.y, format!("+{BOSS_EDIBLE_POINTS}"), "#FFFF00");
                self.award(idx, BOSS_EDIBLE_POINTS);
            }
            ProjectileKind::Orb => {
                self.players[idx].stats.orbs += 1;
                self.popup(shot.x, shot.y, format!("+{BOSS_ORB_POINTS}"), "#00FFFF");
                self.award(idx, BOSS_ORB_POINTS);
                self.boss.hp = self.boss.hp.saturating_sub(1);
                self.sound(SoundCue::BossHit);
                if self.boss.hp == 0 {
                    self.boss.set_state(BossState::Vulnerable);
                    self.boss.attack = AttackState::Wait;
                    self.boss.projectiles.clear();
                    self.boss.y = self.boss.base_y;
                    tracing::info!(room = %self.id, "boss vulnerable");
                }
            }
        }
    }

    fn player_touching_boss(&self) -> Option<usize> {
        let radius_sq = BOSS_CONTACT_RADIUS * BOSS_CONTACT_RADIUS;
        self.players.iter().position(|player| {
            player.is_active()
                && squared_distance(player.mover.x, player.mover.y, self.boss.x, self.boss.y)
                    < radius_sq
        })
    }

    fn resolve_dash_contacts(&mut self) {
        let radius_sq = BOSS_CONTACT_RADIUS * BOSS_CONTACT_RADIUS;
        let dashing = Fighter {
            aggressive: true,
            invulnerable: false,
        };
        for idx in 0..self.players.len() {
            let player = &self.players[idx];
            if !player.is_active()
                || squared_distance(player.mover.x, player.mover.y, self.boss.x, self.boss.y)
                    >= radius_sq
            {
                continue;
            }
            match clash(player.fighter(), dashing) {
                Clash::FirstWins => {
                    self.defeat_boss(idx);
                    return;
                }
                Clash::SecondWins => self.lose_life(idx),
                Clash::NoEffect => {}
            }
        }
    }

    fn defeat_boss(&mut self, idx: usize) {
        self.boss.set_state(BossState::Defeated {
            ticks_left: BOSS_DEFEAT_DELAY_TICKS,
        });
        self.boss.attack = AttackState::Wait;
        self.boss.projectiles.clear();
        self.boss.hp = 0;
        self.frightened_timer = POWER_MODE_DURATION;

        let (x, y) = (self.boss.x, self.boss.y);
        self.events.push(RoomEvent::Debris {
            pieces: debris_burst(x, y, BOSS_COLOR),
        });
        self.popup(x, y, format!("+{BOSS_DEFEAT_BONUS}"), "#FFD700");
        self.sound(SoundCue::BossDefeated);
        self.award(idx, BOSS_DEFEAT_BONUS);
        tracing::info!(
            room = %self.id,
            player = %self.players[idx].id,
            frame = self.frame,
            "boss defeated"
        );
    }
}
