use crate::constants::{
    BROADCAST_INTERVAL_TICKS, CAMERA_ACCELERATION, CAMERA_MAX_SPEED, CAMERA_START_SPEED,
    COUNTDOWN_TICKS, GENERATE_AHEAD_ROWS, GHOST_FIRST_SPAWN_Y, HYPER_PLAYER_MULTIPLIER,
    INITIAL_TOP_ROW, MAP_WIDTH, MAX_LIVES, MAX_PLAYERS, PLAYER_COLORS, PLAYER_SPEED_MAX,
    PLAYER_SPEED_START, PLAYER_START_ROW, PVP_SPEED_MULTIPLIER, START_AREA_FIRST_ROW,
    START_AREA_LAST_ROW, TICK_RATE, TILE_SIZE, VIEW_HEIGHT,
};
use crate::error::RoomError;
use crate::rng::RandomSource;
use crate::server_utils::sanitize_nickname;
use crate::types::{
    Direction, GameOverSummary, LobbyPlayerView, MusicCue, PlayerStats, PlayerView, RoomEvent,
    SoundCue, Tile,
};
use crate::world::TileGrid;

mod boss;
mod combat;
mod corridor;
mod ghost_system;
mod motion;
mod rocket;
mod surge;
mod sync;
mod train;
mod utils;

#[cfg(test)]
pub(crate) mod test_support;

use self::boss::Boss;
use self::corridor::CorridorState;
use self::ghost_system::GhostInternal;
use self::motion::{advance, lerp_speed, ramp_fraction, Mover};
use self::rocket::RocketWave;
use self::surge::FloorSurge;
use self::sync::PendingDiff;
use self::train::CrossingTrain;

#[derive(Clone, Debug)]
struct PlayerInternal {
    id: String,
    name: String,
    color_idx: usize,
    mover: Mover,
    queued: Direction,
    score: u64,
    lives: u32,
    alive: bool,
    death_timer: u32,
    invuln_timer: u32,
    pvp_timer: u32,
    milestones: u64,
    stats: PlayerStats,
    game_over_sent: bool,
}

impl PlayerInternal {
    fn new(id: &str, name: String, color_idx: usize) -> Self {
        let (col, row) = start_cell(color_idx);
        Self {
            id: id.to_string(),
            name,
            color_idx,
            mover: Mover::at_cell(col, row),
            queued: Direction::None,
            score: 0,
            lives: MAX_LIVES,
            alive: true,
            death_timer: 0,
            invuln_timer: 0,
            pvp_timer: 0,
            milestones: 0,
            stats: PlayerStats::default(),
            game_over_sent: false,
        }
    }

    fn reset_for_match(&mut self) {
        let (col, row) = start_cell(self.color_idx);
        self.mover = Mover::at_cell(col, row);
        self.queued = Direction::None;
        self.score = 0;
        self.lives = MAX_LIVES;
        self.alive = true;
        self.death_timer = 0;
        self.invuln_timer = 0;
        self.pvp_timer = 0;
        self.milestones = 0;
        self.stats = PlayerStats::default();
        self.game_over_sent = false;
    }

    // Alive and not frozen in the death animation.
    fn is_active(&self) -> bool {
        self.alive && self.death_timer == 0
    }

    fn view(&self) -> PlayerView {
        let (vx, vy) = self.mover.velocity();
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            color_idx: self.color_idx,
            color: PLAYER_COLORS[self.color_idx].to_string(),
            score: self.score,
            lives: self.lives,
            alive: self.alive,
            x: self.mover.x,
            y: self.mover.y,
            vx,
            vy,
            invuln_timer: self.invuln_timer,
            pvp_timer: self.pvp_timer,
            death_timer: self.death_timer,
        }
    }
}

fn start_cell(color_idx: usize) -> (i32, i32) {
    (4 + color_idx as i32 * 4, PLAYER_START_ROW)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomPhase {
    Lobby,
    Countdown { ticks_left: u32 },
    Running,
}

#[derive(Clone, Copy, Debug)]
pub struct RoomOptions {
    pub ghost_spawning: bool,
    pub hazards: bool,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            ghost_spawning: true,
            hazards: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HazardFlags {
    pub rocket_active: bool,
    pub surge_active: bool,
    pub train_active: bool,
    pub boss_engaged: bool,
}

pub struct Room {
    id: String,
    host_id: String,
    options: RoomOptions,
    rng: Box<dyn RandomSource>,
    phase: RoomPhase,
    frame: u64,

    players: Vec<PlayerInternal>,
    ghosts: Vec<GhostInternal>,
    grid: TileGrid,
    corridor: CorridorState,

    camera_y: f64,
    game_speed: f64,
    frightened_timer: u32,
    hyper_timer: u32,
    global_milestone: u64,
    next_ghost_spawn: f64,

    rocket: RocketWave,
    surge: FloorSurge,
    train: CrossingTrain,
    boss: Boss,

    diff: PendingDiff,
    events: Vec<RoomEvent>,
    game_overs: Vec<GameOverSummary>,
    match_ended: bool,
}

impl Room {
    pub fn new(
        id: impl Into<String>,
        host_id: impl Into<String>,
        rng: Box<dyn RandomSource>,
        options: RoomOptions,
    ) -> Self {
        let mut room = Self {
            id: id.into(),
            host_id: host_id.into(),
            options,
            rng,
            phase: RoomPhase::Lobby,
            frame: 0,
            players: Vec::new(),
            ghosts: Vec::new(),
            grid: TileGrid::new(),
            corridor: CorridorState::default(),
            camera_y: 0.0,
            game_speed: CAMERA_START_SPEED,
            frightened_timer: 0,
            hyper_timer: 0,
            global_milestone: 0,
            next_ghost_spawn: GHOST_FIRST_SPAWN_Y,
            rocket: RocketWave::default(),
            surge: FloorSurge::default(),
            train: CrossingTrain::default(),
            boss: Boss::default(),
            diff: PendingDiff::default(),
            events: Vec::new(),
            game_overs: Vec::new(),
            match_ended: false,
        };
        room.build_world();
        room
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_lobby(&self) -> bool {
        self.phase == RoomPhase::Lobby
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn camera_y(&self) -> f64 {
        self.camera_y
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|player| player.id == player_id)
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.players.iter().map(|player| player.id.clone()).collect()
    }

    pub fn lobby_players(&self) -> Vec<LobbyPlayerView> {
        self.players
            .iter()
            .map(|player| LobbyPlayerView {
                id: player.id.clone(),
                name: player.name.clone(),
                color_idx: player.color_idx,
                color: PLAYER_COLORS[player.color_idx].to_string(),
                is_host: player.id == self.host_id,
            })
            .collect()
    }

    pub fn hazard_flags(&self) -> HazardFlags {
        HazardFlags {
            rocket_active: self.rocket.is_active(),
            surge_active: self.surge.is_active(),
            train_active: self.train.is_active(),
            boss_engaged: !self.boss.is_idle(),
        }
    }

    pub fn add_player(&mut self, player_id: &str, nickname: &str) -> Result<usize, RoomError> {
        if self.phase != RoomPhase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        if self.has_player(player_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        let color_idx = (0..MAX_PLAYERS)
            .find(|slot| self.players.iter().all(|player| player.color_idx != *slot))
            .ok_or(RoomError::Full)?;
        let name = sanitize_nickname(nickname, color_idx);
        self.players
            .push(PlayerInternal::new(player_id, name, color_idx));
        Ok(color_idx)
    }

    // In the lobby the seat is freed; mid-match the player is dropped to zero lives and the room carries on.
    pub fn remove_player(&mut self, player_id: &str) -> bool {
        let Some(idx) = self.players.iter().position(|player| player.id == player_id) else {
            return false;
        };
        if self.phase == RoomPhase::Lobby {
            self.players.remove(idx);
            return true;
        }
        let player = &mut self.players[idx];
        player.alive = false;
        player.lives = 0;
        player.death_timer = 0;
        player.queued = Direction::None;
        player.mover.halt();
        true
    }

    pub fn start(&mut self, requested_by: &str) -> Result<(), RoomError> {
        if requested_by != self.host_id {
            return Err(RoomError::NotHost);
        }
        if self.phase != RoomPhase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        for player in &mut self.players {
            player.reset_for_match();
        }
        self.build_world();
        self.phase = RoomPhase::Countdown {
            ticks_left: COUNTDOWN_TICKS,
        };
        self.match_ended = false;
        self.game_overs.clear();
        self.events.push(RoomEvent::Music {
            cue: MusicCue::Normal,
        });
        tracing::info!(room = %self.id, players = self.players.len(), "match starting");
        Ok(())
    }

    pub fn set_input(&mut self, player_id: &str, dir: Direction) {
        if let Some(player) = self.players.iter_mut().find(|player| player.id == player_id) {
            if player.is_active() {
                player.queued = dir;
            }
        }
    }

    pub fn should_broadcast(&self) -> bool {
        self.phase != RoomPhase::Lobby && self.frame % BROADCAST_INTERVAL_TICKS == 0
    }

    pub fn take_match_ended(&mut self) -> bool {
        std::mem::take(&mut self.match_ended)
    }

    pub fn step(&mut self) {
        match self.phase {
            RoomPhase::Lobby => return,
            RoomPhase::Countdown { ticks_left } => {
                self.frame += 1;
                self.phase = if ticks_left <= 1 {
                    RoomPhase::Running
                } else {
                    RoomPhase::Countdown {
                        ticks_left: ticks_left - 1,
                    }
                };
                return;
            }
            RoomPhase::Running => {}
        }

        self.frame += 1;
        self.update_camera();
        if self.options.hazards {
            self.update_rocket_wave();
            self.update_floor_surge();
            self.update_train();
        }
        self.update_boss();
        self.update_players();
        self.resolve_pvp();
        self.update_ghosts();
        self.check_match_end();
    }

    fn build_world(&mut self) {
        self.grid = TileGrid::new();
        self.corridor = CorridorState::new(self.rng.as_mut());
        self.ghosts.clear();
        self.camera_y = 0.0;
        self.game_speed = CAMERA_START_SPEED;
        self.frightened_timer = 0;
        self.hyper_timer = 0;
        self.global_milestone = 0;
        self.next_ghost_spawn = GHOST_FIRST_SPAWN_Y;
        self.frame = 0;
        self.rocket = RocketWave::new(self.rng.as_mut(), 0);
        self.surge = FloorSurge::new(self.rng.as_mut(), 0);
        self.train = CrossingTrain::default();
        self.boss = Boss::default();

        self.generate_rows_through(INITIAL_TOP_ROW);
        for row in START_AREA_FIRST_ROW..=START_AREA_LAST_ROW {
            for col in 1..MAP_WIDTH - 1 {
                self.grid.set(col, row, Tile::Empty);
            }
        }
        self.diff = PendingDiff::default();
        self.events.clear();
    }

    fn update_camera(&mut self) {
        if !self.boss.freezes_camera() {
            self.camera_y -= self.game_speed;
            if self.game_speed < CAMERA_MAX_SPEED {
                self.game_speed = (self.game_speed + CAMERA_ACCELERATION).min(CAMERA_MAX_SPEED);
            }
        }
        let top_row = (self.camera_y / TILE_SIZE).floor() as i32 - GENERATE_AHEAD_ROWS;
        self.generate_rows_through(top_row);

        self.frightened_timer = self.frightened_timer.saturating_sub(1);
        self.hyper_timer = self.hyper_timer.saturating_sub(1);
    }

    fn update_players(&mut self) {
        let death_line = self.camera_y + VIEW_HEIGHT - self.surge.height();
        for idx in 0..self.players.len() {
            if !self.players[idx].alive {
                continue;
            }
            if self.players[idx].death_timer > 0 {
                self.players[idx].death_timer -= 1;
                if self.players[idx].death_timer == 0 {
                    self.finish_death(idx);
                }
                continue;
            }

            let speed = self.player_speed(idx);
            let grid = &self.grid;
            let player = &mut self.players[idx];
            player.invuln_timer = player.invuln_timer.saturating_sub(1);
            player.pvp_timer = player.pvp_timer.saturating_sub(1);
            advance(&mut player.mover, &mut player.queued, speed, |col, row| {
                grid.is_wall(col, row)
            });

            self.apply_pickup(idx);
            if self.players[idx].mover.y > death_line {
                self.lose_life(idx);
            }
        }
    }

    fn player_speed(&self, idx: usize) -> f64 {
        let mut speed = lerp_speed(
            PLAYER_SPEED_START,
            PLAYER_SPEED_MAX,
            ramp_fraction(self.game_speed),
        );
        if self.hyper_timer > 0 {
            speed *= HYPER_PLAYER_MULTIPLIER;
        }
        if self.players[idx].pvp_timer > 0 {
            speed *= PVP_SPEED_MULTIPLIER;
        }
        speed
    }

    fn check_match_end(&mut self) {
        if self.players.iter().any(|player| player.alive) {
            return;
        }
        self.phase = RoomPhase::Lobby;
        self.match_ended = true;
        self.rocket = RocketWave::default();
        self.surge = FloorSurge::default();
        let best = self.players.iter().map(|player| player.score).max();
        tracing::info!(
            room = %self.id,
            frame = self.frame,
            seconds = self.frame / TICK_RATE as u64,
            best_score = best.unwrap_or(0),
            "match ended"
        );
    }

    fn best_score(&self) -> u64 {
        self.players
            .iter()
            .map(|player| player.score)
            .max()
            .unwrap_or(0)
    }

    fn popup(&mut self, x: f64, y: f64, text: impl Into<String>, color: &str) {
        self.events.push(RoomEvent::Popup {
            x,
            y,
            text: text.into(),
            color: color.to_string(),
        });
    }

    fn sound(&mut self, cue: SoundCue) {
        self.events.push(RoomEvent::Sound { cue });
    }

    fn music(&mut self, cue: MusicCue) {
        self.events.push(RoomEvent::Music { cue });
    }
}
