pub const TICK_RATE: u32 = 60;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;
pub const BROADCAST_INTERVAL_TICKS: u64 = 2;
pub const COUNTDOWN_TICKS: u32 = 3 * TICK_RATE;

// Grid geometry. Positions are pixels; y grows downward and the camera climbs toward negative y.
pub const TILE_SIZE: f64 = 30.0;
pub const MAP_WIDTH: usize = 20;
pub const HALF_WIDTH: usize = MAP_WIDTH / 2;
pub const PATTERN_ROWS: usize = 10;
pub const VIEW_HEIGHT: f64 = 800.0;

pub const INITIAL_BOTTOM_ROW: i32 = 30;
pub const INITIAL_TOP_ROW: i32 = -50;
pub const START_AREA_FIRST_ROW: i32 = 20;
pub const START_AREA_LAST_ROW: i32 = 24;
pub const PLAYER_START_ROW: i32 = 22;
pub const GENERATE_AHEAD_ROWS: i32 = 5;
pub const ROW_RETENTION_MARGIN: i32 = 60;
pub const MAX_RETAINED_ROWS: usize = 150;

pub const MAX_PLAYERS: usize = 4;
pub const MAX_LIVES: u32 = 3;
pub const PLAYER_COLORS: [&str; MAX_PLAYERS] = ["#FFFF00", "#00FF00", "#00FFFF", "#FF00FF"];
pub const GHOST_COLORS: [&str; 4] = ["red", "pink", "cyan", "orange"];

pub const CAMERA_START_SPEED: f64 = 0.5;
pub const CAMERA_MAX_SPEED: f64 = 1.4;
pub const CAMERA_ACCELERATION: f64 = 0.0005;

pub const PLAYER_SPEED_START: f64 = 2.0;
pub const PLAYER_SPEED_MAX: f64 = 3.0;
pub const GHOST_SPEED_START: f64 = 1.5;
pub const GHOST_SPEED_MAX: f64 = 2.25;
pub const GHOST_SPEED_FRIGHTENED: f64 = 0.8;
pub const HYPER_PLAYER_MULTIPLIER: f64 = 1.4;
pub const HYPER_GHOST_MULTIPLIER: f64 = 0.6;
pub const PVP_SPEED_MULTIPLIER: f64 = 1.2;

pub const EVIL_SPAWN_THRESHOLD: f32 = 0.0005;
pub const HEART_SPAWN_THRESHOLD: f32 = 0.0020;
pub const FRUIT_ROW_CHANCE: f32 = 0.6;

pub const DOT_POINTS: u64 = 10;
pub const POWER_POINTS: u64 = 50;
pub const HEART_BONUS_POINTS: u64 = 100;
pub const GHOST_POINTS: u64 = 200;
pub const POWER_MODE_DURATION: u32 = 240;
pub const PVP_MODE_DURATION: u32 = 300;

pub const GHOST_CONTACT_RADIUS: f64 = 20.0;
pub const PVP_CONTACT_RADIUS: f64 = TILE_SIZE;
pub const GHOST_FIRST_SPAWN_Y: f64 = -400.0;
pub const GHOST_SPAWN_INTERVAL: f64 = 500.0;
pub const GHOST_DESPAWN_DEPTH: f64 = 900.0;
pub const GHOST_SPAWN_ATTEMPTS: usize = 10;

pub const DEATH_ANIMATION_TICKS: u32 = 90;
pub const RESPAWN_INVULN_TICKS: u32 = 120;
pub const RESPAWN_SPEED_DAMPING: f64 = 0.7;
pub const RESPAWN_SAFE_DISTANCE: f64 = 3.0 * TILE_SIZE;
pub const RESPAWN_ATTEMPTS: usize = 20;
pub const RESPAWN_ROW_SPREAD: i32 = 3;

pub const MILESTONE_INTERVAL: u64 = 10_000;
pub const HYPER_SPEED_TICKS: u32 = 300;

pub const HAZARD_DEFER_TICKS: u64 = 2 * TICK_RATE as u64;

pub const ROCKET_CYCLE_MIN_TICKS: i32 = 900;
pub const ROCKET_CYCLE_MAX_TICKS: i32 = 1500;
pub const ROCKET_WAVES: u32 = 3;
pub const ROCKET_WAVE_GAP_TICKS: u64 = 100;
pub const ROCKET_WARNING_TICKS: u32 = 90;
pub const ROCKET_SPEED: f64 = 10.0;
pub const ROCKET_HIT_HALF_WIDTH: f64 = 15.0;
pub const ROCKET_HIT_HALF_HEIGHT: f64 = 25.0;

pub const SURGE_CYCLE_MIN_TICKS: i32 = 1200;
pub const SURGE_CYCLE_MAX_TICKS: i32 = 1800;
pub const SURGE_RISE_TICKS: u32 = 180;
pub const SURGE_HOLD_TICKS: u32 = 120;
pub const SURGE_RETURN_TICKS: u32 = 180;
pub const SURGE_MAX_HEIGHT: f64 = 5.0 * TILE_SIZE;

pub const TRAIN_MIN_PATTERNS: i32 = 4;
pub const TRAIN_MAX_PATTERNS: i32 = 7;
pub const TRAIN_GAP_ROWS: u32 = 7;
pub const TRAIN_PREROLL_ROWS: u32 = 3;
pub const TRAIN_YELLOW_TICKS: u32 = 120;
pub const TRAIN_RED_TICKS: u32 = 60;
pub const TRAIN_SEGMENTS_PER_ROW: usize = 12;
pub const TRAIN_SPEED: f64 = 12.0;
pub const TRAIN_HIT_RADIUS: f64 = 24.0;

pub const BOSS_TRIGGER_SCORE: u64 = 5_000;
pub const BOSS_HP_MAX: u32 = 5;
pub const BOSS_WARNING_TICKS: u32 = 180;
pub const BOSS_ENTER_SPEED: f64 = 2.0;
pub const BOSS_BASE_OFFSET: f64 = 150.0;
pub const BOSS_PRE_ATTACK_TICKS: u32 = 120;
pub const BOSS_PATROL_SPEED: f64 = 2.0;
pub const BOSS_SHOOT_TICKS: u32 = 300;
pub const BOSS_SHOT_INTERVAL: u32 = 40;
pub const BOSS_SHOT_SPEED: f64 = 3.0;
pub const BOSS_ORB_CHANCE: f32 = 0.12;
pub const BOSS_EDIBLE_CHANCE: f32 = 0.28;
pub const BOSS_CHARGE_TICKS: u32 = 60;
pub const BOSS_DASH_SPEED: f64 = 12.0;
pub const BOSS_RETURN_SPEED: f64 = 4.0;
pub const BOSS_OFFSCREEN_MARGIN: f64 = 3.0 * TILE_SIZE;
pub const BOSS_CONTACT_RADIUS: f64 = 40.0;
pub const BOSS_PROJECTILE_RADIUS: f64 = 18.0;
pub const BOSS_ERRATIC_INTERVAL: u64 = 20;
pub const BOSS_ERRATIC_MAX_SPEED: i32 = 5;
pub const BOSS_DEFEAT_DELAY_TICKS: u32 = 180;
pub const BOSS_DEFEAT_BONUS: u64 = 5_000;
pub const BOSS_ORB_POINTS: u64 = 500;
pub const BOSS_EDIBLE_POINTS: u64 = 100;
pub const WAVE_CLEAR_ROWS_PER_TICK: usize = 2;

pub const LEADERBOARD_SIZE: usize = 10;
pub const NAME_MAX_CHARS: usize = 10;
pub const LEADERBOARD_SAVE_DEBOUNCE_MS: u64 = 3_000;

pub const ROOM_CODE_LEN: usize = 5;
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
