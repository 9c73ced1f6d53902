use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    // Fixed order so that ranking ties resolve the same way every time.
    pub const CARDINALS: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::None => (0, 0),
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FruitTier {
    Cherry,
    Strawberry,
    Orange,
    Apple,
    Melon,
}

impl FruitTier {
    pub fn points(self) -> u64 {
        match self {
            Self::Cherry => 100,
            Self::Strawberry => 300,
            Self::Orange => 500,
            Self::Apple => 700,
            Self::Melon => 1_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tile {
    Empty,
    Wall,
    Dot,
    Power,
    Fruit(FruitTier),
    Evil,
    Heart,
    BossMarker,
}

impl Tile {
    pub fn code(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Wall => 1,
            Self::Dot => 2,
            Self::Power => 3,
            Self::Fruit(FruitTier::Cherry) => 4,
            Self::Evil => 5,
            Self::Heart => 6,
            Self::Fruit(FruitTier::Strawberry) => 7,
            Self::Fruit(FruitTier::Orange) => 8,
            Self::Fruit(FruitTier::Apple) => 9,
            Self::Fruit(FruitTier::Melon) => 10,
            Self::BossMarker => 11,
        }
    }

    pub fn is_wall(self) -> bool {
        self == Self::Wall
    }

    pub fn is_consumable(self) -> bool {
        matches!(
            self,
            Self::Dot | Self::Power | Self::Fruit(_) | Self::Evil | Self::Heart
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Power,
    Fruit,
    EatGhost,
    Death,
    RocketAlarm,
    TrainBell,
    BossHit,
    BossDefeated,
    Milestone,
    BonusLife,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MusicCue {
    Normal,
    BossWarning,
    BossFight,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DebrisPiece {
    pub x: f64,
    pub y: f64,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    Popup {
        x: f64,
        y: f64,
        text: String,
        color: String,
    },
    Sound {
        cue: SoundCue,
    },
    Music {
        cue: MusicCue,
    },
    Debris {
        pieces: Vec<DebrisPiece>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    pub dots: u32,
    pub fruits: u32,
    pub ghosts: u32,
    #[serde(rename = "playersEaten")]
    pub players_eaten: u32,
    pub deaths: u32,
    pub orbs: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    #[serde(rename = "colorIdx")]
    pub color_idx: usize,
    pub color: String,
    pub score: u64,
    pub lives: u32,
    pub alive: bool,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    #[serde(rename = "invulnTimer")]
    pub invuln_timer: u32,
    #[serde(rename = "pvpTimer")]
    pub pvp_timer: u32,
    #[serde(rename = "deathTimer")]
    pub death_timer: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct LobbyPlayerView {
    pub id: String,
    pub name: String,
    #[serde(rename = "colorIdx")]
    pub color_idx: usize,
    pub color: String,
    #[serde(rename = "isHost")]
    pub is_host: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub color: String,
    pub dead: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RocketWarningView {
    pub column: usize,
    pub countdown: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PointView {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RocketPayload {
    pub warnings: Vec<RocketWarningView>,
    pub rockets: Vec<PointView>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurgePhase {
    Idle,
    Rising,
    Returning,
}

#[derive(Clone, Debug, Serialize)]
pub struct SurgePayload {
    pub state: SurgePhase,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainSignal {
    Off,
    Waiting,
    Yellow,
    Red,
    Crossing,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrainPayload {
    pub state: TrainSignal,
    #[serde(rename = "targetRow")]
    pub target_row: Option<i32>,
    pub direction: i32,
    pub segments: Vec<PointView>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BossPhase {
    Idle,
    Warning,
    Entering,
    PreAttack,
    Active,
    Vulnerable,
    Defeated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackPhase {
    Wait,
    Shoot,
    Charge,
    Dash,
    Return,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    Harmful,
    Edible,
    Orb,
}

#[derive(Clone, Debug, Serialize)]
pub struct BossProjectileView {
    pub x: f64,
    pub y: f64,
    pub kind: ProjectileKind,
}

#[derive(Clone, Debug, Serialize)]
pub struct BossPayload {
    pub state: BossPhase,
    pub attack: AttackPhase,
    pub x: f64,
    pub y: f64,
    pub hp: u32,
    #[serde(rename = "maxHp")]
    pub max_hp: u32,
    pub projectiles: Vec<BossProjectileView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowPatch {
    pub row: i32,
    pub cells: Vec<u8>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GridPatch {
    pub rows: Vec<RowPatch>,
    pub cleared: Vec<(usize, i32)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FullGrid {
    pub rows: Vec<RowPatch>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub timestamp: u64,
    pub frame: u64,
    #[serde(rename = "cameraY")]
    pub camera_y: f64,
    #[serde(rename = "gameSpeed")]
    pub game_speed: f64,
    pub countdown: f64,
    pub players: Vec<PlayerView>,
    pub ghosts: Vec<GhostView>,
    #[serde(rename = "frightenedTimer")]
    pub frightened_timer: u32,
    #[serde(rename = "hyperTimer")]
    pub hyper_timer: u32,
    pub rockets: RocketPayload,
    pub surge: SurgePayload,
    pub train: TrainPayload,
    pub boss: BossPayload,
    pub patch: GridPatch,
    pub events: Vec<RoomEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameOverSummary {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub name: String,
    #[serde(rename = "colorIdx")]
    pub color_idx: usize,
    pub score: u64,
    pub stats: PlayerStats,
    pub rank: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardResponse {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    pub entries: Vec<LeaderboardEntry>,
}
