use std::collections::BTreeMap;

use crate::constants::{HALF_WIDTH, MAP_WIDTH, PATTERN_ROWS};
use crate::types::{FruitTier, RowPatch, Tile};

pub type Row = [Tile; MAP_WIDTH];
pub type HalfRow = [u8; HALF_WIDTH];

const OPEN: u8 = 0;
const WALL: u8 = 1;
const POWER: u8 = 3;

// Authored left halves. Code 1 is a wall, 3 a power pellet, 0 an open cell that receives a pellet roll.
// Rows are listed top to bottom; generation consumes them bottom first.
#[derive(Debug)]
pub struct Pattern {
    pub rows: [HalfRow; PATTERN_ROWS],
    pub fruit_rows: &'static [usize],
}

pub static PATTERNS: [Pattern; 5] = [
    Pattern {
        rows: [
            [1, 0, 0, 0, 1, 0, 0, 0, 0, 1],
            [1, 0, 1, 0, 1, 0, 1, 1, 0, 1],
            [1, 0, 1, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 1, 1, 1, 0, 1, 1, 1, 1],
            [1, 0, 0, 0, 0, 0, 1, 0, 0, 0],
            [1, 0, 1, 1, 1, 0, 1, 0, 1, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 1, 1, 1, 0, 1, 1, 0, 1],
            [1, 0, 1, 0, 0, 0, 0, 0, 0, 1],
            [1, 0, 0, 0, 1, 1, 1, 1, 0, 0],
        ],
        fruit_rows: &[6],
    },
    Pattern {
        rows: [
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [1, 0, 1, 1, 1, 1, 1, 1, 0, 1],
            [1, 0, 1, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 1, 0, 1, 1, 1, 1, 0, 0],
            [1, 0, 0, 0, 1, 3, 0, 0, 0, 0],
            [1, 0, 1, 0, 1, 1, 1, 1, 0, 1],
            [1, 0, 1, 0, 0, 0, 0, 0, 0, 1],
            [1, 0, 1, 1, 1, 0, 1, 1, 1, 1],
            [1, 0, 0, 0, 1, 0, 1, 0, 0, 0],
            [1, 1, 1, 0, 0, 0, 0, 0, 1, 1],
        ],
        fruit_rows: &[2, 8],
    },
    Pattern {
        rows: [
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 1, 1, 0, 1, 1, 0, 1, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [1, 1, 0, 1, 1, 0, 1, 1, 0, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 1, 1, 1, 0, 1, 1, 1, 1],
            [1, 0, 0, 3, 0, 0, 0, 0, 0, 1],
            [1, 0, 1, 1, 0, 1, 1, 1, 0, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            [1, 1, 1, 0, 1, 1, 1, 1, 0, 1],
        ],
        fruit_rows: &[4, 8],
    },
    Pattern {
        rows: [
            [1, 0, 1, 0, 1, 0, 1, 0, 1, 1],
            [1, 0, 1, 0, 1, 0, 1, 0, 1, 0],
            [1, 0, 1, 0, 1, 0, 1, 0, 0, 0],
            [1, 0, 1, 0, 0, 0, 0, 0, 1, 1],
            [1, 0, 1, 1, 1, 1, 1, 0, 1, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 1, 0, 1, 1, 1, 0, 1, 1],
            [1, 0, 1, 0, 1, 0, 0, 0, 0, 0],
            [1, 0, 1, 0, 0, 0, 1, 1, 1, 0],
            [1, 0, 1, 1, 1, 0, 1, 1, 1, 0],
        ],
        fruit_rows: &[5],
    },
    Pattern {
        rows: [
            [1, 0, 0, 0, 0, 1, 0, 0, 0, 0],
            [1, 0, 1, 1, 0, 1, 0, 1, 1, 0],
            [1, 0, 1, 3, 0, 0, 0, 0, 1, 0],
            [1, 0, 1, 1, 1, 0, 1, 0, 1, 0],
            [1, 0, 0, 0, 0, 0, 1, 0, 0, 0],
            [1, 1, 1, 0, 1, 0, 1, 1, 1, 0],
            [1, 0, 0, 0, 1, 0, 0, 0, 0, 0],
            [1, 0, 1, 0, 1, 1, 1, 0, 1, 1],
            [1, 0, 1, 0, 0, 0, 0, 0, 0, 0],
            [1, 0, 0, 0, 1, 1, 0, 1, 1, 0],
        ],
        fruit_rows: &[],
    },
];

// (tier, best score needed to unlock, draw weight)
pub static FRUIT_TABLE: [(FruitTier, u64, u32); 5] = [
    (FruitTier::Cherry, 0, 60),
    (FruitTier::Strawberry, 2_000, 25),
    (FruitTier::Orange, 5_000, 10),
    (FruitTier::Apple, 10_000, 4),
    (FruitTier::Melon, 20_000, 1),
];

pub fn pick_fruit_tier(best_score: u64, roll: f32) -> FruitTier {
    let unlocked = FRUIT_TABLE
        .iter()
        .filter(|(_, min_score, _)| best_score >= *min_score);
    let total: u32 = unlocked.clone().map(|(_, _, weight)| *weight).sum();
    let mut cursor = roll.clamp(0.0, 1.0) * total as f32;
    let mut picked = FruitTier::Cherry;
    for (tier, _, weight) in unlocked {
        picked = *tier;
        if cursor < *weight as f32 {
            break;
        }
        cursor -= *weight as f32;
    }
    picked
}

pub fn mirror_half(half: &HalfRow) -> [u8; MAP_WIDTH] {
    let mut full = [OPEN; MAP_WIDTH];
    for (col, code) in half.iter().enumerate() {
        full[col] = *code;
        full[MAP_WIDTH - 1 - col] = *code;
    }
    full
}

pub fn pattern_code_tile(code: u8) -> Option<Tile> {
    match code {
        WALL => Some(Tile::Wall),
        POWER => Some(Tile::Power),
        _ => None,
    }
}

// Side walls only. Used for train gaps and while the boss holds the arena.
pub fn boundary_row() -> Row {
    let mut row = [Tile::Empty; MAP_WIDTH];
    row[0] = Tile::Wall;
    row[MAP_WIDTH - 1] = Tile::Wall;
    row
}

pub fn boss_marker_row() -> Row {
    let mut row = boundary_row();
    row[HALF_WIDTH - 1] = Tile::BossMarker;
    row[HALF_WIDTH] = Tile::BossMarker;
    row
}

// True when every column pair (i, width-1-i) agrees on wall/power classification.
pub fn is_mirrored(row: &Row) -> bool {
    (0..HALF_WIDTH).all(|col| {
        let left = row[col];
        let right = row[MAP_WIDTH - 1 - col];
        left.is_wall() == right.is_wall()
            && (left == Tile::Power) == (right == Tile::Power)
    })
}

#[derive(Clone, Debug, Default)]
pub struct TileGrid {
    rows: BTreeMap<i32, Row>,
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_row(&self, row: i32) -> bool {
        self.rows.contains_key(&row)
    }

    pub fn row(&self, row: i32) -> Option<&Row> {
        self.rows.get(&row)
    }

    // Largest retained index, i.e. the row furthest down the screen.
    pub fn bottom_row(&self) -> Option<i32> {
        self.rows.keys().next_back().copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (i32, &Row)> {
        self.rows.iter().map(|(index, cells)| (*index, cells))
    }

    // Off-grid columns and rows that were never generated (or were pruned) read as walls.
    pub fn get(&self, col: i32, row: i32) -> Tile {
        if col < 0 || col >= MAP_WIDTH as i32 {
            return Tile::Wall;
        }
        self.rows
            .get(&row)
            .map(|cells| cells[col as usize])
            .unwrap_or(Tile::Wall)
    }

    pub fn is_wall(&self, col: i32, row: i32) -> bool {
        self.get(col, row).is_wall()
    }

    pub fn insert_row(&mut self, row: i32, cells: Row) {
        self.rows.insert(row, cells);
    }

    pub fn set(&mut self, col: usize, row: i32, tile: Tile) -> bool {
        match self.rows.get_mut(&row) {
            Some(cells) if col < MAP_WIDTH => {
                cells[col] = tile;
                true
            }
            _ => false,
        }
    }

    // Clears a consumable to empty and hands back what was there.
    pub fn take_consumable(&mut self, col: i32, row: i32) -> Option<Tile> {
        if col < 0 || col >= MAP_WIDTH as i32 {
            return None;
        }
        let cells = self.rows.get_mut(&row)?;
        let tile = cells[col as usize];
        if !tile.is_consumable() {
            return None;
        }
        cells[col as usize] = Tile::Empty;
        Some(tile)
    }

    pub fn clear_consumables(&mut self, row: i32) -> Vec<usize> {
        let Some(cells) = self.rows.get_mut(&row) else {
            return Vec::new();
        };
        let mut cleared = Vec::new();
        for (col, cell) in cells.iter_mut().enumerate() {
            if cell.is_consumable() {
                *cell = Tile::Empty;
                cleared.push(col);
            }
        }
        cleared
    }

    // Drops rows below `threshold` (larger index), then the lowest remaining rows until at most `max_rows` stay.
    pub fn prune(&mut self, threshold: i32, max_rows: usize) -> Vec<i32> {
        let mut evicted: Vec<i32> = self
            .rows
            .range(threshold.saturating_add(1)..)
            .map(|(index, _)| *index)
            .collect();
        for index in &evicted {
            self.rows.remove(index);
        }
        while self.rows.len() > max_rows {
            match self.rows.pop_last() {
                Some((index, _)) => evicted.push(index),
                None => break,
            }
        }
        evicted
    }

    pub fn row_patch(&self, row: i32) -> Option<RowPatch> {
        self.rows.get(&row).map(|cells| RowPatch {
            row,
            cells: cells.iter().map(|tile| tile.code()).collect(),
        })
    }
}
