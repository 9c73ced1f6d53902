use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{LEADERBOARD_SAVE_DEBOUNCE_MS, LEADERBOARD_SIZE};
use crate::server_utils::sanitize_leaderboard_name;
use crate::types::{LeaderboardEntry, LeaderboardResponse};

const FILE_VERSION: u8 = 1;

#[derive(Clone, Debug, Serialize)]
struct LeaderboardFile<'a> {
    version: u8,
    entries: &'a [LeaderboardEntry],
}

#[derive(Clone, Debug, Deserialize)]
struct LeaderboardFileRaw {
    version: u8,
    entries: Vec<serde_json::Value>,
}

/// Top scores across every room, highest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn from_entries(entries: Vec<LeaderboardEntry>) -> Self {
        let mut board = Self::default();
        for entry in entries {
            board.record(&entry.name, entry.score);
        }
        board
    }

    /// Inserts a finished score and returns its 1-based rank, or `None` when it does not make
    /// the cut. Equal scores keep their arrival order.
    pub fn record(&mut self, name: &str, score: u64) -> Option<usize> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.score < score)
            .unwrap_or(self.entries.len());
        if position >= LEADERBOARD_SIZE {
            return None;
        }
        self.entries.insert(
            position,
            LeaderboardEntry {
                name: sanitize_leaderboard_name(name),
                score,
            },
        );
        self.entries.truncate(LEADERBOARD_SIZE);
        Some(position + 1)
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }
}

pub struct RankingStore {
    file_path: Option<PathBuf>,
    board: Leaderboard,
    dirty_since_ms: Option<u64>,
}

impl RankingStore {
    pub fn new(file_path: PathBuf) -> Self {
        let board = Leaderboard::from_entries(load_entries(&file_path));
        tracing::info!(
            path = %file_path.display(),
            entries = board.entries().len(),
            "leaderboard loaded"
        );
        Self {
            file_path: Some(file_path),
            board,
            dirty_since_ms: None,
        }
    }

    // Never touches disk.
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            board: Leaderboard::default(),
            dirty_since_ms: None,
        }
    }

    pub fn record_result(&mut self, name: &str, score: u64, now_ms: u64) -> Option<usize> {
        let rank = self.board.record(name, score)?;
        self.dirty_since_ms.get_or_insert(now_ms);
        Some(rank)
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.board
    }

    pub fn has_pending_write(&self) -> bool {
        self.dirty_since_ms.is_some()
    }

    /// Writes the board once the oldest unsaved change is older than the debounce window.
    /// Returns whether a write was attempted.
    pub fn flush_if_due(&mut self, now_ms: u64) -> bool {
        match self.dirty_since_ms {
            Some(since) if now_ms.saturating_sub(since) >= LEADERBOARD_SAVE_DEBOUNCE_MS => {
                self.flush();
                true
            }
            _ => false,
        }
    }

    pub fn flush(&mut self) {
        if self.dirty_since_ms.take().is_none() {
            return;
        }
        let Some(path) = &self.file_path else {
            return;
        };
        if let Err(error) = save_entries(path, self.board.entries()) {
            tracing::warn!(path = %path.display(), %error, "failed to write leaderboard");
        }
    }

    pub fn build_response(&self) -> LeaderboardResponse {
        LeaderboardResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entries: self.board.entries().to_vec(),
        }
    }
}

fn save_entries(path: &Path, entries: &[LeaderboardEntry]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let payload = LeaderboardFile {
        version: FILE_VERSION,
        entries,
    };
    let text = serde_json::to_string_pretty(&payload)?;
    fs::write(path, text)
}

fn load_entries(path: &Path) -> Vec<LeaderboardEntry> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), %error, "failed to read leaderboard");
            }
            return Vec::new();
        }
    };
    let parsed = match serde_json::from_str::<LeaderboardFileRaw>(&text) {
        Ok(value) if value.version == FILE_VERSION => value,
        Ok(value) => {
            tracing::warn!(
                path = %path.display(),
                version = value.version,
                "unsupported leaderboard version"
            );
            return Vec::new();
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to parse leaderboard");
            return Vec::new();
        }
    };

    parsed
        .entries
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<LeaderboardEntry>(raw) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "skipping leaderboard entry");
                None
            }
        })
        .collect()
}
