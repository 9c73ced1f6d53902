use clap::Parser;
use pacrush_server::constants::{MAP_WIDTH, MAX_LIVES, MAX_RETAINED_ROWS, TILE_SIZE};
use pacrush_server::engine::{Room, RoomOptions, RoomPhase};
use pacrush_server::rng::{RandomSource, Rng};
use pacrush_server::types::{Direction, RoomEvent, Snapshot, SoundCue};
use pacrush_server::world::Row;
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value_t = 18_000)]
    ticks: u64,
    #[arg(long)]
    players: Option<usize>,
    #[arg(long)]
    seed: Option<u32>,
    #[arg(long)]
    scenario: Option<String>,
    #[arg(long)]
    no_hazards: bool,
    #[arg(long)]
    no_ghosts: bool,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    players: usize,
    seed: u32,
    ticks: u64,
    hazards: bool,
    ghosts: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
struct ScenarioResultLine {
    #[serde(rename = "type")]
    kind: &'static str,
    scenario: String,
    seed: u32,
    players: usize,
    ticks: u64,
    matches: u32,
    #[serde(rename = "gameOvers")]
    game_overs: u32,
    deaths: u32,
    #[serde(rename = "ghostsEaten")]
    ghosts_eaten: u32,
    #[serde(rename = "rocketAlarms")]
    rocket_alarms: u32,
    #[serde(rename = "trainBells")]
    train_bells: u32,
    #[serde(rename = "bossHits")]
    boss_hits: u32,
    #[serde(rename = "bossDefeats")]
    boss_defeats: u32,
    #[serde(rename = "bestScore")]
    best_score: u64,
    #[serde(rename = "maxRetainedRows")]
    max_retained_rows: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "totalTicks")]
    total_ticks: u64,
    scenarios: Vec<ScenarioResultLine>,
}

// Steers one seat: climb when possible, otherwise drift sideways and occasionally switch side.
struct Bot {
    player_id: String,
    lateral: Direction,
}

impl Bot {
    fn choose(&mut self, room: &Room, snapshot: &Snapshot, rng: &mut dyn RandomSource) -> Option<Direction> {
        let player = snapshot.players.iter().find(|player| player.id == self.player_id)?;
        if !player.alive || player.death_timer > 0 {
            return None;
        }
        let col = (player.x / TILE_SIZE).round() as i32;
        let row = (player.y / TILE_SIZE).round() as i32;
        let grid = room.grid();
        let open = |dir: Direction| {
            let (dc, dr) = dir.delta();
            !grid.is_wall(col + dc, row + dr)
        };

        if rng.bool(0.05) {
            self.lateral = self.lateral.reverse();
        }
        let choice = [Direction::Up, self.lateral, self.lateral.reverse(), Direction::Down]
            .into_iter()
            .find(|dir| open(*dir))
            .unwrap_or(Direction::None);
        if choice == self.lateral.reverse() {
            self.lateral = choice;
        }
        Some(choice)
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut total_anomalies = 0usize;
    let mut total_ticks = 0u64;

    for scenario in scenarios {
        tracing::info!(
            scenario = %scenario.name,
            seed = scenario.seed,
            players = scenario.players,
            ticks = scenario.ticks,
            "scenario started"
        );
        let (result, anomaly_records) = run_scenario(&scenario);

        for anomaly in &anomaly_records {
            tracing::warn!(
                scenario = %scenario.name,
                seed = scenario.seed,
                tick = anomaly.tick,
                message = %anomaly.message,
                "anomaly detected"
            );
        }
        if !result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += anomaly_records.len();
        total_ticks += result.ticks;

        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::error!(%error, "failed to serialize scenario result"),
        }
        scenario_results.push(result);
    }

    let summary = RunSummary {
        started_at_ms: run_started_at_ms,
        finished_at_ms: now_ms(),
        scenario_count: scenario_results.len(),
        anomaly_count: total_anomalies,
        total_ticks,
        scenarios: scenario_results,
    };

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            tracing::error!(path = %path.display(), %error, "failed to write run summary");
            std::process::exit(2);
        }
    }

    tracing::info!(
        scenarios = summary.scenario_count,
        anomalies = summary.anomaly_count,
        ticks = summary.total_ticks,
        "run finished"
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_scenario(scenario: &Scenario) -> (ScenarioResultLine, Vec<AnomalyRecord>) {
    let options = RoomOptions {
        ghost_spawning: scenario.ghosts,
        hazards: scenario.hazards,
    };
    let host_id = "bot_1".to_string();
    let mut room = Room::new(
        format!("SIM{}", scenario.seed % 100),
        host_id.clone(),
        Box::new(Rng::new(scenario.seed)),
        options,
    );
    let mut bot_rng = Rng::new(scenario.seed ^ 0x5bd1_e995);
    let mut bots = Vec::new();
    for idx in 0..scenario.players {
        let player_id = format!("bot_{}", idx + 1);
        if let Err(error) = room.add_player(&player_id, &format!("bot{}", idx + 1)) {
            tracing::warn!(%error, player = %player_id, "bot could not be seated");
            continue;
        }
        bots.push(Bot {
            player_id,
            lateral: if idx % 2 == 0 { Direction::Left } else { Direction::Right },
        });
    }

    let mut result = ScenarioResultLine {
        kind: "scenario",
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        players: bots.len(),
        ticks: scenario.ticks,
        ..ScenarioResultLine::default()
    };
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();

    for tick in 0..scenario.ticks {
        if room.phase() == RoomPhase::Lobby {
            if let Err(error) = room.start(&host_id) {
                tracing::warn!(%error, "simulated host could not start");
                break;
            }
            result.matches += 1;
        }
        room.step();
        let snapshot = room.build_snapshot(tick);
        for bot in &mut bots {
            if let Some(dir) = bot.choose(&room, &snapshot, &mut bot_rng) {
                room.set_input(&bot.player_id, dir);
            }
        }

        for message in collect_room_anomalies(&room, &snapshot) {
            push_anomaly(
                &mut result.anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                tick,
                message,
            );
        }
        tally_events(&mut result, &snapshot);
        result.game_overs += room.drain_game_overs().len() as u32;
        result.max_retained_rows = result.max_retained_rows.max(room.grid().len());
        let best = snapshot.players.iter().map(|player| player.score).max();
        result.best_score = result.best_score.max(best.unwrap_or(0));
    }

    (result, anomaly_records)
}

fn tally_events(result: &mut ScenarioResultLine, snapshot: &Snapshot) {
    for event in &snapshot.events {
        let RoomEvent::Sound { cue } = event else {
            continue;
        };
        match cue {
            SoundCue::Death => result.deaths += 1,
            SoundCue::EatGhost => result.ghosts_eaten += 1,
            SoundCue::RocketAlarm => result.rocket_alarms += 1,
            SoundCue::TrainBell => result.train_bells += 1,
            SoundCue::BossHit => result.boss_hits += 1,
            SoundCue::BossDefeated => result.boss_defeats += 1,
            _ => {}
        }
    }
}

fn collect_room_anomalies(room: &Room, snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    let grid = room.grid();
    if grid.len() > MAX_RETAINED_ROWS {
        anomalies.push(format!("retained rows over bound: {}", grid.len()));
    }
    for (row, cells) in grid.rows() {
        if !walls_mirrored(cells) {
            anomalies.push(format!("row {row} walls are not mirrored"));
        }
    }

    let hazards = room.hazard_flags();
    if hazards.rocket_active && hazards.surge_active {
        anomalies.push("rocket wave and floor surge overlap".to_string());
    }
    if hazards.boss_engaged && (hazards.rocket_active || hazards.surge_active) {
        anomalies.push("hazard running during the boss encounter".to_string());
    }

    if snapshot.boss.hp > snapshot.boss.max_hp {
        anomalies.push(format!(
            "boss hp out of range: {}/{}",
            snapshot.boss.hp, snapshot.boss.max_hp
        ));
    }
    for player in &snapshot.players {
        if player.lives > MAX_LIVES {
            anomalies.push(format!("player lives out of range: {} {}", player.id, player.lives));
        }
    }
    if !snapshot.camera_y.is_finite() {
        anomalies.push("camera position is not finite".to_string());
    }
    anomalies
}

// Eaten pellets break power symmetry mid-match, so only walls are checked here.
fn walls_mirrored(cells: &Row) -> bool {
    (0..MAP_WIDTH / 2).all(|col| cells[col].is_wall() == cells[MAP_WIDTH - 1 - col].is_wall())
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = cli.seed.unwrap_or_else(|| now_ms() as u32);
    let hazards = !cli.no_hazards;
    let ghosts = !cli.no_ghosts;
    let scenario = |name: &str, players: usize, seed: u32| Scenario {
        name: name.to_string(),
        players: cli.players.unwrap_or(players).clamp(1, 4),
        seed,
        ticks: cli.ticks,
        hazards,
        ghosts,
    };

    let all = vec![
        scenario("solo", 1, seed),
        scenario("duo", 2, seed.wrapping_add(1)),
        scenario("full-house", 4, seed.wrapping_add(2)),
    ];
    match cli.scenario.as_deref() {
        Some(name) => {
            let picked: Vec<Scenario> = all.iter().filter(|s| s.name == name).cloned().collect();
            if picked.is_empty() {
                vec![scenario(name, 2, seed)]
            } else {
                picked
            }
        }
        None => all,
    }
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("simulate").chain(args.iter().copied()))
    }

    #[test]
    fn short_run_has_no_anomalies() {
        let scenario = Scenario {
            name: "test".to_string(),
            players: 2,
            seed: 42,
            ticks: 3_000,
            hazards: true,
            ghosts: true,
        };
        let (result, records) = run_scenario(&scenario);
        assert!(records.is_empty(), "anomalies: {:?}", result.anomalies);
        assert!(result.matches >= 1);
        assert!(result.max_retained_rows <= MAX_RETAINED_ROWS);
    }

    #[test]
    fn scenario_flag_selects_one_and_players_are_clamped() {
        let picked = resolve_scenarios(&cli(&["--scenario", "duo", "--seed", "9", "--players", "12"]));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "duo");
        assert_eq!(picked[0].seed, 10);
        assert_eq!(picked[0].players, 4);

        let all = resolve_scenarios(&cli(&["--seed", "1", "--no-hazards"]));
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|scenario| !scenario.hazards && scenario.ghosts));
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("pacrush-missing-{}", now_ms()))
            .join("summary.json");
        let summary = RunSummary {
            started_at_ms: 1,
            finished_at_ms: 2,
            scenario_count: 0,
            anomaly_count: 0,
            total_ticks: 0,
            scenarios: Vec::new(),
        };
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same".to_string());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].tick, 11);
    }
}
