use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use pacrush_server::constants::TICK_MS;
use pacrush_server::engine::{Room, RoomOptions};
use pacrush_server::ranking_store::RankingStore;
use pacrush_server::registry::{LeaveOutcome, RoomRegistry};
use pacrush_server::server_protocol::{parse_client_message, ParsedClientMessage};
use pacrush_server::server_utils::now_ms;
use pacrush_server::types::{GameOverSummary, Snapshot};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const OUTBOUND_QUEUE_CAPACITY: usize = 256;

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    // Set when a state patch was dropped; the next broadcast leads with the full grid.
    needs_full_grid: bool,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

// What one room produced during a tick. Built inside the unwind guard.
struct RoomTick {
    snapshot: Option<Snapshot>,
    game_overs: Vec<GameOverSummary>,
    match_ended: bool,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    registry: RoomRegistry,
    ranking_store: RankingStore,
    stale_clients: Vec<String>,
}

impl ServerState {
    fn new(ranking_store: RankingStore) -> Self {
        Self {
            clients: HashMap::new(),
            registry: RoomRegistry::new(RoomOptions::default()),
            ranking_store,
            stale_clients: Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let leaderboard_path = std::env::var("LEADERBOARD_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/leaderboard.json"));

    let state = Arc::new(Mutex::new(ServerState::new(RankingStore::new(
        leaderboard_path,
    ))));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/ws", get(ws_handler))
        .with_state(state.clone());

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        tracing::info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)))
    } else {
        tracing::warn!("STATIC_DIR not set or missing index.html; serving API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(port, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.lock().await.ranking_store.flush();
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "panic");
    }));
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn resolve_static_dir() -> Option<PathBuf> {
    let path = PathBuf::from(std::env::var("STATIC_DIR").ok()?);
    path.join("index.html").is_file().then_some(path)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn leaderboard_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(guard.ranking_store.build_response())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("player");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE_CAPACITY);

    {
        let mut guard = state.lock().await;
        register_client(&mut guard, &client_id, tx.clone());
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        let text = match message {
            Message::Text(raw) => raw.to_string(),
            Message::Binary(raw) => match String::from_utf8(raw.to_vec()) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Message::Close(_) => break,
            _ => continue,
        };

        let mut guard = state.lock().await;
        if !guard.clients.contains_key(&client_id) {
            break;
        }
        handle_client_message(&mut guard, &client_id, &text);
        reap_stale_clients(&mut guard);
    }

    {
        let mut guard = state.lock().await;
        disconnect_client(&mut guard, &client_id);
        reap_stale_clients(&mut guard);
    }
    drop(tx);
    let _ = writer.await;
}

fn register_client(state: &mut ServerState, client_id: &str, tx: mpsc::Sender<OutboundMessage>) {
    state
        .clients
        .insert(
            client_id.to_string(),
            ClientContext {
                tx,
                needs_full_grid: false,
            },
        );
    tracing::debug!(client = client_id, "client connected");
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "welcome",
            "playerId": client_id,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    let leaderboard = state.ranking_store.leaderboard().entries().to_vec();
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "leaderboard",
            "entries": leaderboard,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

// Malformed messages are dropped silently.
fn handle_client_message(state: &mut ServerState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        tracing::debug!(client = client_id, "dropping malformed message");
        return;
    };

    match message {
        ParsedClientMessage::CreateRoom { name } => {
            match state.registry.create_room(client_id, &name) {
                Ok(room_id) => broadcast_lobby(state, &room_id),
                Err(error) => send_error(state, client_id, &error.to_string()),
            }
        }
        ParsedClientMessage::JoinRoom { code, name } => {
            match state.registry.join_room(client_id, &code, &name) {
                Ok((room_id, _slot)) => broadcast_lobby(state, &room_id),
                Err(error) => {
                    tracing::debug!(client = client_id, %error, "join rejected");
                    send_error(state, client_id, &error.to_string());
                }
            }
        }
        ParsedClientMessage::Start => match state.registry.start_match(client_id) {
            Ok(room_id) => announce_match_start(state, &room_id),
            Err(error) => {
                tracing::debug!(client = client_id, %error, "start rejected");
                send_error(state, client_id, &error.to_string());
            }
        },
        ParsedClientMessage::Input { dir } => {
            state.registry.submit_input(client_id, dir);
        }
        ParsedClientMessage::Leave => {
            let outcome = state.registry.leave(client_id);
            announce_leave(state, outcome);
        }
        ParsedClientMessage::Resync => {
            let grid = state
                .registry
                .room_of(client_id)
                .and_then(|room_id| state.registry.room(room_id))
                .filter(|room| !room.is_lobby())
                .map(Room::build_full_grid);
            if let Some(grid) = grid {
                if let Some(client) = state.clients.get_mut(client_id) {
                    client.needs_full_grid = false;
                }
                send_to_client(
                    state,
                    client_id,
                    &json!({
                        "type": "full_grid",
                        "grid": grid,
                    }),
                    QueuePolicy::DisconnectOnFull,
                );
            }
        }
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                state,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }
}

fn announce_match_start(state: &mut ServerState, room_id: &str) {
    let Some(room) = state.registry.room(room_id) else {
        return;
    };
    let grid = room.build_full_grid();
    let members = state.registry.members(room_id);
    broadcast_to(
        state,
        &members,
        &json!({
            "type": "game_started",
            "roomId": room_id,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    broadcast_to(
        state,
        &members,
        &json!({
            "type": "full_grid",
            "grid": grid,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn announce_leave(state: &mut ServerState, outcome: LeaveOutcome) {
    match outcome {
        LeaveOutcome::NotInRoom | LeaveOutcome::ForfeitedMatch { .. } => {}
        LeaveOutcome::LeftLobby { room_id } => broadcast_lobby(state, &room_id),
        LeaveOutcome::RoomClosed { room_id, members } => {
            broadcast_to(
                state,
                &members,
                &json!({
                    "type": "room_closed",
                    "roomId": room_id,
                    "reason": "host left",
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }
}

fn disconnect_client(state: &mut ServerState, client_id: &str) {
    if state.clients.remove(client_id).is_none() {
        return;
    }
    tracing::debug!(client = client_id, "client disconnected");
    let outcome = state.registry.leave(client_id);
    announce_leave(state, outcome);
}

// Clients whose control-message queue overflowed are dropped here, outside the send path.
fn reap_stale_clients(state: &mut ServerState) {
    while let Some(client_id) = state.stale_clients.pop() {
        if let Some(client) = state.clients.get(&client_id) {
            let _ = client.tx.try_send(OutboundMessage::Close {
                code: 4008,
                reason: "outbound queue full".to_string(),
            });
        }
        disconnect_client(state, &client_id);
    }
}

fn broadcast_lobby(state: &mut ServerState, room_id: &str) {
    let Some(room) = state.registry.room(room_id) else {
        return;
    };
    let payload = json!({
        "type": "lobby",
        "roomId": room_id,
        "hostId": room.host_id(),
        "players": room.lobby_players(),
    });
    let members = state.registry.members(room_id);
    broadcast_to(state, &members, &payload, QueuePolicy::DisconnectOnFull);
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_rooms(&mut guard, now_ms());
            reap_stale_clients(&mut guard);
        }
    });
}

fn step_room(room: &mut Room, now: u64) -> RoomTick {
    room.step();
    let snapshot = room.should_broadcast().then(|| room.build_snapshot(now));
    RoomTick {
        snapshot,
        game_overs: room.drain_game_overs(),
        match_ended: room.take_match_ended(),
    }
}

fn tick_rooms(state: &mut ServerState, now: u64) {
    let mut leaderboard_changed = false;

    for room_id in state.registry.room_ids() {
        let outcome = {
            let Some(room) = state.registry.room_mut(&room_id) else {
                continue;
            };
            catch_unwind(AssertUnwindSafe(|| step_room(room, now)))
        };

        let tick = match outcome {
            Ok(tick) => tick,
            Err(_) => {
                tracing::error!(room = %room_id, "room step panicked; closing room");
                let members = state.registry.members(&room_id);
                state.registry.remove_room(&room_id);
                broadcast_to(
                    state,
                    &members,
                    &json!({
                        "type": "room_closed",
                        "roomId": room_id,
                        "reason": "internal error",
                    }),
                    QueuePolicy::DisconnectOnFull,
                );
                continue;
            }
        };

        let members = state.registry.members(&room_id);
        if let Some(snapshot) = tick.snapshot {
            resend_full_grids(state, &room_id, &members);
            broadcast_to(
                state,
                &members,
                &json!({
                    "type": "state",
                    "snapshot": snapshot,
                }),
                QueuePolicy::DropOnFull,
            );
        }

        for mut summary in tick.game_overs {
            summary.rank = state
                .ranking_store
                .record_result(&summary.name, summary.score, now);
            leaderboard_changed |= summary.rank.is_some();
            tracing::info!(
                room = %room_id,
                player = %summary.player_id,
                score = summary.score,
                rank = ?summary.rank,
                "game over recorded"
            );
            let player_id = summary.player_id.clone();
            send_to_client(
                state,
                &player_id,
                &json!({
                    "type": "game_over",
                    "summary": summary,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }

        if tick.match_ended {
            broadcast_to(
                state,
                &members,
                &json!({
                    "type": "match_ended",
                    "roomId": room_id,
                }),
                QueuePolicy::DisconnectOnFull,
            );
            state.registry.prune_departed(&room_id);
            broadcast_lobby(state, &room_id);
        }
    }

    if leaderboard_changed {
        let entries = state.ranking_store.leaderboard().entries().to_vec();
        let everyone: Vec<String> = state.clients.keys().cloned().collect();
        broadcast_to(
            state,
            &everyone,
            &json!({
                "type": "leaderboard",
                "entries": entries,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }
    state.ranking_store.flush_if_due(now);
}

fn send_error(state: &mut ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

// Members that lost a patch catch up on the whole grid before the next one.
fn resend_full_grids(state: &mut ServerState, room_id: &str, members: &[String]) {
    let behind: Vec<String> = members
        .iter()
        .filter(|id| {
            state
                .clients
                .get(id.as_str())
                .is_some_and(|client| client.needs_full_grid)
        })
        .cloned()
        .collect();
    if behind.is_empty() {
        return;
    }
    let Some(grid) = state.registry.room(room_id).map(Room::build_full_grid) else {
        return;
    };
    for client_id in &behind {
        if let Some(client) = state.clients.get_mut(client_id) {
            client.needs_full_grid = false;
        }
    }
    tracing::debug!(room = %room_id, clients = behind.len(), "resending full grid");
    broadcast_to(
        state,
        &behind,
        &json!({
            "type": "full_grid",
            "grid": grid,
        }),
        QueuePolicy::DropOnFull,
    );
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    broadcast_to(state, &[client_id.to_string()], message, policy);
}

fn broadcast_to(state: &mut ServerState, client_ids: &[String], message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    for client_id in client_ids {
        let Some(client) = state.clients.get_mut(client_id) else {
            continue;
        };
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_ok()
        {
            continue;
        }
        match policy {
            QueuePolicy::DropOnFull => client.needs_full_grid = true,
            QueuePolicy::DisconnectOnFull => state.stale_clients.push(client_id.clone()),
        }
    }
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(state: &mut ServerState, id: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        register_client(state, id, tx);
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let OutboundMessage::Text(text) = message {
                messages.push(serde_json::from_str(&text).expect("outbound json"));
            }
        }
        messages
    }

    fn types(messages: &[Value]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|message| message["type"].as_str().map(str::to_string))
            .collect()
    }

    fn room_code(messages: &[Value]) -> String {
        messages
            .iter()
            .find(|message| message["type"] == "lobby")
            .and_then(|message| message["roomId"].as_str())
            .expect("lobby message")
            .to_string()
    }

    #[test]
    fn connect_sends_welcome_and_leaderboard() {
        let mut state = ServerState::new(RankingStore::in_memory());
        let mut rx = connect(&mut state, "player_a");
        assert_eq!(types(&drain(&mut rx)), vec!["welcome", "leaderboard"]);
    }

    #[test]
    fn lobby_flow_reaches_every_member() {
        let mut state = ServerState::new(RankingStore::in_memory());
        let mut host = connect(&mut state, "host");
        let mut guest = connect(&mut state, "guest");
        drain(&mut host);
        drain(&mut guest);

        handle_client_message(&mut state, "host", r#"{"type":"create_room","name":"ann"}"#);
        let code = room_code(&drain(&mut host));
        let join = format!(r#"{{"type":"join_room","code":"{}","name":"bo"}}"#, code.to_lowercase());
        handle_client_message(&mut state, "guest", &join);

        let lobby = drain(&mut guest);
        assert_eq!(lobby[0]["players"].as_array().map(Vec::len), Some(2));
        assert_eq!(lobby[0]["players"][0]["name"], "ANN");
        drain(&mut host);

        handle_client_message(&mut state, "guest", r#"{"type":"start"}"#);
        assert_eq!(types(&drain(&mut guest)), vec!["error"]);

        handle_client_message(&mut state, "host", r#"{"type":"start"}"#);
        assert_eq!(types(&drain(&mut guest)), vec!["game_started", "full_grid"]);
        assert_eq!(types(&drain(&mut host)), vec!["game_started", "full_grid"]);

        for tick in 0..4 {
            tick_rooms(&mut state, tick);
        }
        assert_eq!(types(&drain(&mut guest)), vec!["state", "state"]);
    }

    #[test]
    fn unknown_code_is_rejected_with_message() {
        let mut state = ServerState::new(RankingStore::in_memory());
        let mut rx = connect(&mut state, "solo");
        drain(&mut rx);
        handle_client_message(&mut state, "solo", r#"{"type":"join_room","code":"QQQQQ"}"#);
        let messages = drain(&mut rx);
        assert_eq!(messages[0]["type"], "error");
        assert_eq!(messages[0]["message"], "Lobby not found");
    }

    #[test]
    fn host_disconnect_closes_the_room() {
        let mut state = ServerState::new(RankingStore::in_memory());
        let mut host = connect(&mut state, "host");
        let mut guest = connect(&mut state, "guest");
        handle_client_message(&mut state, "host", r#"{"type":"create_room"}"#);
        let code = room_code(&drain(&mut host));
        handle_client_message(
            &mut state,
            "guest",
            &format!(r#"{{"type":"join_room","code":"{code}"}}"#),
        );
        drain(&mut guest);

        disconnect_client(&mut state, "host");
        let messages = drain(&mut guest);
        assert_eq!(types(&messages), vec!["room_closed"]);
        assert!(state.registry.is_empty());
        assert_eq!(state.registry.room_of("guest"), None);
    }

    #[test]
    fn full_control_queue_disconnects_the_client() {
        let mut state = ServerState::new(RankingStore::in_memory());
        let (tx, _rx) = mpsc::channel(1);
        register_client(&mut state, "slow", tx);
        reap_stale_clients(&mut state);
        assert!(!state.clients.contains_key("slow"));
    }

    #[test]
    fn dropped_patch_is_followed_by_a_full_grid() {
        let mut state = ServerState::new(RankingStore::in_memory());
        let (tx, mut rx) = mpsc::channel(8);
        register_client(&mut state, "host", tx);
        handle_client_message(&mut state, "host", r#"{"type":"create_room"}"#);
        handle_client_message(&mut state, "host", r#"{"type":"start"}"#);
        drain(&mut rx);

        let filler = state.clients["host"].tx.clone();
        while filler.try_send(OutboundMessage::Text("{}".to_string())).is_ok() {}
        for tick in 0..2 {
            tick_rooms(&mut state, tick);
        }
        assert!(state.clients.contains_key("host"));
        assert!(state.clients["host"].needs_full_grid);

        drain(&mut rx);
        for tick in 2..4 {
            tick_rooms(&mut state, tick);
        }
        assert_eq!(types(&drain(&mut rx)), vec!["full_grid", "state"]);
        assert!(!state.clients["host"].needs_full_grid);
    }

    #[test]
    fn ping_is_answered_with_pong() {
        let mut state = ServerState::new(RankingStore::in_memory());
        let mut rx = connect(&mut state, "p");
        drain(&mut rx);
        handle_client_message(&mut state, "p", r#"{"type":"ping","t":5}"#);
        let messages = drain(&mut rx);
        assert_eq!(messages[0]["type"], "pong");
        assert_eq!(messages[0]["t"], 5.0);
    }
}
