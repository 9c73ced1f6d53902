use std::collections::HashMap;

use rand::Rng as _;

use crate::constants::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
use crate::engine::{Room, RoomOptions};
use crate::error::RoomError;
use crate::rng::{RandomSource, Rng};
use crate::server_utils::normalize_room_code;
use crate::types::Direction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    NotInRoom,
    LeftLobby { room_id: String },
    ForfeitedMatch { room_id: String },
    // The host left; every listed member has been detached.
    RoomClosed { room_id: String, members: Vec<String> },
}

/// Owns every live room and which room each connected player belongs to.
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    member_rooms: HashMap<String, String>,
    options: RoomOptions,
}

impl RoomRegistry {
    pub fn new(options: RoomOptions) -> Self {
        Self {
            rooms: HashMap::new(),
            member_rooms: HashMap::new(),
            options,
        }
    }

    pub fn create_room(&mut self, host_id: &str, nickname: &str) -> Result<String, RoomError> {
        self.create_room_with(host_id, nickname, Box::new(Rng::from_entropy()))
    }

    pub fn create_room_with(
        &mut self,
        host_id: &str,
        nickname: &str,
        rng: Box<dyn RandomSource>,
    ) -> Result<String, RoomError> {
        if self.member_rooms.contains_key(host_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        let code = self.fresh_code();
        let mut room = Room::new(code.clone(), host_id, rng, self.options);
        room.add_player(host_id, nickname)?;
        self.rooms.insert(code.clone(), room);
        self.member_rooms.insert(host_id.to_string(), code.clone());
        tracing::info!(room = %code, host = host_id, "room created");
        Ok(code)
    }

    pub fn join_room(
        &mut self,
        player_id: &str,
        raw_code: &str,
        nickname: &str,
    ) -> Result<(String, usize), RoomError> {
        if self.member_rooms.contains_key(player_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        let code = normalize_room_code(raw_code).ok_or(RoomError::NotFound)?;
        let room = self.rooms.get_mut(&code).ok_or(RoomError::NotFound)?;
        let slot = room.add_player(player_id, nickname)?;
        self.member_rooms.insert(player_id.to_string(), code.clone());
        tracing::debug!(room = %code, player = player_id, slot, "player joined");
        Ok((code, slot))
    }

    pub fn start_match(&mut self, player_id: &str) -> Result<String, RoomError> {
        let code = self
            .member_rooms
            .get(player_id)
            .cloned()
            .ok_or(RoomError::NotInRoom)?;
        let room = self.rooms.get_mut(&code).ok_or(RoomError::NotFound)?;
        room.start(player_id)?;
        Ok(code)
    }

    pub fn submit_input(&mut self, player_id: &str, dir: Direction) {
        let Some(code) = self.member_rooms.get(player_id) else {
            return;
        };
        if let Some(room) = self.rooms.get_mut(code) {
            room.set_input(player_id, dir);
        }
    }

    pub fn leave(&mut self, player_id: &str) -> LeaveOutcome {
        let Some(code) = self.member_rooms.remove(player_id) else {
            return LeaveOutcome::NotInRoom;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return LeaveOutcome::NotInRoom;
        };

        if room.host_id() == player_id {
            let members = self.members(&code);
            self.remove_room(&code);
            tracing::info!(room = %code, "host left, room closed");
            return LeaveOutcome::RoomClosed {
                room_id: code,
                members,
            };
        }

        let in_lobby = room.is_lobby();
        room.remove_player(player_id);
        if in_lobby {
            LeaveOutcome::LeftLobby { room_id: code }
        } else {
            LeaveOutcome::ForfeitedMatch { room_id: code }
        }
    }

    /// Frees the seats of players who left while the match was running. Call once the room is
    /// back in the lobby.
    pub fn prune_departed(&mut self, room_id: &str) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        if !room.is_lobby() {
            return;
        }
        for player_id in room.player_ids() {
            let still_member = self.member_rooms.get(&player_id).map(String::as_str) == Some(room_id);
            if !still_member {
                room.remove_player(&player_id);
            }
        }
    }

    // Connected players seated in the room.
    pub fn members(&self, room_id: &str) -> Vec<String> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        room.player_ids()
            .into_iter()
            .filter(|id| self.member_rooms.get(id).map(String::as_str) == Some(room_id))
            .collect()
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    pub fn room_of(&self, player_id: &str) -> Option<&str> {
        self.member_rooms.get(player_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Destroys a room and detaches everyone still mapped to it.
    pub fn remove_room(&mut self, room_id: &str) -> Option<Room> {
        let room = self.rooms.remove(room_id)?;
        self.member_rooms.retain(|_, code| code != room_id);
        Some(room)
    }

    fn fresh_code(&self) -> String {
        let mut rng = rand::rng();
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}
