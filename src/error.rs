use std::fmt;

// Protocol misuse rejected at the lobby boundary. Nothing is mutated on these paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomError {
    NotFound,
    Full,
    AlreadyStarted,
    NotHost,
    AlreadyInRoom,
    NotInRoom,
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NotFound => "Lobby not found",
            Self::Full => "Lobby full",
            Self::AlreadyStarted => "Game already started",
            Self::NotHost => "Only the host can start the game",
            Self::AlreadyInRoom => "Already in a lobby",
            Self::NotInRoom => "Not in a lobby",
        };
        f.write_str(message)
    }
}

impl std::error::Error for RoomError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(RoomError::NotFound.to_string(), "Lobby not found");
        assert_eq!(RoomError::Full.to_string(), "Lobby full");
        assert_eq!(RoomError::AlreadyStarted.to_string(), "Game already started");
    }
}
