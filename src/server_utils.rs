use crate::constants::{NAME_MAX_CHARS, ROOM_CODE_LEN};

// Lobby display name. Empty input falls back to the seat label.
pub fn sanitize_nickname(value: &str, color_idx: usize) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return format!("P{}", color_idx + 1);
    }
    trimmed
        .chars()
        .take(NAME_MAX_CHARS)
        .collect::<String>()
        .to_uppercase()
}

pub fn sanitize_leaderboard_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "PLAYER".to_string();
    }
    trimmed
        .chars()
        .take(NAME_MAX_CHARS)
        .collect::<String>()
        .to_uppercase()
}

// Codes are typed by hand, so case and surrounding whitespace are forgiven.
pub fn normalize_room_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    let valid = code.len() == ROOM_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(code)
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_trims_truncates_and_uppercases() {
        assert_eq!(sanitize_nickname("", 0), "P1");
        assert_eq!(sanitize_nickname("   ", 2), "P3");
        assert_eq!(sanitize_nickname(" alice ", 0), "ALICE");
        assert_eq!(sanitize_nickname("abcdefghijklmnop", 1), "ABCDEFGHIJ");
    }

    #[test]
    fn leaderboard_name_defaults_to_player() {
        assert_eq!(sanitize_leaderboard_name(""), "PLAYER");
        assert_eq!(sanitize_leaderboard_name("bob"), "BOB");
        assert_eq!(sanitize_leaderboard_name("12345678901"), "1234567890");
    }

    #[test]
    fn room_code_normalization() {
        assert_eq!(normalize_room_code(" ab3cd "), Some("AB3CD".to_string()));
        assert_eq!(normalize_room_code("ABCD"), None);
        assert_eq!(normalize_room_code("AB-CD"), None);
        assert_eq!(normalize_room_code(""), None);
    }
}
