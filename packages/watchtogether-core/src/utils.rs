//! Small shared helpers: clock access, room-id normalization, string sanitization.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol_constants::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN, ROOM_ID_MAX_LEN};

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

/// Normalizes a client-submitted room id: uppercase, strip non-alphanumerics,
/// clamp to [`ROOM_ID_MAX_LEN`]. If the result is empty, generates a random
/// room code from [`ROOM_CODE_ALPHABET`].
#[must_use]
pub fn normalize_room_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(ROOM_ID_MAX_LEN)
        .collect();

    if cleaned.is_empty() {
        generate_room_code()
    } else {
        cleaned
    }
}

/// Generates a random room code from the readable alphabet.
#[must_use]
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Trims a nickname and clamps it to the maximum length, falling back to a
/// generated `Viewer-XX` placeholder if empty after trimming.
#[must_use]
pub fn sanitize_nickname(raw: &str, max_len: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        let mut rng = rand::thread_rng();
        format!("Viewer-{:02}", rng.gen_range(0..100))
    } else {
        trimmed.chars().take(max_len).collect()
    }
}

/// Trims and clamps a free-form string field (room name, password) to a max length.
#[must_use]
pub fn clamp_field(raw: &str, max_len: usize) -> String {
    raw.trim().chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_room_id_uppercases_and_strips() {
        assert_eq!(normalize_room_id("my-room!1"), "MYROOM1");
    }

    #[test]
    fn normalize_room_id_clamps_length() {
        assert_eq!(normalize_room_id("abcdefghijklmnop").len(), ROOM_ID_MAX_LEN);
    }

    #[test]
    fn normalize_room_id_generates_code_when_empty() {
        let id = normalize_room_id("!!!");
        assert_eq!(id.len(), ROOM_CODE_LEN);
        assert!(id.chars().all(|c| ROOM_CODE_ALPHABET.contains(&(c as u8))));
    }

    #[test]
    fn sanitize_nickname_falls_back_when_blank() {
        let nick = sanitize_nickname("   ", 24);
        assert!(nick.starts_with("Viewer-"));
    }

    #[test]
    fn sanitize_nickname_truncates_long_input() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_nickname(&long, 24).len(), 24);
    }
}
