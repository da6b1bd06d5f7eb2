use rand::Rng;

use crate::types::MAX_NAME_LENGTH;

/// Unambiguous code alphabet (no 0/O or 1/I to avoid confusion when read aloud).
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LENGTH: usize = 5;

/// Room codes are case-insensitive on the wire; canonical form is uppercase.
pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Trimmed, length-capped display name; empty means "missing".
pub fn sanitize_display_name(raw: &str) -> String {
    let value = raw.trim();
    value.chars().take(MAX_NAME_LENGTH).collect()
}

pub fn sanitize_password(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Key used to detect a fake card's cover story textually resembling a real
/// card's truth: lowercase, quotes stripped, non-alphanumeric runs collapsed
/// to single spaces, trimmed.
pub fn conflict_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.to_lowercase().chars() {
        if matches!(ch, '\'' | '"' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}') {
            continue;
        }

        if ch.is_alphanumeric() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            key.push(ch);
        } else {
            pending_space = true;
        }
    }

    key
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
