//! Input predicates applied wherever untrusted text enters the store.

use crate::code::ROOM_CODE_LENGTH;

/// Longest accepted display name, in characters.
pub const MAX_NAME_LENGTH: usize = 20;

/// `true` for exactly 8 characters drawn from `A-Z0-9`.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// `true` for 1 to 20 characters drawn from `A-Za-z0-9`, space, `_`, `-`.
///
/// Only the plain space is allowed as whitespace; tabs, newlines and other
/// control characters would end up verbatim in roster broadcasts.
pub fn is_valid_player_name(name: &str) -> bool {
    (1..=MAX_NAME_LENGTH).contains(&name.chars().count())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
}
