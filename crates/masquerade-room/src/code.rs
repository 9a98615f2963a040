//! Room codes and their generator.
//!
//! A room code is the only thing standing between a stranger and a seat in
//! someone's game, so codes come from the operating system's random source
//! rather than a seeded PRNG.

use std::borrow::Borrow;
use std::fmt;

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::RoomError;
use crate::validate::is_valid_room_code;

/// Number of characters in a room code.
pub const ROOM_CODE_LENGTH: usize = 8;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Bytes at or above this value are discarded so every symbol is equally
/// likely (252 is the largest multiple of 36 below 256).
const UNBIASED_LIMIT: u8 = 252;

/// A validated room code: 8 characters of `0-9A-Z`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(String);

impl RoomCode {
    /// Validates untrusted input.
    pub fn parse(code: &str) -> Result<Self, RoomError> {
        if is_valid_room_code(code) {
            Ok(Self(code.to_string()))
        } else {
            Err(RoomError::InvalidRoomCode)
        }
    }

    /// Draws a fresh code from the OS random source.
    ///
    /// Uniqueness against active rooms is the store's job.
    pub fn generate() -> Result<Self, RoomError> {
        let mut code = String::with_capacity(ROOM_CODE_LENGTH);
        let mut buf = [0u8; 2 * ROOM_CODE_LENGTH];

        while code.len() < ROOM_CODE_LENGTH {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| RoomError::Entropy(e.to_string()))?;
            for byte in buf.iter().copied().filter(|b| *b < UNBIASED_LIMIT) {
                if code.len() == ROOM_CODE_LENGTH {
                    break;
                }
                code.push(ALPHABET[usize::from(byte % 36)] as char);
            }
        }

        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoomCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
