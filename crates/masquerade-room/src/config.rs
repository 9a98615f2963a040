//! Store configuration and per-room settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Limits and timeouts for the whole room store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum number of concurrently active rooms.
    pub max_rooms: usize,

    /// Idle time after which a room with players is evicted.
    pub idle_timeout: Duration,

    /// Idle time after which an empty room is evicted. Shorter than
    /// `idle_timeout`; this is the window a refreshing host has to return.
    pub empty_idle_timeout: Duration,

    /// Absolute lifetime of a room, regardless of activity.
    pub max_age: Duration,

    /// How often the expiry sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_rooms: 1000,
            idle_timeout: Duration::from_secs(30 * 60),
            empty_idle_timeout: Duration::from_secs(5 * 60),
            max_age: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// The host-controlled settings pair of a room.
///
/// Always constructed through [`RoomSettings::clamped`] or
/// [`RoomSettings::updated`], so `2 <= max_players <= 10` and
/// `1 <= num_imposters <= max_players / 2` hold for every value.
///
/// Deserializing goes through the same clamping, so settings read from a
/// file are held to the same bounds as settings from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSettings")]
pub struct RoomSettings {
    max_players: usize,
    num_imposters: usize,
}

/// Unchecked settings as written in a config file.
#[derive(Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    max_players: Option<i64>,
    num_imposters: Option<i64>,
}

impl From<RawSettings> for RoomSettings {
    fn from(raw: RawSettings) -> Self {
        Self::clamped(raw.max_players, raw.num_imposters)
    }
}

impl RoomSettings {
    /// Smallest allowed player cap.
    pub const MIN_PLAYERS: usize = 2;
    /// Largest allowed player cap.
    pub const MAX_PLAYERS: usize = 10;
    /// Player cap used when the caller gives none.
    pub const DEFAULT_MAX_PLAYERS: usize = Self::MAX_PLAYERS;
    /// Imposter count used when the caller gives none.
    pub const DEFAULT_NUM_IMPOSTERS: usize = 1;

    /// Builds settings from untrusted input, substituting defaults for
    /// missing values and clamping everything into range.
    pub fn clamped(max_players: Option<i64>, num_imposters: Option<i64>) -> Self {
        let max_players = clamp_count(
            max_players,
            Self::DEFAULT_MAX_PLAYERS,
            Self::MIN_PLAYERS,
            Self::MAX_PLAYERS,
        );
        let num_imposters = clamp_count(
            num_imposters,
            Self::DEFAULT_NUM_IMPOSTERS,
            1,
            max_players / 2,
        );
        Self {
            max_players,
            num_imposters,
        }
    }

    /// Applies an update; missing values keep their current setting.
    /// The imposter count is re-clamped against the new cap.
    pub fn updated(self, max_players: Option<i64>, num_imposters: Option<i64>) -> Self {
        Self::clamped(
            max_players.or(Some(self.max_players as i64)),
            num_imposters.or(Some(self.num_imposters as i64)),
        )
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn num_imposters(&self) -> usize {
        self.num_imposters
    }

    /// How many imposters a draw among `player_count` players yields.
    /// At least one player always stays crew.
    pub fn imposters_for(&self, player_count: usize) -> usize {
        self.num_imposters.min(player_count.saturating_sub(1))
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::clamped(None, None)
    }
}

fn clamp_count(value: Option<i64>, default: usize, min: usize, max: usize) -> usize {
    let value = value.unwrap_or(default as i64);
    value.clamp(min as i64, max as i64) as usize
}
