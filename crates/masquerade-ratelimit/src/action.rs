//! Throttled action kinds and their cooldowns.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The inbound requests that are subject to rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CreateRoom,
    JoinRoom,
    StartGame,
    RevealImposters,
    PlayAgain,
    UpdateSettings,
    /// A frame that didn't decode as any event. Charged so that garbage
    /// earns at most one error reply per window.
    InvalidFrame,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        Self::CreateRoom,
        Self::JoinRoom,
        Self::StartGame,
        Self::RevealImposters,
        Self::PlayAgain,
        Self::UpdateSettings,
        Self::InvalidFrame,
    ];

    /// The wire name of the event this action comes from, or
    /// `invalid-frame` for undecodable input.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRoom => "create-room",
            Self::JoinRoom => "join-room",
            Self::StartGame => "start-game",
            Self::RevealImposters => "reveal-imposters",
            Self::PlayAgain => "play-again",
            Self::UpdateSettings => "update-settings",
            Self::InvalidFrame => "invalid-frame",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum spacing between two requests of the same kind from one
/// connection, plus sweep tuning.
///
/// Room creation allocates the most and gets the longest cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub create_room: Duration,
    pub join_room: Duration,
    pub start_game: Duration,
    pub reveal_imposters: Duration,
    pub play_again: Duration,
    pub update_settings: Duration,
    pub invalid_frame: Duration,

    /// A connection is purged by the sweep once all its entries are older
    /// than `stale_factor` times the largest cooldown.
    pub stale_factor: u32,

    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            create_room: Duration::from_secs(2),
            join_room: Duration::from_secs(1),
            start_game: Duration::from_secs(1),
            reveal_imposters: Duration::from_millis(500),
            play_again: Duration::from_secs(1),
            update_settings: Duration::from_millis(250),
            invalid_frame: Duration::from_secs(1),
            stale_factor: 30,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// A config with every cooldown set to zero. Handy in tests.
    pub fn disabled() -> Self {
        Self {
            create_room: Duration::ZERO,
            join_room: Duration::ZERO,
            start_game: Duration::ZERO,
            reveal_imposters: Duration::ZERO,
            play_again: Duration::ZERO,
            update_settings: Duration::ZERO,
            invalid_frame: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn threshold(&self, action: ActionKind) -> Duration {
        match action {
            ActionKind::CreateRoom => self.create_room,
            ActionKind::JoinRoom => self.join_room,
            ActionKind::StartGame => self.start_game,
            ActionKind::RevealImposters => self.reveal_imposters,
            ActionKind::PlayAgain => self.play_again,
            ActionKind::UpdateSettings => self.update_settings,
            ActionKind::InvalidFrame => self.invalid_frame,
        }
    }

    /// Age past which an entry no longer matters to anyone.
    pub fn stale_after(&self) -> Duration {
        let largest = ActionKind::ALL
            .iter()
            .map(|action| self.threshold(*action))
            .max()
            .unwrap_or_default();
        largest.saturating_mul(self.stale_factor)
    }
}
