//! Error types for the room layer.
//!
//! The `Display` text of each variant is what the player sees, so the
//! messages are written for people rather than logs.

/// Errors that can occur during room operations.
///
/// Every operation validates before it mutates, so the store is unchanged
/// whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room code is not 8 characters of `A-Z0-9`.
    #[error("invalid room code")]
    InvalidRoomCode,

    /// The player name is empty, too long, or has disallowed characters.
    #[error("invalid name: use 1-20 letters, digits, spaces, '-' or '_'")]
    InvalidPlayerName,

    /// No active room has this code.
    #[error("room {0} not found")]
    NotFound(String),

    /// The room has no free player slots.
    #[error("room {0} is full")]
    RoomFull(String),

    /// The store already holds its maximum number of rooms.
    #[error("too many active rooms, try again later")]
    AtCapacity,

    /// A caller-supplied room code belongs to an active room.
    #[error("room code {0} is already in use")]
    CodeTaken(String),

    /// This connection already plays under a different name in the room.
    #[error("already in room {1} as {0}")]
    AlreadyInRoom(String, String),

    /// A non-host attempted a host-only action.
    #[error("only the host can {0}")]
    NotHost(&'static str),

    /// The connection is not a member of the room.
    #[error("not a member of room {0}")]
    NotInRoom(String),

    /// Too few players for a round.
    #[error("need at least {0} players to start")]
    NotEnoughPlayers(usize),

    /// The OS random source failed.
    #[error("could not generate a room code: {0}")]
    Entropy(String),
}
