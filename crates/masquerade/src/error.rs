//! Unified error type for the Masquerade server.

use masquerade_protocol::ProtocolError;
use masquerade_ratelimit::RateLimitError;
use masquerade_room::RoomError;
use masquerade_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` lift sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum MasqueradeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rejected room operation.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A throttled request.
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}
