//! # Masquerade
//!
//! A real-time room server for imposter-style party games.
//!
//! Players gather in a short-lived room identified by an 8-character code.
//! The host configures the room and starts a round; the server secretly
//! draws the imposters and tells each player only their own role. Reveal
//! and play-again close the loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use masquerade::prelude::*;
//!
//! # async fn start() -> Result<(), MasqueradeError> {
//! let server = MasqueradeServer::builder()
//!     .bind("0.0.0.0:3001")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! The request/response contract lives in [`routes`], which works against
//! a plain [`RoomStore`](masquerade_room::RoomStore) and can be driven
//! without a network.

mod error;
mod handler;
mod hub;
pub mod routes;
mod server;
pub mod sweeper;

pub use error::MasqueradeError;
pub use server::{MasqueradeServer, MasqueradeServerBuilder};

/// Everything needed to run a server or drive the store directly.
pub mod prelude {
    pub use crate::routes::{Outbox, disconnect, route};
    pub use crate::{MasqueradeError, MasqueradeServer, MasqueradeServerBuilder};

    pub use masquerade_protocol::{ClientEvent, Codec, JsonCodec, Role, ServerEvent};
    pub use masquerade_ratelimit::{ActionKind, RateLimitConfig, RateLimitError, RateLimiter};
    pub use masquerade_room::{RoomConfig, RoomError, RoomSettings, RoomStore};
    pub use masquerade_transport::ConnectionId;
}
