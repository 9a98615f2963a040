//! Wire protocol for Masquerade.
//!
//! This crate defines what travels over a connection:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): one variant per
//!   semantic channel, serialized as `{"event": ..., "data": ...}`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events are turned
//!   into text frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! Inbound payloads are deliberately forgiving about their shape (a bare
//! name or a settings object, numbers or numeric strings). The server
//! normalizes them into typed room commands before anything reaches the
//! room store.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, CreateRoomOptions, CreateRoomPayload, GameStarted,
    JoinRoomPayload, Role, RoomCreated, RoomJoined, RoomRef, ServerEvent,
    SettingsPayload, UpdateSettingsPayload,
};
