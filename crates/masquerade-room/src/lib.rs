//! Room lifecycle and role assignment for Masquerade.
//!
//! Everything that has an invariant lives here: unique room codes, roster
//! capacity, host authority by name, uniform imposter draws, and the
//! two-tier expiry policy.
//!
//! # Key types
//!
//! - [`RoomStore`]: owns every room and performs every mutation
//! - [`Room`]: one room's roster, connections, settings, and round
//! - [`RoomCode`]: validated 8-character code, generated from the OS RNG
//! - [`RoomSettings`] / [`RoomConfig`]: clamped per-room settings and
//!   store-wide limits
//! - [`CreateRoom`] / [`UpdateSettings`]: typed commands

mod code;
mod command;
mod config;
mod error;
mod room;
mod store;
pub mod validate;

pub use code::{ROOM_CODE_LENGTH, RoomCode};
pub use command::{CreateRoom, UpdateSettings};
pub use config::{RoomConfig, RoomSettings};
pub use error::RoomError;
pub use room::Room;
pub use store::{Departure, Joined, RoomStore};
