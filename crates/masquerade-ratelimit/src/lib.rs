//! Request throttling for Masquerade.
//!
//! Each connection gets an independent cooldown per [`ActionKind`]: a
//! `create-room` right after a `join-room` is fine, two `create-room`s in
//! a row are not. Denied requests are dropped, never queued.
//!
//! Memory is bounded twice over: the server calls
//! [`RateLimiter::forget`] on disconnect, and [`RateLimiter::sweep`]
//! purges connections whose every entry has gone stale, in case a
//! disconnect was never observed.

mod action;
mod error;
mod limiter;

pub use action::{ActionKind, RateLimitConfig};
pub use error::RateLimitError;
pub use limiter::RateLimiter;
