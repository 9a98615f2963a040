//! Timer-driven cleanup of the room store and the rate limiter.
//!
//! Both sweeps take the same lock the connection handlers use, so a sweep
//! never interleaves with a request. A room evicted between two requests
//! simply looks "not found" to the second one.

use std::sync::Arc;
use std::time::Duration;

use masquerade_ratelimit::RateLimiter;
use masquerade_room::RoomStore;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Shortest accepted sweep period; `interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Evicts expired rooms every `every`.
pub fn spawn_room_sweeper(rooms: Arc<Mutex<RoomStore>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every.max(MIN_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let mut rooms = rooms.lock().await;
            let evicted = rooms.sweep();
            if !evicted.is_empty() {
                tracing::info!(
                    evicted = evicted.len(),
                    remaining = rooms.room_count(),
                    "room sweep"
                );
            }
        }
    })
}

/// Purges stale rate-limit entries every `every`.
pub fn spawn_limiter_sweeper(limiter: Arc<Mutex<RateLimiter>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every.max(MIN_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            limiter.lock().await.sweep();
        }
    })
}
