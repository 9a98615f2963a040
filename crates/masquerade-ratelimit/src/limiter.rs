//! The rate limiter: last-seen timestamps per connection and action.
//!
//! Like the room store this is a plain single-owner value; the server
//! guards it with a mutex.

use std::collections::HashMap;

use masquerade_transport::ConnectionId;
use tokio::time::Instant;

use crate::{ActionKind, RateLimitConfig, RateLimitError};

/// Tracks when each connection last performed each throttled action.
#[derive(Debug)]
pub struct RateLimiter {
    entries: HashMap<ConnectionId, HashMap<ActionKind, Instant>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admits or denies `action` for `conn` at the current time.
    pub fn check(&mut self, conn: ConnectionId, action: ActionKind) -> Result<(), RateLimitError> {
        self.check_at(conn, action, Instant::now())
    }

    /// Admits `action` if at least its cooldown has passed since the last
    /// admitted one, and records `now`. Denied calls leave no trace, so a
    /// client hammering the server can't push its own window forward.
    pub fn check_at(
        &mut self,
        conn: ConnectionId,
        action: ActionKind,
        now: Instant,
    ) -> Result<(), RateLimitError> {
        let threshold = self.config.threshold(action);
        let seen = self.entries.entry(conn).or_default();

        if let Some(last) = seen.get(&action) {
            if now.saturating_duration_since(*last) < threshold {
                tracing::debug!(%conn, %action, "request throttled");
                return Err(RateLimitError::Throttled(action));
            }
        }
        seen.insert(action, now);
        Ok(())
    }

    /// Drops everything known about a connection. Returns whether there
    /// was anything to drop.
    pub fn forget(&mut self, conn: ConnectionId) -> bool {
        self.entries.remove(&conn).is_some()
    }

    /// Purges stale connections. See [`sweep_at`](Self::sweep_at).
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Removes connections whose every recorded action is older than
    /// [`RateLimitConfig::stale_after`]. Returns how many were removed.
    pub fn sweep_at(&mut self, now: Instant) -> usize {
        let stale_after = self.config.stale_after();
        let before = self.entries.len();
        self.entries.retain(|_, seen| {
            seen.values()
                .any(|last| now.saturating_duration_since(*last) <= stale_after)
        });
        let purged = before - self.entries.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = self.entries.len(), "rate limiter swept");
        }
        purged
    }

    /// Number of connections with at least one entry.
    pub fn tracked_connections(&self) -> usize {
        self.entries.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
