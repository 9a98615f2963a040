//! A single room: roster, live connections, settings, and round state.

use std::collections::HashMap;

use masquerade_transport::ConnectionId;
use tokio::time::Instant;

use crate::{RoomCode, RoomSettings};

/// One room's state. Owned exclusively by the [`RoomStore`](crate::RoomStore);
/// callers only ever see it through shared references.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    /// Name of the creator. Never changes, even after the creator's
    /// connection drops.
    host: String,
    /// Unique names in join order.
    players: Vec<String>,
    /// Live connections. At most one connection per name.
    connections: HashMap<ConnectionId, String>,
    settings: RoomSettings,
    /// `Some` only while a round is active.
    imposters: Option<Vec<String>>,
    created_at: Instant,
    last_activity: Instant,
}

impl Room {
    pub(crate) fn new(
        code: RoomCode,
        host: String,
        settings: RoomSettings,
        now: Instant,
    ) -> Self {
        Self {
            code,
            players: vec![host.clone()],
            host,
            connections: HashMap::new(),
            settings,
            imposters: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_host(&self, name: &str) -> bool {
        self.host == name
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn has_player(&self, name: &str) -> bool {
        self.players.iter().any(|p| p == name)
    }

    pub fn settings(&self) -> RoomSettings {
        self.settings
    }

    /// The active round's imposters, or `None` in the lobby.
    pub fn imposters(&self) -> Option<&[String]> {
        self.imposters.as_deref()
    }

    pub fn round_active(&self) -> bool {
        self.imposters.is_some()
    }

    /// The name a connection plays under, if it is attached here.
    pub fn player_for(&self, conn: ConnectionId) -> Option<&str> {
        self.connections.get(&conn).map(String::as_str)
    }

    /// The connection currently attached to `name`, if any.
    pub fn connection_of(&self, name: &str) -> Option<ConnectionId> {
        self.connections
            .iter()
            .find_map(|(conn, player)| (player == name).then_some(*conn))
    }

    /// Live connections and the names behind them.
    pub fn members(&self) -> impl Iterator<Item = (ConnectionId, &str)> {
        self.connections
            .iter()
            .map(|(conn, name)| (*conn, name.as_str()))
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Attaches `conn` as `name`, displacing whatever connection held that
    /// name before. Returns the displaced connection.
    pub(crate) fn attach(
        &mut self,
        conn: ConnectionId,
        name: &str,
    ) -> Option<ConnectionId> {
        let displaced = self.connection_of(name).filter(|old| *old != conn);
        if let Some(old) = displaced {
            self.connections.remove(&old);
        }
        if !self.has_player(name) {
            self.players.push(name.to_string());
        }
        self.connections.insert(conn, name.to_string());
        displaced
    }

    /// Detaches `conn` and drops its player from the roster.
    pub(crate) fn detach(&mut self, conn: ConnectionId) -> Option<String> {
        let name = self.connections.remove(&conn)?;
        self.players.retain(|p| *p != name);
        Some(name)
    }

    pub(crate) fn set_settings(&mut self, settings: RoomSettings) {
        self.settings = settings;
    }

    pub(crate) fn set_imposters(&mut self, imposters: Option<Vec<String>>) {
        self.imposters = imposters;
    }
}
