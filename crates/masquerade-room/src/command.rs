//! Typed commands: the store's view of inbound requests.
//!
//! The server builds these from whatever shape arrived on the wire; the
//! store never sees raw payloads. Numeric fields stay `Option<i64>` so
//! that absent, negative, or oversized values reach the clamping logic in
//! [`RoomSettings`](crate::RoomSettings) intact.

/// Request to open a new room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRoom {
    pub host_name: String,
    pub max_players: Option<i64>,
    pub num_imposters: Option<i64>,
    /// Reuse this code instead of generating one.
    pub requested_code: Option<String>,
}

impl CreateRoom {
    /// A request with default settings and a generated code.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            ..Self::default()
        }
    }

    pub fn max_players(mut self, max_players: i64) -> Self {
        self.max_players = Some(max_players);
        self
    }

    pub fn num_imposters(mut self, num_imposters: i64) -> Self {
        self.num_imposters = Some(num_imposters);
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.requested_code = Some(code.into());
        self
    }
}

/// Request to change a room's settings. Missing fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSettings {
    pub max_players: Option<i64>,
    pub num_imposters: Option<i64>,
}
