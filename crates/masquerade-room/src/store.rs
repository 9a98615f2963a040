//! The room store: every room, and every mutation of every room.
//!
//! # Concurrency note
//!
//! `RoomStore` is a plain single-owner value. Each operation runs to
//! completion without awaiting, so wrapping the store in one mutex (as the
//! server does) makes every operation atomic with respect to the others,
//! including the expiry sweep.

use std::collections::HashMap;

use masquerade_transport::ConnectionId;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::time::Instant;

use crate::validate::{is_valid_player_name, is_valid_room_code};
use crate::{
    CreateRoom, Room, RoomCode, RoomConfig, RoomError, RoomSettings,
    UpdateSettings,
};

/// A player leaving a room because their connection went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub code: RoomCode,
    pub player_name: String,
}

/// Result of a successful [`RoomStore::join_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub code: RoomCode,
    /// The name was already on the roster (reconnection path).
    pub rejoined: bool,
    /// An older connection that held the same name and was detached.
    pub displaced: Option<ConnectionId>,
    /// The room this connection was in before, if it was a different one.
    pub left: Option<Departure>,
}

/// All active rooms, keyed by code, plus a connection → room index.
#[derive(Debug)]
pub struct RoomStore {
    rooms: HashMap<RoomCode, Room>,
    /// Each connection is attached to at most one room.
    connections: HashMap<ConnectionId, RoomCode>,
    config: RoomConfig,
}

impl RoomStore {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            connections: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with `cmd.host_name` as host and sole player.
    ///
    /// The host's connection is not attached here; callers follow up
    /// with [`join_room`](Self::join_room), which takes the reconnection
    /// path because the host is already on the roster.
    pub fn create_room(&mut self, cmd: CreateRoom) -> Result<RoomCode, RoomError> {
        if !is_valid_player_name(&cmd.host_name) {
            return Err(RoomError::InvalidPlayerName);
        }
        if self.rooms.len() >= self.config.max_rooms {
            tracing::warn!(rooms = self.rooms.len(), "room limit reached");
            return Err(RoomError::AtCapacity);
        }
        let code = match cmd.requested_code.as_deref() {
            Some(requested) => {
                let code = RoomCode::parse(requested)?;
                if self.rooms.contains_key(&code) {
                    return Err(RoomError::CodeTaken(code.to_string()));
                }
                code
            }
            None => self.unused_code()?,
        };

        let settings = RoomSettings::clamped(cmd.max_players, cmd.num_imposters);
        let room = Room::new(code.clone(), cmd.host_name, settings, Instant::now());
        tracing::info!(
            room_code = %code,
            host = room.host(),
            max_players = settings.max_players(),
            num_imposters = settings.num_imposters(),
            "room created"
        );
        self.rooms.insert(code.clone(), room);
        Ok(code)
    }

    /// Attaches `conn` to a room as `name`.
    ///
    /// A name already on the roster is a reconnection: the previous
    /// connection for that name is displaced and the capacity check is
    /// skipped, so the roster never grows. If `conn` was attached to a
    /// different room it leaves that room first.
    pub fn join_room(
        &mut self,
        code: &str,
        name: &str,
        conn: ConnectionId,
    ) -> Result<Joined, RoomError> {
        let room = self.lookup(code)?;
        if !is_valid_player_name(name) {
            return Err(RoomError::InvalidPlayerName);
        }
        if let Some(current) = room.player_for(conn) {
            if current != name {
                return Err(RoomError::AlreadyInRoom(
                    current.to_string(),
                    code.to_string(),
                ));
            }
        }
        let rejoined = room.has_player(name);
        if !rejoined && room.is_full() {
            tracing::debug!(
                room_code = code,
                players = room.players().len(),
                "join rejected, room full"
            );
            return Err(RoomError::RoomFull(code.to_string()));
        }
        let code = room.code().clone();

        // Validation done; mutate.
        let in_other_room = self
            .connections
            .get(&conn)
            .is_some_and(|previous| *previous != code);
        let left = if in_other_room {
            self.remove_connection(conn)
        } else {
            None
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return Err(RoomError::NotFound(code.to_string()));
        };
        let displaced = room.attach(conn, name);
        room.touch(Instant::now());
        let players = room.players().len();

        if let Some(old) = displaced {
            self.connections.remove(&old);
            tracing::info!(room_code = %code, player = name, %old, %conn, "connection displaced");
        }
        self.connections.insert(conn, code.clone());
        tracing::info!(room_code = %code, player = name, %conn, players, rejoined, "player joined");

        Ok(Joined {
            code,
            rejoined,
            displaced,
            left,
        })
    }

    /// Detaches a connection and removes its player from the roster.
    ///
    /// Emptied rooms are kept; the sweeper removes them after the shorter
    /// empty-room timeout, which gives a refreshing host time to come back.
    pub fn remove_connection(&mut self, conn: ConnectionId) -> Option<Departure> {
        let code = self.connections.remove(&conn)?;
        let room = self.rooms.get_mut(&code)?;
        let player_name = room.detach(conn)?;
        room.touch(Instant::now());
        tracing::info!(
            room_code = %code,
            player = %player_name,
            players = room.players().len(),
            "player left"
        );
        Some(Departure { code, player_name })
    }

    /// Draws this round's imposters with the thread-local CSPRNG.
    pub fn select_imposters(&mut self, code: &str) -> Result<Vec<String>, RoomError> {
        self.select_imposters_with(code, &mut rand::rng())
    }

    /// Draws `min(num_imposters, players - 1)` distinct players uniformly
    /// at random and stores them as the round's imposters, replacing any
    /// previous round.
    pub fn select_imposters_with<R: Rng + ?Sized>(
        &mut self,
        code: &str,
        rng: &mut R,
    ) -> Result<Vec<String>, RoomError> {
        let room = self.lookup_mut(code)?;
        let count = room.settings().imposters_for(room.players().len());

        let mut drawn = room.players().to_vec();
        drawn.shuffle(rng);
        drawn.truncate(count);

        room.set_imposters(Some(drawn.clone()));
        room.touch(Instant::now());
        tracing::info!(
            room_code = code,
            players = room.players().len(),
            imposters = count,
            "round started"
        );
        Ok(drawn)
    }

    /// The active round's imposters, or `None` when no round is active.
    pub fn reveal_imposters(&self, code: &str) -> Result<Option<Vec<String>>, RoomError> {
        Ok(self.lookup(code)?.imposters().map(<[String]>::to_vec))
    }

    /// Clears the round. Returns whether a round was active; resetting a
    /// room that is already in the lobby is a no-op.
    pub fn reset_round(&mut self, code: &str) -> Result<bool, RoomError> {
        let room = self.lookup_mut(code)?;
        let was_active = room.round_active();
        room.set_imposters(None);
        room.touch(Instant::now());
        tracing::info!(room_code = code, was_active, "round reset");
        Ok(was_active)
    }

    /// Re-clamps and stores new settings. Players beyond a lowered cap
    /// stay; the cap only applies to future joins.
    pub fn update_settings(
        &mut self,
        code: &str,
        cmd: UpdateSettings,
    ) -> Result<RoomSettings, RoomError> {
        let room = self.lookup_mut(code)?;
        let settings = room.settings().updated(cmd.max_players, cmd.num_imposters);
        room.set_settings(settings);
        room.touch(Instant::now());
        tracing::info!(
            room_code = code,
            max_players = settings.max_players(),
            num_imposters = settings.num_imposters(),
            "settings updated"
        );
        Ok(settings)
    }

    /// `true` only for the name that created the room.
    pub fn is_host(&self, code: &str, name: &str) -> bool {
        self.rooms.get(code).is_some_and(|room| room.is_host(name))
    }

    /// Resolves `conn` to a member of the room, failing unless that member
    /// is the host. `action` completes the sentence "only the host can ...".
    pub fn authorize_host(
        &self,
        code: &str,
        conn: ConnectionId,
        action: &'static str,
    ) -> Result<&Room, RoomError> {
        let room = self.authorize_member(code, conn)?;
        match room.player_for(conn) {
            Some(name) if room.is_host(name) => Ok(room),
            _ => Err(RoomError::NotHost(action)),
        }
    }

    /// Resolves `conn` to a member of the room.
    pub fn authorize_member(&self, code: &str, conn: ConnectionId) -> Result<&Room, RoomError> {
        let room = self.lookup(code)?;
        if room.player_for(conn).is_none() {
            return Err(RoomError::NotInRoom(code.to_string()));
        }
        Ok(room)
    }

    /// Evicts stale rooms. See [`sweep_at`](Self::sweep_at).
    pub fn sweep(&mut self) -> Vec<RoomCode> {
        self.sweep_at(Instant::now())
    }

    /// Evicts every room idle past its timeout (short when empty, long
    /// otherwise) or older than `max_age`. Returns the evicted codes.
    pub fn sweep_at(&mut self, now: Instant) -> Vec<RoomCode> {
        let config = &self.config;
        let expired: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| {
                let idle_limit = if room.players().is_empty() {
                    config.empty_idle_timeout
                } else {
                    config.idle_timeout
                };
                now.saturating_duration_since(room.last_activity()) > idle_limit
                    || now.saturating_duration_since(room.created_at()) > config.max_age
            })
            .map(|room| room.code().clone())
            .collect();

        for code in &expired {
            if let Some(room) = self.rooms.remove(code) {
                for (conn, _) in room.members() {
                    self.connections.remove(&conn);
                }
                tracing::info!(
                    room_code = %code,
                    players = room.players().len(),
                    "room expired"
                );
            }
        }
        expired
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// The room a connection is attached to.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomCode> {
        self.connections.get(&conn)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn lookup(&self, code: &str) -> Result<&Room, RoomError> {
        if !is_valid_room_code(code) {
            return Err(RoomError::InvalidRoomCode);
        }
        self.rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.to_string()))
    }

    fn lookup_mut(&mut self, code: &str) -> Result<&mut Room, RoomError> {
        if !is_valid_room_code(code) {
            return Err(RoomError::InvalidRoomCode);
        }
        self.rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.to_string()))
    }

    fn unused_code(&self) -> Result<RoomCode, RoomError> {
        loop {
            let code = RoomCode::generate()?;
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    /// Creates a room hosted by "ana" on conn-1.
    fn store_with_room() -> (RoomStore, String) {
        let mut store = RoomStore::default();
        let code = store.create_room(CreateRoom::new("ana")).unwrap();
        store.join_room(code.as_str(), "ana", conn(1)).unwrap();
        (store, code.to_string())
    }

    // =====================================================================
    // create_room()
    // =====================================================================

    #[test]
    fn test_create_room_valid_host_returns_code_and_lists_host() {
        let mut store = RoomStore::default();
        let code = store.create_room(CreateRoom::new("ana")).unwrap();

        assert!(is_valid_room_code(code.as_str()));
        let room = store.room(code.as_str()).unwrap();
        assert_eq!(room.players(), ["ana"]);
        assert_eq!(room.host(), "ana");
        assert!(room.imposters().is_none());
    }

    #[test]
    fn test_create_room_invalid_name_is_rejected() {
        let mut store = RoomStore::default();
        assert_eq!(
            store.create_room(CreateRoom::new("bad\nname")),
            Err(RoomError::InvalidPlayerName)
        );
        assert_eq!(store.room_count(), 0);
    }

    #[test]
    fn test_create_room_clamps_settings() {
        let mut store = RoomStore::default();
        let code = store
            .create_room(CreateRoom::new("ana").max_players(4).num_imposters(5))
            .unwrap();
        let settings = store.room(code.as_str()).unwrap().settings();
        assert_eq!(settings.max_players(), 4);
        assert_eq!(settings.num_imposters(), 2);
    }

    #[test]
    fn test_create_room_requested_code_used_once() {
        let mut store = RoomStore::default();
        let code = store.create_room(CreateRoom::new("ana").code("ZZZZ9999")).unwrap();
        assert_eq!(code.as_str(), "ZZZZ9999");

        assert_eq!(
            store.create_room(CreateRoom::new("bo").code("ZZZZ9999")),
            Err(RoomError::CodeTaken("ZZZZ9999".into()))
        );
        assert_eq!(
            store.create_room(CreateRoom::new("bo").code("zzzz9999")),
            Err(RoomError::InvalidRoomCode)
        );
        assert_eq!(store.room_count(), 1);
    }

    #[test]
    fn test_create_room_at_capacity_is_rejected() {
        let mut store = RoomStore::new(RoomConfig {
            max_rooms: 2,
            ..RoomConfig::default()
        });
        store.create_room(CreateRoom::new("a")).unwrap();
        store.create_room(CreateRoom::new("b")).unwrap();
        assert_eq!(
            store.create_room(CreateRoom::new("c")),
            Err(RoomError::AtCapacity)
        );
    }

    // =====================================================================
    // join_room()
    // =====================================================================

    #[test]
    fn test_join_room_unknown_or_malformed_code_is_rejected() {
        let mut store = RoomStore::default();
        assert_eq!(
            store.join_room("NOPE0000", "bo", conn(2)),
            Err(RoomError::NotFound("NOPE0000".into()))
        );
        assert_eq!(
            store.join_room("nope", "bo", conn(2)),
            Err(RoomError::InvalidRoomCode)
        );
    }

    #[test]
    fn test_join_room_invalid_name_is_rejected() {
        let (mut store, code) = store_with_room();
        assert_eq!(
            store.join_room(&code, "", conn(2)),
            Err(RoomError::InvalidPlayerName)
        );
        assert_eq!(store.room(&code).unwrap().players(), ["ana"]);
    }

    #[test]
    fn test_join_room_appends_new_player() {
        let (mut store, code) = store_with_room();
        let joined = store.join_room(&code, "bo", conn(2)).unwrap();
        assert!(!joined.rejoined);
        assert_eq!(joined.displaced, None);
        assert_eq!(store.room(&code).unwrap().players(), ["ana", "bo"]);
        assert_eq!(store.room_of(conn(2)).map(RoomCode::as_str), Some(code.as_str()));
    }

    #[test]
    fn test_join_room_same_name_displaces_previous_connection() {
        let (mut store, code) = store_with_room();
        store.join_room(&code, "bo", conn(2)).unwrap();

        let joined = store.join_room(&code, "bo", conn(3)).unwrap();
        assert!(joined.rejoined);
        assert_eq!(joined.displaced, Some(conn(2)));
        assert_eq!(store.room(&code).unwrap().players(), ["ana", "bo"]);
        assert_eq!(store.room_of(conn(2)), None);

        // The stale connection's late disconnect must not evict "bo".
        assert_eq!(store.remove_connection(conn(2)), None);
        assert_eq!(store.room(&code).unwrap().players(), ["ana", "bo"]);
    }

    #[test]
    fn test_join_room_same_connection_other_name_is_conflict() {
        let (mut store, code) = store_with_room();
        assert_eq!(
            store.join_room(&code, "impostor", conn(1)),
            Err(RoomError::AlreadyInRoom("ana".into(), code.clone()))
        );
    }

    #[test]
    fn test_join_room_other_room_leaves_previous_room() {
        let (mut store, first) = store_with_room();
        store.join_room(&first, "bo", conn(2)).unwrap();
        let second = store.create_room(CreateRoom::new("cy")).unwrap();

        let joined = store.join_room(second.as_str(), "bo", conn(2)).unwrap();
        let left = joined.left.expect("left the first room");
        assert_eq!(left.code.as_str(), first);
        assert_eq!(left.player_name, "bo");
        assert_eq!(store.room(&first).unwrap().players(), ["ana"]);
        assert_eq!(store.room_of(conn(2)), Some(&second));
    }

    #[test]
    fn test_join_room_full_room_rejects_failed_join_without_side_effects() {
        let (mut store, first) = store_with_room();
        store.join_room(&first, "bo", conn(2)).unwrap();
        let small = store.create_room(CreateRoom::new("cy").max_players(2)).unwrap();
        store.join_room(small.as_str(), "dee", conn(4)).unwrap();

        assert_eq!(
            store.join_room(small.as_str(), "bo", conn(2)),
            Err(RoomError::RoomFull(small.to_string()))
        );
        // Rejected join must not have pulled bo out of the first room.
        assert_eq!(store.room(&first).unwrap().players(), ["ana", "bo"]);
        assert_eq!(store.room_of(conn(2)).map(RoomCode::as_str), Some(first.as_str()));
    }

    // =====================================================================
    // remove_connection()
    // =====================================================================

    #[test]
    fn test_remove_connection_keeps_empty_room() {
        let (mut store, code) = store_with_room();
        let departure = store.remove_connection(conn(1)).unwrap();
        assert_eq!(departure.player_name, "ana");
        let room = store.room(&code).expect("room survives until swept");
        assert!(room.players().is_empty());
        assert!(store.is_host(&code, "ana"));
    }

    #[test]
    fn test_remove_connection_unknown_is_none() {
        let mut store = RoomStore::default();
        assert_eq!(store.remove_connection(conn(9)), None);
    }

    // =====================================================================
    // rounds
    // =====================================================================

    #[test]
    fn test_select_imposters_draws_clamped_count_from_players() {
        let mut store = RoomStore::default();
        let code = store
            .create_room(CreateRoom::new("p0").num_imposters(4))
            .unwrap();
        for i in 1..5 {
            store.join_room(code.as_str(), &format!("p{i}"), conn(i)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = store.select_imposters_with(code.as_str(), &mut rng).unwrap();

        assert_eq!(drawn.len(), 4);
        let room = store.room(code.as_str()).unwrap();
        assert!(drawn.iter().all(|name| room.has_player(name)));
        let mut unique = drawn.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), drawn.len());
    }

    #[test]
    fn test_reveal_returns_stored_round_until_reset() {
        let (mut store, code) = store_with_room();
        store.join_room(&code, "bo", conn(2)).unwrap();

        assert_eq!(store.reveal_imposters(&code), Ok(None));
        let drawn = store.select_imposters(&code).unwrap();
        assert_eq!(store.reveal_imposters(&code), Ok(Some(drawn)));

        assert_eq!(store.reset_round(&code), Ok(true));
        assert_eq!(store.reveal_imposters(&code), Ok(None));
        assert_eq!(store.reset_round(&code), Ok(false));
        assert_eq!(store.room(&code).unwrap().players(), ["ana", "bo"]);
    }

    #[test]
    fn test_select_imposters_overwrites_previous_round() {
        let (mut store, code) = store_with_room();
        for (i, name) in ["bo", "cy", "dee", "eve"].iter().enumerate() {
            store.join_room(&code, name, conn(i as u64 + 2)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(1);
        store.select_imposters_with(&code, &mut rng).unwrap();
        let second = store.select_imposters_with(&code, &mut rng).unwrap();
        assert_eq!(store.reveal_imposters(&code), Ok(Some(second)));
    }

    // =====================================================================
    // settings & authority
    // =====================================================================

    #[test]
    fn test_update_settings_does_not_evict_players() {
        let (mut store, code) = store_with_room();
        for (i, name) in ["bo", "cy", "dee"].iter().enumerate() {
            store.join_room(&code, name, conn(i as u64 + 2)).unwrap();
        }
        let settings = store
            .update_settings(&code, UpdateSettings { max_players: Some(2), num_imposters: Some(3) })
            .unwrap();
        assert_eq!((settings.max_players(), settings.num_imposters()), (2, 1));
        assert_eq!(store.room(&code).unwrap().players().len(), 4);
        assert_eq!(
            store.join_room(&code, "fay", conn(9)),
            Err(RoomError::RoomFull(code.clone()))
        );
    }

    #[test]
    fn test_authorize_host_checks_name_behind_connection() {
        let (mut store, code) = store_with_room();
        store.join_room(&code, "bo", conn(2)).unwrap();

        assert!(store.authorize_host(&code, conn(1), "start the game").is_ok());
        assert_eq!(
            store.authorize_host(&code, conn(2), "start the game").unwrap_err(),
            RoomError::NotHost("start the game")
        );
        assert_eq!(
            store.authorize_host(&code, conn(7), "start the game").unwrap_err(),
            RoomError::NotInRoom(code.clone())
        );
    }

    // =====================================================================
    // sweep_at()
    // =====================================================================

    #[test]
    fn test_sweep_evicts_idle_empty_room_before_active_one() {
        let mut store = RoomStore::default();
        let empty = store.create_room(CreateRoom::new("ana")).unwrap();
        store.join_room(empty.as_str(), "ana", conn(1)).unwrap();
        store.remove_connection(conn(1));
        let busy = store.create_room(CreateRoom::new("bo")).unwrap();
        store.join_room(busy.as_str(), "bo", conn(2)).unwrap();

        let later = Instant::now() + Duration::from_secs(6 * 60);
        assert_eq!(store.sweep_at(later), vec![empty.clone()]);
        assert!(store.room(busy.as_str()).is_some());

        let much_later = Instant::now() + Duration::from_secs(31 * 60);
        assert_eq!(store.sweep_at(much_later), vec![busy.clone()]);
        assert_eq!(store.room_of(conn(2)), None);
    }

    #[test]
    fn test_sweep_evicts_rooms_past_max_age_despite_activity() {
        let mut store = RoomStore::new(RoomConfig {
            idle_timeout: Duration::from_secs(24 * 60 * 60),
            max_age: Duration::from_secs(60 * 60),
            ..RoomConfig::default()
        });
        let code = store.create_room(CreateRoom::new("ana")).unwrap();
        store.join_room(code.as_str(), "ana", conn(1)).unwrap();

        let just_before = Instant::now() + Duration::from_secs(59 * 60);
        assert!(store.sweep_at(just_before).is_empty());
        let after = Instant::now() + Duration::from_secs(61 * 60);
        assert_eq!(store.sweep_at(after), vec![code]);
    }
}
