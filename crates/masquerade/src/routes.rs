//! Event routing: one inbound event in, addressed outbound events out.
//!
//! Routing is synchronous and works on a `&mut RoomStore`, so the whole
//! request/response contract can be exercised without sockets. The
//! connection handler takes care of locking, throttling, and delivery.

use masquerade_protocol::{
    ClientEvent, CreateRoomPayload, GameStarted, JoinRoomPayload, Role, RoomCreated, RoomJoined,
    ServerEvent, SettingsPayload, UpdateSettingsPayload,
};
use masquerade_ratelimit::ActionKind;
use masquerade_room::{CreateRoom, Departure, Room, RoomError, RoomSettings, RoomStore, UpdateSettings};
use masquerade_transport::ConnectionId;

/// Outbound events produced by one routed request, in send order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outbox {
    messages: Vec<(ConnectionId, ServerEvent)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_to(&mut self, conn: ConnectionId, event: ServerEvent) {
        self.messages.push((conn, event));
    }

    /// Queues `event` for every connection attached to `room`.
    pub fn broadcast(&mut self, room: &Room, event: &ServerEvent) {
        for (conn, _) in room.members() {
            self.send_to(conn, event.clone());
        }
    }

    /// Queues `event` for every connection in `room` except `except`.
    pub fn broadcast_except(&mut self, room: &Room, except: ConnectionId, event: &ServerEvent) {
        for (conn, _) in room.members().filter(|(conn, _)| *conn != except) {
            self.send_to(conn, event.clone());
        }
    }

    /// Events addressed to `conn`, in order.
    pub fn to(&self, conn: ConnectionId) -> impl Iterator<Item = &ServerEvent> {
        self.messages
            .iter()
            .filter(move |(to, _)| *to == conn)
            .map(|(_, event)| event)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl IntoIterator for Outbox {
    type Item = (ConnectionId, ServerEvent);
    type IntoIter = std::vec::IntoIter<(ConnectionId, ServerEvent)>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

/// The throttling bucket an inbound event is charged to.
pub fn action_kind(event: &ClientEvent) -> ActionKind {
    match event {
        ClientEvent::CreateRoom(_) => ActionKind::CreateRoom,
        ClientEvent::JoinRoom(_) => ActionKind::JoinRoom,
        ClientEvent::StartGame(_) => ActionKind::StartGame,
        ClientEvent::RevealImposters(_) => ActionKind::RevealImposters,
        ClientEvent::PlayAgain(_) => ActionKind::PlayAgain,
        ClientEvent::UpdateSettings(_) => ActionKind::UpdateSettings,
    }
}

/// Applies one inbound event from `conn` to the store.
///
/// A rejected request yields a single `error` event for `conn` and leaves
/// the store untouched.
pub fn route(store: &mut RoomStore, conn: ConnectionId, event: ClientEvent) -> Outbox {
    let mut outbox = Outbox::new();
    let result = match event {
        ClientEvent::CreateRoom(payload) => create_room(store, conn, payload, &mut outbox),
        ClientEvent::JoinRoom(payload) => join_room(store, conn, payload, &mut outbox),
        ClientEvent::StartGame(room) => start_game(store, conn, room.code(), &mut outbox),
        ClientEvent::RevealImposters(room) => reveal_imposters(store, conn, room.code(), &mut outbox),
        ClientEvent::PlayAgain(room) => play_again(store, conn, room.code(), &mut outbox),
        ClientEvent::UpdateSettings(payload) => update_settings(store, conn, payload, &mut outbox),
    };

    if let Err(e) = result {
        tracing::debug!(%conn, error = %e, "request rejected");
        outbox = Outbox::new();
        outbox.send_to(conn, ServerEvent::Error(e.to_string()));
    }
    outbox
}

/// Detaches a closed connection and tells the rest of its room.
pub fn disconnect(store: &mut RoomStore, conn: ConnectionId) -> Outbox {
    let mut outbox = Outbox::new();
    if let Some(departure) = store.remove_connection(conn) {
        announce_departure(store, &departure, &mut outbox);
    }
    outbox
}

fn create_room(
    store: &mut RoomStore,
    conn: ConnectionId,
    payload: CreateRoomPayload,
    outbox: &mut Outbox,
) -> Result<(), RoomError> {
    let options = payload.into_options();
    let host_name = options.player_name;
    let code = store.create_room(CreateRoom {
        host_name: host_name.clone(),
        max_players: options.max_players,
        num_imposters: options.num_imposters,
        requested_code: options.room_code,
    })?;
    // The host is already on the roster, so this takes the rejoin path.
    let joined = store.join_room(code.as_str(), &host_name, conn)?;

    let settings = existing(store, code.as_str())?.settings();
    outbox.send_to(
        conn,
        ServerEvent::RoomCreated(RoomCreated {
            room_code: code.to_string(),
            player_name: host_name.clone(),
            host_name,
            max_players: settings.max_players(),
            num_imposters: settings.num_imposters(),
        }),
    );
    if let Some(left) = &joined.left {
        announce_departure(store, left, outbox);
    }
    Ok(())
}

fn join_room(
    store: &mut RoomStore,
    conn: ConnectionId,
    payload: JoinRoomPayload,
    outbox: &mut Outbox,
) -> Result<(), RoomError> {
    let joined = store.join_room(&payload.room_code, &payload.player_name, conn)?;

    let room = existing(store, joined.code.as_str())?;
    let settings = room.settings();
    outbox.send_to(
        conn,
        ServerEvent::RoomJoined(RoomJoined {
            room_code: joined.code.to_string(),
            players: room.players().to_vec(),
            host_name: room.host().to_string(),
            max_players: settings.max_players(),
            num_imposters: settings.num_imposters(),
            is_host: room.is_host(&payload.player_name),
        }),
    );
    outbox.broadcast_except(room, conn, &roster(room));

    if let Some(left) = &joined.left {
        announce_departure(store, left, outbox);
    }
    Ok(())
}

fn start_game(
    store: &mut RoomStore,
    conn: ConnectionId,
    code: &str,
    outbox: &mut Outbox,
) -> Result<(), RoomError> {
    let players = store.authorize_host(code, conn, "start the game")?.players().len();
    if players < RoomSettings::MIN_PLAYERS {
        return Err(RoomError::NotEnoughPlayers(RoomSettings::MIN_PLAYERS));
    }
    let imposters = store.select_imposters(code)?;

    // Each connection learns its own role. Imposters also learn each
    // other; crew members learn only how many imposters there are.
    let room = existing(store, code)?;
    for (member, name) in room.members() {
        let is_imposter = imposters.iter().any(|imposter| imposter == name);
        let started = if is_imposter {
            GameStarted {
                role: Role::Imposter,
                total_imposters: imposters.len(),
                imposters: imposters
                    .iter()
                    .filter(|imposter| *imposter != name)
                    .cloned()
                    .collect(),
            }
        } else {
            GameStarted {
                role: Role::Player,
                total_imposters: imposters.len(),
                imposters: Vec::new(),
            }
        };
        outbox.send_to(member, ServerEvent::GameStarted(started));
    }
    Ok(())
}

fn reveal_imposters(
    store: &mut RoomStore,
    conn: ConnectionId,
    code: &str,
    outbox: &mut Outbox,
) -> Result<(), RoomError> {
    store.authorize_member(code, conn)?;
    // No active round: nothing to reveal, and nothing to complain about.
    let Some(imposters) = store.reveal_imposters(code)? else {
        return Ok(());
    };
    outbox.broadcast(
        existing(store, code)?,
        &ServerEvent::ImpostersRevealed { imposters },
    );
    Ok(())
}

fn play_again(
    store: &mut RoomStore,
    conn: ConnectionId,
    code: &str,
    outbox: &mut Outbox,
) -> Result<(), RoomError> {
    store.authorize_host(code, conn, "restart the game")?;
    store.reset_round(code)?;
    outbox.broadcast(existing(store, code)?, &ServerEvent::GameReset);
    Ok(())
}

fn update_settings(
    store: &mut RoomStore,
    conn: ConnectionId,
    payload: UpdateSettingsPayload,
    outbox: &mut Outbox,
) -> Result<(), RoomError> {
    let code = payload.room_code.as_str();
    store.authorize_host(code, conn, "change the settings")?;
    let settings = store.update_settings(
        code,
        UpdateSettings {
            max_players: payload.max_players,
            num_imposters: payload.num_imposters,
        },
    )?;
    outbox.broadcast(
        existing(store, code)?,
        &ServerEvent::SettingsUpdated(SettingsPayload {
            max_players: settings.max_players(),
            num_imposters: settings.num_imposters(),
        }),
    );
    Ok(())
}

fn announce_departure(store: &RoomStore, departure: &Departure, outbox: &mut Outbox) {
    if let Some(room) = store.room(departure.code.as_str()) {
        outbox.broadcast(room, &roster(room));
    }
}

fn roster(room: &Room) -> ServerEvent {
    ServerEvent::PlayersUpdated {
        players: room.players().to_vec(),
    }
}

fn existing<'a>(store: &'a RoomStore, code: &str) -> Result<&'a Room, RoomError> {
    store
        .room(code)
        .ok_or_else(|| RoomError::NotFound(code.to_string()))
}
