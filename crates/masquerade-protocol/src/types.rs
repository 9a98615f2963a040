//! Event types for Masquerade's wire format.
//!
//! Every frame is an adjacently tagged envelope:
//!
//! ```text
//! {"event": "join-room", "data": {"roomCode": "K3X9QZ2A", "playerName": "ana"}}
//! ```
//!
//! Events without a payload (`game-reset`) omit `data`.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Inbound: client → server
// ---------------------------------------------------------------------------

/// Events a client can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Create a room and become its host.
    CreateRoom(CreateRoomPayload),
    /// Join (or rejoin) a room by code.
    JoinRoom(JoinRoomPayload),
    /// Host only: draw imposters and start a round.
    StartGame(RoomRef),
    /// Reveal the current round's imposters to the room.
    RevealImposters(RoomRef),
    /// Host only: clear the round and return to the lobby.
    PlayAgain(RoomRef),
    /// Host only: change the room's player cap and imposter count.
    UpdateSettings(UpdateSettingsPayload),
}

/// The `create-room` payload: either a bare player name or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreateRoomPayload {
    Name(String),
    Options(CreateRoomOptions),
}

/// The object form of `create-room`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomOptions {
    pub player_name: String,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub max_players: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub num_imposters: Option<i64>,
    /// A code the client would like to reuse (e.g. from a shared link).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
}

impl CreateRoomPayload {
    /// Flattens both shapes into the object form.
    pub fn into_options(self) -> CreateRoomOptions {
        match self {
            Self::Name(player_name) => CreateRoomOptions {
                player_name,
                ..CreateRoomOptions::default()
            },
            Self::Options(options) => options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_code: String,
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsPayload {
    pub room_code: String,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub max_players: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub num_imposters: Option<i64>,
}

/// A room reference: a bare code string or `{"roomCode": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomRef {
    Code(String),
    Object {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
}

impl RoomRef {
    /// The referenced room code, unvalidated.
    pub fn code(&self) -> &str {
        match self {
            Self::Code(code) | Self::Object { room_code: code } => code,
        }
    }
}

/// Accepts integers, floats, and numeric strings. Anything else is treated
/// as "not supplied" so the room layer falls back to its default.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => Some(n),
        Some(Loose::Float(f)) if f.is_finite() => Some(f.trunc() as i64),
        Some(Loose::Text(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Outbound: server → client
// ---------------------------------------------------------------------------

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Reply to the creator.
    RoomCreated(RoomCreated),
    /// Reply to a joining (or rejoining) player.
    RoomJoined(RoomJoined),
    /// Roster changed; sent to the other members.
    PlayersUpdated { players: Vec<String> },
    /// Personalized per connection at round start.
    GameStarted(GameStarted),
    /// The round's full imposter list, to everyone.
    ImpostersRevealed { imposters: Vec<String> },
    /// The round was cleared.
    GameReset,
    /// Authoritative (clamped) settings, to everyone.
    SettingsUpdated(SettingsPayload),
    /// A human-readable rejection for the originating connection.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub room_code: String,
    pub player_name: String,
    pub host_name: String,
    pub max_players: usize,
    pub num_imposters: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    pub room_code: String,
    pub players: Vec<String>,
    pub host_name: String,
    pub max_players: usize,
    pub num_imposters: usize,
    pub is_host: bool,
}

/// A player's private view of a freshly started round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStarted {
    pub role: Role,
    pub total_imposters: usize,
    /// Fellow imposters. Always empty for non-imposters.
    pub imposters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    pub max_players: usize,
    pub num_imposters: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Imposter,
    Player,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> ClientEvent {
        serde_json::from_value(value).expect("should decode")
    }

    #[test]
    fn test_create_room_accepts_bare_name() {
        let event = decode(json!({"event": "create-room", "data": "ana"}));
        let ClientEvent::CreateRoom(payload) = event else {
            panic!("expected create-room");
        };
        let options = payload.into_options();
        assert_eq!(options.player_name, "ana");
        assert_eq!(options.max_players, None);
        assert_eq!(options.room_code, None);
    }

    #[test]
    fn test_create_room_accepts_settings_object() {
        let event = decode(json!({
            "event": "create-room",
            "data": {"playerName": "ana", "maxPlayers": 4, "numImposters": "2", "roomCode": "ABCD1234"}
        }));
        let ClientEvent::CreateRoom(payload) = event else {
            panic!("expected create-room");
        };
        let options = payload.into_options();
        assert_eq!(options.max_players, Some(4));
        assert_eq!(options.num_imposters, Some(2));
        assert_eq!(options.room_code.as_deref(), Some("ABCD1234"));
    }

    #[test]
    fn test_lenient_count_treats_garbage_as_missing() {
        let event = decode(json!({
            "event": "update-settings",
            "data": {"roomCode": "ABCD1234", "maxPlayers": "lots", "numImposters": [1]}
        }));
        assert_eq!(
            event,
            ClientEvent::UpdateSettings(UpdateSettingsPayload {
                room_code: "ABCD1234".into(),
                max_players: None,
                num_imposters: None,
            })
        );
    }

    #[test]
    fn test_lenient_count_truncates_floats_and_keeps_negatives() {
        let event = decode(json!({
            "event": "update-settings",
            "data": {"roomCode": "ABCD1234", "maxPlayers": 6.9, "numImposters": -3}
        }));
        let ClientEvent::UpdateSettings(payload) = event else {
            panic!("expected update-settings");
        };
        assert_eq!(payload.max_players, Some(6));
        assert_eq!(payload.num_imposters, Some(-3));
    }

    #[test]
    fn test_room_ref_accepts_string_or_object() {
        let bare = decode(json!({"event": "play-again", "data": "ABCD1234"}));
        let object = decode(json!({"event": "play-again", "data": {"roomCode": "ABCD1234"}}));
        let (ClientEvent::PlayAgain(a), ClientEvent::PlayAgain(b)) = (bare, object) else {
            panic!("expected play-again");
        };
        assert_eq!(a.code(), "ABCD1234");
        assert_eq!(b.code(), "ABCD1234");
    }

    #[test]
    fn test_unknown_event_fails_to_decode() {
        let result: Result<ClientEvent, _> =
            serde_json::from_value(json!({"event": "fly-to-moon", "data": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_game_started_json_format() {
        let event = ServerEvent::GameStarted(GameStarted {
            role: Role::Imposter,
            total_imposters: 2,
            imposters: vec!["bo".into()],
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "game-started",
                "data": {"role": "imposter", "totalImposters": 2, "imposters": ["bo"]}
            })
        );
    }

    #[test]
    fn test_room_joined_uses_camel_case_fields() {
        let event = ServerEvent::RoomJoined(RoomJoined {
            room_code: "ABCD1234".into(),
            players: vec!["ana".into(), "bo".into()],
            host_name: "ana".into(),
            max_players: 10,
            num_imposters: 1,
            is_host: false,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "room-joined");
        assert_eq!(value["data"]["hostName"], "ana");
        assert_eq!(value["data"]["isHost"], false);
        assert_eq!(value["data"]["roomCode"], "ABCD1234");
    }

    #[test]
    fn test_game_reset_has_no_data() {
        let value = serde_json::to_value(ServerEvent::GameReset).unwrap();
        assert_eq!(value, json!({"event": "game-reset"}));
    }
}
