//! Scenario tests for the room store, driven only through its public API.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use masquerade_room::{CreateRoom, RoomConfig, RoomError, RoomStore, UpdateSettings};
use masquerade_transport::ConnectionId;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;

fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

/// Room with `names[0]` as host on conn-1 and the rest on conn-2, conn-3, ...
fn room_with(store: &mut RoomStore, cmd: CreateRoom, names: &[&str]) -> String {
    let code = store.create_room(cmd).expect("room created").to_string();
    for (i, name) in names.iter().enumerate() {
        store
            .join_room(&code, name, conn(i as u64 + 1))
            .expect("player joined");
    }
    code
}

#[test]
fn test_codes_are_unique_among_active_rooms() {
    let mut store = RoomStore::default();
    let mut seen = HashSet::new();
    for i in 0..300 {
        let code = store.create_room(CreateRoom::new(format!("host{i}"))).unwrap();
        assert_eq!(code.as_str().len(), 8);
        assert!(code.as_str().chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(seen.insert(code));
    }
    assert_eq!(store.room_count(), 300);
}

#[test]
fn test_two_player_room_rejects_third_join() {
    let mut store = RoomStore::default();
    let code = store.create_room(CreateRoom::new("ana").max_players(2)).unwrap();
    let code = code.as_str();

    store.join_room(code, "ana", conn(1)).unwrap();
    store.join_room(code, "bo", conn(2)).unwrap();
    let third = store.join_room(code, "cy", conn(3));

    assert_eq!(third, Err(RoomError::RoomFull(code.to_string())));
    assert_eq!(store.room(code).unwrap().players(), ["ana", "bo"]);
}

#[test]
fn test_reconnect_into_full_room_does_not_grow_roster() {
    let mut store = RoomStore::default();
    let code = room_with(&mut store, CreateRoom::new("ana").max_players(2), &["ana", "bo"]);

    // bo's transport reconnects before the old socket's disconnect arrives.
    let joined = store.join_room(&code, "bo", conn(10)).unwrap();
    assert!(joined.rejoined);
    assert_eq!(joined.displaced, Some(conn(2)));
    assert_eq!(store.room(&code).unwrap().players().len(), 2);
}

#[test]
fn test_host_regains_authority_after_reconnecting() {
    let mut store = RoomStore::default();
    let code = room_with(&mut store, CreateRoom::new("ana"), &["ana", "bo"]);

    // Host's page refresh: old socket drops, new socket rejoins by name.
    store.remove_connection(conn(1)).unwrap();
    assert_eq!(store.room(&code).unwrap().players(), ["bo"]);
    assert!(store.authorize_host(&code, conn(2), "start the game").is_err());

    store.join_room(&code, "ana", conn(20)).unwrap();
    assert!(store.is_host(&code, "ana"));
    assert!(store.authorize_host(&code, conn(20), "start the game").is_ok());
    assert_eq!(store.room(&code).unwrap().players(), ["bo", "ana"]);
}

#[test]
fn test_empty_room_survives_within_grace_period() {
    let mut store = RoomStore::default();
    let code = room_with(&mut store, CreateRoom::new("ana"), &["ana"]);
    store.remove_connection(conn(1)).unwrap();

    let within_grace = Instant::now() + Duration::from_secs(4 * 60);
    assert!(store.sweep_at(within_grace).is_empty());

    store.join_room(&code, "ana", conn(2)).unwrap();
    assert!(store.authorize_host(&code, conn(2), "start the game").is_ok());
}

#[test]
fn test_imposter_count_clamped_to_half_of_cap() {
    let mut store = RoomStore::default();
    let code = store
        .create_room(CreateRoom::new("ana").max_players(4).num_imposters(5))
        .unwrap();
    assert_eq!(store.room(code.as_str()).unwrap().settings().num_imposters(), 2);
}

#[test]
fn test_two_players_always_one_imposter_one_crew() {
    let mut store = RoomStore::default();
    let code = room_with(&mut store, CreateRoom::new("ana"), &["ana", "bo"]);
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..200 {
        let drawn = store.select_imposters_with(&code, &mut rng).unwrap();
        assert_eq!(drawn.len(), 1);
        assert!(drawn[0] == "ana" || drawn[0] == "bo");
    }
}

#[test]
fn test_imposter_cap_leaves_a_crew_member() {
    let mut store = RoomStore::default();
    let code = room_with(
        &mut store,
        CreateRoom::new("ana").max_players(6).num_imposters(3),
        &["ana", "bo", "cy"],
    );
    let drawn = store.select_imposters(&code).unwrap();
    assert_eq!(drawn.len(), 2);
}

#[test]
fn test_imposter_draw_is_fair() {
    const TRIALS: usize = 20_000;
    let names = ["ana", "bo", "cy", "dee", "eve"];
    let mut store = RoomStore::default();
    let code = room_with(&mut store, CreateRoom::new("ana").num_imposters(2), &names);
    let mut rng = StdRng::seed_from_u64(2024);

    let mut hits: HashMap<String, usize> = HashMap::new();
    for _ in 0..TRIALS {
        for name in store.select_imposters_with(&code, &mut rng).unwrap() {
            *hits.entry(name).or_default() += 1;
        }
    }

    // Each player should be drawn with probability k/N = 2/5.
    for name in names {
        let freq = hits.get(name).copied().unwrap_or(0) as f64 / TRIALS as f64;
        assert!((freq - 0.4).abs() < 0.02, "{name} drawn with frequency {freq}");
    }
}

#[test]
fn test_round_lifecycle_reveal_then_reset() {
    let mut store = RoomStore::default();
    let code = room_with(&mut store, CreateRoom::new("ana"), &["ana", "bo", "cy"]);

    let drawn = store.select_imposters(&code).unwrap();
    assert_eq!(store.reveal_imposters(&code).unwrap(), Some(drawn));

    store.reset_round(&code).unwrap();
    assert_eq!(store.reveal_imposters(&code).unwrap(), None);
    assert_eq!(store.room(&code).unwrap().players().len(), 3);
}

#[test]
fn test_settings_shrink_below_headcount_keeps_everyone() {
    let mut store = RoomStore::default();
    let code = room_with(&mut store, CreateRoom::new("ana"), &["ana", "bo", "cy", "dee"]);

    let settings = store
        .update_settings(&code, UpdateSettings { max_players: Some(3), num_imposters: None })
        .unwrap();
    assert_eq!(settings.max_players(), 3);
    assert_eq!(settings.num_imposters(), 1);
    assert_eq!(store.room(&code).unwrap().players().len(), 4);
}

#[test]
fn test_expired_room_behaves_as_not_found() {
    let mut store = RoomStore::new(RoomConfig::default());
    let code = room_with(&mut store, CreateRoom::new("ana"), &["ana", "bo"]);

    let evicted = store.sweep_at(Instant::now() + Duration::from_secs(3 * 60 * 60));
    assert_eq!(evicted.len(), 1);
    assert_eq!(
        store.select_imposters(&code),
        Err(RoomError::NotFound(code.clone()))
    );
    assert_eq!(store.remove_connection(conn(2)), None);
}
