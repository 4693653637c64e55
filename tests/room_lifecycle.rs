//! End-to-end room lifecycle scenarios driven against the in-memory store.

use std::sync::Arc;

use tokio::sync::mpsc;

use beat_rooms_back::{
    config::AppConfig,
    dao::{
        memory::InMemoryMatchStore,
        models::{PlaylistItemRow, RoomCategory, RoomRow},
    },
    dto::{events::ServerEvent, requests::PlaylistItemRequest, room::RoomSnapshot},
    error::ServiceError,
    services::{match_service, playlist_service, room_service},
    state::{
        AppState, SharedState,
        groups::group_name,
        room::{ConnectionId, GameMod, QueueMode, RoomId, RoomState, UserId, UserState},
    },
};

const ROOM_ID: RoomId = 42;
const BEATMAP_ID: i32 = 771;
const CHECKSUM: &str = "cafe00d1beefbeef";

struct TestClient {
    user_id: UserId,
    connection_id: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    /// Pull every queued event name, emptying the outbox.
    fn drain(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            names.push(event.event);
        }
        names
    }
}

fn connect(state: &SharedState, user_id: UserId) -> TestClient {
    let connection_id = ConnectionId::new_v4();
    let (tx, rx) = mpsc::unbounded_channel();
    state.hub().register(connection_id, tx);
    TestClient {
        user_id,
        connection_id,
        rx,
    }
}

async fn harness(queue_mode: QueueMode) -> (SharedState, Arc<InMemoryMatchStore>) {
    let store = Arc::new(InMemoryMatchStore::new());
    store
        .seed_room(RoomRow {
            id: ROOM_ID,
            name: "weekly lobby".into(),
            category: RoomCategory::Realtime,
            host_user_id: 1,
            queue_mode,
            ends_at: None,
            participant_count: 0,
        })
        .await;
    store.seed_beatmap(BEATMAP_ID, CHECKSUM).await;
    store
        .seed_playlist_item(PlaylistItemRow {
            id: 1,
            room_id: ROOM_ID,
            owner_id: 1,
            beatmap_id: BEATMAP_ID,
            beatmap_checksum: CHECKSUM.into(),
            ruleset_id: 0,
            required_mods: Vec::new(),
            allowed_mods: Vec::new(),
            expired: false,
        })
        .await;

    let state = AppState::new(AppConfig::default(), store.clone());
    (state, store)
}

async fn join(state: &SharedState, client: &TestClient) -> Result<RoomSnapshot, ServiceError> {
    room_service::join_room(state, client.user_id, client.connection_id, ROOM_ID).await
}

async fn change_state(
    state: &SharedState,
    client: &TestClient,
    target: UserState,
) -> Result<(), ServiceError> {
    match_service::change_state(state, client.user_id, target).await
}

/// Run assertions against the live room under its handle.
async fn with_room<T>(
    state: &SharedState,
    inspect: impl FnOnce(&beat_rooms_back::state::room::ServerRoom) -> T,
) -> T {
    let handle = state.rooms().get_for_use(ROOM_ID, false).await;
    inspect(handle.item().expect("room is live"))
}

fn item_request() -> PlaylistItemRequest {
    PlaylistItemRequest {
        beatmap_id: BEATMAP_ID,
        beatmap_checksum: CHECKSUM.into(),
        ruleset_id: 0,
        required_mods: Vec::new(),
        allowed_mods: Vec::new(),
    }
}

#[tokio::test]
async fn host_only_full_lifecycle() {
    let (state, store) = harness(QueueMode::HostOnly).await;
    let mut host = connect(&state, 1);
    let mut guest = connect(&state, 2);

    let snapshot = join(&state, &host).await.unwrap();
    assert_eq!(snapshot.state, RoomState::Open);
    assert_eq!(snapshot.host_user_id, Some(1));
    assert_eq!(snapshot.playlist.len(), 1);
    assert_eq!(snapshot.settings.playlist_item_id, 1);

    join(&state, &guest).await.unwrap();
    assert!(host.drain().contains(&"user_joined".to_string()));

    change_state(&state, &guest, UserState::Ready).await.unwrap();
    change_state(&state, &host, UserState::Ready).await.unwrap();
    match_service::start_match(&state, 1).await.unwrap();

    with_room(&state, |room| {
        assert_eq!(room.state, RoomState::WaitingForLoad);
        for user in &room.users {
            assert_eq!(user.state, UserState::WaitingForLoad);
        }
    })
    .await;
    assert_eq!(store.cleared_scores().await, vec![1]);
    assert!(guest.drain().contains(&"load_requested".to_string()));

    change_state(&state, &host, UserState::Loaded).await.unwrap();
    change_state(&state, &guest, UserState::Loaded).await.unwrap();

    with_room(&state, |room| {
        assert_eq!(room.state, RoomState::Playing);
        for user in &room.users {
            assert_eq!(user.state, UserState::Playing);
        }
    })
    .await;
    assert!(host.drain().contains(&"match_started".to_string()));

    change_state(&state, &host, UserState::FinishedPlay)
        .await
        .unwrap();
    change_state(&state, &guest, UserState::FinishedPlay)
        .await
        .unwrap();

    let events = host.drain();
    assert!(events.contains(&"results_ready".to_string()));
    assert!(events.contains(&"playlist_item_changed".to_string()));
    assert!(events.contains(&"playlist_item_added".to_string()));

    with_room(&state, |room| {
        assert_eq!(room.state, RoomState::Open);
        for user in &room.users {
            assert_eq!(user.state, UserState::Results);
        }
        // The played item expired, and host-only mode re-queued a copy of it
        // under a fresh id.
        assert_eq!(room.queue.items().len(), 2);
        assert!(room.queue.items()[0].expired);
        let duplicate = &room.queue.items()[1];
        assert_eq!(duplicate.id, 2);
        assert!(!duplicate.expired);
        assert_eq!(duplicate.beatmap_id, BEATMAP_ID);
        assert_eq!(room.settings.playlist_item_id, 2);
    })
    .await;
}

#[tokio::test]
async fn aborted_load_returns_room_to_open() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let mut host = connect(&state, 1);
    let guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();
    change_state(&state, &guest, UserState::Ready).await.unwrap();
    change_state(&state, &host, UserState::Ready).await.unwrap();
    match_service::start_match(&state, 1).await.unwrap();
    host.drain();

    change_state(&state, &host, UserState::Idle).await.unwrap();
    change_state(&state, &guest, UserState::Idle).await.unwrap();

    with_room(&state, |room| assert_eq!(room.state, RoomState::Open)).await;
    assert!(!host.drain().contains(&"match_started".to_string()));
}

#[tokio::test]
async fn host_disconnect_promotes_next_member() {
    let (state, store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    let mut guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();
    guest.drain();

    room_service::handle_disconnect(&state, 1).await;

    let events = guest.drain();
    assert!(events.contains(&"host_changed".to_string()));
    assert!(events.contains(&"user_left".to_string()));

    with_room(&state, |room| {
        assert_eq!(room.user_ids(), vec![2]);
        assert_eq!(room.host_user_id, Some(2));
    })
    .await;
    assert_eq!(store.room(ROOM_ID).await.unwrap().host_user_id, 2);
    assert_eq!(store.participants(ROOM_ID).await, vec![2]);
    assert_eq!(state.sessions().len(), 1);
}

#[tokio::test]
async fn room_is_wound_down_when_last_member_leaves() {
    let (state, store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);

    join(&state, &host).await.unwrap();
    room_service::leave_room(&state, 1).await.unwrap();

    assert!(state.rooms().is_empty());
    assert!(state.sessions().is_empty());
    assert!(store.room(ROOM_ID).await.unwrap().ends_at.is_some());
}

#[tokio::test]
async fn non_host_cannot_enqueue_in_host_only_mode() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    let guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();

    let err = playlist_service::add_item(&state, 2, item_request())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotHost));

    with_room(&state, |room| assert_eq!(room.queue.items().len(), 1)).await;
}

#[tokio::test]
async fn per_user_queue_limit_is_enforced() {
    let (state, _store) = harness(QueueMode::AllPlayers).await;
    let host = connect(&state, 1);
    let guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();

    for _ in 0..3 {
        playlist_service::add_item(&state, 2, item_request())
            .await
            .unwrap();
    }

    let err = playlist_service::add_item(&state, 2, item_request())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    with_room(&state, |room| {
        assert_eq!(room.queue.items().len(), 4);
        assert_eq!(room.queue.unexpired_count_for(2), 3);
    })
    .await;
}

#[tokio::test]
async fn settings_change_rejects_modified_beatmap() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    join(&state, &host).await.unwrap();

    let mut tampered = with_room(&state, |room| room.settings.clone()).await;
    tampered.beatmap_checksum = "0000000000000000".into();

    let err = room_service::change_settings(&state, 1, tampered)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    with_room(&state, |room| {
        assert_eq!(room.settings.beatmap_checksum, CHECKSUM);
    })
    .await;
}

#[tokio::test]
async fn settings_round_trip_preserves_submitted_values() {
    let (state, store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    let mut guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();
    change_state(&state, &guest, UserState::Ready).await.unwrap();
    guest.drain();

    let mut wanted = with_room(&state, |room| room.settings.clone()).await;
    wanted.name = "renamed lobby".into();
    wanted.required_mods = vec![GameMod::new("HD"), GameMod::new("HR")];

    room_service::change_settings(&state, 1, wanted.clone())
        .await
        .unwrap();

    with_room(&state, |room| {
        assert_eq!(room.settings, wanted);
        // The change un-readies everyone still in the lobby.
        assert_eq!(room.users[1].state, UserState::Idle);
    })
    .await;
    assert_eq!(store.room(ROOM_ID).await.unwrap().name, "renamed lobby");

    let events = guest.drain();
    assert!(events.contains(&"settings_changed".to_string()));
    assert!(events.contains(&"user_state_changed".to_string()));
}

#[tokio::test]
async fn client_cannot_enter_server_owned_states() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    join(&state, &host).await.unwrap();

    for target in [UserState::WaitingForLoad, UserState::Playing, UserState::Results] {
        let err = change_state(&state, &host, target).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidStateChange {
                from: UserState::Idle,
                ..
            }
        ));
    }

    with_room(&state, |room| {
        assert_eq!(room.users[0].state, UserState::Idle);
    })
    .await;
}

#[tokio::test]
async fn repeated_change_state_is_a_silent_no_op() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let mut host = connect(&state, 1);
    join(&state, &host).await.unwrap();

    change_state(&state, &host, UserState::Ready).await.unwrap();
    host.drain();

    change_state(&state, &host, UserState::Ready).await.unwrap();
    assert!(host.drain().is_empty());
}

#[tokio::test]
async fn gameplay_group_membership_follows_user_state() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    join(&state, &host).await.unwrap();

    let gameplay = group_name(ROOM_ID, true);
    assert!(!state.hub().is_in_group(host.connection_id, &gameplay));

    change_state(&state, &host, UserState::Ready).await.unwrap();
    assert!(state.hub().is_in_group(host.connection_id, &gameplay));

    change_state(&state, &host, UserState::Idle).await.unwrap();
    assert!(!state.hub().is_in_group(host.connection_id, &gameplay));
}

#[tokio::test]
async fn sessions_track_their_room() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    let guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();

    assert_eq!(state.sessions().len(), 2);
    for user_id in [1, 2] {
        let handle = state.sessions().get_for_use(user_id, false).await;
        let session = handle.item().expect("session exists");
        assert_eq!(session.room_id, ROOM_ID);
        assert_eq!(session.user_id, user_id);
    }
}

#[tokio::test]
async fn restricted_user_cannot_join() {
    let (state, store) = harness(QueueMode::HostOnly).await;
    store.restrict_user(1).await;
    let host = connect(&state, 1);

    let err = join(&state, &host).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert!(state.rooms().is_empty());
    assert!(state.sessions().is_empty());
}

#[tokio::test]
async fn joining_twice_is_rejected() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);

    join(&state, &host).await.unwrap();
    let err = join(&state, &host).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn only_the_designated_host_may_join_first() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let guest = connect(&state, 2);

    let err = join(&state, &guest).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert!(state.rooms().is_empty());
    assert!(state.sessions().is_empty());
}

#[tokio::test]
async fn host_transfer_requires_host_and_membership() {
    let (state, store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    let guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();

    let err = room_service::transfer_host(&state, 2, 2).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotHost));

    let err = room_service::transfer_host(&state, 1, 9).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    room_service::transfer_host(&state, 1, 2).await.unwrap();
    with_room(&state, |room| assert_eq!(room.host_user_id, Some(2))).await;
    assert_eq!(store.room(ROOM_ID).await.unwrap().host_user_id, 2);
}

#[tokio::test]
async fn leave_without_session_reports_not_joined() {
    let (state, _store) = harness(QueueMode::HostOnly).await;

    let err = room_service::leave_room(&state, 7).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotJoinedRoom));

    // The implicit disconnect variant swallows the same condition.
    room_service::handle_disconnect(&state, 7).await;
}

#[tokio::test]
async fn start_match_requires_ready_host() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    let guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();

    let err = match_service::start_match(&state, 2).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotHost));

    let err = match_service::start_match(&state, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    change_state(&state, &guest, UserState::Ready).await.unwrap();
    let err = match_service::start_match(&state, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    change_state(&state, &host, UserState::Ready).await.unwrap();
    match_service::start_match(&state, 1).await.unwrap();
    with_room(&state, |room| {
        assert_eq!(room.state, RoomState::WaitingForLoad);
    })
    .await;
}

#[tokio::test]
async fn leaving_loader_unblocks_the_round() {
    let (state, _store) = harness(QueueMode::HostOnly).await;
    let host = connect(&state, 1);
    let guest = connect(&state, 2);

    join(&state, &host).await.unwrap();
    join(&state, &guest).await.unwrap();
    change_state(&state, &guest, UserState::Ready).await.unwrap();
    change_state(&state, &host, UserState::Ready).await.unwrap();
    match_service::start_match(&state, 1).await.unwrap();

    change_state(&state, &host, UserState::Loaded).await.unwrap();
    // The guest never finishes loading and drops instead; the match must
    // start for the host rather than hang.
    room_service::handle_disconnect(&state, 2).await;

    with_room(&state, |room| {
        assert_eq!(room.state, RoomState::Playing);
        assert_eq!(room.users[0].state, UserState::Playing);
    })
    .await;
}
