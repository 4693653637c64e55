use serde::Serialize;
use tracing::warn;

use crate::{
    dto::events::{
        HostChangedEvent, LoadRequestedEvent, MatchStartedEvent, PlaylistItemAddedEvent,
        PlaylistItemChangedEvent, ResultsReadyEvent, RoomStateChangedEvent, ServerEvent,
        SettingsChangedEvent, UserJoinedEvent, UserLeftEvent, UserStateChangedEvent,
    },
    state::{
        SharedState,
        groups::group_name,
        room::{PlaylistItem, RoomId, RoomSettings, RoomState, RoomUser, UserId, UserState},
    },
};

const EVENT_USER_JOINED: &str = "user_joined";
const EVENT_USER_LEFT: &str = "user_left";
const EVENT_USER_STATE_CHANGED: &str = "user_state_changed";
const EVENT_HOST_CHANGED: &str = "host_changed";
const EVENT_ROOM_STATE_CHANGED: &str = "room_state_changed";
const EVENT_SETTINGS_CHANGED: &str = "settings_changed";
const EVENT_PLAYLIST_ITEM_ADDED: &str = "playlist_item_added";
const EVENT_PLAYLIST_ITEM_CHANGED: &str = "playlist_item_changed";
const EVENT_MATCH_STARTED: &str = "match_started";
const EVENT_RESULTS_READY: &str = "results_ready";
const EVENT_LOAD_REQUESTED: &str = "load_requested";

/// Notify the control group that a member joined.
pub fn broadcast_user_joined(state: &SharedState, room_id: RoomId, user: &RoomUser) {
    let payload = UserJoinedEvent { user: user.into() };
    send_control(state, room_id, EVENT_USER_JOINED, &payload);
}

/// Notify the control group that a member left or disconnected.
pub fn broadcast_user_left(state: &SharedState, room_id: RoomId, user_id: UserId) {
    send_control(state, room_id, EVENT_USER_LEFT, &UserLeftEvent { user_id });
}

/// Notify the control group of an accepted member state transition.
pub fn broadcast_user_state_changed(
    state: &SharedState,
    room_id: RoomId,
    user_id: UserId,
    user_state: UserState,
) {
    let payload = UserStateChangedEvent {
        user_id,
        state: user_state,
    };
    send_control(state, room_id, EVENT_USER_STATE_CHANGED, &payload);
}

/// Notify the control group that host privileges moved.
pub fn broadcast_host_changed(state: &SharedState, room_id: RoomId, user_id: UserId) {
    send_control(state, room_id, EVENT_HOST_CHANGED, &HostChangedEvent { user_id });
}

/// Notify the control group that the room lifecycle advanced.
pub fn broadcast_room_state_changed(state: &SharedState, room_id: RoomId, room_state: RoomState) {
    let payload = RoomStateChangedEvent { state: room_state };
    send_control(state, room_id, EVENT_ROOM_STATE_CHANGED, &payload);
}

/// Notify the control group that the settings record was replaced.
pub fn broadcast_settings_changed(state: &SharedState, room_id: RoomId, settings: &RoomSettings) {
    let payload = SettingsChangedEvent {
        settings: settings.clone(),
    };
    send_control(state, room_id, EVENT_SETTINGS_CHANGED, &payload);
}

/// Notify the control group of a new playlist entry.
pub fn broadcast_playlist_item_added(state: &SharedState, room_id: RoomId, item: &PlaylistItem) {
    let payload = PlaylistItemAddedEvent { item: item.into() };
    send_control(state, room_id, EVENT_PLAYLIST_ITEM_ADDED, &payload);
}

/// Notify the control group of an edited or expired playlist entry.
pub fn broadcast_playlist_item_changed(state: &SharedState, room_id: RoomId, item: &PlaylistItem) {
    let payload = PlaylistItemChangedEvent { item: item.into() };
    send_control(state, room_id, EVENT_PLAYLIST_ITEM_CHANGED, &payload);
}

/// Notify the control group that gameplay began.
pub fn broadcast_match_started(state: &SharedState, room_id: RoomId) {
    send_control(state, room_id, EVENT_MATCH_STARTED, &MatchStartedEvent {});
}

/// Notify the control group that the round finished.
pub fn broadcast_results_ready(state: &SharedState, room_id: RoomId) {
    send_control(state, room_id, EVENT_RESULTS_READY, &ResultsReadyEvent {});
}

/// Ask the gameplay group to begin loading the current item.
pub fn broadcast_load_requested(state: &SharedState, room_id: RoomId) {
    send_gameplay(state, room_id, EVENT_LOAD_REQUESTED, &LoadRequestedEvent {});
}

fn send_control(state: &SharedState, room_id: RoomId, event: &str, payload: &impl Serialize) {
    send_to(state, &group_name(room_id, false), event, payload);
}

fn send_gameplay(state: &SharedState, room_id: RoomId, event: &str, payload: &impl Serialize) {
    send_to(state, &group_name(room_id, true), event, payload);
}

fn send_to(state: &SharedState, group: &str, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(event, payload) {
        Ok(event) => state.hub().send_to_group(group, event),
        Err(err) => warn!(event, group, error = %err, "failed to serialize event payload"),
    }
}
