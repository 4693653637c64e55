use crate::{
    error::ServiceError,
    services::{events, playlist_service},
    state::{
        SharedState,
        groups::group_name,
        room::{RoomId, RoomState, RoomUser, ServerRoom, UserId, UserState},
        state_machine,
    },
};

/// Apply a member state transition: record it, notify the control group, and
/// keep the gameplay group membership in sync.
///
/// Gameplay group membership follows the state exactly: a member is in it
/// while Ready, WaitingForLoad, Loaded or Playing, and out of it otherwise.
pub(crate) fn set_user_state(
    state: &SharedState,
    room_id: RoomId,
    user: &mut RoomUser,
    new_state: UserState,
) {
    let old_state = user.state;
    if old_state == new_state {
        return;
    }

    user.state = new_state;
    events::broadcast_user_state_changed(state, room_id, user.user_id, new_state);

    let gameplay = group_name(room_id, true);
    match (old_state.is_gameplay(), new_state.is_gameplay()) {
        (false, true) => state.hub().add_to_group(user.connection_id, &gameplay),
        (true, false) => state.hub().remove_from_group(user.connection_id, &gameplay),
        _ => {}
    }
}

/// Handle a client `ChangeState` request.
///
/// Requesting the state the user is already in is a silent no-op. States the
/// server drives the match through are rejected with the offending pair so
/// the client can log it.
pub async fn change_state(
    state: &SharedState,
    user_id: UserId,
    target: UserState,
) -> Result<(), ServiceError> {
    let session_handle = state.sessions().get_for_use(user_id, false).await;
    let Some(session) = session_handle.item() else {
        return Err(ServiceError::NotJoinedRoom);
    };
    let room_id = session.room_id;

    let mut room_handle = state.rooms().get_for_use(room_id, false).await;
    let Some(room) = room_handle.item_mut() else {
        return Err(ServiceError::InvalidOperation(
            "session refers to a room that no longer exists".into(),
        ));
    };

    let current = room
        .user(user_id)
        .map(|u| u.state)
        .ok_or_else(|| {
            ServiceError::InvalidOperation("session user missing from room members".into())
        })?;

    if current == target {
        return Ok(());
    }

    state_machine::validate_client_transition(current, target)
        .map_err(|(from, to)| ServiceError::InvalidStateChange { from, to })?;

    if let Some(user) = room.user_mut(user_id) {
        set_user_state(state, room_id, user, target);
    }

    update_room_state_if_required(state, room).await
}

/// Handle a host's `StartMatch` request: move every ready member into the
/// loading phase and ask the gameplay group to load.
pub async fn start_match(state: &SharedState, user_id: UserId) -> Result<(), ServiceError> {
    let session_handle = state.sessions().get_for_use(user_id, false).await;
    let Some(session) = session_handle.item() else {
        return Err(ServiceError::NotJoinedRoom);
    };
    let room_id = session.room_id;

    let mut room_handle = state.rooms().get_for_use(room_id, false).await;
    let Some(room) = room_handle.item_mut() else {
        return Err(ServiceError::InvalidOperation(
            "session refers to a room that no longer exists".into(),
        ));
    };

    if !room.is_host(user_id) {
        return Err(ServiceError::NotHost);
    }
    if room.state != RoomState::Open {
        return Err(ServiceError::InvalidState(
            "the match has already been started".into(),
        ));
    }
    if room.count_in(UserState::Ready) == 0 {
        return Err(ServiceError::InvalidState("no users are ready".into()));
    }
    if !room
        .user(user_id)
        .is_some_and(|u| u.state == UserState::Ready)
    {
        return Err(ServiceError::InvalidState("the host is not ready".into()));
    }

    let current_item_id = room
        .queue
        .current_item()
        .map(|item| item.id)
        .ok_or_else(|| {
            ServiceError::InvalidOperation("room has no current playlist item".into())
        })?;

    // A fresh round must not inherit scores from an aborted one.
    state
        .store_call(state.store().clear_scores(current_item_id))
        .await?;

    for index in 0..room.users.len() {
        if room.users[index].state == UserState::Ready {
            set_user_state(state, room_id, &mut room.users[index], UserState::WaitingForLoad);
        }
    }

    room.state = RoomState::WaitingForLoad;
    events::broadcast_room_state_changed(state, room_id, room.state);
    events::broadcast_load_requested(state, room_id);

    Ok(())
}

/// Advance the room lifecycle when member states make a transition due.
///
/// Runs after every accepted member transition and after a member leaves:
/// - WaitingForLoad ends once nobody is still loading; if at least one
///   member made it to Loaded the match starts, otherwise everyone bailed
///   and the room falls back to Open.
/// - Playing ends once nobody is still playing; finishers see their results
///   and the current playlist item is finalised.
pub(crate) async fn update_room_state_if_required(
    state: &SharedState,
    room: &mut ServerRoom,
) -> Result<(), ServiceError> {
    let room_id = room.room_id;

    match room.state {
        RoomState::Open => {}
        RoomState::WaitingForLoad => {
            if room.any_user_in(UserState::WaitingForLoad) {
                return Ok(());
            }

            if room.any_user_in(UserState::Loaded) {
                for index in 0..room.users.len() {
                    if room.users[index].state == UserState::Loaded {
                        set_user_state(state, room_id, &mut room.users[index], UserState::Playing);
                    }
                }
                events::broadcast_match_started(state, room_id);
                room.state = RoomState::Playing;
                events::broadcast_room_state_changed(state, room_id, room.state);
            } else {
                room.state = RoomState::Open;
                events::broadcast_room_state_changed(state, room_id, room.state);
            }
        }
        RoomState::Playing => {
            if room.any_user_in(UserState::Playing) {
                return Ok(());
            }

            for index in 0..room.users.len() {
                if room.users[index].state == UserState::FinishedPlay {
                    set_user_state(state, room_id, &mut room.users[index], UserState::Results);
                }
            }
            events::broadcast_results_ready(state, room_id);
            room.state = RoomState::Open;
            events::broadcast_room_state_changed(state, room_id, room.state);

            playlist_service::finish_current_item(state, room).await?;
        }
    }

    Ok(())
}
