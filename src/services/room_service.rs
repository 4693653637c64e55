use tracing::{info, warn};

use crate::{
    dao::models::RoomCategory,
    dto::room::RoomSnapshot,
    error::ServiceError,
    services::{events, match_service, playlist_service},
    state::{
        SharedState,
        groups::group_name,
        room::{
            ConnectionId, RoomId, RoomSettings, RoomState, RoomUser, ServerRoom, UserId,
            UserState, validate_mod_selection,
        },
        session::UserSession,
    },
};

/// Handle a client `JoinRoom` request.
///
/// The first acquisition order rule applies here: the user's session handle
/// is taken before the room handle. The room entry is created on miss and
/// hydrated from the store; the first joiner must be the host the room was
/// created with, and becomes the live host.
pub async fn join_room(
    state: &SharedState,
    user_id: UserId,
    connection_id: ConnectionId,
    room_id: RoomId,
) -> Result<RoomSnapshot, ServiceError> {
    if state
        .store_call(state.store().is_user_restricted(user_id))
        .await?
    {
        return Err(ServiceError::InvalidState(
            "user account is restricted".into(),
        ));
    }

    let mut session_handle = state.sessions().get_for_use(user_id, true).await;
    if session_handle.item().is_some() {
        return Err(ServiceError::InvalidState(
            "user is already in a room".into(),
        ));
    }

    let mut room_handle = state.rooms().get_for_use(room_id, true).await;
    if room_handle.item().is_none() {
        let room = load_room(state, room_id, user_id).await?;
        room_handle.set(room)?;
        info!(room_id, host = user_id, "room brought live");
    }

    let Some(room) = room_handle.item_mut() else {
        return Err(ServiceError::InvalidOperation(
            "freshly created room is missing".into(),
        ));
    };

    room.users.push(RoomUser::new(user_id, connection_id));
    if room.host_user_id.is_none() {
        room.host_user_id = Some(user_id);
    }
    state
        .hub()
        .add_to_group(connection_id, &group_name(room_id, false));

    let persisted = state
        .store_call(state.store().replace_participants(room_id, room.user_ids()))
        .await;
    if let Err(err) = persisted {
        state
            .hub()
            .remove_from_group(connection_id, &group_name(room_id, false));
        room.users.retain(|u| u.user_id != user_id);
        let empty = room.users.is_empty();
        if empty {
            room_handle.destroy();
        }
        return Err(err.into());
    }

    if let Some(user) = room.user(user_id) {
        events::broadcast_user_joined(state, room_id, user);
    }

    let snapshot = RoomSnapshot::from(&*room);

    session_handle.set(UserSession {
        connection_id,
        user_id,
        room_id,
    })?;

    info!(room_id, user_id, "user joined room");
    Ok(snapshot)
}

/// Handle a client `LeaveRoom` request, and the implicit variant run on
/// connection teardown.
///
/// Leaving must always complete: persistence hiccups on this path are logged
/// and skipped rather than leaving a ghost member behind, since the store
/// only mirrors the last committed snapshot.
pub async fn leave_room(state: &SharedState, user_id: UserId) -> Result<(), ServiceError> {
    let session_handle = state.sessions().get_for_use(user_id, false).await;
    let Some(session) = session_handle.item().cloned() else {
        return Err(ServiceError::NotJoinedRoom);
    };
    let room_id = session.room_id;

    let mut room_handle = state.rooms().get_for_use(room_id, false).await;
    let mut destroy_room = false;

    if let Some(room) = room_handle.item_mut() {
        if let Some(index) = room.users.iter().position(|u| u.user_id == user_id) {
            let removed = room.users.remove(index);

            state
                .hub()
                .remove_from_group(removed.connection_id, &group_name(room_id, false));
            if removed.state.is_gameplay() {
                state
                    .hub()
                    .remove_from_group(removed.connection_id, &group_name(room_id, true));
            }

            if let Err(err) = state
                .store_call(state.store().replace_participants(room_id, room.user_ids()))
                .await
            {
                warn!(room_id, user_id, error = %err, "failed to persist participants on leave");
            }

            if room.users.is_empty() {
                if let Err(err) = state.store_call(state.store().mark_room_ended(room_id)).await {
                    warn!(room_id, error = %err, "failed to mark room ended");
                }
                destroy_room = true;
                info!(room_id, "room wound down after last leave");
            } else {
                if room.host_user_id == Some(user_id) {
                    let new_host = room.users[0].user_id;
                    room.host_user_id = Some(new_host);
                    if let Err(err) = state
                        .store_call(state.store().update_room_host(room_id, new_host))
                        .await
                    {
                        warn!(room_id, new_host, error = %err, "failed to persist host change");
                    }
                    events::broadcast_host_changed(state, room_id, new_host);
                }

                // A departing loader or player may be the one the round was
                // waiting on.
                if let Err(err) = match_service::update_room_state_if_required(state, room).await {
                    warn!(room_id, error = %err, "failed to advance room state after leave");
                }
            }
        } else {
            warn!(room_id, user_id, "session pointed at a room the user is not in");
        }
    }

    events::broadcast_user_left(state, room_id, user_id);

    if destroy_room {
        room_handle.destroy();
    }
    session_handle.destroy();

    info!(room_id, user_id, "user left room");
    Ok(())
}

/// Connection teardown path: leave-room semantics with a missing session
/// being perfectly normal.
pub async fn handle_disconnect(state: &SharedState, user_id: UserId) {
    match leave_room(state, user_id).await {
        Ok(()) | Err(ServiceError::NotJoinedRoom) => {}
        Err(err) => warn!(user_id, error = %err, "disconnect cleanup failed"),
    }
}

/// Handle a client `TransferHost` request.
pub async fn transfer_host(
    state: &SharedState,
    user_id: UserId,
    target_user_id: UserId,
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

    if !room.is_host(user_id) {
        return Err(ServiceError::NotHost);
    }
    if room.user(target_user_id).is_none() {
        return Err(ServiceError::InvalidState(
            "target user is not in the room".into(),
        ));
    }

    let previous = room.host_user_id;
    room.host_user_id = Some(target_user_id);
    if let Err(err) = state
        .store_call(state.store().update_room_host(room_id, target_user_id))
        .await
    {
        room.host_user_id = previous;
        return Err(err.into());
    }

    events::broadcast_host_changed(state, room_id, target_user_id);
    Ok(())
}

/// Handle a client `ChangeSettings` request.
///
/// Settings can only change in the lobby. An equal record is a no-op; an
/// accepted change un-readies everyone, and a queue-mode switch re-evaluates
/// the current item.
pub async fn change_settings(
    state: &SharedState,
    user_id: UserId,
    mut settings: RoomSettings,
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

    if !room.is_host(user_id) {
        return Err(ServiceError::NotHost);
    }
    if room.state != RoomState::Open {
        return Err(ServiceError::InvalidState(
            "cannot change settings while the match is in progress".into(),
        ));
    }

    // The current-item pointer is owned by the queue engine, never by the
    // client.
    settings.playlist_item_id = room.settings.playlist_item_id;

    if settings == room.settings {
        return Ok(());
    }

    validate_mod_selection(
        settings.ruleset_id,
        &settings.required_mods,
        &settings.allowed_mods,
    )
    .map_err(ServiceError::InvalidState)?;

    let known_checksum = state
        .store_call(state.store().get_beatmap_checksum(settings.beatmap_id))
        .await?;
    if known_checksum.as_deref() != Some(settings.beatmap_checksum.as_str()) {
        return Err(ServiceError::InvalidState(
            "beatmap is unknown or was modified".into(),
        ));
    }

    let previous = std::mem::replace(&mut room.settings, settings);
    if let Err(err) = state
        .store_call(
            state
                .store()
                .update_room_name(room_id, room.settings.name.clone()),
        )
        .await
    {
        room.settings = previous;
        return Err(err.into());
    }

    for index in 0..room.users.len() {
        if room.users[index].state == UserState::Ready {
            match_service::set_user_state(state, room_id, &mut room.users[index], UserState::Idle);
        }
    }

    events::broadcast_settings_changed(state, room_id, &room.settings);

    if previous.queue_mode != room.settings.queue_mode {
        playlist_service::update_from_queue_mode_change(state, room).await?;
    }

    Ok(())
}

/// Fetch and validate a room that is not live yet.
async fn load_room(
    state: &SharedState,
    room_id: RoomId,
    joining_user: UserId,
) -> Result<ServerRoom, ServiceError> {
    let row = state
        .store_call(state.store().get_room(room_id))
        .await?
        .ok_or_else(|| ServiceError::InvalidState(format!("room {room_id} does not exist")))?;

    if row.category != RoomCategory::Realtime {
        return Err(ServiceError::InvalidState(
            "room is not a realtime room".into(),
        ));
    }
    if row.ends_at.is_some() {
        return Err(ServiceError::InvalidState("room has already ended".into()));
    }
    if row.host_user_id != joining_user {
        return Err(ServiceError::InvalidState(
            "the room host must join before other users".into(),
        ));
    }

    let items = state
        .store_call(state.store().get_all_playlist_items(room_id))
        .await?;
    state
        .store_call(state.store().mark_room_active(room_id))
        .await?;

    Ok(ServerRoom::from_row(row, items))
}
