use crate::{
    dao::models::PlaylistItemRow,
    dto::requests::PlaylistItemRequest,
    error::ServiceError,
    services::events,
    state::{
        SharedState,
        queue::PER_USER_LIMIT,
        room::{PlaylistItem, QueueMode, ServerRoom, UserId, validate_mod_selection},
    },
};

/// Handle a client `AddPlaylistItem` request.
///
/// In host-only mode the host edits the current item in place; in the other
/// modes the item is appended under the caller's ownership, bounded by the
/// per-user queue limit.
pub async fn add_item(
    state: &SharedState,
    user_id: UserId,
    request: PlaylistItemRequest,
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

    let mode = room.settings.queue_mode;
    if mode == QueueMode::HostOnly && !room.is_host(user_id) {
        return Err(ServiceError::NotHost);
    }
    if mode != QueueMode::HostOnly && room.queue.unexpired_count_for(user_id) >= PER_USER_LIMIT {
        return Err(ServiceError::InvalidState(format!(
            "users may only queue up to {PER_USER_LIMIT} items each"
        )));
    }

    let known_checksum = state
        .store_call(state.store().get_beatmap_checksum(request.beatmap_id))
        .await?;
    if known_checksum.as_deref() != Some(request.beatmap_checksum.as_str()) {
        return Err(ServiceError::InvalidState(
            "beatmap is unknown or was modified".into(),
        ));
    }

    validate_mod_selection(
        request.ruleset_id,
        &request.required_mods,
        &request.allowed_mods,
    )
    .map_err(ServiceError::InvalidState)?;

    if mode == QueueMode::HostOnly {
        let Some(current) = room.queue.current_item() else {
            return Err(ServiceError::InvalidOperation(
                "room has no current playlist item".into(),
            ));
        };

        // Edit in place, keeping identity and ownership of the slot.
        let updated = PlaylistItem {
            id: current.id,
            owner_id: current.owner_id,
            beatmap_id: request.beatmap_id,
            beatmap_checksum: request.beatmap_checksum,
            ruleset_id: request.ruleset_id,
            required_mods: request.required_mods,
            allowed_mods: request.allowed_mods,
            expired: current.expired,
        };

        state
            .store_call(
                state
                    .store()
                    .update_playlist_item(PlaylistItemRow::from_item(room_id, &updated)),
            )
            .await?;

        if let Some(current) = room.queue.current_item_mut() {
            *current = updated.clone();
        }
        events::broadcast_playlist_item_changed(state, room_id, &updated);
    } else {
        let mut item = PlaylistItem {
            id: 0,
            owner_id: user_id,
            beatmap_id: request.beatmap_id,
            beatmap_checksum: request.beatmap_checksum,
            ruleset_id: request.ruleset_id,
            required_mods: request.required_mods,
            allowed_mods: request.allowed_mods,
            expired: false,
        };

        let id = state
            .store_call(
                state
                    .store()
                    .add_playlist_item(PlaylistItemRow::from_item(room_id, &item)),
            )
            .await?;
        item.id = id;

        room.queue.push(item.clone());
        events::broadcast_playlist_item_added(state, room_id, &item);
        refresh_current_item(state, room);
    }

    Ok(())
}

/// Finalise the current item after a round: expire it, and in host-only mode
/// keep the queue playable by duplicating it once everything has expired.
pub(crate) async fn finish_current_item(
    state: &SharedState,
    room: &mut ServerRoom,
) -> Result<(), ServiceError> {
    let Some(current_id) = room.queue.current_item().map(|item| item.id) else {
        return Ok(());
    };

    state
        .store_call(state.store().expire_playlist_item(current_id))
        .await?;

    if let Some(item) = room.queue.current_item_mut() {
        item.expired = true;
    }
    if let Some(item) = room.queue.current_item().cloned() {
        events::broadcast_playlist_item_changed(state, room.room_id, &item);
    }

    if room.settings.queue_mode == QueueMode::HostOnly && room.queue.all_expired() {
        duplicate_current_item(state, room).await?;
    }

    refresh_current_item(state, room);
    Ok(())
}

/// React to a queue-mode change in the room settings.
pub(crate) async fn update_from_queue_mode_change(
    state: &SharedState,
    room: &mut ServerRoom,
) -> Result<(), ServiceError> {
    if room.settings.queue_mode == QueueMode::HostOnly
        && !room.queue.items().is_empty()
        && room.queue.all_expired()
    {
        duplicate_current_item(state, room).await?;
    }

    refresh_current_item(state, room);
    Ok(())
}

/// Re-run current-item selection and propagate the result into the room
/// settings, notifying members when the cursor moved.
pub(crate) fn refresh_current_item(state: &SharedState, room: &mut ServerRoom) {
    let Some(current_id) = room.queue.update_current(room.settings.queue_mode) else {
        return;
    };

    if current_id != room.settings.playlist_item_id {
        room.settings.playlist_item_id = current_id;
        events::broadcast_settings_changed(state, room.room_id, &room.settings);
    }
}

/// Append a fresh copy of the current item, carrying its content as it
/// stands now under a new id.
async fn duplicate_current_item(
    state: &SharedState,
    room: &mut ServerRoom,
) -> Result<(), ServiceError> {
    let Some(mut duplicate) = room.queue.current_item().cloned() else {
        return Ok(());
    };
    duplicate.id = 0;
    duplicate.expired = false;

    let id = state
        .store_call(
            state
                .store()
                .add_playlist_item(PlaylistItemRow::from_item(room.room_id, &duplicate)),
        )
        .await?;
    duplicate.id = id;

    room.queue.push(duplicate.clone());
    events::broadcast_playlist_item_added(state, room.room_id, &duplicate);
    Ok(())
}
