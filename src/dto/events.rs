use std::fmt;

use serde::Serialize;

use crate::{
    dto::room::{PlaylistItemSnapshot, UserSnapshot},
    state::room::{RoomSettings, RoomState, UserId, UserState},
};

/// Dispatched payload carried across broadcast groups.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// Event type name for the client-side dispatcher.
    pub event: String,
    /// Serialized payload of the event.
    pub data: serde_json::Value,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.to_owned(),
            data: serde_json::to_value(payload)?,
        })
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.event)
    }
}

/// A user was appended to the room's member list.
#[derive(Debug, Serialize)]
pub struct UserJoinedEvent {
    pub user: UserSnapshot,
}

/// A user left or was disconnected.
#[derive(Debug, Serialize)]
pub struct UserLeftEvent {
    pub user_id: UserId,
}

/// A member's state changed, whether client-requested or server-driven.
#[derive(Debug, Serialize)]
pub struct UserStateChangedEvent {
    pub user_id: UserId,
    pub state: UserState,
}

/// Host privileges moved to another member.
#[derive(Debug, Serialize)]
pub struct HostChangedEvent {
    pub user_id: UserId,
}

/// The room advanced through its lifecycle.
#[derive(Debug, Serialize)]
pub struct RoomStateChangedEvent {
    pub state: RoomState,
}

/// The room settings record was replaced.
#[derive(Debug, Serialize)]
pub struct SettingsChangedEvent {
    pub settings: RoomSettings,
}

/// A new item entered the playlist.
#[derive(Debug, Serialize)]
pub struct PlaylistItemAddedEvent {
    pub item: PlaylistItemSnapshot,
}

/// An existing playlist item was edited or expired.
#[derive(Debug, Serialize)]
pub struct PlaylistItemChangedEvent {
    pub item: PlaylistItemSnapshot,
}

/// Every loaded user has been promoted and gameplay begins.
#[derive(Debug, Serialize)]
pub struct MatchStartedEvent {}

/// The round concluded and results are available.
#[derive(Debug, Serialize)]
pub struct ResultsReadyEvent {}

/// Gameplay-group members should begin loading the current item.
#[derive(Debug, Serialize)]
pub struct LoadRequestedEvent {}
