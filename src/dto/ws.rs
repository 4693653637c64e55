use serde::Serialize;

use crate::dto::{events::ServerEvent, room::RoomSnapshot};

/// Frames pushed to room WebSocket clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The request succeeded and carries no payload.
    Ack,
    /// Reply to a successful join.
    Room { room: RoomSnapshot },
    /// The request was rejected; `code` is the stable wire-level code.
    Error { code: String, message: String },
    /// A broadcast event fanned out to one of the client's groups.
    Event {
        event: String,
        data: serde_json::Value,
    },
}

impl From<ServerEvent> for ServerMessage {
    fn from(event: ServerEvent) -> Self {
        ServerMessage::Event {
            event: event.event,
            data: event.data,
        }
    }
}
