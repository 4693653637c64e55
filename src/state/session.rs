use crate::state::{
    room::{ConnectionId, RoomId, UserId},
    store::EntityStore,
};

/// Per-connection record binding a user to the room they joined.
///
/// At most one session exists per user id process-wide; the session table
/// enforces this because joining requires exclusive use of the user's entry.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub room_id: RoomId,
}

/// Registry of live user sessions. Populated on a successful join, destroyed
/// on leave or connection teardown.
pub type SessionStore = EntityStore<UserId, UserSession>;
