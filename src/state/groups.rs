use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{
    dto::events::ServerEvent,
    state::room::{ConnectionId, RoomId},
};

/// Canonical name of a room's broadcast group.
///
/// Every room exposes exactly two: the control group (`gameplay = false`)
/// that all members belong to, and the gameplay group (`gameplay = true`)
/// holding only members currently readied up or playing.
pub fn group_name(room_id: RoomId, gameplay: bool) -> String {
    format!("room:{room_id}:{gameplay}")
}

/// Named fan-out channels over per-connection outboxes.
///
/// Membership mutation and sending never block: delivery failures are logged
/// and swallowed because the authoritative room state has already advanced
/// by the time an event goes out.
#[derive(Default)]
pub struct GroupHub {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    groups: DashMap<String, HashSet<ConnectionId>>,
}

impl GroupHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbox. Subsequent group sends that include
    /// this connection are delivered to `sender`.
    pub fn register(&self, connection_id: ConnectionId, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.connections.insert(connection_id, sender);
    }

    /// Forget a connection entirely, including any group memberships.
    pub fn unregister(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        for mut group in self.groups.iter_mut() {
            group.value_mut().remove(&connection_id);
        }
    }

    pub fn add_to_group(&self, connection_id: ConnectionId, group: &str) {
        self.groups
            .entry(group.to_owned())
            .or_default()
            .insert(connection_id);
    }

    pub fn remove_from_group(&self, connection_id: ConnectionId, group: &str) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(&connection_id);
        }
    }

    /// Whether a connection currently belongs to a group.
    pub fn is_in_group(&self, connection_id: ConnectionId, group: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&connection_id))
    }

    /// Fan an event out to every member of a group.
    pub fn send_to_group(&self, group: &str, event: ServerEvent) {
        let Some(members) = self.groups.get(group) else {
            return;
        };

        for connection_id in members.iter() {
            let Some(sender) = self.connections.get(connection_id) else {
                continue;
            };
            if sender.send(event.clone()).is_err() {
                warn!(%connection_id, group, event = %event.event, "dropping event for closed connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> ServerEvent {
        ServerEvent {
            event: name.to_owned(),
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn group_names_are_deterministic() {
        assert_eq!(group_name(42, false), "room:42:false");
        assert_eq!(group_name(42, true), "room:42:true");
    }

    #[tokio::test]
    async fn events_reach_only_group_members() {
        let hub = GroupHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();
        hub.register(a, tx_a);
        hub.register(b, tx_b);
        hub.add_to_group(a, "room:1:false");

        hub.send_to_group("room:1:false", event("ping"));

        assert_eq!(rx_a.recv().await.unwrap().event, "ping");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_removes_all_memberships() {
        let hub = GroupHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new_v4();
        hub.register(conn, tx);
        hub.add_to_group(conn, "room:1:false");
        hub.add_to_group(conn, "room:1:true");

        hub.unregister(conn);
        assert!(!hub.is_in_group(conn, "room:1:false"));
        assert!(!hub.is_in_group(conn, "room:1:true"));

        hub.send_to_group("room:1:false", event("ping"));
        assert!(rx.try_recv().is_err());
    }
}
