pub mod groups;
pub mod queue;
pub mod room;
pub mod session;
pub mod state_machine;
pub mod store;

use std::{future::Future, sync::Arc};

use tokio::time::timeout;

use crate::{
    config::AppConfig,
    dao::{
        match_store::MatchStore,
        storage::{StorageError, StorageResult},
    },
    state::{
        groups::GroupHub,
        room::{RoomId, ServerRoom},
        session::SessionStore,
        store::EntityStore,
    },
};

pub type SharedState = Arc<AppState>;

/// Central application state: the entity registries, the broadcast hub, and
/// the persistence handle.
///
/// There is no global lock; mutual exclusion is per room and per session via
/// the entity stores. Handlers that touch both must acquire the session
/// handle first, then the room handle.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn MatchStore>,
    rooms: EntityStore<RoomId, ServerRoom>,
    sessions: SessionStore,
    hub: GroupHub,
}

impl AppState {
    /// Construct the shared state around a persistence backend.
    pub fn new(config: AppConfig, store: Arc<dyn MatchStore>) -> SharedState {
        Arc::new(Self {
            config,
            store,
            rooms: EntityStore::new(),
            sessions: SessionStore::new(),
            hub: GroupHub::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn MatchStore {
        self.store.as_ref()
    }

    /// Registry of live rooms.
    pub fn rooms(&self) -> &EntityStore<RoomId, ServerRoom> {
        &self.rooms
    }

    /// Registry of live user sessions.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Broadcast groups shared with the transport layer.
    pub fn hub(&self) -> &GroupHub {
        &self.hub
    }

    /// Run a store call under the configured timeout.
    ///
    /// Entity mutexes stay held while store calls are in flight, so every
    /// call is bounded to keep a slow backend from wedging a room.
    pub async fn store_call<T>(
        &self,
        call: impl Future<Output = StorageResult<T>>,
    ) -> StorageResult<T> {
        match timeout(self.config.storage_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout),
        }
    }
}
