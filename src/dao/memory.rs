use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
    time::SystemTime,
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{PlaylistItemRow, RoomRow},
        storage::{StorageError, StorageResult},
    },
    state::room::{BeatmapId, PlaylistItemId, RoomId, UserId},
};

/// Match store backed by process memory.
///
/// Serves local development and the integration test suite; a production
/// deployment installs a database-backed [`MatchStore`] instead.
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomId, RoomRow>,
    // BTreeMap keeps items in id order, which doubles as insertion order.
    playlist_items: BTreeMap<PlaylistItemId, PlaylistItemRow>,
    beatmap_checksums: HashMap<BeatmapId, String>,
    participants: HashMap<RoomId, Vec<UserId>>,
    restricted_users: HashSet<UserId>,
    cleared_scores: Vec<PlaylistItemId>,
    next_playlist_item_id: PlaylistItemId,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a room row, as the lobby creation flow would have persisted it.
    pub async fn seed_room(&self, row: RoomRow) {
        self.inner.lock().await.rooms.insert(row.id, row);
    }

    /// Seed a known beatmap checksum.
    pub async fn seed_beatmap(&self, beatmap_id: BeatmapId, checksum: &str) {
        self.inner
            .lock()
            .await
            .beatmap_checksums
            .insert(beatmap_id, checksum.to_owned());
    }

    /// Seed a playlist item with an explicit id, advancing the id sequence
    /// past it.
    pub async fn seed_playlist_item(&self, row: PlaylistItemRow) {
        let mut inner = self.inner.lock().await;
        inner.next_playlist_item_id = inner.next_playlist_item_id.max(row.id);
        inner.playlist_items.insert(row.id, row);
    }

    /// Flag a user account as restricted.
    pub async fn restrict_user(&self, user_id: UserId) {
        self.inner.lock().await.restricted_users.insert(user_id);
    }

    /// Read back a room row, for assertions.
    pub async fn room(&self, id: RoomId) -> Option<RoomRow> {
        self.inner.lock().await.rooms.get(&id).cloned()
    }

    /// Read back the persisted participant set, for assertions.
    pub async fn participants(&self, room_id: RoomId) -> Vec<UserId> {
        self.inner
            .lock()
            .await
            .participants
            .get(&room_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Playlist item ids whose scores have been cleared, in call order.
    pub async fn cleared_scores(&self) -> Vec<PlaylistItemId> {
        self.inner.lock().await.cleared_scores.clone()
    }
}

impl MatchStore for InMemoryMatchStore {
    fn get_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomRow>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.rooms.get(&id).cloned()) })
    }

    fn get_all_playlist_items(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, StorageResult<Vec<PlaylistItemRow>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .lock()
                .await
                .playlist_items
                .values()
                .filter(|row| row.room_id == room_id)
                .cloned()
                .collect())
        })
    }

    fn add_playlist_item(
        &self,
        mut row: PlaylistItemRow,
    ) -> BoxFuture<'static, StorageResult<PlaylistItemId>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            inner.next_playlist_item_id += 1;
            row.id = inner.next_playlist_item_id;
            let id = row.id;
            inner.playlist_items.insert(id, row);
            Ok(id)
        })
    }

    fn update_playlist_item(&self, row: PlaylistItemRow) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            if !inner.playlist_items.contains_key(&row.id) {
                return Err(StorageError::RowNotFound(format!("playlist item {}", row.id)));
            }
            inner.playlist_items.insert(row.id, row);
            Ok(())
        })
    }

    fn expire_playlist_item(&self, id: PlaylistItemId) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            match inner.playlist_items.get_mut(&id) {
                Some(row) => {
                    row.expired = true;
                    Ok(())
                }
                None => Err(StorageError::RowNotFound(format!("playlist item {id}"))),
            }
        })
    }

    fn get_beatmap_checksum(
        &self,
        beatmap_id: BeatmapId,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let inner = self.inner.clone();
        Box::pin(
            async move { Ok(inner.lock().await.beatmap_checksums.get(&beatmap_id).cloned()) },
        )
    }

    fn update_room_name(
        &self,
        id: RoomId,
        name: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            match inner.rooms.get_mut(&id) {
                Some(row) => {
                    row.name = name;
                    Ok(())
                }
                None => Err(StorageError::RowNotFound(format!("room {id}"))),
            }
        })
    }

    fn update_room_host(
        &self,
        id: RoomId,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            match inner.rooms.get_mut(&id) {
                Some(row) => {
                    row.host_user_id = user_id;
                    Ok(())
                }
                None => Err(StorageError::RowNotFound(format!("room {id}"))),
            }
        })
    }

    fn clear_scores(
        &self,
        playlist_item_id: PlaylistItemId,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.lock().await.cleared_scores.push(playlist_item_id);
            Ok(())
        })
    }

    fn mark_room_active(&self, id: RoomId) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            match inner.rooms.get_mut(&id) {
                Some(row) => {
                    row.ends_at = None;
                    Ok(())
                }
                None => Err(StorageError::RowNotFound(format!("room {id}"))),
            }
        })
    }

    fn mark_room_ended(&self, id: RoomId) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            match inner.rooms.get_mut(&id) {
                Some(row) => {
                    row.ends_at = Some(SystemTime::now());
                    Ok(())
                }
                None => Err(StorageError::RowNotFound(format!("room {id}"))),
            }
        })
    }

    fn replace_participants(
        &self,
        room_id: RoomId,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock().await;
            let count = user_ids.len() as u32;
            inner.participants.insert(room_id, user_ids);
            if let Some(row) = inner.rooms.get_mut(&room_id) {
                row.participant_count = count;
            }
            Ok(())
        })
    }

    fn is_user_restricted(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.restricted_users.contains(&user_id)) })
    }
}
