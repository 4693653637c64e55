use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{PlaylistItemRow, RoomRow},
        storage::StorageResult,
    },
    state::room::{BeatmapId, PlaylistItemId, RoomId, UserId},
};

/// Abstraction over the persistence layer for rooms, playlist items,
/// participants and beatmap metadata.
///
/// The in-memory room is the authoritative source of truth for live state;
/// the store reflects the last committed snapshot for discovery and
/// post-mortem queries, and suffices to rebuild a room on demand after a
/// restart.
pub trait MatchStore: Send + Sync {
    fn get_room(&self, id: RoomId) -> BoxFuture<'static, StorageResult<Option<RoomRow>>>;
    fn get_all_playlist_items(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, StorageResult<Vec<PlaylistItemRow>>>;
    /// Insert a new playlist item and return the id assigned to it.
    fn add_playlist_item(
        &self,
        row: PlaylistItemRow,
    ) -> BoxFuture<'static, StorageResult<PlaylistItemId>>;
    fn update_playlist_item(&self, row: PlaylistItemRow) -> BoxFuture<'static, StorageResult<()>>;
    fn expire_playlist_item(&self, id: PlaylistItemId) -> BoxFuture<'static, StorageResult<()>>;
    fn get_beatmap_checksum(
        &self,
        beatmap_id: BeatmapId,
    ) -> BoxFuture<'static, StorageResult<Option<String>>>;
    fn update_room_name(&self, id: RoomId, name: String)
    -> BoxFuture<'static, StorageResult<()>>;
    fn update_room_host(
        &self,
        id: RoomId,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Drop any scores recorded against a playlist item before a fresh round.
    fn clear_scores(&self, playlist_item_id: PlaylistItemId)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Clear `ends_at` so the room shows up as active again.
    fn mark_room_active(&self, id: RoomId) -> BoxFuture<'static, StorageResult<()>>;
    /// Stamp `ends_at` with the current time.
    fn mark_room_ended(&self, id: RoomId) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the participant set transactionally and refresh the
    /// denormalised participant count.
    fn replace_participants(
        &self,
        room_id: RoomId,
        user_ids: Vec<UserId>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn is_user_restricted(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<bool>>;
}
