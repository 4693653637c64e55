use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::state::room::{
    BeatmapId, GameMod, PlaylistItem, PlaylistItemId, QueueMode, RoomId, RulesetId, UserId,
};

/// Discovery category a room was created under. Only realtime rooms may be
/// driven by this server; playlist rooms are scored asynchronously elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomCategory {
    Playlists,
    Realtime,
}

/// Persisted room row as handed over by the match store.
///
/// A room is active iff `ends_at` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRow {
    pub id: RoomId,
    pub name: String,
    pub category: RoomCategory,
    pub host_user_id: UserId,
    pub queue_mode: QueueMode,
    pub ends_at: Option<SystemTime>,
    pub participant_count: u32,
}

/// Persisted playlist item row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItemRow {
    pub id: PlaylistItemId,
    pub room_id: RoomId,
    pub owner_id: UserId,
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    pub ruleset_id: RulesetId,
    pub required_mods: Vec<GameMod>,
    pub allowed_mods: Vec<GameMod>,
    pub expired: bool,
}

impl From<PlaylistItemRow> for PlaylistItem {
    fn from(row: PlaylistItemRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            beatmap_id: row.beatmap_id,
            beatmap_checksum: row.beatmap_checksum,
            ruleset_id: row.ruleset_id,
            required_mods: row.required_mods,
            allowed_mods: row.allowed_mods,
            expired: row.expired,
        }
    }
}

impl PlaylistItemRow {
    /// Rebuild the persisted representation of an in-memory item.
    pub fn from_item(room_id: RoomId, item: &PlaylistItem) -> Self {
        Self {
            id: item.id,
            room_id,
            owner_id: item.owner_id,
            beatmap_id: item.beatmap_id,
            beatmap_checksum: item.beatmap_checksum.clone(),
            ruleset_id: item.ruleset_id,
            required_mods: item.required_mods.clone(),
            allowed_mods: item.allowed_mods.clone(),
            expired: item.expired,
        }
    }
}
